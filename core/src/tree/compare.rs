//! Structural equality and type compatibility of item values.

use super::{BlockKind, ItemIdx, Tree, Value};

impl Tree {
    /// Deep equality of two items' values. Array entry ids are ignored.
    pub fn values_equal(&self, a: ItemIdx, b: ItemIdx) -> bool {
        if self.item(a).rejected || self.item(b).rejected {
            return self.item(a).rejected == self.item(b).rejected;
        }
        match (self.value(a), self.value(b)) {
            (None, None) => true,
            (Some(x), Some(y)) => self.value_equal(x, y),
            _ => false,
        }
    }

    pub fn value_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Nil, Value::Nil) | (Value::Anything, Value::Anything) => true,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Character(x), Value::Character(y)) => x == y,
            (Value::Boolean(x), Value::Boolean(y)) => x == y,
            (Value::Text(x), Value::Text(y)) => x == y,
            (Value::Block(x), Value::Block(y)) => {
                x.kind == y.kind
                    && x.chosen == y.chosen
                    && x.fields.len() == y.fields.len()
                    && x.fields.iter().zip(&y.fields).all(|(&f, &g)| {
                        self.item(f).id == self.item(g).id && self.values_equal(f, g)
                    })
            }
            (Value::Array(x), Value::Array(y)) => {
                x.tracked == y.tracked
                    && x.entries.len() == y.entries.len()
                    && x.entries
                        .iter()
                        .zip(&y.entries)
                        .all(|(&e, &f)| self.values_equal(e, f))
            }
            (Value::Reference(x), Value::Reference(y)) => {
                x.binding.as_ref().map(|b| &b.path) == y.binding.as_ref().map(|b| &b.path)
            }
            _ => false,
        }
    }

    /// Whether the value of `new` may replace the value of `old` without
    /// changing its type.
    pub fn changeable_from(&self, new: ItemIdx, old: ItemIdx, max_depth: usize) -> bool {
        if self.is_copy_of(new, old, max_depth) {
            return true;
        }
        match (self.value(new), self.value(old)) {
            (_, None) | (_, Some(Value::Anything)) => true,
            (None, Some(_)) => false,
            (Some(x), Some(y)) => self.value_changeable_from(x, y, max_depth),
        }
    }

    pub(crate) fn value_changeable_from(&self, new: &Value, old: &Value, max_depth: usize) -> bool {
        match (new, old) {
            (_, Value::Anything) => true,
            (Value::Nil, Value::Nil)
            | (Value::Number(_), Value::Number(_))
            | (Value::Character(_), Value::Character(_))
            | (Value::Boolean(_), Value::Boolean(_))
            | (Value::Text(_), Value::Text(_))
            | (Value::Reference(_), Value::Reference(_)) => true,
            (Value::Block(x), Value::Block(y)) => {
                if x.kind != y.kind {
                    return false;
                }
                if matches!(x.kind, BlockKind::Code(_)) {
                    return true;
                }
                x.fields.len() == y.fields.len()
                    && x.fields.iter().zip(&y.fields).all(|(&f, &g)| {
                        self.item(f).id == self.item(g).id
                            && self.changeable_from(f, g, max_depth)
                    })
            }
            (Value::Array(x), Value::Array(y)) => {
                x.tracked == y.tracked && self.changeable_from(x.template, y.template, max_depth)
            }
            _ => false,
        }
    }
}
