//! Plain nested output for inspection and tests.

use super::{BlockKind, CodeKind, Id, ItemIdx, Qualifier, Tree, Value};
use serde_json::{Map, Value as Json};

/// Largest magnitude below which every integral f64 is exact.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

impl Tree {
    /// Dumps an item. Rejected items dump as `false`.
    pub fn dump(&self, idx: ItemIdx) -> Json {
        let item = self.item(idx);
        if item.rejected {
            return Json::Bool(false);
        }
        match &item.value {
            Some(value) => self.dump_value(value),
            None => Json::Null,
        }
    }

    pub fn dump_value(&self, value: &Value) -> Json {
        match value {
            Value::Nil | Value::Anything => Json::Null,
            Value::Number(n) => dump_number(*n),
            Value::Character(c) => Json::String(c.to_string()),
            Value::Boolean(b) => Json::Bool(*b),
            Value::Text(text) => Json::String(text.to_string()),
            Value::Block(block) => match block.kind {
                BlockKind::Choice => {
                    let mut map = Map::new();
                    let chosen = block.chosen.and_then(|chosen| block.fields.get(chosen));
                    if let Some(&option) = chosen {
                        let name = self.names.display(self.item(option).id).to_string();
                        map.insert(name, self.dump(option));
                    }
                    Json::Object(map)
                }
                BlockKind::Code(CodeKind::Try { .. }) => block
                    .chosen
                    .and_then(|chosen| block.fields.get(chosen))
                    .map_or(Json::Null, |&clause| self.dump(clause)),
                BlockKind::Record | BlockKind::Code(CodeKind::Do) => {
                    let mut map = Map::new();
                    for &field in &block.fields {
                        let item = self.item(field);
                        let shown = (item.id, item.qualifier == Qualifier::Let);
                        if let (Id::Name(name), false) = shown {
                            map.insert(self.names.name(name).to_string(), self.dump(field));
                        }
                    }
                    Json::Object(map)
                }
            },
            Value::Array(array) => {
                Json::Array(array.entries.iter().map(|&entry| self.dump(entry)).collect())
            }
            Value::Reference(reference) => match &reference.binding {
                Some(binding) => Json::String(binding.path.display(&self.names).to_string()),
                None => Json::Null,
            },
        }
    }
}

fn dump_number(n: f64) -> Json {
    if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER {
        Json::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}
