//! Builtin statements.
//!
//! A builtin statement computes from the input statements of its enclosing
//! function. Analysis only produces the output prototype; native builtins
//! run over [`Datum`]s at runtime, intrinsics over the items themselves.

use super::{CrashKind, EvalError, Evaluator, StaticErrorKind, Trap};
use crate::stdlib::{Builtin, BuiltinError, Data, Datum, Implementation, Intrinsic, Output};
use crate::tree::{FieldId, ItemIdx, Value};
use ecow::EcoString;

impl Evaluator<'_> {
    pub(crate) fn eval_builtin(&mut self, idx: ItemIdx, name: FieldId) -> Result<(), EvalError> {
        let builtins = self.builtins;
        let builtin = builtins
            .get(self.tree.names.name(name))
            .ok_or_else(|| StaticErrorKind::UnknownBuiltin {
                name: self.tree.names.name(name).into(),
            })?;
        let holder = self
            .tree
            .container(idx)
            .ok_or_else(|| Trap::new("builtin statement outside a function"))?;
        let inputs = self.block_inputs(holder);
        self.mark_conditional(idx, builtin.conditional);

        if self.analyzing() {
            return self.builtin_prototype(idx, builtin, &inputs);
        }
        match builtin.implementation {
            Implementation::Native { forward, .. } => {
                let data: Data = inputs
                    .iter()
                    .map(|&input| self.tree.value(input).map_or(Datum::Nil, Datum::from_value))
                    .collect();
                match forward(&data) {
                    Ok(Some(datum)) => {
                        let value = datum.into_value().ok_or_else(|| {
                            Trap::new(format!("{} produced a non-scalar", builtin.name))
                        })?;
                        self.tree.set_value(idx, value);
                    }
                    Ok(None) if builtin.conditional => self.tree.item_mut(idx).rejected = true,
                    Ok(None) => {
                        let message = format!("unconditional {} rejected", builtin.name);
                        return Err(Trap::new(message).into());
                    }
                    Err(error) => return Err(builtin_crash(&builtin.name, error)),
                }
                Ok(())
            }
            Implementation::Intrinsic(intrinsic) => {
                self.run_intrinsic(idx, builtin, intrinsic, &inputs)
            }
        }
    }

    fn builtin_prototype(
        &mut self,
        idx: ItemIdx,
        builtin: &Builtin,
        inputs: &[ItemIdx],
    ) -> Result<(), EvalError> {
        let input = |position: usize| {
            inputs.get(position).copied().ok_or_else(|| {
                let message = format!("{} is missing input {position}", builtin.name);
                EvalError::from(Trap::new(message))
            })
        };
        match builtin.implementation {
            Implementation::Intrinsic(Intrinsic::Length) => {
                self.tree.set_value(idx, Value::Number(0.0));
            }
            Implementation::Intrinsic(Intrinsic::At) => {
                let collection = input(0)?;
                match self.tree.value(collection) {
                    Some(Value::Array(array)) => {
                        let template = array.template;
                        self.copy_into(template, idx);
                    }
                    Some(Value::Text(_)) => self.tree.set_value(idx, Value::Character(' ')),
                    _ => self.tree.set_value(idx, Value::Anything),
                }
            }
            Implementation::Intrinsic(Intrinsic::Append) => {
                let (collection, element) = (input(0)?, input(1)?);
                if let Some(Value::Array(array)) = self.tree.value(collection) {
                    let template = array.template;
                    self.check_changeable(element, template)?;
                }
                self.copy_into(collection, idx);
                self.tree.array_bump(idx);
            }
            Implementation::Intrinsic(Intrinsic::Delete) => {
                self.copy_into(input(0)?, idx);
                self.tree.array_bump(idx);
            }
            _ => match builtin.output {
                Output::Fixed(prototype) => self.tree.set_value(idx, prototype.value()),
                Output::SameAsInput(position) => self.copy_into(input(position)?, idx),
            },
        }
        Ok(())
    }

    fn run_intrinsic(
        &mut self,
        idx: ItemIdx,
        builtin: &Builtin,
        intrinsic: Intrinsic,
        inputs: &[ItemIdx],
    ) -> Result<(), EvalError> {
        let name = &builtin.name;
        let (Some(&first), second) = (inputs.first(), inputs.get(1).copied()) else {
            return Err(Trap::new(format!("{name} has no inputs")).into());
        };
        let second = || {
            second.ok_or_else(|| EvalError::from(Trap::new(format!("{name} needs two inputs"))))
        };
        let value = self.tree.value(first).cloned();
        match (intrinsic, value) {
            (Intrinsic::Append, Some(Value::Array(_))) => {
                let element = second()?;
                self.copy_into(first, idx);
                self.tree.array_append(idx, Some(element));
            }
            (Intrinsic::Append, Some(Value::Text(text))) => {
                let suffix = match self.tree.value(second()?) {
                    Some(Value::Text(suffix)) => suffix.clone(),
                    Some(Value::Character(c)) => {
                        let mut suffix = EcoString::new();
                        suffix.push(*c);
                        suffix
                    }
                    _ => return Err(crash(name, "can only append text or characters to text")),
                };
                let mut text = text;
                text.push_str(&suffix);
                self.tree.set_value(idx, Value::Text(text));
            }
            (Intrinsic::Delete, Some(Value::Array(_))) => {
                let position = self.position_input(name, second()?)?;
                self.copy_into(first, idx);
                if position == 0 || self.tree.array_delete(idx, position - 1).is_none() {
                    let index = position as i64;
                    return Err(builtin_crash(name, BuiltinError::OutOfRange { index }));
                }
            }
            (Intrinsic::Delete, Some(Value::Text(text))) => {
                let position = self.position_input(name, second()?)?;
                let mut chars: Vec<char> = text.chars().collect();
                if position == 0 || position > chars.len() {
                    let index = position as i64;
                    return Err(builtin_crash(name, BuiltinError::OutOfRange { index }));
                }
                chars.remove(position - 1);
                self.tree.set_value(idx, Value::Text(chars.into_iter().collect()));
            }
            (Intrinsic::Length, Some(Value::Array(array))) => {
                self.tree.set_value(idx, Value::Number(array.entries.len() as f64));
            }
            (Intrinsic::Length, Some(Value::Text(text))) => {
                self.tree.set_value(idx, Value::Number(text.chars().count() as f64));
            }
            (Intrinsic::At, Some(Value::Array(array))) => {
                let position = self.position_input(name, second()?)?;
                match position.checked_sub(1).and_then(|p| array.entries.get(p)) {
                    Some(&entry) => self.copy_into(entry, idx),
                    None => self.tree.item_mut(idx).rejected = true,
                }
            }
            (Intrinsic::At, Some(Value::Text(text))) => {
                let position = self.position_input(name, second()?)?;
                match position.checked_sub(1).and_then(|p| text.chars().nth(p)) {
                    Some(c) => self.tree.set_value(idx, Value::Character(c)),
                    None => self.tree.item_mut(idx).rejected = true,
                }
            }
            (Intrinsic::Equal | Intrinsic::NotEqual, Some(_)) => {
                let equal = self.tree.values_equal(first, second()?);
                if equal == (intrinsic == Intrinsic::Equal) {
                    self.copy_into(first, idx);
                } else {
                    self.tree.item_mut(idx).rejected = true;
                }
            }
            (_, other) => {
                let found = other.as_ref().map_or("nothing", Value::kind_name);
                return Err(crash(name, &format!("unsupported input: {found}")));
            }
        }
        Ok(())
    }

    /// A one-based position argument.
    fn position_input(&self, name: &str, input: ItemIdx) -> Result<usize, EvalError> {
        match self.tree.value(input) {
            Some(Value::Number(n)) if n.fract() == 0.0 && *n >= 0.0 => Ok(*n as usize),
            Some(Value::Number(n)) => {
                Err(builtin_crash(name, BuiltinError::OutOfRange { index: *n as i64 }))
            }
            _ => Err(builtin_crash(
                name,
                BuiltinError::TypeMismatch {
                    index: 1,
                    expected: "number",
                },
            )),
        }
    }
}

fn builtin_crash(name: &str, error: BuiltinError) -> EvalError {
    crash(name, &error.to_string())
}

fn crash(name: &str, message: &str) -> EvalError {
    CrashKind::Builtin {
        name: name.into(),
        message: message.to_string(),
    }
    .into()
}
