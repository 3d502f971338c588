//! Turns head syntax into unbound arena items.

use super::{Arg, Clause, Field, Formula, Head, Literal, RefSyntax};
use crate::evaluator::error::{StaticError, StaticErrorKind};
use crate::span::{Span, Token};
use crate::tree::{
    Array, BlockKind, CodeKind, EvalState, FormulaType, Id, Io, ItemIdx, MetaId, RefToken,
    Reference, Tree, Value,
};
use ecow::EcoString;
use hashbrown::HashSet;

pub(crate) struct Loader<'t> {
    tree: &'t mut Tree,
}

impl<'t> Loader<'t> {
    pub(crate) fn new(tree: &'t mut Tree) -> Self {
        Loader { tree }
    }

    /// Loads a document as version `number` under the workspace root.
    pub(crate) fn load_version(
        &mut self,
        head: &Head,
        number: u32,
    ) -> Result<ItemIdx, StaticError> {
        let version = self.tree.new_item(Id::Version(number), Io::Data);
        self.load_block(version, BlockKind::Record, &head.fields)?;
        let root = self.tree.root();
        self.tree.push_field(root, version);
        Ok(version)
    }

    /// An unattached data item holding the fully initialized value of `literal`.
    pub(crate) fn load_literal(&mut self, literal: &Literal) -> Result<ItemIdx, StaticError> {
        let item = self.tree.new_item(Id::Ordinal(0), Io::Data);
        let value = self.build_value(item, literal)?;
        self.tree.set_value(item, value);
        self.materialize(item);
        Ok(item)
    }

    /// Initializes nested literal fields, which loading leaves empty.
    fn materialize(&mut self, item: ItemIdx) {
        if self.tree.value(item).is_none() && self.tree.item(item).formula == FormulaType::Literal {
            self.tree.initialize(item);
        }
        for child in self.tree.children(item) {
            self.materialize(child);
        }
    }

    /// Gives `holder` a block value made of `fields`.
    pub(crate) fn load_block(
        &mut self,
        holder: ItemIdx,
        kind: BlockKind,
        fields: &[Field],
    ) -> Result<(), StaticError> {
        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            let id = match &field.name {
                Some(name) => {
                    if !seen.insert(name.clone()) {
                        return Err(StaticError::new(StaticErrorKind::DuplicateName {
                            name: name.clone(),
                        })
                        .at(Some(&Token::new(name.clone(), field.span.clone()))));
                    }
                    Id::Name(self.tree.names.intern(name))
                }
                None => Id::Ordinal(position as u32 + 1),
            };
            items.push(self.load_field(field, id)?);
        }
        let mut block = self.tree.new_block(kind, items);
        if kind == BlockKind::Choice {
            if let Value::Block(block) = &mut block {
                block.chosen = (!block.fields.is_empty()).then_some(0);
            }
        }
        self.tree.set_value(holder, block);
        Ok(())
    }

    fn load_field(&mut self, field: &Field, id: Id) -> Result<ItemIdx, StaticError> {
        let item = self.tree.new_item(id, field.io);
        {
            let item = self.tree.item_mut(item);
            item.qualifier = field.qualifier;
            item.declared_conditional = field.declared_conditional;
            let text = field.name.clone().unwrap_or_default();
            item.token = Some(Token::new(text, field.span.clone()));
        }
        self.load_formula(item, &field.formula)?;
        if let Some(statements) = &field.on_update {
            let reaction = self.code_holder(statements, CodeKind::Do)?;
            self.tree.set_meta(item, MetaId::OnUpdate, reaction);
        }
        Ok(item)
    }

    /// Tags `item` with the formula and attaches its metadata.
    fn load_formula(&mut self, item: ItemIdx, formula: &Formula) -> Result<(), StaticError> {
        let formula_type = match formula {
            Formula::Literal(literal) => {
                let initial = self.tree.new_item(Id::Meta(MetaId::InitialValue), Io::Data);
                let value = self.build_value(initial, literal)?;
                self.tree.set_value(initial, value);
                self.tree.set_meta(item, MetaId::InitialValue, initial);
                FormulaType::Literal
            }
            Formula::Reference(reference) => {
                self.attach_reference(item, MetaId::Reference, reference);
                FormulaType::Reference
            }
            Formula::Code(statements) => {
                let holder = self.code_holder(statements, CodeKind::Do)?;
                self.tree.set_meta(item, MetaId::Code, holder);
                FormulaType::Code
            }
            Formula::Try { clauses, optional } => {
                let holder = self.try_holder(clauses, *optional)?;
                self.tree.set_meta(item, MetaId::Code, holder);
                FormulaType::Code
            }
            Formula::Loop { kind, body } => {
                self.attach_reference(item, MetaId::LoopSource, &RefSyntax::parse("that"));
                let body = self.code_holder(body, CodeKind::Do)?;
                self.tree.set_meta(item, MetaId::LoopBody, body);
                FormulaType::Loop(*kind)
            }
            Formula::Call {
                function,
                args,
                guard,
            } => {
                self.attach_reference(item, MetaId::Function, function);
                let arguments = self.arguments(args)?;
                self.tree.set_meta(item, MetaId::Arguments, arguments);
                FormulaType::Call { guard: *guard }
            }
            Formula::Update { path, value } => {
                self.attach_reference(item, MetaId::Subject, &RefSyntax::parse("that"));
                self.attach_payload(item, value)?;
                FormulaType::Update {
                    path: path.iter().map(|step| self.tree.names.intern(step)).collect(),
                }
            }
            Formula::Choose { option, value } => {
                self.attach_reference(item, MetaId::Subject, &RefSyntax::parse("that"));
                if let Some(value) = value {
                    self.attach_payload(item, value)?;
                }
                FormulaType::Choose {
                    option: self.tree.names.intern(option),
                }
            }
            Formula::Write { target, value } => {
                self.attach_reference(item, MetaId::WriteTarget, target);
                self.attach_payload(item, value)?;
                FormulaType::Write
            }
            Formula::Builtin(name) => FormulaType::Builtin {
                name: self.tree.names.intern(name),
            },
            Formula::Include(reference) => {
                self.attach_reference(item, MetaId::Reference, reference);
                FormulaType::Include
            }
        };
        self.tree.item_mut(item).formula = formula_type;
        Ok(())
    }

    /// A metadata holder whose value is a code block of `statements`.
    fn code_holder(
        &mut self,
        statements: &[Field],
        kind: CodeKind,
    ) -> Result<ItemIdx, StaticError> {
        let holder = self.tree.new_item(Id::Meta(MetaId::Code), Io::Data);
        self.load_block(holder, BlockKind::Code(kind), statements)?;
        Ok(holder)
    }

    /// A metadata holder whose value is a try block; each clause is a
    /// field holding its statements as a code block value.
    fn try_holder(&mut self, clauses: &[Clause], optional: bool) -> Result<ItemIdx, StaticError> {
        let holder = self.tree.new_item(Id::Meta(MetaId::Code), Io::Data);
        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(clauses.len());
        for (position, clause) in clauses.iter().enumerate() {
            let id = match &clause.name {
                Some(name) => {
                    if !seen.insert(name.clone()) {
                        return Err(StaticError::new(StaticErrorKind::DuplicateName {
                            name: name.clone(),
                        }));
                    }
                    Id::Name(self.tree.names.intern(name))
                }
                None => Id::Ordinal(position as u32 + 1),
            };
            let item = self.tree.new_item(id, Io::Data);
            let text = clause.name.clone().unwrap_or_default();
            self.tree.item_mut(item).token = Some(Token::new(text, Span::default()));
            self.load_block(item, BlockKind::Code(CodeKind::Do), &clause.statements)?;
            items.push(item);
        }
        let block = self.tree.new_block(BlockKind::Code(CodeKind::Try { optional }), items);
        self.tree.set_value(holder, block);
        Ok(holder)
    }

    fn arguments(&mut self, args: &[Arg]) -> Result<ItemIdx, StaticError> {
        let holder = self.tree.new_item(Id::Meta(MetaId::Arguments), Io::Data);
        let mut items = Vec::with_capacity(args.len());
        for (position, arg) in args.iter().enumerate() {
            let id = match &arg.input {
                Some(name) => Id::Name(self.tree.names.intern(name)),
                None => Id::Ordinal(position as u32 + 1),
            };
            let item = self.tree.new_item(id, Io::Output);
            let text = arg.input.clone().unwrap_or_default();
            self.tree.item_mut(item).token = Some(Token::new(text, Span::default()));
            self.load_formula(item, &arg.value)?;
            items.push(item);
        }
        let block = self.tree.new_block(BlockKind::Record, items);
        self.tree.set_value(holder, block);
        Ok(holder)
    }

    fn attach_payload(&mut self, item: ItemIdx, formula: &Formula) -> Result<(), StaticError> {
        let payload = self.tree.new_item(Id::Meta(MetaId::Payload), Io::Output);
        self.load_formula(payload, formula)?;
        self.tree.set_meta(item, MetaId::Payload, payload);
        Ok(())
    }

    fn attach_reference(&mut self, item: ItemIdx, meta: MetaId, syntax: &RefSyntax) {
        let tokens = syntax
            .steps
            .iter()
            .map(|step| {
                let text: EcoString = step.name.clone().unwrap_or_else(|| "~".into());
                let token = Token::new(text, step.span.clone());
                match &step.name {
                    Some(name) => RefToken::Name {
                        name: self.tree.names.intern(name),
                        guard: step.guard,
                        token,
                    },
                    None => RefToken::Export {
                        guard: step.guard,
                        token,
                    },
                }
            })
            .collect();
        let holder = self.tree.new_item(Id::Meta(meta), Io::Data);
        let text = if syntax.dependent { "that" } else { "" };
        self.tree.item_mut(holder).token = Some(Token::new(text, syntax.span.clone()));
        self.tree.set_value(holder, Value::Reference(Reference::new(syntax.dependent, tokens)));
        self.tree.set_meta(item, meta, holder);
    }

    /// Builds a literal value whose children belong to `holder`.
    fn build_value(&mut self, holder: ItemIdx, literal: &Literal) -> Result<Value, StaticError> {
        let value = match literal {
            Literal::Nil => Value::Nil,
            Literal::Anything => Value::Anything,
            Literal::Number(n) => Value::Number(*n),
            Literal::Character(c) => Value::Character(*c),
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Text(text) => Value::Text(text.clone()),
            Literal::Record(fields) => self.build_block(BlockKind::Record, fields)?,
            Literal::Choice(options) => {
                let value = self.build_block(BlockKind::Choice, options)?;
                if let Some(block) = value.as_block() {
                    for &option in &block.fields {
                        let option = self.tree.item_mut(option);
                        option.conditional = true;
                        option.declared_conditional = false;
                    }
                }
                value
            }
            Literal::Function(statements) => {
                self.build_block(BlockKind::Code(CodeKind::Do), statements)?
            }
            Literal::Array {
                tracked,
                template,
                entries,
            } => {
                let entry_id = |n: u32| if *tracked { Id::Serial(n) } else { Id::Ordinal(n) };
                let template = self.build_entry(holder, entry_id(0), template)?;
                let mut items = Vec::with_capacity(entries.len());
                for (position, entry) in entries.iter().enumerate() {
                    items.push(self.build_entry(holder, entry_id(position as u32 + 1), entry)?);
                }
                Value::Array(Array {
                    tracked: *tracked,
                    serial: entries.len() as u32,
                    template,
                    entries: items,
                    ghosts: Vec::new(),
                    vid: self.tree.provenance.fresh(),
                })
            }
        };
        Ok(value)
    }

    /// Builds a record-like block by loading fields into a scratch holder.
    fn build_block(&mut self, kind: BlockKind, fields: &[Field]) -> Result<Value, StaticError> {
        let scratch = self.tree.new_item(Id::Ordinal(0), Io::Data);
        self.load_block(scratch, kind, fields)?;
        self.tree
            .detach_value(scratch)
            .ok_or_else(|| StaticError::new(StaticErrorKind::NoResult))
    }

    fn build_entry(
        &mut self,
        holder: ItemIdx,
        id: Id,
        literal: &Literal,
    ) -> Result<ItemIdx, StaticError> {
        let entry = self.tree.new_item(id, Io::Data);
        let value = self.build_value(entry, literal)?;
        self.tree.set_value(entry, value);
        let item = self.tree.item_mut(entry);
        item.container = Some(holder);
        item.evaluated = EvalState::NotStarted;
        Ok(entry)
    }
}
