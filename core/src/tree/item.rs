//! The item node stored in the tree arena.

use super::ids::{FieldId, Id, MetaId};
use super::path::Path;
use super::value::Value;
use crate::span::Token;
use core::cell::OnceCell;
use ecow::EcoVec;

/// Stable index of an item in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemIdx(pub(crate) u32);

static_assertions::assert_eq_size!(ItemIdx, u32);

impl ItemIdx {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a field takes part in data flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Io {
    /// `name: formula`, user-changeable data.
    Input,
    /// `name = formula`, computed.
    Output,
    /// `name =|> formula`, computed but writable through feedback.
    Interface,
    /// Array entries, templates and internal holders.
    Data,
}

/// Role of a statement inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// Ordinary statement; the last one is the block's result.
    Data,
    /// Named local that must be used.
    Let,
    /// Conditional assertion; never the result and transparent to `that`.
    Check,
    /// Side result of the block.
    Export,
}

/// Evaluation marker used for cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EvalState {
    #[default]
    NotStarted,
    InProgress,
    Done,
}

/// `?` rejects silently, `!` turns rejection into an assertion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Guard {
    Reject,
    Assert,
}

impl Guard {
    pub fn as_str(self) -> &'static str {
        match self {
            Guard::Reject => "?",
            Guard::Assert => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    Find(Guard),
    ForAll,
    SuchThat,
    All(Guard),
    None(Guard),
    Fold,
}

impl LoopKind {
    /// Loops that decide by rejection need a conditional body.
    pub fn needs_conditional_body(self) -> bool {
        !matches!(self, LoopKind::ForAll | LoopKind::Fold)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoopKind::Find(Guard::Reject) => "find?",
            LoopKind::Find(Guard::Assert) => "find!",
            LoopKind::ForAll => "for-all",
            LoopKind::SuchThat => "such-that",
            LoopKind::All(Guard::Reject) => "all?",
            LoopKind::All(Guard::Assert) => "all!",
            LoopKind::None(Guard::Reject) => "none?",
            LoopKind::None(Guard::Assert) => "none!",
            LoopKind::Fold => "fold",
        }
    }
}

/// What computes an item's value.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaType {
    /// Plain data; the value is stored.
    None,
    /// Initialized from the `InitialValue` metadata.
    Literal,
    Reference,
    Code,
    Loop(LoopKind),
    Call { guard: Option<Guard> },
    /// Replace the field at `path` of the previous value.
    Update { path: EcoVec<FieldId> },
    /// Select an option of the previous choice value.
    Choose { option: FieldId },
    Write,
    Builtin { name: FieldId },
    Include,
}

impl FormulaType {
    /// Formulas whose value is recomputed on every evaluation.
    pub fn is_computed(&self) -> bool {
        !matches!(self, FormulaType::None | FormulaType::Literal)
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub(crate) id: Id,
    pub(crate) container: Option<ItemIdx>,
    pub(crate) value: Option<Value>,
    pub(crate) metadata: Vec<(MetaId, ItemIdx)>,
    pub(crate) io: Io,
    pub(crate) qualifier: Qualifier,
    pub(crate) formula: FormulaType,
    /// Statically may reject.
    pub(crate) conditional: bool,
    /// Declared with a trailing `?` on its name.
    pub(crate) declared_conditional: bool,
    /// Rejected during the current evaluation.
    pub(crate) rejected: bool,
    pub(crate) evaluated: EvalState,
    pub(crate) token: Option<Token>,
    pub(crate) path: OnceCell<Path>,
}

impl Item {
    pub fn new(id: Id, io: Io) -> Self {
        Item {
            id,
            container: None,
            value: None,
            metadata: Vec::new(),
            io,
            qualifier: Qualifier::Data,
            formula: FormulaType::None,
            conditional: false,
            declared_conditional: false,
            rejected: false,
            evaluated: EvalState::NotStarted,
            token: None,
            path: OnceCell::new(),
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn container(&self) -> Option<ItemIdx> {
        self.container
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn io(&self) -> Io {
        self.io
    }

    pub fn qualifier(&self) -> Qualifier {
        self.qualifier
    }

    pub fn formula(&self) -> &FormulaType {
        &self.formula
    }

    pub fn is_conditional(&self) -> bool {
        self.conditional
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    pub fn evaluated(&self) -> EvalState {
        self.evaluated
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn meta(&self, meta: MetaId) -> Option<ItemIdx> {
        self.metadata
            .iter()
            .find(|(key, _)| *key == meta)
            .map(|(_, idx)| *idx)
    }

    /// Computed items take their value from a formula rather than storing it.
    /// Inputs always hold data, whatever formula produced their default.
    pub fn is_computed(&self) -> bool {
        self.io != Io::Input && self.formula.is_computed()
    }

    /// Statements that the previous-value chain and block results consider.
    pub fn produces_data(&self) -> bool {
        self.qualifier == Qualifier::Data && self.formula != FormulaType::Write
    }
}
