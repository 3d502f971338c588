//! Identifiers of items within their containers.
//!
//! Field names are interned into [`FieldId`] handles by [`Names`]; metadata
//! keys come from the fixed [`MetaId`] set.

use ecow::EcoString;
use hashbrown::HashMap;

/// Interned handle for a field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u32);

/// Fixed set of metadata keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetaId {
    /// Reference formula (also used by includes).
    Reference,
    /// Code block of a code or try formula.
    Code,
    /// Literal an item is (re)initialized from.
    InitialValue,
    /// Incoming value of an iteration or reaction, the `that` of its first statement.
    Input,
    /// Dependent reference to the array a loop iterates over.
    LoopSource,
    /// Unbound loop body as written.
    LoopBody,
    /// Analyzed iteration that runtime iterations are copied from.
    LoopTemplate,
    /// Analyzed result of a for-all body; the template of its result arrays.
    LoopResult,
    /// Runtime iterations, one per source entry.
    Iterations,
    /// Reference to the called function.
    Function,
    /// Arguments of a call.
    Arguments,
    /// Instantiated function body of a call.
    CallBody,
    /// Previous value consumed by update and choose statements.
    Subject,
    /// Value formula of update, choose and write statements.
    Payload,
    /// Reference to the target of a write statement.
    WriteTarget,
    /// On-update reaction definition.
    OnUpdate,
    /// Reaction instance created while propagating a write.
    Reaction,
    /// Side result of a statement or block.
    Export,
    /// Builtin library attached to the workspace root.
    Library,
}

impl MetaId {
    /// Templates are copied from but never evaluated or reset.
    pub fn is_template(self) -> bool {
        matches!(self, MetaId::InitialValue | MetaId::LoopBody)
    }

    /// Computed metadata is discarded when an item is reset.
    pub fn is_computed(self) -> bool {
        matches!(
            self,
            MetaId::CallBody | MetaId::Iterations | MetaId::Reaction | MetaId::Export
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetaId::Reference => "reference",
            MetaId::Code => "code",
            MetaId::InitialValue => "initial-value",
            MetaId::Input => "input",
            MetaId::LoopSource => "loop-source",
            MetaId::LoopBody => "loop-body",
            MetaId::LoopTemplate => "loop-template",
            MetaId::LoopResult => "loop-result",
            MetaId::Iterations => "iterations",
            MetaId::Function => "function",
            MetaId::Arguments => "arguments",
            MetaId::CallBody => "call-body",
            MetaId::Subject => "subject",
            MetaId::Payload => "payload",
            MetaId::WriteTarget => "write-target",
            MetaId::OnUpdate => "on-update",
            MetaId::Reaction => "reaction",
            MetaId::Export => "export",
            MetaId::Library => "library",
        }
    }
}

/// Identity of an item within its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Id {
    /// Named field of a block.
    Name(FieldId),
    /// Positional entry: anonymous statements and untracked array entries.
    Ordinal(u32),
    /// Permanent identity of a tracked array entry.
    Serial(u32),
    /// Metadata entry.
    Meta(MetaId),
    /// A version of the document under the workspace root.
    Version(u32),
}

static_assertions::assert_eq_size!(Id, u64);

impl Id {
    pub fn is_meta(self) -> bool {
        matches!(self, Id::Meta(_))
    }

    /// Array templates use the zero ordinal or serial.
    pub fn is_template(self) -> bool {
        matches!(self, Id::Ordinal(0) | Id::Serial(0))
    }

    pub fn name(self) -> Option<FieldId> {
        match self {
            Id::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn number(self) -> Option<u32> {
        match self {
            Id::Ordinal(n) | Id::Serial(n) | Id::Version(n) => Some(n),
            _ => None,
        }
    }
}

/// Interner for field names.
#[derive(Debug, Default, Clone)]
pub struct Names {
    index: HashMap<EcoString, FieldId>,
    names: Vec<EcoString>,
}

impl Names {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> FieldId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = FieldId(self.names.len() as u32);
        let name = EcoString::from(name);
        self.names.push(name.clone());
        self.index.insert(name, id);
        id
    }

    pub fn get(&self, name: &str) -> Option<FieldId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: FieldId) -> &str {
        self.names
            .get(id.0 as usize)
            .map(|name| name.as_str())
            .unwrap_or("?")
    }

    /// Human readable form of an id, as used in paths and dumps.
    pub fn display(&self, id: Id) -> EcoString {
        match id {
            Id::Name(name) => self.name(name).into(),
            Id::Ordinal(n) | Id::Serial(n) => ecow::eco_format!("{n}"),
            Id::Meta(meta) => ecow::eco_format!("^{}", meta.as_str()),
            Id::Version(n) => ecow::eco_format!("v{n}"),
        }
    }
}
