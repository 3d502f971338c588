//! Core of the Subtext engine.
//!
//! A Subtext document is a tree of items. Each item holds a value and
//! optionally a formula computing it; formulas are references, code blocks,
//! calls, loops over arrays, and a few structural operations. A document is
//! compiled in two passes over the same tree: analysis binds names and
//! checks the program against prototype values, then execution computes the
//! real ones. Edits write values back through formulas to the data they came
//! from, producing a new version of the document.

pub mod api;
pub(crate) mod driver;
pub mod evaluator;
pub mod head;
pub mod span;
pub mod stdlib;
pub mod tree;
pub(crate) mod update;
