//! Public API for the Subtext engine.
//!
//! A [`Workspace`] owns the item tree of one document and its history of
//! versions. Compiling a document creates the first version; every edit
//! creates the next one by copying the current version, applying the data
//! changes the edit implies, and analyzing and executing the copy.
//!
//! # Example
//!
//! ```
//! use subtext_core::api::{Edit, EngineOptions, Workspace};
//! use subtext_core::head::build::*;
//!
//! let mut workspace = Workspace::new(EngineOptions::default());
//! workspace
//!     .compile(&head([
//!         input("a", num(1.0)),
//!         output("b", code([stmt(reference("a")), stmt(call("+", [num(1.0)]))])),
//!     ]))
//!     .unwrap();
//! assert_eq!(workspace.read("b").unwrap(), serde_json::json!(2));
//!
//! workspace.edit(Edit::write("a", 5.0)).unwrap();
//! assert_eq!(workspace.read("b").unwrap(), serde_json::json!(6));
//! ```

pub mod edit;
pub mod error;
pub mod options;
pub mod workspace;

pub use edit::{Edit, EditOp};
pub use error::{Diagnostic, Error, Severity};
pub use options::{AnalysisOptions, EngineOptions, ExecutionOptions};
pub use workspace::Workspace;
