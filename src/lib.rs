//! Subtext - a live programming language of item trees
//!
//! # Overview
//!
//! A Subtext document is a tree of named items. Inputs hold data; outputs
//! are computed from them by formulas. Edits are made to a document as a
//! whole, and writing to a computed value flows backwards through its
//! formula to the inputs it came from.
//!
//! # Quick Start
//!
//! ```
//! use subtext::{Edit, EngineOptions, Workspace};
//! use subtext::head::build::*;
//!
//! let mut workspace = Workspace::new(EngineOptions::default());
//! workspace
//!     .compile(&head([
//!         input("celsius", num(0.0)),
//!         interface(
//!             "fahrenheit",
//!             code([
//!                 stmt(reference("celsius")),
//!                 stmt(call("*", [num(1.8)])),
//!                 stmt(call("+", [num(32.0)])),
//!             ]),
//!         ),
//!     ]))
//!     .unwrap();
//! assert_eq!(workspace.read("fahrenheit").unwrap(), serde_json::json!(32));
//!
//! workspace.edit(Edit::write("fahrenheit", 212.0)).unwrap();
//! assert_eq!(workspace.read("celsius").unwrap(), serde_json::json!(100));
//! ```
//!
//! # Errors
//!
//! Failures are reported as [`Error`] values carrying [`Diagnostic`]s. The
//! [`render_error`] family prints them against the source text the head was
//! parsed from.

mod error_renderer;

// Re-export public API from subtext_core
pub use subtext_core::api::{
    AnalysisOptions, Diagnostic, Edit, EditOp, EngineOptions, Error, ExecutionOptions, Severity,
    Workspace,
};

pub use subtext_core::head::{self, Head};
pub use subtext_core::stdlib::{self, Builtin, BuiltinRegistry};
pub use subtext_core::span::{Span, Token};

pub use error_renderer::{
    render_error, render_error_to, render_error_to_string, render_error_to_string_no_color,
};
