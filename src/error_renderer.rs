//! Error rendering using ariadne
//!
//! Diagnostics carry byte spans into the text the head was parsed from.
//! These functions print them against that text, with the offending token
//! underlined.

use crate::{Diagnostic, Error, Severity};
use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use std::io::Write;

/// Render an error against `source` to stderr
pub fn render_error(error: &Error, source: &str) {
    render_error_to_writer(error, source, &mut std::io::stderr(), true).ok();
}

/// Render an error to a specific writer
pub fn render_error_to(error: &Error, source: &str, writer: &mut dyn Write) -> std::io::Result<()> {
    render_error_to_writer(error, source, writer, true)
}

/// Render an error to a String (useful for editors, logs, etc.)
pub fn render_error_to_string(error: &Error, source: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source, &mut buf, true).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Render an error to a String without color codes (useful for tests)
pub fn render_error_to_string_no_color(error: &Error, source: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_error_to_writer(
    error: &Error,
    source: &str,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    match error {
        Error::Compilation { diagnostics } => {
            render_diagnostics(source, diagnostics, writer, use_color)
        }
        Error::Crash { diagnostic } => {
            render_diagnostics(source, std::slice::from_ref(diagnostic), writer, use_color)
        }
        Error::ResourceExceeded(msg) => writeln!(writer, "Resource limit exceeded: {}", msg),
        Error::Api(msg) => writeln!(writer, "API error: {}", msg),
        Error::Internal(msg) => writeln!(writer, "Internal error: {}", msg),
    }
}

fn render_diagnostics(
    source: &str,
    diagnostics: &[Diagnostic],
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    for diag in diagnostics {
        let mut colors = ColorGenerator::new();
        colors.next(); // Skip the first color.

        let kind = match diag.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
            Severity::Info => ReportKind::Advice,
        };

        // Items built without source text have no span; point at the start.
        let span = diag
            .span
            .as_ref()
            .map_or(0..0, |span| span.0.start.min(source.len())..span.0.end.min(source.len()));

        let mut report = Report::build(kind, ("<head>", span.clone()))
            .with_message(&diag.message)
            .with_config(ariadne::Config::default().with_color(use_color));

        if let Some(code) = &diag.code {
            report = report.with_code(code);
        }

        if diag.span.is_some() {
            report = report.with_label(
                Label::new(("<head>", span))
                    .with_message(&diag.message)
                    .with_color(colors.next()),
            );
        }

        if let Some(help) = &diag.help {
            report = report.with_help(help);
        }

        report.finish().write(("<head>", Source::from(source)), &mut *writer)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::head::build::*;
    use crate::{EngineOptions, Span, Workspace};

    #[test]
    fn test_render_undefined_name() {
        let source = "a = nowhere";
        let mut workspace = Workspace::new(EngineOptions::default());
        let result =
            workspace.compile(&head([output("a", reference("nowhere")).at(Span::new(4, 11))]));

        let error = result.unwrap_err();
        let output = render_error_to_string_no_color(&error, source);

        assert!(output.contains("Error"));
        assert!(output.contains("a = nowhere"));
    }

    #[test]
    fn test_render_api_error() {
        let workspace = Workspace::new(EngineOptions::default());
        let error = workspace.read("x").unwrap_err();

        let output = render_error_to_string_no_color(&error, "");
        assert!(output.starts_with("API error"));
    }

    #[test]
    fn test_render_unused_let() {
        let source = "b = 2\nlet a = 1";
        let mut workspace = Workspace::new(EngineOptions::default());
        let result = workspace.compile(&head([
            output("b", num(2.0)),
            let_("a", num(1.0)).at(Span::new(6, 15)),
        ]));

        let error = result.unwrap_err();
        assert_eq!(error.code(), Some("subtext::unused_let"));
        let output = render_error_to_string_no_color(&error, source);
        assert!(output.contains("unused let: a"));
        assert!(output.lines().count() > 1);
    }
}
