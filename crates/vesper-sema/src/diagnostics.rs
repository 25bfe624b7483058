//! Ariadne-based rendering of analyzer errors.
//!
//! Renders [`SemaError`] values into labeled, coded diagnostics. A
//! colorless mode keeps test output deterministic; a JSON mode emits one
//! machine-readable object per diagnostic for tooling consumers.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use vesper_common::LineIndex;

use crate::error::{SemaError, SemaErrorKind};

/// Rendering options.
#[derive(Debug, Clone)]
pub struct DiagnosticOptions {
    pub color: bool,
    pub json: bool,
}

impl DiagnosticOptions {
    /// Colorless text output, for deterministic snapshots.
    pub fn colorless() -> Self {
        DiagnosticOptions {
            color: false,
            json: false,
        }
    }

    /// One-line JSON output per diagnostic.
    pub fn json_mode() -> Self {
        DiagnosticOptions {
            color: false,
            json: true,
        }
    }
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        DiagnosticOptions {
            color: true,
            json: false,
        }
    }
}

/// Render one error against its source text.
pub fn render_diagnostic(
    error: &SemaError,
    source: &str,
    filename: &str,
    options: &DiagnosticOptions,
) -> String {
    if options.json {
        return render_json(error, source, filename);
    }

    let config = Config::default().with_color(options.color);
    let source_len = source.len();
    let clamp = |r: Range<usize>| -> Range<usize> {
        let start = r.start.min(source_len);
        let end = r.end.min(source_len).max(start);
        if start == end {
            start..end.saturating_add(1).min(source_len)
        } else {
            start..end
        }
    };
    let span = clamp(error.span.start as usize..error.span.end as usize);

    let mut builder = Report::build(ReportKind::Error, span.clone())
        .with_code(error.code())
        .with_message(format!("{}", error.kind))
        .with_config(config)
        .with_label(
            Label::new(span)
                .with_message(primary_label(&error.kind))
                .with_color(Color::Red),
        );
    if let Some(help) = help_text(&error.kind) {
        builder.set_help(help);
    }
    let report = builder.finish();

    let mut buf = Vec::new();
    report
        .write(Source::from(source), &mut buf)
        .expect("failed to write diagnostic");
    String::from_utf8(buf).expect("diagnostic output should be valid UTF-8")
}

/// Render every error in order.
pub fn render_all(
    errors: &[SemaError],
    source: &str,
    filename: &str,
    options: &DiagnosticOptions,
) -> Vec<String> {
    errors
        .iter()
        .map(|e| render_diagnostic(e, source, filename, options))
        .collect()
}

fn render_json(error: &SemaError, source: &str, filename: &str) -> String {
    let index = LineIndex::new(source);
    let (line, col) = index.line_col(error.span.start);
    let value = serde_json::json!({
        "code": error.code(),
        "severity": "error",
        "message": format!("{}", error.kind),
        "file": if error.file.is_empty() { filename } else { error.file.as_str() },
        "span": { "start": error.span.start, "end": error.span.end },
        "line": line,
        "column": col,
    });
    value.to_string()
}

fn primary_label(kind: &SemaErrorKind) -> String {
    match kind {
        SemaErrorKind::UndeclaredIdent { name } => format!("`{}` is not defined", name),
        SemaErrorKind::UnknownType { name } => format!("`{}` is not a known type", name),
        SemaErrorKind::Mismatch { expected, .. } => format!("expected `{}`", expected),
        SemaErrorKind::OccursCheck { .. } => "recursive type here".to_string(),
        SemaErrorKind::NotCallable { ty } => format!("`{}` cannot be called", ty),
        SemaErrorKind::NoInstance { trait_name, .. } => {
            format!("no `{}` instance", trait_name)
        }
        SemaErrorKind::NoSuchField { field, .. } => format!("no field `{}`", field),
        SemaErrorKind::PendingReturnContext { .. } => {
            "return type cannot be determined here".to_string()
        }
        other => format!("{}", other),
    }
}

fn help_text(kind: &SemaErrorKind) -> Option<String> {
    match kind {
        SemaErrorKind::OccursCheck { .. } => {
            Some("a value cannot have a type that refers to itself".to_string())
        }
        SemaErrorKind::PendingReturnContext { method } => Some(format!(
            "annotate the binding so the result type of `{}` is known",
            method
        )),
        SemaErrorKind::NoInstance {
            trait_name,
            ty_names,
        } => Some(format!(
            "define an instance of `{}` for `{}`",
            trait_name,
            ty_names.join(", ")
        )),
        SemaErrorKind::AssignToConstant { .. } => {
            Some("constants are define-once; bind a new name instead".to_string())
        }
        _ => None,
    }
}
