//! Non-fatal build issues and the per-file diagnostics report.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Malformed markup in one file. Recovered locally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Diagnostic {
    #[error("{path}:{line}: parse error: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("{path}:{line}: extraction warning for '{title}': {message}")]
    Extraction {
        path: String,
        line: usize,
        title: String,
        message: String,
    },

    #[error("{path}:{line}: ambiguous reference '{target}' ({} candidates: {})", .candidates.len(), .candidates.join(", "))]
    AmbiguousReference {
        path: String,
        line: usize,
        target: String,
        /// `page#anchor (kind)` of every candidate, default first.
        candidates: Vec<String>,
    },

    #[error("{path}:{line}: broken reference '{target}'")]
    BrokenReference {
        path: String,
        line: usize,
        target: String,
    },

    #[error("{path}: excluded: {error}")]
    FatalLoad { path: String, error: String },
}

impl Diagnostic {
    pub fn parse(path: &str, err: &ParseError) -> Self {
        Diagnostic::Parse {
            path: path.to_string(),
            line: err.line,
            message: err.message.clone(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Diagnostic::Parse { path, .. }
            | Diagnostic::Extraction { path, .. }
            | Diagnostic::AmbiguousReference { path, .. }
            | Diagnostic::BrokenReference { path, .. }
            | Diagnostic::FatalLoad { path, .. } => path,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Diagnostic::Parse { line, .. }
            | Diagnostic::Extraction { line, .. }
            | Diagnostic::AmbiguousReference { line, .. }
            | Diagnostic::BrokenReference { line, .. } => *line,
            Diagnostic::FatalLoad { .. } => 0,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Diagnostic::Parse { .. } => "parse_errors",
            Diagnostic::Extraction { .. } => "extraction_warnings",
            Diagnostic::AmbiguousReference { .. } => "ambiguous_references",
            Diagnostic::BrokenReference { .. } => "broken_references",
            Diagnostic::FatalLoad { .. } => "excluded_files",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: String,
    pub issues: Vec<Diagnostic>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub files: Vec<FileReport>,
    pub summary: BTreeMap<&'static str, usize>,
}

impl Report {
    /// Group diagnostics per file, sorted by path then line.
    pub fn new(mut diagnostics: Vec<Diagnostic>) -> Self {
        diagnostics.sort_by(|a, b| {
            a.path()
                .cmp(b.path())
                .then(a.line().cmp(&b.line()))
                .then_with(|| a.to_string().cmp(&b.to_string()))
        });

        let mut summary: BTreeMap<&'static str, usize> = [
            "parse_errors",
            "extraction_warnings",
            "ambiguous_references",
            "broken_references",
            "excluded_files",
        ]
        .into_iter()
        .map(|label| (label, 0))
        .collect();

        let mut files: Vec<FileReport> = Vec::new();
        for diag in diagnostics {
            *summary.entry(diag.label()).or_default() += 1;
            match files.last_mut() {
                Some(file) if file.path == diag.path() => file.issues.push(diag),
                _ => files.push(FileReport {
                    path: diag.path().to_string(),
                    issues: vec![diag],
                }),
            }
        }

        Report { files, summary }
    }

    pub fn total(&self) -> usize {
        self.summary.values().sum()
    }
}
