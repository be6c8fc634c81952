// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::lexer::Span;

use core::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// Declared shape of a value whose instance keys are not yet known.
/// Selects the remediation guidance given to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnknownShape {
    Set,
    Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    // for_each argument problems.
    Null,
    Sensitive,
    Unknown(UnknownShape),
    WrongType,
    SetElementType,
    SetNullElement,

    // count argument problems.
    CountNull,
    CountUnknown,
    CountType,
    CountNegative,

    /// count and for_each declared on the same block.
    ConflictingArguments,

    /// The expression itself failed to evaluate.
    Expression,
    InvalidReference,
    UndeclaredReference,

    /// The surrounding operation was cancelled before a result was reached.
    Cancelled,
}

/// Structured cause flags so that callers can branch without parsing text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extra {
    pub caused_by_sensitive: bool,
    pub caused_by_unknown: bool,
}

impl Extra {
    pub fn caused_by_sensitive() -> Extra {
        Extra {
            caused_by_sensitive: true,
            caused_by_unknown: false,
        }
    }

    pub fn caused_by_unknown() -> Extra {
        Extra {
            caused_by_sensitive: false,
            caused_by_unknown: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub summary: String,
    pub detail: String,
    pub subject: Option<Span>,
    pub extra: Extra,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, summary: &str, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            summary: summary.to_string(),
            detail: detail.into(),
            subject: None,
            extra: Extra::default(),
        }
    }

    pub fn with_subject(mut self, span: &Span) -> Self {
        self.subject = Some(span.clone());
        self
    }

    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extra = extra;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.severity.to_string();
        match &self.subject {
            Some(span) => write!(f, "{}", span.message(&kind, &self.summary))?,
            None => write!(f, "{kind}: {}", self.summary)?,
        }
        if !self.detail.is_empty() {
            write!(f, "\n\n{}", self.detail)?;
        }
        Ok(())
    }
}

/// Ordered accumulator of diagnostics. Evaluation never aborts on the first
/// problem; callers merge diagnostics from many evaluations and decide
/// when to stop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.items.push(diag);
    }

    pub fn append(&mut self, mut other: Diagnostics) {
        self.items.append(&mut other.items);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn kinds(&self) -> Vec<DiagnosticKind> {
        self.items.iter().map(|d| d.kind).collect()
    }

    /// Converts error diagnostics into a single error for callers that
    /// want to stop here.
    pub fn err(&self) -> Result<()> {
        match self.has_errors() {
            false => Ok(()),
            true => Err(anyhow!("{self}")),
        }
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diag: Diagnostic) -> Self {
        Self { items: vec![diag] }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = core::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, d) in self.items.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}
