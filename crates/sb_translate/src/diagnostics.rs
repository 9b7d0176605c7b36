//! Structured records of entities skipped during translation.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

/// Something that was skipped or could not be connected. Every diagnostic is also logged
/// when it is created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Prim path or node name the diagnostic is about.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(path: impl fmt::Display, message: impl Into<String>) -> Self {
        let diagnostic = Self {
            severity: Severity::Warning,
            path: path.to_string(),
            message: message.into(),
        };
        log::warn!("{}", diagnostic);
        diagnostic
    }

    pub fn error(path: impl fmt::Display, message: impl Into<String>) -> Self {
        let diagnostic = Self {
            severity: Severity::Error,
            path: path.to_string(),
            message: message.into(),
        };
        log::error!("{}", diagnostic);
        diagnostic
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
