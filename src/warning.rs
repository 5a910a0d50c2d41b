use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Unrecognized characters, unterminated literals or comments.
    Lex,
    /// A statement that could not be fully understood and was skipped.
    Parse,
    /// A dataset or file read before any `DATA` statement named a target.
    OrphanReference,
}

/// An anomaly found while scanning or parsing a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: WarningKind,
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: WarningKind, line: u32, col: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            col,
            message: message.into(),
        }
    }

    pub fn into_warning(self, file: &str) -> Warning {
        Warning {
            file: file.to_owned(),
            line: self.line,
            col: self.col,
            kind: self.kind,
            message: self.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Warning {
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub kind: WarningKind,
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} line: {}, col: {}] {} warning: {}",
            self.file, self.line, self.col, self.kind, self.message
        )
    }
}
