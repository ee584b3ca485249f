//! Error types for STEP import.

use thiserror::Error;

/// Errors that can occur while reading a STEP file.
#[derive(Error, Debug)]
pub enum StepError {
    /// I/O error reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed token.
    #[error("lexer error at line {line}, column {col}: {message}")]
    Lexer {
        /// Line number (1-indexed).
        line: usize,
        /// Column number (1-indexed).
        col: usize,
        /// Error message.
        message: String,
    },

    /// Unexpected token or malformed structure.
    #[error("parser error at line {line}: {message}")]
    Parser {
        /// Line of the offending token (0 at end of input).
        line: usize,
        /// Error message.
        message: String,
    },

    /// A required argument is missing or has the wrong kind.
    #[error("bad argument {index} of #{entity_id} {type_name}: expected {expected}")]
    Argument {
        /// Entity holding the argument.
        entity_id: u64,
        /// Entity type name.
        type_name: String,
        /// Zero-based argument index.
        index: usize,
        /// What was expected there.
        expected: &'static str,
    },

    /// Reference to an entity that is not defined in the DATA section.
    #[error("missing entity reference: #{0}")]
    MissingEntity(u64),

    /// Entity has a different type than its use requires.
    #[error("entity #{id}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Entity ID.
        id: u64,
        /// Expected type name(s).
        expected: String,
        /// Actual type name.
        actual: String,
    },

    /// Degenerate geometry such as a zero-length direction.
    #[error("invalid geometry in #{id}: {message}")]
    InvalidGeometry {
        /// Entity ID.
        id: u64,
        /// What is wrong.
        message: String,
    },

    /// The DATA section holds no solid, shell, or surface model.
    #[error("no shapes found in STEP file")]
    NoShapes,
}

impl StepError {
    /// Create a lexer error.
    pub fn lexer(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self::Lexer {
            line,
            col,
            message: message.into(),
        }
    }

    /// Create a parser error.
    pub fn parser(line: usize, message: impl Into<String>) -> Self {
        Self::Parser {
            line,
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(id: u64, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            id,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid geometry error.
    pub fn geometry(id: u64, message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            id,
            message: message.into(),
        }
    }
}
