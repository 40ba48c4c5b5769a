/// Errors raised while generating code.
///
/// Every user-facing variant carries the source line it is reported
/// against. These are recoverable: the generator reports them and keeps
/// going with sibling statements. `Internal` is the exception; it means an
/// invariant of the generator itself broke and aborts generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("duplicate declaration of '{name}': first declared in line {first_line}")]
    DuplicateDeclaration {
        name: String,
        first_line: usize,
        line: usize,
    },

    #[error("'{name}' is not declared")]
    Undeclared { name: String, line: usize },

    #[error("'{name}' is used before being initialized")]
    Uninitialized { name: String, line: usize },

    #[error("loop iterator '{name}' cannot be modified")]
    IteratorAssignment { name: String, line: usize },

    #[error("index {index} out of bounds for array '{name}' ({lower}:{upper})")]
    IndexOutOfBounds {
        name: String,
        index: i64,
        lower: i64,
        upper: i64,
        line: usize,
    },

    #[error("'{name}' is a scalar and cannot be indexed")]
    NotAnArray { name: String, line: usize },

    #[error("array '{name}' must be used with an index")]
    ArrayWithoutIndex { name: String, line: usize },

    #[error("array '{name}' has an empty range ({lower}:{upper})")]
    InvalidArrayRange {
        name: String,
        lower: i64,
        upper: i64,
        line: usize,
    },

    #[error("array '{name}' ({lower}:{upper}) does not fit in memory")]
    ArrayTooLarge {
        name: String,
        lower: i64,
        upper: i64,
        line: usize,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn internal(msg: impl Into<String>) -> Self {
        CompileError::Internal(msg.into())
    }

    /// Fatal errors stop generation instead of being reported.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CompileError::Internal(_))
    }

    /// Source line the error is reported against; `None` for internal errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            CompileError::DuplicateDeclaration { line, .. }
            | CompileError::Undeclared { line, .. }
            | CompileError::Uninitialized { line, .. }
            | CompileError::IteratorAssignment { line, .. }
            | CompileError::IndexOutOfBounds { line, .. }
            | CompileError::NotAnArray { line, .. }
            | CompileError::ArrayWithoutIndex { line, .. }
            | CompileError::InvalidArrayRange { line, .. }
            | CompileError::ArrayTooLarge { line, .. } => Some(*line),
            CompileError::Internal(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message_names_first_line() {
        let err = CompileError::DuplicateDeclaration {
            name: "x".to_string(),
            first_line: 2,
            line: 5,
        };
        assert_eq!(
            err.to_string(),
            "duplicate declaration of 'x': first declared in line 2"
        );
        assert_eq!(err.line(), Some(5));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_internal_is_fatal() {
        let err = CompileError::internal("unbound label");
        assert!(err.is_fatal());
        assert_eq!(err.line(), None);
        assert_eq!(err.to_string(), "internal error: unbound label");
    }
}
