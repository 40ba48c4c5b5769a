use std::fmt;

/// How an identifier reaches its storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Plain scalar: `x`.
    Scalar,

    /// Array element with an index known at compile time: `t(5)`.
    ConstIndex(i64),

    /// Array element indexed by another scalar: `t(i)`.
    VarIndex(String),
}

/// A reference to a declared name, as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub access: Access,
    pub line: usize,
}

impl Identifier {
    pub fn scalar(name: impl Into<String>, line: usize) -> Self {
        Identifier {
            name: name.into(),
            access: Access::Scalar,
            line,
        }
    }

    pub fn const_index(name: impl Into<String>, index: i64, line: usize) -> Self {
        Identifier {
            name: name.into(),
            access: Access::ConstIndex(index),
            line,
        }
    }

    pub fn var_index(name: impl Into<String>, index: impl Into<String>, line: usize) -> Self {
        Identifier {
            name: name.into(),
            access: Access::VarIndex(index.into()),
            line,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.access {
            Access::Scalar => write!(f, "{}", self.name),
            Access::ConstIndex(i) => write!(f, "{}({})", self.name, i),
            Access::VarIndex(i) => write!(f, "{}({})", self.name, i),
        }
    }
}

/// Operand of an expression, condition, loop bound or `WRITE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Integer literal.
    Number(i64),

    /// Read of a declared identifier.
    Identifier(Identifier),
}

impl Value {
    pub fn is_const(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// The literal, if this value is a compile-time constant.
    pub fn constant(&self) -> Option<i64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Identifier(_) => None,
        }
    }

    /// The identifier this value reads, if it is not a constant.
    pub fn identifier(&self) -> Option<&Identifier> {
        match self {
            Value::Number(_) => None,
            Value::Identifier(id) => Some(id),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Identifier(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_value() {
        let v = Value::Number(-7);
        assert!(v.is_const());
        assert_eq!(v.constant(), Some(-7));
        assert!(v.identifier().is_none());
    }

    #[test]
    fn test_identifier_value() {
        let v = Value::Identifier(Identifier::var_index("t", "i", 3));
        assert!(!v.is_const());
        assert_eq!(v.constant(), None);
        assert_eq!(v.identifier().map(|id| id.name.as_str()), Some("t"));
        assert_eq!(v.to_string(), "t(i)");
    }
}
