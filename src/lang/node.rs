use super::value::{Identifier, Value};

/// Right-hand side of an assignment.
///
/// Operands are always plain values; the language has no nested
/// expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// `a`
    Value(Value),

    /// `a + b`
    Plus(Value, Value),

    /// `a - b`
    Minus(Value, Value),

    /// `a * b`
    Times(Value, Value),

    /// `a / b`, truncating toward zero. Division by zero yields 0.
    Div(Value, Value),

    /// `a % b`, remainder with the sign of `a`. Modulo by zero yields 0.
    Mod(Value, Value),
}

/// Comparison used by conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `=`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessEq,
    /// `>=`
    GreaterEq,
}

impl Relation {
    pub fn symbol(self) -> &'static str {
        match self {
            Relation::Eq => "=",
            Relation::Neq => "!=",
            Relation::Less => "<",
            Relation::Greater => ">",
            Relation::LessEq => "<=",
            Relation::GreaterEq => ">=",
        }
    }

    /// Truth table of the relation over `(left, right)`.
    pub fn holds(self, left: i64, right: i64) -> bool {
        match self {
            Relation::Eq => left == right,
            Relation::Neq => left != right,
            Relation::Less => left < right,
            Relation::Greater => left > right,
            Relation::LessEq => left <= right,
            Relation::GreaterEq => left >= right,
        }
    }
}

/// `left <relation> right`; evaluates to 1 or 0 in the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub relation: Relation,
    pub left: Value,
    pub right: Value,
    pub line: usize,
}

/// Executable statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ───────────────────────────── Data flow ─────────────────────────────
    /// `target := expression;`
    Assign {
        target: Identifier,
        expression: Expression,
        line: usize,
    },

    /// `READ target;`
    Read { target: Identifier, line: usize },

    /// `WRITE value;`
    Write { value: Value, line: usize },

    // ──────────────────────────── Control flow ───────────────────────────
    /// `IF condition THEN ... [ELSE ...] ENDIF`
    If {
        condition: Condition,
        then_branch: Vec<Command>,
        else_branch: Option<Vec<Command>>,
        line: usize,
    },

    /// Pre-tested loop: `WHILE condition DO ... ENDWHILE`
    While {
        condition: Condition,
        body: Vec<Command>,
        line: usize,
    },

    /// Post-tested loop: `DO ... WHILE condition ENDDO`.
    ///
    /// The body runs at least once and repeats while the condition holds.
    DoWhile {
        body: Vec<Command>,
        condition: Condition,
        line: usize,
    },

    /// Counted loop: `FOR iterator FROM from TO|DOWNTO to DO ... ENDFOR`.
    ///
    /// Both bounds are inclusive and evaluated once, before the first
    /// iteration. The iterator is read-only inside the body.
    For {
        iterator: String,
        from: Value,
        to: Value,
        descending: bool,
        body: Vec<Command>,
        line: usize,
    },
}

impl Command {
    pub fn line(&self) -> usize {
        match self {
            Command::Assign { line, .. }
            | Command::Read { line, .. }
            | Command::Write { line, .. }
            | Command::If { line, .. }
            | Command::While { line, .. }
            | Command::DoWhile { line, .. }
            | Command::For { line, .. } => *line,
        }
    }
}

/// Deepest nesting of counted loops in `commands`.
///
/// Each nesting level owns one bookkeeping slot, so this is the number of
/// slots the declarations must reserve.
pub fn for_depth(commands: &[Command]) -> usize {
    commands
        .iter()
        .map(|command| match command {
            Command::For { body, .. } => 1 + for_depth(body),
            Command::If {
                then_branch,
                else_branch,
                ..
            } => for_depth(then_branch).max(else_branch.as_deref().map_or(0, for_depth)),
            Command::While { body, .. } | Command::DoWhile { body, .. } => for_depth(body),
            Command::Assign { .. } | Command::Read { .. } | Command::Write { .. } => 0,
        })
        .max()
        .unwrap_or(0)
}

/// A single entry of the `DECLARE` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// `x`
    Scalar { name: String, line: usize },

    /// `t(lower:upper)`, both bounds inclusive.
    Array {
        name: String,
        lower: i64,
        upper: i64,
        line: usize,
    },
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Scalar { name, .. } | Declaration::Array { name, .. } => name,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Declaration::Scalar { line, .. } | Declaration::Array { line, .. } => *line,
        }
    }
}
