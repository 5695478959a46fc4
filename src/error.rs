//! Error types.
//!
//! Every failure is local and synchronous: construction errors surface when an
//! expression is built, lowering errors when an expression reaches the CNF
//! backend without a lowering rule, parse errors when reading DIMACS text, and
//! solver errors when the external SAT engine fails. Unsatisfiability is not an
//! error.

use std::fmt;
use std::io;

/// Violation of an operator's operand/attribute contract at construction time.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConstructionError {
    /// Wrong number of operands.
    InvalidArity {
        op: &'static str,
        expected: String,
        actual: usize,
    },
    /// An operand has the wrong valtype or shape.
    InvalidOperand {
        op: &'static str,
        position: usize,
        expected: String,
        actual: String,
    },
    /// An attribute is out of range for the given operands.
    InvalidAttribute {
        op: &'static str,
        attribute: &'static str,
        expected: String,
        actual: String,
    },
    /// A constant value does not belong to its valtype.
    InvalidConstant { valtype: String, value: String },
    /// A variable name is already bound to a different valtype.
    VariableRedeclared {
        name: String,
        existing: String,
        requested: String,
    },
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::InvalidArity { op, expected, actual } => {
                write!(f, "{}: expected {} operands, got {}", op, expected, actual)
            }
            ConstructionError::InvalidOperand {
                op,
                position,
                expected,
                actual,
            } => write!(
                f,
                "{}: operand #{} must be {}, got {}",
                op, position, expected, actual
            ),
            ConstructionError::InvalidAttribute {
                op,
                attribute,
                expected,
                actual,
            } => write!(
                f,
                "{}: attribute `{}` must be {}, got {}",
                op, attribute, expected, actual
            ),
            ConstructionError::InvalidConstant { valtype, value } => {
                write!(f, "constant: value {} does not belong to {}", value, valtype)
            }
            ConstructionError::VariableRedeclared {
                name,
                existing,
                requested,
            } => write!(
                f,
                "variable: `{}` is already declared as {}, cannot redeclare as {}",
                name, existing, requested
            ),
        }
    }
}

impl std::error::Error for ConstructionError {}

/// An expression cannot be brought into a form the CNF backend accepts.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LoweringError {
    /// The operator has no lowering rule and was not decomposed.
    Unsupported { op: &'static str, reason: String },
    /// A root constraint is not boolean.
    NotBoolean { valtype: String },
}

impl fmt::Display for LoweringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoweringError::Unsupported { op, reason } => {
                write!(f, "{}: cannot lower to CNF: {}", op, reason)
            }
            LoweringError::NotBoolean { valtype } => {
                write!(f, "constraint must be bool, got {}", valtype)
            }
        }
    }
}

impl std::error::Error for LoweringError {}

/// Malformed DIMACS input, located at a 1-based line and column.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ParseErrorKind {
    /// A token that is not a valid integer (or not the expected keyword).
    InvalidToken { token: String, expected: &'static str },
    /// The `p cnf` line is missing.
    MissingProblemLine,
    /// A second `p` line.
    DuplicateProblemLine,
    /// A clause appears before the `p cnf` line.
    ClauseBeforeProblemLine,
    /// The problem line has too few or too many fields.
    MalformedProblemLine,
    /// The input ends inside a clause (no terminating `0`).
    UnterminatedClause,
    /// The declared variable count is smaller than the largest variable used.
    VariableCountMismatch { declared: usize, used: usize },
    /// The declared clause count differs from the number of parsed clauses.
    ClauseCountMismatch { declared: usize, parsed: usize },
}

impl ParseError {
    pub fn new(line: usize, column: usize, kind: ParseErrorKind) -> Self {
        Self { line, column, kind }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::InvalidToken { token, expected } => {
                write!(f, "invalid token `{}`, expected {}", token, expected)
            }
            ParseErrorKind::MissingProblemLine => write!(f, "missing `p cnf` problem line"),
            ParseErrorKind::DuplicateProblemLine => write!(f, "duplicate problem line"),
            ParseErrorKind::ClauseBeforeProblemLine => write!(f, "clause before the problem line"),
            ParseErrorKind::MalformedProblemLine => {
                write!(f, "problem line must be `p cnf <variables> <clauses>`")
            }
            ParseErrorKind::UnterminatedClause => write!(f, "last clause is not terminated by 0"),
            ParseErrorKind::VariableCountMismatch { declared, used } => write!(
                f,
                "declared {} variables, but variable {} is used",
                declared, used
            ),
            ParseErrorKind::ClauseCountMismatch { declared, parsed } => write!(
                f,
                "declared {} clauses, but {} clauses were parsed",
                declared, parsed
            ),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.kind)
    }
}

impl std::error::Error for ParseError {}

/// Opaque failure reported by the SAT engine.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SolverError(pub String);

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SAT engine failure: {}", self.0)
    }
}

impl std::error::Error for SolverError {}

/// Umbrella error for the whole pipeline.
#[derive(Debug)]
pub enum Error {
    Construction(ConstructionError),
    Lowering(LoweringError),
    Parse(ParseError),
    Solver(SolverError),
    Io(io::Error),
    /// `solve` was called on a problem that already left the `Unsolved` state.
    AlreadySolved,
}

impl From<ConstructionError> for Error {
    fn from(e: ConstructionError) -> Self {
        Error::Construction(e)
    }
}

impl From<LoweringError> for Error {
    fn from(e: LoweringError) -> Self {
        Error::Lowering(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<SolverError> for Error {
    fn from(e: SolverError) -> Self {
        Error::Solver(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Construction(e) => write!(f, "Construction error: {}", e),
            Error::Lowering(e) => write!(f, "Lowering error: {}", e),
            Error::Parse(e) => write!(f, "Parse error: {}", e),
            Error::Solver(e) => write!(f, "Solver error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::AlreadySolved => write!(f, "problem has already been solved"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Construction(e) => Some(e),
            Error::Lowering(e) => Some(e),
            Error::Parse(e) => Some(e),
            Error::Solver(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::AlreadySolved => None,
        }
    }
}
