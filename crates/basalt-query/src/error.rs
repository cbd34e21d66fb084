use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// A `$` path segment was used without a recorded array match.
    PositionalWithoutMatch,
    UnknownOperator(String),
    InvalidRegex(String),
    BadValue(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::PositionalWithoutMatch => write!(
                f,
                "Cannot apply the positional operator without a corresponding query \
                 field containing an array."
            ),
            QueryError::UnknownOperator(op) => write!(f, "invalid operator: {op}"),
            QueryError::InvalidRegex(msg) => write!(f, "invalid regex pattern: {msg}"),
            QueryError::BadValue(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for QueryError {}
