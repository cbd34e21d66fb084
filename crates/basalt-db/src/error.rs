use std::fmt;

use basalt_query::QueryError;
use basalt_store::StoreError;
use bson::Bson;

/// Collection-level error carrying the wire-compatible numeric code
/// where one exists.
#[derive(Debug)]
pub enum DbError {
    /// Unknown update operator. Code 10147.
    InvalidModifier(String),
    /// A mutating operator targeted the identifier field. Code 10148.
    ModOnIdNotAllowed(String),
    /// A modified field name starts with `$`. Code 15896.
    DollarInFieldName,
    /// A replacement document carries a different identifier. Code 13596.
    CannotChangeId {
        id_field: String,
        old: Bson,
        new: Bson,
    },
    /// Multi-update with a non-operator update document. Code 10158.
    MultiUpdateRequiresOperators,
    /// `$` path segment without a recorded array match. Code 16650.
    PositionalWithoutMatch,
    /// Array modifier applied to a non-array value. Codes 10141/10142/10143
    /// for the push, pull and pop families respectively.
    NonArrayTarget { modifier: String, code: i32 },
    /// `$pushAll`/`$pullAll` operand is not an array. Code 10153.
    ArrayOnlyModifier(String),
    /// Malformed `$currentDate` type specification. Code 2.
    InvalidCurrentDateType(String),
    /// Unique-index collision. Code 11000.
    DuplicateKey { index: String, key: Bson },
    /// Update document mixes `$`-operators and plain fields.
    IllegalUpdate(String),
    /// A stored field name contains `.`.
    DottedFieldName(String),
    /// Plain server error without a numeric code.
    BadValue(String),
    Internal(String),
    Serialization(String),
    Store(StoreError),
    Query(QueryError),
}

impl DbError {
    /// The numeric error code consumed by the wire layer, where the
    /// original server assigns one.
    pub fn code(&self) -> Option<i32> {
        match self {
            DbError::InvalidCurrentDateType(_) => Some(2),
            DbError::NonArrayTarget { code, .. } => Some(*code),
            DbError::InvalidModifier(_) => Some(10147),
            DbError::ModOnIdNotAllowed(_) => Some(10148),
            DbError::ArrayOnlyModifier(_) => Some(10153),
            DbError::MultiUpdateRequiresOperators => Some(10158),
            DbError::DuplicateKey { .. } => Some(11000),
            DbError::CannotChangeId { .. } => Some(13596),
            DbError::DollarInFieldName => Some(15896),
            DbError::PositionalWithoutMatch => Some(16650),
            _ => None,
        }
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::InvalidModifier(modifier) => {
                write!(f, "Invalid modifier specified: {modifier}")
            }
            DbError::ModOnIdNotAllowed(id_field) => write!(f, "Mod on {id_field} not allowed"),
            DbError::DollarInFieldName => {
                write!(f, "Modified field name may not start with $")
            }
            DbError::CannotChangeId { id_field, old, new } => write!(
                f,
                "cannot change {id_field} of a document old:{{ {id_field}: {old} }} new:{{ {id_field}: {new} }}"
            ),
            DbError::MultiUpdateRequiresOperators => {
                write!(f, "multi update only works with $ operators")
            }
            DbError::PositionalWithoutMatch => write!(
                f,
                "Cannot apply the positional operator without a corresponding query \
                 field containing an array."
            ),
            DbError::NonArrayTarget { modifier, .. } => {
                write!(f, "Cannot apply {modifier} modifier to non-array")
            }
            DbError::ArrayOnlyModifier(modifier) => {
                write!(f, "Modifier {modifier} allowed for arrays only")
            }
            DbError::InvalidCurrentDateType(msg) => write!(f, "{msg}"),
            DbError::DuplicateKey { index, key } => {
                write!(f, "E11000 duplicate key error index: {index}  dup key: {{ : {key} }}")
            }
            DbError::IllegalUpdate(update) => write!(f, "illegal update: {update}"),
            DbError::DottedFieldName(name) => {
                write!(f, "field name '{name}' must not contain '.'")
            }
            DbError::BadValue(msg) => write!(f, "{msg}"),
            DbError::Internal(msg) => write!(f, "internal error: {msg}"),
            DbError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            DbError::Store(e) => write!(f, "store error: {e}"),
            DbError::Query(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<StoreError> for DbError {
    fn from(e: StoreError) -> Self {
        DbError::Store(e)
    }
}

impl From<QueryError> for DbError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::PositionalWithoutMatch => DbError::PositionalWithoutMatch,
            other => DbError::Query(other),
        }
    }
}

impl From<bson::error::Error> for DbError {
    fn from(e: bson::error::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_wire_protocol() {
        assert_eq!(DbError::InvalidCurrentDateType("x".into()).code(), Some(2));
        assert_eq!(DbError::InvalidModifier("$foo".into()).code(), Some(10147));
        assert_eq!(DbError::ModOnIdNotAllowed("_id".into()).code(), Some(10148));
        assert_eq!(DbError::ArrayOnlyModifier("$pullAll".into()).code(), Some(10153));
        assert_eq!(DbError::MultiUpdateRequiresOperators.code(), Some(10158));
        assert_eq!(DbError::DollarInFieldName.code(), Some(15896));
        assert_eq!(DbError::PositionalWithoutMatch.code(), Some(16650));
        assert_eq!(
            DbError::NonArrayTarget {
                modifier: "$push".into(),
                code: 10141
            }
            .code(),
            Some(10141)
        );
        assert_eq!(
            DbError::CannotChangeId {
                id_field: "_id".into(),
                old: Bson::Int32(1),
                new: Bson::Int32(2)
            }
            .code(),
            Some(13596)
        );
        assert_eq!(DbError::BadValue("x".into()).code(), None);
    }

    #[test]
    fn positional_query_error_maps_to_coded_variant() {
        let err: DbError = QueryError::PositionalWithoutMatch.into();
        assert_eq!(err.code(), Some(16650));
    }
}
