//! Insert-time document validation and identifier handling.

use bson::{Bson, Document};

use crate::error::DbError;

/// Validate that a document is storable: no field name at any level
/// contains `.` (dotted names exist only in the path language).
pub fn validate_document(document: &Document) -> Result<(), DbError> {
    for (key, value) in document {
        if key.contains('.') {
            return Err(DbError::DottedFieldName(key.to_string()));
        }
        validate_bson(value)?;
    }
    Ok(())
}

/// Validate a single value, recursing into documents and arrays.
pub fn validate_bson(value: &Bson) -> Result<(), DbError> {
    match value {
        Bson::Document(doc) => validate_document(doc),
        Bson::Array(items) => items.iter().try_for_each(validate_bson),
        _ => Ok(()),
    }
}

/// Prepare a document for insertion: validate field names, ensure the
/// identifier is present (generating an `ObjectId` when absent) and
/// storable, and move it in front of the other fields.
pub fn prepare_for_insert(document: Document, id_field: &str) -> Result<Document, DbError> {
    validate_document(&document)?;

    let id = match document.get(id_field) {
        None => Bson::ObjectId(bson::oid::ObjectId::new()),
        Some(Bson::Null) => {
            return Err(DbError::BadValue(format!("{id_field} cannot be null")));
        }
        Some(Bson::Array(_)) => {
            return Err(DbError::BadValue(format!(
                "{id_field} cannot be an array"
            )));
        }
        Some(id) => id.clone(),
    };

    let mut prepared = Document::new();
    prepared.insert(id_field, id);
    for (key, value) in document {
        if key != id_field {
            prepared.insert(key, value);
        }
    }
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn accepts_plain_documents() {
        assert!(validate_document(&doc! { "a": 1, "b": { "c": [1, { "d": 2 }] } }).is_ok());
    }

    #[test]
    fn rejects_dotted_names_at_any_level() {
        assert!(matches!(
            validate_document(&doc! { "a.b": 1 }),
            Err(DbError::DottedFieldName(_))
        ));
        assert!(matches!(
            validate_document(&doc! { "a": { "b.c": 1 } }),
            Err(DbError::DottedFieldName(_))
        ));
        assert!(matches!(
            validate_document(&doc! { "a": [{ "b.c": 1 }] }),
            Err(DbError::DottedFieldName(_))
        ));
    }

    #[test]
    fn generates_missing_identifier() {
        let prepared = prepare_for_insert(doc! { "x": 1 }, "_id").unwrap();
        assert!(matches!(prepared.get("_id"), Some(Bson::ObjectId(_))));
        assert_eq!(prepared.keys().next().map(|k| k.to_string()).as_deref(), Some("_id"));
    }

    #[test]
    fn moves_identifier_to_front() {
        let prepared = prepare_for_insert(doc! { "x": 1, "_id": 7 }, "_id").unwrap();
        let keys: Vec<String> = prepared.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["_id", "x"]);
    }

    #[test]
    fn rejects_null_and_array_identifiers() {
        assert!(prepare_for_insert(doc! { "_id": Bson::Null }, "_id").is_err());
        assert!(prepare_for_insert(doc! { "_id": [1, 2] }, "_id").is_err());
    }
}
