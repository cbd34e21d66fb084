//! Predicate evaluation: does a document match a query document?
//!
//! A query is a conjunction of (path, predicate) clauses plus the logical
//! combinators `$and`, `$or`, `$nor`. Predicates are either literal values
//! (equality, with array-contains semantics), operator documents, or
//! regular expressions.
//!
//! When a clause succeeds by traversing an array, the index of the
//! matching element is recorded as the match position; the update engine
//! uses it to resolve positional `$` path segments.

use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::Regex;

use crate::error::QueryError;
use crate::value;

/// Evaluate `query` against `document`.
pub fn matches(document: &Document, query: &Document) -> Result<bool, QueryError> {
    let mut last = None;
    check_query(document, query, &mut last)
}

/// Evaluate `query` against `document` and return the match position:
/// the array index that satisfied the first array-traversing clause.
/// `None` when the document does not match or no clause traversed an
/// array.
pub fn match_position(
    document: &Document,
    query: &Document,
) -> Result<Option<usize>, QueryError> {
    let mut last = None;
    if check_query(document, query, &mut last)? {
        Ok(last)
    } else {
        Ok(None)
    }
}

#[derive(Clone, Copy)]
enum NodeRef<'a> {
    Doc(&'a Document),
    Arr(&'a Vec<Bson>),
}

fn as_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn record(last: &mut Option<usize>, index: usize) {
    if last.is_none() {
        *last = Some(index);
    }
}

fn is_expression(doc: &Document) -> bool {
    doc.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn check_query(
    document: &Document,
    query: &Document,
    last: &mut Option<usize>,
) -> Result<bool, QueryError> {
    for (key, predicate) in query {
        if !check_clause(predicate, key, NodeRef::Doc(document), last)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn check_clause(
    predicate: &Bson,
    key: &str,
    node: NodeRef<'_>,
    last: &mut Option<usize>,
) -> Result<bool, QueryError> {
    if matches!(key, "$and" | "$or" | "$nor") {
        if let NodeRef::Doc(doc) = node {
            return check_logical(key, predicate, doc, last);
        }
    }

    if let Some((main, sub)) = key.split_once('.') {
        // Implicit traversal: a non-index segment against an array matches
        // any document element on the full remaining path.
        if let NodeRef::Arr(arr) = node {
            if as_index(main).is_none() {
                return check_any_document(predicate, key, arr, last);
            }
        }
        let child = match &node {
            NodeRef::Doc(doc) => doc.get(main),
            NodeRef::Arr(arr) => as_index(main).and_then(|i| arr.get(i)),
        };
        return match child {
            Some(Bson::Document(doc)) => check_clause(predicate, sub, NodeRef::Doc(doc), last),
            Some(Bson::Array(arr)) => check_clause(predicate, sub, NodeRef::Arr(arr), last),
            // Path runs into a scalar or nothing: the value is missing.
            _ => check_matches_value(predicate, None, false, last),
        };
    }

    match node {
        NodeRef::Doc(doc) => {
            let value = doc.get(key);
            let exists = doc.contains_key(key);
            check_terminal(predicate, value, exists, last)
        }
        NodeRef::Arr(arr) => match as_index(key) {
            Some(index) => {
                let value = arr.get(index);
                check_terminal(predicate, value, value.is_some(), last)
            }
            // Non-numeric segment against an array: match any document
            // element, recording the position of the first hit.
            None => check_any_document(predicate, key, arr, last),
        },
    }
}

fn check_any_document(
    predicate: &Bson,
    key: &str,
    elements: &[Bson],
    last: &mut Option<usize>,
) -> Result<bool, QueryError> {
    for (index, element) in elements.iter().enumerate() {
        if let Bson::Document(doc) = element {
            if check_clause(predicate, key, NodeRef::Doc(doc), last)? {
                record(last, index);
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Terminal clause evaluation: try array elements first (where the
/// predicate allows it), then the whole value.
fn check_terminal(
    predicate: &Bson,
    value: Option<&Bson>,
    exists: bool,
    last: &mut Option<usize>,
) -> Result<bool, QueryError> {
    if let Some(Bson::Array(elements)) = value {
        if !whole_value_only(predicate) {
            for (index, element) in elements.iter().enumerate() {
                if check_matches_value(predicate, Some(element), true, last)? {
                    record(last, index);
                    return Ok(true);
                }
            }
        }
    }
    check_matches_value(predicate, value, exists, last)
}

/// Predicates whose semantics are defined over the whole array value:
/// element-wise evaluation would invert or double-count them.
fn whole_value_only(predicate: &Bson) -> bool {
    match predicate {
        Bson::Document(doc) if is_expression(doc) => doc.keys().any(|k| {
            matches!(&k[..], "$ne" | "$nin" | "$not" | "$all" | "$size" | "$elemMatch")
        }),
        _ => false,
    }
}

fn check_matches_value(
    predicate: &Bson,
    value: Option<&Bson>,
    exists: bool,
    last: &mut Option<usize>,
) -> Result<bool, QueryError> {
    match predicate {
        Bson::Document(doc) if is_expression(doc) => {
            check_expression_doc(doc, value, exists, last)
        }
        Bson::RegularExpression(re) => regex_matches(re.pattern.as_str(), re.options.as_str(), value),
        _ => Ok(value::equals_opt(Some(predicate), value)),
    }
}

fn check_expression_doc(
    expression: &Document,
    value: Option<&Bson>,
    exists: bool,
    last: &mut Option<usize>,
) -> Result<bool, QueryError> {
    if let Some(pattern) = expression.get("$regex") {
        let Bson::String(pattern) = pattern else {
            return Err(QueryError::BadValue("$regex has to be a string".into()));
        };
        let options = match expression.get("$options") {
            Some(Bson::String(options)) => options.as_str(),
            Some(_) => return Err(QueryError::BadValue("$options has to be a string".into())),
            None => "",
        };
        if !regex_matches(pattern, options, value)? {
            return Ok(false);
        }
    } else if expression.contains_key("$options") {
        return Err(QueryError::BadValue("$options without $regex".into()));
    }

    for (operator, operand) in expression {
        if operator == "$regex" || operator == "$options" {
            continue;
        }
        if !check_operator(operator, operand, value, exists, last)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn check_operator(
    operator: &str,
    operand: &Bson,
    value: Option<&Bson>,
    exists: bool,
    last: &mut Option<usize>,
) -> Result<bool, QueryError> {
    match operator {
        "$eq" => Ok(eq_considering_arrays(operand, value)),
        "$ne" => Ok(!eq_considering_arrays(operand, value)),
        "$gt" => check_comparison(operand, value, |o| o == Ordering::Greater),
        "$gte" => check_comparison(operand, value, |o| o != Ordering::Less),
        "$lt" => check_comparison(operand, value, |o| o == Ordering::Less),
        "$lte" => check_comparison(operand, value, |o| o != Ordering::Greater),
        "$in" => {
            let list = operand_array(operator, operand)?;
            Ok(list.iter().any(|e| eq_considering_arrays(e, value)))
        }
        "$nin" => {
            let list = operand_array(operator, operand)?;
            Ok(!list.iter().any(|e| eq_considering_arrays(e, value)))
        }
        "$exists" => Ok(value::is_true(Some(operand)) == exists),
        "$not" => Ok(!check_matches_value(operand, value, exists, last)?),
        "$all" => {
            let required = operand_array(operator, operand)?;
            let Some(Bson::Array(elements)) = value else {
                return Ok(false);
            };
            Ok(required
                .iter()
                .all(|r| elements.iter().any(|e| value::equals(r, e))))
        }
        "$size" => {
            let Some(Bson::Array(elements)) = value else {
                return Ok(false);
            };
            Ok(value::as_f64(operand) == Some(elements.len() as f64))
        }
        "$mod" => check_mod(operand, value),
        "$type" => check_type(operand, value),
        "$elemMatch" => check_elem_match(operand, value, last),
        other => Err(QueryError::UnknownOperator(other.to_string())),
    }
}

/// Equality with array-contains semantics: a value equals the operand
/// directly, or is an array containing an equal element.
fn eq_considering_arrays(operand: &Bson, value: Option<&Bson>) -> bool {
    if value::equals_opt(Some(operand), value) {
        return true;
    }
    match value {
        Some(Bson::Array(elements)) => elements.iter().any(|e| value::equals(operand, e)),
        _ => false,
    }
}

fn check_comparison(
    operand: &Bson,
    value: Option<&Bson>,
    predicate: fn(Ordering) -> bool,
) -> Result<bool, QueryError> {
    match value {
        Some(v) if value::comparable(v, operand) => Ok(predicate(value::compare(v, operand))),
        _ => Ok(false),
    }
}

fn operand_array<'a>(operator: &str, operand: &'a Bson) -> Result<&'a Vec<Bson>, QueryError> {
    match operand {
        Bson::Array(items) => Ok(items),
        _ => Err(QueryError::BadValue(format!("{operator} needs an array"))),
    }
}

fn check_mod(operand: &Bson, value: Option<&Bson>) -> Result<bool, QueryError> {
    let Bson::Array(parts) = operand else {
        return Err(QueryError::BadValue("malformed mod, needs to be an array".into()));
    };
    let (Some(divisor), Some(remainder)) = (
        parts.first().and_then(value::as_f64),
        parts.get(1).and_then(value::as_f64),
    ) else {
        return Err(QueryError::BadValue(
            "malformed mod, divisor and remainder must be numbers".into(),
        ));
    };
    if divisor == 0.0 {
        return Err(QueryError::BadValue("divisor cannot be 0".into()));
    }
    let Some(number) = value.and_then(value::as_f64) else {
        return Ok(false);
    };
    Ok((number as i64) % (divisor as i64) == remainder as i64)
}

fn check_type(operand: &Bson, value: Option<&Bson>) -> Result<bool, QueryError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match operand {
        Bson::String(name) => type_name_matches(name, value),
        n if value::is_number(n) => {
            let code = value::as_f64(n).unwrap_or(0.0) as i32;
            Ok(type_code(value) == code)
        }
        _ => Err(QueryError::BadValue(
            "type must be represented as a number or a string".into(),
        )),
    }
}

fn type_code(value: &Bson) -> i32 {
    match value {
        Bson::Double(_) => 1,
        Bson::String(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Binary(_) => 5,
        Bson::Undefined => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Null => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) => 13,
        Bson::Symbol(_) => 14,
        Bson::JavaScriptCodeWithScope(_) => 15,
        Bson::Int32(_) => 16,
        Bson::Timestamp(_) => 17,
        Bson::Int64(_) => 18,
        Bson::Decimal128(_) => 19,
        Bson::MinKey => -1,
        Bson::MaxKey => 127,
    }
}

fn type_name_matches(name: &str, value: &Bson) -> Result<bool, QueryError> {
    let code = match name {
        "double" => 1,
        "string" => 2,
        "object" => 3,
        "array" => 4,
        "binData" => 5,
        "undefined" => 6,
        "objectId" => 7,
        "bool" => 8,
        "date" => 9,
        "null" => 10,
        "regex" => 11,
        "javascript" => 13,
        "symbol" => 14,
        "int" => 16,
        "timestamp" => 17,
        "long" => 18,
        "decimal" => 19,
        "minKey" => -1,
        "maxKey" => 127,
        "number" => return Ok(value::is_number(value)),
        other => {
            return Err(QueryError::BadValue(format!(
                "unknown type name alias: {other}"
            )));
        }
    };
    Ok(type_code(value) == code)
}

fn check_elem_match(
    operand: &Bson,
    value: Option<&Bson>,
    last: &mut Option<usize>,
) -> Result<bool, QueryError> {
    let Bson::Document(sub_query) = operand else {
        return Err(QueryError::BadValue("$elemMatch needs an Object".into()));
    };
    let Some(Bson::Array(elements)) = value else {
        return Ok(false);
    };
    for (index, element) in elements.iter().enumerate() {
        let matched = if is_expression(sub_query) {
            check_matches_value(operand, Some(element), true, last)?
        } else if let Bson::Document(doc) = element {
            check_query(doc, sub_query, last)?
        } else {
            false
        };
        if matched {
            record(last, index);
            return Ok(true);
        }
    }
    Ok(false)
}

fn check_logical(
    operator: &str,
    operand: &Bson,
    document: &Document,
    last: &mut Option<usize>,
) -> Result<bool, QueryError> {
    let Bson::Array(sub_queries) = operand else {
        return Err(QueryError::BadValue(format!(
            "{operator} expression must be a nonempty array"
        )));
    };
    if sub_queries.is_empty() {
        return Err(QueryError::BadValue(format!(
            "{operator} expression must be a nonempty array"
        )));
    }

    let mut results = Vec::with_capacity(sub_queries.len());
    for sub in sub_queries {
        let Bson::Document(sub_query) = sub else {
            return Err(QueryError::BadValue(format!(
                "{operator} entries need to be full objects"
            )));
        };
        results.push(check_query(document, sub_query, last)?);
    }

    Ok(match operator {
        "$and" => results.iter().all(|m| *m),
        "$or" => results.iter().any(|m| *m),
        _ => !results.iter().any(|m| *m), // $nor
    })
}

fn regex_matches(pattern: &str, options: &str, value: Option<&Bson>) -> Result<bool, QueryError> {
    let Some(Bson::String(subject)) = value else {
        return Ok(false);
    };
    let full_pattern = if options.is_empty() {
        pattern.to_string()
    } else {
        let mut prefix = String::with_capacity(3 + options.len() + pattern.len());
        prefix.push_str("(?");
        for ch in options.chars() {
            match ch {
                'i' | 's' | 'm' | 'x' => prefix.push(ch),
                c => return Err(QueryError::InvalidRegex(format!("unknown option: {c}"))),
            }
        }
        prefix.push(')');
        prefix.push_str(pattern);
        prefix
    };
    let re = Regex::new(&full_pattern).map_err(|e| QueryError::InvalidRegex(e.to_string()))?;
    Ok(re.is_match(subject))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn assert_matches(document: &Document, query: &Document) {
        assert!(matches(document, query).unwrap(), "{query:?} vs {document:?}");
    }

    fn assert_no_match(document: &Document, query: &Document) {
        assert!(!matches(document, query).unwrap(), "{query:?} vs {document:?}");
    }

    // ── equality ────────────────────────────────────────────────

    #[test]
    fn simple_equality() {
        let doc = doc! { "name": "Alice", "age": 30 };
        assert_matches(&doc, &doc! { "name": "Alice" });
        assert_matches(&doc, &doc! { "age": 30.0 });
        assert_no_match(&doc, &doc! { "name": "Bob" });
    }

    #[test]
    fn empty_query_matches_all() {
        assert_matches(&doc! { "a": 1 }, &doc! {});
    }

    #[test]
    fn null_equality_matches_missing() {
        let doc = doc! { "a": 1 };
        assert_matches(&doc, &doc! { "b": Bson::Null });
        assert_matches(&doc! { "b": Bson::Null }, &doc! { "b": Bson::Null });
        assert_no_match(&doc! { "b": 1 }, &doc! { "b": Bson::Null });
    }

    #[test]
    fn dotted_path_equality() {
        let doc = doc! { "address": { "city": "Berlin", "zip": 10115 } };
        assert_matches(&doc, &doc! { "address.city": "Berlin" });
        assert_no_match(&doc, &doc! { "address.city": "Hamburg" });
        assert_no_match(&doc, &doc! { "address.city.x": "Berlin" });
    }

    #[test]
    fn array_contains_equality() {
        let doc = doc! { "tags": ["a", "b"] };
        assert_matches(&doc, &doc! { "tags": "a" });
        assert_matches(&doc, &doc! { "tags": ["a", "b"] });
        assert_no_match(&doc, &doc! { "tags": "c" });
        assert_no_match(&doc, &doc! { "tags": ["b", "a"] });
    }

    #[test]
    fn dotted_path_traverses_nested_arrays() {
        let doc = doc! { "a": [{ "b": { "c": 1 } }, { "b": { "c": 2 } }] };
        assert_matches(&doc, &doc! { "a.b.c": 2 });
        assert_no_match(&doc, &doc! { "a.b.c": 3 });
        assert_eq!(
            match_position(&doc, &doc! { "a.b.c": 2 }).unwrap(),
            Some(1)
        );
    }

    #[test]
    fn array_index_path() {
        let doc = doc! { "arr": [10, 20] };
        assert_matches(&doc, &doc! { "arr.1": 20 });
        assert_no_match(&doc, &doc! { "arr.2": 20 });
    }

    // ── operators ───────────────────────────────────────────────

    #[test]
    fn comparison_operators() {
        let doc = doc! { "age": 25 };
        assert_matches(&doc, &doc! { "age": { "$gt": 20 } });
        assert_matches(&doc, &doc! { "age": { "$gte": 25 } });
        assert_matches(&doc, &doc! { "age": { "$lt": 30.5 } });
        assert_no_match(&doc, &doc! { "age": { "$lt": 25 } });
        assert_matches(&doc, &doc! { "age": { "$gt": 20, "$lt": 30 } });
        assert_no_match(&doc, &doc! { "age": { "$gt": 20, "$lt": 24 } });
    }

    #[test]
    fn comparison_needs_comparable_kinds() {
        let doc = doc! { "age": 25 };
        assert_no_match(&doc, &doc! { "age": { "$gt": "20" } });
        assert_no_match(&doc! {}, &doc! { "age": { "$lt": 100 } });
        assert_no_match(&doc! { "age": Bson::Null }, &doc! { "age": { "$lt": 100 } });
    }

    #[test]
    fn ne_on_arrays_considers_elements() {
        let doc = doc! { "tags": ["a", "b"] };
        assert_no_match(&doc, &doc! { "tags": { "$ne": ["a", "b"] } });
        assert_no_match(&doc, &doc! { "tags": { "$ne": "a" } });
        assert_matches(&doc, &doc! { "tags": { "$ne": "z" } });
    }

    #[test]
    fn in_and_nin() {
        let doc = doc! { "city": "NYC" };
        assert_matches(&doc, &doc! { "city": { "$in": ["NYC", "LA"] } });
        assert_no_match(&doc, &doc! { "city": { "$in": ["SF"] } });
        assert_matches(&doc, &doc! { "city": { "$nin": ["SF"] } });
        assert_no_match(&doc, &doc! { "city": { "$nin": ["NYC"] } });
        // missing value compares as null
        assert_matches(&doc, &doc! { "other": { "$in": [Bson::Null] } });
    }

    #[test]
    fn in_against_array_value() {
        let doc = doc! { "tags": ["a", "b"] };
        assert_matches(&doc, &doc! { "tags": { "$in": ["b", "z"] } });
        assert_no_match(&doc, &doc! { "tags": { "$in": ["z"] } });
    }

    #[test]
    fn in_requires_array_operand() {
        assert!(matches(&doc! { "a": 1 }, &doc! { "a": { "$in": 1 } }).is_err());
    }

    #[test]
    fn exists() {
        let doc = doc! { "email": Bson::Null };
        assert_matches(&doc, &doc! { "email": { "$exists": true } });
        assert_no_match(&doc, &doc! { "email": { "$exists": false } });
        assert_matches(&doc, &doc! { "phone": { "$exists": false } });
        assert_no_match(&doc, &doc! { "phone": { "$exists": true } });
    }

    #[test]
    fn exists_on_dotted_path() {
        let doc = doc! { "a": { "b": 1 } };
        assert_matches(&doc, &doc! { "a.b": { "$exists": true } });
        assert_matches(&doc, &doc! { "a.c": { "$exists": false } });
        assert_matches(&doc, &doc! { "x.y": { "$exists": false } });
    }

    #[test]
    fn all_and_size() {
        let doc = doc! { "tags": ["a", "b", "c"] };
        assert_matches(&doc, &doc! { "tags": { "$all": ["a", "c"] } });
        assert_no_match(&doc, &doc! { "tags": { "$all": ["a", "z"] } });
        assert_matches(&doc, &doc! { "tags": { "$size": 3 } });
        assert_no_match(&doc, &doc! { "tags": { "$size": 2 } });
        assert_no_match(&doc! { "tags": "x" }, &doc! { "tags": { "$size": 1 } });
    }

    #[test]
    fn not_negates() {
        let doc = doc! { "age": 25 };
        assert_matches(&doc, &doc! { "age": { "$not": { "$gt": 30 } } });
        assert_no_match(&doc, &doc! { "age": { "$not": { "$gt": 20 } } });
    }

    #[test]
    fn mod_operator() {
        let doc = doc! { "n": 10 };
        assert_matches(&doc, &doc! { "n": { "$mod": [3, 1] } });
        assert_no_match(&doc, &doc! { "n": { "$mod": [3, 2] } });
        assert!(matches(&doc, &doc! { "n": { "$mod": [0, 1] } }).is_err());
    }

    #[test]
    fn type_operator() {
        let doc = doc! { "s": "x", "n": 5, "d": 1.5 };
        assert_matches(&doc, &doc! { "s": { "$type": 2 } });
        assert_matches(&doc, &doc! { "n": { "$type": "int" } });
        assert_matches(&doc, &doc! { "d": { "$type": "double" } });
        assert_matches(&doc, &doc! { "n": { "$type": "number" } });
        assert_no_match(&doc, &doc! { "s": { "$type": "int" } });
    }

    #[test]
    fn elem_match_documents() {
        let doc = doc! { "results": [{ "product": "a", "score": 8 }, { "product": "b", "score": 5 }] };
        assert_matches(
            &doc,
            &doc! { "results": { "$elemMatch": { "product": "b", "score": { "$lt": 6 } } } },
        );
        assert_no_match(
            &doc,
            &doc! { "results": { "$elemMatch": { "product": "a", "score": { "$lt": 6 } } } },
        );
    }

    #[test]
    fn elem_match_scalars() {
        let doc = doc! { "scores": [1, 5, 9] };
        assert_matches(&doc, &doc! { "scores": { "$elemMatch": { "$gt": 8 } } });
        assert_no_match(&doc, &doc! { "scores": { "$elemMatch": { "$gt": 10 } } });
    }

    #[test]
    fn regex_operator() {
        let doc = doc! { "email": "admin@example.com" };
        assert_matches(&doc, &doc! { "email": { "$regex": "^admin@" } });
        assert_no_match(&doc, &doc! { "email": { "$regex": "^user@" } });
        assert_matches(&doc, &doc! { "email": { "$regex": "^ADMIN@", "$options": "i" } });
        assert!(matches(&doc, &doc! { "email": { "$regex": "[invalid" } }).is_err());
    }

    #[test]
    fn unknown_operator_errors() {
        let err = matches(&doc! { "a": 1 }, &doc! { "a": { "$between": 1 } }).unwrap_err();
        assert_eq!(err, QueryError::UnknownOperator("$between".into()));
    }

    // ── logical ─────────────────────────────────────────────────

    #[test]
    fn logical_operators() {
        let doc = doc! { "age": 25, "city": "NYC" };
        assert_matches(
            &doc,
            &doc! { "$and": [{ "age": { "$gte": 18 } }, { "city": "NYC" }] },
        );
        assert_matches(
            &doc,
            &doc! { "$or": [{ "age": { "$lt": 18 } }, { "city": "NYC" }] },
        );
        assert_no_match(
            &doc,
            &doc! { "$nor": [{ "city": "NYC" }, { "age": 99 }] },
        );
        assert_matches(&doc, &doc! { "$nor": [{ "city": "LA" }] });
    }

    #[test]
    fn logical_needs_nonempty_array() {
        assert!(matches(&doc! {}, &doc! { "$and": [] }).is_err());
        assert!(matches(&doc! {}, &doc! { "$or": 1 }).is_err());
        assert!(matches(&doc! {}, &doc! { "$and": [1] }).is_err());
    }

    // ── match position ──────────────────────────────────────────

    #[test]
    fn position_of_array_of_documents_clause() {
        let doc = doc! { "arr": [{ "x": 1 }, { "x": 2 }, { "x": 3 }] };
        let pos = match_position(&doc, &doc! { "arr.x": 2 }).unwrap();
        assert_eq!(pos, Some(1));
    }

    #[test]
    fn position_of_scalar_array_clause() {
        let doc = doc! { "tags": ["a", "b", "c"] };
        let pos = match_position(&doc, &doc! { "tags": "c" }).unwrap();
        assert_eq!(pos, Some(2));
    }

    #[test]
    fn position_unset_without_array_traversal() {
        let doc = doc! { "a": 1 };
        assert_eq!(match_position(&doc, &doc! { "a": 1 }).unwrap(), None);
    }

    #[test]
    fn position_none_when_no_match() {
        let doc = doc! { "tags": ["a"] };
        assert_eq!(match_position(&doc, &doc! { "tags": "z" }).unwrap(), None);
    }

    #[test]
    fn position_records_first_traversing_clause() {
        let doc = doc! { "a": [1, 2], "b": [{ "x": 9 }, { "x": 8 }] };
        let pos = match_position(&doc, &doc! { "a": 2, "b.x": 8 }).unwrap();
        assert_eq!(pos, Some(1)); // first clause to traverse recorded index 1
    }
}
