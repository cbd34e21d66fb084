//! Value comparison and numeric arithmetic over heterogeneous BSON values.
//!
//! The total order ranks values by type first (null < number < string <
//! document < array < binary < object-id < bool < datetime < timestamp),
//! then compares within the type. Numeric kinds compare by mathematical
//! value after promotion, so `Int32(1)` and `Double(1.0)` are equal.

use std::cmp::Ordering;

use bson::{Bson, Document};

/// Type priority for cross-kind ordering. Missing values are passed in as
/// `Bson::Null` by callers.
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) => 13,
        Bson::JavaScriptCodeWithScope(_) => 14,
        Bson::MaxKey => 15,
    }
}

/// Is the value one of the numeric kinds?
pub fn is_number(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

/// Numeric value as f64, if the value is numeric.
pub fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        _ => None,
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

/// Total order across all value kinds.
pub fn compare(a: &Bson, b: &Bson) -> Ordering {
    let (rank_a, rank_b) = (type_rank(a), type_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }

    match (a, b) {
        _ if is_number(a) && is_number(b) => compare_numbers(a, b),
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            x.timestamp_millis().cmp(&y.timestamp_millis())
        }
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            x.time.cmp(&y.time).then(x.increment.cmp(&y.increment))
        }
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Binary(x), Bson::Binary(y)) => x.bytes.cmp(&y.bytes),
        (Bson::Array(x), Bson::Array(y)) => {
            for (xe, ye) in x.iter().zip(y.iter()) {
                let ord = compare(xe, ye);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Document(x), Bson::Document(y)) => compare_documents(x, y),
        _ => Ordering::Equal,
    }
}

fn compare_numbers(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) {
        return x.cmp(&y);
    }
    let x = as_f64(a).unwrap_or(0.0);
    let y = as_f64(b).unwrap_or(0.0);
    x.total_cmp(&y)
}

fn compare_documents(a: &Document, b: &Document) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let ord = ka.cmp(kb).then_with(|| compare(va, vb));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Are the two values of comparable kinds for ordered comparison?
/// Numbers compare across their kinds; null and missing never take part
/// in ordered comparisons.
pub fn comparable(a: &Bson, b: &Bson) -> bool {
    if matches!(a, Bson::Null | Bson::Undefined) || matches!(b, Bson::Null | Bson::Undefined) {
        return false;
    }
    type_rank(a) == type_rank(b)
}

/// Null-aware structural equality with numeric coercion.
///
/// Arrays compare element-wise in order; documents compare entry-wise in
/// order. `None` (missing) equals `Bson::Null`.
pub fn equals(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        _ if is_number(a) && is_number(b) => compare_numbers(a, b) == Ordering::Equal,
        (Bson::Null | Bson::Undefined, Bson::Null | Bson::Undefined) => true,
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(xe, ye)| equals(xe, ye))
        }
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && equals(va, vb))
        }
        _ => a == b,
    }
}

/// Equality where either side may be missing.
pub fn equals_opt(a: Option<&Bson>, b: Option<&Bson>) -> bool {
    equals(a.unwrap_or(&Bson::Null), b.unwrap_or(&Bson::Null))
}

/// Entry-wise document equality under the same coercion rules as
/// [`equals`].
pub fn documents_equal(a: &Document, b: &Document) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|((ka, va), (kb, vb))| ka == kb && equals(va, vb))
}

/// Numeric addition with promotion: i32 + i32 stays i32 unless it
/// overflows (then i64); 64-bit overflow falls back to double; any double
/// operand makes the result a double. Returns `None` for non-numeric
/// operands.
pub fn add(a: &Bson, b: &Bson) -> Option<Bson> {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => Some(match x.checked_add(*y) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*x) + i64::from(*y)),
        }),
        (Bson::Double(_), _) | (_, Bson::Double(_)) => {
            Some(Bson::Double(as_f64(a)? + as_f64(b)?))
        }
        _ => {
            let (x, y) = (as_i64(a)?, as_i64(b)?);
            Some(match x.checked_add(y) {
                Some(sum) => Bson::Int64(sum),
                None => Bson::Double(x as f64 + y as f64),
            })
        }
    }
}

/// Numeric multiplication; promotion rules mirror [`add`].
pub fn multiply(a: &Bson, b: &Bson) -> Option<Bson> {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => Some(match x.checked_mul(*y) {
            Some(product) => Bson::Int32(product),
            None => Bson::Int64(i64::from(*x) * i64::from(*y)),
        }),
        (Bson::Double(_), _) | (_, Bson::Double(_)) => {
            Some(Bson::Double(as_f64(a)? * as_f64(b)?))
        }
        _ => {
            let (x, y) = (as_i64(a)?, as_i64(b)?);
            Some(match x.checked_mul(y) {
                Some(product) => Bson::Int64(product),
                None => Bson::Double(x as f64 * y as f64),
            })
        }
    }
}

/// MongoDB truthiness: null and missing are false, booleans are
/// themselves, numbers are true unless zero, everything else is true.
pub fn is_true(value: Option<&Bson>) -> bool {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => false,
        Some(Bson::Boolean(b)) => *b,
        Some(v) if is_number(v) => as_f64(v) != Some(0.0),
        Some(_) => true,
    }
}

/// Does the value contain a query expression (a document key starting
/// with `$`) anywhere in its tree?
pub fn contains_query_expression(value: &Bson) -> bool {
    match value {
        Bson::Document(doc) => doc
            .iter()
            .any(|(k, v)| k.starts_with('$') || contains_query_expression(v)),
        Bson::Array(items) => items.iter().any(contains_query_expression),
        _ => false,
    }
}
