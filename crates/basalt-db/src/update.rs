//! Update engine: computes the post-image of a document for an update
//! specification.
//!
//! Two modes, chosen by the update document's top-level keys: all keys
//! start with `$` (operator mode) or none do (full replacement, keeping
//! the identifier). A mix of both is illegal. The engine never mutates
//! the stored document: it produces a new one, and the collection swaps
//! it in only after every index check passed.

use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use basalt_query::{path, value};
use bson::{Bson, Document};

use crate::error::DbError;
use crate::record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateOperator {
    Set,
    SetOnInsert,
    Unset,
    Inc,
    Mul,
    Min,
    Max,
    Push,
    PushAll,
    AddToSet,
    Pull,
    PullAll,
    Pop,
    CurrentDate,
}

impl UpdateOperator {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "$set" => Self::Set,
            "$setOnInsert" => Self::SetOnInsert,
            "$unset" => Self::Unset,
            "$inc" => Self::Inc,
            "$mul" => Self::Mul,
            "$min" => Self::Min,
            "$max" => Self::Max,
            "$push" => Self::Push,
            "$pushAll" => Self::PushAll,
            "$addToSet" => Self::AddToSet,
            "$pull" => Self::Pull,
            "$pullAll" => Self::PullAll,
            "$pop" => Self::Pop,
            "$currentDate" => Self::CurrentDate,
            _ => return None,
        })
    }
}

/// Compute the post-image of `old` under `update`.
pub(crate) fn calculate_update(
    old: &Document,
    update: &Document,
    match_pos: Option<usize>,
    is_upsert: bool,
    id_field: &str,
) -> Result<Document, DbError> {
    let operator_keys = update.keys().filter(|k| k.starts_with('$')).count();

    if operator_keys == update.len() {
        let mut new_doc = clone_id_first(old, id_field);
        for (modifier, change) in update {
            let Bson::Document(change) = change else {
                return Err(DbError::BadValue(format!(
                    "Modifier {modifier} expects a document argument"
                )));
            };
            modify_field(&mut new_doc, modifier, change, match_pos, is_upsert, id_field)?;
        }
        Ok(new_doc)
    } else if operator_keys == 0 {
        apply_replacement(old, update, id_field)
    } else {
        Err(DbError::IllegalUpdate(update.to_string()))
    }
}

/// Clone `old` with the identifier moved in front of the other fields.
fn clone_id_first(old: &Document, id_field: &str) -> Document {
    let mut doc = Document::new();
    if let Some(id) = old.get(id_field) {
        doc.insert(id_field, id.clone());
    }
    for (key, val) in old {
        if key != id_field {
            doc.insert(key.clone(), val.clone());
        }
    }
    doc
}

fn apply_replacement(
    old: &Document,
    replacement: &Document,
    id_field: &str,
) -> Result<Document, DbError> {
    let old_id = old.get(id_field).filter(|id| **id != Bson::Null);
    let new_id = replacement.get(id_field).filter(|id| **id != Bson::Null);

    if let (Some(old_id), Some(new_id)) = (old_id, new_id) {
        if !value::equals(old_id, new_id) {
            return Err(DbError::CannotChangeId {
                id_field: id_field.to_string(),
                old: old_id.clone(),
                new: new_id.clone(),
            });
        }
    }

    let mut new_doc = Document::new();
    if let Some(id) = new_id.or(old_id) {
        new_doc.insert(id_field, id.clone());
    }
    for (key, val) in replacement {
        if key != id_field {
            new_doc.insert(key.clone(), val.clone());
        }
    }
    record::validate_document(&new_doc)?;
    Ok(new_doc)
}

fn assert_not_id(key: &str, id_field: &str) -> Result<(), DbError> {
    if key == id_field {
        return Err(DbError::ModOnIdNotAllowed(id_field.to_string()));
    }
    Ok(())
}

fn modify_field(
    doc: &mut Document,
    modifier: &str,
    change: &Document,
    match_pos: Option<usize>,
    is_upsert: bool,
    id_field: &str,
) -> Result<(), DbError> {
    let op = UpdateOperator::from_name(modifier)
        .ok_or_else(|| DbError::InvalidModifier(modifier.to_string()))?;

    if op != UpdateOperator::Unset {
        for key in change.keys() {
            if key.starts_with('$') {
                return Err(DbError::DollarInFieldName);
            }
        }
    }

    match op {
        UpdateOperator::SetOnInsert if !is_upsert => Ok(()),
        UpdateOperator::Set | UpdateOperator::SetOnInsert => {
            apply_set(doc, change, match_pos, id_field)
        }
        UpdateOperator::Unset => apply_unset(doc, change, match_pos, id_field),
        UpdateOperator::Push | UpdateOperator::PushAll | UpdateOperator::AddToSet => {
            apply_push(doc, op, modifier, change, match_pos, id_field)
        }
        UpdateOperator::Pull | UpdateOperator::PullAll => {
            apply_pull(doc, op, modifier, change, match_pos, id_field)
        }
        UpdateOperator::Pop => apply_pop(doc, modifier, change, match_pos, id_field),
        UpdateOperator::Inc | UpdateOperator::Mul => {
            apply_arithmetic(doc, op, change, match_pos, id_field)
        }
        UpdateOperator::Min | UpdateOperator::Max => {
            apply_min_max(doc, op, change, match_pos, id_field)
        }
        UpdateOperator::CurrentDate => apply_current_date(doc, change, match_pos, id_field),
    }
}

fn apply_set(
    doc: &mut Document,
    change: &Document,
    match_pos: Option<usize>,
    id_field: &str,
) -> Result<(), DbError> {
    for (key, new_value) in change {
        let mut pos = match_pos;
        let old_value = path::get_with(doc, key, &mut pos)?;
        if value::equals_opt(Some(new_value), old_value.as_ref()) {
            continue;
        }
        assert_not_id(key, id_field)?;
        let mut pos = match_pos;
        path::set(doc, key, new_value.clone(), &mut pos)?;
    }
    Ok(())
}

fn apply_unset(
    doc: &mut Document,
    change: &Document,
    match_pos: Option<usize>,
    id_field: &str,
) -> Result<(), DbError> {
    for key in change.keys() {
        assert_not_id(key, id_field)?;
        let mut pos = match_pos;
        path::remove(doc, key, &mut pos)?;
    }
    Ok(())
}

fn apply_push(
    doc: &mut Document,
    op: UpdateOperator,
    modifier: &str,
    change: &Document,
    match_pos: Option<usize>,
    id_field: &str,
) -> Result<(), DbError> {
    for (key, change_value) in change {
        assert_not_id(key, id_field)?;
        let mut pos = match_pos;
        let mut list = match path::get_with(doc, key, &mut pos)? {
            None => Vec::new(),
            Some(Bson::Array(items)) => items,
            Some(_) => {
                return Err(DbError::NonArrayTarget {
                    modifier: modifier.to_string(),
                    code: 10141,
                });
            }
        };

        if op == UpdateOperator::PushAll {
            let Bson::Array(values) = change_value else {
                return Err(DbError::ArrayOnlyModifier(modifier.to_string()));
            };
            list.extend(values.iter().cloned());
        } else {
            let push_values: Vec<Bson> = match change_value {
                Bson::Document(spec) if spec.len() == 1 && spec.contains_key("$each") => {
                    match spec.get("$each") {
                        Some(Bson::Array(each)) => each.clone(),
                        _ => {
                            return Err(DbError::BadValue(
                                "The argument to $each must be an array".into(),
                            ));
                        }
                    }
                }
                other => vec![other.clone()],
            };
            for val in push_values {
                if op == UpdateOperator::Push || !list.iter().any(|e| value::equals(e, &val)) {
                    list.push(val);
                }
            }
        }

        let mut pos = match_pos;
        path::set(doc, key, Bson::Array(list), &mut pos)?;
    }
    Ok(())
}

fn apply_pull(
    doc: &mut Document,
    op: UpdateOperator,
    modifier: &str,
    change: &Document,
    match_pos: Option<usize>,
    id_field: &str,
) -> Result<(), DbError> {
    for (key, pull_value) in change {
        assert_not_id(key, id_field)?;
        let mut pos = match_pos;
        let mut list = match path::get_with(doc, key, &mut pos)? {
            // Nothing to pull from.
            None => continue,
            Some(Bson::Array(items)) => items,
            Some(_) => {
                return Err(DbError::NonArrayTarget {
                    modifier: modifier.to_string(),
                    code: 10142,
                });
            }
        };

        if op == UpdateOperator::PullAll {
            let Bson::Array(values) = pull_value else {
                return Err(DbError::ArrayOnlyModifier(modifier.to_string()));
            };
            list.retain(|e| !values.iter().any(|v| value::equals(e, v)));
        } else {
            list.retain(|e| !value::equals(e, pull_value));
        }

        let mut pos = match_pos;
        path::set(doc, key, Bson::Array(list), &mut pos)?;
    }
    Ok(())
}

fn apply_pop(
    doc: &mut Document,
    modifier: &str,
    change: &Document,
    match_pos: Option<usize>,
    id_field: &str,
) -> Result<(), DbError> {
    for (key, pop_value) in change {
        assert_not_id(key, id_field)?;
        let mut pos = match_pos;
        let mut list = match path::get_with(doc, key, &mut pos)? {
            None => continue,
            Some(Bson::Array(items)) => items,
            Some(_) => {
                return Err(DbError::NonArrayTarget {
                    modifier: modifier.to_string(),
                    code: 10143,
                });
            }
        };

        if !list.is_empty() {
            if value::as_f64(pop_value) == Some(-1.0) {
                list.remove(0);
            } else {
                list.pop();
            }
        }

        let mut pos = match_pos;
        path::set(doc, key, Bson::Array(list), &mut pos)?;
    }
    Ok(())
}

fn apply_arithmetic(
    doc: &mut Document,
    op: UpdateOperator,
    change: &Document,
    match_pos: Option<usize>,
    id_field: &str,
) -> Result<(), DbError> {
    let operation = if op == UpdateOperator::Inc {
        "increment"
    } else {
        "multiply"
    };

    for (key, change_value) in change {
        assert_not_id(key, id_field)?;

        let mut pos = match_pos;
        let number = match path::get_with(doc, key, &mut pos)? {
            None => Bson::Int32(0),
            Some(v) if value::is_number(&v) => v,
            Some(v) => {
                return Err(DbError::BadValue(format!("cannot {operation} value '{v}'")));
            }
        };
        if !value::is_number(change_value) {
            return Err(DbError::BadValue(format!(
                "cannot {operation} with non-numeric value: {change}"
            )));
        }

        let result = if op == UpdateOperator::Inc {
            value::add(&number, change_value)
        } else {
            value::multiply(&number, change_value)
        }
        .ok_or_else(|| DbError::BadValue(format!("cannot {operation} value '{number}'")))?;

        let mut pos = match_pos;
        path::set(doc, key, result, &mut pos)?;
    }
    Ok(())
}

fn apply_min_max(
    doc: &mut Document,
    op: UpdateOperator,
    change: &Document,
    match_pos: Option<usize>,
    id_field: &str,
) -> Result<(), DbError> {
    for (key, new_value) in change {
        assert_not_id(key, id_field)?;

        let mut pos = match_pos;
        let old_value = path::get_with(doc, key, &mut pos)?;
        let comparison = value::compare(new_value, old_value.as_ref().unwrap_or(&Bson::Null));

        // An absent field is always set, regardless of the comparison.
        let should_change = old_value.is_none()
            || match op {
                UpdateOperator::Max => comparison == Ordering::Greater,
                _ => comparison == Ordering::Less,
            };

        if should_change {
            let mut pos = match_pos;
            path::set(doc, key, new_value.clone(), &mut pos)?;
        }
    }
    Ok(())
}

fn apply_current_date(
    doc: &mut Document,
    change: &Document,
    match_pos: Option<usize>,
    id_field: &str,
) -> Result<(), DbError> {
    for (key, type_spec) in change {
        assert_not_id(key, id_field)?;

        let use_date = match type_spec {
            Bson::Boolean(true) => true,
            Bson::Document(spec) => match spec.get("$type") {
                Some(Bson::String(name)) if name == "date" => true,
                Some(Bson::String(name)) if name == "timestamp" => false,
                _ => {
                    return Err(DbError::InvalidCurrentDateType(format!(
                        "The '$type' string field is required to be 'date' or 'timestamp': {change}"
                    )));
                }
            },
            other => {
                return Err(DbError::InvalidCurrentDateType(format!(
                    "{:?} is not a valid type for $currentDate. Please use a boolean ('true') \
                     or a $type expression ({{$type: 'timestamp/date'}})",
                    other.element_type()
                )));
            }
        };

        let new_value = if use_date {
            Bson::DateTime(bson::DateTime::now())
        } else {
            let seconds = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as u32)
                .unwrap_or(0);
            Bson::Timestamp(bson::Timestamp {
                time: seconds,
                increment: 1,
            })
        };

        let mut pos = match_pos;
        path::set(doc, key, new_value, &mut pos)?;
    }
    Ok(())
}
