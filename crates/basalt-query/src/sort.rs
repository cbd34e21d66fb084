use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::path;
use crate::value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Ordering specification parsed from an `orderby` document.
///
/// `$natural` sorts by insertion order (reversed when descending); any
/// other key sorts by the value at that dotted path, missing values
/// comparing as null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortSpec {
    Natural(SortDirection),
    Fields(Vec<SortKey>),
}

impl SortSpec {
    pub fn from_document(orderby: &Document) -> Self {
        if let Some(direction) = orderby.get("$natural") {
            return SortSpec::Natural(direction_of(direction));
        }
        let keys = orderby
            .iter()
            .map(|(field, direction)| SortKey {
                field: field.to_string(),
                direction: direction_of(direction),
            })
            .collect();
        SortSpec::Fields(keys)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SortSpec::Fields(keys) if keys.is_empty())
    }

    /// Compare two documents under this specification. `Natural` yields
    /// `Equal`; callers handle insertion order themselves.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let SortSpec::Fields(keys) = self else {
            return Ordering::Equal;
        };
        for key in keys {
            let left = path::get(a, &key.field).unwrap_or(&Bson::Null);
            let right = path::get(b, &key.field).unwrap_or(&Bson::Null);
            let ord = match key.direction {
                SortDirection::Asc => value::compare(left, right),
                SortDirection::Desc => value::compare(right, left),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

fn direction_of(value: &Bson) -> SortDirection {
    match value::as_f64(value) {
        Some(n) if n < 0.0 => SortDirection::Desc,
        _ => SortDirection::Asc,
    }
}
