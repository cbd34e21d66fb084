//! Include-only field projection.

use basalt_query::value;
use bson::{Bson, Document};

/// Shape `document` by the truthy fields of `selector`. Dotted keys
/// project through nested documents; non-document intermediates are
/// skipped. The identifier is included implicitly unless the selector
/// names it.
pub(crate) fn project_document(
    document: &Document,
    selector: &Document,
    id_field: &str,
) -> Document {
    let mut projected = Document::new();
    for (key, flag) in selector {
        if value::is_true(Some(flag)) {
            project_field(document, &mut projected, key);
        }
    }

    if !selector.contains_key(id_field) {
        if let Some(id) = document.get(id_field) {
            projected.insert(id_field, id.clone());
        }
    }

    projected
}

fn project_field(document: &Document, target: &mut Document, key: &str) {
    match key.split_once('.') {
        Some((main, sub)) => {
            let Some(Bson::Document(source)) = document.get(main) else {
                return;
            };
            if !matches!(target.get(main), Some(Bson::Document(_))) {
                target.insert(main, Document::new());
            }
            if let Some(Bson::Document(nested)) = target.get_mut(main) {
                project_field(source, nested, sub);
            }
        }
        None => {
            if let Some(value) = document.get(key) {
                target.insert(key, value.clone());
            }
        }
    }
}
