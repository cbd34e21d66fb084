mod common;
use common::*;

use bson::doc;

// ── Delete tests ────────────────────────────────────────────────

#[test]
fn delete_matching_documents() {
    let collection = seeded_collection();
    let removed = collection
        .delete_documents(&doc! { "status": "active" }, 0)
        .unwrap();
    assert_eq!(removed, 3);
    assert_eq!(ids(&collection, doc! {}), vec![2, 3]);
}

#[test]
fn delete_with_limit() {
    let collection = seeded_collection();
    let removed = collection
        .delete_documents(&doc! { "status": "active" }, 1)
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(collection.count(), 4);
    assert_eq!(ids(&collection, doc! { "status": "active" }), vec![4, 5]);
}

#[test]
fn delete_no_match_is_zero() {
    let collection = seeded_collection();
    assert_eq!(
        collection.delete_documents(&doc! { "status": "nope" }, 0).unwrap(),
        0
    );
    assert_eq!(collection.count(), 5);
}

#[test]
fn deleted_documents_leave_the_index() {
    let collection = seeded_collection();
    collection.delete_documents(&doc! { "_id": 1 }, 0).unwrap();
    assert!(ids(&collection, doc! { "_id": 1 }).is_empty());
    // re-inserting the same id works again
    collection
        .insert_documents(vec![doc! { "_id": 1, "name": "fresh" }])
        .unwrap();
    assert_eq!(ids(&collection, doc! { "_id": 1 }), vec![1]);
}

#[test]
fn delete_adjusts_size_and_tombstones() {
    let collection = seeded_collection();
    collection.delete_documents(&doc! {}, 0).unwrap();
    let report = collection.validate().unwrap();
    assert_eq!(report.get_i64("datasize").unwrap(), 0);
    assert_eq!(report.get_i32("nrecords").unwrap(), 0);
    assert_eq!(report.get_i32("deletedCount").unwrap(), 5);
}
