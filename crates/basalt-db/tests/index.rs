mod common;
use common::*;

use basalt_db::UniqueIndex;
use bson::doc;

// ── Index-aware retrieval ───────────────────────────────────────

#[test]
fn id_lookup_uses_index_and_matches_scan() {
    let collection = seeded_collection();
    assert_eq!(ids(&collection, doc! { "_id": 3 }), vec![3]);
    assert_eq!(ids(&collection, doc! { "_id": { "$in": [4, 1, 99] } }), vec![4, 1]);
    assert!(ids(&collection, doc! { "_id": 99 }).is_empty());
}

#[test]
fn operator_queries_fall_back_to_scan() {
    let collection = seeded_collection();
    assert_eq!(ids(&collection, doc! { "_id": { "$gt": 3 } }), vec![4, 5]);
    assert_eq!(ids(&collection, doc! { "_id": { "$lt": 3 } }), vec![1, 2]);
}

#[test]
fn multi_clause_queries_are_not_narrowed_incorrectly() {
    let collection = seeded_collection();
    assert_eq!(
        ids(&collection, doc! { "_id": 1, "status": "active" }),
        vec![1]
    );
    assert!(ids(&collection, doc! { "_id": 1, "status": "snoozed" }).is_empty());
}

#[test]
fn secondary_index_narrows_lookups() {
    let collection = empty_collection();
    collection
        .add_index(Box::new(UniqueIndex::new("email_1", "email")))
        .unwrap();
    collection
        .insert_documents(vec![
            doc! { "_id": 1, "email": "a@x.io" },
            doc! { "_id": 2, "email": "b@x.io" },
        ])
        .unwrap();
    assert_eq!(ids(&collection, doc! { "email": "b@x.io" }), vec![2]);
    assert!(ids(&collection, doc! { "email": "c@x.io" }).is_empty());
}

#[test]
fn secondary_unique_index_rejects_duplicates_on_insert() {
    let collection = empty_collection();
    collection
        .add_index(Box::new(UniqueIndex::new("email_1", "email")))
        .unwrap();
    collection
        .insert_documents(vec![doc! { "_id": 1, "email": "a@x.io" }])
        .unwrap();
    let err = collection
        .insert_documents(vec![doc! { "_id": 2, "email": "a@x.io" }])
        .unwrap_err();
    assert_eq!(err.code(), Some(11000));
    assert_eq!(collection.count(), 1);
    // the failed insert left no stray index entries
    assert!(ids(&collection, doc! { "_id": 2 }).is_empty());
}

#[test]
fn index_entries_follow_deletes() {
    let collection = empty_collection();
    collection
        .add_index(Box::new(UniqueIndex::new("email_1", "email")))
        .unwrap();
    collection
        .insert_documents(vec![doc! { "_id": 1, "email": "a@x.io" }])
        .unwrap();
    collection.delete_documents(&doc! { "_id": 1 }, 0).unwrap();
    assert!(ids(&collection, doc! { "email": "a@x.io" }).is_empty());
    // the slot is free again
    collection
        .insert_documents(vec![doc! { "_id": 2, "email": "a@x.io" }])
        .unwrap();
    assert_eq!(ids(&collection, doc! { "email": "a@x.io" }), vec![2]);
}
