use basalt_db::{Collection, CollectionConfig};
use bson::doc;

pub const COLLECTION: &str = "accounts";

pub fn empty_collection() -> Collection {
    Collection::new(CollectionConfig {
        database: "test".into(),
        name: COLLECTION.into(),
        ..Default::default()
    })
}

/// Collection seeded with 5 records.
pub fn seeded_collection() -> Collection {
    let collection = empty_collection();
    collection
        .insert_documents(vec![
            doc! { "_id": 1, "name": "Acme Corp", "revenue": 50000.0, "status": "active", "tags": ["tech"] },
            doc! { "_id": 2, "name": "Globex", "revenue": 80000.0, "status": "snoozed", "tags": ["energy", "tech"] },
            doc! { "_id": 3, "name": "Initech", "revenue": 12000.0, "status": "rejected", "tags": [] },
            doc! { "_id": 4, "name": "Umbrella", "revenue": 95000.0, "status": "active", "tags": ["pharma"] },
            doc! { "_id": 5, "name": "Stark Industries", "revenue": 200000.0, "status": "active", "tags": ["tech", "defense"] },
        ])
        .unwrap();
    collection
}

/// Ids of the documents matching `query`, in result order.
pub fn ids(collection: &Collection, query: bson::Document) -> Vec<i32> {
    collection
        .handle_query(&query, 0, 0, None)
        .unwrap()
        .iter()
        .map(|doc| doc.get_i32("_id").unwrap())
        .collect()
}
