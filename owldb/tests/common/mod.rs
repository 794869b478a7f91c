#![allow(dead_code)]

use owldb::{memory::InMemoryStore, prelude::*};
use serde_json::json;

pub fn store() -> DocumentStore<InMemoryStore> {
    store_with(StoreConfig::builder().batch_size(3).workers(4).build().unwrap())
}

pub fn store_with(config: StoreConfig) -> DocumentStore<InMemoryStore> {
    DocumentStore::with_config(InMemoryStore::new(), config).unwrap()
}

pub fn filter(value: serde_json::Value) -> Expr {
    Expr::try_from(value).unwrap()
}

pub fn ids(documents: &[Value]) -> Vec<String> {
    documents
        .iter()
        .map(|document| document.get("_id").and_then(Value::as_str).unwrap().to_string())
        .collect()
}

pub fn sorted_ids(documents: &[Value]) -> Vec<String> {
    let mut ids = ids(documents);
    ids.sort();
    ids
}

/// Inserts a small product catalogue with IDs `p1` to `p6`.
pub async fn products(store: &DocumentStore<InMemoryStore>) -> Collection<InMemoryStore> {
    let products = store.collection("products").unwrap();

    products
        .insert_many(vec![
            json!({ "_id": "p1", "name": "lamp", "price": 25, "stock": 4, "tags": ["home", "light"], "specs": { "color": "red" } }),
            json!({ "_id": "p2", "name": "desk", "price": 150, "stock": 0, "tags": ["office"], "specs": { "color": "oak" } }),
            json!({ "_id": "p3", "name": "chair", "price": 80.5, "stock": 12, "tags": ["office", "home"] }),
            json!({ "_id": "p4", "name": "Mug", "price": 8, "stock": null, "tags": [] }),
            json!({ "_id": "p5", "name": "rug", "price": "call us", "specs": { "color": "blue" } }),
            json!({ "_id": "p6", "name": "shelf", "price": 60, "stock": 3, "tags": ["home"], "specs": { "color": "red" } }),
        ])
        .await
        .unwrap();

    products
}
