mod common;

use common::{filter, products, store, store_with};
use owldb::{error::AggregateError, prelude::*};
use serde_json::json;

fn update(value: serde_json::Value) -> Update {
    Update::try_from(value).unwrap()
}

#[tokio::test]
async fn set_unset_and_rename() {
    let store = store();
    let products = products(&store).await;

    products
        .update_by_id(
            "p1",
            &update(json!({
                "$set": { "specs.size": "L", "name": "desk lamp" },
                "$unset": { "stock": "" },
                "$rename": { "tags": "labels" },
            })),
        )
        .await
        .unwrap();

    let lamp = products.find_by_id("p1").await.unwrap();
    assert_eq!(lamp.get_path("specs.size"), Some(&Value::from("L")));
    assert_eq!(lamp.get_path("specs.color"), Some(&Value::from("red")));
    assert_eq!(lamp.get("name"), Some(&Value::from("desk lamp")));
    assert_eq!(lamp.get("stock"), None);
    assert_eq!(lamp.get("tags"), None);
    assert_eq!(lamp.get("labels"), Some(&Value::from(vec!["home", "light"])));
}

#[tokio::test]
async fn inc_keeps_integers_exact() {
    let store = store();
    let counters = store.collection("counters").unwrap();
    counters
        .insert(json!({ "_id": "c", "hits": 1, "ratio": 0.5, "name": "x" }))
        .await
        .unwrap();

    counters
        .update_by_id("c", &Update::new().inc("hits", 2).inc("ratio", 1).inc("fresh", 5))
        .await
        .unwrap();

    let counter = counters.find_by_id("c").await.unwrap();
    assert_eq!(counter.get("hits"), Some(&Value::Integer(3)));
    assert_eq!(counter.get("ratio"), Some(&Value::Float(1.5)));
    assert_eq!(counter.get("fresh"), Some(&Value::Integer(5)));

    let err = counters.update_by_id("c", &Update::new().inc("name", 1)).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::Operator { ref operator, .. } if operator == "$inc"));

    let err = counters
        .update_by_id("c", &Update::new().set("hits", i64::MAX).inc("hits", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Operator { .. }));

    // failed updates write nothing, not even their earlier operators
    assert_eq!(counters.find_by_id("c").await.unwrap(), counter);
}

#[tokio::test]
async fn array_operators() {
    let store = store();
    let products = products(&store).await;

    products
        .update_by_id("p1", &update(json!({ "$addToSet": { "tags": "home" } })))
        .await
        .unwrap();
    products
        .update_by_id("p1", &update(json!({ "$addToSet": { "tags": "sale" }, "$push": { "history": 1 } })))
        .await
        .unwrap();

    let lamp = products.find_by_id("p1").await.unwrap();
    assert_eq!(lamp.get("tags"), Some(&Value::from(vec!["home", "light", "sale"])));
    assert_eq!(lamp.get("history"), Some(&Value::from(vec![1])));

    products
        .update_by_id("p1", &update(json!({ "$pull": { "tags": "light" }, "$pop": { "history": 1 } })))
        .await
        .unwrap();
    products
        .update_by_id("p3", &update(json!({ "$pullAll": { "tags": ["office", "home"] } })))
        .await
        .unwrap();

    assert_eq!(
        products.find_by_id("p1").await.unwrap().get("tags"),
        Some(&Value::from(vec!["home", "sale"]))
    );
    assert_eq!(
        products.find_by_id("p1").await.unwrap().get("history"),
        Some(&Value::Array(vec![]))
    );
    assert_eq!(
        products.find_by_id("p3").await.unwrap().get("tags"),
        Some(&Value::Array(vec![]))
    );

    let err = products
        .update_by_id("p1", &update(json!({ "$push": { "name": "x" } })))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Operator { ref operator, .. } if operator == "$push"));
}

#[tokio::test]
async fn ids_are_immutable() {
    let store = store();
    let products = products(&store).await;

    for attempt in [
        Update::new().set("_id", "other"),
        Update::new().unset("_id"),
        Update::new().rename("name", "_id"),
    ] {
        assert!(products.update_by_id("p1", &attempt).await.is_err());
    }

    assert!(products.find_by_id("p1").await.is_ok());
    assert!(products.find_by_id("other").await.is_err());
}

#[tokio::test]
async fn unknown_update_operators_are_rejected() {
    let err = Update::try_from(json!({ "$multiply": { "price": 2 } })).unwrap_err();
    assert!(matches!(err, DocumentStoreError::Operator { ref operator, .. } if operator == "$multiply"));

    let err = Update::try_from(json!({ "$currentDate": {} })).unwrap_err();
    assert!(matches!(err, DocumentStoreError::Operator { ref operator, .. } if operator == "$currentDate"));
}

#[tokio::test]
async fn update_one_touches_a_single_document() {
    let store = store();
    let products = products(&store).await;

    products
        .update_one(&Filter::eq("specs.color", "red"), &Update::new().set("sold", true))
        .await
        .unwrap();

    let sold = products.find(&Filter::eq("sold", true)).await.unwrap();
    assert_eq!(sold.len(), 1);
    assert!(matches!(sold[0].get("_id").and_then(Value::as_str), Some("p1" | "p6")));
}

#[tokio::test]
async fn update_many_updates_every_match() {
    let store = store();
    let products = products(&store).await;

    let updated = products
        .update_many(&filter(json!({ "tags": { "$exists": true } })), &Update::new().inc("stock", 1))
        .await;
    // p4 has "stock": null, which $inc cannot add to
    assert!(matches!(updated, Err(DocumentStoreError::Aggregate(_))));

    let updated = products
        .update_many(
            &filter(json!({ "stock": { "$type": "int" } })),
            &Update::new().inc("stock", 1),
        )
        .await
        .unwrap();
    assert_eq!(updated, 4);

    let mut stock = Vec::new();
    for id in ["p1", "p2", "p3", "p6"] {
        stock.push(products.find_by_id(id).await.unwrap().get("stock").cloned());
    }
    assert_eq!(
        stock,
        vec![Some(Value::Integer(5)), Some(Value::Integer(1)), Some(Value::Integer(13)), Some(Value::Integer(4))]
    );

    assert_eq!(products.update_many(&Filter::eq("name", "sofa"), &Update::new().set("a", 1)).await.unwrap(), 0);
}

async fn mixed_prices(store: &DocumentStore<owldb::memory::InMemoryStore>) -> Collection<owldb::memory::InMemoryStore> {
    let items = store.collection("items").unwrap();
    items
        .insert_many(vec![
            json!({ "_id": "a", "price": 1 }),
            json!({ "_id": "b", "price": "free" }),
            json!({ "_id": "c", "price": 2 }),
            json!({ "_id": "d", "price": [] }),
        ])
        .await
        .unwrap();
    items
}

fn failed_ids(err: DocumentStoreError) -> (usize, Vec<String>) {
    match err {
        DocumentStoreError::Aggregate(AggregateError { committed, failures }) => {
            let mut ids: Vec<String> = failures.into_iter().map(|failure| failure.id).collect();
            ids.sort();
            (committed, ids)
        }
        other => panic!("expected an aggregate error, got {other}"),
    }
}

#[tokio::test]
async fn atomic_bulk_updates_commit_nothing_on_failure() {
    let store = store();
    let items = mixed_prices(&store).await;

    let err = items.update_many(&Filter::all(), &Update::new().inc("price", 10)).await.unwrap_err();

    assert_eq!(failed_ids(err), (0, vec!["b".to_string(), "d".to_string()]));
    assert_eq!(items.find_by_id("a").await.unwrap().get("price"), Some(&Value::Integer(1)));
    assert_eq!(items.find_by_id("c").await.unwrap().get("price"), Some(&Value::Integer(2)));
}

#[tokio::test]
async fn partial_bulk_updates_commit_the_successes() {
    let store = store_with(
        StoreConfig::builder()
            .batch_size(1)
            .workers(2)
            .bulk_write_policy(BulkWritePolicy::PartialCommit)
            .build()
            .unwrap(),
    );
    let items = mixed_prices(&store).await;

    let err = items.update_many(&Filter::all(), &Update::new().inc("price", 10)).await.unwrap_err();

    assert_eq!(failed_ids(err), (2, vec!["b".to_string(), "d".to_string()]));
    assert_eq!(items.find_by_id("a").await.unwrap().get("price"), Some(&Value::Integer(11)));
    assert_eq!(items.find_by_id("b").await.unwrap().get("price"), Some(&Value::from("free")));
    assert_eq!(items.find_by_id("c").await.unwrap().get("price"), Some(&Value::Integer(12)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_serialized() {
    let store = store();
    let counters = store.collection("counters").unwrap();
    counters.insert(json!({ "_id": "c", "n": 0 })).await.unwrap();

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let counters = counters.clone();
            tokio::spawn(async move {
                loop {
                    match counters.update_by_id("c", &Update::new().inc("n", 1)).await {
                        Ok(()) => break,
                        Err(DocumentStoreError::Conflict(_)) => continue,
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(counters.find_by_id("c").await.unwrap().get("n"), Some(&Value::Integer(20)));
}
