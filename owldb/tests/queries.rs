mod common;

use common::{filter, products, sorted_ids, store};
use owldb::prelude::*;
use serde_json::json;

async fn matching(collection: &Collection<owldb::memory::InMemoryStore>, query: serde_json::Value) -> Vec<String> {
    sorted_ids(&collection.find(&filter(query)).await.unwrap())
}

#[tokio::test]
async fn comparison_operators() {
    let store = store();
    let products = products(&store).await;

    assert_eq!(matching(&products, json!({ "name": "lamp" })).await, vec!["p1"]);
    assert_eq!(matching(&products, json!({ "price": { "$gt": 60 } })).await, vec!["p2", "p3"]);
    assert_eq!(matching(&products, json!({ "price": { "$gte": 60, "$lt": 100 } })).await, vec!["p3", "p6"]);
    assert_eq!(matching(&products, json!({ "price": { "$lte": 8 } })).await, vec!["p4"]);
    assert_eq!(matching(&products, json!({ "price": { "$eq": 80.5 } })).await, vec!["p3"]);
    assert_eq!(
        matching(&products, json!({ "price": { "$ne": 25 } })).await,
        vec!["p2", "p3", "p4", "p5", "p6"]
    );
}

#[tokio::test]
async fn membership_and_nested_paths() {
    let store = store();
    let products = products(&store).await;

    assert_eq!(
        matching(&products, json!({ "name": { "$in": ["lamp", "rug", "sofa"] } })).await,
        vec!["p1", "p5"]
    );
    assert_eq!(
        matching(&products, json!({ "specs.color": { "$nin": ["red"] } })).await,
        vec!["p2", "p3", "p4", "p5"]
    );
    assert_eq!(matching(&products, json!({ "specs.color": "red" })).await, vec!["p1", "p6"]);
    assert_eq!(matching(&products, json!({ "tags": ["office"] })).await, vec!["p2"]);
}

#[tokio::test]
async fn absent_fields_are_not_null() {
    let store = store();
    let products = products(&store).await;

    assert_eq!(matching(&products, json!({ "stock": null })).await, vec!["p4"]);
    assert_eq!(matching(&products, json!({ "stock": { "$exists": false } })).await, vec!["p5"]);
    assert_eq!(
        matching(&products, json!({ "stock": { "$exists": true } })).await,
        vec!["p1", "p2", "p3", "p4", "p6"]
    );
}

#[tokio::test]
async fn type_and_regex_operators() {
    let store = store();
    let products = products(&store).await;

    assert_eq!(matching(&products, json!({ "price": { "$type": "string" } })).await, vec!["p5"]);
    assert_eq!(matching(&products, json!({ "price": { "$type": "double" } })).await, vec!["p3"]);
    assert_eq!(
        matching(&products, json!({ "price": { "$type": "number" } })).await,
        vec!["p1", "p2", "p3", "p4", "p6"]
    );
    assert_eq!(matching(&products, json!({ "name": { "$regex": "^m" } })).await, Vec::<String>::new());
    assert_eq!(
        matching(&products, json!({ "name": { "$regex": "^m", "$options": "i" } })).await,
        vec!["p4"]
    );
    assert_eq!(
        matching(&products, json!({ "name": { "$not": { "$regex": "e" } } })).await,
        vec!["p1", "p3", "p4", "p5"]
    );
}

#[tokio::test]
async fn logical_combinators() {
    let store = store();
    let products = products(&store).await;

    assert_eq!(
        matching(&products, json!({ "$or": [{ "name": "desk" }, { "stock": { "$gte": 10 } }] })).await,
        vec!["p2", "p3"]
    );
    assert_eq!(
        matching(&products, json!({ "$and": [{ "specs.color": "red" }, { "price": { "$lt": 50 } }] })).await,
        vec!["p1"]
    );
    assert_eq!(
        matching(&products, json!({ "$nor": [{ "specs.color": { "$exists": true } }, { "price": 8 }] })).await,
        vec!["p3"]
    );
    assert!(matching(&products, json!({ "$or": [] })).await.is_empty());

    let built = Filter::or([Filter::eq("name", "desk"), Filter::gte("stock", 10)]).and(Filter::gt("price", 100));
    assert_eq!(sorted_ids(&products.find(&built).await.unwrap()), vec!["p2"]);
}

#[tokio::test]
async fn malformed_filters_are_rejected() {
    for query in [
        json!({ "price": { "$between": [1, 2] } }),
        json!({ "$xor": [] }),
        json!({ "$or": { "a": 1 } }),
        json!({ "name": { "$regex": "(" } }),
        json!({ "name": { "$not": "lamp" } }),
        json!({ "price": { "$type": "decimal" } }),
    ] {
        assert!(
            matches!(Expr::try_from(query.clone()), Err(DocumentStoreError::InvalidFilter(_))),
            "{query} should be rejected"
        );
    }
}

#[tokio::test]
async fn find_one_returns_some_match() {
    let store = store();
    let products = products(&store).await;

    let office = products.find_one(&filter(json!({ "tags": ["office", "home"] }))).await.unwrap();
    assert_eq!(office.get("_id"), Some(&Value::from("p3")));

    let red = products.find_one(&Filter::eq("specs.color", "red")).await.unwrap();
    assert!(matches!(red.get("_id").and_then(Value::as_str), Some("p1" | "p6")));
}

#[tokio::test]
async fn sort_skip_and_limit() {
    let store = store();
    let products = products(&store).await;
    let numeric = Filter::of_type("price", Kind::Integer).or(Filter::of_type("price", Kind::Float));

    let by_price = products
        .find_with_options(&numeric, &FindOptions::builder().sort("price", SortDirection::Asc).build())
        .await
        .unwrap();
    assert_eq!(common::ids(&by_price), vec!["p4", "p1", "p6", "p3", "p2"]);

    let page = products
        .find_with_options(
            &numeric,
            &FindOptions::builder()
                .sort("price", SortDirection::Desc)
                .skip(1)
                .limit(2)
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(common::ids(&page), vec!["p3", "p6"]);

    let past_the_end = products
        .find_with_options(&Filter::all(), &FindOptions::builder().skip(10).build())
        .await
        .unwrap();
    assert!(past_the_end.is_empty());

    // documents without the key sort last
    let by_stock = products
        .find_with_options(
            &Filter::all(),
            &FindOptions::builder()
                .sort("stock", SortDirection::Desc)
                .sort("name", SortDirection::Asc)
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(common::ids(&by_stock).last().map(String::as_str), Some("p5"));
    assert_eq!(common::ids(&by_stock)[0], "p3");
}

#[tokio::test]
async fn projections_shape_results() {
    let store = store();
    let products = products(&store).await;

    let slim = products
        .find_with_options(
            &Filter::eq("_id", "p1"),
            &FindOptions::builder().exclude("tags").exclude("specs.color").exclude("stock").build(),
        )
        .await
        .unwrap();
    assert_eq!(slim, vec![Value::from(json!({ "_id": "p1", "name": "lamp", "price": 25 }))]);

    let only_color = products
        .find_with_options(
            &Filter::all(),
            &FindOptions::builder()
                .select([("_id", false), ("name", false), ("price", false), ("stock", false), ("tags", false)].into_iter().collect())
                .build(),
        )
        .await
        .unwrap();
    // products without specs end up empty and are left out
    assert_eq!(only_color.len(), 4);
    assert!(only_color.iter().all(|document| document.get_path("specs.color").is_some()));
}

#[tokio::test]
async fn scans_cover_many_batches() {
    let store = store_with_small_batches();
    let numbers = store.collection("numbers").unwrap();

    numbers
        .insert_many((0..250).map(|n| json!({ "_id": format!("n{n:03}"), "n": n, "even": n % 2 == 0 })))
        .await
        .unwrap();

    let even = numbers.find(&Filter::eq("even", true)).await.unwrap();
    assert_eq!(even.len(), 125);

    let top = numbers
        .find_with_options(
            &Filter::gte("n", 100),
            &FindOptions::builder().sort("n", SortDirection::Desc).limit(3).build(),
        )
        .await
        .unwrap();
    assert_eq!(common::ids(&top), vec!["n249", "n248", "n247"]);
}

fn store_with_small_batches() -> DocumentStore<owldb::memory::InMemoryStore> {
    common::store_with(StoreConfig::builder().batch_size(7).workers(3).build().unwrap())
}
