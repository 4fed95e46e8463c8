//! Index Search Tests
//!
//! Tests for query invariants:
//! - Criteria are AND-combined
//! - Indexed and unindexed fields give the same answers
//! - The whole candidate set is sorted before pagination
//! - Field indices stay consistent with the stored documents

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stayindex::index::{
    DataType, DynamicField, FieldAccessors, FieldValue, IndexConfiguration, IndexDescriptor,
    IndexError, SearchIndex,
};
use stayindex::query::{SearchCriterion, SearchRequest, SortCriterion};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Property {
    city: String,
    price: f64,
    #[serde(default)]
    rating: Option<f64>,
}

fn property(city: &str, price: f64) -> Property {
    Property {
        city: city.to_string(),
        price,
        rating: None,
    }
}

fn accessors() -> FieldAccessors<Property> {
    FieldAccessors::new()
        .with("city", |p: &Property| FieldValue::from(p.city.as_str()))
        .with("price", |p: &Property| FieldValue::from(p.price))
        .with("rating", |p: &Property| FieldValue::from(p.rating))
}

async fn open_with(temp: &TempDir, fields: &[&str]) -> SearchIndex<Property> {
    let descriptor = IndexDescriptor::new("Properties", temp.path()).with_fields(fields.iter().copied());
    SearchIndex::open(IndexConfiguration::new(descriptor, accessors()))
        .await
        .unwrap()
}

async fn scenario(temp: &TempDir, fields: &[&str]) -> SearchIndex<Property> {
    let index = open_with(temp, fields).await;
    index.add("p1", property("Aden", 120.0)).await.unwrap();
    index.add("p2", property("Aden", 300.0)).await.unwrap();
    index.add("p3", property("Sanaa", 120.0)).await.unwrap();
    index
}

async fn ids(index: &SearchIndex<Property>, request: SearchRequest) -> Vec<String> {
    let result = index.search(&request).await;
    assert!(result.success, "search failed: {:?}", result.error);
    result.ids().into_iter().map(String::from).collect()
}

fn sorted(mut v: Vec<String>) -> Vec<String> {
    v.sort();
    v
}

// =============================================================================
// Basic Scenario Tests
// =============================================================================

/// Exact match and intersection over the three-property scenario.
#[tokio::test]
async fn test_city_and_price_scenario() {
    let temp = TempDir::new().unwrap();
    let index = scenario(&temp, &["city", "price"]).await;

    let aden = ids(&index, SearchRequest::new().filter(SearchCriterion::eq("city", "Aden"))).await;
    assert_eq!(aden, vec!["p1", "p2"]);

    let cheap_aden = ids(
        &index,
        SearchRequest::new()
            .filter(SearchCriterion::eq("city", "Aden"))
            .filter(SearchCriterion::lt("price", "200")),
    )
    .await;
    assert_eq!(cheap_aden, vec!["p1"]);
}

/// Same answers when nothing is indexed.
#[tokio::test]
async fn test_scenario_without_field_indices() {
    let temp = TempDir::new().unwrap();
    let index = scenario(&temp, &[]).await;

    let result = index
        .search(
            &SearchRequest::new()
                .filter(SearchCriterion::eq("city", "Aden"))
                .filter(SearchCriterion::lt("price", "200")),
        )
        .await;
    assert_eq!(result.ids(), vec!["p1"]);
    assert_eq!(result.statistics.full_scan_fields, vec!["city", "price"]);
    assert!(result.statistics.indices_used.is_empty());
}

/// Zero criteria returns every document.
#[tokio::test]
async fn test_empty_request_returns_all() {
    let temp = TempDir::new().unwrap();
    let index = scenario(&temp, &["city"]).await;

    let all = ids(&index, SearchRequest::new()).await;
    assert_eq!(all, vec!["p1", "p2", "p3"]);
}

/// Add then get returns an equal document.
#[tokio::test]
async fn test_round_trip() {
    let temp = TempDir::new().unwrap();
    let index = open_with(&temp, &["city"]).await;

    let original = Property {
        city: "Mukalla".into(),
        price: 75.5,
        rating: Some(4.5),
    };
    index.add("m1", original.clone()).await.unwrap();
    assert_eq!(index.get("m1").await.unwrap(), Some(original));
}

/// A second add with the same ID fails and changes nothing.
#[tokio::test]
async fn test_duplicate_rejected() {
    let temp = TempDir::new().unwrap();
    let index = scenario(&temp, &["city"]).await;

    let err = index.add("p1", property("Taiz", 1.0)).await.unwrap_err();
    assert!(matches!(err, IndexError::DuplicateKey(_)));

    let taiz = ids(&index, SearchRequest::new().filter(SearchCriterion::eq("city", "Taiz"))).await;
    assert!(taiz.is_empty());
    assert_eq!(index.count(), 3);
}

// =============================================================================
// Operator Tests
// =============================================================================

/// Indexed and unindexed evaluation agree for every operator.
#[tokio::test]
async fn test_operators_agree_across_paths() {
    let indexed_dir = TempDir::new().unwrap();
    let plain_dir = TempDir::new().unwrap();
    let indexed = scenario(&indexed_dir, &["city", "price"]).await;
    let plain = scenario(&plain_dir, &[]).await;

    let cases = vec![
        SearchCriterion::eq("city", "aden"),
        SearchCriterion::eq("city", "aden").case_sensitive(),
        SearchCriterion::contains("city", "AN"),
        SearchCriterion::starts_with("city", "s"),
        SearchCriterion::ends_with("city", "en"),
        SearchCriterion::gt("price", "120"),
        SearchCriterion::gte("price", "120"),
        SearchCriterion::lte("price", "120"),
        SearchCriterion::between("price", "100", "200"),
        SearchCriterion::in_list("city", ["aden", "taiz"]),
        SearchCriterion::not_in_list("city", ["aden"]),
        SearchCriterion::regex("city", "^a.e"),
        SearchCriterion::fuzzy("city", "Sanna"),
        SearchCriterion::is_not_null("city"),
    ];

    for criterion in cases {
        let request = SearchRequest::new().filter(criterion.clone());
        assert_eq!(
            sorted(ids(&indexed, request.clone()).await),
            sorted(ids(&plain, request).await),
            "disagreement for {:?}",
            criterion
        );
    }
}

/// Numeric comparison, not lexical: "99" < "120".
#[tokio::test]
async fn test_numeric_range() {
    let temp = TempDir::new().unwrap();
    let index = scenario(&temp, &["price"]).await;
    index.add("p4", property("Taiz", 99.0)).await.unwrap();

    let cheap = ids(&index, SearchRequest::new().filter(SearchCriterion::lt("price", "120"))).await;
    assert_eq!(cheap, vec!["p4"]);

    let mid = ids(
        &index,
        SearchRequest::new().filter(SearchCriterion::between("price", "99", "120")),
    )
    .await;
    assert_eq!(mid, vec!["p1", "p3", "p4"]);
}

/// Fuzzy matches at similarity 0.7 and above only.
#[tokio::test]
async fn test_fuzzy_threshold() {
    let temp = TempDir::new().unwrap();
    let index = open_with(&temp, &["city"]).await;
    index.add("a", property("Mukalla", 1.0)).await.unwrap();
    index.add("b", property("Aden", 1.0)).await.unwrap();

    // 1 edit over 7 chars
    let close = ids(&index, SearchRequest::new().filter(SearchCriterion::fuzzy("city", "Mukala"))).await;
    assert_eq!(close, vec!["a"]);

    // 2 edits over 4 chars
    let far = ids(&index, SearchRequest::new().filter(SearchCriterion::fuzzy("city", "Adxy"))).await;
    assert!(far.is_empty());
}

/// Null checks see documents without a value.
#[tokio::test]
async fn test_null_operators() {
    let temp = TempDir::new().unwrap();
    let index = open_with(&temp, &["rating"]).await;
    index.add("rated", Property { rating: Some(4.0), ..property("Aden", 1.0) }).await.unwrap();
    index.add("unrated", property("Aden", 1.0)).await.unwrap();

    let null = ids(&index, SearchRequest::new().filter(SearchCriterion::is_null("rating"))).await;
    assert_eq!(null, vec!["unrated"]);
    let present = ids(&index, SearchRequest::new().filter(SearchCriterion::is_not_null("rating"))).await;
    assert_eq!(present, vec!["rated"]);
}

/// An invalid regex is reported in-band.
#[tokio::test]
async fn test_invalid_regex_fails_softly() {
    let temp = TempDir::new().unwrap();
    let index = scenario(&temp, &["city"]).await;

    let result = index
        .search(&SearchRequest::new().filter(SearchCriterion::regex("city", "([")))
        .await;
    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(result.hits.is_empty());
}

// =============================================================================
// Ordering and Pagination Tests
// =============================================================================

/// Pages are cut from the globally sorted list.
#[tokio::test]
async fn test_sort_before_paginate() {
    let temp = TempDir::new().unwrap();
    let index = open_with(&temp, &["price"]).await;

    // Insertion order deliberately differs from price order
    for (id, price) in [("a", 500.0), ("b", 20.0), ("c", 300.0), ("d", 10.0), ("e", 400.0)] {
        index.add(id, property("Aden", price)).await.unwrap();
    }

    let page = |n| SearchRequest::new().sort_by(SortCriterion::asc("price")).page(n, 2);
    assert_eq!(ids(&index, page(1)).await, vec!["d", "b"]);
    assert_eq!(ids(&index, page(2)).await, vec!["c", "e"]);
    assert_eq!(ids(&index, page(3)).await, vec!["a"]);

    let result = index.search(&page(3)).await;
    assert_eq!(result.total_count, 5);
    assert_eq!(result.total_pages(), 3);
}

/// Sorting by an unindexed field reads documents.
#[tokio::test]
async fn test_sort_unindexed_descending() {
    let temp = TempDir::new().unwrap();
    let index = scenario(&temp, &["city"]).await;

    let request = SearchRequest::new()
        .sort_by(SortCriterion::desc("price"))
        .sort_by(SortCriterion::asc("city").with_priority(1));
    assert_eq!(ids(&index, request).await, vec!["p2", "p1", "p3"]);
}

/// Missing sort values come first when ascending.
#[tokio::test]
async fn test_missing_sort_values_first() {
    let temp = TempDir::new().unwrap();
    let index = open_with(&temp, &["rating"]).await;
    index.add("x", Property { rating: Some(3.0), ..property("Aden", 1.0) }).await.unwrap();
    index.add("y", property("Aden", 1.0)).await.unwrap();
    index.add("z", Property { rating: Some(1.0), ..property("Aden", 1.0) }).await.unwrap();

    let request = SearchRequest::new().sort_by(SortCriterion::asc("rating"));
    assert_eq!(ids(&index, request).await, vec!["y", "z", "x"]);
}

/// A column mixing numbers and text sorts as text, on both paths.
#[tokio::test]
async fn test_mixed_sort_column_is_one_order() {
    for fields in [&["city"][..], &[][..]] {
        let temp = TempDir::new().unwrap();
        let index = open_with(&temp, fields).await;
        for (id, city) in [("a", "9"), ("b", "10"), ("c", "5a"), ("d", "100")] {
            index.add(id, property(city, 1.0)).await.unwrap();
        }

        let request = SearchRequest::new().sort_by(SortCriterion::asc("city"));
        assert_eq!(ids(&index, request).await, vec!["b", "d", "c", "a"]);

        // Once the text key is filtered out the column is numeric again
        let request = SearchRequest::new()
            .filter(SearchCriterion::in_list("city", ["9", "10", "100"]))
            .sort_by(SortCriterion::asc("city"));
        assert_eq!(ids(&index, request).await, vec!["a", "b", "d"]);
    }
}

// =============================================================================
// Consistency Tests
// =============================================================================

/// After mixed mutations each field index maps exactly the stored values.
#[tokio::test]
async fn test_field_index_consistency() {
    let temp = TempDir::new().unwrap();
    let index = open_with(&temp, &["city"]).await;

    index.add("a", property("Aden", 1.0)).await.unwrap();
    index.add("b", property("Aden", 2.0)).await.unwrap();
    index.add("c", property("Sanaa", 3.0)).await.unwrap();
    index.update("a", property("Taiz", 1.0)).await.unwrap();
    index.remove("b").await.unwrap();
    index.update("c", property("Aden", 3.0)).await.unwrap();

    let raw = std::fs::read_to_string(temp.path().join("Properties").join("city_index.json")).unwrap();
    let on_disk: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(on_disk, json!({ "Aden": ["c"], "Taiz": ["a"] }));

    for city in ["Aden", "Taiz", "Sanaa"] {
        let hits = ids(&index, SearchRequest::new().filter(SearchCriterion::eq("city", city))).await;
        for id in &hits {
            assert_eq!(index.get(id).await.unwrap().unwrap().city, city);
        }
    }
}

/// Dynamic JSON-path fields work without accessors.
#[tokio::test]
async fn test_dynamic_fields_on_json_documents() {
    let temp = TempDir::new().unwrap();
    let descriptor = IndexDescriptor::new("Listings", temp.path())
        .with_fields(["city"])
        .with_dynamic_field(DynamicField::new("guests", "capacity.guests").with_type(DataType::Number));
    let index: SearchIndex<Value> = SearchIndex::open(IndexConfiguration::new(descriptor, FieldAccessors::new()))
        .await
        .unwrap();

    index.add("l1", json!({ "city": "Aden", "capacity": { "guests": 4 } })).await.unwrap();
    index.add("l2", json!({ "city": "Aden", "capacity": { "guests": 10 } })).await.unwrap();

    let result = index
        .search(
            &SearchRequest::new()
                .filter(SearchCriterion::eq("city", "aden"))
                .filter(SearchCriterion::gte("guests", "5")),
        )
        .await;
    assert_eq!(result.ids(), vec!["l2"]);
}
