//! Facet and Full-Text Tests
//!
//! Tests for derived views:
//! - Facet files track membership, measures and cross-tabulations
//! - Full-text relevance ordering, correction, synonyms and suggestions

use serde_json::{json, Value};
use stayindex::facets::FacetSpec;
use stayindex::index::{FieldAccessors, IndexConfiguration, IndexDescriptor, SearchIndex};
use stayindex::query::{SearchCriterion, SearchRequest};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

async fn open(temp: &TempDir) -> SearchIndex<Value> {
    let descriptor = IndexDescriptor::new("Stays", temp.path())
        .with_fields(["city"])
        .with_text_fields(["title", "description"])
        .with_synonyms("flat", ["apartment"])
        .with_facet(FacetSpec::new("city", "city"))
        .with_facet(FacetSpec::new("amenity", "amenities"))
        .with_facet(FacetSpec::new("price-range", "price").with_buckets([50.0, 100.0, 200.0]))
        .with_facet_measures(["price", "rating"]);
    SearchIndex::open(IndexConfiguration::new(descriptor, FieldAccessors::new()))
        .await
        .unwrap()
}

async fn seed(index: &SearchIndex<Value>) {
    let docs = [
        (
            "h1",
            json!({
                "city": "Aden", "price": 80, "rating": 4.0,
                "amenities": ["wifi", "pool"],
                "title": "Beach apartment",
                "description": "Bright apartment by the beach"
            }),
        ),
        (
            "h2",
            json!({
                "city": "Aden", "price": 150, "rating": 5.0,
                "amenities": ["wifi"],
                "title": "Harbour villa",
                "description": "Villa with a private beach"
            }),
        ),
        (
            "h3",
            json!({
                "city": "Sanaa", "price": 40,
                "amenities": ["breakfast"],
                "title": "Tower house",
                "description": "Historic house in the old city"
            }),
        ),
    ];
    for (id, doc) in docs {
        index.add(id, doc).await.unwrap();
    }
}

// =============================================================================
// Facet Tests
// =============================================================================

/// Facet files hold members, averages and cross counts.
#[tokio::test]
async fn test_facet_contents() {
    let temp = TempDir::new().unwrap();
    let index = open(&temp).await;
    seed(&index).await;

    assert_eq!(index.facet_keys("city").await.unwrap(), vec!["Aden", "Sanaa"]);
    assert_eq!(
        index.facet_keys("amenity").await.unwrap(),
        vec!["breakfast", "pool", "wifi"]
    );
    assert_eq!(
        index.facet_keys("price-range").await.unwrap(),
        vec!["100-200", "50-100", "below-50"]
    );

    let aden = index.facet("city", "Aden").await.unwrap().unwrap();
    assert_eq!(aden.count, 2);
    assert_eq!(aden.average("price"), Some(115.0));
    assert_eq!(aden.average("rating"), Some(4.5));
    assert_eq!(aden.cross["amenity"]["wifi"], 2);
    assert_eq!(aden.cross["amenity"]["pool"], 1);

    assert!(temp.path().join("Stays").join("city").join("Aden.json").is_file());
}

/// Updates and removals move documents between facet files.
#[tokio::test]
async fn test_facets_follow_mutations() {
    let temp = TempDir::new().unwrap();
    let index = open(&temp).await;
    seed(&index).await;

    index
        .update("h3", json!({ "city": "Aden", "price": 60, "amenities": [], "title": "Moved" }))
        .await
        .unwrap();
    index.remove("h2").await.unwrap();

    assert_eq!(index.facet_keys("city").await.unwrap(), vec!["Aden"]);
    assert!(index.facet("amenity", "breakfast").await.unwrap().is_none());

    let aden = index.facet("city", "Aden").await.unwrap().unwrap();
    assert_eq!(aden.ids.iter().collect::<Vec<_>>(), vec!["h1", "h3"]);
    assert_eq!(aden.average("price"), Some(70.0));
    assert_eq!(aden.average("rating"), Some(4.0));

    let before = index.facet("city", "Aden").await.unwrap();
    index.rebuild().await.unwrap();
    assert_eq!(index.facet("city", "Aden").await.unwrap(), before);
}

// =============================================================================
// Full-Text Tests
// =============================================================================

/// Higher term frequency ranks first; ties fall back to ID.
#[tokio::test]
async fn test_relevance_order() {
    let temp = TempDir::new().unwrap();
    let index = open(&temp).await;
    seed(&index).await;

    let result = index.search(&SearchRequest::new().text("beach")).await;
    assert!(result.success);
    assert_eq!(result.ids(), vec!["h1", "h2"]);
    assert!(result.hits[0].score > result.hits[1].score);
}

/// Text and criteria intersect.
#[tokio::test]
async fn test_text_with_criteria() {
    let temp = TempDir::new().unwrap();
    let index = open(&temp).await;
    seed(&index).await;

    let result = index
        .search(
            &SearchRequest::new()
                .filter(SearchCriterion::eq("city", "Sanaa"))
                .text("beach house"),
        )
        .await;
    assert_eq!(result.ids(), vec!["h3"]);
}

/// Misspelled terms are corrected; synonyms match.
#[tokio::test]
async fn test_correction_and_synonyms() {
    let temp = TempDir::new().unwrap();
    let index = open(&temp).await;
    seed(&index).await;

    let corrected = index.search(&SearchRequest::new().text("vila")).await;
    assert_eq!(corrected.ids(), vec!["h2"]);

    let synonym = index.search(&SearchRequest::new().text("flat")).await;
    assert_eq!(synonym.ids(), vec!["h1"]);
}

/// Stop words alone match nothing.
#[tokio::test]
async fn test_stop_words_only() {
    let temp = TempDir::new().unwrap();
    let index = open(&temp).await;
    seed(&index).await;

    let result = index.search(&SearchRequest::new().text("the with")).await;
    assert!(result.success);
    assert_eq!(result.total_count, 0);
}

/// Suggestions are ordered by document frequency.
#[tokio::test]
async fn test_suggest() {
    let temp = TempDir::new().unwrap();
    let index = open(&temp).await;
    seed(&index).await;

    assert_eq!(index.suggest("b", 10).unwrap(), vec!["beach", "bright"]);
    assert_eq!(index.suggest("B", 1).unwrap(), vec!["beach"]);

    // Equal frequency falls back to lexical order
    assert_eq!(
        index.suggest("h", 10).unwrap(),
        vec!["harbour", "historic", "house"]
    );
}
