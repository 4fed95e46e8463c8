//! Query executor
//!
//! # Execution steps
//!
//! 1. Resolve each criterion to a candidate ID set (field index, or a scan
//!    of the documents still in play) and intersect left to right
//! 2. Intersect with the full-text candidates when a text query is present
//! 3. Order the whole candidate set
//! 4. Paginate the ordered IDs
//! 5. Load only the documents on the requested page
//!
//! Steps 1-3 are `rank`, step 5 is `materialize`; the registry runs them
//! separately so a multi-index search loads only its merged page.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use tracing::debug;

use super::criteria::{Operator, SearchRequest};
use super::filters::KeyMatcher;
use super::resolver::{intersect, resolve_indexed};
use super::result::{SearchHit, SearchResult, SearchStatistics};
use super::sorter::{ResultSorter, SortColumn};
use crate::index::{Document, IndexResult, SearchIndex};

/// The ordered candidate IDs of one index, before materialization.
#[derive(Debug, Clone, Default)]
pub struct RankedIds {
    /// Every match, in result order
    pub ids: Vec<String>,
    /// Full-text relevance by ID; empty without a text query
    pub scores: HashMap<String, f64>,
    /// Stringified sort keys, one map per sort criterion in priority order
    pub sort_keys: Vec<HashMap<String, String>>,
    pub statistics: SearchStatistics,
}

impl RankedIds {
    /// The IDs on the requested page
    pub fn page(&self, request: &SearchRequest) -> &[String] {
        if request.page_size == 0 {
            return &self.ids;
        }
        let start = request.offset().min(self.ids.len());
        let end = start.saturating_add(request.page_size).min(self.ids.len());
        &self.ids[start..end]
    }
}

/// Executes one request against one index.
pub struct QueryExecutor<'a, T: Document> {
    index: &'a SearchIndex<T>,
}

impl<'a, T: Document> QueryExecutor<'a, T> {
    pub fn new(index: &'a SearchIndex<T>) -> Self {
        Self { index }
    }

    async fn universe(&self, cached: &mut Option<BTreeSet<String>>) -> IndexResult<BTreeSet<String>> {
        if let Some(all) = cached {
            return Ok(all.clone());
        }
        let all = self.index.stored_ids().await?;
        *cached = Some(all.clone());
        Ok(all)
    }

    /// Evaluates a criterion by reading documents in `scope`.
    /// A document that cannot be read never matches.
    async fn scan(&self, field: &str, matcher: &KeyMatcher, scope: &BTreeSet<String>) -> BTreeSet<String> {
        let mut matched = BTreeSet::new();
        for id in scope {
            let Some(document) = self.index.load_for_search(id).await else {
                continue;
            };
            let key = self.index.field_key(&document, field);
            if matcher.matches_value(key.as_deref()) {
                matched.insert(id.clone());
            }
        }
        matched
    }

    async fn resolve_candidates(
        &self,
        request: &SearchRequest,
        stats: &mut SearchStatistics,
    ) -> IndexResult<BTreeSet<String>> {
        let mut universe: Option<BTreeSet<String>> = None;
        let mut candidates: Option<BTreeSet<String>> = None;

        for criterion in &request.criteria {
            let matcher = KeyMatcher::new(criterion, self.index.declared_type(&criterion.field))?;

            let ids = if self.index.is_indexed(&criterion.field) {
                stats.indices_used.push(criterion.field.clone());
                let field_index = self.index.field_index(&criterion.field).await;
                let all = if matcher.operator() == Operator::IsNull {
                    Some(self.universe(&mut universe).await?)
                } else {
                    None
                };
                resolve_indexed(&field_index, &matcher, all.as_ref())
            } else {
                stats.full_scan_fields.push(criterion.field.clone());
                let scope = match &candidates {
                    Some(current) => current.clone(),
                    None => self.universe(&mut universe).await?,
                };
                self.scan(&criterion.field, &matcher, &scope).await
            };

            let narrowed = intersect(candidates.take(), ids);
            let empty = narrowed.is_empty();
            candidates = Some(narrowed);
            if empty {
                break;
            }
        }

        match candidates {
            Some(ids) => Ok(ids),
            None => self.universe(&mut universe).await,
        }
    }

    /// Stringified sort keys of `ids`, one map per sort criterion in
    /// priority order
    async fn sort_keys(
        &self,
        request: &SearchRequest,
        ids: &[String],
        stats: &mut SearchStatistics,
    ) -> Vec<HashMap<String, String>> {
        let mut columns = Vec::new();
        for sort in request.ordered_sort() {
            let mut keys = HashMap::with_capacity(ids.len());
            if self.index.is_indexed(&sort.field) {
                let field_index = self.index.field_index(&sort.field).await;
                let inverted = field_index.invert();
                for id in ids {
                    if let Some(key) = inverted.get(id.as_str()) {
                        keys.insert(id.clone(), key.to_string());
                    }
                }
            } else {
                if !stats.full_scan_fields.contains(&sort.field) {
                    stats.full_scan_fields.push(sort.field.clone());
                }
                for id in ids {
                    if let Some(document) = self.index.load_for_search(id).await {
                        if let Some(key) = self.index.field_key(&document, &sort.field) {
                            keys.insert(id.clone(), key);
                        }
                    }
                }
            }
            columns.push(keys);
        }
        columns
    }

    /// Resolves, filters and orders the whole candidate set without
    /// loading any document that is not needed to evaluate or sort it.
    pub async fn rank(&self, request: &SearchRequest) -> IndexResult<RankedIds> {
        let started = Instant::now();
        request.validate()?;

        let mut stats = SearchStatistics::default();
        let filtered = if request.criteria.is_empty() && request.text_query().is_some() {
            None
        } else {
            Some(self.resolve_candidates(request, &mut stats).await?)
        };

        let mut scores = HashMap::new();
        let candidates = match request.text_query() {
            Some(query) => {
                scores = self.index.text_scores(query)?;
                let text_ids: BTreeSet<String> = scores.keys().cloned().collect();
                match filtered {
                    Some(ids) => intersect(Some(ids), text_ids),
                    None => text_ids,
                }
            }
            None => filtered.unwrap_or_default(),
        };

        let mut ordered: Vec<String> = candidates.into_iter().collect();
        let mut sort_keys = Vec::new();
        if !request.sort.is_empty() {
            sort_keys = self.sort_keys(request, &ordered, &mut stats).await;
            let columns: Vec<SortColumn> = request
                .ordered_sort()
                .into_iter()
                .zip(&sort_keys)
                .map(|(sort, keys)| SortColumn::new(sort, keys))
                .collect();
            ResultSorter::sort_by_columns(&mut ordered, &columns);
        } else if request.text_query().is_some() {
            ResultSorter::sort_by_score(&mut ordered, &scores);
        }

        stats.candidates_examined = ordered.len();
        stats.execution_time = started.elapsed();

        Ok(RankedIds {
            ids: ordered,
            scores,
            sort_keys,
            statistics: stats,
        })
    }

    /// Loads the documents of `ids`, skipping any that cannot be read
    pub async fn materialize<'i, I>(&self, ids: I, scores: &HashMap<String, f64>) -> Vec<SearchHit<T>>
    where
        I: IntoIterator<Item = &'i String>,
    {
        let mut hits = Vec::new();
        for id in ids {
            if let Some(document) = self.index.load_for_search(id).await {
                hits.push(SearchHit {
                    id: id.clone(),
                    document: T::clone(&document),
                    score: scores.get(id).copied().unwrap_or(0.0),
                });
            }
        }
        hits
    }

    pub async fn execute(&self, request: &SearchRequest) -> IndexResult<SearchResult<T>> {
        let started = Instant::now();
        let ranked = self.rank(request).await?;

        let total_count = ranked.ids.len();
        let page = ranked.page(request);
        let hits = self.materialize(page, &ranked.scores).await;

        let mut stats = ranked.statistics;
        stats.execution_time = started.elapsed();
        debug!(
            index_id = %self.index.id(),
            total = total_count,
            returned = hits.len(),
            elapsed_ms = stats.execution_time.as_millis() as u64,
            "search complete"
        );

        Ok(SearchResult::page(
            hits,
            total_count,
            request.page_number,
            request.page_size,
            stats,
        ))
    }
}
