//! Merging of per-index rankings
//!
//! Each index contributes its full ordered ID list with the raw sort keys
//! and scores behind it. The merge re-sorts the union under one comparison
//! type per sort column and cuts the page; documents are loaded afterwards,
//! for that page only.

use std::collections::{BTreeSet, HashMap};

use crate::query::{RankedIds, ResultSorter, SearchRequest, SearchStatistics, SortColumn};

/// Sort key for a hit: document ID first, then index ID, so the tiebreak
/// matches single-index ordering.
fn merge_key(index_id: &str, document_id: &str) -> String {
    format!("{}\u{0}{}", document_id, index_id)
}

/// One hit of a merged page, not yet materialized
#[derive(Debug, Clone, PartialEq)]
pub struct MergedHit {
    /// Position of the owning index in the merge input
    pub source: usize,
    pub id: String,
    pub score: f64,
}

/// A merged page plus the totals of the whole merge
#[derive(Debug, Clone, Default)]
pub struct MergedPage {
    pub hits: Vec<MergedHit>,
    pub total_count: usize,
    pub statistics: SearchStatistics,
}

/// Merges `(index ID, ranking)` pairs into the page `request` asks for.
pub fn merge_ranked(request: &SearchRequest, ranked: &[(&str, &RankedIds)]) -> MergedPage {
    let sort = request.ordered_sort();

    let mut statistics = SearchStatistics::default();
    let mut used = BTreeSet::new();
    let mut scanned = BTreeSet::new();
    let mut total_count = 0;

    let mut owners: HashMap<String, (usize, &str)> = HashMap::new();
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut raw_columns: Vec<HashMap<String, String>> = vec![HashMap::new(); sort.len()];

    for (source, (index_id, ranking)) in ranked.iter().enumerate() {
        statistics.indices_queried.push(index_id.to_string());
        statistics.candidates_examined += ranking.statistics.candidates_examined;
        used.extend(ranking.statistics.indices_used.iter().cloned());
        scanned.extend(ranking.statistics.full_scan_fields.iter().cloned());
        total_count += ranking.ids.len();

        for id in &ranking.ids {
            let key = merge_key(index_id, id);
            if let Some(score) = ranking.scores.get(id) {
                scores.insert(key.clone(), *score);
            }
            for (column, keys) in raw_columns.iter_mut().zip(&ranking.sort_keys) {
                if let Some(value) = keys.get(id) {
                    column.insert(key.clone(), value.clone());
                }
            }
            owners.insert(key, (source, id.as_str()));
        }
    }
    statistics.indices_used = used.into_iter().collect();
    statistics.full_scan_fields = scanned.into_iter().collect();

    let mut keys: Vec<String> = owners.keys().cloned().collect();
    if !sort.is_empty() {
        let columns: Vec<SortColumn> = sort
            .iter()
            .zip(&raw_columns)
            .map(|(criterion, raw)| SortColumn::new(criterion, raw))
            .collect();
        ResultSorter::sort_by_columns(&mut keys, &columns);
    } else if request.text_query().is_some() {
        ResultSorter::sort_by_score(&mut keys, &scores);
    } else {
        keys.sort();
    }

    let take = if request.page_size == 0 {
        usize::MAX
    } else {
        request.page_size
    };
    let hits = keys
        .iter()
        .skip(request.offset())
        .take(take)
        .filter_map(|key| {
            let (source, id) = owners.get(key)?;
            Some(MergedHit {
                source: *source,
                id: id.to_string(),
                score: scores.get(key).copied().unwrap_or(0.0),
            })
        })
        .collect();

    MergedPage {
        hits,
        total_count,
        statistics,
    }
}
