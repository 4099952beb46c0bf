//! BM25, vector, tag, and keyword search (C7). Graph-traverse and hybrid
//! live in their own modules since they compose these or walk a different
//! table entirely.

use crate::document_fetch::{self, RawRow};
use noema_core::deadline::Deadline;
use noema_core::errors::{NoemaResult, StorageError};
use noema_core::models::{Engine, FilterPredicate, SearchEnvelope, SearchHit, TagMode};
use noema_storage::pool::Pool;
use noema_storage::fts5;
use noema_storage::vector::{cosine_similarity, normalize_score};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn hit(row: RawRow, score: f64, engine: Engine) -> Result<Option<SearchHit>, StorageError> {
    let RawRow { collection, doc, .. } = row;
    Ok(document_fetch::to_document(&collection, doc)?
        .map(|doc| SearchHit { doc, score, engine, extras: HashMap::new() }))
}

fn passes_filter(doc: &serde_json::Value, predicate: &FilterPredicate, score: Option<f64>) -> bool {
    if let Some(tags) = &predicate.tag_list {
        let present = document_fetch::extract_tags(doc);
        if !tags.iter().all(|t| present.contains(t)) {
            return false;
        }
    }
    if let Some(floor) = predicate.min_score {
        if score.map(|s| s < floor).unwrap_or(false) {
            return false;
        }
    }
    if let Some(expr) = &predicate.filter_expression {
        if !field_contains(doc, expr) {
            return false;
        }
    }
    if let Some(fuzzy) = &predicate.fuzzy {
        let field = doc.get(&fuzzy.field).and_then(|v| v.as_str()).unwrap_or_default();
        if substring_ratio(field, &fuzzy.query) < fuzzy.min_ratio {
            return false;
        }
    }
    true
}

/// A minimal `filter_expression` evaluator: `field:substring`, matched
/// case-insensitively against the stored JSON. Anything richer is out of
/// scope (§9 non-goal: no general expression language).
fn field_contains(doc: &serde_json::Value, expr: &str) -> bool {
    match expr.split_once(':') {
        Some((field, needle)) => doc
            .get(field)
            .and_then(|v| v.as_str())
            .map(|hay| hay.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
        None => false,
    }
}

/// Crude token-overlap ratio used for the supplemented fuzzy filter (§11):
/// fraction of the query's characters found, in order, as a subsequence.
fn substring_ratio(haystack: &str, needle: &str) -> f64 {
    let haystack = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    if needle.is_empty() {
        return 1.0;
    }
    let mut chars = haystack.chars();
    let mut matched = 0usize;
    for c in needle.chars() {
        if chars.any(|h| h == c) {
            matched += 1;
        }
    }
    matched as f64 / needle.chars().count() as f64
}

pub struct Bm25Params {
    pub view: String,
    pub query: String,
    pub tag_list: Option<Vec<String>>,
    pub min_score: Option<f64>,
    pub top_n: usize,
}

pub async fn bm25_search(pool: Arc<Pool>, params: Bm25Params, deadline: Deadline) -> NoemaResult<SearchEnvelope> {
    let started = Instant::now();
    let limit = params.top_n;
    let fetch_n = (limit * 5).max(limit);
    let hits = tokio::task::spawn_blocking(move || {
        pool.with_read(|conn| run_bm25(conn, &params, fetch_n))
    })
    .await
    .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;

    let mut results = Vec::with_capacity(limit);
    let mut truncated = false;
    for h in hits {
        if deadline.is_elapsed() {
            truncated = true;
            break;
        }
        if results.len() >= limit {
            break;
        }
        results.push(h);
    }
    let total = results.len();
    Ok(SearchEnvelope { results, total, time_ms: elapsed_ms(started), engine: Engine::Bm25, truncated })
}

/// Strips FTS5 query-syntax punctuation and joins terms with `OR`, keeping
/// only the words the caller typed. A raw natural-language query (question
/// marks, colons, quotes, bareword AND-by-default) is otherwise a malformed
/// or overly strict MATCH expression rather than a lexical search term.
fn sanitize_fts5_query(query: &str) -> String {
    query
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn run_bm25(conn: &Connection, params: &Bm25Params, fetch_n: usize) -> Result<Vec<SearchHit>, StorageError> {
    let sanitized = sanitize_fts5_query(&params.query);
    if sanitized.is_empty() {
        return Ok(Vec::new());
    }
    let bm25_hits = fts5::search_bm25(conn, &params.view, &sanitized, fetch_n)?;
    let mut out = Vec::new();
    for bh in bm25_hits {
        let Some(row) = document_fetch::fetch_one(conn, &bh.source_collection, &bh.doc_key)? else { continue };
        let predicate = FilterPredicate {
            tag_list: params.tag_list.clone(),
            filter_expression: None,
            min_score: params.min_score,
            fuzzy: None,
        };
        if !passes_filter(&row.doc, &predicate, Some(bh.score)) {
            continue;
        }
        if let Some(h) = hit(row, bh.score, Engine::Bm25)? {
            out.push(h);
        }
    }
    Ok(out)
}

pub struct VectorParams {
    pub collections: Vec<String>,
    pub query_embedding: Vec<f32>,
    pub filter: FilterPredicate,
    pub top_n: usize,
    pub expand_factor: usize,
}

/// The two-stage mandatory pattern (§4.7): Stage 1 is an unconstrained
/// brute-force cosine scan over `N * expand_factor` candidates (this
/// backend has no native ANN operator, so the "approximate" stage is
/// itself the manual-cosine fallback path — see `DESIGN.md`), Stage 2
/// applies `(tag_list, filter_expression, min_score)` in-process and stops
/// at N matches.
pub async fn vector_search(pool: Arc<Pool>, params: VectorParams, deadline: Deadline) -> NoemaResult<SearchEnvelope> {
    let started = Instant::now();
    let top_n = params.top_n;
    let stage1_limit = top_n * params.expand_factor.max(1);
    let rows = tokio::task::spawn_blocking({
        let pool = pool.clone();
        let collections = params.collections.clone();
        move || pool.with_read(|conn| document_fetch::scan_collections(conn, &collections.iter().map(String::as_str).collect::<Vec<_>>()))
    })
    .await
    .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;

    // Stage 1: rank everything by cosine similarity, no predicates.
    let mut scored: Vec<(f64, RawRow)> = rows
        .into_iter()
        .map(|row| {
            let embedding = document_fetch::extract_embedding(&row.doc);
            let score = normalize_score(cosine_similarity(&embedding, &params.query_embedding));
            (score, row)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(stage1_limit);

    // Stage 2: in-process predicate filtering, stop at top_n.
    let mut results = Vec::with_capacity(top_n);
    let mut truncated = false;
    for (score, row) in scored {
        if deadline.is_elapsed() {
            truncated = true;
            break;
        }
        if results.len() >= top_n {
            break;
        }
        if !passes_filter(&row.doc, &params.filter, Some(score)) {
            continue;
        }
        if let Some(h) = hit(row, score, Engine::Vector)? {
            results.push(h);
        }
    }
    let total = results.len();
    Ok(SearchEnvelope { results, total, time_ms: elapsed_ms(started), engine: Engine::Vector, truncated })
}

pub struct TagParams {
    pub collections: Vec<String>,
    pub tags: Vec<String>,
    pub mode: TagMode,
    pub top_n: usize,
}

/// Insertion order, no scoring (§4.7).
pub async fn tag_search(pool: Arc<Pool>, params: TagParams, deadline: Deadline) -> NoemaResult<SearchEnvelope> {
    let started = Instant::now();
    let top_n = params.top_n;
    let rows = tokio::task::spawn_blocking({
        let pool = pool.clone();
        let collections = params.collections.clone();
        move || pool.with_read(|conn| document_fetch::scan_collections(conn, &collections.iter().map(String::as_str).collect::<Vec<_>>()))
    })
    .await
    .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;

    let mut results = Vec::with_capacity(top_n);
    let mut truncated = false;
    for row in rows {
        if deadline.is_elapsed() {
            truncated = true;
            break;
        }
        if results.len() >= top_n {
            break;
        }
        let present = document_fetch::extract_tags(&row.doc);
        let matches = match params.mode {
            TagMode::Intersection => params.tags.iter().all(|t| present.contains(t)),
            TagMode::Union => params.tags.iter().any(|t| present.contains(t)),
        };
        if !matches {
            continue;
        }
        if let Some(h) = hit(row, 0.0, Engine::Tag)? {
            results.push(h);
        }
    }
    let total = results.len();
    Ok(SearchEnvelope { results, total, time_ms: elapsed_ms(started), engine: Engine::Tag, truncated })
}

pub struct KeywordParams {
    pub collections: Vec<String>,
    pub field: String,
    pub query: String,
    pub top_n: usize,
}

/// Substring match on a named field, no scoring (§4.7).
pub async fn keyword_search(pool: Arc<Pool>, params: KeywordParams, deadline: Deadline) -> NoemaResult<SearchEnvelope> {
    let started = Instant::now();
    let top_n = params.top_n;
    let needle = params.query.to_lowercase();
    let field = params.field.clone();
    let rows = tokio::task::spawn_blocking({
        let pool = pool.clone();
        let collections = params.collections.clone();
        move || pool.with_read(|conn| document_fetch::scan_collections(conn, &collections.iter().map(String::as_str).collect::<Vec<_>>()))
    })
    .await
    .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;

    let mut results = Vec::with_capacity(top_n);
    let mut truncated = false;
    for row in rows {
        if deadline.is_elapsed() {
            truncated = true;
            break;
        }
        if results.len() >= top_n {
            break;
        }
        let hay = row.doc.get(&field).and_then(|v| v.as_str()).unwrap_or_default().to_lowercase();
        if !hay.contains(&needle) {
            continue;
        }
        if let Some(h) = hit(row, 0.0, Engine::Keyword)? {
            results.push(h);
        }
    }
    let total = results.len();
    Ok(SearchEnvelope { results, total, time_ms: elapsed_ms(started), engine: Engine::Keyword, truncated })
}
