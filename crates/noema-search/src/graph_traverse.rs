//! Graph-traverse (C7): breadth-first walk from a seed vertex over the
//! `edges` table, directed or undirected, bounded by `max_depth`.

use noema_core::deadline::Deadline;
use noema_core::errors::{NoemaResult, StorageError};
use noema_core::models::Relationship;
use noema_storage::pool::Pool;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraverseHit {
    pub vertex: String,
    pub edge: Relationship,
    /// Vertex keys from the seed to `vertex`, inclusive of both ends.
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraverseEnvelope {
    pub results: Vec<TraverseHit>,
    pub truncated: bool,
}

pub struct TraverseParams {
    pub seed: String,
    pub collection: String,
    pub max_depth: usize,
    pub directed: bool,
    /// `field:substring` per-edge predicate, same grammar as the other
    /// methods' `filter_expression` (§9 non-goal: no expression language).
    pub edge_filter: Option<String>,
}

pub async fn traverse(pool: Arc<Pool>, params: TraverseParams, deadline: Deadline) -> NoemaResult<TraverseEnvelope> {
    let collection = params.collection.clone();
    let raw_edges = tokio::task::spawn_blocking({
        let pool = pool.clone();
        move || pool.with_read(|conn| fetch_relationship_edges(conn, &collection))
    })
    .await
    .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;

    let mut graph: DiGraph<String, Relationship> = DiGraph::new();
    let mut index_of: HashMap<String, NodeIndex> = HashMap::new();
    let mut ensure_node = |graph: &mut DiGraph<String, Relationship>, key: &str| -> NodeIndex {
        *index_of
            .entry(key.to_string())
            .or_insert_with(|| graph.add_node(key.to_string()))
    };

    for relationship in &raw_edges {
        if let Some(expr) = &params.edge_filter {
            if !edge_matches(relationship, expr) {
                continue;
            }
        }
        let from = ensure_node(&mut graph, &relationship.from);
        let to = ensure_node(&mut graph, &relationship.to);
        graph.add_edge(from, to, relationship.clone());
        if !params.directed {
            graph.add_edge(to, from, relationship.clone());
        }
    }

    let Some(&seed_idx) = index_of.get(&params.seed) else {
        return Ok(TraverseEnvelope { results: Vec::new(), truncated: false });
    };

    let mut results = Vec::new();
    let mut truncated = false;
    let mut visited = vec![false; graph.node_count()];
    let mut queue = std::collections::VecDeque::new();
    queue.push_back((seed_idx, vec![params.seed.clone()], 0usize));
    visited[seed_idx.index()] = true;

    while let Some((node, path, depth)) = queue.pop_front() {
        if deadline.is_elapsed() {
            truncated = true;
            break;
        }
        if depth >= params.max_depth {
            continue;
        }
        for edge in graph.edges(node) {
            let next = edge.target();
            let relationship = edge.weight().clone();
            let mut next_path = path.clone();
            next_path.push(graph[next].clone());
            results.push(TraverseHit { vertex: graph[next].clone(), edge: relationship, path: next_path.clone() });
            if !visited[next.index()] {
                visited[next.index()] = true;
                queue.push_back((next, next_path, depth + 1));
            }
        }
    }

    Ok(TraverseEnvelope { results, truncated })
}

fn edge_matches(relationship: &Relationship, expr: &str) -> bool {
    match expr.split_once(':') {
        Some(("relationship_type", needle)) => {
            relationship.relationship_type.to_lowercase().contains(&needle.to_lowercase())
        }
        Some((field, needle)) => relationship
            .attributes
            .get(field)
            .and_then(|v| v.as_str())
            .map(|hay| hay.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
        None => false,
    }
}

fn fetch_relationship_edges(conn: &Connection, collection: &str) -> Result<Vec<Relationship>, StorageError> {
    let mut stmt = conn
        .prepare("SELECT doc FROM edges WHERE collection = ?1 AND invalid_at IS NULL")
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let rows = stmt
        .query_map(rusqlite::params![collection], |row| row.get::<_, String>(0))
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let mut out = Vec::new();
    for row in rows {
        let raw = row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
        let relationship: Relationship =
            serde_json::from_str(&raw).map_err(|e| StorageError::SchemaMismatch(e.to_string()))?;
        out.push(relationship);
    }
    Ok(out)
}
