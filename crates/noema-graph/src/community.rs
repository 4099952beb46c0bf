use chrono::Utc;
use noema_core::config::GraphConfig;
use noema_core::deadline::Deadline;
use noema_core::errors::{NoemaError, NoemaResult, StorageError};
use noema_core::models::Community;
use noema_storage::Pool;
use std::collections::HashMap;
use std::sync::Arc;

const RELATIONSHIP_COLLECTION: &str = "relationships";
const ENTITY_COLLECTION: &str = "entities";
const COMMUNITY_COLLECTION: &str = "communities";

/// Hard cap on Louvain passes so a pathological graph can't loop forever
/// (§4.11: "iterate until a full pass yields no moves or a step cap is
/// reached").
const STEP_CAP: usize = 100;

/// Offline Louvain-style community detector (C11), operating over the
/// entity graph restricted to currently-valid relationship edges.
pub struct CommunityDetector {
    pool: Arc<Pool>,
    config: GraphConfig,
}

impl CommunityDetector {
    pub fn new(pool: Arc<Pool>, config: GraphConfig) -> Self {
        CommunityDetector { pool, config }
    }

    /// Runs detection and persists the result: truncates the communities
    /// collection, inserts one record per community, and stamps every
    /// member entity with its `community_id` (§4.11 step 4).
    pub async fn detect_and_persist(&self, deadline: Deadline) -> NoemaResult<Vec<Community>> {
        deadline.check()?;
        let pool = self.pool.clone();
        let min_size = self.config.community_min_size.max(1);
        let communities = tokio::task::spawn_blocking(move || pool.with_write(|conn| run_and_persist(conn, min_size)))
            .await
            .map_err(|e| StorageError::TransactionAborted(e.to_string()))?
            .map_err(NoemaError::from)?;
        Ok(communities)
    }
}

fn run_and_persist(conn: &rusqlite::Connection, min_size: usize) -> Result<Vec<Community>, StorageError> {
    let edges = fetch_edges(conn)?;
    if edges.is_empty() {
        conn.execute(
            "DELETE FROM documents WHERE collection = ?1",
            rusqlite::params![COMMUNITY_COLLECTION],
        )
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
        return Ok(Vec::new());
    }

    let graph = Graph::from_edges(&edges);
    let mut assignment = louvain(&graph);
    merge_small_communities(&graph, &mut assignment, min_size);
    let modularity = graph.modularity(&assignment);

    let groups = group_members(&graph, &assignment);

    conn.execute(
        "DELETE FROM documents WHERE collection = ?1",
        rusqlite::params![COMMUNITY_COLLECTION],
    )
    .map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;

    let mut communities = Vec::with_capacity(groups.len());
    for member_keys in groups {
        let key = uuid::Uuid::new_v4().to_string();
        let community = Community {
            key: Some(key.clone()),
            member_count: member_keys.len(),
            modularity,
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO documents (collection, key, doc, conversation_id, created_at, valid_at, invalid_at) \
             VALUES (?1, ?2, ?3, NULL, ?4, ?4, NULL)",
            rusqlite::params![
                COMMUNITY_COLLECTION,
                key,
                serde_json::to_string(&community).unwrap_or_default(),
                community.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
        for entity_key in &member_keys {
            conn.execute(
                "UPDATE documents SET doc = json_set(doc, '$.community_id', ?1) \
                 WHERE collection = ?2 AND key = ?3",
                rusqlite::params![key, ENTITY_COLLECTION, entity_key],
            )
            .map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })?;
        }
        communities.push(community);
    }
    Ok(communities)
}

struct RawEdge {
    from: String,
    to: String,
    confidence: f64,
}

fn fetch_edges(conn: &rusqlite::Connection) -> Result<Vec<RawEdge>, StorageError> {
    let mut stmt = conn
        .prepare(
            "SELECT from_key, to_key, json_extract(doc, '$.confidence') FROM edges \
             WHERE collection = ?1 AND invalid_at IS NULL",
        )
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
    let rows = stmt
        .query_map(rusqlite::params![RELATIONSHIP_COLLECTION], |row| {
            Ok(RawEdge {
                from: row.get(0)?,
                to: row.get(1)?,
                confidence: row.get::<_, Option<f64>>(2)?.unwrap_or(1.0),
            })
        })
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?);
    }
    Ok(out)
}

/// A weighted undirected graph over entity keys, built by symmetrizing
/// directed relationship edges weighted by confidence (§4.11 step 1).
struct Graph {
    keys: Vec<String>,
    adjacency: Vec<HashMap<usize, f64>>,
    degree: Vec<f64>,
    total_weight: f64,
}

impl Graph {
    fn from_edges(edges: &[RawEdge]) -> Self {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut keys = Vec::new();
        for e in edges {
            for k in [&e.from, &e.to] {
                if !index.contains_key(k) {
                    index.insert(k.clone(), keys.len());
                    keys.push(k.clone());
                }
            }
        }
        let n = keys.len();
        let mut adjacency: Vec<HashMap<usize, f64>> = vec![HashMap::new(); n];
        for e in edges {
            let i = index[&e.from];
            let j = index[&e.to];
            if i == j {
                continue;
            }
            *adjacency[i].entry(j).or_insert(0.0) += e.confidence;
            *adjacency[j].entry(i).or_insert(0.0) += e.confidence;
        }
        let degree: Vec<f64> = adjacency.iter().map(|n| n.values().sum()).collect();
        let total_weight: f64 = degree.iter().sum::<f64>() / 2.0;
        Graph {
            keys,
            adjacency,
            degree,
            total_weight,
        }
    }

    fn n(&self) -> usize {
        self.keys.len()
    }

    fn neighbor_community_weights(&self, node: usize, assignment: &[usize]) -> HashMap<usize, f64> {
        let mut weights = HashMap::new();
        for (&neighbor, &w) in &self.adjacency[node] {
            *weights.entry(assignment[neighbor]).or_insert(0.0) += w;
        }
        weights
    }

    /// Q = (1/2m) * Σ_ij [A_ij - k_i*k_j/(2m)] * δ(c_i, c_j) (§4.11).
    fn modularity(&self, assignment: &[usize]) -> f64 {
        if self.total_weight <= 0.0 {
            return 0.0;
        }
        let two_m = 2.0 * self.total_weight;
        let mut sum = 0.0;
        for i in 0..self.n() {
            for (&j, &a_ij) in &self.adjacency[i] {
                if assignment[i] == assignment[j] {
                    sum += a_ij - (self.degree[i] * self.degree[j]) / two_m;
                }
            }
        }
        sum / two_m
    }
}

/// Each node starts in its own community; repeatedly move a node into a
/// neighboring community if doing so improves modularity, until a full pass
/// makes no moves or `STEP_CAP` passes elapse (§4.11 step 2).
fn louvain(graph: &Graph) -> Vec<usize> {
    let n = graph.n();
    let mut assignment: Vec<usize> = (0..n).collect();
    if n == 0 {
        return assignment;
    }
    let two_m = 2.0 * graph.total_weight;
    if two_m <= 0.0 {
        return assignment;
    }

    // Sigma_tot[c]: total degree of all nodes currently in community `c`,
    // the standard Louvain bookkeeping for O(1) modularity-gain evaluation.
    let mut sigma_tot: HashMap<usize, f64> = (0..n).map(|i| (i, graph.degree[i])).collect();

    for _pass in 0..STEP_CAP {
        let mut moved = false;
        for node in 0..n {
            let current_community = assignment[node];
            let neighbor_weights = graph.neighbor_community_weights(node, &assignment);
            if neighbor_weights.is_empty() {
                continue;
            }
            let k_i = graph.degree[node];
            let weight_to_current = neighbor_weights.get(&current_community).copied().unwrap_or(0.0);
            let sigma_tot_current_without_i = sigma_tot.get(&current_community).copied().unwrap_or(k_i) - k_i;

            let mut best_community = current_community;
            let mut best_gain = 0.0;
            for (&candidate, &weight_to_candidate) in &neighbor_weights {
                if candidate == current_community {
                    continue;
                }
                let sigma_tot_candidate = sigma_tot.get(&candidate).copied().unwrap_or(0.0);
                // ΔQ of moving `node` from its current community into `candidate`.
                let gain = (weight_to_candidate - weight_to_current) / graph.total_weight
                    - k_i * (sigma_tot_candidate - sigma_tot_current_without_i) / (two_m * graph.total_weight);
                if gain > best_gain {
                    best_gain = gain;
                    best_community = candidate;
                }
            }
            if best_community != current_community && best_gain > 1e-12 {
                *sigma_tot.entry(current_community).or_insert(0.0) -= k_i;
                *sigma_tot.entry(best_community).or_insert(0.0) += k_i;
                assignment[node] = best_community;
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }
    assignment
}

/// Dissolves communities smaller than `min_size`: each member is
/// reassigned to the neighbor community to which it has the greatest total
/// edge weight (§4.11 step 3). Members with no neighbors keep their
/// singleton assignment.
fn merge_small_communities(graph: &Graph, assignment: &mut [usize], min_size: usize) {
    loop {
        let sizes = community_sizes(assignment);
        let mut any_small = false;
        for node in 0..graph.n() {
            let community = assignment[node];
            if sizes.get(&community).copied().unwrap_or(0) >= min_size {
                continue;
            }
            let neighbor_weights = graph.neighbor_community_weights(node, assignment);
            let target = neighbor_weights
                .iter()
                .filter(|(&c, _)| c != community)
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));
            if let Some((&target_community, _)) = target {
                assignment[node] = target_community;
                any_small = true;
            }
        }
        if !any_small {
            break;
        }
    }
}

fn community_sizes(assignment: &[usize]) -> HashMap<usize, usize> {
    let mut sizes = HashMap::new();
    for &c in assignment {
        *sizes.entry(c).or_insert(0) += 1;
    }
    sizes
}

fn group_members(graph: &Graph, assignment: &[usize]) -> Vec<Vec<String>> {
    let mut groups: HashMap<usize, Vec<String>> = HashMap::new();
    for (node, key) in graph.keys.iter().enumerate() {
        groups.entry(assignment[node]).or_default().push(key.clone());
    }
    groups.into_values().collect()
}
