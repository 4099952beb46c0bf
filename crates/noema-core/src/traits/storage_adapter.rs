use crate::deadline::Deadline;
use crate::errors::NoemaResult;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMetric {
    Cosine,
}

/// A search-view field configuration: which analyzer applies to which
/// document field (§4.3).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ViewFieldConfig {
    pub field: String,
    pub analyzer: String,
}

/// Thin façade over the underlying document/graph store (C1, §4.1).
/// Every `ensure_*` call is idempotent. Implementations distinguish
/// transient from permanent failures via [`crate::errors::StorageError`].
#[allow(async_fn_in_trait)]
pub trait StorageAdapter: Send + Sync {
    async fn ensure_collection(&self, name: &str, deadline: Deadline) -> NoemaResult<()>;
    async fn ensure_edge_collection(&self, name: &str, deadline: Deadline) -> NoemaResult<()>;
    async fn ensure_graph(
        &self,
        name: &str,
        edge_collection: &str,
        vertex_collections: &[String],
        deadline: Deadline,
    ) -> NoemaResult<()>;
    async fn ensure_vector_index(
        &self,
        collection: &str,
        field: &str,
        dim: usize,
        metric: IndexMetric,
        n_lists: usize,
        deadline: Deadline,
    ) -> NoemaResult<()>;

    async fn get_document(
        &self,
        collection: &str,
        key: &str,
        deadline: Deadline,
    ) -> NoemaResult<Option<Value>>;
    async fn create_document(
        &self,
        collection: &str,
        doc: Value,
        deadline: Deadline,
    ) -> NoemaResult<String>;
    async fn update_document(
        &self,
        collection: &str,
        key: &str,
        patch: Value,
        deadline: Deadline,
    ) -> NoemaResult<()>;
    async fn delete_document(&self, collection: &str, key: &str, deadline: Deadline) -> NoemaResult<()>;

    async fn execute_query(
        &self,
        text: &str,
        bind_vars: Value,
        deadline: Deadline,
    ) -> NoemaResult<Vec<Value>>;

    /// Current live configuration of a search view, `None` if it doesn't
    /// exist. Used by the view manager's `CHECK_CONFIG` comparison (§4.3).
    async fn view_config(&self, name: &str, deadline: Deadline) -> NoemaResult<Option<Vec<ViewFieldConfig>>>;
    async fn create_view(
        &self,
        name: &str,
        collection: &str,
        fields: &[ViewFieldConfig],
        deadline: Deadline,
    ) -> NoemaResult<()>;
    /// Adds a second linked collection to an existing view without
    /// recreating it (§11 supplemented feature).
    async fn add_linked_collection(
        &self,
        view: &str,
        collection: &str,
        fields: &[ViewFieldConfig],
        deadline: Deadline,
    ) -> NoemaResult<()>;
    async fn delete_view(&self, name: &str, deadline: Deadline) -> NoemaResult<()>;
}
