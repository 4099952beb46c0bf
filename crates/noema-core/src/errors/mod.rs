mod embedding_error;
mod noema_error;
mod retrieval_error;
mod storage_error;

pub use embedding_error::EmbeddingError;
pub use noema_error::{NoemaError, NoemaResult};
pub use retrieval_error::RetrievalError;
pub use storage_error::StorageError;
