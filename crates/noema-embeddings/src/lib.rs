//! Content-addressed embedding cache wrapping an injected `Embedder`, plus
//! L2-normalization vector utilities (C2).

pub mod cache;
pub mod normalize;
pub mod vector;

pub use cache::EmbeddingCache;
