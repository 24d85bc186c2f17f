//! projectiq-vector
//!
//! Persistent chunk embeddings on LanceDB: full-rebuild writes, reload with
//! embedder compatibility checks, cosine top-k search.

pub mod schema;
pub mod search;
pub mod store;
pub mod table;
pub mod writer;

pub use store::{IndexHandle, IndexInfo, VectorStore};
