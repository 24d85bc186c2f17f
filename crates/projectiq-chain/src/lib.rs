//! projectiq-chain
//!
//! Retrieval-augmented answering over the project index, and the
//! [`ProjectIq`] facade tying scanning, loading, chunking, indexing and
//! answering together.

pub mod chain;
pub mod completion;
pub mod engine;
pub mod prompt;

pub use chain::{RetrievalChain, DEFAULT_K};
pub use completion::OpenAiCompletion;
pub use engine::{ProjectIq, SyncReport};
pub use prompt::PromptTemplate;
