use std::sync::Arc;

use tracing::debug;

use projectiq_core::error::{EmptyIndexError, Error, Result};
use projectiq_core::traits::{CompletionService, Retriever};

use crate::prompt::{join_context, PromptTemplate};

pub const DEFAULT_K: usize = 3;

/// Retrieve, stuff the context into the prompt, ask the model once.
pub struct RetrievalChain {
    completion: Arc<dyn CompletionService>,
    template: PromptTemplate,
    k: usize,
}

impl RetrievalChain {
    pub fn new(completion: Arc<dyn CompletionService>, template: PromptTemplate, k: usize) -> Self { Self { completion, template, k } }

    pub fn k(&self) -> usize { self.k }

    /// The prompt that [`answer`](Self::answer) would send.
    pub async fn prompt_for(&self, question: &str, retriever: Option<&dyn Retriever>) -> Result<String> {
        if question.trim().is_empty() {
            return Err(Error::InvalidQuestion);
        }
        let retriever = retriever.ok_or(EmptyIndexError::NotBuilt)?;
        let hits = retriever.retrieve(question, self.k).await?;
        debug!("Retrieved {} chunks for question", hits.len());
        Ok(self.template.render(&join_context(&hits), question))
    }

    pub async fn answer(&self, question: &str, retriever: Option<&dyn Retriever>) -> Result<String> {
        let prompt = self.prompt_for(question, retriever).await?;
        Ok(self.completion.complete(&prompt).await?)
    }
}
