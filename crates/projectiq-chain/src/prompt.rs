use projectiq_core::error::{Error, Result};
use projectiq_core::types::RetrievedChunk;

pub const DEFAULT_TEMPLATE: &str = "Answer the question based only on the following context:\n{context}\n\nQuestion: {question}";

const CONTEXT: &str = "{context}";
const QUESTION: &str = "{question}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self { Self { template: DEFAULT_TEMPLATE.to_string() } }
}

impl PromptTemplate {
    /// A template must mention both `{context}` and `{question}`.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for slot in [CONTEXT, QUESTION] {
            if !template.contains(slot) {
                return Err(Error::InvalidConfig(format!("prompt template is missing {slot}")));
            }
        }
        Ok(Self { template })
    }

    pub fn render(&self, context: &str, question: &str) -> String {
        // Single pass so a `{question}` inside retrieved text is left alone.
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(CONTEXT) {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION) {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// Retrieved contents in retrieval order, separated by blank lines.
pub fn join_context(hits: &[RetrievedChunk]) -> String {
    hits.iter().map(|h| h.chunk.content.as_str()).collect::<Vec<_>>().join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_default_template() {
        let prompt = PromptTemplate::default().render("A\n\nB", "When is the pour?");
        assert_eq!(prompt, "Answer the question based only on the following context:\nA\n\nB\n\nQuestion: When is the pour?");
    }

    #[test]
    fn placeholders_inside_context_are_not_expanded() {
        let prompt = PromptTemplate::new("{context}|{question}").unwrap().render("see {question}", "q");
        assert_eq!(prompt, "see {question}|q");
    }

    #[test]
    fn template_without_slots_is_rejected() {
        assert!(PromptTemplate::new("Just {context}").is_err());
    }
}
