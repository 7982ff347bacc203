
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::{CONTEXT_CHAR_BUDGET, join_within_budget, parse_json_block};
use crate::Result;
use crate::database::{MetadataFilter, VectorStore};
use crate::generation::{TextGenerator, generate_blocking};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
struct FlashcardDeck {
    flashcards: Vec<Flashcard>,
}

const FORMAT_INSTRUCTIONS: &str = "Respond with a single JSON object and nothing else, shaped like:\n\
{\"flashcards\": [{\"question\": \"...\", \"answer\": \"...\"}]}";

#[inline]
pub fn build_flashcard_prompt(context: &str) -> String {
    format!(
        "You are an expert educator and study assistant. Your task is to analyze the provided text \
         from a student's notes and generate a series of flashcards to help them study.\n\n\
         Based on the context below, create a list of clear and concise question-and-answer pairs \
         that cover the most important concepts, definitions, and key facts in the text.\n\n\
         {FORMAT_INSTRUCTIONS}\n\nContext:\n---\n{context}\n---"
    )
}

/// Turns a topic's notes into question/answer cards
#[derive(Clone)]
pub struct FlashcardGenerator {
    store: Arc<VectorStore>,
    generator: Arc<dyn TextGenerator>,
}

impl std::fmt::Debug for FlashcardGenerator {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashcardGenerator")
            .field("store", &self.store)
            .field("generator", &self.generator.model_name())
            .finish()
    }
}

impl FlashcardGenerator {
    #[inline]
    pub fn new(store: Arc<VectorStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self { store, generator }
    }

    /// Flashcards for every chunk matching `topic`; empty when nothing matches
    #[inline]
    pub async fn generate(&self, topic: &MetadataFilter) -> Result<Vec<Flashcard>> {
        let chunks = self.store.filter(topic).await?;
        if chunks.is_empty() {
            warn!("No notes found for {}", topic);
            return Ok(Vec::new());
        }

        let context = join_within_budget(&chunks, CONTEXT_CHAR_BUDGET);
        let output =
            generate_blocking(Arc::clone(&self.generator), build_flashcard_prompt(&context)).await?;

        let deck: FlashcardDeck = parse_json_block(&output)?;
        info!("Generated {} flashcards for {}", deck.flashcards.len(), topic);
        Ok(deck.flashcards)
    }
}
