// Features module
// Study tools built on the store, the embedding provider and the generator

pub mod flashcards;
pub mod grader;
pub mod quiz;
pub mod summarizer;

#[cfg(test)]
pub(crate) mod fixtures;

use serde::de::DeserializeOwned;

use crate::embeddings::{Chunk, preview};
use crate::{Result, StudyError};

pub use flashcards::{Flashcard, FlashcardGenerator, build_flashcard_prompt};
pub use grader::{AnswerGrader, cosine_similarity, is_correct};
pub use quiz::{GradedAnswer, QuizEngine, QuizQuestion, build_quiz_prompt};
pub use summarizer::{Summarizer, build_combine_prompt, build_map_prompt};

/// Upper bound on the text stuffed into a single generator prompt
pub const CONTEXT_CHAR_BUDGET: usize = 12_000;

/// Parse the JSON object embedded in generator output.
///
/// Models tend to wrap JSON in prose or code fences, so everything from the
/// first `{` to the last `}` is taken as the payload.
#[inline]
pub fn parse_json_block<T: DeserializeOwned>(output: &str) -> Result<T> {
    let block = output
        .find('{')
        .zip(output.rfind('}'))
        .filter(|(start, end)| start < end)
        .and_then(|(start, end)| output.get(start..=end))
        .ok_or_else(|| {
            StudyError::Provider(format!(
                "Generator output contains no JSON object: {}",
                preview(output)
            ))
        })?;

    serde_json::from_str(block).map_err(|e| {
        StudyError::Provider(format!(
            "Generator output is not valid JSON ({e}): {}",
            preview(block)
        ))
    })
}

/// Join chunk texts in order, stopping before the budget is exceeded.
///
/// The first chunk is always included so a non-empty topic never yields an
/// empty context.
pub(crate) fn join_within_budget(chunks: &[Chunk], budget: usize) -> String {
    let mut joined = String::new();
    let mut used = 0;

    for chunk in chunks {
        let len = chunk.text.chars().count();
        if !joined.is_empty() && used + len + 2 > budget {
            break;
        }
        if !joined.is_empty() {
            joined.push_str("\n\n");
            used += 2;
        }
        joined.push_str(&chunk.text);
        used += len;
    }

    joined
}
