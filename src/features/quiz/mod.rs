
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::grader::AnswerGrader;
use super::{CONTEXT_CHAR_BUDGET, join_within_budget, parse_json_block};
use crate::database::{MetadataFilter, MistakeTracker, VectorStore};
use crate::generation::{TextGenerator, generate_blocking};
use crate::{Result, StudyError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
struct QuizPayload {
    questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradedAnswer {
    pub correct: bool,
    pub similarity: Option<f64>,
}

#[inline]
pub fn build_quiz_prompt(context: &str, count: usize) -> String {
    format!(
        "You are an expert educator preparing a short quiz from a student's notes.\n\n\
         Write exactly {count} questions that test understanding of the most important \
         concepts, definitions, and key facts in the context below. Each answer must be \
         one or two sentences that can be checked against the notes.\n\n\
         Respond with a single JSON object and nothing else, shaped like:\n\
         {{\"questions\": [{{\"question\": \"...\", \"answer\": \"...\"}}]}}\n\n\
         Context:\n---\n{context}\n---"
    )
}

/// Generates quizzes for a topic and records wrong answers
#[derive(Clone)]
pub struct QuizEngine {
    store: Arc<VectorStore>,
    generator: Arc<dyn TextGenerator>,
    grader: AnswerGrader,
    tracker: MistakeTracker,
    question_count: usize,
}

impl std::fmt::Debug for QuizEngine {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizEngine")
            .field("store", &self.store)
            .field("generator", &self.generator.model_name())
            .field("grader", &self.grader)
            .field("question_count", &self.question_count)
            .finish_non_exhaustive()
    }
}

impl QuizEngine {
    #[inline]
    pub fn new(
        store: Arc<VectorStore>,
        generator: Arc<dyn TextGenerator>,
        grader: AnswerGrader,
        tracker: MistakeTracker,
        question_count: usize,
    ) -> Result<Self> {
        if question_count == 0 {
            return Err(StudyError::Config(
                "Quiz question count must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            store,
            generator,
            grader,
            tracker,
            question_count,
        })
    }

    #[inline]
    pub fn question_count(&self) -> usize {
        self.question_count
    }

    #[inline]
    pub fn tracker(&self) -> &MistakeTracker {
        &self.tracker
    }

    /// Up to `question_count` questions drawn from the topic's notes; empty
    /// when nothing matches the topic
    #[inline]
    pub async fn generate_questions(&self, topic: &MetadataFilter) -> Result<Vec<QuizQuestion>> {
        let chunks = self.store.filter(topic).await?;
        if chunks.is_empty() {
            warn!("No notes found for {}", topic);
            return Ok(Vec::new());
        }

        let context = join_within_budget(&chunks, CONTEXT_CHAR_BUDGET);
        let prompt = build_quiz_prompt(&context, self.question_count);
        let output = generate_blocking(Arc::clone(&self.generator), prompt).await?;

        let mut questions = parse_json_block::<QuizPayload>(&output)?.questions;
        if questions.len() < self.question_count {
            warn!(
                "Generator returned {} of {} requested questions",
                questions.len(),
                self.question_count
            );
        }
        questions.truncate(self.question_count);

        info!("Prepared {} quiz questions for {}", questions.len(), topic);
        Ok(questions)
    }

    /// Grade one answer; a wrong answer is logged as a mistake under `topic`
    #[inline]
    pub async fn check_answer(
        &self,
        topic: &MetadataFilter,
        question: &QuizQuestion,
        user_answer: &str,
    ) -> Result<GradedAnswer> {
        let (correct, similarity) = self.grader.score(user_answer, &question.answer).await?;

        if correct {
            debug!("Correct answer for: {}", question.question);
        } else {
            self.tracker
                .log_mistake(&topic.to_string(), &question.question)
                .await?;
        }

        Ok(GradedAnswer {
            correct,
            similarity,
        })
    }
}
