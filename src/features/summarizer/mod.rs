#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::CONTEXT_CHAR_BUDGET;
use crate::Result;
use crate::database::{MetadataFilter, VectorStore};
use crate::generation::{TextGenerator, generate_blocking};

#[inline]
pub fn build_map_prompt(text: &str) -> String {
    format!(
        "You are an expert academic assistant skilled at distilling complex information. \
         Your task is to analyze the following text from a student's notes and extract the most \
         critical information.\n\n\
         Focus on identifying and clearly stating the main concepts, key definitions, important \
         formulas, and core principles. Ignore any filler text, examples, or conversational parts. \
         Present the output as a concise list of key points.\n\n\
         Text:\n\"{text}\"\n\nConcise Key Points:"
    )
}

#[inline]
pub fn build_combine_prompt(key_points: &str) -> String {
    format!(
        "You are a master of synthesis, tasked with creating a final, high-quality summary from a \
         collection of key points extracted from a student's notes.\n\n\
         Your goal is to weave these individual points into a single, coherent, and well-organized \
         summary. The final output should be easy to read, logically structured, and cover all the \
         essential information from the provided points. Start with a brief overview, then \
         elaborate on the key topics.\n\n\
         Collection of Key Points:\n\"{key_points}\"\n\nComprehensive Final Summary:"
    )
}

/// Map-reduce summarization of a topic's notes
#[derive(Clone)]
pub struct Summarizer {
    store: Arc<VectorStore>,
    generator: Arc<dyn TextGenerator>,
    combine_budget: usize,
}

impl std::fmt::Debug for Summarizer {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("store", &self.store)
            .field("generator", &self.generator.model_name())
            .field("combine_budget", &self.combine_budget)
            .finish()
    }
}

impl Summarizer {
    #[inline]
    pub fn new(store: Arc<VectorStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            store,
            generator,
            combine_budget: CONTEXT_CHAR_BUDGET,
        }
    }

    /// Characters of key points allowed in one combine prompt before they are collapsed
    #[inline]
    #[must_use]
    pub fn with_combine_budget(mut self, budget: usize) -> Self {
        self.combine_budget = budget.max(1);
        self
    }

    /// Summary of every chunk matching `topic`, or `None` when nothing matches
    #[inline]
    pub async fn summarize(&self, topic: &MetadataFilter) -> Result<Option<String>> {
        let chunks = self.store.filter(topic).await?;
        if chunks.is_empty() {
            warn!("No notes found for {}", topic);
            return Ok(None);
        }

        info!("Summarizing {} chunks for {}", chunks.len(), topic);

        let mut key_points = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            key_points.push(self.run(build_map_prompt(&chunk.text)).await?);
        }

        let key_points = self.collapse(key_points).await?;
        let summary = self.run(build_combine_prompt(&key_points.join("\n\n"))).await?;

        info!("Summary for {} is {} characters", topic, summary.len());
        Ok(Some(summary))
    }

    /// Combine groups of key points until they fit the combine budget.
    ///
    /// Stops once a round no longer reduces the number of groups, so a single
    /// oversized point is passed through instead of looping.
    async fn collapse(&self, mut key_points: Vec<String>) -> Result<Vec<String>> {
        while total_chars(&key_points) > self.combine_budget {
            let groups = group_within_budget(&key_points, self.combine_budget);
            if groups.len() >= key_points.len() {
                warn!("Key points exceed the combine budget and cannot be collapsed further");
                break;
            }

            debug!(
                "Collapsing {} key points into {} groups",
                key_points.len(),
                groups.len()
            );

            let mut collapsed = Vec::with_capacity(groups.len());
            for group in groups {
                collapsed.push(self.run(build_combine_prompt(&group.join("\n\n"))).await?);
            }
            key_points = collapsed;
        }

        Ok(key_points)
    }

    async fn run(&self, prompt: String) -> Result<String> {
        Ok(generate_blocking(Arc::clone(&self.generator), prompt)
            .await?
            .trim()
            .to_string())
    }
}

fn total_chars(points: &[String]) -> usize {
    points.iter().map(|p| p.chars().count()).sum()
}

/// Greedy grouping of consecutive points, each group within `budget` when possible
fn group_within_budget(points: &[String], budget: usize) -> Vec<Vec<&str>> {
    let mut groups: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for point in points {
        let len = point.chars().count();
        if !current.is_empty() && current_len + len > budget {
            groups.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push(point);
        current_len += len;
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
}
