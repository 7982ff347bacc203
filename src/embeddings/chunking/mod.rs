#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::config::{ChunkingSettings, validate_chunk_bounds};
use crate::Result;

/// Separators tried in order: paragraphs, lines, words, characters
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Structural metadata attached to every chunk of a document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the originating document
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_type: Option<String>,
}

impl ChunkMetadata {
    #[inline]
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

/// A trimmed, non-empty span of a document together with its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// How storage path segments map onto chunk metadata.
///
/// The remaining segments (file name included) are read positionally:
/// three or more give specialization, course and notes type; exactly two
/// give course and notes type; anything shorter leaves only `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathConvention {
    /// Drop a fixed number of leading segments (repository root and data stage)
    Positional { stripped_segments: usize },
    /// Interpret the segments below a corpus root
    RelativeTo(PathBuf),
}

impl Default for PathConvention {
    #[inline]
    fn default() -> Self {
        Self::Positional {
            stripped_segments: 2,
        }
    }
}

impl PathConvention {
    #[inline]
    pub fn metadata_for(&self, source_path: &Path) -> ChunkMetadata {
        let mut metadata = ChunkMetadata::from_source(source_path.to_string_lossy());

        let segments: Vec<String> = match self {
            Self::Positional { stripped_segments } => normal_segments(source_path)
                .into_iter()
                .skip(*stripped_segments)
                .collect(),
            Self::RelativeTo(root) => match source_path.strip_prefix(root) {
                Ok(relative) => normal_segments(relative),
                Err(_) => {
                    debug!(
                        "{} is outside {}, attaching source only",
                        source_path.display(),
                        root.display()
                    );
                    Vec::new()
                }
            },
        };

        match segments.as_slice() {
            [specialization, course, notes_type, ..] => {
                metadata.specialization = Some(specialization.clone());
                metadata.course = Some(course.clone());
                metadata.notes_type = Some(notes_type.clone());
            }
            [course, notes_type] => {
                metadata.course = Some(course.clone());
                metadata.notes_type = Some(notes_type.clone());
            }
            _ => {}
        }

        metadata
    }
}

fn normal_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Recursive character splitter with overlapping merge windows.
/// Lengths are counted in Unicode scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunk_bounds(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    #[inline]
    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into trimmed, non-empty pieces of at most `chunk_size` characters
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &DEFAULT_SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        let mut separator = "";
        let mut remaining: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                remaining = separators.get(i + 1..).unwrap_or(&[]);
                break;
            }
        }

        let mut good_splits: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    final_chunks.push(trimmed.to_string());
                }
            } else {
                final_chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &piece in splits {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }

                if !current.is_empty() {
                    push_joined(&mut docs, &current);

                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        match current.pop_front() {
                            Some((_, dropped)) => total -= dropped,
                            None => break,
                        }
                    }
                }
            }

            current.push_back((piece, len));
            total += len;
        }

        push_joined(&mut docs, &current);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, current: &VecDeque<(&str, usize)>) {
    let joined: String = current.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// Split on `separator`, keeping each separator at the start of the following piece.
/// The empty separator splits into single characters. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .filter_map(|(start, c)| text.get(start..start + c.len_utf8()))
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if let Some(piece) = text.get(start..index).filter(|p| !p.is_empty()) {
            pieces.push(piece);
        }
        start = index;
    }
    if let Some(piece) = text.get(start..).filter(|p| !p.is_empty()) {
        pieces.push(piece);
    }

    pieces
}

#[inline]
fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split a document into chunks and attach the metadata its path implies
#[inline]
pub fn chunk_document(
    document_text: &str,
    source_path: &Path,
    splitter: &TextSplitter,
    convention: &PathConvention,
) -> Vec<Chunk> {
    let metadata = convention.metadata_for(source_path);
    let chunks: Vec<Chunk> = splitter
        .split_text(document_text)
        .into_iter()
        .map(|text| Chunk {
            text,
            metadata: metadata.clone(),
        })
        .collect();

    debug!(
        "Chunked {} into {} chunks",
        source_path.display(),
        chunks.len()
    );

    chunks
}

/// Chunk a document using the default positional path convention
#[inline]
pub fn chunk(
    document_text: &str,
    source_path: &Path,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>> {
    let splitter = TextSplitter::new(chunk_size, chunk_overlap)?;
    Ok(chunk_document(
        document_text,
        source_path,
        &splitter,
        &PathConvention::default(),
    ))
}
