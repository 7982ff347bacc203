use super::*;
use crate::StudyError;

fn non_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn sample_notes() -> String {
    let paragraph = "Recurrent networks carry a hidden state across time steps. \
                     Gated units such as the LSTM and the GRU mitigate vanishing gradients.";
    let mut text = String::new();
    for i in 0..12 {
        text.push_str(&format!("Section {i}\n{paragraph}\n\n"));
    }
    text
}

#[test]
fn rejects_invalid_bounds() {
    assert!(matches!(
        TextSplitter::new(100, 100),
        Err(StudyError::Config(_))
    ));
    assert!(matches!(
        TextSplitter::new(100, 150),
        Err(StudyError::Config(_))
    ));
    assert!(matches!(TextSplitter::new(0, 0), Err(StudyError::Config(_))));
    assert!(TextSplitter::new(100, 99).is_ok());
}

#[test]
fn short_text_is_a_single_trimmed_chunk() {
    let splitter = TextSplitter::new(100, 10).expect("valid bounds");
    let chunks = splitter.split_text("  A short note about attention.  \n");
    assert_eq!(chunks, vec!["A short note about attention.".to_string()]);
}

#[test]
fn empty_and_whitespace_text_yield_nothing() {
    let splitter = TextSplitter::new(50, 5).expect("valid bounds");
    assert!(splitter.split_text("").is_empty());
    assert!(splitter.split_text(" \n\n \n ").is_empty());
}

#[test]
fn every_chunk_respects_size() {
    let text = sample_notes();
    for (size, overlap) in [(40, 0), (80, 20), (200, 50), (1000, 200)] {
        let splitter = TextSplitter::new(size, overlap).expect("valid bounds");
        let chunks = splitter.split_text(&text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= size,
                "chunk of {} chars exceeds {}",
                chunk.chars().count(),
                size
            );
            assert_eq!(chunk.trim(), chunk);
            assert!(!chunk.is_empty());
        }
    }
}

#[test]
fn zero_overlap_preserves_content() {
    let text = sample_notes();
    let splitter = TextSplitter::new(60, 0).expect("valid bounds");
    let chunks = splitter.split_text(&text);

    let rebuilt: String = chunks.iter().map(|c| non_whitespace(c)).collect();
    assert_eq!(rebuilt, non_whitespace(&text));
}

#[test]
fn separator_free_text_overlaps_exactly() {
    let text: String = ('a'..='z').cycle().take(100).collect();
    let splitter = TextSplitter::new(10, 3).expect("valid bounds");
    let chunks = splitter.split_text(&text);

    assert!(chunks.len() > 1);
    for pair in chunks.windows(2) {
        let previous: Vec<char> = pair[0].chars().collect();
        let next: Vec<char> = pair[1].chars().collect();
        assert_eq!(previous.len(), 10);
        assert_eq!(&previous[previous.len() - 3..], &next[..3]);
    }
    assert!(text.ends_with(chunks.last().map(String::as_str).unwrap_or_default()));
}

#[test]
fn prefers_paragraph_boundaries() {
    let text = "First paragraph line.\n\nSecond paragraph line.";
    let splitter = TextSplitter::new(30, 0).expect("valid bounds");
    let chunks = splitter.split_text(text);
    assert_eq!(
        chunks,
        vec![
            "First paragraph line.".to_string(),
            "Second paragraph line.".to_string()
        ]
    );
}

#[test]
fn counts_characters_not_bytes() {
    let text = "é".repeat(25);
    let splitter = TextSplitter::new(10, 0).expect("valid bounds");
    let chunks = splitter.split_text(&text);
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.chars().count() <= 10));
}

#[test]
fn positional_metadata_by_depth() {
    let convention = PathConvention::default();

    let full = convention.metadata_for(Path::new("repo/processed/DL/RNNs/Lectures.txt"));
    assert_eq!(full.source, "repo/processed/DL/RNNs/Lectures.txt");
    assert_eq!(full.specialization.as_deref(), Some("DL"));
    assert_eq!(full.course.as_deref(), Some("RNNs"));
    assert_eq!(full.notes_type.as_deref(), Some("Lectures.txt"));

    let partial = convention.metadata_for(Path::new("repo/processed/RNNs/Lectures.txt"));
    assert_eq!(partial.specialization, None);
    assert_eq!(partial.course.as_deref(), Some("RNNs"));
    assert_eq!(partial.notes_type.as_deref(), Some("Lectures.txt"));

    let shallow = convention.metadata_for(Path::new("repo/processed/notes.txt"));
    assert_eq!(shallow, ChunkMetadata::from_source("repo/processed/notes.txt"));
}

#[test]
fn absolute_paths_ignore_root_component() {
    let convention = PathConvention::default();
    let metadata = convention.metadata_for(Path::new("/repo/processed/DL/RNNs/Lectures/week1.txt"));
    assert_eq!(metadata.specialization.as_deref(), Some("DL"));
    assert_eq!(metadata.course.as_deref(), Some("RNNs"));
    assert_eq!(metadata.notes_type.as_deref(), Some("Lectures"));
}

#[test]
fn relative_convention_reads_below_root() {
    let convention = PathConvention::RelativeTo(PathBuf::from("/home/me/notes/processed"));

    let inside =
        convention.metadata_for(Path::new("/home/me/notes/processed/ML/Regression/Labs/lab1.txt"));
    assert_eq!(inside.specialization.as_deref(), Some("ML"));
    assert_eq!(inside.course.as_deref(), Some("Regression"));
    assert_eq!(inside.notes_type.as_deref(), Some("Labs"));

    let outside = convention.metadata_for(Path::new("/tmp/ML/Regression/Labs/lab1.txt"));
    assert_eq!(outside, ChunkMetadata::from_source("/tmp/ML/Regression/Labs/lab1.txt"));
}

#[test]
fn chunk_document_shares_metadata() {
    let splitter = TextSplitter::new(80, 10).expect("valid bounds");
    let chunks = chunk_document(
        &sample_notes(),
        Path::new("root/processed/DL/RNNs/Lectures.txt"),
        &splitter,
        &PathConvention::default(),
    );

    assert!(chunks.len() > 1);
    assert!(
        chunks
            .iter()
            .all(|c| c.metadata.course.as_deref() == Some("RNNs"))
    );
}

#[test]
fn chunk_validates_bounds() {
    let result = chunk("text", Path::new("a/b/c.txt"), 10, 10);
    assert!(matches!(result, Err(StudyError::Config(_))));

    let chunks = chunk("text", Path::new("a/b/c.txt"), 10, 2).expect("valid bounds");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].metadata.source, "a/b/c.txt");
}
