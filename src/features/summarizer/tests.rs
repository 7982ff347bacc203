use super::*;
use crate::StudyError;
use crate::features::fixtures::notes_store;
use crate::generation::scripted::ScriptedGenerator;

const NOTES: [(&str, &str); 4] = [
    ("RNNs", "A GRU has two gates: an update gate and a reset gate."),
    ("RNNs", "An LSTM keeps a separate memory cell."),
    ("RNNs", "Backpropagation through time unrolls the network."),
    ("CNNs", "Max pooling downsamples feature maps."),
];

/// Map prompts get a fixed-width key point, combine prompts a short summary
fn map_reduce_generator() -> Arc<ScriptedGenerator> {
    Arc::new(ScriptedGenerator::new(|prompt| {
        if prompt.starts_with("You are an expert academic assistant") {
            Ok("- key point of twenty".to_string())
        } else {
            Ok("  SUMMARY  ".to_string())
        }
    }))
}

fn combine_prompts(generator: &ScriptedGenerator) -> usize {
    generator
        .prompts()
        .iter()
        .filter(|p| p.starts_with("You are a master of synthesis"))
        .count()
}

#[test]
fn prompts_wrap_their_input() {
    let map = build_map_prompt("GRUs have two gates.");
    assert!(map.contains("Text:\n\"GRUs have two gates.\""));
    assert!(map.ends_with("Concise Key Points:"));

    let combine = build_combine_prompt("- two gates");
    assert!(combine.contains("Collection of Key Points:\n\"- two gates\""));
    assert!(combine.ends_with("Comprehensive Final Summary:"));
}

#[tokio::test]
async fn maps_each_chunk_then_combines_once() {
    let (store, _embedder, _temp_dir) = notes_store(&NOTES).await;
    let generator = map_reduce_generator();

    let summary = Summarizer::new(store, Arc::clone(&generator) as Arc<dyn TextGenerator>)
        .summarize(&MetadataFilter::course("RNNs"))
        .await
        .expect("should summarize");

    assert_eq!(summary.as_deref(), Some("SUMMARY"));

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 4);
    assert!(prompts[0].contains("A GRU has two gates"));
    assert!(prompts.iter().all(|p| !p.contains("Max pooling")));
    assert_eq!(combine_prompts(&generator), 1);
}

#[tokio::test]
async fn oversized_key_points_are_collapsed_first() {
    let (store, _embedder, _temp_dir) = notes_store(&NOTES).await;
    let generator = map_reduce_generator();

    let summary = Summarizer::new(store, Arc::clone(&generator) as Arc<dyn TextGenerator>)
        .with_combine_budget(45)
        .summarize(&MetadataFilter::course("RNNs"))
        .await
        .expect("should summarize");

    assert_eq!(summary.as_deref(), Some("SUMMARY"));
    // Three 21-character points: two collapse groups, then the final combine
    assert_eq!(combine_prompts(&generator), 3);
}

#[tokio::test]
async fn uncollapsible_points_still_produce_a_summary() {
    let (store, _embedder, _temp_dir) = notes_store(&NOTES).await;
    let generator = map_reduce_generator();

    let summary = Summarizer::new(store, Arc::clone(&generator) as Arc<dyn TextGenerator>)
        .with_combine_budget(10)
        .summarize(&MetadataFilter::course("RNNs"))
        .await
        .expect("should summarize");

    assert_eq!(summary.as_deref(), Some("SUMMARY"));
    assert_eq!(combine_prompts(&generator), 1);
}

#[tokio::test]
async fn unknown_topic_has_no_summary() {
    let (store, _embedder, _temp_dir) = notes_store(&NOTES).await;
    let generator = map_reduce_generator();

    let summary = Summarizer::new(store, Arc::clone(&generator) as Arc<dyn TextGenerator>)
        .summarize(&MetadataFilter::course("GANs"))
        .await
        .expect("should succeed");

    assert!(summary.is_none());
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn generator_errors_abort_the_summary() {
    let (store, _embedder, _temp_dir) = notes_store(&NOTES).await;
    let generator = Arc::new(ScriptedGenerator::new(|_| {
        Err(StudyError::Provider("model offline".to_string()))
    }));

    let result = Summarizer::new(store, generator)
        .summarize(&MetadataFilter::course("RNNs"))
        .await;
    assert!(matches!(result, Err(StudyError::Provider(_))));
}

#[test]
fn grouping_is_greedy_and_ordered() {
    let points: Vec<String> = ["aaaa", "bbbb", "cccc", "dd"]
        .iter()
        .map(ToString::to_string)
        .collect();

    assert_eq!(
        group_within_budget(&points, 8),
        vec![vec!["aaaa", "bbbb"], vec!["cccc", "dd"]]
    );
    assert_eq!(group_within_budget(&points, 3).len(), 4);
    assert_eq!(total_chars(&points), 14);
}
