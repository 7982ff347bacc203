use super::*;

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[test]
fn reports_dimension_in_model_name() {
    let embedder = HashingEmbedder::new(128).expect("valid dimension");
    assert_eq!(embedder.model_name(), "hashing-128");
    assert_eq!(embedder.dimension(), 128);
    assert!(HashingEmbedder::new(0).is_err());
}

#[test]
fn vectors_are_unit_length() {
    let embedder = HashingEmbedder::new(64).expect("valid dimension");
    let vectors = embedder
        .embed(&texts(&["Attention is all you need", "GRU gates"]))
        .expect("hashing never fails");

    assert_eq!(vectors.len(), 2);
    for vector in vectors {
        assert_eq!(vector.len(), 64);
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}

#[test]
fn deterministic_and_batch_independent() {
    let embedder = HashingEmbedder::new(256).expect("valid dimension");
    let inputs = texts(&["backpropagation through time", "the sky is blue", "LSTM"]);

    let batched = embedder.embed(&inputs).expect("batch embed");
    for (input, expected) in inputs.iter().zip(&batched) {
        let single = embedder.embed_one(input).expect("single embed");
        assert_eq!(&single, expected);
    }
    assert_eq!(embedder.embed(&inputs).expect("repeat embed"), batched);
}

#[test]
fn case_and_punctuation_are_ignored() {
    let embedder = HashingEmbedder::new(256).expect("valid dimension");
    let vectors = embedder
        .embed(&texts(&["An RNN, processes sequences!", "an rnn processes SEQUENCES"]))
        .expect("hashing never fails");
    assert_eq!(vectors[0], vectors[1]);
}

#[test]
fn text_without_tokens_is_zero_vector() {
    let embedder = HashingEmbedder::new(32).expect("valid dimension");
    let vector = embedder.embed_one("  ?! ").expect("hashing never fails");
    assert!(vector.iter().all(|v| *v == 0.0));
}
