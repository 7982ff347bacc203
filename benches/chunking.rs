use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::path::Path;
use study_assistant::embeddings::{PathConvention, TextSplitter, chunk_document};

fn lecture_notes() -> String {
    let paragraph = "Recurrent networks carry a hidden state from one time step to the next. \
                     A GRU merges the forget and input gates into a single update gate, \
                     while an LSTM keeps a separate memory cell guarded by three gates.";
    (0..400)
        .map(|i| format!("Section {i}\n{paragraph}\n{paragraph}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let notes = lecture_notes();
    let splitter = TextSplitter::new(1000, 200).expect("default bounds are valid");
    let convention = PathConvention::default();
    let path = Path::new("data/processed/DL/RNNs/Lectures.txt");

    c.bench_function("chunking", |b| {
        b.iter(|| {
            chunk_document(
                black_box(&notes),
                black_box(path),
                &splitter,
                &convention,
            )
        })
    });

    let unbroken = "x".repeat(200_000);
    c.bench_function("chunking_without_separators", |b| {
        b.iter(|| splitter.split_text(black_box(&unbroken)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
