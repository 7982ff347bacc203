use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::database::{MetadataField, MetadataFilter};
use crate::embeddings::{OllamaClient, preview};
use crate::indexer::{BuildMode, BuildReport};

/// Filter built from the optional path-derived metadata values given on the command line
#[inline]
pub fn topic_filter(
    specialization: Option<String>,
    course: Option<String>,
    notes_type: Option<String>,
) -> MetadataFilter {
    [
        (MetadataField::Specialization, specialization),
        (MetadataField::Course, course),
        (MetadataField::NotesType, notes_type),
    ]
    .into_iter()
    .filter_map(|(field, value)| value.map(|value| (field, value)))
    .fold(MetadataFilter::new(), |filter, (field, value)| {
        filter.with(field, value)
    })
}

/// Index the processed notes directory
#[inline]
pub async fn build_index(ctx: &AppContext, rebuild: bool) -> Result<BuildReport> {
    let root = ctx.config().processed_path();
    let mode = if rebuild {
        BuildMode::Rebuild
    } else {
        BuildMode::Append
    };

    info!("Building index from {} ({:?})", root.display(), mode);

    let report = ctx
        .indexer()?
        .with_progress(true)
        .build(&root, mode)
        .await
        .with_context(|| format!("Failed to build index from {}", root.display()))?;

    println!("Build complete!");
    println!("  Documents indexed: {}", report.documents);
    println!("  Chunks created: {}", report.chunks);
    println!("  Records written: {}", report.records_written);

    Ok(report)
}

#[inline]
pub async fn ask(ctx: &AppContext, question: &str, json: bool) -> Result<()> {
    let answer = ctx.qa_chain().await?.ask(question).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("{}", style("Sources:").bold());
        for (i, chunk) in answer.sources.iter().enumerate() {
            println!("  {}. {} - {}", i + 1, chunk.metadata.source, preview(&chunk.text));
        }
    }

    Ok(())
}

#[inline]
pub async fn search(ctx: &AppContext, query: &str, filter: &MetadataFilter) -> Result<()> {
    let retriever = ctx.retriever().await?;
    let results = if filter.is_empty() {
        retriever.retrieve_scored(query).await?
    } else {
        retriever.retrieve_filtered(query, filter).await?
    };

    if results.is_empty() {
        println!("No matching notes found.");
        return Ok(());
    }

    for (i, hit) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {}",
            i + 1,
            hit.distance,
            style(&hit.chunk.metadata.source).cyan()
        );
        println!("   {}", preview(&hit.chunk.text));
    }

    Ok(())
}

#[inline]
pub async fn summarize(ctx: &AppContext, topic: &MetadataFilter) -> Result<()> {
    match ctx.summarizer().summarize(topic).await? {
        Some(summary) => {
            println!("{}", style(format!("Summary of {topic}")).bold());
            println!();
            println!("{summary}");
        }
        None => println!("No notes found for {topic}."),
    }
    Ok(())
}

#[inline]
pub async fn flashcards(ctx: &AppContext, topic: &MetadataFilter, json: bool) -> Result<()> {
    let cards = ctx.flashcards().generate(topic).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cards)?);
        return Ok(());
    }

    if cards.is_empty() {
        println!("No flashcards generated for {topic}.");
        return Ok(());
    }

    for (i, card) in cards.iter().enumerate() {
        println!("{} {}", style(format!("Q{}:", i + 1)).bold(), card.question);
        println!("{} {}", style(format!("A{}:", i + 1)).dim(), card.answer);
        println!();
    }
    Ok(())
}

/// Interactive quiz on stdin; wrong answers are recorded as mistakes
#[inline]
pub async fn quiz(ctx: &AppContext, topic: &MetadataFilter, count: Option<usize>) -> Result<()> {
    let engine = ctx.quiz_engine(count).await?;
    let questions = engine.generate_questions(topic).await?;

    if questions.is_empty() {
        println!("No quiz questions could be generated for {topic}.");
        return Ok(());
    }

    let mut score = 0;
    for (i, question) in questions.iter().enumerate() {
        println!();
        println!(
            "{} {}",
            style(format!("Question {}/{}:", i + 1, questions.len())).bold(),
            question.question
        );

        let answer: String = Input::new()
            .with_prompt("Your answer")
            .allow_empty(true)
            .interact_text()?;

        let graded = engine.check_answer(topic, question, &answer).await?;
        if graded.correct {
            score += 1;
            println!("{}", style("Correct!").green());
        } else {
            println!("{}", style("Not quite.").red());
            println!("  Expected: {}", question.answer);
        }
    }

    println!();
    println!("Score: {}/{}", score, questions.len());
    Ok(())
}

#[inline]
pub async fn grade(ctx: &AppContext, candidate: &str, reference: &str) -> Result<bool> {
    let grader = ctx.grader()?;
    let (correct, similarity) = grader.score(candidate, reference).await?;

    match similarity {
        Some(similarity) => println!(
            "Similarity: {:.4} (threshold {:.2})",
            similarity,
            grader.threshold()
        ),
        None => println!("Similarity: undefined (zero-magnitude embedding)"),
    }

    if correct {
        println!("{}", style("Correct").green());
    } else {
        println!("{}", style("Incorrect").red());
    }

    Ok(correct)
}

#[inline]
pub async fn weak_topics(ctx: &AppContext, limit: Option<u32>) -> Result<()> {
    let limit = limit.unwrap_or(ctx.config().memory.limit);
    let topics = ctx.mistake_tracker().await?.weak_topics(limit).await?;

    if topics.is_empty() {
        println!("No mistakes recorded yet.");
        return Ok(());
    }

    println!("{}", style("Topics to review:").bold());
    for (i, topic) in topics.iter().enumerate() {
        println!("  {}. {}", i + 1, topic);
    }
    Ok(())
}

/// Collection size, recorded embedding model and whether the configured provider matches
#[inline]
pub async fn show_status(ctx: &AppContext) -> Result<()> {
    let config = ctx.config();
    let store = ctx.store();

    println!("📊 Study Assistant Status");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔍 Vector Store:");
    println!("   📁 Location: {}", store.persist_directory().display());
    println!("   📚 Collection: {}", store.collection_name());
    match store.count().await {
        Ok(count) => println!("   📊 Records: {count}"),
        Err(e) => println!("   ❌ Failed to count records - {e}"),
    }

    let configured_model = ctx.embedder().model_name();
    match store.manifest().await {
        Ok(Some(manifest)) => {
            println!("   🧮 Embedding model: {}", manifest.embedding_model);
            println!("   🔢 Dimension: {}", manifest.dimension);
            println!("   🕒 Created: {}", manifest.created_at.format("%Y-%m-%d %H:%M:%S"));
            if manifest.embedding_model == configured_model {
                println!("   ✅ Configured provider matches ({configured_model})");
            } else {
                println!(
                    "   ⚠️  Configured provider is {configured_model}; run `build --rebuild` to switch"
                );
            }
        }
        Ok(None) => println!("   💤 Not built yet (run `build`)"),
        Err(e) => println!("   ❌ Failed to read manifest - {e}"),
    }

    println!();
    println!("🤖 Ollama:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.ping() {
            Ok(()) => {
                println!("   ✅ Connected ({})", client.base_url());
                println!("   📋 Generator: {}", config.generator.model);
            }
            Err(e) => println!("   ⚠️  Unreachable at {} - {e:#}", client.base_url()),
        },
        Err(e) => println!("   ❌ Invalid connection settings - {e}"),
    }

    println!();
    println!("📝 Mistakes:");
    match ctx.mistake_tracker().await {
        Ok(tracker) => match tracker.mistake_count().await {
            Ok(count) => println!("   📊 Recorded: {count}"),
            Err(e) => println!("   ❌ Failed to count mistakes - {e}"),
        },
        Err(e) => {
            warn!("Mistake database unavailable: {}", e);
            println!("   ❌ Unavailable - {e}");
        }
    }

    Ok(())
}
