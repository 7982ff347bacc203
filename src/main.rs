use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use study_assistant::Result;
use study_assistant::commands::{
    ask, build_index, flashcards, grade, quiz, search, show_status, summarize, topic_filter,
    weak_topics,
};
use study_assistant::config::{
    CONFIG_FILE_NAME, Config, get_config_dir, run_interactive_config, show_config,
};
use study_assistant::context::AppContext;
use study_assistant::database::MetadataFilter;

#[derive(Parser)]
#[command(name = "study-assistant")]
#[command(about = "Ask questions, summarize and quiz yourself on your own study notes")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Restrict a command to notes below a specialization / course / notes type
#[derive(Args, Debug)]
struct TopicArgs {
    #[arg(long)]
    specialization: Option<String>,
    #[arg(long)]
    course: Option<String>,
    #[arg(long)]
    notes_type: Option<String>,
}

impl TopicArgs {
    fn into_filter(self) -> MetadataFilter {
        topic_filter(self.specialization, self.course, self.notes_type)
    }
}

/// Topic for the generation features; a course is always required
#[derive(Args, Debug)]
struct CourseArgs {
    #[arg(long)]
    course: String,
    #[arg(long)]
    specialization: Option<String>,
}

impl CourseArgs {
    fn into_filter(self) -> MetadataFilter {
        topic_filter(self.specialization, Some(self.course), None)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and models
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and store the processed notes
    Build {
        /// Replace the collection instead of appending to it
        #[arg(long)]
        rebuild: bool,
    },
    /// Answer a question from the notes
    Ask {
        question: String,
        /// Print the answer and its sources as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the notes most similar to a query
    Search {
        query: String,
        #[command(flatten)]
        topic: TopicArgs,
    },
    /// Summarize a course's notes
    Summarize {
        #[command(flatten)]
        topic: CourseArgs,
    },
    /// Generate flashcards for a course
    Flashcards {
        #[command(flatten)]
        topic: CourseArgs,
        /// Print the flashcards as JSON
        #[arg(long)]
        json: bool,
    },
    /// Take an interactive quiz on a course
    Quiz {
        #[command(flatten)]
        topic: CourseArgs,
        /// Number of questions (defaults to quiz.question_count)
        #[arg(long)]
        count: Option<usize>,
    },
    /// Check an answer against a reference answer
    Grade { candidate: String, reference: String },
    /// List the topics with the most recorded mistakes
    WeakTopics {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show the state of the vector store, Ollama and the mistake log
    Status,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    path.map_or_else(Config::load, |path| Config::load_from(path))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Config { show } = cli.command {
        let config_path = match cli.config {
            Some(path) => path,
            None => get_config_dir()?.join(CONFIG_FILE_NAME),
        };
        if show {
            show_config(&Config::load_from(&config_path)?)?;
        } else {
            run_interactive_config(&config_path)?;
        }
        return Ok(());
    }

    let config = load_config(cli.config.as_ref())?;
    let ctx = AppContext::new(config).await?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Build { rebuild } => {
            build_index(&ctx, rebuild).await?;
        }
        Commands::Ask { question, json } => {
            ask(&ctx, &question, json).await?;
        }
        Commands::Search { query, topic } => {
            search(&ctx, &query, &topic.into_filter()).await?;
        }
        Commands::Summarize { topic } => {
            summarize(&ctx, &topic.into_filter()).await?;
        }
        Commands::Flashcards { topic, json } => {
            flashcards(&ctx, &topic.into_filter(), json).await?;
        }
        Commands::Quiz { topic, count } => {
            quiz(&ctx, &topic.into_filter(), count).await?;
        }
        Commands::Grade {
            candidate,
            reference,
        } => {
            grade(&ctx, &candidate, &reference).await?;
        }
        Commands::WeakTopics { limit } => {
            weak_topics(&ctx, limit).await?;
        }
        Commands::Status => {
            show_status(&ctx).await?;
        }
    }

    Ok(())
}
