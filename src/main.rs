use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use survey_agent::io::write_json;
use survey_agent::{
    build_client, bundled_sample, filter_table, load_transcripts, read_export_file,
    write_export_file, DemographicSelection, FilterOptions, LlmConfig, Persona, Provider,
    QuestionList, ResponseStore, ResultsConfig, ResultsView, SampleSize, SurveyResponse,
    SurveySession, TranscriptTable,
};

#[derive(Parser)]
#[command(name = "survey-agent")]
#[command(author, version, about = "Demographic-matched synthetic survey generation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview a transcript table and the respondents a filter selects
    Inspect {
        /// Transcript table (.csv or .parquet); the bundled sample when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Number of rows to preview
        #[arg(long, default_value = "5")]
        preview: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Ask every question of the selected respondents and persist the answers
    Generate {
        /// Transcript table (.csv or .parquet); the bundled sample when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Survey question (repeatable)
        #[arg(short, long = "question")]
        questions: Vec<String>,

        /// File with one question per line
        #[arg(long)]
        questions_file: Option<PathBuf>,

        /// Voice the answers are written in (pollster, marketer, product-manager)
        #[arg(long, default_value = "pollster")]
        persona: Persona,

        /// Respondents per question; every filtered respondent when omitted
        #[arg(long)]
        respondents: Option<usize>,

        /// Seed for respondent sampling
        #[arg(long)]
        seed: Option<u64>,

        /// SQLite database the answers are appended to
        #[arg(long, default_value = "data/database.db")]
        db: PathBuf,

        /// Export the batch as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a JSON summary of the batch (ids, usage, timings)
        #[arg(long)]
        summary_json: Option<PathBuf>,

        /// Language-model provider (openai, anthropic)
        #[arg(long, default_value = "openai")]
        provider: Provider,

        /// Override the model named by the environment
        #[arg(long)]
        model: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show aggregated results for one question
    Results {
        /// SQLite database to read from
        #[arg(long, default_value = "data/database.db", conflicts_with = "from_export")]
        db: PathBuf,

        /// Read a batch export instead of the database
        #[arg(long)]
        from_export: Option<PathBuf>,

        /// Question to show; the first one asked when omitted
        #[arg(short, long)]
        question: Option<String>,

        /// Print the view as JSON
        #[arg(long)]
        json: bool,

        /// Export the answers to this question as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of words in the frequency summary
        #[arg(long, default_value = "25")]
        top_words: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Demographic selection flags shared by `inspect` and `generate`
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Minimum age (inclusive)
    #[arg(long)]
    age_min: Option<i64>,

    /// Maximum age (inclusive)
    #[arg(long)]
    age_max: Option<i64>,

    /// Allowed gender (repeatable)
    #[arg(long = "gender")]
    genders: Vec<String>,

    /// Allowed region (repeatable)
    #[arg(long = "region")]
    regions: Vec<String>,
}

impl FilterArgs {
    fn selection(&self) -> DemographicSelection {
        let mut selection = DemographicSelection::new();
        if self.age_min.is_some() || self.age_max.is_some() {
            selection = selection.with_age_range(
                self.age_min.unwrap_or(i64::MIN),
                self.age_max.unwrap_or(i64::MAX),
            );
        }
        if !self.genders.is_empty() {
            selection = selection.with_genders(self.genders.iter().cloned());
        }
        if !self.regions.is_empty() {
            selection = selection.with_regions(self.regions.iter().cloned());
        }
        selection
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            input,
            filter,
            preview,
            verbose,
        } => {
            setup_logging(verbose);
            inspect_table(input.as_deref(), &filter, preview)
        }
        Commands::Generate {
            input,
            filter,
            questions,
            questions_file,
            persona,
            respondents,
            seed,
            db,
            output,
            summary_json,
            provider,
            model,
            verbose,
        } => {
            setup_logging(verbose);
            let questions = collect_questions(questions, questions_file.as_deref())?;
            generate_answers(GenerateOptions {
                input,
                filter,
                questions,
                persona,
                sample: respondents.map_or(SampleSize::All, SampleSize::Count),
                seed,
                db,
                output,
                summary_json,
                provider,
                model,
            })
            .await
        }
        Commands::Results {
            db,
            from_export,
            question,
            json,
            output,
            top_words,
            verbose,
        } => {
            setup_logging(verbose);
            show_results(
                &db,
                from_export.as_deref(),
                question,
                json,
                output.as_deref(),
                top_words,
            )
        }
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().ok();
}

fn load_pool(input: Option<&Path>) -> Result<TranscriptTable> {
    match input {
        Some(path) => {
            info!("Loading transcripts from {:?}", path);
            load_transcripts(path).context("Failed to load transcript table")
        }
        None => {
            info!("No input given, using the bundled sample transcripts");
            bundled_sample().context("Failed to load bundled sample")
        }
    }
}

fn collect_questions(flags: Vec<String>, file: Option<&Path>) -> Result<QuestionList> {
    let mut questions = match file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read questions file: {:?}", path))?;
            QuestionList::from_lines(&text)
        }
        None => QuestionList::new(),
    };
    questions.extend(flags);
    Ok(questions)
}

fn inspect_table(input: Option<&Path>, filter: &FilterArgs, preview: usize) -> Result<()> {
    let table = load_pool(input)?;
    let options = FilterOptions::from_table(&table);
    let selection = filter.selection();
    let filtered = filter_table(&table, &selection);

    println!("Transcript Table");
    println!("================");
    println!("Rows: {}", table.len());
    let missing = table.missing_transcripts().count();
    if missing > 0 {
        println!("Rows without transcript text: {}", missing);
    }
    println!();

    println!("Filter Options");
    println!("--------------");
    match options.age_range {
        Some((min, max)) => println!("Age: {} to {}", min, max),
        None if table.columns.age => println!("Age: no values"),
        None => println!("Age: column absent"),
    }
    print_choices("Gender", options.genders.as_deref());
    print_choices("Region", options.regions.as_deref());
    println!();

    if selection.is_unrestricted() {
        println!("No demographic filter, every respondent matches");
    }
    println!("Matching respondents: {} of {}", filtered.len(), table.len());
    println!();

    println!("Preview");
    println!("-------");
    for record in filtered.head(preview) {
        let age = record.age.map_or_else(|| "-".to_string(), |a| a.to_string());
        println!(
            "{} | age {} | {} | {} | {}",
            record.respondent_id,
            age,
            record.gender.as_deref().unwrap_or("-"),
            record.region.as_deref().unwrap_or("-"),
            snippet(&record.transcript_text, 60)
        );
    }

    Ok(())
}

fn print_choices(label: &str, choices: Option<&[String]>) {
    match choices {
        Some(values) if !values.is_empty() => println!("{}: {}", label, values.join(", ")),
        Some(_) => println!("{}: no values", label),
        None => println!("{}: column absent", label),
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

struct GenerateOptions {
    input: Option<PathBuf>,
    filter: FilterArgs,
    questions: QuestionList,
    persona: Persona,
    sample: SampleSize,
    seed: Option<u64>,
    db: PathBuf,
    output: Option<PathBuf>,
    summary_json: Option<PathBuf>,
    provider: Provider,
    model: Option<String>,
}

async fn generate_answers(options: GenerateOptions) -> Result<()> {
    if options.questions.is_empty() {
        bail!("No questions given; pass --question or --questions-file");
    }

    let table = load_pool(options.input.as_deref())?;
    let pool = filter_table(&table, &options.filter.selection());
    info!("{} of {} respondents match the selection", pool.len(), table.len());

    let mut config = LlmConfig::from_env(options.provider)?;
    if let Some(model) = options.model {
        config.model = model;
    }
    let client = build_client(config);

    let store = ResponseStore::open(&options.db).context("Failed to open response store")?;

    let session = SurveySession::new(pool, options.questions, options.persona)
        .with_sample(options.sample);
    info!(
        "Planning {} answers with {}",
        session.planned_answers(),
        client.model_name()
    );

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let questions = session.questions.clone();

    let result = session
        .run(client.as_ref(), &store, &mut rng, |progress| {
            if progress.completed == progress.total || progress.completed % 10 == 0 {
                info!(
                    "Progress: {}/{} ({:.0}%)",
                    progress.completed,
                    progress.total,
                    progress.fraction() * 100.0
                );
            }
        })
        .await
        .context("Batch halted")?;

    if result.sentinel_count > 0 {
        warn!(
            "{} of {} answers were malformed and stored as sentinels",
            result.sentinel_count,
            result.responses.len()
        );
    }
    info!(
        "Batch {} complete: {} answers stored in {:?}, {} tokens used",
        result.batch_id,
        result.responses.len(),
        options.db,
        result.usage.total()
    );

    if let Some(path) = &options.output {
        write_export_file(path, &result.responses)?;
        info!("Export written to {:?}", path);
    }
    if let Some(path) = &options.summary_json {
        write_json(path, &result)?;
        info!("Batch summary written to {:?}", path);
    }

    let config = ResultsConfig::default();
    for question in questions.iter() {
        let view = ResultsView::build(question, &result.responses, &config);
        println!("{}", view.render_text());
    }

    Ok(())
}

fn show_results(
    db: &Path,
    from_export: Option<&Path>,
    question: Option<String>,
    json: bool,
    output: Option<&Path>,
    top_words: usize,
) -> Result<()> {
    let (questions, responses) = match from_export {
        Some(path) => {
            info!("Reading batch export from {:?}", path);
            let responses = export_responses(path)?;
            let questions = survey_agent::stages::distinct_questions(&responses);
            (questions, responses)
        }
        None => {
            info!("Reading responses from {:?}", db);
            let store = ResponseStore::open(db).context("Failed to open response store")?;
            let questions = store.questions()?;
            let responses = match question.as_deref().or(questions.first().map(String::as_str)) {
                Some(q) => store.responses_for_question(q)?,
                None => Vec::new(),
            };
            (questions, responses)
        }
    };

    let selected = match question.or_else(|| questions.first().cloned()) {
        Some(q) => q,
        None => bail!("No responses found"),
    };
    if !questions.contains(&selected) {
        bail!(
            "No responses to {:?}; known questions: {}",
            selected,
            questions.join(" | ")
        );
    }

    let subset: Vec<SurveyResponse> = responses
        .into_iter()
        .filter(|r| r.question == selected)
        .collect();

    let config = ResultsConfig {
        top_words,
        ..Default::default()
    };
    let view = ResultsView::build(&selected, &subset, &config);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&view).context("Failed to serialize results")?
        );
    } else {
        if questions.len() > 1 {
            println!("Questions asked: {}", questions.len());
            println!();
        }
        println!("{}", view.render_text());
    }

    if let Some(path) = output {
        write_export_file(path, &subset)?;
        info!("Exported {} answers to {:?}", subset.len(), path);
    }

    Ok(())
}

/// Exports carry no demographics, so cross-tabs are empty for them
fn export_responses(path: &Path) -> Result<Vec<SurveyResponse>> {
    let rows = read_export_file(path)?;
    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| SurveyResponse {
            id: i as i64 + 1,
            respondent_id: row.respondent_id,
            age: None,
            gender: None,
            region: None,
            question: row.question,
            answer: row.answer,
            confidence: row.confidence,
        })
        .collect())
}
