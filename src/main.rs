use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod batch;
mod classifier;
mod context;
mod db;
mod decode;
mod encode;
mod error;
mod loader;
mod models;
mod report;
mod schema;
mod screener;

use context::InferenceContext;
use loader::{ArtifactConfig, ArtifactSource};
use models::AssessmentInput;
use schema::FeatureSchema;

#[derive(Parser)]
#[command(name = "wellness-screen")]
#[command(about = "Student wellness screening: depression, anxiety and stress severity from PHQ-9, GAD-7 and PSS-10", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ArtifactArgs {
    /// ONNX model file or URL
    #[arg(long, env = "WELLNESS_MODEL")]
    model: ArtifactSource,
    /// Scaler parameters JSON file or URL
    #[arg(long, env = "WELLNESS_SCALER")]
    scaler: ArtifactSource,
    #[arg(long, env = "WELLNESS_LOAD_TIMEOUT_SECS", default_value_t = loader::DEFAULT_LOAD_TIMEOUT.as_secs())]
    load_timeout_secs: u64,
}

impl ArtifactArgs {
    fn into_config(self) -> ArtifactConfig {
        ArtifactConfig {
            model: self.model,
            scaler: self.scaler,
            timeout: Duration::from_secs(self.load_timeout_secs.max(1)),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Print the model input columns and output labels in order
    Schema,
    /// Score one assessment from a JSON file
    Predict {
        #[command(flatten)]
        artifacts: ArtifactArgs,
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Store the result in the history table
        #[arg(long, requires = "student")]
        save: bool,
        #[arg(long)]
        student: Option<String>,
    },
    /// Score every row of a CSV export
    Batch {
        #[command(flatten)]
        artifacts: ArtifactArgs,
        #[arg(long)]
        csv: PathBuf,
        /// Store successful rows in the history table
        #[arg(long)]
        save: bool,
    },
    /// List stored assessments
    History {
        #[arg(long)]
        student: Option<String>,
        #[arg(long, default_value_t = 90)]
        since_days: i64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        student: Option<String>,
        #[arg(long, default_value_t = 90)]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn ready_context(artifacts: ArtifactArgs) -> anyhow::Result<InferenceContext> {
    let context = InferenceContext::new(FeatureSchema::default());
    context
        .load(&artifacts.into_config())
        .await
        .context("could not load screening model; try again later")?;
    Ok(context)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _tracing = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Schema => {
            let schema = FeatureSchema::default();
            println!("Input columns ({}):", schema.width());
            for (index, name) in schema.feature_names().iter().enumerate() {
                println!("{index:>3} {name}");
            }
            println!("Output values ({}):", schema.output_len());
            let mut index = 0;
            for head in schema.heads {
                for label in head.labels {
                    println!("{index:>3} {}: {label}", head.condition);
                    index += 1;
                }
            }
        }
        Commands::Predict {
            artifacts,
            input,
            format,
            save,
            student,
        } => {
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let assessment: AssessmentInput = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a valid assessment", input.display()))?;

            let context = ready_context(artifacts).await?;
            let prediction = context.predict(&assessment)?;
            let scores = screener::score(&assessment.answers)?;

            match format {
                OutputFormat::Text => print!("{}", report::render_prediction(&prediction, &scores)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&prediction)?),
            }

            if save {
                let student = student.context("--save needs --student")?;
                let pool = connect().await?;
                let version = context.scaler()?.version.clone();
                let id = db::save_assessment(
                    &pool,
                    &student,
                    &assessment,
                    &prediction,
                    &scores,
                    version.as_deref(),
                )
                .await?;
                println!("Stored assessment {id}.");
            }
        }
        Commands::Batch {
            artifacts,
            csv,
            save,
        } => {
            let context = ready_context(artifacts).await?;
            let rows = batch::score_csv(&context, &csv)?;
            let pool = if save { Some(connect().await?) } else { None };
            let version = context.scaler()?.version.clone();

            let mut scored = 0usize;
            for row in rows.iter() {
                match &row.outcome {
                    Ok(result) => {
                        scored += 1;
                        println!(
                            "- {}: {}, {}, {}",
                            row.student_ref,
                            result.prediction.depression.label,
                            result.prediction.anxiety.label,
                            result.prediction.stress.label
                        );
                        if let Some(pool) = &pool {
                            db::save_assessment(
                                pool,
                                &row.student_ref,
                                &result.input,
                                &result.prediction,
                                &result.scores,
                                version.as_deref(),
                            )
                            .await?;
                        }
                    }
                    Err(err) => println!("- {} (line {}): skipped, {}", row.student_ref, row.line, err),
                }
            }
            println!("Scored {scored} of {} rows from {}.", rows.len(), csv.display());
        }
        Commands::History {
            student,
            since_days,
            limit,
        } => {
            let pool = connect().await?;
            let since = Utc::now() - ChronoDuration::days(since_days.max(1));
            let history = db::fetch_history(&pool, student.as_deref(), since).await?;

            if history.is_empty() {
                println!("No assessments found for this window.");
                return Ok(());
            }

            for record in history.iter().take(limit) {
                println!(
                    "- {} {} [{}] depression {} ({:.0}%), anxiety {} ({:.0}%), stress {} ({:.0}%)",
                    record.taken_at.format("%Y-%m-%d"),
                    record.student_ref,
                    record.id,
                    record.depression_label,
                    record.depression_probability * 100.0,
                    record.anxiety_label,
                    record.anxiety_probability * 100.0,
                    record.stress_label,
                    record.stress_probability * 100.0
                );
            }
        }
        Commands::Report {
            student,
            since_days,
            out,
        } => {
            let pool = connect().await?;
            let since = Utc::now() - ChronoDuration::days(since_days.max(1));
            let history = db::fetch_history(&pool, student.as_deref(), since).await?;
            let label_counts = db::fetch_label_counts(&pool, student.as_deref(), since).await?;
            let report = report::build_history_report(student.as_deref(), since, &history, &label_counts);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
