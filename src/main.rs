use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use exam_grading::{
    ChunkedGradingOrchestrator, Config, Exam, ExamAttempt, GradingMetrics, LLMService,
    LoggingConfig, log_system_event,
};

#[derive(Deserialize)]
struct GradingInput {
    exam: Exam,
    attempt: ExamAttempt,
}

#[derive(Serialize)]
struct GradingOutput {
    attempt: ExamAttempt,
    metrics: GradingMetrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let _guard = setup_logging(&config.logging)?;
    config.validate()?;

    let input_path = env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: exam-grading <attempt.json>"))?;

    log_system_event!(startup, component = "cli", format!("grading {}", input_path));

    let raw = tokio::fs::read_to_string(&input_path)
        .await
        .with_context(|| format!("failed to read {}", input_path))?;
    let GradingInput { exam, mut attempt } =
        serde_json::from_str(&raw).with_context(|| format!("invalid grading input in {}", input_path))?;

    let llm_service = LLMService::from_config(&config.llm);
    info!(
        provider = llm_service.provider_name(),
        answers = attempt.answers.len(),
        "Initialized grading pipeline"
    );

    let orchestrator = ChunkedGradingOrchestrator::with_dispatcher(llm_service, &config.grading);
    let metrics = orchestrator.grade_attempt(&mut attempt, &exam).await;

    let output = GradingOutput { attempt, metrics };
    println!("{}", serde_json::to_string_pretty(&output)?);

    log_system_event!(shutdown, component = "cli", "grading finished");
    Ok(())
}

fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the JSON result, so console logs go to stderr
    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_ansi(true)
            .with_writer(std::io::stderr)
            .boxed()
    });

    let (file_layer, guard) = if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory)
            .with_context(|| format!("could not create log directory {}", config.log_directory))?;
        let file_appender = tracing_appender::rolling::daily(&config.log_directory, "exam-grading.log");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
        let layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(non_blocking_file)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
