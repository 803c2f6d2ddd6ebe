//! Structured task logging and tracing bootstrap.

use tracing::{error, info, warn, Span};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sticker_models::TaskId;

/// Install the global subscriber. `LOG_FORMAT=json` selects JSON lines,
/// otherwise human-readable ANSI output. `RUST_LOG` extends `default_directive`.
pub fn init_tracing(default_directive: &str) {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    match default_directive.parse::<Directive>() {
        Ok(directive) => env_filter = env_filter.add_directive(directive),
        Err(e) => eprintln!("ignoring invalid log directive {}: {}", default_directive, e),
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Task logger for consistent lifecycle lines.
///
/// Every line carries the task id and the pipeline stage.
#[derive(Debug, Clone)]
pub struct TaskLogger {
    task_id: String,
    stage: &'static str,
}

impl TaskLogger {
    pub fn new(task_id: &TaskId, stage: &'static str) -> Self {
        Self {
            task_id: task_id.to_string(),
            stage,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(task_id = %self.task_id, stage = self.stage, "Task started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(task_id = %self.task_id, stage = self.stage, "Task progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(task_id = %self.task_id, stage = self.stage, "Task warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(task_id = %self.task_id, stage = self.stage, "Task error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(task_id = %self.task_id, stage = self.stage, "Task completed: {}", message);
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Span wrapping all work done for this task in this stage.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("task", task_id = %self.task_id, stage = self.stage)
    }
}
