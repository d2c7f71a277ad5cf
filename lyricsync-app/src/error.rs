use lyricsync_core::{CoreError, ValidationIssue};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid configuration:\n{}", format_issues(.0))]
    InvalidConfig(Vec<ValidationIssue>),

    #[error("Failed to create tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}
