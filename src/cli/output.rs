//! CLI output formatting

use crate::{
    core::{ExecutionStatus, FailureKind, StageFailure, StageState},
    execution::ExecutionEvent,
    release::ReleaseDecision,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar over stage completion
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Horizontal rule as wide as the terminal
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    "─".repeat(width)
}

/// Format a stage state for display
pub fn format_stage_state(state: &StageState) -> String {
    match state {
        StageState::Pending => style("PENDING").dim().to_string(),
        StageState::Running { .. } => style("RUNNING").yellow().to_string(),
        StageState::Completed { .. } => style("COMPLETED").green().to_string(),
        StageState::Failed { kind, .. } => style(format!("FAILED ({})", kind.describe()))
            .red()
            .to_string(),
        StageState::Skipped { .. } => style("SKIPPED").dim().to_string(),
        StageState::Cancelled { .. } => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a run status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format the release decision as an aligned block
pub fn format_decision(decision: &ReleaseDecision) -> String {
    let verdict = if decision.should_release {
        style("release").green().bold().to_string()
    } else {
        style("no release").dim().to_string()
    };
    let detected = if decision.detected_tag.is_empty() {
        style("(none)").dim().to_string()
    } else {
        style(&decision.detected_tag).cyan().to_string()
    };

    format!(
        "  Declared version: {}\n  Expected tag:     {}\n  Detected tag:     {}\n  Decision:         {}",
        style(decision.declared_version.to_string()).bold(),
        style(&decision.expected_tag).cyan(),
        detected,
        verdict
    )
}

/// One line per failed stage; tag conflicts read as a publication race
///
/// Publication failures carry their record on a second line.
pub fn format_failure(failure: &StageFailure) -> String {
    let line = match failure.kind {
        FailureKind::TagConflict => format!(
            "{} {}: {} {}",
            WARN,
            style(&failure.stage_id).yellow(),
            style("publication race, not a build defect:").yellow(),
            failure.error
        ),
        kind => format!(
            "{} {} ({}): {}",
            CROSS,
            style(&failure.stage_id).red(),
            kind.describe(),
            style(&failure.error).dim()
        ),
    };

    match failure.kind {
        FailureKind::TagConflict | FailureKind::ReleaseCreationFailure
            if !failure.output.is_empty() =>
        {
            format!("{}\n    {}", line, style(&failure.output).dim())
        }
        _ => line,
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            pipeline_name,
            total_stages,
        } => format!(
            "{} Starting pipeline {} with {} stage(s) ({})",
            ROCKET,
            style(pipeline_name).bold(),
            total_stages,
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StageStarted { stage_id } => {
            format!("{} {}", SPINNER, style(stage_id).cyan())
        }
        ExecutionEvent::StageCompleted { stage_id, .. } => {
            format!("{} {}", CHECK, style(stage_id).green())
        }
        ExecutionEvent::StageFailed {
            stage_id,
            kind: FailureKind::TagConflict,
            error,
        } => format!(
            "{} {}: {}",
            WARN,
            style(stage_id).yellow(),
            style(error).dim()
        ),
        ExecutionEvent::StageFailed { stage_id, error, .. } => {
            format!("{} {}: {}", CROSS, style(stage_id).red(), style(error).dim())
        }
        ExecutionEvent::StageSkipped { stage_id, reason } => {
            format!("{} {} ({})", SKIP, style(stage_id).dim(), reason)
        }
        ExecutionEvent::StageCancelled { stage_id, reason } => format!(
            "{} {} cancelled ({})",
            WARN,
            style(stage_id).yellow(),
            reason
        ),
        ExecutionEvent::RunCompleted { run_id, status } => format!(
            "{} Run ({}) {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// Format stage output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
