use anyhow::{Context, Result};
use release_pipeline::{
    annotate::Annotator,
    cli::{
        commands::{DecideCommand, RunCommand, ValidateCommand},
        output::*,
        Cli, Command, EXIT_DECISION_ERROR, EXIT_STAGE_FAILURE, EXIT_TAG_CONFLICT,
    },
    core::{
        config::{PipelineConfig, ReleaseConfig},
        ExecutionStatus, FailureKind, RunContext, StageGraph, Trigger,
    },
    execution::{ActionExecutor, ExecutionEngine, ExecutionEvent},
    publish::Publisher,
    release::{self, ReleaseDecision},
    vcs::{GhCli, GitHubRemote, InMemoryRemote, RemoteRepository, SystemGit},
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::from_args();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{} {:#}", WARN, e);
    }

    let result = match &cli.command {
        Command::Decide(cmd) => decide(cmd).await,
        Command::Run(cmd) => run_pipeline(cmd).await,
        Command::Validate(cmd) => validate_pipeline(cmd),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {}", CROSS, style(format!("{:#}", e)).red());
            ExitCode::from(EXIT_DECISION_ERROR)
        }
    }
}

/// Logs go to stderr so stdout stays usable for outputs and JSON
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")
}

/// Read the manifest and tag history, then run the gate
async fn compute_decision(release_config: &ReleaseConfig, repo: &Path) -> Result<ReleaseDecision> {
    let manifest_path = repo.join(&release_config.manifest);
    let version = release::resolve_version_file(&manifest_path, &release_config.version_key)
        .context("Failed to resolve the declared version")?;

    let git = SystemGit::new(repo, release_config.remote.clone());
    let history = git
        .reachable_tags()
        .await
        .context("Failed to inspect tag history")?;

    release::decide_version(release_config, version, &history).context("Failed to decide release")
}

async fn decide(cmd: &DecideCommand) -> Result<ExitCode> {
    let mut release_config = match &cmd.file {
        Some(path) => {
            PipelineConfig::from_file(path)
                .with_context(|| format!("Failed to load pipeline config {}", path.display()))?
                .release
        }
        None => ReleaseConfig::default(),
    };
    cmd.release.apply(&mut release_config);

    let decision = compute_decision(&release_config, &cmd.release.repo).await?;

    if let Some(path) = &cmd.output_file {
        decision
            .write_outputs(path)
            .with_context(|| format!("Failed to write outputs to {}", path.display()))?;
    }

    if cmd.json {
        let outputs: serde_json::Map<String, serde_json::Value> = decision
            .outputs()
            .into_iter()
            .map(|(key, value)| (key.to_string(), serde_json::Value::String(value)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        println!("{}", format_decision(&decision));
        for (key, value) in decision.outputs() {
            println!("{}={}", key, value);
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_pipeline(cmd: &RunCommand) -> Result<ExitCode> {
    let mut config = PipelineConfig::from_file(&cmd.file)
        .with_context(|| format!("Failed to load pipeline config {}", cmd.file.display()))?;
    cmd.release.apply(&mut config.release);
    config.validate().context("Invalid release overrides")?;

    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let repo = cmd.release.repo.clone();
    let decision = compute_decision(&config.release, &repo).await?;
    println!("{}", format_decision(&decision));

    if let Some(path) = &cmd.output_file {
        decision
            .write_outputs(path)
            .with_context(|| format!("Failed to write outputs to {}", path.display()))?;
    }

    let git = SystemGit::new(&repo, config.release.remote.clone());
    let commit = match &cmd.trigger.commit {
        Some(commit) => commit.clone(),
        None => git.head_commit().await.context("Failed to resolve HEAD")?,
    };
    let git_ref = match &cmd.trigger.git_ref {
        Some(git_ref) => git_ref.clone(),
        None => git.current_ref().await.context("Failed to resolve the current ref")?,
    };
    let trigger = Trigger {
        event: cmd.trigger.event.into(),
        git_ref,
        commit,
        change: cmd.trigger.change,
    };

    let remote: Arc<dyn RemoteRepository> = if cmd.dry_run {
        println!("{} Dry run: tags, releases and labels stay in memory", WARN);
        Arc::new(InMemoryRemote::new())
    } else {
        let gh = GhCli::new(git.repo_path());
        Arc::new(GitHubRemote::new(git, gh))
    };
    let executor = Arc::new(ActionExecutor::new(
        Publisher::new(remote.clone()),
        Annotator::new(remote, config.release.label.clone()),
    ));

    let mut graph = config.to_graph();
    let run = RunContext {
        run_id: graph.state.run_id,
        trigger,
        decision,
        workdir: repo,
    };

    let progress = (!cmd.json).then(|| create_progress_bar(graph.stages.len()));
    let bar = progress.clone();
    let engine = ExecutionEngine::new(executor, cmd.strategy.into_strategy(cmd.max_parallel))
        .with_event_handler(move |event| {
            let Some(bar) = &bar else {
                return;
            };
            bar.println(format_execution_event(&event));
            if matches!(
                event,
                ExecutionEvent::StageCompleted { .. }
                    | ExecutionEvent::StageFailed { .. }
                    | ExecutionEvent::StageSkipped { .. }
                    | ExecutionEvent::StageCancelled { .. }
            ) {
                bar.inc(1);
            }
        });

    println!();
    let started = Instant::now();
    let result = engine.execute(&mut graph, &run).await;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    let status = match result {
        Ok(status) => status,
        Err(e) => {
            error!("{}", e);
            println!("{} {}", CROSS, style(e).red());
            return Ok(ExitCode::from(EXIT_STAGE_FAILURE));
        }
    };

    if cmd.json {
        print_run_json(&graph, &run, status)?;
    } else {
        print_run_summary(&graph, status, started.elapsed());
    }

    Ok(exit_code(&graph, status))
}

fn print_run_summary(graph: &StageGraph, status: ExecutionStatus, elapsed: std::time::Duration) {
    println!("{}", style(separator()).dim());
    for id in graph.execution_order() {
        if let Some(stage) = graph.stage(id) {
            println!("  {:<24} {}", stage.name, format_stage_state(&stage.state));
        }
    }

    let failures = graph.failures();
    if !failures.is_empty() {
        println!();
        for failure in &failures {
            println!("{}", format_failure(failure));
        }
    }

    let icon = if status == ExecutionStatus::Completed { CHECK } else { CROSS };
    println!(
        "\n{} {} {} in {}",
        icon,
        style(&graph.name).bold(),
        format_status(status),
        style(format_duration(elapsed)).dim()
    );
}

fn print_run_json(graph: &StageGraph, run: &RunContext, status: ExecutionStatus) -> Result<()> {
    let stages: Vec<serde_json::Value> = graph
        .execution_order()
        .iter()
        .filter_map(|id| graph.stage(id))
        .map(|stage| serde_json::json!({ "id": stage.id, "state": stage.state }))
        .collect();

    let data = serde_json::json!({
        "run_id": run.run_id,
        "pipeline": graph.name,
        "status": status,
        "trigger": run.trigger,
        "decision": run.decision,
        "stages": stages,
        "failures": graph.failures(),
    });
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

/// Conflicts only get their own code when nothing else failed
fn exit_code(graph: &StageGraph, status: ExecutionStatus) -> ExitCode {
    let failures = graph.failures();
    if !failures.is_empty() && failures.iter().all(|f| f.kind == FailureKind::TagConflict) {
        return ExitCode::from(EXIT_TAG_CONFLICT);
    }
    match status {
        ExecutionStatus::Completed => ExitCode::SUCCESS,
        _ => ExitCode::from(EXIT_STAGE_FAILURE),
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<ExitCode> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            let graph = config.to_graph();
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Stages: {}", style(config.stages.len()).cyan());
            println!("  Order: {}", style(graph.execution_order().join(" → ")).dim());
            println!(
                "  Release: tag {}<version>, policy {:?}",
                config.release.tag_prefix, config.release.policy
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            Ok(ExitCode::from(EXIT_DECISION_ERROR))
        }
    }
}
