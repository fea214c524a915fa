//! CLI entrypoint for phasegate
//!
//! This is the main binary that wires together all layers using
//! dependency injection. The process exit code is the run outcome code.

use anyhow::{Context, Result, bail};
use clap::Parser;
use phasegate_application::{
    NoProgress, ProgressNotifier, RunRecorder, RunWorkflowInput, RunWorkflowUseCase,
    WorkerRegistry,
};
use phasegate_domain::{RunId, RunOutcome, WorkflowDefinition, has_errors};
use phasegate_infrastructure::{
    ConfigLoader, DefinitionLoadError, FileConfig, JsonlRunRecorder, RunLogReader,
    WorkflowLoader, build_registry, has_config_errors,
};
use phasegate_presentation::{
    Cli, Command, ConsoleFormatter, OutputFormat, ProgressReporter, SimpleProgress,
};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.show_config {
        for line in ConfigLoader::describe_sources(cli.config.as_deref()) {
            println!("{}", line);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?
    };
    let issues = config.validate();
    for issue in &issues {
        warn!("config {}", issue);
    }
    if has_config_errors(&issues) {
        bail!(
            "configuration has {} error(s); run with -v for details",
            issues.iter().filter(|i| i.is_error()).count()
        );
    }

    match cli.command {
        None => bail!("No command given. Try `phasegate --help`."),
        Some(Command::Validate { definition }) => validate(&config, &definition),
        Some(Command::Explain { log, phase }) => explain(&log, phase.as_deref()),
        Some(Command::Run {
            definition,
            project,
            output,
            run_log_dir,
        }) => {
            let run_log_dir = run_log_dir.or_else(|| config.logging.run_log_dir());
            run(
                &config,
                &definition,
                project,
                output,
                run_log_dir,
                cli.quiet,
            )
            .await
        }
    }
}

/// Load a definition, printing the issue list if it is rejected
fn load_definition(path: &Path) -> Result<Option<WorkflowDefinition>> {
    match WorkflowLoader::load(path) {
        Ok(definition) => Ok(Some(definition)),
        Err(DefinitionLoadError::Invalid(issues)) => {
            print!(
                "{}",
                ConsoleFormatter::format_issues(&path.display().to_string(), &issues)
            );
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("cannot load {}", path.display())),
    }
}

fn invalid_exit() -> ExitCode {
    ExitCode::from(RunOutcome::InvalidDefinition.exit_code() as u8)
}

fn validate(config: &FileConfig, path: &Path) -> Result<ExitCode> {
    let Some(definition) = load_definition(path)? else {
        return Ok(invalid_exit());
    };

    let registry = build_registry(&config.workers);
    let issues = definition.validate_against(|capability| registry.contains(capability));
    print!(
        "{}",
        ConsoleFormatter::format_issues(&path.display().to_string(), &issues)
    );
    if has_errors(&issues) {
        return Ok(invalid_exit());
    }
    Ok(ExitCode::SUCCESS)
}

fn explain(path: &Path, phase: Option<&str>) -> Result<ExitCode> {
    let log = RunLogReader::read(path).with_context(|| format!("cannot replay {}", path.display()))?;
    let final_state = log.final_state();
    let metrics = log.metrics();
    print!(
        "{}",
        ConsoleFormatter::format_explain(
            log.run_id(),
            log.workflow(),
            &log.audit_entries(),
            Some(&metrics),
            phase,
            final_state.as_ref(),
        )
    );
    Ok(ExitCode::SUCCESS)
}

fn progress_for(quiet: bool, output: OutputFormat) -> Arc<dyn ProgressNotifier> {
    if quiet {
        Arc::new(NoProgress)
    } else if std::io::stderr().is_terminal() {
        Arc::new(ProgressReporter::new())
    } else if output != OutputFormat::Json {
        Arc::new(SimpleProgress)
    } else {
        Arc::new(NoProgress)
    }
}

async fn run(
    config: &FileConfig,
    path: &Path,
    project: String,
    output: OutputFormat,
    run_log_dir: Option<PathBuf>,
    quiet: bool,
) -> Result<ExitCode> {
    let Some(definition) = load_definition(path)? else {
        return Ok(invalid_exit());
    };

    // === Dependency Injection ===
    let registry: WorkerRegistry = build_registry(&config.workers);
    info!(
        "{} worker(s) for capabilities: {}",
        registry.len(),
        registry.capabilities().join(", ")
    );
    let (settings, _) = config.to_run_settings();
    let run_id = RunId::new();

    let mut use_case = RunWorkflowUseCase::new(Arc::new(registry), settings);
    let mut log_path = None;
    if let Some(dir) = run_log_dir {
        match JsonlRunRecorder::for_run(&dir, run_id) {
            Some(recorder) => {
                log_path = Some(recorder.path().to_path_buf());
                let recorder: Arc<dyn RunRecorder> = Arc::new(recorder);
                use_case = use_case.with_recorder(recorder);
            }
            None => warn!("Run log disabled: cannot write to {}", dir.display()),
        }
    }

    let cancellation = CancellationToken::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let input = RunWorkflowInput::new(project, Arc::new(definition))
        .with_run_id(run_id)
        .with_cancellation(cancellation);
    let progress = progress_for(quiet, output);
    let report = use_case.execute(input, progress.as_ref()).await;

    let rendered = match output {
        OutputFormat::Full => ConsoleFormatter::format(&report),
        OutputFormat::Summary => ConsoleFormatter::format_summary(&report),
        OutputFormat::Json => ConsoleFormatter::format_json(&report),
    };
    println!("{}", rendered);

    if let Some(path) = log_path {
        eprintln!("Run log: {}", path.display());
    }

    Ok(ExitCode::from(report.exit_code() as u8))
}
