use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser as _;
use teemake_core::execution::TokioProcessExecutor;
use teemake_core::host::{self, MIN_FREE_DISK_MB};
use teemake_core::models::{CoreError, CoreErrorKind, GameMode};
use teemake_core::pipeline::{PipelineDriver, PipelinePlan, PlanOptions};
use teemake_core::privilege::{SudoProbe, ensure_privileges};
use teemake_core::runner::TaskRunner;
use teemake_core::selection::{BuildOverrides, is_valid_server_name, resolve};
use teemake_core::server_config::{CONFIG_FILE_NAME, ServerSettings};
use teemake_core::tables::ConfigTables;
use tracing_subscriber::EnvFilter;

mod cli;
mod post_build;
mod prompt;

use cli::Cli;
use prompt::Prompter;

const LOG_ENV: &str = "TEEMAKE_LOG";
const EXIT_FAILURE: u8 = 1;
const EXIT_INTERRUPTED: u8 = 130;

/// Everything the operator decides before the build starts.
struct Answers {
    server_name: String,
    mode: GameMode,
    verbose: bool,
    settings: Option<ServerSettings>,
    post_build_url: Option<String>,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "teemake failed");
            eprintln!("error: {error:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let tables = ConfigTables::builtin();
    tables.validate()?;
    let family = host::detect_package_manager()?;

    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());
    let answers = interview(&cli, &mut prompter)?;

    let overrides = cli
        .options
        .iter()
        .try_fold(BuildOverrides::new().ninja(cli.ninja), |overrides, raw| {
            overrides.with_option(raw)
        })?;
    let selection = resolve(&tables, answers.mode.name(), family, &overrides)?;
    let build_jobs = host::build_jobs();

    if cli.dry_run {
        let options = PlanOptions {
            verbose: answers.verbose,
            elevate: true,
            build_jobs,
        };
        let plan = PipelinePlan::new(&answers.server_name, &cli.dir, selection, options)?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(ExitCode::SUCCESS);
    }

    if !cli.skip_disk_check {
        check_disk_space(&cli.dir)?;
    }

    let grant = ensure_privileges(&SudoProbe)?;
    tracing::debug!(?grant, "privileges confirmed");

    let options = PlanOptions {
        verbose: answers.verbose,
        elevate: grant.needs_sudo(),
        build_jobs,
    };
    let plan = PipelinePlan::new(&answers.server_name, &cli.dir, selection, options)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let outcome = runtime.block_on(build(&plan, &answers));
    runtime.shutdown_background();
    outcome
}

fn interview<R: BufRead, W: Write>(cli: &Cli, prompter: &mut Prompter<R, W>) -> Result<Answers> {
    let server_name = match &cli.name {
        Some(name) if is_valid_server_name(name) => name.clone(),
        Some(name) => bail!(
            "'{name}' is not a valid server name; use 1-64 letters, digits, '_' or '-'"
        ),
        None => prompter.server_name()?,
    };

    let mode = match &cli.mode {
        Some(raw) => GameMode::from_name(raw).ok_or_else(|| {
            anyhow!("unknown game mode '{raw}'; choose Teeworlds, DDNet or zCatch")
        })?,
        None => prompter.game_mode()?,
    };

    let verbose =
        cli.verbose || (!cli.yes && prompter.confirm("Enable verbose logging?", false)?);

    if cli.dry_run {
        return Ok(Answers {
            server_name,
            mode,
            verbose,
            settings: None,
            post_build_url: None,
        });
    }

    let settings = if cli.yes {
        Some(ServerSettings::defaults_for(mode))
    } else if prompter.confirm("Write basic_config.cfg after the build?", true)? {
        Some(prompter.server_settings(mode)?)
    } else {
        None
    };

    let post_build_url = match &cli.post_build_url {
        Some(url) if cli.yes => Some(url.clone()),
        Some(url) => prompter
            .confirm(&format!("Run the post-build script from {url}?"), false)?
            .then(|| url.clone()),
        None => None,
    };

    Ok(Answers {
        server_name,
        mode,
        verbose,
        settings,
        post_build_url,
    })
}

fn check_disk_space(dir: &Path) -> Result<()> {
    match host::ensure_disk_space(dir, MIN_FREE_DISK_MB) {
        Ok(free_mb) => {
            tracing::debug!(free_mb, "disk space check passed");
            Ok(())
        }
        Err(error) if error.kind == CoreErrorKind::InsufficientDiskSpace => Err(error.into()),
        Err(error) => {
            tracing::warn!(error = %error, "could not determine free disk space; continuing");
            Ok(())
        }
    }
}

async fn build(plan: &PipelinePlan, answers: &Answers) -> Result<ExitCode> {
    let runner = TaskRunner::new(Arc::new(TokioProcessExecutor), io::stdout());
    let mut driver = PipelineDriver::new(runner);

    let report = tokio::select! {
        report = driver.run(plan) => report.map_err(explain_failure)?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            return Ok(interrupted());
        }
    };

    println!();
    println!(
        "Build complete: {} is in {}",
        answers.mode,
        report.build_dir.display()
    );

    if let Some(settings) = &answers.settings {
        match settings.write_to(answers.mode, &report.build_dir) {
            Ok(path) => println!("Wrote {}", path.display()),
            Err(error) => {
                tracing::warn!(error = %error, "failed to write server configuration");
                eprintln!(
                    "warning: could not write the server configuration: {}",
                    error.message
                );
            }
        }
    }

    if let Some(url) = &answers.post_build_url {
        tokio::select! {
            result = post_build::run_script(url, &report.build_dir) => match result {
                Ok(status) if status.success() => println!("Post-build script finished."),
                Ok(status) => eprintln!("warning: post-build script exited with {status}"),
                Err(error) => eprintln!("warning: post-build script did not run: {error:#}"),
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                return Ok(interrupted());
            }
        }
    }

    println!();
    println!("To start your server:");
    println!("  cd {}", report.build_dir.display());
    println!("  ./<server binary> -f {CONFIG_FILE_NAME}");
    Ok(ExitCode::SUCCESS)
}

/// The failing task already printed its status and diagnostics; keep the
/// final message short.
fn explain_failure(error: CoreError) -> anyhow::Error {
    match error.stage {
        Some(stage) => anyhow!("build aborted while {stage}: {}", error.message),
        None => anyhow::Error::new(error),
    }
}

fn interrupted() -> ExitCode {
    tracing::warn!("build cancelled by operator");
    eprintln!();
    eprintln!("Build cancelled by user");
    ExitCode::from(EXIT_INTERRUPTED)
}
