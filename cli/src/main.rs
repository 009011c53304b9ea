use clap::Parser;
use depot_cli::commands::{self, cli, Remote};
use depot_core::api::{self as core_api, CliError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let cfg = match args.config.as_deref() {
        Some(path) => core_api::load_path(path),
        None => core_api::load_default(),
    }
    .map_err(|e| CliError::Config(e.to_string()))?;
    init_tracing(&cfg.logging).map_err(CliError::Command)?;

    let remote = Remote::connect(cfg).await?;
    dispatch(args.command, args.format, &remote).await
}

async fn dispatch(
    cmd: cli::Commands,
    format: cli::OutputFormat,
    remote: &Remote,
) -> Result<i32, CliError> {
    match cmd {
        cli::Commands::Upload(upload_args) => {
            commands::upload::handle_upload(upload_args, remote, format).await
        }
        cli::Commands::List => commands::list::handle_list(remote, format).await,
        cli::Commands::Check => commands::check::handle_check(remote, format).await,
        cli::Commands::Delete(delete_args) => {
            commands::delete::handle_delete(delete_args, remote, format).await
        }
        cli::Commands::Commit(commit_args) => {
            commands::commit::handle_commit(commit_args, remote, format).await
        }
    }
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 2: partial failure or aborted by policy (returned as a normal exit code)
    // 3: commit rejected after transfers
    // 11: config error
    // 20: IO error
    // 30: credentials rejected
    // 40: remote unavailable or unreadable
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Engine(ee) => commands::exit_code_for_kind(ee.kind()),
        CliError::Io(_) => 20,
        CliError::Command(_) => 20,
        CliError::Anyhow(_) => 50,
    }
}

fn init_tracing(logging: &core_api::LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("depot"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("depot.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
