mod cli;
mod error_fmt;
mod monitor_cmd;

use std::fs;
use std::path::Path;

use clap::Parser;
use cellmon_config::{Config, Logging};
use eyre::{WrapErr, eyre};

use crate::cli::{Cli, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        tracing::debug!(error = ?e, "exiting with error");
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    color_eyre::install()?;
    let cfg = load_config(cli.config.as_deref())?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    monitor_cmd::dispatch(&cfg, cli.cmd, cli.json)
}

fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let cfg = match path {
        Some(p) => {
            let text =
                fs::read_to_string(p).wrap_err_with(|| format!("read config {}", p.display()))?;
            cellmon_config::load_toml(&text).wrap_err("invalid configuration")?
        }
        None => Config::default(),
    };
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Console layer on stderr (pretty or JSON), plus an optional JSON file layer.
///
/// Console verbosity: `RUST_LOG` if set, else `--log-level`. The file layer
/// uses `[logging] level`.
fn init_tracing(json: bool, level: &str, logging: &Logging) -> eyre::Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre!("logging.file has no file name"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
                .wrap_err("invalid logging.level")?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| eyre!("init tracing: {e}"))
}
