mod cli;
mod error_fmt;
mod rt;
mod watch;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use eyre::WrapErr;
use filawatch_config::Config;
use std::path::Path;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    let cfg = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => fail(&err),
    };
    init_logging(&cli, &cfg.logging);

    if let Err(err) = run(&cli, &cfg) {
        fail(&err);
    }
}

fn run(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    match &cli.cmd {
        Commands::Watch {
            simulated,
            simulate_print,
            run_for,
            rt,
            rt_prio,
            rt_lock,
            rt_cpu,
        } => watch::run_watch(
            cfg,
            *simulated,
            *simulate_print,
            *run_for,
            *rt,
            *rt_prio,
            *rt_lock,
            *rt_cpu,
        ),
        Commands::Status { simulated } => watch::run_status(cfg, *simulated, cli.json),
        Commands::SelfCheck { simulated } => watch::run_self_check(cfg, *simulated, cli.json),
        Commands::Health => {
            if cli.json {
                println!("{}", serde_json::json!({ "status": "ok" }));
            } else {
                println!("ok");
            }
            Ok(())
        }
    }
}

fn fail(err: &eyre::Report) -> ! {
    if JSON_MODE.get().copied().unwrap_or(false) {
        eprintln!("{}", format_error_json(err));
    } else {
        eprintln!("{}", humanize(err));
    }
    std::process::exit(exit_code_for_error(err));
}

/// Load and validate the config file; a missing file yields defaults so the
/// simulated commands work out of the box.
fn load_config(path: &Path) -> eyre::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&text).map_err(|e| eyre::eyre!("parsing {}: {e}", path.display()))?;
    cfg.validate().map_err(|e| {
        eyre::Report::new(filawatch_core::error::WatchError::Config(e.to_string()))
    })?;
    Ok(cfg)
}

fn init_logging(cli: &Cli, logging: &filawatch_config::Logging) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    // Precedence: RUST_LOG, then an explicit --log-level, then [logging].
    let level = if cli.log_level == "info" {
        logging.level.clone().unwrap_or_else(|| "info".to_string())
    } else {
        cli.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = logging.file.as_ref().map(|path| {
        let path = Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| "filawatch.log".into());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_writer(writer)
    });

    // Console logs go to stderr so command output on stdout stays parseable.
    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if cli.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}
