use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::args::Cli;
use cli::commands::{dispatch, exit_codes, resolve_config};

fn init_logging(log_level: &str, json: bool) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_writer(std::io::stderr);

    // stdout carries command output only.
    if json {
        builder
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .init();
    } else {
        builder.init();
    }
}

fn main() {
    let cli = Cli::parse();
    let cfg = match resolve_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {e:#}");
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };
    init_logging(&cfg.log_level, cfg.log_json);

    let code = match dispatch(cli, cfg) {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(event = "perfdb.command.failed", error = ?e);
            eprintln!("error: {e:#}");
            exit_codes::for_error(&e)
        }
    };
    std::process::exit(code);
}
