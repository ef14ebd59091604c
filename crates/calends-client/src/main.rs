//! calends CLI entry point.

use std::process::ExitCode;

use calends_core::{TracingConfig, TracingSink, init_tracing};
use clap::Parser;

use calends_client::app::{self, Settings};
use calends_client::cli::{CacheAction, Cli, Command, ConfigAction};
use calends_client::commands;
use calends_client::error::ClientResult;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(tracing_config(&cli)) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn tracing_config(cli: &Cli) -> TracingConfig {
    if cli.interactive && cli.command.is_none() {
        let config = TracingConfig::interactive(cli.log_file.clone());
        return if cli.debug {
            config.with_level(tracing::Level::DEBUG)
        } else {
            config
        };
    }
    let config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    match &cli.log_file {
        Some(path) => config.with_sink(TracingSink::File(path.clone())),
        None => config,
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let cwd = std::env::current_dir()?;
    let settings = Settings::load(&cli, &cwd)?;

    match cli.command {
        Some(Command::Cache { action }) => {
            settings.config.validate()?;
            let store = settings.open_store()?;
            match action {
                CacheAction::Stats => commands::cache::stats(&store, &settings.zone()?),
                CacheAction::Clear => commands::cache::clear(&store),
            }
        }
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&settings),
            ConfigAction::Validate => commands::config::validate(&settings),
            ConfigAction::Path => commands::config::path(&settings),
        },
        None => {
            settings.validate()?;
            let color = app::use_color(cli.no_color);
            if cli.interactive {
                app::interactive(&settings, cli.date, color).await
            } else {
                app::one_shot(&settings, cli.date, color).await
            }
        }
    }
}
