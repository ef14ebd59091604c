//! Settings resolution and the one-shot and interactive views.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use calends_core::{FormatOptions, WeekFormatter, Zone};
use calends_providers::{
    CacheStore, CalendarSource, Fetcher, HttpConfig, HttpTransport, Source,
};
use calends_refresh::{Pipeline, RefreshController};
use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::interactive;

/// Configuration merged with command-line overrides.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: ClientConfig,
    /// The file the configuration came from, if any.
    pub config_path: Option<PathBuf>,
    /// Sources given on the command line, appended to the configured ones.
    pub extra_sources: Vec<String>,
    /// Directory relative sources are resolved against.
    pub base_dir: PathBuf,
}

impl Settings {
    /// Loads the configuration file and applies the flags of `cli`.
    ///
    /// Without `--config`, JSON files in `cwd` are only considered when no
    /// sources were given on the command line; the TOML file in the config
    /// directory is used when it exists.
    pub fn load(cli: &Cli, cwd: &Path) -> ClientResult<Self> {
        let config_path = match &cli.config {
            Some(path) => Some(path.clone()),
            None => {
                let discovered = if cli.sources.is_empty() {
                    ClientConfig::discover(cwd)
                } else {
                    None
                };
                discovered.or_else(|| Some(ClientConfig::default_path()).filter(|p| p.is_file()))
            }
        };

        let mut config = match &config_path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration");
                ClientConfig::load_from(path)?
            }
            None => ClientConfig::default(),
        };

        if let Some(timezone) = &cli.timezone {
            config.timezone = Some(timezone.clone());
        }
        if let Some(dir) = &cli.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Some(interval) = cli.refresh_interval {
            config.refresh_interval = i64::try_from(interval).unwrap_or(i64::MAX);
        }

        Ok(Self {
            config,
            config_path,
            extra_sources: cli.sources.clone(),
            base_dir: cwd.to_path_buf(),
        })
    }

    /// Checks the configuration and every source.
    pub fn validate(&self) -> ClientResult<()> {
        self.config.validate()?;
        self.sources()?;
        Ok(())
    }

    pub fn zone(&self) -> ClientResult<Zone> {
        Ok(self.config.zone()?)
    }

    /// Configured sources followed by the command-line ones.
    pub fn sources(&self) -> ClientResult<Vec<CalendarSource>> {
        let mut sources = self.config.calendar_sources(&self.base_dir)?;
        for text in &self.extra_sources {
            let source = Source::parse_relative_to(text, &self.base_dir)?;
            sources.push(CalendarSource::new(source));
        }
        Ok(sources)
    }

    pub fn open_store(&self) -> ClientResult<CacheStore> {
        Ok(CacheStore::open(self.config.cache_dir())?)
    }

    /// Builds the fetch, parse and assemble pipeline.
    pub fn pipeline(&self) -> ClientResult<Pipeline> {
        let store = self.open_store()?;
        let fetcher_config = self.config.fetcher_config();
        let transport = HttpTransport::new(HttpConfig::default().with_timeout(fetcher_config.timeout))
            .map_err(|e| ClientError::Config(format!("cannot create HTTP client: {}", e)))?;
        let fetcher = Fetcher::new(store, Arc::new(transport)).with_config(fetcher_config);
        let sources = self.sources()?;
        info!(
            sources = sources.len(),
            cache = %self.config.cache_dir().display(),
            "Pipeline ready"
        );
        Ok(Pipeline::new(fetcher, sources, self.zone()?))
    }
}

/// Whether to emit ANSI colours on stdout.
pub fn use_color(no_color: bool) -> bool {
    !no_color && std::io::stdout().is_terminal()
}

/// Prints the week containing `date` (today when `None`) once.
pub async fn one_shot(settings: &Settings, date: Option<NaiveDate>, color: bool) -> ClientResult<()> {
    let pipeline = settings.pipeline()?;
    let week = date.unwrap_or_else(|| pipeline.zone().today(Utc::now()));

    let snapshot = pipeline.run(week).await?;
    for warning in &snapshot.warnings {
        eprintln!("warning: {}", warning);
    }

    let formatter = WeekFormatter::new(FormatOptions::default().with_color(color));
    print!("{}", formatter.format_week(&snapshot.grid, &[]));
    Ok(())
}

/// Runs the interactive view with a background refresh controller.
pub async fn interactive(settings: &Settings, date: Option<NaiveDate>, color: bool) -> ClientResult<()> {
    let pipeline = Arc::new(settings.pipeline()?);
    let zone = pipeline.zone();
    let week = date.unwrap_or_else(|| zone.today(Utc::now()));

    let controller = RefreshController::new(settings.config.refresh_config(), week);
    let handle = controller.handle();
    let task = tokio::spawn(controller.run(move |monday| {
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.run(monday).await }
    }));

    let formatter = WeekFormatter::new(FormatOptions::default().with_color(color));
    let view_handle = handle.clone();
    let result = tokio::task::spawn_blocking(move || interactive::run(view_handle, formatter, zone))
        .await
        .map_err(|e| ClientError::Terminal(std::io::Error::other(e)));

    if let Err(e) = handle.stop().await {
        debug!(error = %e, "Controller already stopped");
    }
    if let Err(e) = task.await {
        warn!(error = %e, "Refresh task failed");
    }

    result?.map_err(ClientError::Terminal)
}
