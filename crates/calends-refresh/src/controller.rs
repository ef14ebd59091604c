//! Background refresh controller.
//!
//! Runs refresh cycles on a timer or on demand and publishes every new
//! [`WeekSnapshot`] through a watch channel, so the interactive view always
//! reads a complete grid while the next one is being built. Features:
//! - Manual refresh requests during a cycle are coalesced
//! - A change of the displayed week starts a new cycle once the current ends
//! - A total failure is kept visible and retried after the interval
//! - Stopping drops the in-flight cycle

use std::future::Future;
use std::sync::Arc;

use calends_core::monday_of;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::RefreshConfig;
use crate::error::{RefreshError, RefreshResult};
use crate::pipeline::WeekSnapshot;

/// Where the controller is in its cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPhase {
    /// Waiting, with nothing displayed yet or after an error.
    #[default]
    Idle,
    /// A cycle is running.
    Fetching,
    /// The latest cycle succeeded and its snapshot is published.
    Displaying,
    /// The latest cycle failed; a retry follows after the interval.
    Error,
}

impl RefreshPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "refreshing",
            Self::Displaying => "up to date",
            Self::Error => "error",
        }
    }
}

/// Controller status published alongside the snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    pub phase: RefreshPhase,
    /// When the last successful snapshot was generated.
    pub last_success: Option<DateTime<Utc>>,
    /// Message of the last failed cycle, cleared on success.
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Number of finished cycles, successful or not.
    pub cycles: u64,
}

impl RefreshStatus {
    fn record_success(&mut self, generated_at: DateTime<Utc>) {
        self.phase = RefreshPhase::Displaying;
        self.last_success = Some(generated_at);
        self.last_error = None;
        self.consecutive_failures = 0;
        self.cycles += 1;
    }

    fn record_failure(&mut self, error: impl Into<String>) {
        self.phase = RefreshPhase::Error;
        self.last_error = Some(error.into());
        self.consecutive_failures += 1;
        self.cycles += 1;
    }
}

/// Commands that can be sent to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshCommand {
    /// Run a cycle now, unless one is already running.
    Refresh,
    /// Stop the controller, cancelling any running cycle.
    Stop,
}

/// The refresh controller.
pub struct RefreshController {
    config: RefreshConfig,
    command_tx: mpsc::Sender<RefreshCommand>,
    command_rx: mpsc::Receiver<RefreshCommand>,
    snapshot_tx: Arc<watch::Sender<Option<Arc<WeekSnapshot>>>>,
    status_tx: Arc<watch::Sender<RefreshStatus>>,
    week_tx: Arc<watch::Sender<NaiveDate>>,
}

impl RefreshController {
    /// Creates a controller that starts on the week containing `week`.
    pub fn new(config: RefreshConfig, week: NaiveDate) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (snapshot_tx, _) = watch::channel(None);
        let (status_tx, _) = watch::channel(RefreshStatus::default());
        let (week_tx, _) = watch::channel(monday_of(week));
        Self {
            config,
            command_tx,
            command_rx,
            snapshot_tx: Arc::new(snapshot_tx),
            status_tx: Arc::new(status_tx),
            week_tx: Arc::new(week_tx),
        }
    }

    /// Returns a handle for commands, the selected week and the published state.
    pub fn handle(&self) -> RefreshHandle {
        RefreshHandle {
            command_tx: self.command_tx.clone(),
            snapshot_rx: self.snapshot_tx.subscribe(),
            status_rx: self.status_tx.subscribe(),
            week_tx: Arc::clone(&self.week_tx),
        }
    }

    /// Runs the controller loop with the given cycle function.
    ///
    /// `cycle` builds the snapshot for the week starting on the given Monday.
    /// The first cycle starts immediately.
    pub async fn run<F, Fut>(self, cycle: F)
    where
        F: Fn(NaiveDate) -> Fut + Send + Sync,
        Fut: Future<Output = RefreshResult<WeekSnapshot>> + Send,
    {
        let Self {
            config,
            command_tx,
            mut command_rx,
            snapshot_tx,
            status_tx,
            week_tx,
        } = self;
        // Handles own the remaining senders; the loop ends when they are gone.
        drop(command_tx);
        let mut week_rx = week_tx.subscribe();
        drop(week_tx);
        let mut week_open = true;

        info!(
            interval_secs = config.interval.as_secs(),
            "Refresh controller started"
        );

        let mut pending = true;
        loop {
            if pending {
                pending = false;
                let week = *week_rx.borrow_and_update();
                status_tx.send_modify(|s| s.phase = RefreshPhase::Fetching);
                debug!(week = %week, "Starting refresh cycle");

                let mut rerun = false;
                let outcome = {
                    let cycle_future = cycle(week);
                    tokio::pin!(cycle_future);
                    loop {
                        tokio::select! {
                            result = &mut cycle_future => break Some(result),
                            cmd = command_rx.recv() => match cmd {
                                Some(RefreshCommand::Refresh) => {
                                    debug!("Refresh already running, coalescing request");
                                }
                                Some(RefreshCommand::Stop) | None => break None,
                            },
                            changed = week_rx.changed(), if week_open => match changed {
                                Ok(()) => rerun = true,
                                Err(_) => week_open = false,
                            },
                        }
                    }
                };

                match outcome {
                    None => {
                        info!("Refresh controller stopping, cancelled running cycle");
                        return;
                    }
                    Some(Ok(snapshot)) => {
                        let generated_at = snapshot.generated_at;
                        snapshot_tx.send_replace(Some(Arc::new(snapshot)));
                        status_tx.send_modify(|s| s.record_success(generated_at));
                        debug!(week = %week, "Published new snapshot");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Refresh cycle failed");
                        status_tx.send_modify(|s| s.record_failure(e.to_string()));
                    }
                }

                if rerun {
                    debug!("Displayed week changed during cycle, running again");
                    pending = true;
                    continue;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(config.interval), if config.is_periodic() => {
                    status_tx.send_if_modified(|s| {
                        let was_error = s.phase == RefreshPhase::Error;
                        if was_error {
                            s.phase = RefreshPhase::Idle;
                        }
                        was_error
                    });
                    pending = true;
                }
                cmd = command_rx.recv() => match cmd {
                    Some(RefreshCommand::Refresh) => {
                        debug!("Received refresh command");
                        pending = true;
                    }
                    Some(RefreshCommand::Stop) | None => {
                        info!("Refresh controller stopping");
                        return;
                    }
                },
                changed = week_rx.changed(), if week_open => match changed {
                    Ok(()) => pending = true,
                    Err(_) => week_open = false,
                },
            }
        }
    }
}

/// Handle to a running [`RefreshController`].
#[derive(Clone, Debug)]
pub struct RefreshHandle {
    command_tx: mpsc::Sender<RefreshCommand>,
    snapshot_rx: watch::Receiver<Option<Arc<WeekSnapshot>>>,
    status_rx: watch::Receiver<RefreshStatus>,
    week_tx: Arc<watch::Sender<NaiveDate>>,
}

impl RefreshHandle {
    /// Requests a refresh.
    pub async fn refresh(&self) -> RefreshResult<()> {
        self.command_tx
            .send(RefreshCommand::Refresh)
            .await
            .map_err(|_| RefreshError::Stopped)
    }

    /// Requests a refresh without waiting. A full queue already holds one.
    pub fn try_refresh(&self) -> RefreshResult<()> {
        match self.command_tx.try_send(RefreshCommand::Refresh) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RefreshError::Stopped),
        }
    }

    /// Stops the controller.
    pub async fn stop(&self) -> RefreshResult<()> {
        self.command_tx
            .send(RefreshCommand::Stop)
            .await
            .map_err(|_| RefreshError::Stopped)
    }

    /// Selects the week containing `date`. Returns true if the week changed.
    pub fn set_week(&self, date: NaiveDate) -> bool {
        let monday = monday_of(date);
        self.week_tx.send_if_modified(|week| {
            if *week == monday {
                false
            } else {
                *week = monday;
                true
            }
        })
    }

    /// The Monday of the selected week.
    pub fn week(&self) -> NaiveDate {
        *self.week_tx.borrow()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Option<Arc<WeekSnapshot>> {
        self.snapshot_rx.borrow().clone()
    }

    pub fn status(&self) -> RefreshStatus {
        self.status_rx.borrow().clone()
    }

    /// Returns a receiver for waiting on new snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<WeekSnapshot>>> {
        self.snapshot_rx.clone()
    }

    /// Returns true if a snapshot or status was published since the last call.
    pub fn take_changed(&mut self) -> bool {
        let snapshot = self.snapshot_rx.has_changed().unwrap_or(false);
        let status = self.status_rx.has_changed().unwrap_or(false);
        if snapshot {
            self.snapshot_rx.borrow_and_update();
        }
        if status {
            self.status_rx.borrow_and_update();
        }
        snapshot || status
    }
}
