//! High-level runtime orchestrator.
//!
//! The runtime owns the race worker and optional ticker, wires up
//! command/event channels, and exposes a builder-based API for clients.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use race_core::{Clock, RaceState, RiderDirectory, SystemClock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{RaceHandle, Result, RuntimeError};
use crate::events::EventBus;
use crate::repository::{FileRecordRepository, RecordFormat, RecordRepository};
use crate::workers::{Command, Persistence, RaceWorker, SharedDirectory, Ticker};

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
    /// Elapsed-time refresh period; `None` disables the ticker.
    pub tick_interval: Option<Duration>,
    /// Directory for file records; `None` keeps the event in memory only.
    pub record_dir: Option<PathBuf>,
    pub record_name: String,
    pub record_format: RecordFormat,
    /// Save the record when the runtime shuts down.
    pub autosave: bool,
}

impl RuntimeConfig {
    pub const DEFAULT_EVENT_BUFFER: usize = 256;
    pub const DEFAULT_COMMAND_BUFFER: usize = 64;
    pub const DEFAULT_RECORD_NAME: &'static str = "event";

    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `RACE_EVENT_BUFFER` - Events buffered per topic (default: 256)
    /// - `RACE_COMMAND_BUFFER` - Worker command queue size (default: 64)
    /// - `RACE_TICK_MS` - Ticker period in milliseconds, 0 disables (default: off)
    /// - `RACE_RECORD_DIR` - Record directory (default: none)
    /// - `RACE_RECORD_NAME` - Record name within the directory (default: event)
    /// - `RACE_RECORD_FORMAT` - `json` or `bincode` (default: json)
    /// - `RACE_AUTOSAVE` - Save on shutdown (default: false)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(capacity) = read_env::<usize>("RACE_EVENT_BUFFER") {
            config.event_buffer_size = capacity.max(1);
        }
        if let Some(capacity) = read_env::<usize>("RACE_COMMAND_BUFFER") {
            config.command_buffer_size = capacity.max(1);
        }
        if let Some(millis) = read_env::<u64>("RACE_TICK_MS") {
            config.tick_interval = (millis > 0).then(|| Duration::from_millis(millis));
        }

        config.record_dir = env::var("RACE_RECORD_DIR").ok().map(PathBuf::from);

        if let Ok(name) = env::var("RACE_RECORD_NAME")
            && !name.trim().is_empty()
        {
            config.record_name = name.trim().to_owned();
        }

        if let Ok(format) = env::var("RACE_RECORD_FORMAT") {
            match format.parse() {
                Ok(format) => config.record_format = format,
                Err(err) => warn!(target: "runtime::config", %err, "keeping default record format"),
            }
        }

        if let Some(enable) = read_env::<bool>("RACE_AUTOSAVE") {
            config.autosave = enable;
        } else if env::var("RACE_AUTOSAVE").is_ok() {
            // Accept a bare variable as "true"
            config.autosave = true;
        }

        config
    }

    pub fn with_tick_interval(mut self, tick_interval: Option<Duration>) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_record_dir(mut self, record_dir: impl Into<PathBuf>) -> Self {
        self.record_dir = Some(record_dir.into());
        self
    }

    pub fn with_record_name(mut self, record_name: impl Into<String>) -> Self {
        self.record_name = record_name.into();
        self
    }

    pub fn with_record_format(mut self, record_format: RecordFormat) -> Self {
        self.record_format = record_format;
        self
    }

    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: Self::DEFAULT_EVENT_BUFFER,
            command_buffer_size: Self::DEFAULT_COMMAND_BUFFER,
            tick_interval: None,
            record_dir: None,
            record_name: Self::DEFAULT_RECORD_NAME.to_owned(),
            record_format: RecordFormat::default(),
            autosave: false,
        }
    }
}

/// Platform data directory for event records.
///
/// - Linux: `~/.local/share/racetimer/records`
/// - macOS: `~/Library/Application Support/racetimer/records`
/// - Fallback: `./records`
pub fn default_record_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "racetimer")
        .map(|dirs| dirs.data_dir().join("records"))
        .unwrap_or_else(|| PathBuf::from("./records"))
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

/// Main runtime that drives one event.
///
/// Runtime owns the worker tasks; [`RaceHandle`] is the cloneable façade
/// for clients.
pub struct Runtime {
    handle: RaceHandle,
    worker_handle: JoinHandle<()>,
    ticker_handle: Option<JoinHandle<()>>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    pub fn handle(&self) -> RaceHandle {
        self.handle.clone()
    }

    /// Shutdown the runtime gracefully.
    ///
    /// The worker runs any pending recalculation and autosaves when
    /// configured; a failed autosave is returned here.
    pub async fn shutdown(self) -> Result<()> {
        if let Some(ticker) = self.ticker_handle {
            ticker.abort();
        }

        let result = self.handle.shutdown().await;
        drop(self.handle);

        self.worker_handle
            .await
            .map_err(RuntimeError::WorkerJoin)?;

        result
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    state: Option<RaceState>,
    directory: Option<SharedDirectory>,
    clock: Option<Arc<dyn Clock>>,
    repository: Option<Arc<dyn RecordRepository>>,
    resume: bool,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            state: None,
            directory: None,
            clock: None,
            repository: None,
            resume: false,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Provide the event to run; defaults to an empty road race.
    pub fn initial_state(mut self, state: RaceState) -> Self {
        self.state = Some(state);
        self
    }

    /// Rider directory used to resolve transponders and register riders.
    pub fn directory(mut self, directory: impl RiderDirectory + Send + Sync + 'static) -> Self {
        self.directory = Some(Arc::new(directory));
        self
    }

    /// Time source; defaults to the local wall clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Record repository; overrides `record_dir` in the config.
    pub fn repository(mut self, repository: impl RecordRepository + 'static) -> Self {
        self.repository = Some(Arc::new(repository));
        self
    }

    /// Continue from the stored record when one exists.
    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    fn open_repository(&mut self) -> Result<Option<Arc<dyn RecordRepository>>> {
        if let Some(repository) = self.repository.take() {
            return Ok(Some(repository));
        }
        let Some(dir) = &self.config.record_dir else {
            return Ok(None);
        };
        let repository = FileRecordRepository::new(dir, self.config.record_format)?;
        Ok(Some(Arc::new(repository)))
    }

    /// Build the runtime and spawn its workers.
    pub async fn build(mut self) -> Result<Runtime> {
        let repository = self.open_repository()?;
        let name = self.config.record_name.clone();

        let stored = match (&repository, self.resume) {
            (Some(repository), true) => repository.load(&name)?,
            _ => None,
        };
        let state = match stored {
            Some(record) => {
                info!(target: "runtime", name = %name, "resuming stored event");
                RaceState::from_record(record)
            }
            None => self.state.unwrap_or_default(),
        };

        let directory: SharedDirectory = match self.directory {
            Some(directory) => directory,
            None => Arc::new(Vec::<race_core::DirectoryEntry>::new()) as SharedDirectory,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let persistence = repository.map(|repository| Persistence {
            repository,
            name,
            autosave: self.config.autosave,
        });

        let (command_tx, command_rx) = mpsc::channel::<Command>(self.config.command_buffer_size);
        let event_bus = EventBus::with_capacity(self.config.event_buffer_size);
        let handle = RaceHandle::new(command_tx.clone(), event_bus.clone());

        let worker = RaceWorker::new(state, directory, clock, command_rx, event_bus, persistence);
        let worker_handle = tokio::spawn(async move {
            worker.run().await;
        });

        let ticker_handle = self.config.tick_interval.map(|period| {
            let ticker = Ticker::new(&command_tx, period);
            tokio::spawn(async move {
                ticker.run().await;
            })
        });

        Ok(Runtime {
            handle,
            worker_handle,
            ticker_handle,
        })
    }
}
