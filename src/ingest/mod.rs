//! # Ingestion Module
//!
//! Groundstation side: one worker per inbound transport, all writing into
//! the shared [`TelemetryStore`].
//!
//! This module handles:
//! - Binding the UDP telemetry port (the only fatal step)
//! - Spawning the UDP, long-range radio and RC input workers
//! - Per-worker reconnect with a fixed retry delay
//! - Restarting a worker whose cycle panics
//! - Counting what each worker has seen and logging it periodically
//!
//! Workers never stop on their own. A dead device only stalls its own
//! worker; the others keep running.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Config;
use crate::error::Result;
use crate::telemetry::TelemetryStore;
use crate::transport::serial::SerialConnector;
use crate::transport::supervised::{PortSource, SupervisedLink};
use crate::transport::udp::UdpTransport;
use crate::transport::Connector;

pub mod datagram;
pub mod radio;
pub mod rc_input;
pub mod udp;

use datagram::MavlinkDecoder;
use radio::RadioWorker;
use rc_input::RcInputWorker;
use udp::UdpWorker;

/// Interval between ingestion statistics log lines
pub const STATS_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Shared ingestion counters
#[derive(Debug, Default)]
pub struct IngestStats {
    pub udp_datagrams: AtomicU64,
    pub udp_updates: AtomicU64,
    pub udp_errors: AtomicU64,
    pub radio_records: AtomicU64,
    pub radio_discarded: AtomicU64,
    pub rc_lines: AtomicU64,
    pub rc_rejected: AtomicU64,
    pub reconnects: AtomicU64,
    pub restarts: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestCounters {
    pub udp_datagrams: u64,
    pub udp_updates: u64,
    pub udp_errors: u64,
    pub radio_records: u64,
    pub radio_discarded: u64,
    pub rc_lines: u64,
    pub rc_rejected: u64,
    pub reconnects: u64,
    pub restarts: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestCounters {
        IngestCounters {
            udp_datagrams: self.udp_datagrams.load(Ordering::Relaxed),
            udp_updates: self.udp_updates.load(Ordering::Relaxed),
            udp_errors: self.udp_errors.load(Ordering::Relaxed),
            radio_records: self.radio_records.load(Ordering::Relaxed),
            radio_discarded: self.radio_discarded.load(Ordering::Relaxed),
            rc_lines: self.rc_lines.load(Ordering::Relaxed),
            rc_rejected: self.rc_rejected.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
        }
    }
}

/// One ingestion worker, driven a cycle at a time by [`supervise`]
#[async_trait]
pub trait IngestWorker: Send {
    /// One read-and-apply cycle
    async fn poll(&mut self);

    /// Drop partial input after a cycle panicked
    fn reset(&mut self) {}
}

/// Poll `worker` forever, restarting it after `restart_delay` when a cycle
/// panics
pub async fn supervise(
    name: &'static str,
    mut worker: Box<dyn IngestWorker>,
    stats: Arc<IngestStats>,
    restart_delay: Duration,
) {
    loop {
        if AssertUnwindSafe(worker.poll()).catch_unwind().await.is_err() {
            let restarts = stats.restarts.fetch_add(1, Ordering::Relaxed) + 1;
            error!(
                "{} worker panicked, restarting in {:?} ({} restarts so far)",
                name, restart_delay, restarts
            );
            worker.reset();
            tokio::time::sleep(restart_delay).await;
        }
    }
}

/// Worker settings shared by every ingestion link
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub radio_ports: PortSource,
    pub rc_ports: PortSource,
    pub retry_delay: Duration,
    pub udp_buffer_size: usize,
}

/// Owns the running ingestion workers
pub struct Coordinator {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    stats: Arc<IngestStats>,
}

impl Coordinator {
    /// Bind the UDP port and start every worker
    ///
    /// # Errors
    ///
    /// `Bind` if the UDP telemetry port cannot be acquired. Nothing else
    /// fails here: serial devices are searched for by the workers.
    pub async fn start(config: &Config, store: Arc<TelemetryStore>) -> Result<Self> {
        let read_timeout = config.ingest.read_timeout();
        let udp = UdpTransport::bind("udp", config.groundstation.udp_bind_port, read_timeout).await?;

        let radio = SerialConnector::new("radio", config.groundstation.radio_baud_rate, read_timeout);
        let rc = SerialConnector::new("rc", config.groundstation.rc_baud_rate, read_timeout);

        let settings = IngestSettings {
            radio_ports: PortSource::from_list(config.groundstation.radio_candidates()),
            rc_ports: PortSource::from_list(config.groundstation.rc_candidates()),
            retry_delay: config.ingest.retry_delay(),
            udp_buffer_size: config.ingest.udp_buffer_size,
        };

        Ok(Self::spawn(udp, Arc::new(radio), Arc::new(rc), settings, store))
    }

    /// Start workers over already-opened or injected links
    pub fn spawn(
        udp: UdpTransport,
        radio: Arc<dyn Connector>,
        rc: Arc<dyn Connector>,
        settings: IngestSettings,
        store: Arc<TelemetryStore>,
    ) -> Self {
        let stats = Arc::new(IngestStats::default());

        let udp_worker = UdpWorker::new(
            udp,
            Box::new(MavlinkDecoder::new()),
            settings.udp_buffer_size,
            store.clone(),
            stats.clone(),
        );

        let radio_worker = RadioWorker::new(
            SupervisedLink::new("radio", radio, settings.radio_ports, settings.retry_delay),
            store.clone(),
            stats.clone(),
        );

        let rc_worker = RcInputWorker::new(
            SupervisedLink::new("rc", rc, settings.rc_ports, settings.retry_delay),
            store,
            stats.clone(),
        );

        let delay = settings.retry_delay;
        let tasks = vec![
            ("udp", tokio::spawn(supervise("udp", Box::new(udp_worker), stats.clone(), delay))),
            ("radio", tokio::spawn(supervise("radio", Box::new(radio_worker), stats.clone(), delay))),
            ("rc", tokio::spawn(supervise("rc", Box::new(rc_worker), stats.clone(), delay))),
            ("stats", tokio::spawn(log_stats(stats.clone(), STATS_LOG_INTERVAL))),
        ];
        info!("Ingestion started with {} tasks", tasks.len());

        Self { tasks, stats }
    }

    pub fn stats(&self) -> IngestCounters {
        self.stats.snapshot()
    }

    /// Names of tasks that have exited
    ///
    /// Worker panics are caught and restarted in place, so this stays empty
    /// unless the runtime itself is shutting down.
    pub fn finished(&self) -> Vec<&'static str> {
        self.tasks
            .iter()
            .filter(|(_, task)| task.is_finished())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Stop every worker
    pub fn shutdown(self) {
        for (name, task) in self.tasks {
            task.abort();
            info!("Stopped {} worker", name);
        }
    }
}

/// Log ingestion counters every `period`
pub async fn log_stats(stats: Arc<IngestStats>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let c = stats.snapshot();
        info!(
            "Ingest: udp {} datagrams / {} updates / {} errors, radio {} records ({} bytes skipped), rc {} lines ({} rejected), {} reconnects, {} restarts",
            c.udp_datagrams,
            c.udp_updates,
            c.udp_errors,
            c.radio_records,
            c.radio_discarded,
            c.rc_lines,
            c.rc_rejected,
            c.reconnects,
            c.restarts
        );
    }
}
