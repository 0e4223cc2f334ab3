use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vexdb_core::metrics::SEGMENT_STATS_REPORTED;
use vexdb_core::{CoreError, CoreResult, DataNodeConfig};

use crate::replica::CollectionReplica;
use crate::segment::SegmentStatisticsUpdate;

/// Batch of statistics updates taken in one report cycle.
pub type StatisticsBatch = Vec<SegmentStatisticsUpdate>;

/// Periodically drains segment statistics from a replica into a sink.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use vexdb_core::DataNodeConfig;
/// use vexdb_datanode::{CollectionReplica, StatisticsReporter};
///
/// # async fn example() {
/// let replica = Arc::new(CollectionReplica::new());
/// let (mut reporter, mut batches) =
///     StatisticsReporter::with_channel(replica, &DataNodeConfig::default());
///
/// reporter.start_worker();
/// while let Some(batch) = batches.recv().await {
///     println!("{} segment updates", batch.len());
/// }
/// # }
/// ```
pub struct StatisticsReporter {
    replica: Arc<CollectionReplica>,
    sink: mpsc::Sender<StatisticsBatch>,
    interval: Duration,
    worker: Option<JoinHandle<()>>,
}

impl StatisticsReporter {
    #[must_use]
    pub fn new(
        replica: Arc<CollectionReplica>,
        sink: mpsc::Sender<StatisticsBatch>,
        interval: Duration,
    ) -> Self {
        Self {
            replica,
            sink,
            interval,
            worker: None,
        }
    }

    /// Creates a reporter together with the receiving end of its sink, sized and
    /// timed from `config`.
    #[must_use]
    pub fn with_channel(
        replica: Arc<CollectionReplica>,
        config: &DataNodeConfig,
    ) -> (Self, mpsc::Receiver<StatisticsBatch>) {
        let (tx, rx) = mpsc::channel(config.stats_channel_capacity);
        (Self::new(replica, tx, config.stats_report_interval()), rx)
    }

    /// Takes every segment's statistics update and forwards them as one batch.
    ///
    /// A slot in the sink is reserved before anything is taken, so updates (and
    /// their one-shot start positions) are never taken without being delivered.
    /// Empty batches are not sent. Returns the number of updates forwarded.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the sink has been closed.
    pub async fn run_report_cycle(&self) -> CoreResult<usize> {
        let permit = self
            .sink
            .reserve()
            .await
            .map_err(|_| CoreError::internal("statistics sink is closed"))?;

        let batch = self.replica.take_all_statistics_updates();
        if batch.is_empty() {
            return Ok(0);
        }

        let reported = batch.len();
        permit.send(batch);
        SEGMENT_STATS_REPORTED.inc_by(reported as u64);
        tracing::debug!(segments = reported, "Reported segment statistics");
        Ok(reported)
    }

    /// Start background worker
    ///
    /// Runs a report cycle every configured interval until the sink closes or
    /// [`stop_worker`](Self::stop_worker) is called.
    pub fn start_worker(&mut self) {
        if self.is_running() {
            tracing::warn!("Statistics reporter already running");
            return;
        }

        let reporter = self.clone_for_worker();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                if let Err(e) = reporter.run_report_cycle().await {
                    if reporter.sink.is_closed() {
                        tracing::info!("Statistics sink closed, reporter exiting");
                        break;
                    }
                    tracing::error!(error = %e, "Statistics report cycle failed");
                }
            }
        });

        self.worker = Some(handle);
        tracing::info!("Statistics reporter started (interval: {:?})", interval);
    }

    /// Stops the background worker, if any.
    pub fn stop_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            handle.abort();
            tracing::info!("Statistics reporter stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn clone_for_worker(&self) -> Self {
        Self {
            replica: Arc::clone(&self.replica),
            sink: self.sink.clone(),
            interval: self.interval,
            worker: None,
        }
    }
}

impl Drop for StatisticsReporter {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            handle.abort();
        }
    }
}
