//! Poll loop
//!
//! One sequential loop: list, diff against the previous listing and the
//! ledger, deliver the selected keys one by one, remember the listing.
//! Cancellation is observed between iterations only.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kiosk_printer::{
    BitmapPrinter, FontStack, GdiPrinter, PreviewPrinter, TextComposer, TextRenderer,
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::{OutputConfig, SourceConfig, WatchConfig};
use super::error::Result;
use crate::delivery::Pipeline;
use crate::source::{FolderSource, ItemSource, S3Source, Snapshot};
use crate::tracking::{Detector, ExtensionFilter, Ledger, RetryDecision, RetryQueue};

/// Counters reported at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub iterations: u64,
    pub listing_failures: u64,
    pub printed: u64,
    pub failed: u64,
    pub given_up: u64,
}

/// Outcome of a single iteration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationReport {
    /// Keys attempted this iteration (detector selection, then retries)
    pub selected: Vec<String>,
    pub printed: Vec<String>,
    pub failed: Vec<String>,
    /// True when the listing failed and nothing was attempted
    pub listing_failed: bool,
}

pub struct Watcher {
    source: Arc<dyn ItemSource>,
    pipeline: Pipeline,
    detector: Detector,
    retry: RetryQueue,
    ledger: Ledger,
    previous: Option<Snapshot>,
    process_backlog: bool,
    poll_interval: Duration,
    stats: WatchStats,
}

impl Watcher {
    pub fn new(
        source: Arc<dyn ItemSource>,
        pipeline: Pipeline,
        detector: Detector,
        ledger: Ledger,
    ) -> Self {
        Self {
            source,
            pipeline,
            detector,
            retry: RetryQueue::new(None),
            ledger,
            previous: None,
            process_backlog: false,
            poll_interval: Duration::from_secs(1),
            stats: WatchStats::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryQueue) -> Self {
        self.retry = retry;
        self
    }

    /// Diff the first listing against an empty snapshot instead of using it
    /// as a baseline
    pub fn with_backlog(mut self, process_backlog: bool) -> Self {
        self.process_backlog = process_backlog;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Connect every collaborator described by `config`
    ///
    /// Fails when the source, printer or text renderer cannot be set up.
    pub async fn from_config(config: &WatchConfig) -> Result<Self> {
        let source: Arc<dyn ItemSource> = match &config.source {
            SourceConfig::S3(settings) => Arc::new(S3Source::connect(settings.clone()).await?),
            SourceConfig::Folder(dir) => Arc::new(FolderSource::open(dir)?),
        };

        let printer: Arc<dyn BitmapPrinter> = match &config.output {
            OutputConfig::Gdi { printer } => Arc::new(GdiPrinter::connect(printer.as_deref())?),
            OutputConfig::Preview { dir } => Arc::new(PreviewPrinter::new(dir)?),
        };

        let mut pipeline = Pipeline::new(Arc::clone(&source), printer)
            .with_paper(config.paper)
            .with_doc_prefix(config.doc_prefix.clone());

        if let Some(text) = &config.text {
            let fonts = FontStack::load(
                text.font.as_deref(),
                text.emoji_font.as_deref(),
                text.font_size,
            )?;
            let renderer =
                TextRenderer::from_template_file(&text.template, fonts, text.region, text.line_height)?;
            let composer: Arc<dyn TextComposer> = Arc::new(renderer);
            pipeline = pipeline.with_text(composer, text.encodings.clone());
        }

        let detector = Detector::new(ExtensionFilter::new(&config.extensions))
            .with_recency_window(config.recency_window)
            .with_on_modify(config.on_modify);

        let ledger = Ledger::load(&config.ledger_path);

        Ok(Self::new(source, pipeline, detector, ledger)
            .with_retry(RetryQueue::new(config.max_attempts))
            .with_backlog(config.process_backlog)
            .with_poll_interval(config.poll_interval))
    }

    pub fn stats(&self) -> WatchStats {
        self.stats
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn retry_queue(&self) -> &RetryQueue {
        &self.retry
    }

    /// Run one iteration at time `now`
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> IterationReport {
        self.stats.iterations += 1;
        let mut report = IterationReport::default();

        let current = match self.source.list().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Keep the previous listing; a failed listing is not an empty container
                warn!(error = %e, "Listing failed, keeping previous snapshot");
                self.stats.listing_failures += 1;
                report.listing_failed = true;
                return report;
            }
        };

        let previous = match self.previous.take() {
            Some(previous) => previous,
            None if self.process_backlog => {
                info!(items = current.len(), "First listing, processing backlog");
                Snapshot::new()
            }
            None => {
                info!(items = current.len(), "Baseline listing taken");
                self.previous = Some(current);
                return report;
            }
        };

        let mut keys = self
            .detector
            .select(&previous, &current, self.ledger.keys(), now);
        for key in self.retry.due(&current) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        for key in &keys {
            info!(key = %key, "Selected for printing");
            match self.pipeline.deliver(key, &mut self.ledger).await {
                Ok(()) => {
                    info!(key = %key, "Printed");
                    self.retry.record_success(key);
                    self.stats.printed += 1;
                    report.printed.push(key.clone());
                }
                Err(e) => {
                    self.stats.failed += 1;
                    report.failed.push(key.clone());
                    match self.retry.record_failure(key) {
                        RetryDecision::Retry { attempts } => warn!(
                            key = %key,
                            stage = ?e.stage(),
                            attempts,
                            error = %e,
                            "Delivery failed, will retry"
                        ),
                        RetryDecision::GiveUp { attempts } => {
                            self.stats.given_up += 1;
                            error!(
                                key = %key,
                                stage = ?e.stage(),
                                attempts,
                                error = %e,
                                "Delivery failed, giving up"
                            );
                        }
                    }
                }
            }
        }

        report.selected = keys;
        self.previous = Some(current);
        report
    }

    /// Poll until `shutdown` is cancelled
    pub async fn run(mut self, shutdown: CancellationToken) -> WatchStats {
        info!(
            source = %self.source.describe(),
            printer = %self.pipeline.printer_target(),
            interval_ms = self.poll_interval.as_millis() as u64,
            ledger = self.ledger.len(),
            "Watching"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_once(Utc::now()).await;
                }
            }
        }

        self.stats
    }
}
