//! Queue consumption loop
//!
//! The [`MessageLoop`] repeats a duty cycle until its stop token fires:
//!
//! 1. **Receive**: one long-poll call for up to `batch_size` messages
//! 2. **Process**: every message runs through the [`MessageProcessor`]
//!    independently, with at most `message_concurrency` in flight
//! 3. **Acknowledge**: a message is deleted only if processing succeeded;
//!    anything else is left for the queue to redeliver
//!
//! ## Receive failures
//!
//! A failed receive ends the cycle. The following cycle starts after an
//! exponential backoff (initial delay doubling per consecutive failure,
//! capped at the configured maximum) which resets on the next successful
//! receive.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, StreamExt};
use s3mirror_core::config::Config;
use s3mirror_core::ports::message_queue::{IMessageQueue, QueueMessage};
use s3mirror_core::usecases::MessageProcessor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

// ============================================================================
// LoopSettings
// ============================================================================

/// Tunables for the message loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    /// Messages requested per receive call (1..=10)
    pub batch_size: u32,
    /// Messages of one batch processed at the same time
    pub message_concurrency: usize,
    /// First delay after a failed receive
    pub backoff_initial: Duration,
    /// Upper bound for the receive delay
    pub backoff_max: Duration,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.queue.batch_size,
            message_concurrency: config.worker.message_concurrency.max(1),
            backoff_initial: Duration::from_millis(config.worker.receive_backoff_initial_ms),
            backoff_max: Duration::from_secs(config.worker.receive_backoff_max_secs),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Counters for one duty cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Messages handed out by the queue
    pub received: usize,
    /// Messages processed and deleted
    pub acknowledged: usize,
    /// Messages whose processing failed; left on the queue
    pub failed: usize,
    /// Messages processed successfully whose delete call failed
    pub ack_failed: usize,
    /// The receive call itself failed
    pub receive_failed: bool,
    /// The stop token fired while waiting for messages
    pub interrupted: bool,
}

/// Counters accumulated over the lifetime of a [`MessageLoop::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopTotals {
    pub cycles: u64,
    pub received: u64,
    pub acknowledged: u64,
    pub failed: u64,
    pub ack_failed: u64,
    pub receive_failures: u64,
}

impl LoopTotals {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.received += report.received as u64;
        self.acknowledged += report.acknowledged as u64;
        self.failed += report.failed as u64;
        self.ack_failed += report.ack_failed as u64;
        if report.receive_failed {
            self.receive_failures += 1;
        }
    }
}

/// Result of handling one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageResult {
    Acknowledged,
    AckFailed,
    Failed,
}

// ============================================================================
// Backoff
// ============================================================================

/// Exponential delay between consecutive failed receives
#[derive(Debug, Clone)]
struct ReceiveBackoff {
    initial: Duration,
    max: Duration,
    consecutive_failures: u32,
}

impl ReceiveBackoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            consecutive_failures: 0,
        }
    }

    /// Registers a failure and returns the delay before the next attempt
    fn next_delay(&mut self) -> Duration {
        let exponent = self.consecutive_failures.min(16);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.initial
            .saturating_mul(2u32.pow(exponent))
            .min(self.max)
    }

    fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}

// ============================================================================
// MessageLoop
// ============================================================================

/// Long-running consumer of the notification queue
pub struct MessageLoop {
    queue: Arc<dyn IMessageQueue>,
    processor: MessageProcessor,
    settings: LoopSettings,
    backoff: ReceiveBackoff,
    /// Number of the most recently started cycle
    cycle: u64,
}

impl MessageLoop {
    pub fn new(
        queue: Arc<dyn IMessageQueue>,
        processor: MessageProcessor,
        settings: LoopSettings,
    ) -> Self {
        let backoff = ReceiveBackoff::new(settings.backoff_initial, settings.backoff_max);
        Self {
            queue,
            processor,
            settings,
            backoff,
            cycle: 0,
        }
    }

    /// Runs cycles until `shutdown` is cancelled
    pub async fn run(&mut self, shutdown: &CancellationToken) -> LoopTotals {
        self.run_until(None, shutdown).await
    }

    /// Runs at most `max_cycles` cycles, stopping early if `shutdown` is cancelled
    pub async fn run_cycles(&mut self, max_cycles: u64, shutdown: &CancellationToken) -> LoopTotals {
        self.run_until(Some(max_cycles), shutdown).await
    }

    async fn run_until(&mut self, limit: Option<u64>, shutdown: &CancellationToken) -> LoopTotals {
        let mut totals = LoopTotals::default();

        info!(
            batch_size = self.settings.batch_size,
            message_concurrency = self.settings.message_concurrency,
            max_cycles = ?limit,
            "Starting message loop"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, stopping message loop");
                break;
            }
            if limit.is_some_and(|max| totals.cycles >= max) {
                info!(cycles = totals.cycles, "Cycle limit reached");
                break;
            }

            let report = self.run_cycle(shutdown).await;
            if report.interrupted {
                info!("Shutdown requested during receive, stopping message loop");
                break;
            }
            totals.record(&report);

            let last_cycle = limit.is_some_and(|max| totals.cycles >= max);
            if report.receive_failed && !last_cycle {
                let delay = self.backoff.next_delay();
                warn!(delay_ms = delay.as_millis() as u64, "Delaying next receive");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.cancelled() => {
                        info!("Shutdown requested during backoff, stopping message loop");
                        break;
                    }
                }
            }
        }

        info!(
            cycles = totals.cycles,
            received = totals.received,
            acknowledged = totals.acknowledged,
            failed = totals.failed,
            ack_failed = totals.ack_failed,
            receive_failures = totals.receive_failures,
            "Message loop stopped"
        );
        totals
    }

    /// Runs exactly one receive / process / acknowledge cycle
    ///
    /// A stop signal during the receive abandons it; once messages are in
    /// hand the whole batch is finished.
    pub async fn run_cycle(&mut self, shutdown: &CancellationToken) -> CycleReport {
        self.cycle += 1;
        let span = info_span!("cycle", n = self.cycle, id = %format!("{:#014x}", self.cycle));
        self.execute_cycle(shutdown).instrument(span).await
    }

    async fn execute_cycle(&mut self, shutdown: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::default();
        debug!("Begin");

        let received = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                report.interrupted = true;
                return report;
            }
            result = self.queue.receive(self.settings.batch_size) => result,
        };

        let messages = match received {
            Ok(messages) => {
                self.backoff.reset();
                messages
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Failed to receive messages");
                report.receive_failed = true;
                return report;
            }
        };

        report.received = messages.len();

        let this = &*self;
        let results: Vec<MessageResult> = stream::iter(messages)
            .map(|message| this.handle_message(message))
            .buffer_unordered(this.settings.message_concurrency.max(1))
            .collect()
            .await;

        for result in results {
            match result {
                MessageResult::Acknowledged => report.acknowledged += 1,
                MessageResult::AckFailed => report.ack_failed += 1,
                MessageResult::Failed => report.failed += 1,
            }
        }

        if report.received > 0 {
            info!(
                received = report.received,
                acknowledged = report.acknowledged,
                failed = report.failed,
                ack_failed = report.ack_failed,
                "End"
            );
        } else {
            debug!("End (no messages)");
        }
        report
    }

    async fn handle_message(&self, message: QueueMessage) -> MessageResult {
        let message_id = message.display_id().to_string();

        let processed = match self.processor.process(&message.body).await {
            Ok(processed) => processed,
            Err(e) => {
                if e.is_input_error() {
                    warn!(
                        message_id = %message_id,
                        stage = e.stage(),
                        error = %e,
                        "Message not processed; leaving it on the queue"
                    );
                } else {
                    error!(
                        message_id = %message_id,
                        stage = e.stage(),
                        error = %e,
                        "Message not processed; leaving it on the queue"
                    );
                }
                return MessageResult::Failed;
            }
        };

        debug!(
            message_id = %message_id,
            key = %processed.notification.object_key,
            outcome = ?processed.outcome,
            "Message processed"
        );

        match self.queue.delete(message).await {
            Ok(()) => MessageResult::Acknowledged,
            Err(e) => {
                warn!(
                    message_id = %message_id,
                    error = %format!("{e:#}"),
                    "Failed to delete processed message; it will be redelivered"
                );
                MessageResult::AckFailed
            }
        }
    }
}
