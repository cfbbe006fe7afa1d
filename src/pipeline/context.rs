//! Run-scoped context: configuration, oracle clients and cancellation.

use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::config::RunConfig;
use crate::error::{EngineError, EngineResult};
use crate::oracle::{CalendarClient, CalendarResolver, ClassificationClient, ClassificationOracle};

/// Receiving side of a run's cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: watch::Receiver<bool>,
}

/// Sending side of a run's cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

/// Creates a linked handle and signal.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        CancelHandle {
            sender: Arc::new(sender),
        },
        CancelSignal { receiver },
    )
}

impl CancelHandle {
    /// Aborts the run. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl CancelSignal {
    /// A signal that is never raised.
    pub fn never() -> Self {
        // The sender is dropped at once; `cancelled()` then pends forever.
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }

    /// Returns true once the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Completes when the run is cancelled.
    ///
    /// Pends forever if the handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Returns `EngineError::Cancelled` if the run has been cancelled.
    pub fn check(&self, stage: &str) -> EngineResult<()> {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }
}

/// Everything a single run needs besides its input tables.
///
/// Oracle memoization lives in the clients held here, so two runs never
/// share cached verdicts or calendars.
pub struct RunContext {
    run_id: Uuid,
    config: Arc<RunConfig>,
    classification: ClassificationClient,
    calendar: CalendarClient,
    cancel: CancelSignal,
}

impl RunContext {
    /// Creates a context with fresh caches and a new run id.
    pub fn new(
        config: Arc<RunConfig>,
        oracle: Arc<dyn ClassificationOracle>,
        resolver: Arc<dyn CalendarResolver>,
        cancel: CancelSignal,
    ) -> Self {
        let policy = config.settings().oracle.retry_policy();
        let national = config.national_calendar().iter().map(|h| h.date);
        let calendar = CalendarClient::new(resolver, policy.clone(), config.period(), national);
        Self {
            run_id: Uuid::new_v4(),
            classification: ClassificationClient::new(oracle, policy),
            calendar,
            config,
            cancel,
        }
    }

    /// The run id stamped on every snapshot.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The memoizing classification client.
    pub fn classification(&self) -> &ClassificationClient {
        &self.classification
    }

    /// The memoizing calendar client.
    pub fn calendar(&self) -> &CalendarClient {
        &self.calendar
    }

    /// The run's cancellation signal.
    pub fn cancel(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Bounded concurrency for distinct-key lookups.
    pub fn concurrency(&self) -> usize {
        self.config.settings().oracle.concurrency
    }
}
