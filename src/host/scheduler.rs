//! Tokio-side job scheduler backing the queue's dispatch request.
//!
//! The host accepts at most one outstanding job. `schedule` never blocks: it
//! fails when a job is already waiting or the receiving side is gone, which
//! the event queue counts as a schedule failure.

use super::callbacks::HostCallbacks;
use super::dispatcher::{DrainReport, drain_once};
use crate::events::{DispatchRequest, EventQueue};
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct JobScheduler {
    tx: mpsc::Sender<()>,
}

/// Receiving half of a [`JobScheduler`].
pub struct JobReceiver {
    rx: mpsc::Receiver<()>,
}

impl JobScheduler {
    pub fn new() -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, JobReceiver { rx })
    }

    /// Queue a drain job. Returns `false` when it could not be queued.
    pub fn schedule(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(e) => {
                debug!("[Host] drain job not scheduled: {e}");
                false
            }
        }
    }

    /// This scheduler as the event queue's dispatch-request callback.
    pub fn dispatch_request(&self) -> DispatchRequest {
        let scheduler = self.clone();
        Arc::new(move || scheduler.schedule())
    }
}

impl JobReceiver {
    pub async fn next_job(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

/// Run one drain pass per scheduled job until every scheduler handle has
/// been dropped.
pub async fn run_dispatch_loop(
    mut jobs: JobReceiver,
    queue: Arc<EventQueue>,
    callbacks: Arc<HostCallbacks>,
) -> DrainReport {
    info!("[Host] dispatch loop running");
    let mut total = DrainReport::default();
    while jobs.next_job().await.is_some() {
        total.merge(drain_once(&queue, &callbacks));
    }
    info!(
        "[Host] dispatch loop finished after {} event(s)",
        total.popped
    );
    total
}
