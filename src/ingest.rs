//! Inbound delivery loop
//!
//! Drains messages handed over by the protocol transport and buffers them in
//! the correlation service. A message whose token cannot be decoded is logged
//! and dropped; the loop carries on with the next one.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::error::CorrelationError;
use crate::message::Message;
use crate::service::CorrelationService;

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub dropped: u64,
}

/// Sending half handed to transports.
pub type MessageSender = mpsc::Sender<Message>;

/// Run until the channel closes or `shutdown` flips to `true`.
pub async fn run_ingest_loop(
    service: Arc<CorrelationService>,
    mut inbound: mpsc::Receiver<Message>,
    mut shutdown: watch::Receiver<bool>,
) -> IngestStats {
    info!("Ingest loop started");
    let mut stats = IngestStats::default();

    loop {
        tokio::select! {
            received = inbound.recv() => {
                let Some(message) = received else {
                    info!("Inbound channel closed");
                    break;
                };
                match service.ingest(message) {
                    Ok(_) => stats.accepted += 1,
                    Err(e @ CorrelationError::LockPoisoned(_)) => {
                        error!(?e, "Correlation store unusable, stopping ingest");
                        stats.dropped += 1;
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Dropping inbound message");
                        stats.dropped += 1;
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Ingest loop shutting down");
                    break;
                }
            }
        }
    }

    info!(accepted = stats.accepted, dropped = stats.dropped, "Ingest loop stopped");
    stats
}
