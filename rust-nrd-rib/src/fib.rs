//! The FIB updater capability consumed by the RIB.
//!
//! The RIB never talks to the forwarder's FIB itself. It hands each batch to
//! an injected [`FibUpdater`] and only commits the corresponding table
//! mutation once the host delivers a success result back through
//! [`crate::rib::Rib::on_fib_update_success`]. Exactly one result must be
//! delivered for every dispatched batch.

use crate::service::RibCommand;
use crate::update::{RibUpdate, RibUpdateBatch};
use log::trace;
use thiserror::Error;
use tokio::sync::mpsc;

/// Failure reported by the FIB updater, propagated verbatim to the
/// originating command.
#[derive(Debug, Clone, Error)]
#[error("FIB update failed with code {code}: {message}")]
pub struct FibError {
    pub code: u32,
    pub message: String,
}

/// Outcome of one batch: on success, the inherited-route delta list the RIB
/// must apply to keep descendants consistent.
pub type FibUpdateResult = Result<Vec<RibUpdate>, FibError>;

/// Computes and pushes FIB changes for a batch of RIB updates.
///
/// The call must not block; completion is delivered asynchronously on the
/// RIB's event loop. Implementations are injected so tests can capture
/// batches and settle them deterministically.
pub trait FibUpdater {
    fn compute_and_send_fib_updates(&mut self, batch: &RibUpdateBatch);
}

/// A FIB updater that accepts every batch and reports success with an empty
/// inherited-route delta, by looping the result back through the service
/// command channel.
///
/// Useful for the CLI and for wiring tests; a real deployment injects an
/// updater that talks to the forwarder.
pub struct NullFibUpdater {
    tx: mpsc::UnboundedSender<RibCommand>,
}

impl NullFibUpdater {
    pub fn new(tx: mpsc::UnboundedSender<RibCommand>) -> Self {
        Self { tx }
    }
}

impl FibUpdater for NullFibUpdater {
    fn compute_and_send_fib_updates(&mut self, batch: &RibUpdateBatch) {
        trace!("accepting batch for face {} without FIB changes", batch.face_id());
        let _ = self.tx.send(RibCommand::FibUpdateResult(Ok(Vec::new())));
    }
}
