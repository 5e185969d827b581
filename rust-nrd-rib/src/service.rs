//! The single-threaded RIB service loop.
//!
//! The RIB is cooperative and single-threaded: every entry point and every
//! FIB updater completion must run on one scheduler. [`RibService`] enforces
//! this by owning the [`Rib`] behind a single-consumer command channel;
//! management handlers, expiration timers and the FIB updater all inject
//! [`RibCommand`]s and never touch the table directly.

use crate::fib::{FibUpdater, FibUpdateResult};
use crate::mgmt::{self, ControlParameters, ControlResponse};
use crate::readvertise::{
    ConfigSection, HostToGatewayReadvertisePolicy, KeyChain, Readvertise, ReadvertisePolicy,
};
use crate::rib::{Rib, RibEvent};
use crate::route::{ExpirationEvent, Route};
use crate::update::{RibUpdate, RibUpdateAction};
use anyhow::{anyhow, Result};
use log::{debug, info, trace};
use rust_nrd_common::metrics::RibMetrics;
use rust_nrd_common::name::Name;
use rust_nrd_common::types::{FaceId, RouteOrigin};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

/// Commands accepted by the service loop.
pub enum RibCommand {
    /// REGISTER control command.
    Register {
        params: ControlParameters,
        done: Option<oneshot::Sender<ControlResponse>>,
    },
    /// UNREGISTER control command.
    Unregister {
        params: ControlParameters,
        done: Option<oneshot::Sender<ControlResponse>>,
    },
    /// A face went down; remove all of its routes.
    FaceDown { face_id: FaceId },
    /// Remove the routes of every face not in the active set.
    RemoveFailedFaces { active: BTreeSet<FaceId> },
    /// Completion of the in-flight FIB update.
    FibUpdateResult(FibUpdateResult),
    /// A route's expiration timer fired.
    RouteExpired {
        name: Name,
        face_id: FaceId,
        origin: RouteOrigin,
    },
    /// Snapshot of the table, rendered for status display.
    Dump { done: oneshot::Sender<String> },
    /// Stop the service loop.
    Shutdown,
}

/// Cheap cloneable handle for injecting commands into the service.
#[derive(Clone)]
pub struct RibHandle {
    tx: mpsc::UnboundedSender<RibCommand>,
}

impl RibHandle {
    pub fn send(&self, command: RibCommand) {
        let _ = self.tx.send(command);
    }

    /// The raw command sender, e.g. for wiring a FIB updater's completion
    /// path back into the loop.
    pub fn sender(&self) -> mpsc::UnboundedSender<RibCommand> {
        self.tx.clone()
    }

    /// Issues a REGISTER and waits for the control response.
    pub async fn register(&self, params: ControlParameters) -> Result<ControlResponse> {
        let (done, response) = oneshot::channel();
        self.send(RibCommand::Register {
            params,
            done: Some(done),
        });
        response.await.map_err(|_| anyhow!("RIB service stopped"))
    }

    /// Issues an UNREGISTER and waits for the control response.
    pub async fn unregister(&self, params: ControlParameters) -> Result<ControlResponse> {
        let (done, response) = oneshot::channel();
        self.send(RibCommand::Unregister {
            params,
            done: Some(done),
        });
        response.await.map_err(|_| anyhow!("RIB service stopped"))
    }

    pub fn face_down(&self, face_id: FaceId) {
        self.send(RibCommand::FaceDown { face_id });
    }

    pub fn remove_failed_faces(&self, active: BTreeSet<FaceId>) {
        self.send(RibCommand::RemoveFailedFaces { active });
    }

    /// Fetches a rendered snapshot of the table.
    pub async fn dump(&self) -> Result<String> {
        let (done, response) = oneshot::channel();
        self.send(RibCommand::Dump { done });
        response.await.map_err(|_| anyhow!("RIB service stopped"))
    }

    pub fn shutdown(&self) {
        self.send(RibCommand::Shutdown);
    }
}

/// Owns the RIB, the readvertise bookkeeping and the command channel.
pub struct RibService {
    rib: Rib,
    readvertise: Readvertise,
    metrics: Arc<RibMetrics>,
    rx: mpsc::UnboundedReceiver<RibCommand>,
    tx: mpsc::UnboundedSender<RibCommand>,
}

impl RibService {
    /// Creates a service with a host-to-gateway readvertise policy built
    /// from `section`. The FIB updater must be injected with
    /// [`RibService::set_fib_updater`] before the first command arrives.
    pub fn new(
        key_chain: Rc<RefCell<KeyChain>>,
        section: &ConfigSection,
    ) -> (Self, RibHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let policy = ReadvertisePolicy::HostToGateway(HostToGatewayReadvertisePolicy::new(
            key_chain, section,
        ));

        let service = Self {
            rib: Rib::new(),
            readvertise: Readvertise::new(policy),
            metrics: Arc::new(RibMetrics::new()),
            rx,
            tx: tx.clone(),
        };
        let handle = RibHandle { tx };
        (service, handle)
    }

    pub fn set_fib_updater(&mut self, updater: Box<dyn FibUpdater>) {
        self.rib.set_fib_updater(updater);
    }

    pub fn metrics(&self) -> Arc<RibMetrics> {
        self.metrics.clone()
    }

    pub fn handle(&self) -> RibHandle {
        RibHandle {
            tx: self.tx.clone(),
        }
    }

    /// Runs the service until shutdown.
    ///
    /// Must run inside a `tokio::task::LocalSet`: expiration timers are
    /// spawned with `spawn_local` so the whole RIB stays on one thread.
    pub async fn run(mut self) {
        info!(
            "RIB service started (readvertise refresh interval: {:?})",
            self.readvertise.refresh_interval()
        );

        while let Some(command) = self.rx.recv().await {
            if matches!(command, RibCommand::Shutdown) {
                break;
            }
            self.handle_command(command);
            self.dispatch_events();
            self.update_gauges();
        }

        info!("RIB service stopped");
    }

    fn handle_command(&mut self, command: RibCommand) {
        match command {
            RibCommand::Register { params, done } => self.handle_register(params, done),
            RibCommand::Unregister { params, done } => self.handle_unregister(params, done),
            RibCommand::FaceDown { face_id } => {
                debug!("face {face_id} went down");
                self.metrics.faces_removed.increment();
                self.rib.begin_remove_face(face_id);
            }
            RibCommand::RemoveFailedFaces { active } => {
                debug!("removing routes of faces outside the active set");
                self.rib.begin_remove_failed_faces(&active);
            }
            RibCommand::FibUpdateResult(result) => self.handle_fib_update_result(result),
            RibCommand::RouteExpired {
                name,
                face_id,
                origin,
            } => {
                self.metrics.routes_expired.increment();
                self.rib
                    .on_route_expiration(&name, Route::new(face_id, origin));
            }
            RibCommand::Dump { done } => {
                let _ = done.send(self.rib.to_string());
            }
            RibCommand::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    fn handle_register(
        &mut self,
        params: ControlParameters,
        done: Option<oneshot::Sender<ControlResponse>>,
    ) {
        self.metrics.registers_received.increment();
        debug!("register {params}");

        let (name, mut route, expiration) = match mgmt::validate_register(&params) {
            Ok(parts) => parts,
            Err(response) => {
                if let Some(done) = done {
                    let _ = done.send(response);
                }
                return;
            }
        };

        if let Some(period) = expiration {
            route.expires = Some(Instant::now() + period);
            let (event, cancel) = ExpirationEvent::new();
            route.expiration_event = Some(event);
            self.spawn_expiration_timer(name.clone(), route.face_id, route.origin, period, cancel);
        }

        let (on_success, on_failure) = respond_once(done);
        self.rib.begin_apply_update(
            RibUpdate {
                action: RibUpdateAction::Register,
                name,
                route,
            },
            on_success,
            on_failure,
        );
        self.metrics.fib_updates_sent.increment();
    }

    fn handle_unregister(
        &mut self,
        params: ControlParameters,
        done: Option<oneshot::Sender<ControlResponse>>,
    ) {
        self.metrics.unregisters_received.increment();
        debug!("unregister {params}");

        let (name, route) = match mgmt::validate_unregister(&params) {
            Ok(parts) => parts,
            Err(response) => {
                if let Some(done) = done {
                    let _ = done.send(response);
                }
                return;
            }
        };

        let (on_success, on_failure) = respond_once(done);
        self.rib.begin_apply_update(
            RibUpdate {
                action: RibUpdateAction::Unregister,
                name,
                route,
            },
            on_success,
            on_failure,
        );
        self.metrics.fib_updates_sent.increment();
    }

    fn handle_fib_update_result(&mut self, result: FibUpdateResult) {
        let started = Instant::now();
        match result {
            Ok(inherited_routes) => {
                self.metrics.fib_update_successes.increment();
                self.rib.on_fib_update_success(inherited_routes);
            }
            Err(error) => {
                self.metrics.fib_update_failures.increment();
                self.rib.on_fib_update_failure(error.code, &error.message);
            }
        }
        self.metrics
            .fib_update_time_us
            .observe(started.elapsed().as_micros() as u64);
    }

    fn spawn_expiration_timer(
        &self,
        name: Name,
        face_id: FaceId,
        origin: RouteOrigin,
        period: Duration,
        mut cancel: oneshot::Receiver<()>,
    ) {
        let tx = self.tx.clone();
        tokio::task::spawn_local(async move {
            tokio::select! {
                _ = tokio::time::sleep(period) => {
                    let _ = tx.send(RibCommand::RouteExpired { name, face_id, origin });
                }
                _ = &mut cancel => {
                    trace!("expiration timer for {name} cancelled");
                }
            }
        });
    }

    /// Feeds buffered RIB events to the readvertise bookkeeping and the
    /// metrics, in emission order.
    fn dispatch_events(&mut self) {
        for event in self.rib.take_events() {
            match event {
                RibEvent::EntryInserted { name } => {
                    trace!("entry inserted: {name}");
                    self.metrics.entries_inserted.increment();
                }
                RibEvent::RouteAdded { name, route } => {
                    debug!("route added to {name}: {route}");
                    self.metrics.routes_added.increment();
                    self.readvertise.on_route_added(&name, &route);
                }
                RibEvent::RouteRemoved { name, route } => {
                    debug!("route removed from {name}: {route}");
                    self.metrics.routes_removed.increment();
                    self.readvertise.on_route_removed(&name, &route);
                }
                RibEvent::EntryErased { name } => {
                    trace!("entry erased: {name}");
                    self.metrics.entries_erased.increment();
                }
            }
        }
    }

    fn update_gauges(&self) {
        self.metrics.n_routes.set(self.rib.n_items() as u64);
        self.metrics.n_entries.set(self.rib.len() as u64);
        self.metrics
            .update_queue_depth
            .set(self.rib.queue_len() as u64);
    }
}

/// Splits an optional response channel into the success/failure callbacks of
/// one update; whichever settles first consumes the channel.
fn respond_once(
    done: Option<oneshot::Sender<ControlResponse>>,
) -> (
    Option<crate::update::UpdateSuccessCallback>,
    Option<crate::update::UpdateFailureCallback>,
) {
    let Some(done) = done else {
        return (None, None);
    };
    let slot = Rc::new(RefCell::new(Some(done)));
    let success_slot = slot.clone();
    let on_success: crate::update::UpdateSuccessCallback = Box::new(move || {
        if let Some(done) = success_slot.borrow_mut().take() {
            let _ = done.send(ControlResponse::ok());
        }
    });
    let on_failure: crate::update::UpdateFailureCallback = Box::new(move |code, message| {
        if let Some(done) = slot.borrow_mut().take() {
            let _ = done.send(ControlResponse::new(code, message));
        }
    });
    (Some(on_success), Some(on_failure))
}
