//! Routing Information Base engine for the rust-nrd NDN RIB daemon.
//!
//! This crate holds the authoritative in-memory store of prefix→route
//! registrations that feeds a downstream FIB. Registrations form a prefix
//! tree with parent/child links; every mutation is serialized through a
//! single-in-flight request/response protocol with an injected FIB updater,
//! and face lifecycle events mass-remove affected routes. A readvertise
//! policy consumes the RIB's lifecycle events to keep upstream
//! advertisements in sync.

pub mod entry;
pub mod fib;
pub mod mgmt;
pub mod readvertise;
pub mod rib;
pub mod route;
pub mod service;
pub mod update;

pub use entry::{RibEntry, SharedRibEntry};
pub use fib::{FibError, FibUpdateResult, FibUpdater, NullFibUpdater};
pub use mgmt::{ControlParameters, ControlResponse};
pub use readvertise::{
    ConfigSection, HostToGatewayReadvertisePolicy, KeyChain, Readvertise, ReadvertiseAction,
    ReadvertisePolicy,
};
pub use rib::{Rib, RibEvent};
pub use route::{ExpirationEvent, Route, RouteKey};
pub use service::{RibCommand, RibHandle, RibService};
pub use update::{RibUpdate, RibUpdateAction, RibUpdateBatch};
