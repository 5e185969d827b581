//! CLI command implementations.

pub mod exec;
pub mod route;

use rust_nrd_rib::{ConfigSection, KeyChain, NullFibUpdater, RibHandle, RibService};
use std::cell::RefCell;
use std::rc::Rc;

/// Starts an in-process RIB service with an accept-everything FIB updater.
///
/// Returns the command handle, the signing identity registry shared with
/// the readvertise policy, and the service task handle.
pub(crate) fn start_service() -> (
    RibHandle,
    Rc<RefCell<KeyChain>>,
    tokio::task::JoinHandle<()>,
) {
    let key_chain = Rc::new(RefCell::new(KeyChain::new()));
    let (mut service, handle) = RibService::new(key_chain.clone(), &ConfigSection::new());
    service.set_fib_updater(Box::new(NullFibUpdater::new(handle.sender())));
    let join = tokio::task::spawn_local(service.run());
    (handle, key_chain, join)
}
