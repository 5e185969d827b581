//! Route registrations.
//!
//! A [`Route`] records that a face can reach a prefix. Its identity is the
//! `(face id, origin)` pair; cost, flags and expiration are mutable payload
//! that an in-place refresh may overwrite.

use rust_nrd_common::types::{FaceId, RouteFlags, RouteOrigin};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;
use tokio::sync::oneshot;

/// The stable identity of a route within an entry.
pub type RouteKey = (FaceId, RouteOrigin);

/// Cancellation handle for a scheduled route expiration.
///
/// Cloning shares the underlying cancellation slot, so the copy stored on a
/// route and the copy captured by the timer task cancel the same event.
#[derive(Clone, Debug)]
pub struct ExpirationEvent {
    cancel: Rc<RefCell<Option<oneshot::Sender<()>>>>,
}

impl ExpirationEvent {
    /// Creates a handle plus the receiver the timer task should watch.
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                cancel: Rc::new(RefCell::new(Some(tx))),
            },
            rx,
        )
    }

    /// Cancels the scheduled expiration. Idempotent.
    pub fn cancel(&self) {
        if let Some(tx) = self.cancel.borrow_mut().take() {
            let _ = tx.send(());
        }
    }

    /// Returns true once `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.borrow().is_none()
    }
}

/// A single prefix registration: target face, origin, cost, flags and an
/// optional expiration.
#[derive(Clone, Debug)]
pub struct Route {
    pub face_id: FaceId,
    pub origin: RouteOrigin,
    pub cost: u64,
    pub flags: RouteFlags,
    pub expires: Option<Instant>,
    pub expiration_event: Option<ExpirationEvent>,
}

impl Route {
    /// Creates a route with zero cost and no flags.
    pub fn new(face_id: FaceId, origin: RouteOrigin) -> Self {
        Self {
            face_id,
            origin,
            cost: 0,
            flags: RouteFlags::empty(),
            expires: None,
            expiration_event: None,
        }
    }

    /// Sets the cost.
    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }

    /// Sets the flags.
    pub fn with_flags(mut self, flags: RouteFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the expiration timestamp.
    pub fn with_expires(mut self, expires: Instant) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Returns the `(face id, origin)` lookup key.
    pub fn key(&self) -> RouteKey {
        (self.face_id, self.origin)
    }

    /// Two routes are the same route iff their keys match.
    pub fn is_same_route(&self, other: &Route) -> bool {
        self.key() == other.key()
    }

    pub fn is_child_inherit(&self) -> bool {
        self.flags.contains(RouteFlags::CHILD_INHERIT)
    }

    pub fn is_capture(&self) -> bool {
        self.flags.contains(RouteFlags::CAPTURE)
    }

    /// Cancels and drops the scheduled expiration event, if any.
    pub fn cancel_expiration_event(&mut self) {
        if let Some(event) = self.expiration_event.take() {
            event.cancel();
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Route(face: {}, origin: {}, cost: {}, flags: {}",
            self.face_id, self.origin, self.cost, self.flags
        )?;
        match self.expires {
            Some(expires) => {
                let remaining = expires.saturating_duration_since(Instant::now());
                write!(f, ", expires in: {}ms)", remaining.as_millis())
            }
            None => write!(f, ", never expires)"),
        }
    }
}
