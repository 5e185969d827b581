//! RIB update descriptions and the queue items that carry them.

use crate::route::Route;
use rust_nrd_common::name::Name;
use rust_nrd_common::types::FaceId;
use std::fmt;

/// What an update does to the RIB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RibUpdateAction {
    /// Add or refresh a route at a prefix.
    Register,
    /// Remove a route from a prefix.
    Unregister,
    /// Remove a route because its face went away. Applied like
    /// [`RibUpdateAction::Unregister`] but excluded from inheritance deltas.
    RemoveFace,
}

impl fmt::Display for RibUpdateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Register => "register",
            Self::Unregister => "unregister",
            Self::RemoveFace => "remove-face",
        };
        write!(f, "{s}")
    }
}

/// A single pending change: action, prefix and the route it concerns.
#[derive(Debug, Clone)]
pub struct RibUpdate {
    pub action: RibUpdateAction,
    pub name: Name,
    pub route: Route,
}

impl fmt::Display for RibUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RibUpdate {{ {} {} {} }}", self.action, self.name, self.route)
    }
}

/// An ordered list of updates sharing one face id, sent to the FIB updater
/// as a unit.
///
/// Currently every batch holds exactly one update; the type is the
/// extension point for batching several same-face updates into one FIB
/// round-trip.
#[derive(Debug, Clone)]
pub struct RibUpdateBatch {
    face_id: FaceId,
    updates: Vec<RibUpdate>,
}

impl RibUpdateBatch {
    pub fn new(face_id: FaceId) -> Self {
        Self {
            face_id,
            updates: Vec::new(),
        }
    }

    pub fn face_id(&self) -> FaceId {
        self.face_id
    }

    /// Appends an update. All updates in a batch must share its face id.
    pub fn add(&mut self, update: RibUpdate) {
        assert_eq!(
            update.route.face_id, self.face_id,
            "update face does not match batch face"
        );
        self.updates.push(update);
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RibUpdate> {
        self.updates.iter()
    }
}

impl<'a> IntoIterator for &'a RibUpdateBatch {
    type Item = &'a RibUpdate;
    type IntoIter = std::slice::Iter<'a, RibUpdate>;

    fn into_iter(self) -> Self::IntoIter {
        self.updates.iter()
    }
}

/// Callback invoked when the FIB accepted the batch and the RIB committed it.
pub type UpdateSuccessCallback = Box<dyn FnOnce()>;
/// Callback invoked with the FIB updater's code and message on failure.
pub type UpdateFailureCallback = Box<dyn FnOnce(u32, String)>;

/// A queued batch plus the callbacks of the command that produced it.
pub(crate) struct UpdateQueueItem {
    pub batch: RibUpdateBatch,
    pub on_success: Option<UpdateSuccessCallback>,
    pub on_failure: Option<UpdateFailureCallback>,
}

impl fmt::Debug for UpdateQueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateQueueItem")
            .field("batch", &self.batch)
            .field("has_on_success", &self.on_success.is_some())
            .field("has_on_failure", &self.on_failure.is_some())
            .finish()
    }
}
