//! RIB entries: one prefix, its routes, and its position in the prefix tree.

use crate::route::{Route, RouteKey};
use rust_nrd_common::name::Name;
use rust_nrd_common::types::FaceId;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Shared handle to a RIB entry.
///
/// Entries are referenced from the table, from their parent's child list and
/// transiently from update machinery; the parent link is a non-owning weak
/// back-reference, so the tree cannot form reference cycles.
pub type SharedRibEntry = Rc<RefCell<RibEntry>>;

/// One prefix in the RIB together with its own routes, the routes it
/// inherits from ancestors, and its tree links.
#[derive(Debug, Default)]
pub struct RibEntry {
    name: Name,
    routes: Vec<Route>,
    inherited_routes: Vec<Route>,
    parent: Option<Weak<RefCell<RibEntry>>>,
    children: Vec<SharedRibEntry>,
}

impl RibEntry {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn set_name(&mut self, name: Name) {
        self.name = name;
    }

    /// Inserts a route, keeping insertion order.
    ///
    /// If a route with the same `(face id, origin)` key already exists, its
    /// position is returned with `false` and nothing is modified.
    pub fn insert_route(&mut self, route: Route) -> (usize, bool) {
        if let Some(index) = self.find_route_index(route.key()) {
            return (index, false);
        }
        self.routes.push(route);
        (self.routes.len() - 1, true)
    }

    /// Looks up a route position by key.
    pub fn find_route_index(&self, key: RouteKey) -> Option<usize> {
        self.routes.iter().position(|r| r.key() == key)
    }

    /// Looks up a route by key.
    pub fn find_route(&self, key: RouteKey) -> Option<&Route> {
        self.routes.iter().find(|r| r.key() == key)
    }

    pub fn find_route_mut(&mut self, key: RouteKey) -> Option<&mut Route> {
        self.routes.iter_mut().find(|r| r.key() == key)
    }

    /// Removes and returns the route at `index`.
    pub fn erase_route(&mut self, index: usize) -> Route {
        self.routes.remove(index)
    }

    /// The own route list, in insertion order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Linear scan: does any own route point at this face?
    pub fn has_face_id(&self, face_id: FaceId) -> bool {
        self.routes.iter().any(|r| r.face_id == face_id)
    }

    /// True when no own routes remain. Inherited routes are not counted.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Does any own route carry the CAPTURE flag?
    pub fn has_capture(&self) -> bool {
        self.routes.iter().any(|r| r.is_capture())
    }

    /// Upgrades the parent back-reference, if the parent is still alive.
    pub fn parent(&self) -> Option<SharedRibEntry> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn set_parent(&mut self, parent: Option<Weak<RefCell<RibEntry>>>) {
        self.parent = parent;
    }

    pub fn children(&self) -> &[SharedRibEntry] {
        &self.children
    }

    pub(crate) fn add_child(&mut self, child: SharedRibEntry) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: &SharedRibEntry) {
        self.children.retain(|c| !Rc::ptr_eq(c, child));
    }

    pub(crate) fn take_children(&mut self) -> Vec<SharedRibEntry> {
        std::mem::take(&mut self.children)
    }

    /// Adds an inherited route copied down from an ancestor, unless a route
    /// with the same key is already inherited.
    pub fn add_inherited_route(&mut self, route: Route) {
        if !self.has_inherited_route(route.key()) {
            self.inherited_routes.push(route);
        }
    }

    /// Removes an inherited route by key. Returns whether one was removed.
    pub fn remove_inherited_route(&mut self, key: RouteKey) -> bool {
        if let Some(index) = self.inherited_routes.iter().position(|r| r.key() == key) {
            self.inherited_routes.remove(index);
            true
        } else {
            false
        }
    }

    pub fn has_inherited_route(&self, key: RouteKey) -> bool {
        self.inherited_routes.iter().any(|r| r.key() == key)
    }

    pub fn inherited_routes(&self) -> &[Route] {
        &self.inherited_routes
    }
}

impl fmt::Display for RibEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RibEntry {{")?;
        writeln!(f, "  name: {}", self.name)?;
        for route in &self.routes {
            writeln!(f, "  {route}")?;
        }
        for route in &self.inherited_routes {
            writeln!(f, "  inherited {route}")?;
        }
        write!(f, "}}")
    }
}

/// Links `child` under `parent`, fixing both sides.
pub(crate) fn link_child(parent: &SharedRibEntry, child: &SharedRibEntry) {
    child
        .borrow_mut()
        .set_parent(Some(Rc::downgrade(parent)));
    parent.borrow_mut().add_child(child.clone());
}

/// Detaches `child` from `parent`, fixing both sides.
pub(crate) fn unlink_child(parent: &SharedRibEntry, child: &SharedRibEntry) {
    child.borrow_mut().set_parent(None);
    parent.borrow_mut().remove_child(child);
}
