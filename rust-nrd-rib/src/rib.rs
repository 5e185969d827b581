//! The Routing Information Base.
//!
//! The RIB keeps every prefix registration in a name-ordered table whose
//! entries form a prefix tree (parent/children links), and coordinates every
//! mutation with an external FIB updater: updates queue up, at most one
//! batch is in flight, and the table only changes after the FIB accepted the
//! batch. Face-down signals and route expirations funnel through the same
//! queue.

use crate::entry::{link_child, unlink_child, RibEntry, SharedRibEntry};
use crate::fib::FibUpdater;
use crate::route::Route;
use crate::update::{
    RibUpdate, RibUpdateAction, RibUpdateBatch, UpdateFailureCallback, UpdateQueueItem,
    UpdateSuccessCallback,
};
use log::{debug, trace, warn};
use rust_nrd_common::name::Name;
use rust_nrd_common::types::FaceId;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::ops::Bound::{Excluded, Unbounded};
use std::rc::Rc;

#[cfg(test)]
mod tests;

/// Lifecycle notifications emitted while updates commit.
///
/// Events are buffered inside the RIB and drained by the host after each
/// settled update, before the next update begins. They carry owned copies so
/// consumers may re-enter the RIB freely.
#[derive(Debug, Clone)]
pub enum RibEvent {
    /// A new prefix entry was created.
    EntryInserted { name: Name },
    /// A route was added to an entry.
    RouteAdded { name: Name, route: Route },
    /// A route is being removed from an entry.
    RouteRemoved { name: Name, route: Route },
    /// A prefix entry lost its last route and was destroyed.
    EntryErased { name: Name },
}

/// The prefix-keyed registration table plus the update queue coordinating
/// with the FIB updater.
pub struct Rib {
    /// Name-ordered table; a prefix precedes its descendants and the
    /// descendants are contiguous.
    table: BTreeMap<Name, SharedRibEntry>,
    /// For each face, the entries currently holding at least one route with
    /// that face.
    face_entries: BTreeMap<FaceId, Vec<SharedRibEntry>>,
    /// Total number of routes across all entries.
    n_items: usize,
    update_queue: VecDeque<UpdateQueueItem>,
    in_flight: Option<UpdateQueueItem>,
    fib_updater: Option<Box<dyn FibUpdater>>,
    events: VecDeque<RibEvent>,
}

impl Rib {
    pub fn new() -> Self {
        Self {
            table: BTreeMap::new(),
            face_entries: BTreeMap::new(),
            n_items: 0,
            update_queue: VecDeque::new(),
            in_flight: None,
            fib_updater: None,
            events: VecDeque::new(),
        }
    }

    /// Injects the FIB updater. Must be called before any update begins.
    pub fn set_fib_updater(&mut self, updater: Box<dyn FibUpdater>) {
        self.fib_updater = Some(updater);
    }

    /// Total number of routes.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Number of prefix entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of batches waiting behind the in-flight one.
    pub fn queue_len(&self) -> usize {
        self.update_queue.len()
    }

    /// True while a batch awaits its FIB updater result.
    pub fn is_update_in_progress(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Looks up the entry at exactly `prefix`.
    pub fn find(&self, prefix: &Name) -> Option<&SharedRibEntry> {
        self.table.get(prefix)
    }

    /// Iterates entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&Name, &SharedRibEntry)> {
        self.table.iter()
    }

    /// Looks up a route by prefix and `(face id, origin)` key, returning a
    /// copy.
    pub fn find_route(&self, prefix: &Name, route: &Route) -> Option<Route> {
        self.table
            .get(prefix)
            .and_then(|entry| entry.borrow().find_route(route.key()).cloned())
    }

    /// Looks up a route at `prefix`, falling back to the nearest ancestor
    /// entry.
    pub fn find_route_longest_prefix(&self, prefix: &Name, route: &Route) -> Option<Route> {
        self.find_route(prefix, route).or_else(|| {
            self.find_parent(prefix).and_then(|parent| {
                let name = parent.borrow().name().clone();
                self.find_route(&name, route)
            })
        })
    }

    /// Finds the entry with the longest name that is a strict prefix of
    /// `prefix`.
    pub fn find_parent(&self, prefix: &Name) -> Option<SharedRibEntry> {
        for len in (0..prefix.len()).rev() {
            if let Some(entry) = self.table.get(&prefix.prefix(len)) {
                return Some(entry.clone());
            }
        }
        None
    }

    /// All entries whose name has `prefix` as a strict prefix.
    ///
    /// Walks the ordered table contiguously from just after `prefix`.
    pub fn find_descendants(&self, prefix: &Name) -> Vec<SharedRibEntry> {
        self.table
            .range::<Name, _>((Excluded(prefix), Unbounded))
            .take_while(|(name, _)| prefix.is_prefix_of(name))
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    /// Descendant query that does not require `prefix` to be in the table
    /// and does not rely on contiguity; scans the whole table.
    pub fn find_descendants_for_uninserted_name(&self, prefix: &Name) -> Vec<SharedRibEntry> {
        self.table
            .iter()
            .filter(|(name, _)| prefix.is_prefix_of(name))
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    /// Routes inherited by an existing entry, per the walk in
    /// [`Rib::collect_ancestor_routes`].
    pub fn ancestor_routes_of(&self, entry: &RibEntry) -> Vec<Route> {
        Self::collect_ancestor_routes(entry.parent())
    }

    /// Routes a (possibly not yet inserted) name would inherit.
    pub fn ancestor_routes_for_name(&self, name: &Name) -> Vec<Route> {
        Self::collect_ancestor_routes(self.find_parent(name))
    }

    /// Walks from `start` upward collecting CHILD_INHERIT routes, stopping
    /// inclusively at the first ancestor that has a CAPTURE route. The
    /// result is ordered by `(face id, origin)` and de-duplicated by that
    /// key, nearest ancestor winning.
    fn collect_ancestor_routes(start: Option<SharedRibEntry>) -> Vec<Route> {
        let mut selected = BTreeMap::new();
        let mut cursor = start;
        while let Some(ancestor) = cursor {
            let ancestor = ancestor.borrow();
            for route in ancestor.routes() {
                if route.is_child_inherit() {
                    selected.entry(route.key()).or_insert_with(|| route.clone());
                }
            }
            if ancestor.has_capture() {
                break;
            }
            cursor = ancestor.parent();
        }
        selected.into_values().collect()
    }

    /// Queues an update and dispatches it to the FIB updater if nothing is
    /// in flight. `on_success`/`on_failure` fire once the batch settles.
    pub fn begin_apply_update(
        &mut self,
        update: RibUpdate,
        on_success: Option<UpdateSuccessCallback>,
        on_failure: Option<UpdateFailureCallback>,
    ) {
        assert!(
            self.fib_updater.is_some(),
            "fib updater must be set before applying updates"
        );
        self.add_update_to_queue(update, on_success, on_failure);
        self.send_batch_from_queue();
    }

    /// Queues a REMOVE_FACE update for every route of `face_id`, then
    /// dispatches.
    pub fn begin_remove_face(&mut self, face_id: FaceId) {
        let entries = self.face_entries.get(&face_id).cloned().unwrap_or_default();
        for entry in &entries {
            self.enqueue_remove_face(entry, face_id);
        }
        self.send_batch_from_queue();
    }

    /// Queues REMOVE_FACE updates for every face not present in
    /// `active_face_ids`, then dispatches.
    pub fn begin_remove_failed_faces(&mut self, active_face_ids: &BTreeSet<FaceId>) {
        let failed: Vec<(FaceId, Vec<SharedRibEntry>)> = self
            .face_entries
            .iter()
            .filter(|(face_id, _)| !active_face_ids.contains(face_id))
            .map(|(face_id, entries)| (*face_id, entries.clone()))
            .collect();
        for (face_id, entries) in failed {
            for entry in &entries {
                self.enqueue_remove_face(entry, face_id);
            }
        }
        self.send_batch_from_queue();
    }

    /// Begins the UNREGISTER of a route whose expiration timer fired.
    pub fn on_route_expiration(&mut self, prefix: &Name, route: Route) {
        debug!("{route} for {prefix} has expired");
        self.begin_apply_update(
            RibUpdate {
                action: RibUpdateAction::Unregister,
                name: prefix.clone(),
                route,
            },
            None,
            None,
        );
    }

    /// Drains buffered lifecycle events.
    pub fn take_events(&mut self) -> Vec<RibEvent> {
        self.events.drain(..).collect()
    }

    // ===== update queue machinery =====

    fn enqueue_remove_face(&mut self, entry: &SharedRibEntry, face_id: FaceId) {
        let (name, routes): (Name, Vec<Route>) = {
            let entry = entry.borrow();
            (
                entry.name().clone(),
                entry
                    .routes()
                    .iter()
                    .filter(|r| r.face_id == face_id)
                    .cloned()
                    .collect(),
            )
        };
        for route in routes {
            self.add_update_to_queue(
                RibUpdate {
                    action: RibUpdateAction::RemoveFace,
                    name: name.clone(),
                    route,
                },
                None,
                None,
            );
        }
    }

    fn add_update_to_queue(
        &mut self,
        update: RibUpdate,
        on_success: Option<UpdateSuccessCallback>,
        on_failure: Option<UpdateFailureCallback>,
    ) {
        let mut batch = RibUpdateBatch::new(update.route.face_id);
        batch.add(update);
        self.update_queue.push_back(UpdateQueueItem {
            batch,
            on_success,
            on_failure,
        });
    }

    fn send_batch_from_queue(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let Some(item) = self.update_queue.pop_front() else {
            return;
        };
        // Each batch currently contains exactly one update.
        debug_assert_eq!(item.batch.len(), 1);

        let updater = self
            .fib_updater
            .as_mut()
            .expect("fib updater must be set before applying updates");
        updater.compute_and_send_fib_updates(&item.batch);
        self.in_flight = Some(item);
    }

    /// Commits the in-flight batch: applies its updates to the table,
    /// applies the inherited-route deltas the updater computed, fires the
    /// command's success callback and dispatches the next batch.
    pub fn on_fib_update_success(&mut self, inherited_routes: Vec<RibUpdate>) {
        let item = self
            .in_flight
            .take()
            .expect("FIB update success without an in-flight batch");

        for update in &item.batch {
            match update.action {
                RibUpdateAction::Register => {
                    self.insert(&update.name, update.route.clone());
                }
                RibUpdateAction::Unregister | RibUpdateAction::RemoveFace => {
                    self.erase(&update.name, &update.route);
                }
            }
        }

        self.modify_inherited_routes(inherited_routes);

        if let Some(on_success) = item.on_success {
            on_success();
        }

        self.send_batch_from_queue();
    }

    /// Drops the in-flight batch without touching the table, fires the
    /// command's failure callback and dispatches the next batch.
    pub fn on_fib_update_failure(&mut self, code: u32, message: &str) {
        let item = self
            .in_flight
            .take()
            .expect("FIB update failure without an in-flight batch");

        debug!(
            "FIB rejected batch for face {}: {code} {message}",
            item.batch.face_id()
        );

        if let Some(on_failure) = item.on_failure {
            on_failure(code, message.to_string());
        }

        self.send_batch_from_queue();
    }

    fn modify_inherited_routes(&mut self, inherited_routes: Vec<RibUpdate>) {
        for update in inherited_routes {
            let Some(entry) = self.table.get(&update.name) else {
                warn!("inherited-route delta names unknown entry {}", update.name);
                continue;
            };
            let mut entry = entry.borrow_mut();
            match update.action {
                RibUpdateAction::Register => entry.add_inherited_route(update.route),
                RibUpdateAction::Unregister => {
                    entry.remove_inherited_route(update.route.key());
                }
                RibUpdateAction::RemoveFace => {}
            }
        }
    }

    // ===== table mutation (only reachable from the success path) =====

    fn insert(&mut self, prefix: &Name, route: Route) {
        if let Some(entry) = self.table.get(prefix).cloned() {
            let mut borrowed = entry.borrow_mut();
            if let Some(existing) = borrowed.find_route_mut(route.key()) {
                // Route exists: cancel the old scheduled expiration, then
                // refresh the payload in place.
                if existing.expiration_event.is_some() {
                    trace!("cancelling expiration event for {prefix} {existing}");
                    existing.cancel_expiration_event();
                }
                *existing = route;
            } else {
                let face_id = route.face_id;
                let had_face = borrowed.has_face_id(face_id);
                borrowed.insert_route(route.clone());
                self.n_items += 1;
                drop(borrowed);

                if !had_face {
                    self.register_face_entry(face_id, &entry);
                }
                self.push_event(RibEvent::RouteAdded {
                    name: prefix.clone(),
                    route,
                });
            }
        } else {
            let entry = Rc::new(RefCell::new(RibEntry::new(prefix.clone())));
            entry.borrow_mut().insert_route(route.clone());
            self.n_items += 1;

            let parent = self.find_parent(prefix);
            self.table.insert(prefix.clone(), entry.clone());

            if let Some(parent) = &parent {
                link_child(parent, &entry);
            }

            // Entries below the new prefix that hung off its parent are now
            // this entry's children.
            for child in self.find_descendants(prefix) {
                let child_parent = child.borrow().parent();
                let same_parent = match (&child_parent, &parent) {
                    (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                    (None, None) => true,
                    _ => false,
                };
                if same_parent {
                    if let Some(parent) = &parent {
                        unlink_child(parent, &child);
                    }
                    link_child(&entry, &child);
                }
            }

            self.register_face_entry(route.face_id, &entry);
            self.push_event(RibEvent::EntryInserted {
                name: prefix.clone(),
            });
            self.push_event(RibEvent::RouteAdded {
                name: prefix.clone(),
                route,
            });
        }
    }

    fn erase(&mut self, prefix: &Name, route: &Route) {
        let Some(entry) = self.table.get(prefix).cloned() else {
            return;
        };

        let mut borrowed = entry.borrow_mut();
        let Some(index) = borrowed.find_route_index(route.key()) else {
            return;
        };

        // Emit the removal before mutating so observers see the route as it
        // was stored, not as the update described it.
        let stored = borrowed.routes()[index].clone();
        self.push_event(RibEvent::RouteRemoved {
            name: prefix.clone(),
            route: stored,
        });

        let face_id = route.face_id;
        borrowed.erase_route(index);
        self.n_items -= 1;

        let face_gone = !borrowed.has_face_id(face_id);
        let now_empty = borrowed.is_empty();
        drop(borrowed);

        if face_gone {
            self.unregister_face_entry(face_id, &entry);
        }
        if now_empty {
            self.erase_entry(&entry);
        }
    }

    fn erase_entry(&mut self, entry: &SharedRibEntry) {
        let name = entry.borrow().name().clone();
        let parent = entry.borrow().parent();

        if let Some(parent) = &parent {
            unlink_child(parent, entry);
        }

        // Hand the children to the grandparent, or orphan them.
        for child in entry.borrow_mut().take_children() {
            child.borrow_mut().set_parent(None);
            if let Some(parent) = &parent {
                link_child(parent, &child);
            }
        }

        self.table.remove(&name);
        self.push_event(RibEvent::EntryErased { name });
    }

    // ===== face index =====

    fn register_face_entry(&mut self, face_id: FaceId, entry: &SharedRibEntry) {
        self.face_entries
            .entry(face_id)
            .or_default()
            .push(entry.clone());
    }

    fn unregister_face_entry(&mut self, face_id: FaceId, entry: &SharedRibEntry) {
        if let Some(list) = self.face_entries.get_mut(&face_id) {
            if let Some(position) = list.iter().position(|e| Rc::ptr_eq(e, entry)) {
                list.remove(position);
            }
            if list.is_empty() {
                self.face_entries.remove(&face_id);
            }
        }
    }

    /// The faces currently known to the index, with the entries holding
    /// routes for each.
    pub fn face_entries(&self) -> impl Iterator<Item = (FaceId, &[SharedRibEntry])> {
        self.face_entries
            .iter()
            .map(|(face_id, entries)| (*face_id, entries.as_slice()))
    }

    fn push_event(&mut self, event: RibEvent) {
        self.events.push_back(event);
    }
}

impl Default for Rib {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Rib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rib: {} routes in {} entries", self.n_items, self.table.len())?;
        for entry in self.table.values() {
            writeln!(f, "{}", entry.borrow())?;
        }
        Ok(())
    }
}
