//! Unit tests for the RIB update protocol, prefix tree and face index.

use super::*;
use crate::fib::FibUpdater;
use crate::route::ExpirationEvent;
use rust_nrd_common::types::{RouteFlags, RouteOrigin};
use std::time::{Duration, Instant};

/// Records every dispatched batch; tests settle them by calling
/// `on_fib_update_success` / `on_fib_update_failure` directly.
struct MockFibUpdater {
    batches: Rc<RefCell<Vec<RibUpdateBatch>>>,
}

impl FibUpdater for MockFibUpdater {
    fn compute_and_send_fib_updates(&mut self, batch: &RibUpdateBatch) {
        self.batches.borrow_mut().push(batch.clone());
    }
}

fn make_rib() -> (Rib, Rc<RefCell<Vec<RibUpdateBatch>>>) {
    let batches = Rc::new(RefCell::new(Vec::new()));
    let mut rib = Rib::new();
    rib.set_fib_updater(Box::new(MockFibUpdater {
        batches: batches.clone(),
    }));
    (rib, batches)
}

fn name(uri: &str) -> Name {
    Name::from_string(uri)
}

fn route(face: u64, origin: RouteOrigin) -> Route {
    Route::new(FaceId(face), origin)
}

fn begin_register(rib: &mut Rib, uri: &str, r: Route) {
    rib.begin_apply_update(
        RibUpdate {
            action: RibUpdateAction::Register,
            name: name(uri),
            route: r,
        },
        None,
        None,
    );
}

fn begin_unregister(rib: &mut Rib, uri: &str, r: Route) {
    rib.begin_apply_update(
        RibUpdate {
            action: RibUpdateAction::Unregister,
            name: name(uri),
            route: r,
        },
        None,
        None,
    );
}

/// Queues a REGISTER and settles it with an empty inheritance delta.
fn register(rib: &mut Rib, uri: &str, r: Route) {
    begin_register(rib, uri, r);
    rib.on_fib_update_success(Vec::new());
}

/// Queues an UNREGISTER and settles it with an empty inheritance delta.
fn unregister(rib: &mut Rib, uri: &str, r: Route) {
    begin_unregister(rib, uri, r);
    rib.on_fib_update_success(Vec::new());
}

/// Checks the structural invariants that must hold between settled updates:
/// tree consistency, children back-links, no empty entries, face index
/// completeness and the route count.
fn check_invariants(rib: &Rib) {
    let mut route_total = 0;

    for (entry_name, entry) in rib.entries() {
        let entry = entry.borrow();
        assert_eq!(entry.name(), entry_name);
        assert!(!entry.is_empty(), "empty entry {entry_name} left in table");
        route_total += entry.route_count();

        // The stored parent must be the longest strict prefix present.
        let expected_parent = rib.find_parent(entry_name);
        match (entry.parent(), expected_parent) {
            (Some(actual), Some(expected)) => {
                assert!(
                    Rc::ptr_eq(&actual, &expected),
                    "wrong parent for {entry_name}"
                );
                assert!(actual
                    .borrow()
                    .children()
                    .iter()
                    .any(|c| c.borrow().name() == entry_name));
            }
            (None, None) => {}
            (actual, expected) => panic!(
                "parent mismatch for {entry_name}: stored={:?} expected={:?}",
                actual.map(|e| e.borrow().name().clone()),
                expected.map(|e| e.borrow().name().clone()),
            ),
        }

        for child in entry.children() {
            let child = child.borrow();
            assert!(entry_name.is_strict_prefix_of(child.name()));
            let back = child.parent().expect("child without parent back-link");
            assert_eq!(back.borrow().name(), entry_name);
        }

        // Every own route must be represented in the face index.
        for r in entry.routes() {
            let represented = rib
                .face_entries()
                .any(|(face_id, entries)| {
                    face_id == r.face_id
                        && entries.iter().any(|e| e.borrow().name() == entry_name)
                });
            assert!(represented, "route {r} of {entry_name} missing from face index");
        }
    }

    for (face_id, entries) in rib.face_entries() {
        for entry in entries {
            assert!(
                entry.borrow().has_face_id(face_id),
                "face index maps face {face_id} to an entry without such a route"
            );
        }
        // Set semantics: one membership per (face, entry).
        for entry in entries {
            let occurrences = entries
                .iter()
                .filter(|other| Rc::ptr_eq(other, entry))
                .count();
            assert_eq!(occurrences, 1, "duplicate face index membership");
        }
    }

    assert_eq!(rib.n_items(), route_total);
}

#[test]
fn insert_then_erase() {
    let (mut rib, _) = make_rib();

    register(&mut rib, "/a", route(1, RouteOrigin::App).with_cost(10));
    assert_eq!(rib.n_items(), 1);
    assert_eq!(rib.len(), 1);
    let entry = rib.find(&name("/a")).unwrap();
    assert!(entry.borrow().parent().is_none());
    assert_eq!(entry.borrow().route_count(), 1);
    check_invariants(&rib);

    unregister(&mut rib, "/a", route(1, RouteOrigin::App));
    assert_eq!(rib.n_items(), 0);
    assert!(rib.is_empty());
    check_invariants(&rib);
}

#[test]
fn parent_steals_child() {
    let (mut rib, _) = make_rib();

    register(&mut rib, "/a/b", route(1, RouteOrigin::App));
    register(&mut rib, "/a/c", route(1, RouteOrigin::App));
    assert!(rib.find(&name("/a/b")).unwrap().borrow().parent().is_none());

    register(&mut rib, "/a", route(2, RouteOrigin::App));

    let a = rib.find(&name("/a")).unwrap().clone();
    let ab = rib.find(&name("/a/b")).unwrap().clone();
    let ac = rib.find(&name("/a/c")).unwrap().clone();

    assert!(Rc::ptr_eq(&ab.borrow().parent().unwrap(), &a));
    assert!(Rc::ptr_eq(&ac.borrow().parent().unwrap(), &a));
    assert_eq!(a.borrow().children().len(), 2);
    check_invariants(&rib);
}

#[test]
fn new_entry_does_not_steal_grandchildren() {
    let (mut rib, _) = make_rib();

    register(&mut rib, "/a", route(1, RouteOrigin::App));
    register(&mut rib, "/a/b/c", route(1, RouteOrigin::App));

    // /a/b arrives between /a and /a/b/c and must take over only the
    // entries that currently hang off /a.
    register(&mut rib, "/a/b", route(2, RouteOrigin::App));

    let a = rib.find(&name("/a")).unwrap().clone();
    let ab = rib.find(&name("/a/b")).unwrap().clone();
    let abc = rib.find(&name("/a/b/c")).unwrap().clone();

    assert!(Rc::ptr_eq(&ab.borrow().parent().unwrap(), &a));
    assert!(Rc::ptr_eq(&abc.borrow().parent().unwrap(), &ab));
    assert_eq!(a.borrow().children().len(), 1);
    check_invariants(&rib);
}

#[test]
fn erase_entry_reparents_children() {
    let (mut rib, _) = make_rib();

    register(&mut rib, "/a", route(1, RouteOrigin::App));
    register(&mut rib, "/a/b", route(1, RouteOrigin::App));
    register(&mut rib, "/a/b/c", route(1, RouteOrigin::App));

    unregister(&mut rib, "/a/b", route(1, RouteOrigin::App));

    assert!(rib.find(&name("/a/b")).is_none());
    let a = rib.find(&name("/a")).unwrap().clone();
    let abc = rib.find(&name("/a/b/c")).unwrap().clone();
    assert!(Rc::ptr_eq(&abc.borrow().parent().unwrap(), &a));
    check_invariants(&rib);
}

#[test]
fn erase_root_orphans_children() {
    let (mut rib, _) = make_rib();

    register(&mut rib, "/a", route(1, RouteOrigin::App));
    register(&mut rib, "/a/b", route(1, RouteOrigin::App));

    unregister(&mut rib, "/a", route(1, RouteOrigin::App));

    assert!(rib.find(&name("/a")).is_none());
    assert!(rib.find(&name("/a/b")).unwrap().borrow().parent().is_none());
    check_invariants(&rib);
}

#[test]
fn refresh_keeps_count_and_cancels_expiration() {
    let (mut rib, _) = make_rib();

    let (event, mut cancel_rx) = ExpirationEvent::new();
    let mut first = route(1, RouteOrigin::App).with_cost(10);
    first.expires = Some(Instant::now() + Duration::from_secs(10));
    first.expiration_event = Some(event);
    register(&mut rib, "/a", first);
    assert_eq!(rib.n_items(), 1);

    let second = route(1, RouteOrigin::App)
        .with_cost(20)
        .with_expires(Instant::now() + Duration::from_secs(20));
    register(&mut rib, "/a", second);

    assert_eq!(rib.n_items(), 1);
    assert!(cancel_rx.try_recv().is_ok(), "old expiration not cancelled");
    let refreshed = rib
        .find_route(&name("/a"), &route(1, RouteOrigin::App))
        .unwrap();
    assert_eq!(refreshed.cost, 20);
    check_invariants(&rib);
}

#[test]
fn updates_commit_in_fifo_order() {
    let (mut rib, batches) = make_rib();

    begin_register(&mut rib, "/a", route(1, RouteOrigin::App));
    begin_register(&mut rib, "/b", route(2, RouteOrigin::App));
    begin_unregister(&mut rib, "/a", route(1, RouteOrigin::App));

    // Only the first batch is dispatched; nothing is committed yet.
    assert_eq!(batches.borrow().len(), 1);
    assert!(rib.is_empty());

    rib.on_fib_update_success(Vec::new());
    assert!(rib.find(&name("/a")).is_some());
    assert!(rib.find(&name("/b")).is_none());

    rib.on_fib_update_success(Vec::new());
    assert!(rib.find(&name("/b")).is_some());

    rib.on_fib_update_success(Vec::new());
    assert!(rib.find(&name("/a")).is_none());
    assert!(rib.find(&name("/b")).is_some());
    check_invariants(&rib);
}

#[test]
fn at_most_one_batch_in_flight() {
    let (mut rib, batches) = make_rib();

    for uri in ["/a", "/b", "/c"] {
        begin_register(&mut rib, uri, route(1, RouteOrigin::App));
    }
    assert_eq!(batches.borrow().len(), 1);
    assert!(rib.is_update_in_progress());
    assert_eq!(rib.queue_len(), 2);

    rib.on_fib_update_success(Vec::new());
    assert_eq!(batches.borrow().len(), 2);

    rib.on_fib_update_success(Vec::new());
    assert_eq!(batches.borrow().len(), 3);

    rib.on_fib_update_success(Vec::new());
    assert!(!rib.is_update_in_progress());
    assert_eq!(rib.queue_len(), 0);
}

#[test]
fn fib_failure_preserves_state() {
    let (mut rib, batches) = make_rib();

    let failure = Rc::new(RefCell::new(None));
    let failure_slot = failure.clone();
    rib.begin_apply_update(
        RibUpdate {
            action: RibUpdateAction::Register,
            name: name("/x"),
            route: route(1, RouteOrigin::App),
        },
        None,
        Some(Box::new(move |code, message| {
            *failure_slot.borrow_mut() = Some((code, message));
        })),
    );
    begin_register(&mut rib, "/y", route(2, RouteOrigin::App));

    rib.on_fib_update_failure(504, "fib timeout");

    assert!(rib.find(&name("/x")).is_none());
    assert_eq!(
        *failure.borrow(),
        Some((504, "fib timeout".to_string()))
    );
    // The failure does not stall the queue.
    assert_eq!(batches.borrow().len(), 2);
    rib.on_fib_update_success(Vec::new());
    assert!(rib.find(&name("/y")).is_some());
    check_invariants(&rib);
}

#[test]
fn unregister_of_unknown_route_is_absorbed() {
    let (mut rib, _) = make_rib();

    let succeeded = Rc::new(RefCell::new(false));
    let succeeded_slot = succeeded.clone();
    rib.begin_apply_update(
        RibUpdate {
            action: RibUpdateAction::Unregister,
            name: name("/nowhere"),
            route: route(9, RouteOrigin::App),
        },
        Some(Box::new(move || {
            *succeeded_slot.borrow_mut() = true;
        })),
        None,
    );
    rib.on_fib_update_success(Vec::new());

    assert!(*succeeded.borrow(), "idempotent unregister must succeed");
    assert_eq!(rib.n_items(), 0);

    // Same for a known prefix with an unknown (face, origin) key.
    register(&mut rib, "/a", route(1, RouteOrigin::App));
    unregister(&mut rib, "/a", route(1, RouteOrigin::Static));
    assert_eq!(rib.n_items(), 1);
    check_invariants(&rib);
}

#[test]
fn face_down_removes_only_that_face() {
    let (mut rib, _) = make_rib();

    register(&mut rib, "/a", route(1, RouteOrigin::App));
    register(&mut rib, "/b", route(1, RouteOrigin::App));
    register(&mut rib, "/a", route(2, RouteOrigin::App));

    rib.begin_remove_face(FaceId(1));
    rib.on_fib_update_success(Vec::new());
    rib.on_fib_update_success(Vec::new());

    assert!(rib.find(&name("/b")).is_none());
    let a = rib.find(&name("/a")).unwrap().borrow().routes().to_vec();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].face_id, FaceId(2));
    assert_eq!(rib.n_items(), 1);
    check_invariants(&rib);
}

#[test]
fn face_down_covers_multiple_routes_per_entry() {
    let (mut rib, _) = make_rib();

    register(&mut rib, "/a", route(1, RouteOrigin::App));
    register(&mut rib, "/a", route(1, RouteOrigin::Static));
    register(&mut rib, "/a", route(2, RouteOrigin::App));

    rib.begin_remove_face(FaceId(1));
    rib.on_fib_update_success(Vec::new());
    rib.on_fib_update_success(Vec::new());

    let a = rib.find(&name("/a")).unwrap().borrow().routes().to_vec();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].face_id, FaceId(2));
    check_invariants(&rib);
}

#[test]
fn remove_failed_faces_keeps_active_set() {
    let (mut rib, _) = make_rib();

    register(&mut rib, "/a", route(1, RouteOrigin::App));
    register(&mut rib, "/b", route(2, RouteOrigin::App));
    register(&mut rib, "/c", route(3, RouteOrigin::App));

    let active = BTreeSet::from([FaceId(2)]);
    rib.begin_remove_failed_faces(&active);
    rib.on_fib_update_success(Vec::new());
    rib.on_fib_update_success(Vec::new());

    assert!(rib.find(&name("/a")).is_none());
    assert!(rib.find(&name("/b")).is_some());
    assert!(rib.find(&name("/c")).is_none());
    check_invariants(&rib);
}

#[test]
fn face_index_tracks_last_route_per_face() {
    let (mut rib, _) = make_rib();

    register(&mut rib, "/a", route(1, RouteOrigin::App));
    register(&mut rib, "/a", route(1, RouteOrigin::Static));
    check_invariants(&rib);

    unregister(&mut rib, "/a", route(1, RouteOrigin::App));
    // The entry still has a face-1 route, so the membership stays.
    assert!(rib.face_entries().any(|(face_id, _)| face_id == FaceId(1)));
    check_invariants(&rib);

    unregister(&mut rib, "/a", route(1, RouteOrigin::Static));
    assert_eq!(rib.face_entries().count(), 0);
    check_invariants(&rib);
}

#[test]
fn inherited_route_deltas_are_applied() {
    let (mut rib, _) = make_rib();

    let inherit = route(1, RouteOrigin::App)
        .with_cost(10)
        .with_flags(RouteFlags::CHILD_INHERIT);
    register(&mut rib, "/a", inherit.clone());

    begin_register(&mut rib, "/a/b", route(2, RouteOrigin::App));
    rib.on_fib_update_success(vec![RibUpdate {
        action: RibUpdateAction::Register,
        name: name("/a/b"),
        route: inherit.clone(),
    }]);

    let ab = rib.find(&name("/a/b")).unwrap().clone();
    assert!(ab.borrow().has_inherited_route(inherit.key()));

    begin_unregister(&mut rib, "/a", inherit.clone());
    rib.on_fib_update_success(vec![RibUpdate {
        action: RibUpdateAction::Unregister,
        name: name("/a/b"),
        route: inherit.clone(),
    }]);

    assert!(!ab.borrow().has_inherited_route(inherit.key()));
    check_invariants(&rib);
}

#[test]
fn remove_face_deltas_do_not_touch_inheritance() {
    let (mut rib, _) = make_rib();

    register(&mut rib, "/a", route(1, RouteOrigin::App));
    let delta_route = route(1, RouteOrigin::App);
    begin_register(&mut rib, "/a/b", route(2, RouteOrigin::App));
    rib.on_fib_update_success(vec![RibUpdate {
        action: RibUpdateAction::RemoveFace,
        name: name("/a"),
        route: delta_route.clone(),
    }]);

    let a = rib.find(&name("/a")).unwrap();
    assert!(!a.borrow().has_inherited_route(delta_route.key()));
}

#[test]
fn ancestor_routes_stop_at_capture() {
    let (mut rib, _) = make_rib();

    register(
        &mut rib,
        "/a",
        route(1, RouteOrigin::App)
            .with_cost(10)
            .with_flags(RouteFlags::CHILD_INHERIT),
    );
    register(
        &mut rib,
        "/a/b",
        route(2, RouteOrigin::App)
            .with_flags(RouteFlags::CHILD_INHERIT | RouteFlags::CAPTURE),
    );

    // The capture at /a/b hides /a from names below it.
    let below_capture = rib.ancestor_routes_for_name(&name("/a/b/c"));
    assert_eq!(below_capture.len(), 1);
    assert_eq!(below_capture[0].face_id, FaceId(2));

    // Siblings of /a/b still inherit from /a.
    let sibling = rib.ancestor_routes_for_name(&name("/a/x"));
    assert_eq!(sibling.len(), 1);
    assert_eq!(sibling[0].face_id, FaceId(1));
}

#[test]
fn ancestor_routes_prefer_nearest_ancestor() {
    let (mut rib, _) = make_rib();

    register(
        &mut rib,
        "/",
        route(1, RouteOrigin::App)
            .with_cost(99)
            .with_flags(RouteFlags::CHILD_INHERIT),
    );
    register(
        &mut rib,
        "/a",
        route(1, RouteOrigin::App)
            .with_cost(10)
            .with_flags(RouteFlags::CHILD_INHERIT),
    );
    register(
        &mut rib,
        "/",
        route(3, RouteOrigin::Static)
            .with_cost(7)
            .with_flags(RouteFlags::CHILD_INHERIT),
    );

    let routes = rib.ancestor_routes_for_name(&name("/a/b"));
    assert_eq!(routes.len(), 2);
    // Ordered by (face id, origin); the nearest ancestor wins the tie.
    assert_eq!(routes[0].face_id, FaceId(1));
    assert_eq!(routes[0].cost, 10);
    assert_eq!(routes[1].face_id, FaceId(3));
    assert_eq!(routes[1].cost, 7);
}

#[test]
fn ancestor_routes_of_entry_match_name_query() {
    let (mut rib, _) = make_rib();

    register(
        &mut rib,
        "/a",
        route(1, RouteOrigin::App).with_flags(RouteFlags::CHILD_INHERIT),
    );
    register(&mut rib, "/a/b", route(2, RouteOrigin::App));

    let ab = rib.find(&name("/a/b")).unwrap().clone();
    let of_entry = rib.ancestor_routes_of(&ab.borrow());
    let of_name = rib.ancestor_routes_for_name(&name("/a/b"));
    assert_eq!(of_entry.len(), 1);
    assert_eq!(of_name.len(), 1);
    assert_eq!(of_entry[0].face_id, of_name[0].face_id);
}

#[test]
fn events_follow_entry_lifecycle() {
    let (mut rib, _) = make_rib();

    register(&mut rib, "/a", route(1, RouteOrigin::App));
    let events = rib.take_events();
    assert!(matches!(&events[0], RibEvent::EntryInserted { name } if name == &self::name("/a")));
    assert!(matches!(&events[1], RibEvent::RouteAdded { name, .. } if name == &self::name("/a")));
    assert_eq!(events.len(), 2);

    // A second route to an existing entry only reports the route.
    register(&mut rib, "/a", route(2, RouteOrigin::App));
    let events = rib.take_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], RibEvent::RouteAdded { .. }));

    // A refresh is silent.
    register(&mut rib, "/a", route(2, RouteOrigin::App).with_cost(5));
    assert!(rib.take_events().is_empty());

    unregister(&mut rib, "/a", route(2, RouteOrigin::App));
    let events = rib.take_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], RibEvent::RouteRemoved { .. }));

    unregister(&mut rib, "/a", route(1, RouteOrigin::App));
    let events = rib.take_events();
    assert!(matches!(&events[0], RibEvent::RouteRemoved { .. }));
    assert!(matches!(&events[1], RibEvent::EntryErased { name } if name == &self::name("/a")));
}

#[test]
fn find_route_longest_prefix_falls_back_to_parent() {
    let (mut rib, _) = make_rib();

    register(&mut rib, "/a", route(1, RouteOrigin::App).with_cost(42));
    register(&mut rib, "/a/b", route(2, RouteOrigin::App));

    let probe = route(1, RouteOrigin::App);
    let found = rib
        .find_route_longest_prefix(&name("/a/b"), &probe)
        .expect("should find the parent's route");
    assert_eq!(found.cost, 42);

    assert!(rib
        .find_route_longest_prefix(&name("/zzz"), &probe)
        .is_none());
}

#[test]
fn descendant_queries() {
    let (mut rib, _) = make_rib();

    for uri in ["/a", "/a/b", "/a/b/c", "/ab", "/b"] {
        register(&mut rib, uri, route(1, RouteOrigin::App));
    }

    let below_a: Vec<String> = rib
        .find_descendants(&name("/a"))
        .iter()
        .map(|e| e.borrow().name().to_string())
        .collect();
    assert_eq!(below_a, vec!["/a/b", "/a/b/c"]);

    let uninserted: Vec<String> = rib
        .find_descendants_for_uninserted_name(&name("/a/b"))
        .iter()
        .map(|e| e.borrow().name().to_string())
        .collect();
    assert_eq!(uninserted, vec!["/a/b", "/a/b/c"]);
}

#[test]
fn route_expiration_begins_unregister() {
    let (mut rib, batches) = make_rib();

    register(&mut rib, "/a", route(1, RouteOrigin::App));
    rib.on_route_expiration(&name("/a"), route(1, RouteOrigin::App));

    assert_eq!(batches.borrow().len(), 2);
    rib.on_fib_update_success(Vec::new());
    assert!(rib.is_empty());
}

#[test]
#[should_panic(expected = "fib updater must be set")]
fn update_without_updater_is_a_bug() {
    let mut rib = Rib::new();
    begin_register(&mut rib, "/a", route(1, RouteOrigin::App));
}
