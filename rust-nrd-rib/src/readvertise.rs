//! Readvertisement of local registrations to an upstream gateway.
//!
//! A policy classifies each new RIB route into an optional
//! [`ReadvertiseAction`]; the [`Readvertise`] consumer keeps the ref-counted
//! set of advertised prefixes in sync with route additions and removals.
//! The actual upstream publication engine lives outside this crate.

use crate::route::Route;
use log::{debug, info, warn};
use rust_nrd_common::name::Name;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;


/// Interval between readvertise refreshes when the configuration does not
/// specify one.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(25);

/// Key-value configuration section for a readvertise policy.
pub type ConfigSection = BTreeMap<String, String>;

/// Minimal registry of signing identities, sufficient to choose the signer
/// of outgoing advertisements. Identity and key management proper are
/// external.
#[derive(Debug, Default)]
pub struct KeyChain {
    identities: BTreeSet<Name>,
}

impl KeyChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an identity name. Returns false if it already existed.
    pub fn create_identity(&mut self, name: Name) -> bool {
        self.identities.insert(name)
    }

    pub fn identities(&self) -> impl Iterator<Item = &Name> {
        self.identities.iter()
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.identities.contains(name)
    }
}

/// Designates the key used to sign an advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningInfo {
    pub identity: Name,
}

/// Signing information for the given identity.
pub fn signing_by_identity(identity: &Name) -> SigningInfo {
    SigningInfo {
        identity: identity.clone(),
    }
}

/// What to advertise upstream for a newly added route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadvertiseAction {
    pub prefix: Name,
    pub cost: u64,
    pub signer: SigningInfo,
}

/// Policy for hosts advertising their prefixes to a gateway router.
///
/// A route is advertised under the shortest registered signing identity
/// that is a prefix of its name; a trailing `nrd` component of the identity
/// is stripped from the advertised prefix. Names under the reserved
/// `/localhost` and `/localhop` scopes are never advertised, and a route
/// with no matching identity produces no action.
pub struct HostToGatewayReadvertisePolicy {
    key_chain: Rc<RefCell<KeyChain>>,
    refresh_interval: Duration,
    localhost: Name,
    localhop: Name,
}

impl HostToGatewayReadvertisePolicy {
    pub fn new(key_chain: Rc<RefCell<KeyChain>>, section: &ConfigSection) -> Self {
        let mut refresh_interval = DEFAULT_REFRESH_INTERVAL;

        for (key, value) in section {
            match key.as_str() {
                "refresh_interval" => match value.parse::<u64>() {
                    Ok(seconds) => refresh_interval = Duration::from_secs(seconds),
                    Err(_) => {
                        warn!("invalid refresh_interval value {value:?}, keeping default")
                    }
                },
                other => warn!("ignoring unknown readvertise option {other:?}"),
            }
        }

        Self {
            key_chain,
            refresh_interval,
            localhost: Name::from_string("/localhost"),
            localhop: Name::from_string("/localhop"),
        }
    }

    /// Classifies a newly added route.
    pub fn handle_new_route(&self, name: &Name, route: &Route) -> Option<ReadvertiseAction> {
        let identity = self.select_identity(name)?;
        let prefix = Self::prefix_for_identity(&identity);
        Some(ReadvertiseAction {
            prefix,
            cost: route.cost,
            signer: signing_by_identity(&identity),
        })
    }

    /// Classifies a removed route: the advertised prefix whose refcount the
    /// removal affects, if the route had been advertised.
    pub fn handle_removed_route(&self, name: &Name, _route: &Route) -> Option<Name> {
        let identity = self.select_identity(name)?;
        Some(Self::prefix_for_identity(&identity))
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// The shortest registered identity that is a prefix of `name`, unless
    /// the name lies in a reserved scope.
    fn select_identity(&self, name: &Name) -> Option<Name> {
        if self.localhost.is_prefix_of(name) || self.localhop.is_prefix_of(name) {
            return None;
        }

        let key_chain = self.key_chain.borrow();
        let mut selected: Option<&Name> = None;
        for identity in key_chain.identities() {
            if identity.is_prefix_of(name)
                && selected.map_or(true, |current| identity.len() < current.len())
            {
                selected = Some(identity);
            }
        }
        selected.cloned()
    }

    fn prefix_for_identity(identity: &Name) -> Name {
        match identity.last() {
            Some(component) if component.equals_str("nrd") => identity.parent_prefix(),
            _ => identity.clone(),
        }
    }
}

/// The available policy variants. Chosen at construction; each variant is a
/// concrete classifier rather than a subclass.
pub enum ReadvertisePolicy {
    HostToGateway(HostToGatewayReadvertisePolicy),
}

impl ReadvertisePolicy {
    pub fn handle_new_route(&self, name: &Name, route: &Route) -> Option<ReadvertiseAction> {
        match self {
            Self::HostToGateway(policy) => policy.handle_new_route(name, route),
        }
    }

    pub fn handle_removed_route(&self, name: &Name, route: &Route) -> Option<Name> {
        match self {
            Self::HostToGateway(policy) => policy.handle_removed_route(name, route),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        match self {
            Self::HostToGateway(policy) => policy.refresh_interval(),
        }
    }
}

/// An advertised prefix and the number of RIB routes sustaining it.
#[derive(Debug, Clone)]
pub struct AdvertisedPrefix {
    pub n_rib_routes: usize,
    pub cost: u64,
    pub signer: SigningInfo,
}

/// Keeps the set of advertised prefixes in sync with RIB route events.
pub struct Readvertise {
    policy: ReadvertisePolicy,
    advertised: BTreeMap<Name, AdvertisedPrefix>,
}

impl Readvertise {
    pub fn new(policy: ReadvertisePolicy) -> Self {
        Self {
            policy,
            advertised: BTreeMap::new(),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.policy.refresh_interval()
    }

    /// Reacts to a route addition: advertise its prefix, or bump the
    /// refcount if it is already advertised.
    pub fn on_route_added(&mut self, name: &Name, route: &Route) {
        let Some(action) = self.policy.handle_new_route(name, route) else {
            debug!("not advertising {name}");
            return;
        };

        match self.advertised.get_mut(&action.prefix) {
            Some(existing) => {
                existing.n_rib_routes += 1;
            }
            None => {
                info!(
                    "advertising {} (cost {}, signer {})",
                    action.prefix, action.cost, action.signer.identity
                );
                self.advertised.insert(
                    action.prefix,
                    AdvertisedPrefix {
                        n_rib_routes: 1,
                        cost: action.cost,
                        signer: action.signer,
                    },
                );
            }
        }
    }

    /// Reacts to a route removal: withdraw the advertisement once the last
    /// sustaining route is gone.
    pub fn on_route_removed(&mut self, name: &Name, route: &Route) {
        let Some(prefix) = self.policy.handle_removed_route(name, route) else {
            return;
        };
        let Some(existing) = self.advertised.get_mut(&prefix) else {
            return;
        };

        existing.n_rib_routes -= 1;
        if existing.n_rib_routes == 0 {
            info!("withdrawing {prefix}");
            self.advertised.remove(&prefix);
        }
    }

    /// The currently advertised prefixes.
    pub fn advertised(&self) -> &BTreeMap<Name, AdvertisedPrefix> {
        &self.advertised
    }
}
