//! Identifier types shared across the RIB daemon.
//!
//! Faces, route origins and route flags are part of a route's identity and
//! travel on the management wire, so they live here rather than in the RIB
//! engine crate.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of components accepted in a registered prefix.
pub const MAX_PREFIX_COMPONENTS: usize = 32;

/// Unique identifier for a face (a communication endpoint).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaceId(pub u64);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FaceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The party responsible for a route registration.
///
/// Part of a route's identity together with the face id. The numeric values
/// follow the NFD management protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum RouteOrigin {
    #[default]
    App = 0,
    Autoreg = 64,
    Client = 65,
    Autoconf = 66,
    Nlsr = 128,
    Static = 255,
}

impl RouteOrigin {
    /// Maps a numeric origin back to the enum, if known.
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::App),
            64 => Some(Self::Autoreg),
            65 => Some(Self::Client),
            66 => Some(Self::Autoconf),
            128 => Some(Self::Nlsr),
            255 => Some(Self::Static),
            _ => None,
        }
    }
}

impl fmt::Display for RouteOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::App => "app",
            Self::Autoreg => "autoreg",
            Self::Client => "client",
            Self::Autoconf => "autoconf",
            Self::Nlsr => "nlsr",
            Self::Static => "static",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RouteOrigin {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(Self::App),
            "autoreg" => Ok(Self::Autoreg),
            "client" => Ok(Self::Client),
            "autoconf" => Ok(Self::Autoconf),
            "nlsr" => Ok(Self::Nlsr),
            "static" => Ok(Self::Static),
            other => Err(crate::error::Error::Other(format!(
                "unknown route origin: {other}"
            ))),
        }
    }
}

bitflags! {
    /// Per-route behavior flags.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct RouteFlags: u64 {
        /// The route applies to descendants of its prefix unless captured.
        const CHILD_INHERIT = 0x01;
        /// The prefix stops inheriting routes from its ancestors.
        const CAPTURE = 0x02;
    }
}

impl fmt::Display for RouteFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for (label, flag) in [
            ("child-inherit", RouteFlags::CHILD_INHERIT),
            ("capture", RouteFlags::CAPTURE),
        ] {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{label}")?;
                first = false;
            }
        }
        Ok(())
    }
}
