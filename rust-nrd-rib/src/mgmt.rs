//! Management command surface: control parameters and responses.
//!
//! An external dispatcher validates signed commands and hands the decoded
//! parameters to the RIB service; this module provides the parameter and
//! response types, their TLV codecs, and the validation that turns
//! parameters into a registration.

use crate::route::Route;
use bytes::{Buf, BytesMut};
use rust_nrd_common::name::Name;
use rust_nrd_common::tlv::{self, TlvElement};
use rust_nrd_common::types::{FaceId, RouteFlags, RouteOrigin, MAX_PREFIX_COMPONENTS};
use std::fmt;
use std::time::Duration;

/// Parameters of a REGISTER or UNREGISTER control command.
#[derive(Debug, Clone, Default)]
pub struct ControlParameters {
    pub name: Option<Name>,
    pub face_id: Option<FaceId>,
    pub origin: Option<RouteOrigin>,
    pub cost: Option<u64>,
    pub flags: Option<RouteFlags>,
    pub expiration_period: Option<Duration>,
}

impl ControlParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: Name) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_face_id(mut self, face_id: FaceId) -> Self {
        self.face_id = Some(face_id);
        self
    }

    pub fn with_origin(mut self, origin: RouteOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_flags(mut self, flags: RouteFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn with_expiration_period(mut self, period: Duration) -> Self {
        self.expiration_period = Some(period);
        self
    }

    /// Encodes the parameters as a ControlParameters TLV element.
    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();

        if let Some(name) = &self.name {
            name.to_tlv().encode(&mut buf);
        }
        if let Some(face_id) = self.face_id {
            TlvElement::from_nonneg_integer(tlv::TLV_FACE_ID, face_id.0).encode(&mut buf);
        }
        if let Some(origin) = self.origin {
            TlvElement::from_nonneg_integer(tlv::TLV_ORIGIN, origin as u64).encode(&mut buf);
        }
        if let Some(cost) = self.cost {
            TlvElement::from_nonneg_integer(tlv::TLV_COST, cost).encode(&mut buf);
        }
        if let Some(flags) = self.flags {
            TlvElement::from_nonneg_integer(tlv::TLV_FLAGS, flags.bits()).encode(&mut buf);
        }
        if let Some(period) = self.expiration_period {
            TlvElement::from_nonneg_integer(
                tlv::TLV_EXPIRATION_PERIOD,
                period.as_millis() as u64,
            )
            .encode(&mut buf);
        }

        TlvElement::new(tlv::TLV_CONTROL_PARAMETERS, buf.freeze())
    }

    /// Decodes parameters from a ControlParameters TLV element. Unrecognized
    /// sub-elements are skipped.
    pub fn from_tlv(element: &TlvElement) -> rust_nrd_common::Result<Self> {
        if element.tlv_type != tlv::TLV_CONTROL_PARAMETERS {
            return Err(rust_nrd_common::Error::Tlv(format!(
                "Expected ControlParameters TLV type {}, got {}",
                tlv::TLV_CONTROL_PARAMETERS,
                element.tlv_type
            )));
        }

        let mut params = Self::new();
        let mut buf = element.value.clone();

        while buf.has_remaining() {
            let field = TlvElement::decode(&mut buf)?;
            match field.tlv_type {
                tlv::TLV_NAME => params.name = Some(Name::from_tlv(&field)?),
                tlv::TLV_FACE_ID => {
                    params.face_id = Some(FaceId(field.as_nonneg_integer()?));
                }
                tlv::TLV_ORIGIN => {
                    let value = field.as_nonneg_integer()?;
                    params.origin = Some(RouteOrigin::from_u64(value).ok_or_else(|| {
                        rust_nrd_common::Error::Tlv(format!("unknown origin value {value}"))
                    })?);
                }
                tlv::TLV_COST => params.cost = Some(field.as_nonneg_integer()?),
                tlv::TLV_FLAGS => {
                    params.flags = Some(RouteFlags::from_bits_truncate(
                        field.as_nonneg_integer()?,
                    ));
                }
                tlv::TLV_EXPIRATION_PERIOD => {
                    params.expiration_period =
                        Some(Duration::from_millis(field.as_nonneg_integer()?));
                }
                _ => {}
            }
        }

        Ok(params)
    }
}

impl fmt::Display for ControlParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ControlParameters(")?;
        if let Some(name) = &self.name {
            write!(f, "name: {name}")?;
        }
        if let Some(face_id) = self.face_id {
            write!(f, ", face: {face_id}")?;
        }
        if let Some(origin) = self.origin {
            write!(f, ", origin: {origin}")?;
        }
        if let Some(cost) = self.cost {
            write!(f, ", cost: {cost}")?;
        }
        if let Some(flags) = self.flags {
            write!(f, ", flags: {flags}")?;
        }
        if let Some(period) = self.expiration_period {
            write!(f, ", expires: {}ms", period.as_millis())?;
        }
        write!(f, ")")
    }
}

/// Response to a control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlResponse {
    pub code: u32,
    pub text: String,
}

impl ControlResponse {
    pub fn new(code: u32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    /// The 200 success response.
    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    /// A 400 malformed-command response.
    pub fn malformed(text: impl Into<String>) -> Self {
        Self::new(400, text)
    }

    pub fn is_success(&self) -> bool {
        self.code == 200
    }

    /// Encodes the response as a ControlResponse TLV element.
    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        TlvElement::from_nonneg_integer(tlv::TLV_STATUS_CODE, self.code as u64).encode(&mut buf);
        TlvElement::new(tlv::TLV_STATUS_TEXT, self.text.clone().into_bytes()).encode(&mut buf);
        TlvElement::new(tlv::TLV_CONTROL_RESPONSE, buf.freeze())
    }

    /// Decodes a response from a ControlResponse TLV element.
    pub fn from_tlv(element: &TlvElement) -> rust_nrd_common::Result<Self> {
        if element.tlv_type != tlv::TLV_CONTROL_RESPONSE {
            return Err(rust_nrd_common::Error::Tlv(format!(
                "Expected ControlResponse TLV type {}, got {}",
                tlv::TLV_CONTROL_RESPONSE,
                element.tlv_type
            )));
        }

        let mut buf = element.value.clone();
        let code = TlvElement::decode(&mut buf)?.as_nonneg_integer()? as u32;
        let text_element = TlvElement::decode(&mut buf)?;
        let text = String::from_utf8_lossy(&text_element.value).into_owned();
        Ok(Self { code, text })
    }
}

impl fmt::Display for ControlResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

/// Checks REGISTER parameters and builds the prefix and route to insert.
///
/// The expiration period is returned separately: the caller owns the clock
/// and the timer that will unregister the route.
pub fn validate_register(
    params: &ControlParameters,
) -> Result<(Name, Route, Option<Duration>), ControlResponse> {
    let (name, face_id) = require_name_and_face(params)?;

    let route = Route::new(face_id, params.origin.unwrap_or_default())
        .with_cost(params.cost.unwrap_or(0))
        .with_flags(params.flags.unwrap_or(RouteFlags::CHILD_INHERIT));

    Ok((name, route, params.expiration_period))
}

/// Checks UNREGISTER parameters and builds the route key to erase.
pub fn validate_unregister(
    params: &ControlParameters,
) -> Result<(Name, Route), ControlResponse> {
    let (name, face_id) = require_name_and_face(params)?;
    Ok((name, Route::new(face_id, params.origin.unwrap_or_default())))
}

fn require_name_and_face(
    params: &ControlParameters,
) -> Result<(Name, FaceId), ControlResponse> {
    let name = params
        .name
        .clone()
        .ok_or_else(|| ControlResponse::malformed("missing prefix name"))?;
    if name.len() > MAX_PREFIX_COMPONENTS {
        return Err(ControlResponse::malformed(format!(
            "prefix exceeds {MAX_PREFIX_COMPONENTS} components"
        )));
    }
    let face_id = params
        .face_id
        .ok_or_else(|| ControlResponse::malformed("missing face id"))?;
    if face_id.0 == 0 {
        return Err(ControlResponse::malformed("invalid face id 0"));
    }
    Ok((name, face_id))
}
