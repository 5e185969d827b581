//! TLV (Type‑Length‑Value) encoding and decoding utilities.
//!
//! This module provides the subset of the NDN TLV format the RIB management
//! surface needs: single-byte types, the variable-width length field, and
//! non-negative integer values.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/* ---------------------------------------------------------------- *
 * TLV type constants (single‑byte subset used by the RIB)
 * ---------------------------------------------------------------- */

pub const TLV_NAME: u8               = 0x07;
pub const TLV_COMPONENT: u8          = 0x08;
pub const TLV_CONTROL_RESPONSE: u8   = 0x65;
pub const TLV_STATUS_CODE: u8        = 0x66;
pub const TLV_STATUS_TEXT: u8        = 0x67;
pub const TLV_CONTROL_PARAMETERS: u8 = 0x68;
pub const TLV_FACE_ID: u8            = 0x69;
pub const TLV_COST: u8               = 0x6A;
pub const TLV_FLAGS: u8              = 0x6C;
pub const TLV_EXPIRATION_PERIOD: u8  = 0x6D;
pub const TLV_ORIGIN: u8             = 0x6F;

// Markers introducing the wider length encodings.
const LENGTH16_MARKER: u8 = 253;
const LENGTH32_MARKER: u8 = 254;
const LENGTH64_MARKER: u8 = 255;

/* ---------------------------------------------------------------- *
 * Length field
 * ---------------------------------------------------------------- */

/// Writes the variable-width TLV length field.
///
/// Lengths below 253 occupy a single byte; larger ones follow a one-byte
/// marker as a 16- or 32-bit value. The 64-bit form is never produced.
pub fn write_tlv_length(buf: &mut BytesMut, length: usize) {
    match length {
        0..=252 => buf.put_u8(length as u8),
        253..=65_535 => {
            buf.put_u8(LENGTH16_MARKER);
            buf.put_u16(length as u16);
        }
        _ => {
            buf.put_u8(LENGTH32_MARKER);
            buf.put_u32(length as u32);
        }
    }
}

/// Reads a variable-width TLV length field.
pub fn read_tlv_length(buf: &mut impl Buf) -> Result<usize, Error> {
    match take_u8(buf, "TLV length")? {
        LENGTH16_MARKER => {
            if buf.remaining() < 2 {
                return Err(truncated("16-bit TLV length"));
            }
            Ok(buf.get_u16() as usize)
        }
        LENGTH32_MARKER => {
            if buf.remaining() < 4 {
                return Err(truncated("32-bit TLV length"));
            }
            Ok(buf.get_u32() as usize)
        }
        LENGTH64_MARKER => Err(Error::Tlv("64-bit TLV lengths not supported".into())),
        short => Ok(short as usize),
    }
}

/// Bytes the variable-width encoding of `length` occupies.
fn tlv_length_width(length: usize) -> usize {
    match length {
        0..=252 => 1,
        253..=65_535 => 3,
        _ => 5,
    }
}

fn take_u8(buf: &mut impl Buf, what: &str) -> Result<u8, Error> {
    if !buf.has_remaining() {
        return Err(truncated(what));
    }
    Ok(buf.get_u8())
}

fn truncated(what: &str) -> Error {
    Error::Tlv(format!("buffer exhausted while reading {what}"))
}

/* ---------------------------------------------------------------- *
 * Non-negative integer values
 * ---------------------------------------------------------------- */

/// Encode a non‑negative integer value using the shortest of 1, 2, 4 or
/// 8 bytes, as NDN prescribes for numeric TLV values.
pub fn encode_nonneg_integer(value: u64, buf: &mut BytesMut) {
    if value <= 0xFF {
        buf.put_u8(value as u8);
    } else if value <= 0xFFFF {
        buf.put_u16(value as u16);
    } else if value <= 0xFFFF_FFFF {
        buf.put_u32(value as u32);
    } else {
        buf.put_u64(value);
    }
}

/// Decode a non‑negative integer occupying the whole of `value`.
pub fn decode_nonneg_integer(value: &Bytes) -> Result<u64, Error> {
    let mut buf = value.clone();
    match buf.len() {
        1 => Ok(buf.get_u8() as u64),
        2 => Ok(buf.get_u16() as u64),
        4 => Ok(buf.get_u32() as u64),
        8 => Ok(buf.get_u64()),
        n => Err(Error::Tlv(format!(
            "Invalid non-negative integer length {n}"
        ))),
    }
}

/* ---------------------------------------------------------------- *
 * TLV element wrapper
 * ---------------------------------------------------------------- */

/// One TLV element: its type byte and its value bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u8,
    pub value: Bytes,
}

impl TlvElement {
    /// Wraps a type byte and value bytes as an element.
    pub fn new(tlv_type: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Create an element whose value is a non‑negative integer.
    pub fn from_nonneg_integer(tlv_type: u8, value: u64) -> Self {
        let mut buf = BytesMut::new();
        encode_nonneg_integer(value, &mut buf);
        Self::new(tlv_type, buf.freeze())
    }

    /// Interpret the value as a non‑negative integer.
    pub fn as_nonneg_integer(&self) -> Result<u64, Error> {
        decode_nonneg_integer(&self.value)
    }

    /// Encoded size of the whole element, header included.
    pub fn len(&self) -> usize {
        1 + tlv_length_width(self.value.len()) + self.value.len()
    }

    /// Returns true if the element carries an empty value.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Appends the encoded element to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tlv_type);
        write_tlv_length(buf, self.value.len());
        buf.put_slice(&self.value);
    }

    /// Consumes one element from the front of `buf`.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        let tlv_type = take_u8(buf, "TLV type")?;
        let length = read_tlv_length(buf)?;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "TLV value truncated: need {length} bytes, have {}",
                buf.remaining()
            )));
        }

        Ok(Self {
            tlv_type,
            value: buf.copy_to_bytes(length),
        })
    }
}
