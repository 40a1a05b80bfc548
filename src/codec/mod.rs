//! Signal codec: fixed-offset hex slicing of telemetry payloads
//!
//! Payload layouts:
//! - RPM: bytes 0-1 big-endian u16, value = raw / 4
//! - PTO: byte 0 status (`01` engaged), rest filler
//! - Fault: bytes 0-1 SPN, byte 2 FMI, rest filler
//!
//! Decoders never panic; malformed input yields [`Decoded::Undecodable`].

use rand::Rng;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Payload is empty")]
    Empty,

    #[error("Payload too short: need {needed} hex chars, got {actual}")]
    TooShort { needed: usize, actual: usize },

    #[error("Payload contains non-hex characters")]
    NonHex,

    #[error("Payload has odd length {0}")]
    OddLength(usize),
}

/// Outcome of decoding one payload.
///
/// Callers must match on the failure case or explicitly discard it with
/// [`Decoded::ok`]; a failed decode can never pass for a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Value(T),
    Undecodable(DecodeError),
}

impl<T> Decoded<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Decoded::Value(v) => Some(v),
            Decoded::Undecodable(_) => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Decoded::Value(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Decoded::Value(v) => Decoded::Value(f(v)),
            Decoded::Undecodable(e) => Decoded::Undecodable(e),
        }
    }

    pub fn into_result(self) -> Result<T, DecodeError> {
        match self {
            Decoded::Value(v) => Ok(v),
            Decoded::Undecodable(e) => Err(e),
        }
    }
}

impl<T> From<Result<T, DecodeError>> for Decoded<T> {
    fn from(result: Result<T, DecodeError>) -> Self {
        match result {
            Ok(v) => Decoded::Value(v),
            Err(e) => Decoded::Undecodable(e),
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Parse `payload[offset..offset + width]` as an unsigned hex number.
fn hex_field(payload: &str, offset: usize, width: usize) -> Result<u32, DecodeError> {
    let needed = offset + width;
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }
    if payload.len() < needed {
        return Err(DecodeError::TooShort {
            needed,
            actual: payload.len(),
        });
    }
    // Byte slicing is only safe once the prefix is known to be ASCII.
    let prefix = payload.as_bytes();
    if !prefix[..needed].iter().all(u8::is_ascii_hexdigit) {
        return Err(DecodeError::NonHex);
    }
    u32::from_str_radix(&payload[offset..needed], 16).map_err(|_| DecodeError::NonHex)
}

/// Engine speed from the first two bytes, 0.25 RPM per bit.
pub fn decode_rpm(payload: &str) -> Decoded<f64> {
    hex_field(payload, 0, 4).map(|raw| raw as f64 / 4.0).into()
}

/// True iff the status byte is `01`. Anything else, including a malformed
/// payload, reads as not engaged.
pub fn decode_pto_engaged(payload: &str) -> bool {
    payload
        .get(..2)
        .map_or(false, |status| status.eq_ignore_ascii_case("01"))
}

/// `(spn, fmi)` from the first three bytes.
pub fn decode_fault(payload: &str) -> Decoded<(u16, u8)> {
    let decoded = hex_field(payload, 0, 4).and_then(|spn| {
        hex_field(payload, 4, 2).map(|fmi| (spn as u16, fmi as u8))
    });
    decoded.into()
}

/// Check a payload accepted from outside the simulator: non-empty, even
/// length, hex only.
pub fn validate_payload(payload: &str) -> Result<(), DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }
    if !payload.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DecodeError::NonHex);
    }
    if payload.len() % 2 != 0 {
        return Err(DecodeError::OddLength(payload.len()));
    }
    Ok(())
}

// ============================================================================
// Encoding
// ============================================================================

/// Quantize to 0.25 RPM, clamp to the u16 range, pad with two filler bytes.
pub fn encode_rpm(rpm: f64) -> String {
    let scaled = (rpm * 4.0).round();
    let raw = if scaled.is_nan() {
        0
    } else {
        scaled.clamp(0.0, u16::MAX as f64) as u16
    };
    format!("{raw:04X}0000")
}

/// Status byte followed by three random filler bytes.
pub fn encode_pto<R: Rng + ?Sized>(engaged: bool, rng: &mut R) -> String {
    let status = if engaged { "01" } else { "00" };
    let filler: u32 = rng.gen_range(0..=0x00FF_FFFF);
    format!("{status}{filler:06X}")
}

pub fn encode_fault(spn: u16, fmi: u8) -> String {
    format!("{spn:04X}{fmi:02X}00")
}
