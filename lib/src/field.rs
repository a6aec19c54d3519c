// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Field value encoding
//!
//! Converts textual values (as found in values dictionaries and on the
//! command line) to and from field record bodies.

use std::num::IntErrorKind;

use chrono::{DateTime, NaiveDateTime};
use encdec::Encode;

use ledger_fio_apdu::field::{Encoding, FieldError, FieldRecord};

/// Datetime format used for [Encoding::Datetime] values
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Encode a textual value to a field body using the provided [Encoding]
///
/// - STRING: raw UTF-8 bytes
/// - HEX: decoded hex string
/// - UINT*: decimal string, big-endian at the encoding width
/// - DATETIME: timestamp, 4-byte big-endian seconds since the unix epoch
///
/// Unparseable values fail with [FieldError::InvalidValue], values outside
/// the range of the encoding with [FieldError::FieldTooLong].
pub fn encode_body(encoding: Encoding, value: &str) -> Result<Vec<u8>, FieldError> {
    let b = match encoding {
        Encoding::String => value.as_bytes().to_vec(),
        Encoding::Hex => hex::decode(value).map_err(|_| FieldError::InvalidValue)?,
        Encoding::Uint8 | Encoding::Uint16 | Encoding::Uint32 | Encoding::Uint64 => {
            let v = parse_uint(value)?;
            uint_body(encoding, v)?
        }
        Encoding::Datetime => {
            let v = parse_datetime(value)?;
            v.to_be_bytes().to_vec()
        }
    };

    if b.len() > u8::MAX as usize {
        return Err(FieldError::FieldTooLong);
    }

    Ok(b)
}

/// Decode a field body to its textual value, the inverse of [encode_body]
pub fn decode_body(encoding: Encoding, body: &[u8]) -> Result<String, FieldError> {
    if let Some(n) = encoding.fixed_len() {
        if body.len() != n {
            return Err(FieldError::InvalidValue);
        }
    }

    let s = match encoding {
        Encoding::String => std::str::from_utf8(body)
            .map_err(|_| FieldError::InvalidValue)?
            .to_string(),
        Encoding::Hex => hex::encode(body),
        Encoding::Uint8 | Encoding::Uint16 | Encoding::Uint32 | Encoding::Uint64 => {
            let mut b = [0u8; 8];
            b[8 - body.len()..].copy_from_slice(body);
            u64::from_be_bytes(b).to_string()
        }
        Encoding::Datetime => {
            let s = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
            let d = DateTime::from_timestamp(s as i64, 0).ok_or(FieldError::InvalidValue)?;
            d.format(DATETIME_FORMAT).to_string()
        }
    };

    Ok(s)
}

/// Encode a complete field record for the provided header and textual value
pub fn encode_field(
    header: &str,
    value: &str,
    encoding: Encoding,
    storage_action: u8,
) -> Result<Vec<u8>, FieldError> {
    let body = encode_body(encoding, value)?;
    let r = FieldRecord::new(encoding, header, storage_action, &body)?;

    let mut buff = vec![0u8; r.encode_len().map_err(|_| FieldError::FieldTooLong)?];
    let n = r.encode(&mut buff).map_err(|_| FieldError::FieldTooLong)?;
    buff.truncate(n);

    Ok(buff)
}

fn uint_body(encoding: Encoding, v: u64) -> Result<Vec<u8>, FieldError> {
    let n = encoding.fixed_len().ok_or(FieldError::InvalidEncoding)?;

    if n < 8 && v >> (n * 8) != 0 {
        return Err(FieldError::FieldTooLong);
    }

    Ok(v.to_be_bytes()[8 - n..].to_vec())
}

/// Parse a timestamp to seconds since the unix epoch
///
/// Accepts `YYYY-MM-DDTHH:MM:SS[.fff]` (UTC), RFC 3339, or integer seconds.
fn parse_datetime(value: &str) -> Result<u32, FieldError> {
    let value = value.trim();

    let s = if let Ok(v) = value.parse::<i64>() {
        v
    } else if let Ok(d) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        d.and_utc().timestamp()
    } else if let Ok(d) = DateTime::parse_from_rfc3339(value) {
        d.timestamp()
    } else {
        return Err(FieldError::InvalidValue);
    };

    u32::try_from(s).map_err(|_| FieldError::FieldTooLong)
}

/// Parse a decimal integer, overflowing values do not fit any encoding
fn parse_uint(value: &str) -> Result<u64, FieldError> {
    value.trim().parse().map_err(|e: std::num::ParseIntError| match e.kind() {
        IntErrorKind::PosOverflow => FieldError::FieldTooLong,
        _ => FieldError::InvalidValue,
    })
}
