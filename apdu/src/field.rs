// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Field records, the unit of transaction data streamed to the device
//!
//! Each [`FieldRecord`] carries one named, typed value and is sent in a
//! single [`SendData`][crate::sign_tx::SendData] APDU.

use encdec::{Decode, Encode};

use crate::{ApduError, MAX_APDU_PAYLOAD};

/// SendData `p2`, device renders the field before accepting it
pub const DISPLAY: u8 = 0x01;

/// SendData `p2`, field is hashed without being shown
pub const DONT_DISPLAY: u8 = 0x02;

/// Storage action for fields the device does not retain
pub const STORAGE_NONE: u8 = 0x00;

/// Fixed overhead of a field record (tag, lengths, terminators, storage action)
pub const FIELD_OVERHEAD: usize = 6;

/// Field value encodings
#[derive(Copy, Clone, PartialEq, Eq, Debug, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum Encoding {
    /// Raw UTF-8 text
    String = 150,

    Uint8 = 151,

    Uint16 = 152,

    Uint32 = 153,

    Uint64 = 154,

    /// Binary data, supplied as a hex string
    Hex = 155,

    /// Timestamp, carried on the wire as [`Encoding::Uint32`] seconds
    Datetime = 156,
}

impl Encoding {
    /// All encodings, in tag order
    pub const ALL: [Encoding; 7] = [
        Encoding::String,
        Encoding::Uint8,
        Encoding::Uint16,
        Encoding::Uint32,
        Encoding::Uint64,
        Encoding::Hex,
        Encoding::Datetime,
    ];

    /// Tag written to the wire for this encoding
    pub const fn wire_tag(&self) -> u8 {
        match self {
            Encoding::Datetime => Encoding::Uint32 as u8,
            _ => *self as u8,
        }
    }

    /// Fixed body width for integer encodings
    pub const fn fixed_len(&self) -> Option<usize> {
        match self {
            Encoding::Uint8 => Some(1),
            Encoding::Uint16 => Some(2),
            Encoding::Uint32 | Encoding::Datetime => Some(4),
            Encoding::Uint64 => Some(8),
            Encoding::String | Encoding::Hex => None,
        }
    }

    /// Look up an encoding by name (`"HEX"`, `"UINT64"`, ..)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|e| e.name().eq_ignore_ascii_case(name))
            .copied()
    }

    /// Canonical encoding name
    pub const fn name(&self) -> &'static str {
        match self {
            Encoding::String => "STRING",
            Encoding::Uint8 => "UINT8",
            Encoding::Uint16 => "UINT16",
            Encoding::Uint32 => "UINT32",
            Encoding::Uint64 => "UINT64",
            Encoding::Hex => "HEX",
            Encoding::Datetime => "DATETIME",
        }
    }

    /// Decode an encoding from a wire tag, [`Encoding::Datetime`] is never
    /// present on the wire
    pub fn from_wire(tag: u8) -> Result<Self, FieldError> {
        match Self::try_from(tag) {
            Ok(Encoding::Datetime) | Err(_) => Err(FieldError::InvalidEncoding),
            Ok(e) => Ok(e),
        }
    }
}

impl core::fmt::Display for Encoding {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Host-side validation errors, raised before any frame is sent
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
pub enum FieldError {
    /// Header, body, or full record does not fit a single APDU
    #[cfg_attr(feature = "thiserror", error("field too long"))]
    FieldTooLong,

    /// Unsupported encoding tag
    #[cfg_attr(feature = "thiserror", error("invalid field encoding"))]
    InvalidEncoding,

    /// Value could not be represented in the requested encoding
    #[cfg_attr(feature = "thiserror", error("invalid value for encoding"))]
    InvalidValue,

    /// Allowed iteration hash set does not fit a single APDU
    #[cfg_attr(feature = "thiserror", error("too many allowed iteration hashes"))]
    TooManyHashes,
}

impl From<FieldError> for ApduError {
    fn from(e: FieldError) -> Self {
        match e {
            FieldError::InvalidEncoding | FieldError::InvalidValue => ApduError::InvalidEncoding,
            FieldError::FieldTooLong | FieldError::TooManyHashes => ApduError::InvalidLength,
        }
    }
}

/// Field record, streamed to the device as the payload of a
/// [`SendData`][crate::sign_tx::SendData] request
///
/// ## Encoding
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | ENCODING_TAG  |  HEADER_LEN   |                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
/// /                          HEADER...                            /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      0x00     |    STORAGE    |   BODY_LEN    |               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+               +
/// /                           BODY...                             /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      0x00     |
/// +-+-+-+-+-+-+-+-+
/// ```
///
/// Integer bodies are big-endian. [`Encoding::Datetime`] is written with the
/// [`Encoding::Uint32`] tag and decodes as such.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct FieldRecord<'a> {
    /// Value encoding
    pub encoding: Encoding,

    /// Field name, shown to the user for displayed fields
    pub header: &'a str,

    /// Device storage action
    pub storage_action: u8,

    /// Encoded body bytes
    pub body: &'a [u8],
}

impl<'a> FieldRecord<'a> {
    /// Create a new field record, checking lengths against the encoding and
    /// the single APDU limit
    pub fn new(
        encoding: Encoding,
        header: &'a str,
        storage_action: u8,
        body: &'a [u8],
    ) -> Result<Self, FieldError> {
        if header.len() > u8::MAX as usize || body.len() > u8::MAX as usize {
            return Err(FieldError::FieldTooLong);
        }

        if header.len() + body.len() + FIELD_OVERHEAD > MAX_APDU_PAYLOAD {
            return Err(FieldError::FieldTooLong);
        }

        match encoding.fixed_len() {
            Some(n) if n != body.len() => return Err(FieldError::InvalidValue),
            _ => (),
        }

        Ok(Self {
            encoding,
            header,
            storage_action,
            body,
        })
    }
}

impl<'a> Encode for FieldRecord<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(self.header.len() + self.body.len() + FIELD_OVERHEAD)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let (h, b) = (self.header.as_bytes(), self.body);

        if h.len() > u8::MAX as usize || b.len() > u8::MAX as usize {
            return Err(ApduError::InvalidLength);
        }

        let n = self.encode_len()?;
        if buff.len() < n {
            return Err(ApduError::InvalidLength);
        }

        let mut index = 0;

        // Write tag and header
        buff[0] = self.encoding.wire_tag();
        buff[1] = h.len() as u8;
        index += 2;

        buff[index..][..h.len()].copy_from_slice(h);
        index += h.len();

        buff[index] = 0;
        buff[index + 1] = self.storage_action;
        buff[index + 2] = b.len() as u8;
        index += 3;

        // Write body
        buff[index..][..b.len()].copy_from_slice(b);
        index += b.len();

        buff[index] = 0;
        index += 1;

        Ok(index)
    }
}

impl<'a> Decode<'a> for FieldRecord<'a> {
    type Output = Self;
    type Error = ApduError;

    fn decode(buff: &'a [u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < FIELD_OVERHEAD {
            return Err(ApduError::InvalidLength);
        }

        let encoding = Encoding::from_wire(buff[0])?;
        let header_len = buff[1] as usize;
        let mut index = 2;

        // Header, terminator, storage action, body length
        if buff.len() < index + header_len + 3 {
            return Err(ApduError::InvalidLength);
        }

        let header = core::str::from_utf8(&buff[index..][..header_len])
            .map_err(|_| ApduError::InvalidEncoding)?;
        index += header_len;

        if buff[index] != 0 {
            return Err(ApduError::InvalidEncoding);
        }

        let storage_action = buff[index + 1];
        let body_len = buff[index + 2] as usize;
        index += 3;

        // Body and terminator
        if buff.len() < index + body_len + 1 {
            return Err(ApduError::InvalidLength);
        }

        let body = &buff[index..][..body_len];
        index += body_len;

        if buff[index] != 0 {
            return Err(ApduError::InvalidEncoding);
        }
        index += 1;

        match encoding.fixed_len() {
            Some(n) if n != body_len => return Err(ApduError::InvalidLength),
            _ => (),
        }

        Ok((
            Self {
                encoding,
                header,
                storage_action,
                body,
            },
            index,
        ))
    }
}
