// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Device status words
//!
//! Every response frame carries a trailing big-endian status word,
//! [`StatusCode::SUCCESS`] for accepted commands.

/// Status word returned by the device
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const SUCCESS: Self = Self(0x9000);

    pub const MALFORMED_REQUEST_HEADER: Self = Self(0x6e01);
    pub const BAD_CLA: Self = Self(0x6e02);
    pub const UNKNOWN_INS: Self = Self(0x6e03);

    /// Device was mid-call when a new call started, device state has been reset
    pub const STILL_IN_CALL: Self = Self(0x6e04);

    pub const INVALID_REQUEST_PARAMETERS: Self = Self(0x6e05);
    pub const INVALID_STATE: Self = Self(0x6e06);
    pub const INVALID_DATA: Self = Self(0x6e07);
    pub const INVALID_BIP_PATH: Self = Self(0x6e08);
    pub const REJECTED_BY_USER: Self = Self(0x6e09);
    pub const REJECTED_BY_POLICY: Self = Self(0x6e10);
    pub const DEVICE_LOCKED: Self = Self(0x6e11);

    /// Loop commitment or iteration hash did not match the committed set
    pub const HASH_NOT_ALLOWED: Self = Self(0x6e13);

    /// Split a response frame into body and trailing status word
    pub fn split(resp: &[u8]) -> Option<(&[u8], StatusCode)> {
        if resp.len() < 2 {
            return None;
        }

        let (body, sw) = resp.split_at(resp.len() - 2);
        Some((body, StatusCode(u16::from_be_bytes([sw[0], sw[1]]))))
    }

    /// Status word bytes for appending to a response
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }

    /// Fetch the name of a known status word
    pub fn name(&self) -> Option<&'static str> {
        let n = match *self {
            Self::SUCCESS => "success",
            Self::MALFORMED_REQUEST_HEADER => "malformed request header",
            Self::BAD_CLA => "bad class",
            Self::UNKNOWN_INS => "unknown instruction",
            Self::STILL_IN_CALL => "still in call",
            Self::INVALID_REQUEST_PARAMETERS => "invalid request parameters",
            Self::INVALID_STATE => "invalid state",
            Self::INVALID_DATA => "invalid data",
            Self::INVALID_BIP_PATH => "invalid derivation path",
            Self::REJECTED_BY_USER => "rejected by user",
            Self::REJECTED_BY_POLICY => "rejected by policy",
            Self::DEVICE_LOCKED => "device locked",
            Self::HASH_NOT_ALLOWED => "hash not allowed",
            _ => return None,
        };

        Some(n)
    }
}

impl From<u16> for StatusCode {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

impl core::fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "StatusCode(0x{:04x})", self.0)
    }
}

/// Display [StatusCode] as hex with name where known
impl core::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.name() {
            Some(n) => write!(f, "0x{:04x} ({n})", self.0),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}
