// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Application version APDUs

use encdec::{DecodeOwned, Encode};

use super::{ApduError, ApduStatic, Instruction, FIO_APDU_CLA};

/// Oldest application version supporting the nested streaming-hash protocol
pub const MIN_SUPPORTED_VERSION: (u8, u8, u8) = (0, 3, 0);

/// Fetch application version APDU
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct VersionReq {}

impl ApduStatic for VersionReq {
    /// Version command APDU is class `0xd7`
    const CLA: u8 = FIO_APDU_CLA;

    /// Version GET APDU is instruction `0x00`
    const INS: u8 = Instruction::GetVersion as u8;
}

impl Encode for VersionReq {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(0)
    }

    fn encode(&self, _buff: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

impl DecodeOwned for VersionReq {
    type Output = Self;

    type Error = ApduError;

    fn decode_owned(_buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        Ok((Self {}, 0))
    }
}

bitflags::bitflags! {
    /// Application version flags
    pub struct VersionFlags: u8 {
        /// Application was built in debug mode
        const DEBUG = 1 << 0;
    }
}

/// Application version response APDU
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     MAJOR     |     MINOR     |     PATCH     |     FLAGS     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub flags: VersionFlags,
}

impl Version {
    /// Encoded version length
    pub const LEN: usize = 4;

    pub const fn new(major: u8, minor: u8, patch: u8, flags: VersionFlags) -> Self {
        Self {
            major,
            minor,
            patch,
            flags,
        }
    }

    /// Check whether this application version supports the streaming-hash
    /// protocol implemented here
    pub fn is_compatible(&self) -> bool {
        let (major, minor, patch) = MIN_SUPPORTED_VERSION;

        // Pre-1.0 minor releases are not compatible with each other
        self.major == major && self.minor == minor && self.patch >= patch
    }
}

impl core::fmt::Display for Version {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.flags.contains(VersionFlags::DEBUG) {
            write!(f, " (debug)")?;
        }
        Ok(())
    }
}

impl Encode for Version {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(Self::LEN)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if buff.len() < Self::LEN {
            return Err(ApduError::InvalidLength);
        }

        buff[0] = self.major;
        buff[1] = self.minor;
        buff[2] = self.patch;
        buff[3] = self.flags.bits();

        Ok(Self::LEN)
    }
}

impl DecodeOwned for Version {
    type Output = Self;

    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < Self::LEN {
            return Err(ApduError::InvalidLength);
        }

        let flags = VersionFlags::from_bits_truncate(buff[3]);

        Ok((Self::new(buff[0], buff[1], buff[2], flags), Self::LEN))
    }
}
