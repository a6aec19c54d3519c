// Copyright (c) 2022-2023 The FIO Protocol Developers

//! BIP-0044 derivation paths
//!
//! FIO witness keys are always derived at a fixed-depth path
//! (`44'/235'/account'/change/index`).

use core::str::FromStr;

use encdec::{DecodeOwned, Encode};

use crate::ApduError;

/// Hardened derivation flag
pub const HARDENED: u32 = 0x8000_0000;

/// Number of components in a derivation path
pub const PATH_LEN: usize = 5;

/// Derivation path error
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
pub enum PathError {
    /// Path must have exactly [`PATH_LEN`] components
    #[cfg_attr(feature = "thiserror", error("derivation path must have 5 components"))]
    InvalidLength,

    /// Component could not be parsed
    #[cfg_attr(feature = "thiserror", error("invalid derivation path component"))]
    InvalidComponent,
}

/// Derivation path (5 components, hardened indices have [`HARDENED`] set)
///
/// ## Encoding
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                      PURPOSE (u32, BE)                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                     COIN_TYPE (u32, BE)                       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                      ACCOUNT (u32, BE)                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       CHANGE (u32, BE)                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                     ADDRESS_INDEX (u32, BE)                   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct DerivationPath(pub [u32; PATH_LEN]);

impl DerivationPath {
    /// Create a new derivation path from components
    pub const fn new(components: [u32; PATH_LEN]) -> Self {
        Self(components)
    }

    /// Standard FIO witness path `44'/235'/account'/0/index`
    pub const fn fio(account: u32, index: u32) -> Self {
        Self([44 | HARDENED, 235 | HARDENED, account | HARDENED, 0, index])
    }

    /// Path components
    pub fn components(&self) -> &[u32; PATH_LEN] {
        &self.0
    }

    /// Encode path to wire bytes
    pub fn to_bytes(&self) -> [u8; PATH_LEN * 4] {
        let mut b = [0u8; PATH_LEN * 4];
        for (i, c) in self.0.iter().enumerate() {
            b[i * 4..][..4].copy_from_slice(&c.to_be_bytes());
        }
        b
    }
}

impl TryFrom<&[u32]> for DerivationPath {
    type Error = PathError;

    fn try_from(v: &[u32]) -> Result<Self, Self::Error> {
        let c: [u32; PATH_LEN] = v.try_into().map_err(|_| PathError::InvalidLength)?;
        Ok(Self(c))
    }
}

/// Parse a derivation path from `44'/235'/0'/0/0` notation
/// (`h` is accepted as a hardened marker, a leading `m/` is ignored)
impl FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("m/").unwrap_or(s);

        let mut c = [0u32; PATH_LEN];
        let mut n = 0;

        for p in s.split('/') {
            if n >= PATH_LEN {
                return Err(PathError::InvalidLength);
            }

            let (v, hardened) = match p.strip_suffix('\'').or_else(|| p.strip_suffix('h')) {
                Some(v) => (v, true),
                None => (p, false),
            };

            let v = u32::from_str(v).map_err(|_| PathError::InvalidComponent)?;
            if v & HARDENED != 0 {
                return Err(PathError::InvalidComponent);
            }

            c[n] = match hardened {
                true => v | HARDENED,
                false => v,
            };
            n += 1;
        }

        if n != PATH_LEN {
            return Err(PathError::InvalidLength);
        }

        Ok(Self(c))
    }
}

impl core::fmt::Debug for DerivationPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self}")
    }
}

/// Display [DerivationPath] in `44'/235'/0'/0/0` notation
impl core::fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }

            match c & HARDENED != 0 {
                true => write!(f, "{}'", c & !HARDENED)?,
                false => write!(f, "{c}")?,
            }
        }
        Ok(())
    }
}

impl Encode for DerivationPath {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(PATH_LEN * 4)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if buff.len() < PATH_LEN * 4 {
            return Err(ApduError::InvalidLength);
        }

        buff[..PATH_LEN * 4].copy_from_slice(&self.to_bytes());

        Ok(PATH_LEN * 4)
    }
}

impl DecodeOwned for DerivationPath {
    type Output = Self;

    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < PATH_LEN * 4 {
            return Err(ApduError::InvalidLength);
        }

        let mut c = [0u32; PATH_LEN];
        for (i, v) in c.iter_mut().enumerate() {
            *v = u32::from_be_bytes([
                buff[i * 4],
                buff[i * 4 + 1],
                buff[i * 4 + 2],
                buff[i * 4 + 3],
            ]);
        }

        Ok((Self(c), PATH_LEN * 4))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_path() {
        let p = DerivationPath::from_str("44'/235'/0'/0/0").unwrap();
        assert_eq!(p, DerivationPath::fio(0, 0));

        let p = DerivationPath::from_str("m/44h/235h/1h/0/7").unwrap();
        assert_eq!(p, DerivationPath::fio(1, 7));
    }

    #[test]
    fn parse_path_errors() {
        assert_eq!(
            DerivationPath::from_str("44'/235'/0'/0"),
            Err(PathError::InvalidLength)
        );
        assert_eq!(
            DerivationPath::from_str("44'/235'/0'/0/0/0"),
            Err(PathError::InvalidLength)
        );
        assert_eq!(
            DerivationPath::from_str("44'/abc'/0'/0/0"),
            Err(PathError::InvalidComponent)
        );
        assert_eq!(
            DerivationPath::from_str("44'/2147483648/0'/0/0"),
            Err(PathError::InvalidComponent)
        );

        let short: &[u32] = &[44, 235];
        assert_eq!(
            DerivationPath::try_from(short),
            Err(PathError::InvalidLength)
        );
    }

    #[test]
    fn path_wire_encoding() {
        let p = DerivationPath::fio(0, 1);
        let b = p.to_bytes();

        assert_eq!(&b[..4], &[0x80, 0x00, 0x00, 0x2c]);
        assert_eq!(&b[4..8], &[0x80, 0x00, 0x00, 0xeb]);
        assert_eq!(&b[16..], &[0x00, 0x00, 0x00, 0x01]);

        let (d, n) = DerivationPath::decode_owned(&b).unwrap();
        assert_eq!(d, p);
        assert_eq!(n, 20);
    }
}
