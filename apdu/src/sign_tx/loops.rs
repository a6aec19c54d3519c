// Copyright (c) 2022-2023 The FIO Protocol Developers

use encdec::{Decode, DecodeOwned, Encode};
use heapless::Vec;

use crate::{
    field::FieldError,
    hash::{loop_commitment, IterHash},
    helpers::*,
    ApduError, ApduStatic, Instruction, SignTxOp, SignTxReq, FIO_APDU_CLA, MAX_APDU_PAYLOAD,
};

/// Maximum number of allowed iteration hashes per loop, bounded by the
/// [`EndIteration`] payload
pub const MAX_ITER_HASHES: usize = (MAX_APDU_PAYLOAD - 1) / 32;

/// Open a committed loop
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  MIN_ITERS    |   MAX_ITERS   |                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
/// /                          COMMITMENT                           /
/// /       (sha256 over concatenated allowed iteration hashes)     /
/// +                               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Debug, Encode, Decode)]
#[encdec(error = "ApduError")]
pub struct StartFor {
    /// Minimum iteration count
    pub min: u8,

    /// Maximum iteration count
    pub max: u8,

    /// Commitment over the allowed iteration hash set
    #[encdec(with = "arr")]
    pub commitment: IterHash,
}

sign_tx_req!(StartFor, StartFor);

impl StartFor {
    /// Create a loop request committing to the provided allowed iteration hashes
    pub fn new(min: u8, max: u8, allowed: &[IterHash]) -> Result<Self, FieldError> {
        if min > max {
            return Err(FieldError::InvalidValue);
        }

        if allowed.len() > MAX_ITER_HASHES {
            return Err(FieldError::TooManyHashes);
        }

        Ok(Self {
            min,
            max,
            commitment: loop_commitment(allowed),
        })
    }
}

/// Start a loop iteration (0 length APDU)
#[derive(Copy, Clone, PartialEq, Debug, Encode, Decode)]
#[encdec(error = "ApduError")]
pub struct StartIteration;

sign_tx_req!(StartIteration, StartIteration);

/// End a loop iteration, resending the allowed iteration hash set committed
/// to at [`StartFor`]
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     COUNT     |                                               |
/// +-+-+-+-+-+-+-+-+                                               +
/// /                                                               /
/// /             ALLOWED_HASHES (COUNT x 32 bytes)                 /
/// /                                                               /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct EndIteration {
    pub hashes: Vec<IterHash, MAX_ITER_HASHES>,
}

sign_tx_req!(EndIteration, EndIteration);

impl EndIteration {
    pub fn new(allowed: &[IterHash]) -> Result<Self, FieldError> {
        let hashes = Vec::from_slice(allowed).map_err(|_| FieldError::TooManyHashes)?;
        Ok(Self { hashes })
    }

    /// Commitment over the resent hash set
    pub fn commitment(&self) -> IterHash {
        loop_commitment(&self.hashes)
    }

    /// Check whether an iteration hash is a member of the resent set
    pub fn contains(&self, h: &IterHash) -> bool {
        self.hashes.iter().any(|v| v == h)
    }
}

impl Encode for EndIteration {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(1 + self.hashes.len() * 32)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if buff.len() < self.encode_len()? {
            return Err(ApduError::InvalidLength);
        }

        buff[0] = self.hashes.len() as u8;
        let mut index = 1;

        for h in &self.hashes {
            buff[index..][..32].copy_from_slice(h);
            index += 32;
        }

        Ok(index)
    }
}

impl DecodeOwned for EndIteration {
    type Output = Self;

    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.is_empty() {
            return Err(ApduError::InvalidLength);
        }

        let count = buff[0] as usize;
        if count > MAX_ITER_HASHES {
            return Err(ApduError::InvalidEncoding);
        }
        if buff.len() < 1 + count * 32 {
            return Err(ApduError::InvalidLength);
        }

        let mut hashes = Vec::new();
        for c in buff[1..][..count * 32].chunks_exact(32) {
            let mut h = [0u8; 32];
            h.copy_from_slice(c);

            hashes.push(h).map_err(|_| ApduError::InvalidLength)?;
        }

        Ok((Self { hashes }, 1 + count * 32))
    }
}

/// Close the innermost loop (0 length APDU)
#[derive(Copy, Clone, PartialEq, Debug, Encode, Decode)]
#[encdec(error = "ApduError")]
pub struct EndFor;

sign_tx_req!(EndFor, EndFor);
