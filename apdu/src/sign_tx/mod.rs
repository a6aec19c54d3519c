// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Streaming transaction hash APDUs
//!
//! A signing session is a sequence of [`Instruction::SignTx`] requests, from
//! [`InitHash`] to [`EndHash`], with the sub-operation carried in `p1`.
//! Each request is answered with an empty body except [`EndHash`], which
//! returns an [`EndHashResp`].
//!
//! See `ledger-fio-sim` for the device-side state machine.

use encdec::{Decode, DecodeOwned, Encode};

use crate::{
    helpers::*, path::DerivationPath, ApduError, ApduStatic, Instruction, SignTxOp, SignTxReq,
    FIO_APDU_CLA,
};

/// Signature length returned by [`EndHash`] (recovery / format byte and 64-byte signature)
pub const SIGNATURE_LEN: usize = 65;

/// Transaction hash length
pub const TX_HASH_LEN: usize = 32;

/// Bind a request type to its [`SignTxOp`]
macro_rules! sign_tx_req {
    ($t:ty, $op:ident) => {
        sign_tx_req!($t, $op, 0);
    };
    ($t:ty, $op:ident, $resp_len:expr) => {
        impl ApduStatic for $t {
            const CLA: u8 = FIO_APDU_CLA;
            const INS: u8 = Instruction::SignTx as u8;
        }

        impl SignTxReq for $t {
            const OP: SignTxOp = SignTxOp::$op;
            const RESP_LEN: usize = $resp_len;
        }
    };
}

mod data;
pub use data::*;

mod section;
pub use section::*;

mod loops;
pub use loops::*;

/// Start a hashing session
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /                            CONTEXT                            /
/// /            (32 bytes, chain identifier or zeroes)             /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Debug, Encode, Decode)]
#[encdec(error = "ApduError")]
pub struct InitHash {
    /// Session context value
    #[encdec(with = "arr")]
    pub context: [u8; 32],
}

sign_tx_req!(InitHash, InitHash);

impl InitHash {
    pub fn new(context: [u8; 32]) -> Self {
        Self { context }
    }
}

impl Default for InitHash {
    fn default() -> Self {
        Self { context: [0u8; 32] }
    }
}

/// Finalise a hashing session, signing the transaction hash with the key
/// at the provided [`DerivationPath`]
///
/// See [`DerivationPath`] for the path encoding. Answered with [`EndHashResp`].
#[derive(Clone, PartialEq, Debug)]
pub struct EndHash {
    pub path: DerivationPath,
}

sign_tx_req!(EndHash, EndHash, SIGNATURE_LEN + TX_HASH_LEN);

impl EndHash {
    pub fn new(path: DerivationPath) -> Self {
        Self { path }
    }
}

impl Encode for EndHash {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        self.path.encode_len()
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        self.path.encode(buff)
    }
}

impl DecodeOwned for EndHash {
    type Output = Self;

    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let (path, n) = DerivationPath::decode_owned(buff)?;
        Ok((Self { path }, n))
    }
}

/// Session result, signature over and value of the transaction hash
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /                           SIGNATURE                           /
/// /                           (65 bytes)                          /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /                            TX_HASH                            /
/// /                           (32 bytes)                          /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Debug, Encode, Decode)]
#[encdec(error = "ApduError")]
pub struct EndHashResp {
    /// Witness signature
    #[encdec(with = "arr")]
    pub signature: [u8; SIGNATURE_LEN],

    /// Finalised transaction hash
    #[encdec(with = "arr")]
    pub tx_hash: [u8; TX_HASH_LEN],
}

impl EndHashResp {
    pub fn new(signature: [u8; SIGNATURE_LEN], tx_hash: [u8; TX_HASH_LEN]) -> Self {
        Self { signature, tx_hash }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{test::encode_decode_apdu, Header};

    #[test]
    fn init_hash_apdu() {
        let apdu = InitHash::new([0xb2; 32]);

        let mut buff = [0u8; 256];
        let n = encode_decode_apdu(&mut buff, &apdu);

        assert_eq!(n, 32);
        assert_eq!(apdu.header(), Header::sign_tx(SignTxOp::InitHash, 0));
        assert_eq!(
            apdu.header(),
            Header {
                cla: 0xd7,
                ins: 0x20,
                p1: 0x01,
                p2: 0x00
            }
        );
    }

    #[test]
    fn end_hash_apdu() {
        let apdu = EndHash::new(DerivationPath::fio(0, 0));

        let mut buff = [0u8; 256];
        let n = encode_decode_apdu(&mut buff, &apdu);

        assert_eq!(n, 20);
        assert_eq!(apdu.header().p1, 0x06);
        assert_eq!(EndHash::RESP_LEN, 97);
    }

    #[test]
    fn end_hash_resp_apdu() {
        let mut signature = [0u8; SIGNATURE_LEN];
        signature[1..].copy_from_slice(&[0x5a; 64]);

        let apdu = EndHashResp::new(signature, [0x11; 32]);

        let mut buff = [0u8; 256];
        let n = encode_decode_apdu(&mut buff, &apdu);

        assert_eq!(n, EndHash::RESP_LEN);
        assert_eq!(&buff[65..97], &[0x11; 32]);
        assert_eq!(apdu.encode_len().unwrap(), 97);
    }
}
