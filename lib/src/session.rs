// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Streaming-hash session primitives
//!
//! A [Session] holds exclusive access to the device transport from
//! [init_hash][Session::init_hash] to [end_hash][Session::end_hash]. Each
//! primitive either completes or returns an error, after which the device
//! session is aborted and must be restarted from `init_hash`.

use encdec::Encode;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::MutexGuard;

use ledger_fio_apdu::{
    prelude::*,
    sign_tx::{SIGNATURE_LEN, TX_HASH_LEN},
    ApduError,
};

use crate::{
    field::encode_body,
    interaction::{interact, CheckVersion, Finalize, Frame, GetVersion, Interaction, Request, Timeouts},
    transport::Transport,
    Error,
};

/// Finalised session result
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SignedHash {
    /// Transaction hash
    #[serde(rename = "txHashHex", with = "hex_array")]
    pub tx_hash: [u8; TX_HASH_LEN],

    /// Signature over the transaction hash
    pub witness: Witness,
}

/// Signature with the derivation path of the signing key
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Witness {
    #[serde(rename = "witnessPath", with = "path_str")]
    pub path: DerivationPath,

    #[serde(rename = "witnessSignatureHex", with = "hex_array")]
    pub signature: [u8; SIGNATURE_LEN],
}

/// Device session, see [DeviceHandle::session][crate::DeviceHandle::session]
pub struct Session<'a, T: Transport> {
    t: MutexGuard<'a, T>,
    timeouts: Timeouts,
    /// Next frame is the first of this call
    first: bool,
}

impl<'a, T: Transport + Send> Session<'a, T> {
    pub(crate) fn new(t: MutexGuard<'a, T>, timeouts: Timeouts) -> Self {
        Self {
            t,
            timeouts,
            first: true,
        }
    }

    /// Run an interaction, only the first frame of the session may be retried
    async fn run<I: Interaction + Send>(&mut self, i: I) -> Result<I::Output, Error<T::Error>> {
        let retry_first = core::mem::replace(&mut self.first, false);
        interact(&mut *self.t, i, retry_first, &self.timeouts).await
    }

    /// Issue a request with an empty response
    async fn request<R>(&mut self, req: &R, user: bool) -> Result<(), Error<T::Error>>
    where
        R: SignTxReq + Encode<Error = ApduError>,
    {
        let f = Frame::new(req)?.with_user(user);
        self.run(Request::new(f)).await.map(|_| ())
    }

    /// Fetch the device application version
    pub async fn app_version(&mut self) -> Result<Version, Error<T::Error>> {
        self.run(GetVersion::new()).await
    }

    /// Start a hashing session, checking the application version first
    pub async fn init_hash(&mut self, context: [u8; 32]) -> Result<(), Error<T::Error>> {
        debug!("init hash (context: {})", hex::encode(context));

        let f = Frame::new(&InitHash::new(context))?;
        self.run(CheckVersion::new(Request::new(f))).await?;

        Ok(())
    }

    /// Encode and stream a field
    pub async fn send_data(
        &mut self,
        header: &str,
        value: &str,
        encoding: Encoding,
        display: bool,
        storage_action: u8,
    ) -> Result<(), Error<T::Error>> {
        let body = encode_body(encoding, value)?;
        self.send_body(header, &body, encoding, display, storage_action)
            .await
    }

    /// Stream a field with a pre-encoded body
    pub async fn send_body(
        &mut self,
        header: &str,
        body: &[u8],
        encoding: Encoding,
        display: bool,
        storage_action: u8,
    ) -> Result<(), Error<T::Error>> {
        debug!("send data '{header}' ({encoding}, display: {display})");

        let r = FieldRecord::new(encoding, header, storage_action, body)?;
        self.request(&SendData::new(r, display), display).await
    }

    /// Display a header / body pair on the device
    pub async fn send_data_display(
        &mut self,
        header: &str,
        body: &str,
    ) -> Result<(), Error<T::Error>> {
        debug!("send data display '{header}'");

        let req = SendDataDisplay::new(header, body)?;
        self.request(&req, true).await
    }

    /// Open a counted section of `length` body bytes
    pub async fn start_counted_section(&mut self, length: u64) -> Result<(), Error<T::Error>> {
        debug!("start counted section ({length} bytes)");

        self.request(&StartCountedSection::new(length), false).await
    }

    /// Close the innermost counted section
    pub async fn end_counted_section(&mut self) -> Result<(), Error<T::Error>> {
        debug!("end counted section");

        self.request(&EndCountedSection, false).await
    }

    /// Open a loop committed to the provided allowed iteration hashes
    pub async fn start_for(
        &mut self,
        min: u8,
        max: u8,
        allowed: &[IterHash],
    ) -> Result<(), Error<T::Error>> {
        let req = StartFor::new(min, max, allowed)?;

        debug!(
            "start for [{min}, {max}] (commitment: {})",
            hex::encode(req.commitment)
        );

        self.request(&req, false).await
    }

    /// Start a loop iteration
    pub async fn start_iteration(&mut self) -> Result<(), Error<T::Error>> {
        debug!("start iteration");

        self.request(&StartIteration, false).await
    }

    /// End a loop iteration, resending the loop's allowed iteration hashes
    pub async fn end_iteration(&mut self, allowed: &[IterHash]) -> Result<(), Error<T::Error>> {
        debug!("end iteration");

        self.request(&EndIteration::new(allowed)?, false).await
    }

    /// Close the innermost loop
    pub async fn end_for(&mut self) -> Result<(), Error<T::Error>> {
        debug!("end for");

        self.request(&EndFor, false).await
    }

    /// Finalise the session, signing the transaction hash with the key at `path`
    pub async fn end_hash(&mut self, path: &DerivationPath) -> Result<SignedHash, Error<T::Error>> {
        debug!("end hash (path: {path})");

        let r = self.run(Finalize::new(path)?).await?;

        debug!("tx hash: {}", hex::encode(r.tx_hash));

        Ok(SignedHash {
            tx_hash: r.tx_hash,
            witness: Witness {
                path: *path,
                signature: r.signature,
            },
        })
    }
}

/// Serde helpers for hex-encoded byte arrays
mod hex_array {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(v: &[u8; N], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(d: D) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(d)?;

        let mut b = [0u8; N];
        hex::decode_to_slice(&s, &mut b).map_err(D::Error::custom)?;

        Ok(b)
    }
}

/// Serde helpers for derivation paths in `44'/235'/0'/0/0` notation
mod path_str {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use ledger_fio_apdu::path::DerivationPath;

    pub fn serialize<S: Serializer>(p: &DerivationPath, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(p)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DerivationPath, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn signed_hash_json() {
        let r = SignedHash {
            tx_hash: [0xab; TX_HASH_LEN],
            witness: Witness {
                path: DerivationPath::fio(0, 0),
                signature: [0x01; SIGNATURE_LEN],
            },
        };

        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["txHashHex"].as_str().unwrap().len(), 64);
        assert_eq!(v["witness"]["witnessSignatureHex"].as_str().unwrap().len(), 130);
        assert_eq!(v["witness"]["witnessPath"], "44'/235'/0'/0/0");

        let d: SignedHash = serde_json::from_value(v).unwrap();
        assert_eq!(d, r);
    }
}
