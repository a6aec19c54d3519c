// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Resumable device interactions and the engine driving them
//!
//! An [Interaction] is a sequence of command frames, each built from the
//! response to the last. [interact] drives an interaction to completion over
//! a [Transport], applying the first-frame retry policy.

use std::{fmt::Debug, fmt::Display, time::Duration};

use encdec::{Decode, DecodeOwned, Encode};
use log::{debug, warn};

use ledger_fio_apdu::{
    prelude::*,
    sign_tx::{SIGNATURE_LEN, TX_HASH_LEN},
    ApduError, ApduStatic, MAX_APDU_PAYLOAD,
};

use crate::{
    transport::{exchange, Transport},
    Error,
};

/// Command frame with expected response
#[derive(Clone, PartialEq, Debug)]
pub struct Frame {
    /// Command header
    pub header: Header,

    /// Encoded request payload
    pub payload: Vec<u8>,

    /// Exact expected response length, if known
    pub resp_len: Option<usize>,

    /// Frame waits on user interaction
    pub user: bool,
}

impl Frame {
    /// Build a frame from a [SignTxReq] request, payloads must fit a single APDU
    pub fn new<R: SignTxReq + Encode<Error = ApduError>>(req: &R) -> Result<Self, ApduError> {
        let payload = encode_vec(req)?;
        if payload.len() > MAX_APDU_PAYLOAD {
            return Err(ApduError::InvalidLength);
        }

        Ok(Self {
            header: req.header(),
            payload,
            resp_len: Some(R::RESP_LEN),
            user: false,
        })
    }

    /// Build a version request frame
    pub fn version() -> Self {
        Self {
            header: Header {
                cla: VersionReq::CLA,
                ins: VersionReq::INS,
                p1: 0,
                p2: 0,
            },
            payload: vec![],
            resp_len: Some(Version::LEN),
            user: false,
        }
    }

    /// Mark frame as awaiting user interaction
    pub fn with_user(mut self, user: bool) -> Self {
        self.user = user;
        self
    }
}

fn encode_vec<R: Encode<Error = ApduError>>(req: &R) -> Result<Vec<u8>, ApduError> {
    let mut buff = vec![0u8; req.encode_len()?];
    let n = req.encode(&mut buff)?;
    buff.truncate(n);
    Ok(buff)
}

/// Interaction step result
#[derive(Clone, PartialEq, Debug)]
pub enum Step<T> {
    /// Frame to be sent, the response is passed to the next step
    Pending(Frame),
    /// Interaction complete
    Done(T),
}

/// Resumable device interaction
pub trait Interaction {
    type Output;

    /// Advance the interaction with the body of the previous response
    /// (`None` for the first step)
    fn step<E: Display + Debug>(
        &mut self,
        resp: Option<&[u8]>,
    ) -> Result<Step<Self::Output>, Error<E>>;
}

/// Timeouts applied to frame exchanges
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Timeouts {
    /// Timeout for requests
    pub request: Duration,
    /// Timeout for requests awaiting user interaction
    pub user: Duration,
}

/// Drive an [Interaction] to completion
///
/// When `retry_first` is set the first frame is resent once if the device
/// reports [StatusCode::STILL_IN_CALL]. No other frame is ever resent.
pub async fn interact<T: Transport + Send, I: Interaction>(
    t: &mut T,
    mut i: I,
    retry_first: bool,
    timeouts: &Timeouts,
) -> Result<I::Output, Error<T::Error>> {
    let mut resp: Option<Vec<u8>> = None;
    let mut first = true;

    loop {
        let frame = match i.step(resp.as_deref())? {
            Step::Done(v) => return Ok(v),
            Step::Pending(f) => f,
        };

        let timeout = match frame.user {
            true => timeouts.user,
            false => timeouts.request,
        };

        let r = match exchange(t, &frame, timeout).await {
            Err(Error::Device(StatusCode::STILL_IN_CALL)) if first && retry_first => {
                warn!("device still in call, retrying {:02x?}", frame.header);
                exchange(t, &frame, timeout).await?
            }
            r => r?,
        };

        first = false;
        resp = Some(r);
    }
}

/// Single frame interaction, returning the response body
pub struct Request {
    frame: Option<Frame>,
}

impl Request {
    pub fn new(frame: Frame) -> Self {
        Self { frame: Some(frame) }
    }
}

impl Interaction for Request {
    type Output = Vec<u8>;

    fn step<E: Display + Debug>(
        &mut self,
        resp: Option<&[u8]>,
    ) -> Result<Step<Self::Output>, Error<E>> {
        match (self.frame.take(), resp) {
            (Some(f), None) => Ok(Step::Pending(f)),
            (None, Some(r)) => Ok(Step::Done(r.to_vec())),
            _ => Err(Error::UnexpectedResponse),
        }
    }
}

/// Fetch the device application version
pub struct GetVersion {
    sent: bool,
}

impl GetVersion {
    pub fn new() -> Self {
        Self { sent: false }
    }
}

impl Default for GetVersion {
    fn default() -> Self {
        Self::new()
    }
}

impl Interaction for GetVersion {
    type Output = Version;

    fn step<E: Display + Debug>(
        &mut self,
        resp: Option<&[u8]>,
    ) -> Result<Step<Self::Output>, Error<E>> {
        match (self.sent, resp) {
            (false, None) => {
                self.sent = true;
                Ok(Step::Pending(Frame::version()))
            }
            (true, Some(r)) => {
                let (v, _) = Version::decode_owned(r)?;
                Ok(Step::Done(v))
            }
            _ => Err(Error::UnexpectedResponse),
        }
    }
}

/// Check the device application version before running the wrapped interaction
pub struct CheckVersion<I: Interaction> {
    version: Option<GetVersion>,
    inner: I,
}

impl<I: Interaction> CheckVersion<I> {
    pub fn new(inner: I) -> Self {
        Self {
            version: Some(GetVersion::new()),
            inner,
        }
    }
}

impl<I: Interaction> Interaction for CheckVersion<I> {
    type Output = I::Output;

    fn step<E: Display + Debug>(
        &mut self,
        resp: Option<&[u8]>,
    ) -> Result<Step<Self::Output>, Error<E>> {
        let v = match &mut self.version {
            Some(v) => v,
            None => return self.inner.step(resp),
        };

        match v.step(resp)? {
            Step::Pending(f) => Ok(Step::Pending(f)),
            Step::Done(version) => {
                debug!("app version: {version}");

                if !version.is_compatible() {
                    return Err(Error::UnsupportedVersion(version));
                }

                // Version complete, start the wrapped interaction
                self.version = None;
                self.inner.step(None)
            }
        }
    }
}

/// Finalise a session, returning the signature and transaction hash
pub struct Finalize {
    req: Request,
}

impl Finalize {
    pub fn new(path: &DerivationPath) -> Result<Self, ApduError> {
        let f = Frame::new(&EndHash::new(*path))?;
        Ok(Self {
            req: Request::new(f),
        })
    }
}

impl Interaction for Finalize {
    type Output = EndHashResp;

    fn step<E: Display + Debug>(
        &mut self,
        resp: Option<&[u8]>,
    ) -> Result<Step<Self::Output>, Error<E>> {
        match self.req.step(resp)? {
            Step::Pending(f) => Ok(Step::Pending(f)),
            Step::Done(r) if r.len() == SIGNATURE_LEN + TX_HASH_LEN => {
                let (v, _) = EndHashResp::decode(&r)?;
                Ok(Step::Done(v))
            }
            Step::Done(_) => Err(Error::UnexpectedResponse),
        }
    }
}
