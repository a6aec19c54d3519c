// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Transport abstraction and device status translation
//!

use std::{fmt::Debug, fmt::Display, time::Duration};

use async_trait::async_trait;
use log::trace;

use ledger_fio_apdu::{status::StatusCode, Header};

use crate::{interaction::Frame, Error};

/// Transport capability for exchanging raw command frames with a device
///
/// Responses include the trailing status word. Callers must not interleave
/// requests, see [DeviceHandle][crate::DeviceHandle] for serialised access.
#[async_trait]
pub trait Transport {
    type Error: Debug + Display + Send + Sync + 'static;

    /// Send a command frame, returning the raw response
    async fn send(&mut self, header: Header, payload: &[u8]) -> Result<Vec<u8>, Self::Error>;
}

/// Pass-through [Transport] implementation for mutable references
#[async_trait]
impl<T: Transport + Send> Transport for &mut T {
    type Error = T::Error;

    async fn send(&mut self, header: Header, payload: &[u8]) -> Result<Vec<u8>, Self::Error> {
        T::send(self, header, payload).await
    }
}

/// In-process simulator transport
#[cfg(feature = "sim")]
#[async_trait]
impl<D: ledger_fio_sim::Driver + Send> Transport for ledger_fio_sim::Engine<D> {
    type Error = std::convert::Infallible;

    async fn send(&mut self, header: Header, payload: &[u8]) -> Result<Vec<u8>, Self::Error> {
        Ok(self.exchange(header, payload))
    }
}

/// Exchange a [Frame] with the device, stripping the status word and
/// translating non-success statuses to [Error::Device]
pub async fn exchange<T: Transport + Send>(
    t: &mut T,
    frame: &Frame,
    timeout: Duration,
) -> Result<Vec<u8>, Error<T::Error>> {
    trace!("cmd {:02x?}: {:02x?}", frame.header, frame.payload);

    let resp = tokio::time::timeout(timeout, t.send(frame.header, &frame.payload))
        .await
        .map_err(|_| match frame.user {
            true => Error::UserTimeout,
            false => Error::RequestTimeout,
        })?
        .map_err(Error::Transport)?;

    trace!("resp: {:02x?}", resp);

    let (body, sw) = StatusCode::split(&resp).ok_or(Error::UnexpectedResponse)?;
    if !sw.is_success() {
        return Err(Error::Device(sw));
    }

    match frame.resp_len {
        Some(n) if n != body.len() => Err(Error::UnexpectedResponse),
        _ => Ok(body.to_vec()),
    }
}
