// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Handle for connected devices
//!
//! This serialises access to the underlying [Transport] so the frames of a
//! session are never interleaved with those of another caller.

use std::{sync::Arc, time::Duration};

use log::debug;
use tokio::sync::Mutex;

use ledger_fio_apdu::{path::DerivationPath, version::Version};

use crate::{
    interaction::Timeouts, interpreter::interpret, template::Template, values::Values, Error,
    Session, SignedHash, Transport,
};

/// Default timeout for APDU requests
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Default timeout for requests awaiting user interaction
pub const USER_TIMEOUT: Duration = Duration::from_secs(30);

/// FIO handle for a connected device.
///
/// This is generic over [Transport] types to support different
/// underlying transports / simulators
pub struct DeviceHandle<T: Transport> {
    /// Transport for communication
    t: Arc<Mutex<T>>,
    /// Timeout for APDU requests
    request_timeout: Duration,
    /// Timeout for user acknowledgements
    user_timeout: Duration,
}

impl<T: Transport> Clone for DeviceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            t: self.t.clone(),
            request_timeout: self.request_timeout,
            user_timeout: self.user_timeout,
        }
    }
}

/// Create a [DeviceHandle] wrapper from a type implementing [Transport]
impl<T: Transport> From<T> for DeviceHandle<T> {
    fn from(t: T) -> Self {
        Self {
            t: Arc::new(Mutex::new(t)),
            request_timeout: REQUEST_TIMEOUT,
            user_timeout: USER_TIMEOUT,
        }
    }
}

impl<T: Transport + Send> DeviceHandle<T> {
    /// Set the APDU request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the user interaction timeout
    pub fn with_user_timeout(mut self, timeout: Duration) -> Self {
        self.user_timeout = timeout;
        self
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            request: self.request_timeout,
            user: self.user_timeout,
        }
    }

    /// Start a device session, holding the transport until the returned
    /// [Session] is dropped
    pub async fn session(&self) -> Session<'_, T> {
        Session::new(self.t.lock().await, self.timeouts())
    }

    /// Fetch the device application version
    pub async fn app_version(&self) -> Result<Version, Error<T::Error>> {
        debug!("Requesting app version");

        self.session().await.app_version().await
    }

    /// Stream and sign a transaction described by a template and values
    pub async fn sign(
        &self,
        template: &Template,
        values: &Values,
        path: &DerivationPath,
    ) -> Result<SignedHash, Error<T::Error>> {
        let mut s = self.session().await;
        interpret(&mut s, template, values, path).await
    }
}
