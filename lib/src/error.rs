// Copyright (c) 2022-2023 The FIO Protocol Developers

use core::fmt::Debug;
use std::fmt::Display;

use ledger_fio_apdu::{
    field::FieldError, status::StatusCode, version::Version, ApduError,
};

/// Ledger FIO API Error Type, generic over transport errors
#[derive(Debug, thiserror::Error)]
pub enum Error<E: Display + Debug> {
    /// Transport error, passed through unchanged
    #[error("Transport error {0}")]
    Transport(E),

    /// Device rejected a request with the provided status
    #[error("Device error {0}")]
    Device(StatusCode),

    /// Field could not be encoded
    #[error("Invalid field: {0}")]
    Field(#[from] FieldError),

    /// Request could not be encoded
    #[error("APDU encoding failed: {0:?}")]
    Encoding(ApduError),

    /// Timeout waiting for device response
    #[error("Timeout waiting for device response")]
    RequestTimeout,

    /// Timeout waiting for user interaction
    #[error("Timeout waiting for user interaction")]
    UserTimeout,

    /// Unexpected APDU response
    #[error("Unexpected APDU response")]
    UnexpectedResponse,

    /// Device application version is not supported
    #[error("Unsupported app version {0}")]
    UnsupportedVersion(Version),

    /// Value missing from the values dictionary
    #[error("Missing value for '{0}'")]
    MissingValue(String),

    /// Value present but of the wrong shape
    #[error("Invalid value for '{0}'")]
    InvalidValue(String),

    /// Malformed template
    #[error("Invalid template: {0}")]
    Template(String),
}

impl<E: Display + Debug> Error<E> {
    /// Fetch the device status for [Error::Device] errors
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Device(sw) => Some(*sw),
            _ => None,
        }
    }
}

impl<E: Display + Debug> From<ApduError> for Error<E> {
    fn from(e: ApduError) -> Self {
        Error::Encoding(e)
    }
}

impl<E: Display + Debug> From<crate::values::ValueError> for Error<E> {
    fn from(e: crate::values::ValueError) -> Self {
        use crate::values::ValueError;

        match e {
            ValueError::Missing(k) => Error::MissingValue(k),
            ValueError::Invalid(k) => Error::InvalidValue(k),
        }
    }
}
