// Copyright (c) 2022-2023 The FIO Protocol Developers

use ledger_fio_apdu::{status::StatusCode, ApduError};

/// [Engine][crate::Engine] errors, each reported to the host as a [StatusCode]
#[derive(Copy, Clone, PartialEq, Debug, thiserror::Error)]
pub enum Error {
    /// Unsupported APDU class
    #[error("bad class")]
    BadCla,

    /// Unsupported instruction
    #[error("unknown instruction")]
    UnknownIns,

    /// Unknown sub-operation or unexpected `p2`
    #[error("invalid request parameters")]
    InvalidParameters,

    /// Request not valid in the current engine state
    #[error("invalid engine state")]
    InvalidState,

    /// Malformed payload, or section / loop bound violation
    #[error("invalid data")]
    InvalidData,

    /// Derivation path outside the FIO key space
    #[error("invalid derivation path")]
    InvalidPath,

    /// Displayed field was declined
    #[error("rejected by user")]
    RejectedByUser,

    /// Loop commitment or iteration hash mismatch
    #[error("hash not allowed")]
    HashNotAllowed,

    /// A new call started while a session was in progress, session state
    /// has been reset
    #[error("still in call")]
    StillInCall,
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::BadCla => StatusCode::BAD_CLA,
            Error::UnknownIns => StatusCode::UNKNOWN_INS,
            Error::InvalidParameters => StatusCode::INVALID_REQUEST_PARAMETERS,
            Error::InvalidState => StatusCode::INVALID_STATE,
            Error::InvalidData => StatusCode::INVALID_DATA,
            Error::InvalidPath => StatusCode::INVALID_BIP_PATH,
            Error::RejectedByUser => StatusCode::REJECTED_BY_USER,
            Error::HashNotAllowed => StatusCode::HASH_NOT_ALLOWED,
            Error::StillInCall => StatusCode::STILL_IN_CALL,
        }
    }
}

impl From<ApduError> for Error {
    fn from(_: ApduError) -> Self {
        Error::InvalidData
    }
}
