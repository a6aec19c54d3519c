// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Ledger FIO API Library (and CLI)
//!
//! Streams transactions to a FIO hardware wallet field by field while the
//! device maintains a running hash, then fetches the signed hash.
//!
//! - [DeviceHandle] serialises access to a [Transport]
//! - [Session] exposes the streaming-hash primitives
//! - [interpret] drives a session from a declarative [Template][template::Template]
//!   and a [Values][values::Values] dictionary

// async traits not yet safe to use
// see https://github.com/rust-lang/rust/issues/91611
// #![feature(async_fn_in_trait)]

/// Re-export `ledger-fio-apdu` for consumers
pub use ledger_fio_apdu::{self as apdu};

/// Re-export `ledger-fio-sim` for consumers
#[cfg(feature = "sim")]
pub use ledger_fio_sim as sim;

pub mod transport;
pub use transport::Transport;

pub mod interaction;

mod handle;
pub use handle::{DeviceHandle, REQUEST_TIMEOUT, USER_TIMEOUT};

mod session;
pub use session::{Session, SignedHash, Witness};

mod error;
pub use error::Error;

pub mod field;

pub mod template;

pub mod values;

mod interpreter;
pub use interpreter::interpret;
