// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Deterministic FIO hardware wallet simulator
//!
//! Implements the device side of the streaming-hash protocol defined in
//! [ledger_fio_apdu], consuming raw command frames and answering with
//! response frames, for testing hosts without hardware.
//!
//! The [Engine] tracks the running transaction hash alongside counted
//! sections and committed loops, rejecting sessions whose structure does not
//! match what the host asserted. Keys and user interaction are provided by a
//! [Driver], see [SeedDriver] for a seed-derived implementation.

mod driver;
pub use driver::{Driver, SeedDriver, SIG_FORMAT_ED25519};

mod engine;
pub use engine::{Engine, State, APP_VERSION, MAX_LOOP_DEPTH, MAX_SECTION_DEPTH};

mod error;
pub use error::Error;

mod event;
pub use event::Event;

mod output;
pub use output::Output;
