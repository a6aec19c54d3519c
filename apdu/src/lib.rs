// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Protocol / APDU definitions for FIO app communication
//!
//! This module provides the protocol definitions and reference encodings for
//! streaming a transaction to a FIO hardware wallet.
//!
//! The device cannot hold a whole transaction, so the host streams it one
//! [field record][field::FieldRecord] at a time while the device keeps a running hash.
//! Structural assertions (counted sections, committed loops) are bracketed by
//! dedicated operations so the device can verify the shape of what it hashed.
//!
//! All operations share the [`Instruction::SignTx`] instruction and select a
//! [`SignTxOp`] via `p1`.
//!
//! Unlike most ledger apps, multi-byte integers on this wire are big-endian,
//! matching the integer body encodings of field records.

#![cfg_attr(not(feature = "std"), no_std)]

pub use ledger_proto::{ApduError, ApduStatic};

pub mod field;
pub mod hash;
pub mod path;
pub mod prelude;
pub mod sign_tx;
pub mod status;
pub mod version;

mod helpers;

/// FIO APDU Class
pub const FIO_APDU_CLA: u8 = 0xd7;

/// Maximum APDU payload length (single-frame transport)
pub const MAX_APDU_PAYLOAD: usize = 255;

/// `p2` value for operations that do not use it
pub const P2_UNUSED: u8 = 0x00;

/// FIO APDU instruction codes
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(u8)]
pub enum Instruction {
    /// Fetch application version
    GetVersion = 0x00,

    /// Streaming transaction hash / sign operations, see [`SignTxOp`]
    SignTx = 0x20,
}

/// Sub-operations of [`Instruction::SignTx`], carried in `p1`
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, strum::Display, num_enum::TryFromPrimitive,
)]
#[repr(u8)]
pub enum SignTxOp {
    /// Start a hashing session
    InitHash = 0x01,

    /// Finalise the session, returning signature and transaction hash
    EndHash = 0x06,

    /// Append a field record to the running hash
    SendData = 0x07,

    /// Append a header/body pair, always displayed
    SendDataDisplay = 0x08,

    /// Open a counted section
    StartCountedSection = 0x09,

    /// Close the innermost counted section
    EndCountedSection = 0x0a,

    /// Open a committed loop
    StartFor = 0x0b,

    /// Close the innermost loop
    EndFor = 0x0c,

    /// Start a loop iteration
    StartIteration = 0x0d,

    /// End a loop iteration
    EndIteration = 0x0e,
}

/// APDU command header
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Header {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}

impl Header {
    /// Header for a [`SignTxOp`] with the provided `p2`
    pub const fn sign_tx(op: SignTxOp, p2: u8) -> Self {
        Self {
            cla: FIO_APDU_CLA,
            ins: Instruction::SignTx as u8,
            p1: op as u8,
            p2,
        }
    }
}

/// Trait for [`Instruction::SignTx`] request APDUs, binding the sub-operation
/// to each request type
pub trait SignTxReq: ApduStatic {
    /// Sub-operation selected by this request
    const OP: SignTxOp;

    /// Expected response length for this request
    const RESP_LEN: usize = 0;

    /// `p2` parameter for this request
    fn param(&self) -> u8 {
        P2_UNUSED
    }

    /// Full command header for this request
    fn header(&self) -> Header {
        Header {
            cla: Self::CLA,
            ins: Self::INS,
            p1: Self::OP as u8,
            p2: self.param(),
        }
    }
}
