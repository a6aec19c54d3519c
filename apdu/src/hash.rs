// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Loop integrity hashing
//!
//! Each loop iteration has a structural hash, computed over the shape of what
//! was streamed inside it (operations, field headers and encodings) but not
//! over field values. The host commits to the set of allowed iteration hashes
//! at [`StartFor`][crate::sign_tx::StartFor] and the device checks each
//! completed iteration against that set.
//!
//! Both sides must compute identical hashes, so the feed is defined here.

use sha2::{Digest as _, Sha256};

use crate::SignTxOp;

/// Iteration / commitment hash
pub type IterHash = [u8; 32];

/// Compute the loop commitment over an ordered set of allowed iteration hashes
pub fn loop_commitment(hashes: &[IterHash]) -> IterHash {
    let mut h = Sha256::new();
    for v in hashes {
        h.update(v);
    }
    h.finalize().into()
}

/// Structural hash of a single loop iteration
///
/// Only the innermost open iteration is fed, a nested loop contributes its
/// [`start_for`][Self::start_for] parameters and [`end_for`][Self::end_for]
/// marker to the enclosing iteration.
#[derive(Clone, Default)]
pub struct IntegrityHasher {
    h: Sha256,
}

impl IntegrityHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a [`SendData`][crate::sign_tx::SendData] field
    pub fn send_data(&mut self, p2: u8, wire_tag: u8, header: &str, storage_action: u8) {
        self.h.update([
            SignTxOp::SendData as u8,
            p2,
            wire_tag,
            header.len() as u8,
        ]);
        self.h.update(header.as_bytes());
        self.h.update([storage_action]);
    }

    /// Add a [`SendDataDisplay`][crate::sign_tx::SendDataDisplay] field
    pub fn send_data_display(&mut self, header: &str) {
        self.h
            .update([SignTxOp::SendDataDisplay as u8, header.len() as u8]);
        self.h.update(header.as_bytes());
    }

    pub fn start_counted_section(&mut self) {
        self.h.update([SignTxOp::StartCountedSection as u8]);
    }

    pub fn end_counted_section(&mut self) {
        self.h.update([SignTxOp::EndCountedSection as u8]);
    }

    /// Add a nested loop header
    pub fn start_for(&mut self, min: u8, max: u8, commitment: &IterHash) {
        self.h.update([SignTxOp::StartFor as u8, min, max]);
        self.h.update(commitment);
    }

    pub fn end_for(&mut self) {
        self.h.update([SignTxOp::EndFor as u8]);
    }

    /// Finalise the iteration hash
    pub fn finalize(self) -> IterHash {
        self.h.finalize().into()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn commitment_is_order_sensitive() {
        let (a, b) = ([0xaa; 32], [0xbb; 32]);

        assert_ne!(loop_commitment(&[a, b]), loop_commitment(&[b, a]));
        assert_eq!(loop_commitment(&[a, b]), loop_commitment(&[a, b]));

        // Empty set commits to sha256("")
        assert_eq!(
            hex::encode(loop_commitment(&[])),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn integrity_covers_shape_only() {
        let mut a = IntegrityHasher::new();
        a.start_counted_section();
        a.send_data(0x02, 155, "actor", 0);
        a.end_counted_section();

        let mut b = a.clone();
        let mut c = IntegrityHasher::new();
        c.start_counted_section();
        c.send_data(0x02, 155, "payer", 0);
        c.end_counted_section();

        assert_eq!(a.finalize(), b.clone().finalize());
        assert_ne!(b.clone().finalize(), c.finalize());

        b.send_data_display("memo");
        assert_ne!(b.finalize(), IntegrityHasher::new().finalize());
    }
}
