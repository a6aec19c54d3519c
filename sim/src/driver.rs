// Copyright (c) 2022-2023 The FIO Protocol Developers

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use log::debug;

use ledger_fio_apdu::{path::DerivationPath, sign_tx::SIGNATURE_LEN};

/// [`Driver`] trait provides platform support (keys and user interaction)
/// for [`Engine`][crate::Engine] instances
pub trait Driver {
    /// Sign a finalised transaction hash with the key at `path`
    fn sign(&self, path: &DerivationPath, hash: &[u8; 32]) -> [u8; SIGNATURE_LEN];

    /// Request user approval of a displayed field
    fn confirm(&mut self, header: &str, value: &str) -> bool;
}

impl<T: Driver> Driver for &mut T {
    fn sign(&self, path: &DerivationPath, hash: &[u8; 32]) -> [u8; SIGNATURE_LEN] {
        T::sign(self, path, hash)
    }

    fn confirm(&mut self, header: &str, value: &str) -> bool {
        T::confirm(self, header, value)
    }
}

/// Signature format byte for ed25519 signatures
pub const SIG_FORMAT_ED25519: u8 = 0x00;

/// [`Driver`] deriving SLIP-0010 ed25519 keys from a fixed seed,
/// approving (or declining) every displayed field and recording
/// what was shown
#[derive(Clone, Debug)]
pub struct SeedDriver {
    seed: Vec<u8>,

    /// Approve displayed fields
    pub approve: bool,

    /// Fields shown to the user, in display order
    pub displayed: Vec<(String, String)>,
}

impl SeedDriver {
    /// Create a new driver using the provided seed
    pub fn new(seed: &[u8]) -> Self {
        Self {
            seed: seed.to_vec(),
            approve: true,
            displayed: Vec::new(),
        }
    }

    /// Decline all displayed fields
    pub fn declining(mut self) -> Self {
        self.approve = false;
        self
    }

    /// Derive the signing key for a path
    fn signing_key(&self, path: &DerivationPath) -> SigningKey {
        let k = slip10_ed25519::derive_ed25519_private_key(&self.seed, path.components());
        SigningKey::from_bytes(&k)
    }

    /// Fetch the verifying key for a path
    pub fn verifying_key(&self, path: &DerivationPath) -> VerifyingKey {
        self.signing_key(path).verifying_key()
    }
}

impl Driver for SeedDriver {
    fn sign(&self, path: &DerivationPath, hash: &[u8; 32]) -> [u8; SIGNATURE_LEN] {
        let sig = self.signing_key(path).sign(hash);

        let mut b = [0u8; SIGNATURE_LEN];
        b[0] = SIG_FORMAT_ED25519;
        b[1..].copy_from_slice(&sig.to_bytes());
        b
    }

    fn confirm(&mut self, header: &str, value: &str) -> bool {
        debug!("display '{header}': '{value}' (approve: {})", self.approve);

        self.displayed.push((header.to_string(), value.to_string()));
        self.approve
    }
}

#[cfg(test)]
mod test {
    use ed25519_dalek::{Signature, Verifier};

    use super::*;

    #[test]
    fn seed_driver_signs() {
        let d = SeedDriver::new(&[0x42; 64]);
        let path = DerivationPath::fio(0, 0);
        let hash = [0x11; 32];

        let sig = d.sign(&path, &hash);
        assert_eq!(sig[0], SIG_FORMAT_ED25519);

        let s = Signature::from_slice(&sig[1..]).unwrap();
        d.verifying_key(&path).verify(&hash, &s).unwrap();

        // Keys are path dependent
        assert_ne!(
            d.verifying_key(&path),
            d.verifying_key(&DerivationPath::fio(0, 1))
        );
    }
}
