//! Prelude to simplify downstream use of APDU objects
//!

pub use crate::{
    field::{Encoding, FieldError, FieldRecord, DISPLAY, DONT_DISPLAY, STORAGE_NONE},
    hash::{loop_commitment, IntegrityHasher, IterHash},
    path::{DerivationPath, PathError, HARDENED},
    sign_tx::{
        EndCountedSection, EndFor, EndHash, EndHashResp, EndIteration, InitHash, SendData,
        SendDataDisplay, StartCountedSection, StartFor, StartIteration, MAX_ITER_HASHES,
    },
    status::StatusCode,
    version::{Version, VersionFlags, VersionReq},
    Header, Instruction, SignTxOp, SignTxReq, FIO_APDU_CLA,
};
