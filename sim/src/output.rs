// Copyright (c) 2022-2023 The FIO Protocol Developers

use encdec::Encode;

use ledger_fio_apdu::{
    sign_tx::EndHashResp, status::StatusCode, version::Version, ApduError,
};

/// [`Engine`][super::Engine] outputs (in response to events), encoded to response APDUs
#[derive(Clone, PartialEq, Debug)]
pub enum Output {
    /// Empty response
    None,

    /// Application version
    Version(Version),

    /// Signed transaction hash
    Signed(EndHashResp),
}

impl Output {
    /// Encode output to a response frame with trailing [StatusCode::SUCCESS]
    pub fn to_response(&self) -> Result<Vec<u8>, ApduError> {
        let mut buff = vec![0u8; self.encode_len()?];
        let n = self.encode(&mut buff)?;
        buff.truncate(n);

        buff.extend_from_slice(&StatusCode::SUCCESS.to_bytes());

        Ok(buff)
    }
}

impl Encode for Output {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        match self {
            Output::None => Ok(0),
            Output::Version(v) => v.encode_len(),
            Output::Signed(s) => s.encode_len(),
        }
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        match self {
            Output::None => Ok(0),
            Output::Version(v) => v.encode(buff),
            Output::Signed(s) => s.encode(buff),
        }
    }
}
