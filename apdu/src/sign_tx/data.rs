// Copyright (c) 2022-2023 The FIO Protocol Developers

use encdec::{Decode, Encode};

use crate::{
    field::{FieldError, FieldRecord, DISPLAY, DONT_DISPLAY},
    helpers::lp_str,
    ApduError, ApduStatic, Instruction, SignTxOp, SignTxReq, FIO_APDU_CLA, MAX_APDU_PAYLOAD,
};

/// [`SendDataDisplay`] length prefixes and trailing display flag
const DISPLAY_OVERHEAD: usize = 3;

/// Append a [`FieldRecord`] to the running transaction hash
///
/// The payload is the encoded field record, `p2` selects whether the device
/// displays the field ([`DISPLAY`]) or hashes it silently ([`DONT_DISPLAY`]).
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SendData<'a> {
    /// Render field on the device before accepting it
    pub display: bool,

    /// Field to be hashed
    pub record: FieldRecord<'a>,
}

impl<'a> ApduStatic for SendData<'a> {
    const CLA: u8 = FIO_APDU_CLA;
    const INS: u8 = Instruction::SignTx as u8;
}

impl<'a> SignTxReq for SendData<'a> {
    const OP: SignTxOp = SignTxOp::SendData;

    fn param(&self) -> u8 {
        match self.display {
            true => DISPLAY,
            false => DONT_DISPLAY,
        }
    }
}

impl<'a> SendData<'a> {
    pub fn new(record: FieldRecord<'a>, display: bool) -> Self {
        Self { display, record }
    }

    /// Parse a request from command `p2` and payload
    pub fn parse(p2: u8, buff: &'a [u8]) -> Result<Self, ApduError> {
        let display = match p2 {
            DISPLAY => true,
            DONT_DISPLAY => false,
            _ => return Err(ApduError::InvalidEncoding),
        };

        let (record, n) = FieldRecord::decode(buff)?;
        if n != buff.len() {
            return Err(ApduError::InvalidLength);
        }

        Ok(Self { display, record })
    }
}

impl<'a> Encode for SendData<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        self.record.encode_len()
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        self.record.encode(buff)
    }
}

/// Display a header / body text pair on the device
///
/// Displayed text is shown for approval and bound into the loop integrity
/// hash by header, the body is not part of the transaction hash.
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  HEADER_LEN   |                                               |
/// +-+-+-+-+-+-+-+-+                                               +
/// /                           HEADER...                           /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   BODY_LEN    |                                               |
/// +-+-+-+-+-+-+-+-+                                               +
/// /                            BODY...                            /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     0x01      |
/// +-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SendDataDisplay<'a> {
    pub header: &'a str,
    pub body: &'a str,
}

impl<'a> ApduStatic for SendDataDisplay<'a> {
    const CLA: u8 = FIO_APDU_CLA;
    const INS: u8 = Instruction::SignTx as u8;
}

impl<'a> SignTxReq for SendDataDisplay<'a> {
    const OP: SignTxOp = SignTxOp::SendDataDisplay;
}

impl<'a> SendDataDisplay<'a> {
    /// Create a new display request, the header and body must fit a single APDU
    pub fn new(header: &'a str, body: &'a str) -> Result<Self, FieldError> {
        if header.len() + body.len() + DISPLAY_OVERHEAD > MAX_APDU_PAYLOAD {
            return Err(FieldError::FieldTooLong);
        }

        Ok(Self { header, body })
    }
}

impl<'a> Encode for SendDataDisplay<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        let n = lp_str::enc_len(self.header)? + lp_str::enc_len(self.body)? + 1;
        if n > MAX_APDU_PAYLOAD {
            return Err(ApduError::InvalidLength);
        }
        Ok(n)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if buff.len() < self.encode_len()? {
            return Err(ApduError::InvalidLength);
        }

        let mut index = 0;

        index += lp_str::enc(self.header, &mut buff[index..])?;
        index += lp_str::enc(self.body, &mut buff[index..])?;

        buff[index] = DISPLAY;
        index += 1;

        Ok(index)
    }
}

impl<'a> Decode<'a> for SendDataDisplay<'a> {
    type Output = Self;
    type Error = ApduError;

    fn decode(buff: &'a [u8]) -> Result<(Self::Output, usize), Self::Error> {
        let mut index = 0;

        let (header, n) = lp_str::dec(&buff[index..])?;
        index += n;

        let (body, n) = lp_str::dec(&buff[index..])?;
        index += n;

        match buff.get(index) {
            Some(&DISPLAY) => index += 1,
            Some(_) => return Err(ApduError::InvalidEncoding),
            None => return Err(ApduError::InvalidLength),
        }

        Ok((Self { header, body }, index))
    }
}
