// Copyright (c) 2022-2023 The FIO Protocol Developers

use byteorder::{BigEndian, ByteOrder};
use encdec::{Decode, DecodeOwned, Encode};

use crate::{ApduError, ApduStatic, Instruction, SignTxOp, SignTxReq, FIO_APDU_CLA};

/// Register index, the nested protocol tracks sections on a stack
/// and always uses register zero
pub const SECTION_REGISTER: u8 = 0;

/// Open a counted section, asserting the total body length of every
/// [`SendData`][super::SendData] until the matching [`EndCountedSection`]
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   REGISTER    |                                               |
/// +-+-+-+-+-+-+-+-+                                               +
/// |                   SECTION_LENGTH (u64, BE)                    |
/// +               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |               |     0x00      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct StartCountedSection {
    /// Expected total body length
    pub length: u64,
}

sign_tx_req!(StartCountedSection, StartCountedSection);

impl StartCountedSection {
    /// Encoded request length
    pub const LEN: usize = 10;

    pub fn new(length: u64) -> Self {
        Self { length }
    }
}

impl Encode for StartCountedSection {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(Self::LEN)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if buff.len() < Self::LEN {
            return Err(ApduError::InvalidLength);
        }

        buff[0] = SECTION_REGISTER;
        BigEndian::write_u64(&mut buff[1..9], self.length);
        buff[9] = 0;

        Ok(Self::LEN)
    }
}

impl DecodeOwned for StartCountedSection {
    type Output = Self;

    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < Self::LEN {
            return Err(ApduError::InvalidLength);
        }

        if buff[0] != SECTION_REGISTER || buff[9] != 0 {
            return Err(ApduError::InvalidEncoding);
        }

        let length = BigEndian::read_u64(&buff[1..9]);

        Ok((Self { length }, Self::LEN))
    }
}

/// Close the innermost counted section (0 length APDU)
#[derive(Copy, Clone, PartialEq, Debug, Encode, Decode)]
#[encdec(error = "ApduError")]
pub struct EndCountedSection;

sign_tx_req!(EndCountedSection, EndCountedSection);

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::encode_decode_apdu;

    #[test]
    fn start_counted_section_apdu() {
        let apdu = StartCountedSection::new(0x0102);

        let mut buff = [0u8; 32];
        let n = encode_decode_apdu(&mut buff, &apdu);

        assert_eq!(&buff[..n], &[0, 0, 0, 0, 0, 0, 0, 0x01, 0x02, 0]);
        assert_eq!(apdu.header().p1, 0x09);
    }

    #[test]
    fn start_counted_section_register() {
        let buff = [1, 0, 0, 0, 0, 0, 0, 0, 4, 0];
        assert!(StartCountedSection::decode(&buff).is_err());
    }

    #[test]
    fn end_counted_section_apdu() {
        let mut buff = [0u8; 8];
        let n = encode_decode_apdu(&mut buff, &EndCountedSection);

        assert_eq!(n, 0);
        assert_eq!(EndCountedSection.header().p1, 0x0a);
    }
}
