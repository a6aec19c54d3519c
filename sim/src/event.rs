// Copyright (c) 2022-2023 The FIO Protocol Developers

use encdec::Decode;

use ledger_fio_apdu::{prelude::*, ApduError, MAX_APDU_PAYLOAD, P2_UNUSED};

use crate::Error;

/// [`Engine`][super::Engine] input events, decoded from request APDUs
#[derive(Clone, Debug, PartialEq)]
pub enum Event<'a> {
    /// Fetch application version
    GetVersion,

    /// Start hashing session with the provided context
    InitHash { context: [u8; 32] },

    /// Hash a field record
    SendData { display: bool, record: FieldRecord<'a> },

    /// Display a header / body pair
    SendDataDisplay { header: &'a str, body: &'a str },

    /// Open a counted section
    StartCountedSection { length: u64 },

    /// Close the innermost counted section
    EndCountedSection,

    /// Open a committed loop
    StartFor { min: u8, max: u8, commitment: IterHash },

    /// Start a loop iteration
    StartIteration,

    /// End a loop iteration with the resent allowed hash set
    EndIteration(EndIteration),

    /// Close the innermost loop
    EndFor,

    /// Finalise the session and sign with the key at the provided path
    EndHash { path: DerivationPath },
}

impl<'a> Event<'a> {
    /// Parse an [`Event`] from an APDU header and payload
    pub fn parse(header: &Header, buff: &'a [u8]) -> Result<Self, Error> {
        if header.cla != FIO_APDU_CLA {
            return Err(Error::BadCla);
        }

        // Single frame requests only
        if buff.len() > MAX_APDU_PAYLOAD {
            return Err(Error::InvalidData);
        }

        // Version requests take no sub-operation
        if header.ins == Instruction::GetVersion as u8 {
            if header.p1 != 0 || header.p2 != P2_UNUSED {
                return Err(Error::InvalidParameters);
            }
            decode_exact::<VersionReq>(buff)?;
            return Ok(Event::GetVersion);
        }

        if header.ins != Instruction::SignTx as u8 {
            return Err(Error::UnknownIns);
        }

        let op = SignTxOp::try_from(header.p1).map_err(|_| Error::InvalidParameters)?;

        // Only SendData uses p2
        if op != SignTxOp::SendData && header.p2 != P2_UNUSED {
            return Err(Error::InvalidParameters);
        }

        let evt = match op {
            SignTxOp::InitHash => {
                let r = decode_exact::<InitHash>(buff)?;
                Event::InitHash { context: r.context }
            }
            SignTxOp::SendData => {
                let r = SendData::parse(header.p2, buff).map_err(|e| match header.p2 {
                    DISPLAY | DONT_DISPLAY => Error::from(e),
                    _ => Error::InvalidParameters,
                })?;
                Event::SendData {
                    display: r.display,
                    record: r.record,
                }
            }
            SignTxOp::SendDataDisplay => {
                let (r, n) = SendDataDisplay::decode(buff)?;
                if n != buff.len() {
                    return Err(Error::InvalidData);
                }
                Event::SendDataDisplay {
                    header: r.header,
                    body: r.body,
                }
            }
            SignTxOp::StartCountedSection => {
                let r = decode_exact::<StartCountedSection>(buff)?;
                Event::StartCountedSection { length: r.length }
            }
            SignTxOp::EndCountedSection => {
                decode_exact::<EndCountedSection>(buff)?;
                Event::EndCountedSection
            }
            SignTxOp::StartFor => {
                let r = decode_exact::<StartFor>(buff)?;
                Event::StartFor {
                    min: r.min,
                    max: r.max,
                    commitment: r.commitment,
                }
            }
            SignTxOp::StartIteration => {
                decode_exact::<StartIteration>(buff)?;
                Event::StartIteration
            }
            SignTxOp::EndIteration => Event::EndIteration(decode_exact::<EndIteration>(buff)?),
            SignTxOp::EndFor => {
                decode_exact::<EndFor>(buff)?;
                Event::EndFor
            }
            SignTxOp::EndHash => {
                let r = decode_exact::<EndHash>(buff)?;
                Event::EndHash { path: r.path }
            }
        };

        Ok(evt)
    }

    /// Check whether this event starts a new call (and thus must not
    /// arrive mid-session)
    pub fn is_call_start(&self) -> bool {
        matches!(self, Event::GetVersion | Event::InitHash { .. })
    }
}

/// Decode a request, rejecting trailing bytes
fn decode_exact<'a, T: Decode<'a, Output = T, Error = ApduError>>(
    buff: &'a [u8],
) -> Result<T, Error> {
    let (v, n) = T::decode(buff)?;
    if n != buff.len() {
        return Err(Error::InvalidData);
    }
    Ok(v)
}

#[cfg(test)]
mod test {
    use encdec::Encode;

    use super::*;

    #[test]
    fn parse_events() {
        let h = Header::sign_tx(SignTxOp::StartCountedSection, 0);
        let mut buff = [0u8; 16];
        let n = StartCountedSection::new(42).encode(&mut buff).unwrap();

        assert_eq!(
            Event::parse(&h, &buff[..n]),
            Ok(Event::StartCountedSection { length: 42 })
        );

        let h = Header::sign_tx(SignTxOp::EndFor, 0);
        assert_eq!(Event::parse(&h, &[]), Ok(Event::EndFor));
    }

    #[test]
    fn reject_bad_headers() {
        let h = Header {
            cla: 0xe0,
            ..Header::sign_tx(SignTxOp::EndFor, 0)
        };
        assert_eq!(Event::parse(&h, &[]), Err(Error::BadCla));

        let h = Header {
            ins: 0x02,
            ..Header::sign_tx(SignTxOp::EndFor, 0)
        };
        assert_eq!(Event::parse(&h, &[]), Err(Error::UnknownIns));

        let h = Header {
            p1: 0x02,
            ..Header::sign_tx(SignTxOp::EndFor, 0)
        };
        assert_eq!(Event::parse(&h, &[]), Err(Error::InvalidParameters));

        let h = Header::sign_tx(SignTxOp::EndFor, 0x01);
        assert_eq!(Event::parse(&h, &[]), Err(Error::InvalidParameters));

        // Trailing payload on an empty request
        let h = Header::sign_tx(SignTxOp::StartIteration, 0);
        assert_eq!(Event::parse(&h, &[0x00]), Err(Error::InvalidData));
    }

    #[test]
    fn reject_oversized_payload() {
        // Valid display encoding, but longer than a single APDU
        let mut buff = vec![200u8];
        buff.extend_from_slice(&[b'h'; 200]);
        buff.push(200);
        buff.extend_from_slice(&[b'b'; 200]);
        buff.push(DISPLAY);

        let h = Header::sign_tx(SignTxOp::SendDataDisplay, 0);
        assert_eq!(Event::parse(&h, &buff), Err(Error::InvalidData));

        let (r, n) = SendDataDisplay::decode(&buff).unwrap();
        assert_eq!((r.header.len(), n), (200, buff.len()));
    }
}
