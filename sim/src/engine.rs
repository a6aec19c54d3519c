// Copyright (c) 2022-2023 The FIO Protocol Developers

//! The [Engine] implements the device side of the streaming-hash protocol.
//!
//! This handles [Event] inputs and returns [Output] responses to the caller,
//! see [ledger_fio_apdu] for APDU protocol / encoding definitions.

use heapless::Vec;
use log::{debug, trace, warn};
use sha2::{Digest, Sha256};
use strum::Display;

use ledger_fio_apdu::{
    prelude::*,
    sign_tx::{EndHashResp, TX_HASH_LEN},
    status::StatusCode,
};

use crate::{Driver, Error, Event, Output};

/// Maximum counted section nesting depth
pub const MAX_SECTION_DEPTH: usize = 4;

/// Maximum loop nesting depth
pub const MAX_LOOP_DEPTH: usize = 3;

/// Simulated application version
pub const APP_VERSION: Version = Version::new(0, 3, 0, VersionFlags::empty());

/// Engine internal state enumeration
#[derive(Copy, Clone, PartialEq, Debug, Display)]
pub enum State {
    /// No session running
    Idle,
    /// Hashing session in progress
    Hashing,
    /// Session complete, signature returned
    Finalized,
    /// Session aborted by a rejected request
    Error,
}

/// Open counted section
#[derive(Copy, Clone, PartialEq, Debug)]
struct Section {
    /// Remaining body bytes
    remaining: u64,
    /// Loop depth the section was opened at
    loop_depth: usize,
}

/// Open loop
#[derive(Clone)]
struct Loop {
    min: u8,
    max: u8,
    commitment: IterHash,
    count: u8,
    /// Integrity hasher for the current iteration
    iteration: Option<IntegrityHasher>,
}

/// [Engine] simulates a FIO hardware wallet, consuming raw command frames
/// and enforcing counted-section and loop invariants
pub struct Engine<DRV: Driver> {
    state: State,

    tx_hash: Sha256,

    sections: Vec<Section, MAX_SECTION_DEPTH>,
    loops: Vec<Loop, MAX_LOOP_DEPTH>,

    drv: DRV,
}

impl<DRV: Driver> Engine<DRV> {
    /// Create a new engine instance with the provided driver
    pub fn new(drv: DRV) -> Self {
        Self {
            state: State::Idle,
            tx_hash: Sha256::new(),
            sections: Vec::new(),
            loops: Vec::new(),
            drv,
        }
    }

    /// Fetch current engine state
    pub fn state(&self) -> State {
        self.state
    }

    /// Access the engine driver
    pub fn driver(&self) -> &DRV {
        &self.drv
    }

    /// Mutable access to the engine driver
    pub fn driver_mut(&mut self) -> &mut DRV {
        &mut self.drv
    }

    /// Reset engine state
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.tx_hash = Sha256::new();
        self.sections.clear();
        self.loops.clear();
    }

    /// Handle a raw command frame, returning the response body and
    /// trailing status word
    pub fn exchange(&mut self, header: Header, data: &[u8]) -> std::vec::Vec<u8> {
        trace!("cmd {header:02x?}: {data:02x?}");

        let r = match Event::parse(&header, data) {
            Ok(evt) => self.update(&evt),
            Err(e) => {
                debug!("malformed request: {e}");
                self.abort();
                Err(e)
            }
        };

        let resp = match r.map(|o| o.to_response()) {
            Ok(Ok(v)) => v,
            Ok(Err(_)) => StatusCode::INVALID_DATA.to_bytes().to_vec(),
            Err(e) => StatusCode::from(e).to_bytes().to_vec(),
        };

        trace!("resp: {resp:02x?}");

        resp
    }

    /// Handle incoming events
    pub fn update(&mut self, evt: &Event) -> Result<Output, Error> {
        debug!("event: {:02x?} (state: {})", evt, self.state);

        // A new call mid-session resets the device
        if evt.is_call_start() && self.state == State::Hashing {
            warn!("new call during session, resetting");
            self.reset();
            return Err(Error::StillInCall);
        }

        let r = match evt {
            Event::GetVersion => Ok(Output::Version(APP_VERSION)),
            Event::InitHash { context } => {
                self.init_hash(context);
                Ok(Output::None)
            }
            _ if self.state != State::Hashing => Err(Error::InvalidState),
            Event::SendData { display, record } => {
                self.send_data(*display, record).map(|_| Output::None)
            }
            Event::SendDataDisplay { header, body } => {
                self.send_data_display(header, body).map(|_| Output::None)
            }
            Event::StartCountedSection { length } => {
                self.start_counted_section(*length).map(|_| Output::None)
            }
            Event::EndCountedSection => self.end_counted_section().map(|_| Output::None),
            Event::StartFor {
                min,
                max,
                commitment,
            } => self.start_for(*min, *max, commitment).map(|_| Output::None),
            Event::StartIteration => self.start_iteration().map(|_| Output::None),
            Event::EndIteration(r) => self.end_iteration(r).map(|_| Output::None),
            Event::EndFor => self.end_for().map(|_| Output::None),
            Event::EndHash { path } => self.end_hash(path).map(Output::Signed),
        };

        // Any rejection aborts the session
        if let Err(e) = &r {
            debug!("rejected: {e}");
            self.abort();
        }

        r
    }

    /// Abort a running session
    fn abort(&mut self) {
        if self.state == State::Hashing {
            self.state = State::Error;
        }
    }

    fn init_hash(&mut self, context: &[u8; 32]) {
        self.reset();

        // Context always prefixes the transaction hash
        self.tx_hash.update(context);

        self.state = State::Hashing;
    }

    /// Fetch the integrity hasher for the innermost open iteration, failing
    /// if a loop is open outside of an iteration
    fn iteration(&mut self) -> Result<Option<&mut IntegrityHasher>, Error> {
        match self.loops.last_mut() {
            None => Ok(None),
            Some(Loop {
                iteration: Some(h), ..
            }) => Ok(Some(h)),
            Some(_) => Err(Error::InvalidState),
        }
    }

    fn send_data(&mut self, display: bool, record: &FieldRecord) -> Result<(), Error> {
        let body_len = record.body.len() as u64;

        // Update counted sections, every open section counts every body
        if self.sections.iter().any(|s| s.remaining < body_len) {
            return Err(Error::InvalidData);
        }
        for s in self.sections.iter_mut() {
            s.remaining -= body_len;
        }

        // Update integrity hash
        let p2 = match display {
            true => DISPLAY,
            false => DONT_DISPLAY,
        };
        if let Some(h) = self.iteration()? {
            h.send_data(
                p2,
                record.encoding.wire_tag(),
                record.header,
                record.storage_action,
            );
        }

        // Update transaction hash, integers are big-endian on the wire
        // and little-endian in the serialized transaction
        let value = decode_value(record)?;
        match value {
            Value::Uint(v) => {
                let b = v.to_le_bytes();
                self.tx_hash.update(&b[..record.body.len()]);
            }
            Value::Text(_) | Value::Bytes => self.tx_hash.update(record.body),
        }

        if display && !self.drv.confirm(record.header, &value.display(record.body)) {
            return Err(Error::RejectedByUser);
        }

        Ok(())
    }

    fn send_data_display(&mut self, header: &str, body: &str) -> Result<(), Error> {
        if let Some(h) = self.iteration()? {
            h.send_data_display(header);
        }

        match self.drv.confirm(header, body) {
            true => Ok(()),
            false => Err(Error::RejectedByUser),
        }
    }

    fn start_counted_section(&mut self, length: u64) -> Result<(), Error> {
        let loop_depth = self.loops.len();

        if let Some(h) = self.iteration()? {
            h.start_counted_section();
        }

        self.sections
            .push(Section {
                remaining: length,
                loop_depth,
            })
            .map_err(|_| Error::InvalidState)
    }

    fn end_counted_section(&mut self) -> Result<(), Error> {
        // Sections must close within the iteration they were opened in
        match self.sections.last() {
            Some(s) if s.loop_depth == self.loops.len() => (),
            _ => return Err(Error::InvalidState),
        }

        if let Some(h) = self.iteration()? {
            h.end_counted_section();
        }

        match self.sections.pop() {
            Some(s) if s.remaining == 0 => Ok(()),
            Some(s) => {
                debug!("counted section under-run ({} bytes remaining)", s.remaining);
                Err(Error::InvalidData)
            }
            None => Err(Error::InvalidState),
        }
    }

    fn start_for(&mut self, min: u8, max: u8, commitment: &IterHash) -> Result<(), Error> {
        if min > max {
            return Err(Error::InvalidData);
        }

        // Nested loops are bound into the enclosing iteration
        if let Some(h) = self.iteration()? {
            h.start_for(min, max, commitment);
        }

        self.loops
            .push(Loop {
                min,
                max,
                commitment: *commitment,
                count: 0,
                iteration: None,
            })
            .map_err(|_| Error::InvalidState)
    }

    fn start_iteration(&mut self) -> Result<(), Error> {
        match self.loops.last_mut() {
            Some(l) if l.iteration.is_none() => {
                l.iteration = Some(IntegrityHasher::new());
                Ok(())
            }
            _ => Err(Error::InvalidState),
        }
    }

    fn end_iteration(&mut self, resent: &EndIteration) -> Result<(), Error> {
        let depth = self.loops.len();
        if self.sections.last().map(|s| s.loop_depth) == Some(depth) {
            return Err(Error::InvalidState);
        }

        let l = match self.loops.last_mut() {
            Some(l) => l,
            None => return Err(Error::InvalidState),
        };

        let h = match l.iteration.take() {
            Some(h) => h.finalize(),
            None => return Err(Error::InvalidState),
        };

        // Resent hash set must match the loop commitment
        if resent.commitment() != l.commitment {
            debug!("allowed hash set does not match loop commitment");
            return Err(Error::HashNotAllowed);
        }

        // And contain this iteration
        if !resent.contains(&h) {
            debug!("iteration hash {} not allowed", hex::encode(h));
            return Err(Error::HashNotAllowed);
        }

        l.count = l.count.checked_add(1).ok_or(Error::InvalidData)?;

        Ok(())
    }

    fn end_for(&mut self) -> Result<(), Error> {
        match self.loops.last() {
            Some(l) if l.iteration.is_none() => {
                if l.count < l.min || l.count > l.max {
                    debug!(
                        "loop iteration count {} outside [{}, {}]",
                        l.count, l.min, l.max
                    );
                    return Err(Error::InvalidData);
                }
            }
            _ => return Err(Error::InvalidState),
        }

        self.loops.pop();

        if let Some(h) = self.iteration()? {
            h.end_for();
        }

        Ok(())
    }

    fn end_hash(&mut self, path: &DerivationPath) -> Result<EndHashResp, Error> {
        if !self.sections.is_empty() || !self.loops.is_empty() {
            return Err(Error::InvalidState);
        }

        if !is_fio_path(path) {
            return Err(Error::InvalidPath);
        }

        // Context free data extension and digest
        let mut h = core::mem::take(&mut self.tx_hash);
        h.update([0u8]);
        h.update([0u8; 32]);

        let tx_hash: [u8; TX_HASH_LEN] = h.finalize().into();
        let signature = self.drv.sign(path, &tx_hash);

        debug!("signed tx hash {} with {path}", hex::encode(tx_hash));

        self.state = State::Finalized;

        Ok(EndHashResp::new(signature, tx_hash))
    }
}

/// Check a path is within the FIO key space (`44'/235'/account'/change/index`)
fn is_fio_path(path: &DerivationPath) -> bool {
    let c = path.components();

    c[0] == 44 | HARDENED
        && c[1] == 235 | HARDENED
        && c[2] & HARDENED != 0
        && c[3] & HARDENED == 0
        && c[4] & HARDENED == 0
}

/// Decoded field value
enum Value<'a> {
    Uint(u64),
    Text(&'a str),
    Bytes,
}

impl<'a> Value<'a> {
    /// Render value for display
    fn display(&self, body: &[u8]) -> String {
        match self {
            Value::Uint(v) => format!("{v}"),
            Value::Text(s) => s.to_string(),
            Value::Bytes => hex::encode(body),
        }
    }
}

fn decode_value<'a>(record: &FieldRecord<'a>) -> Result<Value<'a>, Error> {
    let b = record.body;

    let v = match record.encoding {
        Encoding::Uint8 | Encoding::Uint16 | Encoding::Uint32 | Encoding::Uint64 => {
            let mut v = [0u8; 8];
            v[8 - b.len()..].copy_from_slice(b);
            Value::Uint(u64::from_be_bytes(v))
        }
        Encoding::String => {
            let s = core::str::from_utf8(b).map_err(|_| Error::InvalidData)?;
            Value::Text(s)
        }
        Encoding::Hex => Value::Bytes,
        Encoding::Datetime => return Err(Error::InvalidData),
    };

    Ok(v)
}

#[cfg(test)]
mod test {
    use ed25519_dalek::{Signature, Verifier};
    use encdec::Encode;

    use ledger_fio_apdu::{sign_tx::EndHashResp, ApduError};

    use super::*;
    use crate::SeedDriver;

    fn setup() -> Engine<SeedDriver> {
        let _ = simplelog::SimpleLogger::init(log::LevelFilter::Debug, Default::default());
        Engine::new(SeedDriver::new(&[0x42; 64]))
    }

    /// Send a request, returning the response status and body
    fn send<R: SignTxReq + Encode<Error = ApduError>>(
        e: &mut Engine<SeedDriver>,
        req: &R,
    ) -> (StatusCode, std::vec::Vec<u8>) {
        let mut buff = [0u8; 256];
        let n = req.encode(&mut buff).unwrap();

        let resp = e.exchange(req.header(), &buff[..n]);
        let (body, sw) = StatusCode::split(&resp).unwrap();

        (sw, body.to_vec())
    }

    fn field<'a>(encoding: Encoding, header: &'a str, body: &'a [u8]) -> SendData<'a> {
        SendData::new(
            FieldRecord::new(encoding, header, STORAGE_NONE, body).unwrap(),
            false,
        )
    }

    #[test]
    fn version_and_still_in_call() {
        let mut e = setup();

        let v = e.exchange(Header { cla: FIO_APDU_CLA, ..Default::default() }, &[]);
        assert_eq!(v, vec![0, 3, 0, 0, 0x90, 0x00]);

        assert_eq!(send(&mut e, &InitHash::default()).0, StatusCode::SUCCESS);
        assert_eq!(e.state(), State::Hashing);

        // New call mid-session resets the device
        let v = e.exchange(Header { cla: FIO_APDU_CLA, ..Default::default() }, &[]);
        assert_eq!(v, StatusCode::STILL_IN_CALL.to_bytes().to_vec());
        assert_eq!(e.state(), State::Idle);
    }

    #[test]
    fn requests_require_session() {
        let mut e = setup();

        assert_eq!(send(&mut e, &StartIteration).0, StatusCode::INVALID_STATE);
        assert_eq!(
            send(&mut e, &EndHash::new(DerivationPath::fio(0, 0))).0,
            StatusCode::INVALID_STATE
        );
    }

    #[test]
    fn counted_section_underrun() {
        let mut e = setup();

        send(&mut e, &InitHash::default());
        assert_eq!(
            send(&mut e, &StartCountedSection::new(3)).0,
            StatusCode::SUCCESS
        );
        assert_eq!(
            send(&mut e, &field(Encoding::Uint16, "fee", &[0, 1])).0,
            StatusCode::SUCCESS
        );
        assert_eq!(
            send(&mut e, &EndCountedSection).0,
            StatusCode::INVALID_DATA
        );

        // Session is aborted
        assert_eq!(e.state(), State::Error);
        assert_eq!(
            send(&mut e, &field(Encoding::Uint8, "a", &[1])).0,
            StatusCode::INVALID_STATE
        );
    }

    #[test]
    fn counted_section_overrun() {
        let mut e = setup();

        send(&mut e, &InitHash::default());
        send(&mut e, &StartCountedSection::new(10));
        send(&mut e, &StartCountedSection::new(2));

        // Nested sections count the same bytes
        assert_eq!(
            send(&mut e, &field(Encoding::Uint16, "a", &[0, 1])).0,
            StatusCode::SUCCESS
        );
        assert_eq!(
            send(&mut e, &field(Encoding::Uint8, "b", &[1])).0,
            StatusCode::INVALID_DATA
        );
    }

    #[test]
    fn counted_section_depth() {
        let mut e = setup();

        send(&mut e, &InitHash::default());
        for _ in 0..MAX_SECTION_DEPTH {
            assert_eq!(
                send(&mut e, &StartCountedSection::new(0)).0,
                StatusCode::SUCCESS
            );
        }
        assert_eq!(
            send(&mut e, &StartCountedSection::new(0)).0,
            StatusCode::INVALID_STATE
        );
    }

    #[test]
    fn loop_depth() {
        let mut e = setup();
        let allowed = [[0x11; 32]];

        send(&mut e, &InitHash::default());
        for _ in 0..MAX_LOOP_DEPTH {
            assert_eq!(
                send(&mut e, &StartFor::new(1, 1, &allowed).unwrap()).0,
                StatusCode::SUCCESS
            );
            assert_eq!(send(&mut e, &StartIteration).0, StatusCode::SUCCESS);
        }
        assert_eq!(
            send(&mut e, &StartFor::new(1, 1, &allowed).unwrap()).0,
            StatusCode::INVALID_STATE
        );
        assert_eq!(e.state(), State::Error);
    }

    fn iteration_hash() -> IterHash {
        let mut h = IntegrityHasher::new();
        h.send_data(DONT_DISPLAY, Encoding::Hex as u8, "actor", STORAGE_NONE);
        h.finalize()
    }

    fn run_loop(e: &mut Engine<SeedDriver>, allowed: &[IterHash], iterations: usize) -> StatusCode {
        send(e, &InitHash::default());
        send(e, &StartFor::new(1, 2, allowed).unwrap());

        for _ in 0..iterations {
            send(e, &StartIteration);
            send(e, &field(Encoding::Hex, "actor", &[0xaa; 8]));

            let (sw, _) = send(e, &EndIteration::new(allowed).unwrap());
            if !sw.is_success() {
                return sw;
            }
        }

        send(e, &EndFor).0
    }

    #[test]
    fn loop_allowed_iteration() {
        let mut e = setup();
        assert_eq!(
            run_loop(&mut e, &[[0x01; 32], iteration_hash()], 2),
            StatusCode::SUCCESS
        );
    }

    #[test]
    fn loop_iteration_not_allowed() {
        let mut e = setup();
        assert_eq!(
            run_loop(&mut e, &[[0x01; 32]], 1),
            StatusCode::HASH_NOT_ALLOWED
        );
        assert_eq!(e.state(), State::Error);
    }

    #[test]
    fn loop_commitment_mismatch() {
        let mut e = setup();
        let allowed = [iteration_hash()];

        send(&mut e, &InitHash::default());
        send(&mut e, &StartFor::new(1, 1, &allowed).unwrap());
        send(&mut e, &StartIteration);
        send(&mut e, &field(Encoding::Hex, "actor", &[0xaa; 8]));

        // Resent set differs from the committed one
        let resent = EndIteration::new(&[allowed[0], [0x02; 32]]).unwrap();
        assert_eq!(send(&mut e, &resent).0, StatusCode::HASH_NOT_ALLOWED);
    }

    #[test]
    fn loop_bounds() {
        let mut e = setup();
        let allowed = [iteration_hash()];

        assert_eq!(run_loop(&mut e, &allowed, 0), StatusCode::INVALID_DATA);
        assert_eq!(run_loop(&mut e, &allowed, 3), StatusCode::INVALID_DATA);
    }

    #[test]
    fn end_hash_signs() {
        let mut e = setup();
        let path = DerivationPath::fio(0, 0);

        send(&mut e, &InitHash::default());
        send(&mut e, &field(Encoding::Uint16, "ref_block_num", &[0x12, 0x34]));
        send(&mut e, &field(Encoding::String, "tpid", b"fio@x"));

        let (sw, body) = send(&mut e, &EndHash::new(path));
        assert_eq!(sw, StatusCode::SUCCESS);
        assert_eq!(body.len(), EndHash::RESP_LEN);

        let r = EndHashResp {
            signature: body[..65].try_into().unwrap(),
            tx_hash: body[65..].try_into().unwrap(),
        };

        // Context, then integers hashed little-endian, then the extension
        let mut h = Sha256::new();
        h.update([0u8; 32]);
        h.update([0x34u8, 0x12]);
        h.update(b"fio@x");
        h.update([0u8; 33]);
        assert_eq!(r.tx_hash, <[u8; 32]>::from(h.finalize()));

        let s = Signature::from_slice(&r.signature[1..]).unwrap();
        e.driver()
            .verifying_key(&path)
            .verify(&r.tx_hash, &s)
            .unwrap();

        assert_eq!(e.state(), State::Finalized);
    }

    #[test]
    fn init_hash_context() {
        let mut e = setup();
        let path = DerivationPath::fio(0, 0);

        let mut hashes = std::vec::Vec::new();
        for context in [[0u8; 32], [0xb2; 32]] {
            send(&mut e, &InitHash::new(context));
            let (sw, body) = send(&mut e, &EndHash::new(path));
            assert_eq!(sw, StatusCode::SUCCESS);

            let mut h = Sha256::new();
            h.update(context);
            h.update([0u8; 33]);
            assert_eq!(&body[65..], &h.finalize()[..]);

            hashes.push(body[65..].to_vec());
        }

        assert_ne!(hashes[0], hashes[1]);
    }

    #[test]
    fn end_hash_checks() {
        let mut e = setup();

        send(&mut e, &InitHash::default());
        send(&mut e, &StartCountedSection::new(0));
        assert_eq!(
            send(&mut e, &EndHash::new(DerivationPath::fio(0, 0))).0,
            StatusCode::INVALID_STATE
        );

        send(&mut e, &InitHash::default());
        let path = DerivationPath::new([44 | HARDENED, 60 | HARDENED, HARDENED, 0, 0]);
        assert_eq!(
            send(&mut e, &EndHash::new(path)).0,
            StatusCode::INVALID_BIP_PATH
        );
    }

    #[test]
    fn displayed_fields() {
        let mut e = setup();
        let amount = 20u64.to_be_bytes();

        send(&mut e, &InitHash::default());
        let req = SendData::new(
            FieldRecord::new(Encoding::Uint64, "amount", STORAGE_NONE, &amount).unwrap(),
            true,
        );
        assert_eq!(send(&mut e, &req).0, StatusCode::SUCCESS);
        assert_eq!(
            send(&mut e, &SendDataDisplay::new("Action", "trnsfiopubky").unwrap()).0,
            StatusCode::SUCCESS
        );

        assert_eq!(
            e.driver().displayed,
            vec![
                ("amount".to_string(), "20".to_string()),
                ("Action".to_string(), "trnsfiopubky".to_string())
            ]
        );

        // Declined fields abort the session
        e.driver_mut().approve = false;
        assert_eq!(send(&mut e, &req).0, StatusCode::REJECTED_BY_USER);
        assert_eq!(e.state(), State::Error);
    }
}
