// Copyright (c) 2022-2023 The FIO Protocol Developers

use std::{collections::HashMap, str::FromStr};

use async_trait::async_trait;
use log::{debug, LevelFilter};
use simplelog::SimpleLogger;

use ledger_fio::{
    apdu::{status::StatusCode, Header, SignTxOp},
    sim::{Engine, SeedDriver},
    Transport,
};

/// Simulator seed for tests
pub const SEED: [u8; 32] = [0x42; 32];

/// Setup test logging
pub fn setup() {
    let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
        Ok(Ok(l)) => l,
        _ => LevelFilter::Debug,
    };

    let _ = SimpleLogger::init(log_level, simplelog::Config::default());
}

/// Simulator transport recording sent frames and injecting status faults
pub struct FaultTransport {
    pub engine: Engine<SeedDriver>,

    /// Frames passed to the transport, in order
    pub sent: Vec<Header>,

    /// Status to return in place of forwarding the frame at an index
    pub faults: HashMap<usize, StatusCode>,
}

impl FaultTransport {
    pub fn new() -> Self {
        Self::with_driver(SeedDriver::new(&SEED))
    }

    /// Create a transport over a simulator using the provided driver
    pub fn with_driver(driver: SeedDriver) -> Self {
        Self {
            engine: Engine::new(driver),
            sent: vec![],
            faults: HashMap::new(),
        }
    }

    /// Inject a status fault at the provided frame index
    pub fn fault(mut self, index: usize, status: StatusCode) -> Self {
        self.faults.insert(index, status);
        self
    }

    /// Count sent frames for a sub-operation
    pub fn count(&self, op: SignTxOp) -> usize {
        self.sent
            .iter()
            .filter(|h| h.ins != 0 && h.p1 == op as u8)
            .count()
    }

    /// Sub-operations of sent frames, `None` for version requests
    pub fn ops(&self) -> Vec<Option<SignTxOp>> {
        self.sent
            .iter()
            .map(|h| match h.ins {
                0 => None,
                _ => SignTxOp::try_from(h.p1).ok(),
            })
            .collect()
    }
}

#[async_trait]
impl Transport for FaultTransport {
    type Error = std::convert::Infallible;

    async fn send(&mut self, header: Header, payload: &[u8]) -> Result<Vec<u8>, Self::Error> {
        let index = self.sent.len();
        self.sent.push(header);

        if let Some(sw) = self.faults.get(&index) {
            debug!("injecting {sw} at frame {index}");
            return Ok(sw.to_bytes().to_vec());
        }

        Ok(self.engine.exchange(header, payload))
    }
}
