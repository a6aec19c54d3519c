// Copyright (c) 2022-2023 The FIO Protocol Developers

use ledger_fio::{
    apdu::{field::FieldError, path::DerivationPath, status::StatusCode, SignTxOp},
    sim::{SeedDriver, State},
    DeviceHandle, Error,
};

mod helpers;
use helpers::*;

#[tokio::test]
async fn display_text() -> anyhow::Result<()> {
    setup();

    let mut t = FaultTransport::new();
    {
        let h = DeviceHandle::from(&mut t);
        let mut s = h.session().await;

        s.init_hash([0u8; 32]).await?;
        s.send_data_display("Action", "trnsfiopubky").await?;
        s.end_hash(&DerivationPath::fio(0, 0)).await?;
    }

    assert_eq!(t.count(SignTxOp::SendDataDisplay), 1);
    assert_eq!(
        t.engine.driver().displayed,
        vec![("Action".to_string(), "trnsfiopubky".to_string())]
    );
    assert_eq!(t.engine.state(), State::Finalized);

    Ok(())
}

#[tokio::test]
async fn display_declined() -> anyhow::Result<()> {
    setup();

    let mut t = FaultTransport::with_driver(SeedDriver::new(&SEED).declining());
    let r = {
        let h = DeviceHandle::from(&mut t);
        let mut s = h.session().await;

        s.init_hash([0u8; 32]).await?;
        s.send_data_display("Action", "trnsfiopubky").await
    };

    assert!(matches!(r, Err(Error::Device(StatusCode::REJECTED_BY_USER))));
    assert_eq!(t.engine.state(), State::Error);

    Ok(())
}

#[tokio::test]
async fn display_too_long() -> anyhow::Result<()> {
    setup();

    let header = "h".repeat(200);
    let body = "b".repeat(200);

    let mut t = FaultTransport::new();
    let r = {
        let h = DeviceHandle::from(&mut t);
        let mut s = h.session().await;

        s.init_hash([0u8; 32]).await?;
        s.send_data_display(&header, &body).await
    };

    // Rejected before anything is sent, the session remains open
    assert!(matches!(r, Err(Error::Field(FieldError::FieldTooLong))));
    assert_eq!(t.count(SignTxOp::SendDataDisplay), 0);
    assert_eq!(t.engine.state(), State::Hashing);

    // The device refuses oversized frames sent directly
    let mut payload = vec![200u8];
    payload.extend_from_slice(header.as_bytes());
    payload.push(200);
    payload.extend_from_slice(body.as_bytes());
    payload.push(0x01);

    let h = ledger_fio::apdu::Header::sign_tx(SignTxOp::SendDataDisplay, 0);
    let resp = t.engine.exchange(h, &payload);
    assert_eq!(resp, StatusCode::INVALID_DATA.to_bytes().to_vec());

    Ok(())
}
