// Copyright (c) 2022-2023 The FIO Protocol Developers

use ledger_fio::{
    apdu::{field::Encoding, path::DerivationPath, status::StatusCode, SignTxOp},
    sim::State,
    template::Template,
    values::Values,
    DeviceHandle, Error,
};

mod helpers;
use helpers::*;

const TEMPLATE: &str = r#"{ "instructions": [
    { "name": "INIT_HASH", "params": {} },
    { "name": "SEND_DATA", "params": { "header": "amount", "value": "20", "encoding": "UINT64" } },
    { "name": "SEND_DATA", "params": { "header": "tpid", "value": "rewards@wallet", "encoding": "STRING" } },
    { "name": "END_HASH", "params": {} }
] }"#;

#[tokio::test]
async fn retry_first_frame() -> anyhow::Result<()> {
    setup();

    let template = Template::from_json(TEMPLATE)?;

    let mut t = FaultTransport::new().fault(0, StatusCode::STILL_IN_CALL);
    DeviceHandle::from(&mut t)
        .sign(&template, &Values::new(), &DerivationPath::fio(0, 0))
        .await?;

    // Version request resent once, then the session completes
    assert_eq!(t.sent[0], t.sent[1]);
    assert_eq!(t.ops()[..3], [None, None, Some(SignTxOp::InitHash)]);
    assert_eq!(t.sent.len(), 6);

    Ok(())
}

#[tokio::test]
async fn retry_once() -> anyhow::Result<()> {
    setup();

    let template = Template::from_json(TEMPLATE)?;

    let mut t = FaultTransport::new()
        .fault(0, StatusCode::STILL_IN_CALL)
        .fault(1, StatusCode::STILL_IN_CALL);
    let r = DeviceHandle::from(&mut t)
        .sign(&template, &Values::new(), &DerivationPath::fio(0, 0))
        .await;

    assert!(matches!(r, Err(Error::Device(StatusCode::STILL_IN_CALL))));
    assert_eq!(t.sent.len(), 2);

    Ok(())
}

#[tokio::test]
async fn no_retry_mid_session() -> anyhow::Result<()> {
    setup();

    let template = Template::from_json(TEMPLATE)?;

    // Fault the first SendData frame
    let mut t = FaultTransport::new().fault(2, StatusCode::STILL_IN_CALL);
    let r = DeviceHandle::from(&mut t)
        .sign(&template, &Values::new(), &DerivationPath::fio(0, 0))
        .await;

    assert!(matches!(r, Err(Error::Device(StatusCode::STILL_IN_CALL))));
    assert_eq!(t.sent.len(), 3);
    assert_eq!(t.count(SignTxOp::SendData), 1);

    Ok(())
}

#[tokio::test]
async fn recover_abandoned_session() -> anyhow::Result<()> {
    setup();

    let template = Template::from_json(TEMPLATE)?;
    let mut t = FaultTransport::new();

    {
        let h = DeviceHandle::from(&mut t);

        // Start a session and abandon it mid-stream
        let mut s = h.session().await;
        s.init_hash([0u8; 32]).await?;
        s.send_data("amount", "20", Encoding::Uint64, false, 0)
            .await?;
        drop(s);

        // The next call is answered with STILL_IN_CALL, retried, and completes
        h.sign(&template, &Values::new(), &DerivationPath::fio(0, 0))
            .await?;
    }

    assert_eq!(t.engine.state(), State::Finalized);
    assert_eq!(t.sent[3], t.sent[4]);

    Ok(())
}
