// Copyright (c) 2022-2023 The FIO Protocol Developers

use serde_json::json;

use ledger_fio::{
    apdu::{hash::IterHash, path::DerivationPath, status::StatusCode, SignTxOp},
    template::Template,
    values::Values,
    DeviceHandle, Error,
};

mod helpers;
use helpers::*;

/// Template with a two iteration loop, each iteration holding a nested loop
const TEMPLATE: &str = r#"{ "instructions": [
    { "name": "INIT_HASH", "params": {} },
    { "name": "FOR", "id": "actions", "params": { "min_iterations": 1, "max_iterations": 10 },
      "iterations": [
        { "name": "first", "instructions": [
            { "name": "SEND_DATA", "params": { "header": "actor", "encoding": "HEX" } },
            { "name": "FOR", "id": "auths", "params": { "min_iterations": 1, "max_iterations": 2 },
              "iterations": [
                { "name": "auth", "instructions": [
                    { "name": "SEND_DATA", "params": { "header": "permission", "encoding": "HEX" } }
                ] }
              ] }
        ] },
        { "name": "second", "instructions": [
            { "name": "START_COUNTED_SECTION", "params": { "expected_length": 8 } },
            { "name": "SEND_DATA", "params": { "header": "amount", "encoding": "UINT64", "display": true } },
            { "name": "END_COUNTED_SECTION" }
        ] }
      ] },
    { "name": "END_HASH", "params": {} }
] }"#;

fn values(allowed: Option<Vec<String>>) -> Values {
    values_with(allowed, None)
}

/// Values with optional allowed hashes for the outer and nested loops
fn values_with(allowed: Option<Vec<String>>, auths_allowed: Option<Vec<String>>) -> Values {
    let mut actions = json!({
        "first": {
            "actor": "b0ae0a8c5d6e4f30",
            "iterations#auths": {
                "auth": { "permission": "00000000a8ed3232" }
            }
        },
        "second": { "amount": 20 }
    });

    if let Some(a) = allowed {
        actions["allowed_iter_hashes"] = json!(a);
    }
    if let Some(a) = auths_allowed {
        actions["first"]["iterations#auths"]["allowed_iter_hashes"] = json!(a);
    }

    serde_json::from_value(json!({ "iterations#actions": actions })).unwrap()
}

#[tokio::test]
async fn nested_loops() -> anyhow::Result<()> {
    setup();

    let template = Template::from_json(TEMPLATE)?;

    let mut t = FaultTransport::new();
    DeviceHandle::from(&mut t)
        .sign(&template, &values(None), &DerivationPath::fio(0, 0))
        .await?;

    // Each loop opens and closes once, once per iteration for nested loops
    assert_eq!(t.count(SignTxOp::StartFor), 2);
    assert_eq!(t.count(SignTxOp::EndFor), 2);
    assert_eq!(t.count(SignTxOp::StartIteration), 3);
    assert_eq!(t.count(SignTxOp::EndIteration), 3);
    assert_eq!(t.count(SignTxOp::SendData), 3);

    Ok(())
}

#[tokio::test]
async fn provided_hashes() -> anyhow::Result<()> {
    setup();

    let template = Template::from_json(TEMPLATE)?;
    let hashes: Vec<String> = template.loops()[0]
        .allowed_iteration_hashes()
        .iter()
        .map(hex::encode)
        .collect();

    let mut t = FaultTransport::new();
    DeviceHandle::from(&mut t)
        .sign(&template, &values(Some(hashes)), &DerivationPath::fio(0, 0))
        .await?;

    Ok(())
}

#[tokio::test]
async fn nested_provided_hashes() -> anyhow::Result<()> {
    setup();

    let template = Template::from_json(TEMPLATE)?;

    // Nested loop commits to a wider set than its shape, the outer set is
    // computed and must bind the nested commitment actually sent
    let auths = template.loops()[1].allowed_iteration_hashes();
    let extra: IterHash = [0x22; 32];
    let auths_allowed = vec![hex::encode(auths[0]), hex::encode(extra)];

    let mut t = FaultTransport::new();
    DeviceHandle::from(&mut t)
        .sign(
            &template,
            &values_with(None, Some(auths_allowed)),
            &DerivationPath::fio(0, 0),
        )
        .await?;

    assert_eq!(t.count(SignTxOp::EndFor), 2);
    assert_eq!(t.count(SignTxOp::EndHash), 1);

    Ok(())
}

#[tokio::test]
async fn iteration_not_allowed() -> anyhow::Result<()> {
    setup();

    let template = Template::from_json(TEMPLATE)?;

    // Commit to a set missing the first iteration
    let other: IterHash = [0x11; 32];
    let hashes = vec![hex::encode(other)];

    let mut t = FaultTransport::new();
    let r = DeviceHandle::from(&mut t)
        .sign(&template, &values(Some(hashes)), &DerivationPath::fio(0, 0))
        .await;

    assert!(matches!(r, Err(Error::Device(StatusCode::HASH_NOT_ALLOWED))));

    // Rejected at the end of the first outer iteration, nothing further sent
    assert_eq!(
        t.ops().last().copied().flatten(),
        Some(SignTxOp::EndIteration)
    );
    assert_eq!(t.count(SignTxOp::EndIteration), 2);
    assert_eq!(t.count(SignTxOp::EndFor), 1);
    assert_eq!(t.count(SignTxOp::EndHash), 0);

    Ok(())
}

#[tokio::test]
async fn iteration_bounds() -> anyhow::Result<()> {
    setup();

    // Two iterations declared, at most one allowed
    let template = Template::from_json(&TEMPLATE.replace(
        r#""min_iterations": 1, "max_iterations": 10"#,
        r#""min_iterations": 1, "max_iterations": 1"#,
    ))?;

    let mut t = FaultTransport::new();
    let r = DeviceHandle::from(&mut t)
        .sign(&template, &values(None), &DerivationPath::fio(0, 0))
        .await;

    assert!(matches!(r, Err(Error::Device(StatusCode::INVALID_DATA))));
    assert_eq!(t.ops().last().copied().flatten(), Some(SignTxOp::EndFor));

    Ok(())
}
