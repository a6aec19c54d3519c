// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Template interpreter
//!
//! Walks a [Template] in declaration order, issuing one session primitive
//! per instruction. Loops recurse into each iteration with that iteration's
//! values dictionary.

use futures::future::{BoxFuture, FutureExt};
use log::debug;

use ledger_fio_apdu::{field::FieldError, path::DerivationPath};

use crate::{
    field::encode_body,
    template::{Instruction, Template},
    values::Values,
    Error, Session, SignedHash, Transport,
};

/// Execute a template against a session, returning the signed transaction hash
pub async fn interpret<T: Transport + Send>(
    s: &mut Session<'_, T>,
    template: &Template,
    values: &Values,
    path: &DerivationPath,
) -> Result<SignedHash, Error<T::Error>> {
    template.validate()?;

    match interpret_level(s, &template.instructions, values, path, 0).await? {
        Some(r) => Ok(r),
        None => Err(Error::Template("missing END_HASH".to_string())),
    }
}

/// Interpret a single level of instructions, returning the session result
/// at the top level only
fn interpret_level<'a, 's, T>(
    s: &'a mut Session<'s, T>,
    instructions: &'a [Instruction],
    values: &'a Values,
    path: &'a DerivationPath,
    level: usize,
) -> BoxFuture<'a, Result<Option<SignedHash>, Error<T::Error>>>
where
    T: Transport + Send + 's,
    's: 'a,
{
    async move {
        for i in instructions {
            debug!("instruction {} (level {level})", i.name());

            match i {
                Instruction::InitHash { params } => {
                    let context = params.context()?;
                    s.init_hash(context).await?;
                }
                Instruction::SendData { params } => {
                    let value = match &params.value {
                        Some(v) => v
                            .as_text()
                            .ok_or_else(|| Error::InvalidValue(params.header.clone()))?,
                        None => values.text(&params.header)?,
                    };

                    let body = encode_body(params.encoding, &value)?;
                    match params.body_len {
                        Some(n) if n != body.len() => return Err(FieldError::InvalidValue.into()),
                        _ => (),
                    }

                    s.send_body(
                        &params.header,
                        &body,
                        params.encoding,
                        params.display,
                        params.storage_action,
                    )
                    .await?;
                }
                Instruction::For(f) => {
                    let lv = values.iterations(&f.id)?;

                    // Provided hashes where available, otherwise computed from
                    // the loop shape and the commitments of nested loops
                    let allowed = f.resolve_iteration_hashes(lv)?;

                    s.start_for(f.params.min_iterations, f.params.max_iterations, &allowed)
                        .await?;

                    for it in &f.iterations {
                        s.start_iteration().await?;

                        let iv = lv.map(&it.name)?;
                        interpret_level(s, &it.instructions, iv, path, level + 1).await?;

                        s.end_iteration(&allowed).await?;
                    }

                    s.end_for().await?;
                }
                Instruction::StartCountedSection { id, params } => {
                    let length = match (&params.expected_length, id) {
                        (Some(v), _) => v
                            .as_text()
                            .and_then(|v| v.trim().parse().ok())
                            .ok_or_else(|| Error::InvalidValue("expected_length".to_string()))?,
                        (None, Some(id)) => values.expected_length(id)?,
                        (None, None) => {
                            return Err(Error::Template(
                                "counted section without length".to_string(),
                            ))
                        }
                    };

                    s.start_counted_section(length).await?;
                }
                Instruction::EndCountedSection {} => {
                    s.end_counted_section().await?;
                }
                Instruction::EndHash {} if level == 0 => {
                    return s.end_hash(path).await.map(Some);
                }
                Instruction::EndHash {} => {
                    return Err(Error::Template("nested END_HASH".to_string()));
                }
            }
        }

        Ok(None)
    }
    .boxed()
}
