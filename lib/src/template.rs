// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Declarative transaction templates
//!
//! A [Template] describes the exact sequence of streaming-hash operations for
//! one transaction schema, see [interpret][crate::interpret] for execution.
//! Templates are loaded from JSON:
//!
//! ```json
//! { "instructions": [
//!     { "name": "INIT_HASH", "params": {} },
//!     { "name": "SEND_DATA", "params": { "header": "amount", "encoding": "UINT64", "display": true } },
//!     { "name": "END_HASH", "params": {} }
//! ] }
//! ```

use std::convert::Infallible;

use serde::{Deserialize, Serialize};

use ledger_fio_apdu::{
    field::{Encoding, FieldError, DISPLAY, DONT_DISPLAY},
    hash::{loop_commitment, IntegrityHasher, IterHash},
};

use crate::values::{Value, ValueError, Values};

/// FIO public key transfer template
pub const TRNSFIOPUBKY: &str = include_str!("../templates/trnsfiopubky.json");

/// Template structure errors
#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template must start with INIT_HASH")]
    MissingInitHash,

    #[error("template must end with END_HASH")]
    MissingEndHash,

    #[error("{0} is only valid as the first or last top-level instruction")]
    Misplaced(&'static str),

    #[error("counted section without id or expected length")]
    MissingSectionLength,
}

impl<E: std::fmt::Display + std::fmt::Debug> From<TemplateError> for crate::Error<E> {
    fn from(e: TemplateError) -> Self {
        crate::Error::Template(e.to_string())
    }
}

/// Transaction template
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Template {
    pub instructions: Vec<Instruction>,
}

/// Template instruction
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(tag = "name", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    /// Start the hashing session
    InitHash {
        #[serde(default)]
        params: InitHashParams,
    },

    /// Stream a single field
    SendData { params: SendDataParams },

    /// Committed loop
    For(For),

    /// Open a counted section, with the length given in `params` or looked
    /// up as `expected_length#<id>`
    StartCountedSection {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        params: SectionParams,
    },

    /// Close the innermost counted section
    EndCountedSection {},

    /// Finalise the session
    EndHash {},
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct InitHashParams {
    /// Hex-encoded 32-byte session context (chain id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
}

impl InitHashParams {
    /// Resolve the session context, all zeroes if unset
    pub fn context(&self) -> Result<[u8; 32], FieldError> {
        let mut c = [0u8; 32];
        if let Some(v) = &self.chain_id {
            hex::decode_to_slice(v, &mut c).map_err(|_| FieldError::InvalidValue)?;
        }
        Ok(c)
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SendDataParams {
    /// Field header, also the values lookup key
    pub header: String,

    /// Field encoding, as a name (`"HEX"`) or tag (`155`)
    #[serde(with = "encoding")]
    pub encoding: Encoding,

    /// Literal value, overriding values lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Display the field on the device
    #[serde(default)]
    pub display: bool,

    /// Device storage action
    #[serde(default)]
    pub storage_action: u8,

    /// Required body length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_len: Option<usize>,
}

impl SendDataParams {
    /// `p2` for the resulting SendData request
    pub fn param(&self) -> u8 {
        match self.display {
            true => DISPLAY,
            false => DONT_DISPLAY,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct SectionParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_length: Option<Value>,
}

/// Committed loop, values are looked up under `iterations#<id>`
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct For {
    pub id: String,
    pub params: ForParams,
    pub iterations: Vec<Iteration>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ForParams {
    pub min_iterations: u8,
    pub max_iterations: u8,
}

/// Loop iteration, values are looked up under the iteration name within
/// the loop dictionary
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Iteration {
    pub name: String,
    pub instructions: Vec<Instruction>,
}

impl Template {
    /// Load a template from JSON
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Load the bundled FIO public key transfer template
    pub fn trnsfiopubky() -> Result<Self, serde_json::Error> {
        Self::from_json(TRNSFIOPUBKY)
    }

    /// Check template structure: `INIT_HASH` first, `END_HASH` last, and
    /// neither anywhere else
    pub fn validate(&self) -> Result<(), TemplateError> {
        let n = self.instructions.len();

        match self.instructions.first() {
            Some(Instruction::InitHash { .. }) => (),
            _ => return Err(TemplateError::MissingInitHash),
        }
        match self.instructions.last() {
            Some(Instruction::EndHash {}) if n > 1 => (),
            _ => return Err(TemplateError::MissingEndHash),
        }

        check_body(&self.instructions[1..n - 1])
    }

    /// Iterate over all loops in the template, depth first
    pub fn loops(&self) -> Vec<&For> {
        let mut l = vec![];
        collect_loops(&self.instructions, &mut l);
        l
    }
}

impl For {
    /// Compute the allowed iteration hashes for this loop from the shape of
    /// its iterations, in declaration order without duplicates
    ///
    /// Nested loops are assumed to commit to their own shape hashes.
    pub fn allowed_iteration_hashes(&self) -> Vec<IterHash> {
        let mut hashes = vec![];
        for i in &self.iterations {
            push_unique(&mut hashes, i.integrity_hash());
        }
        hashes
    }

    /// Resolve the allowed iteration hashes this loop commits to against its
    /// values dictionary
    ///
    /// Provided `allowed_iter_hashes` are used as-is. Otherwise hashes are
    /// computed from each iteration's shape, with nested loops bound to the
    /// sets they resolve to in that iteration's values.
    pub fn resolve_iteration_hashes(&self, values: &Values) -> Result<Vec<IterHash>, ValueError> {
        if let Some(h) = values.allowed_iter_hashes()? {
            return Ok(h);
        }

        let mut hashes = vec![];
        for i in &self.iterations {
            let h = i.resolved_integrity_hash(values.map(&i.name)?)?;
            push_unique(&mut hashes, h);
        }
        Ok(hashes)
    }
}

fn push_unique(hashes: &mut Vec<IterHash>, h: IterHash) {
    if !hashes.contains(&h) {
        hashes.push(h);
    }
}

impl Iteration {
    /// Structural hash of this iteration, as computed by the device when
    /// nested loops commit to their shape hashes
    pub fn integrity_hash(&self) -> IterHash {
        let nested = |f: &For| Ok::<_, Infallible>(f.allowed_iteration_hashes());
        match self.hash_with(&nested) {
            Ok(h) => h,
            Err(e) => match e {},
        }
    }

    /// Structural hash of this iteration with nested loops resolved against
    /// the iteration's values
    pub fn resolved_integrity_hash(&self, values: &Values) -> Result<IterHash, ValueError> {
        let nested = |f: &For| -> Result<Vec<IterHash>, ValueError> {
            f.resolve_iteration_hashes(values.iterations(&f.id)?)
        };
        self.hash_with(&nested)
    }

    fn hash_with<E>(
        &self,
        nested: &dyn Fn(&For) -> Result<Vec<IterHash>, E>,
    ) -> Result<IterHash, E> {
        let mut h = IntegrityHasher::new();
        for i in &self.instructions {
            i.integrity(&mut h, nested)?;
        }
        Ok(h.finalize())
    }
}

impl Instruction {
    /// Instruction name
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Feed this instruction into an iteration integrity hash, `nested`
    /// supplies the allowed hashes nested loops commit to
    fn integrity<E>(
        &self,
        h: &mut IntegrityHasher,
        nested: &dyn Fn(&For) -> Result<Vec<IterHash>, E>,
    ) -> Result<(), E> {
        match self {
            Instruction::SendData { params } => h.send_data(
                params.param(),
                params.encoding.wire_tag(),
                &params.header,
                params.storage_action,
            ),
            Instruction::StartCountedSection { .. } => h.start_counted_section(),
            Instruction::EndCountedSection {} => h.end_counted_section(),
            Instruction::For(f) => {
                let c = loop_commitment(&nested(f)?);
                h.start_for(f.params.min_iterations, f.params.max_iterations, &c);
                h.end_for();
            }
            // Rejected by validation
            Instruction::InitHash { .. } | Instruction::EndHash {} => (),
        }
        Ok(())
    }
}

fn check_body(instructions: &[Instruction]) -> Result<(), TemplateError> {
    for i in instructions {
        match i {
            Instruction::InitHash { .. } | Instruction::EndHash {} => {
                return Err(TemplateError::Misplaced(i.name()))
            }
            Instruction::StartCountedSection { id: None, params }
                if params.expected_length.is_none() =>
            {
                return Err(TemplateError::MissingSectionLength)
            }
            Instruction::For(f) => {
                for it in &f.iterations {
                    check_body(&it.instructions)?;
                }
            }
            _ => (),
        }
    }
    Ok(())
}

fn collect_loops<'a>(instructions: &'a [Instruction], l: &mut Vec<&'a For>) {
    for i in instructions {
        if let Instruction::For(f) = i {
            l.push(f);
            for it in &f.iterations {
                collect_loops(&it.instructions, l);
            }
        }
    }
}

/// Serde helpers for [Encoding] names / tags
mod encoding {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use ledger_fio_apdu::field::Encoding;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Tag(u8),
        Name(String),
    }

    pub fn serialize<S: Serializer>(e: &Encoding, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(e.name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Encoding, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Tag(t) => {
                Encoding::try_from(t).map_err(|_| D::Error::custom(format!("unknown encoding {t}")))
            }
            Repr::Name(n) => {
                Encoding::from_name(&n).ok_or_else(|| D::Error::custom(format!("unknown encoding {n}")))
            }
        }
    }
}
