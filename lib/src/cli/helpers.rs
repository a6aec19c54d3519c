// Copyright (c) 2022-2023 The FIO Protocol Developers

use std::path::Path;

use log::debug;
use serde::{de::DeserializeOwned, Serialize};

use ledger_fio::apdu::field::Encoding;

#[derive(Clone, PartialEq, Debug)]
pub struct HexData<const N: usize = 32>(pub [u8; N]);

impl<const N: usize> std::str::FromStr for HexData<N> {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut b = [0u8; N];

        hex::decode_to_slice(s, &mut b)?;

        Ok(HexData(b))
    }
}

impl<const N: usize> AsRef<[u8; N]> for HexData<N> {
    fn as_ref(&self) -> &[u8; N] {
        &self.0
    }
}

/// Parse an encoding from its name or numeric tag
pub fn parse_encoding(s: &str) -> Result<Encoding, String> {
    if let Some(e) = Encoding::from_name(s) {
        return Ok(e);
    }

    s.parse::<u8>()
        .ok()
        .and_then(|t| Encoding::try_from(t).ok())
        .ok_or_else(|| format!("unknown encoding '{s}'"))
}

/// Helper to read JSON input files
pub async fn read_input<T: DeserializeOwned>(file_name: &str) -> anyhow::Result<T> {
    debug!("Reading input from '{}'", file_name);

    let s = tokio::fs::read_to_string(file_name).await?;

    // Determine format from file name
    let p = Path::new(file_name);

    let v = match p.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&s)?,
        _ => return Err(anyhow::anyhow!("unsupported input file format")),
    };

    Ok(v)
}

/// Helper to write output, to stdout if no file is provided
pub async fn write_output(file_name: Option<&str>, value: &impl Serialize) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(value)?;

    let file_name = match file_name {
        Some(f) => f,
        None => {
            println!("{s}");
            return Ok(());
        }
    };

    debug!("Writing output to '{}'", file_name);

    let p = Path::new(file_name);
    match p.extension().and_then(|e| e.to_str()) {
        Some("json") => tokio::fs::write(p, s).await?,
        _ => return Err(anyhow::anyhow!("unsupported output file format")),
    }

    Ok(())
}
