// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Command line utility for FIO streaming-hash encoding and simulation

use std::collections::BTreeMap;

use clap::Parser;
use log::{debug, info, LevelFilter};

use ledger_fio::{
    apdu::{field::Encoding, hash::IterHash, path::DerivationPath},
    field::encode_field,
    sim::{Engine, SeedDriver},
    template::{Instruction, Template},
    values::Values,
    DeviceHandle,
};

mod helpers;
use helpers::*;

/// FIO ledger command line utility
#[derive(Clone, PartialEq, Debug, Parser)]
struct Options {
    /// Subcommand to execute
    #[clap(subcommand)]
    cmd: Actions,

    /// Enable verbose logging
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, PartialEq, Debug, Parser)]
#[non_exhaustive]
enum Actions {
    /// Encode a field record, printing the hex-encoded SendData payload
    Encode {
        /// Field header
        #[clap(long)]
        header: String,

        /// Field value
        #[clap(long)]
        value: String,

        /// Field encoding (name or tag)
        #[clap(long, value_parser = parse_encoding)]
        encoding: Encoding,

        /// Device storage action
        #[clap(long, default_value = "0")]
        storage_action: u8,
    },

    /// Print allowed iteration hashes for each loop in a template
    Hashes {
        /// Template file (defaults to the bundled trnsfiopubky template)
        #[clap(long)]
        template: Option<String>,

        /// Values file, resolves top-level loops against the nested loop
        /// hashes it provides (shape hashes for every loop if unset)
        #[clap(long)]
        values: Option<String>,
    },

    /// Stream a template and values against the simulator, printing the signed hash
    Simulate {
        /// Template file (defaults to the bundled trnsfiopubky template)
        #[clap(long)]
        template: Option<String>,

        /// Values file
        #[clap(long)]
        values: String,

        /// Witness derivation path
        #[clap(long, default_value = "44'/235'/0'/0/0")]
        path: DerivationPath,

        /// Hex-encoded simulator seed
        #[clap(long, default_value = "0000000000000000000000000000000000000000000000000000000000000000")]
        seed: HexData<32>,

        /// Output file, stdout if unset
        #[clap(long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Options::parse();

    // Setup logging
    simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default())?;

    debug!("Executing command: {:?}", args.cmd);

    match args.cmd {
        Actions::Encode {
            header,
            value,
            encoding,
            storage_action,
        } => {
            let r = encode_field(&header, &value, encoding, storage_action)?;
            println!("{}", hex::encode(r));
        }
        Actions::Hashes { template, values } => {
            let t = load_template(template.as_deref()).await?;

            let mut hashes = BTreeMap::new();
            match values {
                None => {
                    for l in t.loops() {
                        hashes.insert(l.id.clone(), l.allowed_iteration_hashes());
                    }
                }
                Some(f) => {
                    let v: Values = read_input(&f).await?;
                    for i in &t.instructions {
                        if let Instruction::For(l) = i {
                            let h = l.resolve_iteration_hashes(v.iterations(&l.id)?)?;
                            hashes.insert(l.id.clone(), h);
                        }
                    }
                }
            }

            let hashes: BTreeMap<String, Vec<String>> = hashes
                .iter()
                .map(|(id, h)| (format!("iterations#{id}"), h.iter().map(hex_hash).collect()))
                .collect();

            write_output(None, &hashes).await?;
        }
        Actions::Simulate {
            template,
            values,
            path,
            seed,
            output,
        } => {
            let t = load_template(template.as_deref()).await?;
            let v: Values = read_input(&values).await?;

            info!("Simulating signature with path: {path}");

            let h = DeviceHandle::from(Engine::new(SeedDriver::new(seed.as_ref())));
            let r = h.sign(&t, &v, &path).await?;

            info!("tx hash: {}", hex::encode(r.tx_hash));

            write_output(output.as_deref(), &r).await?;
        }
    }

    Ok(())
}

/// Load a template file, or the bundled template if unset
async fn load_template(file_name: Option<&str>) -> anyhow::Result<Template> {
    let t = match file_name {
        Some(f) => read_input(f).await?,
        None => Template::trnsfiopubky()?,
    };

    t.validate()?;

    Ok(t)
}

fn hex_hash(h: &IterHash) -> String {
    hex::encode(h)
}
