// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use clap::{Parser, Subcommand};
use mc68k_config::{CpuModel, SystemManifest};
use mc68k_core::bus::SystemBus;
use mc68k_core::peripherals::{gpt, qsm, sim};
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{error, info};

const EXIT_OK: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;

fn parse_u32_addr(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex address '{}': {}", s, e))
    } else {
        u32::from_str(trimmed).map_err(|e| format!("Invalid address '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "MC68331 system bus inspector", long_about = None)]
struct Cli {
    /// Path to the system manifest (YAML). Defaults to a bare MC68331 with no memory.
    #[arg(short, long, global = true)]
    system: Option<PathBuf>,

    /// Enable debug-level logging
    #[arg(short, long, global = true)]
    trace: bool,

    /// Emit machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print memory regions and peripheral register windows.
    Map,

    /// Report which region or block claims an address and read it.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Address to probe (decimal or 0x-prefixed hex)
    #[arg(value_parser = parse_u32_addr)]
    addr: u32,

    /// Read a 16-bit word instead of a byte
    #[arg(long)]
    word: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct MapEntry {
    name: String,
    kind: &'static str,
    base: u32,
    size: u64,
    read_only: bool,
}

#[derive(Debug, Serialize)]
struct MemoryMap {
    name: String,
    cpu: CpuModel,
    peripheral_mask: u32,
    entries: Vec<MapEntry>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ProbeReport {
    addr: u32,
    claimant: Option<String>,
    width: u8,
    value: u32,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so that --json output stays parseable.
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let manifest = match load_manifest(cli.system.as_deref()) {
        Ok(m) => m,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let result = match cli.command {
        Commands::Map => run_map(&manifest, cli.json),
        Commands::Probe(args) => run_probe(&manifest, &args, cli.json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn load_manifest(path: Option<&Path>) -> anyhow::Result<SystemManifest> {
    match path {
        Some(path) => {
            info!("Loading system manifest: {:?}", path);
            SystemManifest::from_file(path)
        }
        None => {
            info!("Using default hardware configuration");
            Ok(SystemManifest::default())
        }
    }
}

fn build_map(manifest: &SystemManifest) -> anyhow::Result<MemoryMap> {
    let mut entries = Vec::with_capacity(manifest.memory.len() + 3);
    for region in &manifest.memory {
        entries.push(MapEntry {
            name: region.id.clone(),
            kind: if region.read_only { "rom" } else { "ram" },
            base: region.base,
            size: region.size_bytes()?,
            read_only: region.read_only,
        });
    }

    for (name, base, size) in [
        ("gpt", gpt::GPT_BASE, gpt::GPT_SIZE),
        ("sim", sim::SIM_BASE, sim::SIM_SIZE),
        ("qsm", qsm::QSM_BASE, qsm::QSM_SIZE),
    ] {
        entries.push(MapEntry {
            name: name.to_string(),
            kind: "peripheral",
            base,
            size: size as u64,
            read_only: false,
        });
    }

    Ok(MemoryMap {
        name: manifest.name.clone(),
        cpu: manifest.cpu,
        peripheral_mask: manifest.peripheral_mask,
        entries,
    })
}

fn run_map(manifest: &SystemManifest, json: bool) -> anyhow::Result<()> {
    let map = build_map(manifest)?;

    if json {
        println!("{}", serde_json::to_string(&map)?);
        return Ok(());
    }

    println!(
        "{} ({:?}, peripheral mask {:#010x})",
        map.name, map.cpu, map.peripheral_mask
    );
    for e in &map.entries {
        let end = e.base as u64 + e.size;
        println!(
            "  {:<12} {:<10} {:#010x}..{:#010x}{}",
            e.name,
            e.kind,
            e.base,
            end,
            if e.read_only { "  (read-only)" } else { "" }
        );
    }
    Ok(())
}

fn probe(bus: &mut SystemBus, addr: u32, word: bool) -> ProbeReport {
    let claimant = bus.describe(addr).map(str::to_string);
    let (width, value) = if word {
        (16, bus.read16(addr) as u32)
    } else {
        (8, bus.read8(addr) as u32)
    };
    ProbeReport {
        addr,
        claimant,
        width,
        value,
    }
}

fn run_probe(manifest: &SystemManifest, args: &ProbeArgs, json: bool) -> anyhow::Result<()> {
    let mut bus = SystemBus::from_config(manifest)?;
    let report = probe(&mut bus, args.addr, args.word);

    if json {
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }

    let digits = (report.width / 4) as usize;
    println!(
        "{:#010x} [{}] = {:#0width$x}",
        report.addr,
        report.claimant.as_deref().unwrap_or("unmapped"),
        report.value,
        width = digits + 2
    );
    Ok(())
}
