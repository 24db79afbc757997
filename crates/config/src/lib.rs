// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

/// Peripheral register space of the MC68331 is decoded on the low 24 address bits.
pub const DEFAULT_PERIPHERAL_MASK: u32 = 0x00FF_FFFF;

fn default_peripheral_mask() -> u32 {
    DEFAULT_PERIPHERAL_MASK
}

/// CPU model selector handed to the execution core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuModel {
    #[serde(alias = "68000", alias = "mc68000")]
    M68000,
    #[serde(alias = "68010", alias = "mc68010")]
    M68010,
    #[default]
    #[serde(alias = "68020", alias = "mc68020")]
    M68020,
    #[serde(alias = "mc68331", alias = "68331")]
    Cpu32,
}

impl CpuModel {
    /// Numeric code written to the core's CPU type register.
    pub fn code(self) -> u32 {
        match self {
            CpuModel::M68000 => 1,
            CpuModel::M68010 => 2,
            CpuModel::M68020 => 4,
            CpuModel::Cpu32 => 9,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(CpuModel::M68000),
            2 => Some(CpuModel::M68010),
            4 => Some(CpuModel::M68020),
            9 => Some(CpuModel::Cpu32),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryRange {
    pub id: String,
    pub base: u32,
    pub size: String, // e.g. "512KiB" or "0x80000"
    #[serde(default)]
    pub read_only: bool,
}

impl MemoryRange {
    pub fn size_bytes(&self) -> Result<u64> {
        parse_size(&self.size).with_context(|| format!("Invalid size for memory '{}'", self.id))
    }
}

/// Initial stack pointer and program counter applied after a reset pulse.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ResetVector {
    pub pc: u32,
    pub sp: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SystemManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    #[serde(default)]
    pub cpu: CpuModel,
    #[serde(default = "default_peripheral_mask")]
    pub peripheral_mask: u32,
    #[serde(default)]
    pub memory: Vec<MemoryRange>,
    #[serde(default)]
    pub reset: Option<ResetVector>,
}

impl Default for SystemManifest {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            name: "mc68331".to_string(),
            cpu: CpuModel::default(),
            peripheral_mask: DEFAULT_PERIPHERAL_MASK,
            memory: Vec::new(),
            reset: None,
        }
    }
}

impl SystemManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open system manifest at {:?}", path))?;
        let manifest = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to load system manifest from {:?}", path))?;
        tracing::debug!(
            "Loaded manifest '{}' with {} memory regions",
            manifest.name,
            manifest.memory.len()
        );
        Ok(manifest)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let manifest: Self =
            serde_yaml::from_str(yaml).context("Failed to parse System Manifest YAML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.peripheral_mask == 0 {
            anyhow::bail!("Field 'peripheral_mask' must not be zero");
        }

        let mut spans = Vec::with_capacity(self.memory.len());
        for region in &self.memory {
            let size = region.size_bytes()?;
            if size == 0 {
                anyhow::bail!("Memory region '{}' has zero size", region.id);
            }
            let start = region.base as u64;
            let end = start + size;
            if end > 1 << 32 {
                anyhow::bail!(
                    "Memory region '{}' ({:#x}+{:#x}) exceeds the 32-bit address space",
                    region.id,
                    start,
                    size
                );
            }
            spans.push((region.id.as_str(), start, end));
        }

        for (i, (id_a, start_a, end_a)) in spans.iter().enumerate() {
            for (id_b, start_b, end_b) in &spans[i + 1..] {
                if start_a < end_b && start_b < end_a {
                    anyhow::bail!("Memory regions '{}' and '{}' overlap", id_a, id_b);
                }
            }
        }

        Ok(())
    }
}

/// Parse a size given either as a plain byte count (`4096`, `0x1000`) or as a
/// human-readable size (`64KiB`, `1MB`).
pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};

    let trimmed = size_str.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid hex size '{}': {}", size_str, e));
    }
    if let Ok(bytes) = trimmed.parse::<u64>() {
        return Ok(bytes);
    }

    let s: Size = trimmed
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
