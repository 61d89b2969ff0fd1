// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Smallest buffer an IPZ header can live in.
const MIN_READ_SIZE: u32 = 44;
/// Largest EEPROM read window the inventory stack uses.
const MAX_READ_SIZE: u32 = 65_504;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Knobs of the parsing core itself.
    pub parser: ParserConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// Parser behaviour toggles.
pub struct ParserConfig {
    #[serde(default, rename = "StrictKeywords")]
    /// Keep only the records and keywords of interest (the legacy
    /// filtering behaviour). Off by default: every record survives.
    pub strict: bool,

    #[serde(default = "default_write_back", rename = "EccWriteBack")]
    /// Persist repaired ECC regions back to the EEPROM when a sink is
    /// available.
    pub ecc_write_back: bool,

    #[serde(default = "default_max_read", rename = "MaxReadSize")]
    /// How many bytes callers should read from an EEPROM before parsing.
    pub max_read_size: u32,
}

fn default_write_back() -> bool {
    true
}

fn default_max_read() -> u32 {
    MAX_READ_SIZE
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            self.parser.max_read_size >= MIN_READ_SIZE,
            "MaxReadSize must be >= {MIN_READ_SIZE}"
        );
        // EEPROM reads never exceed the device window.
        if self.parser.max_read_size > MAX_READ_SIZE {
            self.parser.max_read_size = MAX_READ_SIZE;
        }
        Ok(())
    }
}

/// Resolves a possibly relative config path against the working directory
/// and canonicalizes it.
pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    abs.canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))
}
