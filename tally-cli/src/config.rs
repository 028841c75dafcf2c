use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tally_core::ExtractOptions;

use crate::state::ensure_tally_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub extract: ExtractOptions,
    #[serde(default)]
    pub ocr: OcrSection,
    #[serde(default)]
    pub render: RenderSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSection {
    /// Set to false to use the PDF text layer only
    pub enabled: bool,
    /// Tesseract executable (name on PATH or absolute path)
    pub command: String,
    /// Tesseract language pack(s), e.g. "eng" or "eng+hin"
    pub language: String,
    /// Extra args placed before the output format, e.g. ["--psm", "6"]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSection {
    /// pdftoppm executable
    pub command: String,
    pub dpi: u32,
}

impl Default for OcrSection {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "tesseract".to_string(),
            language: "eng".to_string(),
            args: Vec::new(),
        }
    }
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            command: "pdftoppm".to_string(),
            dpi: 300,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_tally_home()?.join("config.toml"))
}

fn resolve(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p.to_path_buf()),
        None => config_path(),
    }
}

/// Missing file means defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let p = resolve(path)?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn parse_config(s: &str) -> Result<Config> {
    Ok(toml::from_str(s)?)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<PathBuf> {
    let p = resolve(path)?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(p)
}

pub fn init_config(path: Option<&Path>) -> Result<()> {
    let p = resolve(path)?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let written = save_config(&Config::default(), Some(&p))?;
    println!("Wrote {}", written.display());
    Ok(())
}
