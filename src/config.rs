use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::Path;

use crate::dsp::ir::TrimParams;
use crate::dsp::postprocess::NormalizeMode;

pub const OUT_IR: u32 = 1 << 0;
pub const OUT_RAW: u32 = 1 << 1;
pub const OUT_AUDIO: u32 = 1 << 2;
pub const OUT_FR_MASTER: u32 = 1 << 3;
pub const OUT_FR_CHILD: u32 = 1 << 4;
pub const OUT_ALL: u32 = OUT_IR | OUT_RAW | OUT_AUDIO | OUT_FR_MASTER | OUT_FR_CHILD;

/// Produce-flag tokens accepted in config files and on the command line.
const PRODUCE_FLAGS: &[(&str, u32)] = &[
    ("ir", OUT_IR),
    ("raw", OUT_RAW),
    ("audio", OUT_AUDIO),
    ("frm", OUT_FR_MASTER),
    ("fr_master", OUT_FR_MASTER),
    ("frc", OUT_FR_CHILD),
    ("fr_child", OUT_FR_CHILD),
    ("all", OUT_ALL),
];

const NORMALIZE_FLAGS: &[(&str, NormalizeMode)] = &[
    ("none", NormalizeMode::None),
    ("above", NormalizeMode::Above),
    ("below", NormalizeMode::Below),
    ("always", NormalizeMode::Always),
];

/// One master recording and the child files processed against it.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct FileGroup {
    pub master: String,
    pub files: Vec<String>,
}

/// IR trimming percentages and output filename templates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IrConfig {
    pub head_cut: f32,
    pub tail_cut: f32,
    pub fade_in: f32,
    pub fade_out: f32,
    pub file: String,
    pub raw: String,
    pub fr_master: String,
    pub fr_child: String,
}

impl Default for IrConfig {
    fn default() -> Self {
        Self {
            head_cut: 45.0,
            tail_cut: 5.0,
            fade_in: 2.0,
            fade_out: 50.0,
            file: "${master_name}/${file_name} - IR.wav".into(),
            raw: "${master_name}/${file_name} - Raw IR.wav".into(),
            fr_master: "${master_name}/${file_name} - FR master.wav".into(),
            fr_child: "${master_name}/${file_name} - FR child.wav".into(),
        }
    }
}

/// Full tool configuration, read from a JSON file and overridden by the
/// command line. Groups use a sorted map so processing order is stable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub src_path: String,
    pub dst_path: String,
    pub file: String,
    pub srate: u32,
    pub fft_rank: u32,
    pub gain_range: f32,
    pub dry: f32,
    pub wet: f32,
    pub mastering: bool,
    #[serde(deserialize_with = "de_normalize")]
    pub normalize: NormalizeMode,
    pub norm_gain: f32,
    pub latency_compensation: bool,
    pub match_length: bool,
    pub produce: Vec<String>,
    pub ir: IrConfig,
    pub groups: BTreeMap<String, FileGroup>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            src_path: String::new(),
            dst_path: String::new(),
            file: "${master_name}/${file_name} - processed.wav".into(),
            srate: 48000,
            fft_rank: 12,
            gain_range: 48.0,
            dry: -1000.0,
            wet: 0.0,
            mastering: false,
            normalize: NormalizeMode::None,
            norm_gain: 0.0,
            latency_compensation: false,
            match_length: false,
            produce: Vec::new(),
            ir: IrConfig::default(),
            groups: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Resolve the produce token list to a bitmask. Unknown tokens are
    /// skipped with a warning.
    pub fn produce_mask(&self) -> u32 {
        let mut mask = 0;
        for token in &self.produce {
            match find_flag(PRODUCE_FLAGS, token) {
                Some(bits) => mask |= bits,
                None => log::warn!("unknown produce flag '{token}'"),
            }
        }
        mask
    }

    pub fn trim_params(&self) -> TrimParams {
        TrimParams {
            head_cut: self.ir.head_cut,
            tail_cut: self.ir.tail_cut,
            fade_in: self.ir.fade_in,
            fade_out: self.ir.fade_out,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse configuration file: {}", path.display()))
}

pub fn parse_normalize(token: &str) -> Result<NormalizeMode> {
    match find_flag(NORMALIZE_FLAGS, token) {
        Some(mode) => Ok(mode),
        None => bail!("unknown normalize mode '{token}'"),
    }
}

fn find_flag<T: Copy>(table: &[(&str, T)], token: &str) -> Option<T> {
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token))
        .map(|(_, value)| *value)
}

fn de_normalize<'de, D>(deserializer: D) -> std::result::Result<NormalizeMode, D::Error>
where
    D: Deserializer<'de>,
{
    let token = String::deserialize(deserializer)?;
    parse_normalize(&token).map_err(serde::de::Error::custom)
}
