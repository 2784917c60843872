use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// Options mirror the configuration file; anything given here overrides
/// the corresponding config value.
#[derive(Parser, Debug)]
#[command(
    name = "timbreforge",
    about = "Derives corrective impulse responses that match recordings to a master's timbre"
)]
pub struct Cli {
    /// Configuration file (required unless --master is given)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Master file name; builds an ad-hoc group without a config file
    #[arg(long)]
    pub master: Option<String>,

    /// Child file name (repeatable)
    #[arg(long = "child")]
    pub children: Vec<String>,

    /// Group name for --child files
    #[arg(short, long, default_value = "default")]
    pub group: String,

    /// Source path to take files from
    #[arg(short, long)]
    pub src_path: Option<String>,

    /// Destination path to store audio files
    #[arg(short, long)]
    pub dst_path: Option<String>,

    /// Format of the processed audio file name
    #[arg(short, long)]
    pub file: Option<String>,

    /// Format of the trimmed impulse response file name
    #[arg(long)]
    pub ir_file: Option<String>,

    /// Format of the raw impulse response file name
    #[arg(long)]
    pub ir_raw: Option<String>,

    /// Format of the master frequency response file name
    #[arg(long)]
    pub fr_master: Option<String>,

    /// Format of the child frequency response file name
    #[arg(long)]
    pub fr_child: Option<String>,

    /// Head cut for the IR file (% of raw length)
    #[arg(long)]
    pub ir_head_cut: Option<f32>,

    /// Tail cut for the IR file (% of raw length)
    #[arg(long)]
    pub ir_tail_cut: Option<f32>,

    /// Fade-in for the IR file (% of raw length)
    #[arg(long)]
    pub ir_fade_in: Option<f32>,

    /// Fade-out for the IR file (% of raw length)
    #[arg(long)]
    pub ir_fade_out: Option<f32>,

    /// Sample rate of output files
    #[arg(long)]
    pub srate: Option<u32>,

    /// FFT rank (resolution) used for profiling, 8..=16
    #[arg(long)]
    pub fft_rank: Option<u32>,

    /// Gain range (dB) for the correction filter
    #[arg(long)]
    pub gain_range: Option<f32>,

    /// Amount (dB) of unprocessed signal in the output
    #[arg(long, allow_negative_numbers = true)]
    pub dry: Option<f32>,

    /// Amount (dB) of processed signal in the output
    #[arg(long)]
    pub wet: Option<f32>,

    /// Work as an auto-mastering tool: correct each child toward the master
    #[arg(short, long)]
    pub mastering: bool,

    /// Normalization mode (none, above, below, always)
    #[arg(short, long)]
    pub normalize: Option<String>,

    /// Normalization peak gain (dB)
    #[arg(long)]
    pub norm_gain: Option<f32>,

    /// Strip the constant latency of the linear-phase filter
    #[arg(long)]
    pub latency_compensation: bool,

    /// Match the output length to the input file
    #[arg(long)]
    pub match_length: bool,

    /// Comma-separated outputs to produce (ir, raw, audio, frm, frc, all)
    #[arg(short, long, value_delimiter = ',')]
    pub produce: Vec<String>,
}

impl Cli {
    /// Apply command-line overrides on top of a parsed configuration:
    /// `--master` synthesizes a group and forces audio output, then every
    /// explicit option wins over the config file.
    pub fn apply_to(&self, cfg: &mut Config) -> anyhow::Result<()> {
        if let Some(master) = &self.master {
            let group = cfg.groups.entry(self.group.clone()).or_default();
            group.master = master.clone();
            group.files.extend(self.children.iter().cloned());
            cfg.produce = vec!["audio".into()];
        }

        if let Some(v) = &self.src_path {
            cfg.src_path = v.clone();
        }
        if let Some(v) = &self.dst_path {
            cfg.dst_path = v.clone();
        }
        if let Some(v) = &self.file {
            cfg.file = v.clone();
        }
        if let Some(v) = &self.ir_file {
            cfg.ir.file = v.clone();
            cfg.produce.push("ir".into());
        }
        if let Some(v) = &self.ir_raw {
            cfg.ir.raw = v.clone();
            cfg.produce.push("raw".into());
        }
        if let Some(v) = &self.fr_master {
            cfg.ir.fr_master = v.clone();
            cfg.produce.push("frm".into());
        }
        if let Some(v) = &self.fr_child {
            cfg.ir.fr_child = v.clone();
            cfg.produce.push("frc".into());
        }
        if let Some(v) = self.ir_head_cut {
            cfg.ir.head_cut = v;
        }
        if let Some(v) = self.ir_tail_cut {
            cfg.ir.tail_cut = v;
        }
        if let Some(v) = self.ir_fade_in {
            cfg.ir.fade_in = v;
        }
        if let Some(v) = self.ir_fade_out {
            cfg.ir.fade_out = v;
        }
        if let Some(v) = self.srate {
            cfg.srate = v;
        }
        if let Some(v) = self.fft_rank {
            cfg.fft_rank = v;
        }
        if let Some(v) = self.gain_range {
            cfg.gain_range = v;
        }
        if let Some(v) = self.dry {
            cfg.dry = v;
        }
        if let Some(v) = self.wet {
            cfg.wet = v;
        }
        if self.mastering {
            cfg.mastering = true;
        }
        if let Some(v) = &self.normalize {
            cfg.normalize = crate::config::parse_normalize(v)?;
        }
        if let Some(v) = self.norm_gain {
            cfg.norm_gain = v;
        }
        if self.latency_compensation {
            cfg.latency_compensation = true;
        }
        if self.match_length {
            cfg.match_length = true;
        }
        if !self.produce.is_empty() {
            cfg.produce = self.produce.clone();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OUT_AUDIO, OUT_IR};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("timbreforge").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn master_option_builds_adhoc_group() {
        let cli = parse(&[
            "--master",
            "ref.wav",
            "--child",
            "a.wav",
            "--child",
            "b.wav",
        ]);
        let mut cfg = Config::default();
        cli.apply_to(&mut cfg).unwrap();

        let group = &cfg.groups["default"];
        assert_eq!(group.master, "ref.wav");
        assert_eq!(group.files, vec!["a.wav", "b.wav"]);
        assert_eq!(cfg.produce_mask(), OUT_AUDIO);
    }

    #[test]
    fn ir_file_option_enables_ir_output() {
        let cli = parse(&["-c", "cfg.json", "--ir-file", "${file_name}.wav"]);
        let mut cfg = Config::default();
        cli.apply_to(&mut cfg).unwrap();
        assert_eq!(cfg.ir.file, "${file_name}.wav");
        assert_eq!(cfg.produce_mask() & OUT_IR, OUT_IR);
    }

    #[test]
    fn scalar_overrides_win_over_config() {
        let cli = parse(&["-c", "cfg.json", "--srate", "96000", "--dry", "-3.5"]);
        let mut cfg = Config::default();
        cli.apply_to(&mut cfg).unwrap();
        assert_eq!(cfg.srate, 96000);
        assert_eq!(cfg.dry, -3.5);
        // Untouched values keep their config defaults.
        assert_eq!(cfg.fft_rank, 12);
    }

    #[test]
    fn produce_list_replaces_config_list() {
        let cli = parse(&["-c", "cfg.json", "-p", "ir,audio"]);
        let mut cfg = Config::default();
        cfg.produce = vec!["raw".into()];
        cli.apply_to(&mut cfg).unwrap();
        assert_eq!(cfg.produce, vec!["ir", "audio"]);
    }

    #[test]
    fn bad_normalize_override_fails() {
        let cli = parse(&["-c", "cfg.json", "-n", "sideways"]);
        let mut cfg = Config::default();
        assert!(cli.apply_to(&mut cfg).is_err());
    }
}
