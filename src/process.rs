use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::audio::buffer::AudioBuffer;
use crate::audio::decode::load_audio_file;
use crate::audio::encode::save_audio_file;
use crate::config::{
    Config, FileGroup, OUT_AUDIO, OUT_FR_CHILD, OUT_FR_MASTER, OUT_IR, OUT_RAW,
};
use crate::dsp::convolve::convolve;
use crate::dsp::ir::{profile_to_impulse_response, timbre_impulse_response, trim_impulse_response};
use crate::dsp::postprocess::{compensate_latency, match_length, normalize};
use crate::dsp::profile::spectral_profile;
use crate::dsp::{db_to_gain, gain_to_db, DspError};
use crate::naming;

const FFT_RANK_MIN: u32 = 8;
const FFT_RANK_MAX: u32 = 16;
const DRYWET_MIN_DB: f32 = -150.0;
const DRYWET_MAX_DB: f32 = 150.0;

/// Dry/wet dB amounts treat everything at or below -150 dB as silence.
fn drywet_to_gain(db: f32) -> f32 {
    if db <= DRYWET_MIN_DB {
        0.0
    } else {
        db_to_gain(db.min(DRYWET_MAX_DB))
    }
}

/// Process every file group in deterministic name order; the first error
/// aborts the whole run.
pub fn process_file_groups(cfg: &Config) -> Result<()> {
    for (name, group) in &cfg.groups {
        log::info!("processing group '{name}'...");
        process_file_group(cfg, name, group)
            .with_context(|| format!("Failed processing group '{name}'"))?;
    }
    Ok(())
}

fn process_file_group(cfg: &Config, name: &str, group: &FileGroup) -> Result<()> {
    let produce = cfg.produce_mask();
    if group.master.is_empty() {
        log::info!("  group '{name}' does not have a master file, skipping");
        return Ok(());
    }
    if group.files.is_empty() {
        log::info!("  group '{name}' does not have any child files, skipping");
        return Ok(());
    }
    if produce == 0 {
        return Ok(());
    }

    let fft_rank = cfg.fft_rank.clamp(FFT_RANK_MIN, FFT_RANK_MAX);
    let dry = drywet_to_gain(cfg.dry);
    let wet = drywet_to_gain(cfg.wet);
    let src_path = Path::new(&cfg.src_path);

    let master = load_audio_file(src_path, &group.master, cfg.srate)?;
    let master_profile = spectral_profile(&master, fft_rank);

    for fname in &group.files {
        let vars = naming::build_variables(cfg.srate, name, &group.master, fname);

        let child = load_audio_file(src_path, fname, cfg.srate)?;
        if child.channels() != master.channels() {
            return Err(DspError::ChannelMismatch {
                left: master.channels(),
                right: child.channels(),
            })
            .with_context(|| {
                format!(
                    "channel layout of '{}' does not match the master '{}'",
                    fname, group.master
                )
            });
        }

        let child_profile = spectral_profile(&child, fft_rank);

        // Timbral correction derives the child/master ratio and reshapes
        // the master; auto-mastering flips the ratio and corrects the
        // child toward the reference.
        let raw_ir = if cfg.mastering {
            timbre_impulse_response(&child_profile, &master_profile, fft_rank, cfg.gain_range)?
        } else {
            timbre_impulse_response(&master_profile, &child_profile, fft_rank, cfg.gain_range)?
        };

        if produce & OUT_RAW != 0 {
            save_output(cfg, &raw_ir, &cfg.ir.raw, &vars)?;
        }
        if produce & OUT_FR_MASTER != 0 {
            let fr = profile_to_impulse_response(&master_profile, fft_rank)?;
            save_output(cfg, &fr, &cfg.ir.fr_master, &vars)?;
        }
        if produce & OUT_FR_CHILD != 0 {
            let fr = profile_to_impulse_response(&child_profile, fft_rank)?;
            save_output(cfg, &fr, &cfg.ir.fr_child, &vars)?;
        }

        if produce & (OUT_IR | OUT_AUDIO) != 0 {
            let (ir, latency) = trim_impulse_response(&raw_ir, &cfg.trim_params());
            log::info!("  trimmed IR latency (samples): {latency}");

            if produce & OUT_IR != 0 {
                save_output(cfg, &ir, &cfg.ir.file, &vars)?;
            }

            if produce & OUT_AUDIO != 0 {
                let source = if cfg.mastering { &child } else { &master };
                let mut audio = convolve(source, &ir, latency, dry, wet)?;

                if cfg.latency_compensation {
                    compensate_latency(&mut audio, latency.max(0) as usize);
                }
                if cfg.match_length {
                    match_length(&mut audio, source.frames());
                }
                normalize(&mut audio, db_to_gain(cfg.norm_gain), cfg.normalize);
                log::debug!("  output peak: {:.2} dB", gain_to_db(audio.peak()));

                save_output(cfg, &audio, &cfg.file, &vars)?;
            }
        }
    }

    Ok(())
}

fn save_output(
    cfg: &Config,
    buffer: &AudioBuffer,
    template: &str,
    vars: &HashMap<String, String>,
) -> Result<()> {
    if template.is_empty() {
        bail!("output file name template is empty");
    }
    let name = naming::expand(template, vars)?;
    let path = PathBuf::from(&name);
    let path = if path.is_absolute() || cfg.dst_path.is_empty() {
        path
    } else {
        Path::new(&cfg.dst_path).join(path)
    };
    save_audio_file(buffer, &path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::ir::TrimParams;

    fn sine(freq: f32, amp: f32, rate: u32, frames: usize) -> AudioBuffer {
        let samples = (0..frames)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect();
        AudioBuffer::from_channels(vec![samples], rate)
    }

    #[test]
    fn drywet_gain_floor_and_cap() {
        assert_eq!(drywet_to_gain(-1000.0), 0.0);
        assert_eq!(drywet_to_gain(-150.0), 0.0);
        assert!((drywet_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((drywet_to_gain(-6.0) - 0.501).abs() < 1e-2);
        // Values past the cap saturate instead of exploding.
        assert_eq!(drywet_to_gain(500.0), drywet_to_gain(150.0));
    }

    // Full pipeline on in-memory buffers: a child at half the master's
    // amplitude is restored to the master's level by the correction IR.
    #[test]
    fn correction_restores_master_level() {
        let rank = 12u32;
        let rate = 48000u32;
        let bins = 1usize << rank;
        // Bin-exact frequency so both spectra share the same shape.
        let freq = 100.0 * rate as f32 / bins as f32;

        let master = sine(freq, 1.0, rate, rate as usize);
        let child = sine(freq, 0.5, rate, rate as usize);

        let mp = spectral_profile(&master, rank);
        let cp = spectral_profile(&child, rank);

        // Auto-mastering orientation: ratio master/child, applied to the child.
        let raw_ir = timbre_impulse_response(&cp, &mp, rank, 48.0).unwrap();

        let params = TrimParams {
            head_cut: 0.0,
            tail_cut: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
        };
        let (ir, latency) = trim_impulse_response(&raw_ir, &params);
        assert_eq!(latency, (bins / 2) as isize);

        let out = convolve(&child, &ir, latency, 0.0, 1.0).unwrap();
        let peak = out.peak();
        assert!(
            (peak - 1.0).abs() < 0.1,
            "corrected peak {peak} not within 10% of the master level"
        );
    }

    // Identity correction: matching a recording against itself leaves the
    // signal body untouched once latency is compensated.
    #[test]
    fn self_correction_is_transparent() {
        let rank = 10u32;
        let rate = 48000u32;
        let bins = 1usize << rank;
        let freq = 40.0 * rate as f32 / bins as f32;

        let src = sine(freq, 0.8, rate, 24000);
        let profile = spectral_profile(&src, rank);
        let raw_ir = timbre_impulse_response(&profile, &profile, rank, 48.0).unwrap();

        let params = TrimParams {
            head_cut: 0.0,
            tail_cut: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
        };
        let (ir, latency) = trim_impulse_response(&raw_ir, &params);

        let mut out = convolve(&src, &ir, latency, 0.0, 1.0).unwrap();
        compensate_latency(&mut out, latency.max(0) as usize);
        match_length(&mut out, src.frames());

        // Compare away from the edges where the window taper bites.
        for i in 2000..20000 {
            let diff = (out.channel(0)[i] - src.channel(0)[i]).abs();
            assert!(diff < 0.05, "sample {i} diverged by {diff}");
        }
    }

    #[test]
    fn groups_without_master_or_files_are_skipped() {
        let mut cfg = Config::default();
        cfg.produce = vec!["all".into()];
        cfg.groups.insert(
            "empty".into(),
            FileGroup {
                master: String::new(),
                files: vec!["a.wav".into()],
            },
        );
        cfg.groups.insert(
            "childless".into(),
            FileGroup {
                master: "m.wav".into(),
                files: Vec::new(),
            },
        );
        // Nothing is loaded, so nothing can fail.
        process_file_groups(&cfg).unwrap();
    }

    #[test]
    fn empty_produce_mask_short_circuits() {
        let mut cfg = Config::default();
        cfg.groups.insert(
            "g".into(),
            FileGroup {
                master: "missing.wav".into(),
                files: vec!["also-missing.wav".into()],
            },
        );
        // The missing files would error if the group were processed.
        process_file_groups(&cfg).unwrap();
    }
}
