//! Fallback separation: stationary spectral gating.
//!
//! A noise profile is estimated from the head of the waveform. Every
//! time-frequency bin whose level does not rise above the profile's mean
//! plus `n_std_thresh` standard deviations is attenuated.
//!
//! The signal is gated in blocks of `block_frames` STFT frames and the
//! reconstructed samples are handed out as soon as no later frame overlaps
//! them, so working memory does not grow with the input length.

use super::{SeparationMethod, SeparationStrategy};
use crate::audio::{WavSink, Waveform};
use crate::defaults;
use crate::error::{PipelineError, Result};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const OUTPUT_FILE: &str = "vocals_nr.wav";
const MIN_MAGNITUDE: f32 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct SpectralGateConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    /// Standard deviations above the noise mean a bin must reach to pass.
    pub n_std_thresh: f32,
    /// 1.0 removes gated bins fully; 0.0 disables gating.
    pub prop_decrease: f32,
    /// Mask smoothing radius in frequency bins.
    pub freq_smooth_bins: usize,
    /// Mask smoothing radius in frames.
    pub time_smooth_frames: usize,
    /// Leading audio used as the noise profile.
    pub noise_profile_secs: f64,
    /// STFT frames gated per block.
    pub block_frames: usize,
}

impl Default for SpectralGateConfig {
    fn default() -> Self {
        Self {
            n_fft: 1024,
            hop_length: 256,
            n_std_thresh: 1.5,
            prop_decrease: 1.0,
            freq_smooth_bins: 2,
            time_smooth_frames: 1,
            noise_profile_secs: defaults::NOISE_PROFILE_SECS,
            block_frames: 2048,
        }
    }
}

/// Short-time Fourier transform with a periodic Hann window over a signal
/// zero-padded by half a frame on each side.
struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl Stft {
    fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let window = (0..n_fft)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n_fft as f32).cos())
            .collect();
        Self {
            n_fft,
            hop,
            window,
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        }
    }

    fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    fn pad(&self) -> usize {
        self.n_fft / 2
    }

    fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop
    }

    /// One-sided spectrum of frame `t`.
    fn frame(&self, signal: &[f32], t: usize) -> Vec<Complex<f32>> {
        let start = t * self.hop;
        let pad = self.pad();
        let mut buffer: Vec<Complex<f32>> = self
            .window
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let sample = (start + i)
                    .checked_sub(pad)
                    .and_then(|j| signal.get(j))
                    .copied()
                    .unwrap_or(0.0);
                Complex::new(sample * w, 0.0)
            })
            .collect();
        self.forward.process(&mut buffer);
        buffer.truncate(self.bins());
        buffer
    }

    fn analyze(&self, signal: &[f32]) -> Vec<Vec<Complex<f32>>> {
        (0..self.frame_count(signal.len()))
            .map(|t| self.frame(signal, t))
            .collect()
    }

    /// Unscaled inverse transform of a one-sided spectrum.
    fn invert(&self, half: &[Complex<f32>]) -> Vec<Complex<f32>> {
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];
        buffer[..half.len()].copy_from_slice(half);
        for k in 1..self.n_fft - half.len() + 1 {
            buffer[self.n_fft - k] = half[k].conj();
        }
        self.inverse.process(&mut buffer);
        buffer
    }
}

/// Windowed overlap-add over padded-signal positions starting at `base`.
struct OverlapAdd {
    pad: usize,
    len: usize,
    base: usize,
    output: Vec<f32>,
    weight: Vec<f32>,
}

impl OverlapAdd {
    fn new(pad: usize, len: usize) -> Self {
        Self {
            pad,
            len,
            base: 0,
            output: Vec::new(),
            weight: Vec::new(),
        }
    }

    fn add(&mut self, stft: &Stft, t: usize, half: &[Complex<f32>]) {
        let buffer = stft.invert(half);
        let scale = 1.0 / stft.n_fft as f32;
        let start = t * stft.hop - self.base;
        let end = start + stft.n_fft;
        if self.output.len() < end {
            self.output.resize(end, 0.0);
            self.weight.resize(end, 0.0);
        }
        for (i, value) in buffer.iter().enumerate() {
            let w = stft.window[i];
            self.output[start + i] += value.re * scale * w;
            self.weight[start + i] += w * w;
        }
    }

    /// Normalize and emit every position before `upto` that maps into the
    /// unpadded signal, then drop it from the buffers.
    fn release<F>(&mut self, upto: usize, emit: &mut F) -> Result<()>
    where
        F: FnMut(&[f32]) -> Result<()>,
    {
        let count = upto.saturating_sub(self.base);
        if self.output.len() < count {
            self.output.resize(count, 0.0);
            self.weight.resize(count, 0.0);
        }

        let first = self.pad.max(self.base);
        let last = (self.pad + self.len).min(upto).max(first);
        let ready: Vec<f32> = (first..last)
            .map(|p| {
                let i = p - self.base;
                let (o, w) = (self.output[i], self.weight[i]);
                if w > 1e-8 { o / w } else { o }
            })
            .collect();

        self.output.drain(..count);
        self.weight.drain(..count);
        self.base += count;

        if ready.is_empty() {
            Ok(())
        } else {
            emit(&ready)
        }
    }
}

fn to_db(c: &Complex<f32>) -> f32 {
    20.0 * c.norm().max(MIN_MAGNITUDE).log10()
}

/// Spectral gate noise reducer.
pub struct SpectralGate {
    config: SpectralGateConfig,
}

impl SpectralGate {
    pub fn new(config: SpectralGateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpectralGateConfig {
        &self.config
    }

    /// Gate `waveform` against a noise profile taken from its first
    /// `noise_profile_secs`. The output has the same length and rate.
    pub fn reduce(&self, waveform: &Waveform) -> Result<Waveform> {
        let mut samples = Vec::with_capacity(waveform.samples().len());
        self.reduce_into(waveform, |block| {
            samples.extend_from_slice(block);
            Ok(())
        })?;
        Ok(Waveform::new(samples, waveform.sample_rate()))
    }

    /// Like [`reduce`](Self::reduce), but passes the gated signal to `emit`
    /// in consecutive pieces of at most about one block.
    pub fn reduce_into<F>(&self, waveform: &Waveform, mut emit: F) -> Result<()>
    where
        F: FnMut(&[f32]) -> Result<()>,
    {
        if waveform.is_empty() {
            return Err(PipelineError::Separation {
                message: "Cannot denoise an empty waveform".to_string(),
            });
        }
        let cfg = &self.config;
        if cfg.n_fft < 2 || cfg.hop_length == 0 || cfg.hop_length > cfg.n_fft || cfg.block_frames == 0
        {
            return Err(PipelineError::Separation {
                message: format!(
                    "Invalid STFT geometry: n_fft={} hop={} block={}",
                    cfg.n_fft, cfg.hop_length, cfg.block_frames
                ),
            });
        }

        let samples = waveform.samples();
        let stft = Stft::new(cfg.n_fft, cfg.hop_length);

        let profile_len =
            ((cfg.noise_profile_secs * waveform.sample_rate() as f64) as usize).min(samples.len());
        let profile = if profile_len == 0 {
            samples
        } else {
            &samples[..profile_len]
        };
        let threshold = self.noise_threshold(&stft.analyze(profile), stft.bins());

        let frames = stft.frame_count(samples.len());
        let radius = cfg.time_smooth_frames;
        let mut ola = OverlapAdd::new(stft.pad(), samples.len());

        let mut block_start = 0;
        while block_start < frames {
            let block_end = block_start.saturating_add(cfg.block_frames).min(frames);
            // Neighbouring frames feed the time smoothing of the block edges.
            let halo_start = block_start.saturating_sub(radius);
            let halo_end = block_end.saturating_add(radius).min(frames);

            let spectrum: Vec<Vec<Complex<f32>>> = (halo_start..halo_end)
                .map(|t| stft.frame(samples, t))
                .collect();
            let raw = self.raw_mask(&spectrum, &threshold);

            for t in block_start..block_end {
                let local = t - halo_start;
                let gains = smoothed_gains(&raw, local, radius, cfg.freq_smooth_bins);
                let gated: Vec<Complex<f32>> = spectrum[local]
                    .iter()
                    .zip(&gains)
                    .map(|(bin, gain)| *bin * *gain)
                    .collect();
                ola.add(&stft, t, &gated);
            }

            ola.release(block_end * cfg.hop_length, &mut emit)?;
            block_start = block_end;
        }

        ola.release(stft.pad() + samples.len(), &mut emit)
    }

    /// Per-bin dB threshold: mean + n_std * std over the noise frames.
    fn noise_threshold(&self, noise: &[Vec<Complex<f32>>], bins: usize) -> Vec<f32> {
        let frames = noise.len().max(1) as f32;
        (0..bins)
            .map(|f| {
                let mean = noise.iter().map(|frame| to_db(&frame[f])).sum::<f32>() / frames;
                let var = noise
                    .iter()
                    .map(|frame| (to_db(&frame[f]) - mean).powi(2))
                    .sum::<f32>()
                    / frames;
                mean + self.config.n_std_thresh * var.sqrt()
            })
            .collect()
    }

    fn raw_mask(&self, spectrum: &[Vec<Complex<f32>>], threshold: &[f32]) -> Vec<Vec<f32>> {
        let keep = 1.0 - self.config.prop_decrease;
        spectrum
            .iter()
            .map(|frame| {
                frame
                    .iter()
                    .zip(threshold)
                    .map(|(bin, &thresh)| if to_db(bin) > thresh { 1.0 } else { keep })
                    .collect()
            })
            .collect()
    }
}

/// Box-filtered gains for frame `t` of `mask`, clamping the window at the
/// edges of `mask`.
fn smoothed_gains(mask: &[Vec<f32>], t: usize, time_radius: usize, freq_radius: usize) -> Vec<f32> {
    let frames = mask.len();
    let bins = mask[t].len();
    let t_lo = t.saturating_sub(time_radius);
    let t_hi = (t + time_radius).min(frames - 1);

    (0..bins)
        .map(|f| {
            let f_lo = f.saturating_sub(freq_radius);
            let f_hi = (f + freq_radius).min(bins - 1);
            let mut sum = 0.0;
            for row in &mask[t_lo..=t_hi] {
                sum += row[f_lo..=f_hi].iter().sum::<f32>();
            }
            sum / ((t_hi - t_lo + 1) * (f_hi - f_lo + 1)) as f32
        })
        .collect()
}

/// Separation strategy wrapping [`SpectralGate`].
pub struct SpectralGateSeparator {
    gate: SpectralGate,
}

impl SpectralGateSeparator {
    pub fn new(gate: SpectralGate) -> Self {
        Self { gate }
    }
}

impl SeparationStrategy for SpectralGateSeparator {
    fn name(&self) -> &str {
        "spectral-gate"
    }

    fn method(&self) -> SeparationMethod {
        SeparationMethod::FallbackNoiseReduction
    }

    fn separate(&self, input: &Path, workspace: &Path) -> Result<PathBuf> {
        let waveform = Waveform::read(input).map_err(|e| PipelineError::Separation {
            message: e.to_string(),
        })?;
        let output = workspace.join(OUTPUT_FILE);
        let mut sink = WavSink::create(&output, waveform.sample_rate())?;
        self.gate.reduce_into(&waveform, |block| sink.write(block))?;
        sink.finish()?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RATE: u32 = 16000;

    /// Deterministic uniform noise in [-amp, amp].
    fn noise(len: usize, amp: f32, seed: u32) -> Vec<f32> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                ((state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * amp
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn span(samples: &[f32], start_secs: f32, end_secs: f32) -> &[f32] {
        &samples[(start_secs * RATE as f32) as usize..(end_secs * RATE as f32) as usize]
    }

    /// 0.5 s of noise followed by 1 s of noise plus a 440 Hz tone.
    fn noisy_tone() -> Waveform {
        let mut samples = noise(RATE as usize * 3 / 2, 0.01, 7);
        for (i, s) in samples.iter_mut().enumerate().skip(RATE as usize / 2) {
            *s += 0.5 * (2.0 * PI * 440.0 * i as f32 / RATE as f32).sin();
        }
        Waveform::new(samples, RATE)
    }

    #[test]
    fn reduce_preserves_length_and_rate() {
        let input = noisy_tone();
        let output = SpectralGate::new(SpectralGateConfig::default())
            .reduce(&input)
            .unwrap();
        assert_eq!(output.samples().len(), input.samples().len());
        assert_eq!(output.sample_rate(), RATE);
    }

    #[test]
    fn reduce_attenuates_noise_and_keeps_tone() {
        let input = noisy_tone();
        let output = SpectralGate::new(SpectralGateConfig::default())
            .reduce(&input)
            .unwrap();

        let noise_in = rms(span(input.samples(), 0.05, 0.4));
        let noise_out = rms(span(output.samples(), 0.05, 0.4));
        assert!(noise_out < noise_in * 0.6, "{noise_out} vs {noise_in}");

        let tone_in = rms(span(input.samples(), 0.7, 1.4));
        let tone_out = rms(span(output.samples(), 0.7, 1.4));
        assert!(tone_out > tone_in * 0.7, "{tone_out} vs {tone_in}");
    }

    #[test]
    fn zero_decrease_reconstructs_input() {
        let input = noisy_tone();
        let gate = SpectralGate::new(SpectralGateConfig {
            prop_decrease: 0.0,
            ..SpectralGateConfig::default()
        });
        let output = gate.reduce(&input).unwrap();
        let max_err = input
            .samples()
            .iter()
            .zip(output.samples())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-3, "max error {max_err}");
    }

    #[test]
    fn shorter_than_profile_uses_whole_clip() {
        let input = Waveform::new(noise(2000, 0.1, 3), RATE);
        let output = SpectralGate::new(SpectralGateConfig::default())
            .reduce(&input)
            .unwrap();
        assert_eq!(output.samples().len(), 2000);
    }

    #[test]
    fn empty_waveform_is_error() {
        let result = SpectralGate::new(SpectralGateConfig::default())
            .reduce(&Waveform::new(Vec::new(), RATE));
        assert!(matches!(result, Err(PipelineError::Separation { .. })));
    }

    #[test]
    fn invalid_geometry_is_error() {
        let gate = SpectralGate::new(SpectralGateConfig {
            hop_length: 0,
            ..SpectralGateConfig::default()
        });
        assert!(gate.reduce(&noisy_tone()).is_err());

        let gate = SpectralGate::new(SpectralGateConfig {
            block_frames: 0,
            ..SpectralGateConfig::default()
        });
        assert!(gate.reduce(&noisy_tone()).is_err());
    }

    #[test]
    fn smoothing_averages_neighbours() {
        let mask = vec![vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 0.0]];
        let first = smoothed_gains(&mask, 0, 0, 1);
        assert!((first[0] - 0.5).abs() < 1e-6);
        assert!((first[1] - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(smoothed_gains(&mask, 1, 0, 1), vec![0.0, 0.0, 0.0]);

        let across_time = smoothed_gains(&mask, 1, 1, 0);
        assert!((across_time[1] - 0.5).abs() < 1e-6);
    }

    fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0f32, f32::max)
    }

    #[test]
    fn blocked_output_matches_single_block() {
        let input = noisy_tone();
        for time_smooth_frames in [0, 1, 3] {
            let config = SpectralGateConfig {
                time_smooth_frames,
                ..SpectralGateConfig::default()
            };
            let whole = SpectralGate::new(SpectralGateConfig {
                block_frames: usize::MAX,
                ..config.clone()
            })
            .reduce(&input)
            .unwrap();

            for block_frames in [1, 7, 32] {
                let blocked = SpectralGate::new(SpectralGateConfig {
                    block_frames,
                    ..config.clone()
                })
                .reduce(&input)
                .unwrap();
                assert_eq!(blocked.samples().len(), whole.samples().len());
                let diff = max_abs_diff(blocked.samples(), whole.samples());
                assert!(
                    diff < 1e-6,
                    "block={block_frames} smooth={time_smooth_frames} diff={diff}"
                );
            }
        }
    }

    #[test]
    fn reduce_into_emits_bounded_pieces() {
        let input = noisy_tone();
        let config = SpectralGateConfig {
            block_frames: 16,
            ..SpectralGateConfig::default()
        };
        let limit = config.block_frames * config.hop_length + config.n_fft;
        let gate = SpectralGate::new(config);

        let mut pieces = Vec::new();
        gate.reduce_into(&input, |block| {
            pieces.push(block.len());
            Ok(())
        })
        .unwrap();

        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|&len| len > 0 && len <= limit), "{pieces:?}");
        assert_eq!(pieces.iter().sum::<usize>(), input.samples().len());
    }

    #[test]
    fn reduce_into_stops_on_emit_error() {
        let gate = SpectralGate::new(SpectralGateConfig {
            block_frames: 8,
            ..SpectralGateConfig::default()
        });
        let mut calls = 0;
        let result = gate.reduce_into(&noisy_tone(), |_| {
            calls += 1;
            Err(PipelineError::Other("disk full".to_string()))
        });
        assert!(matches!(result, Err(PipelineError::Other(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn hop_equal_to_window_keeps_length() {
        let input = noisy_tone();
        let gate = SpectralGate::new(SpectralGateConfig {
            hop_length: 1024,
            block_frames: 3,
            ..SpectralGateConfig::default()
        });
        let output = gate.reduce(&input).unwrap();
        assert_eq!(output.samples().len(), input.samples().len());
    }

    #[test]
    fn separator_writes_into_workspace() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.wav");
        noisy_tone().write(&input).unwrap();

        let separator = SpectralGateSeparator::new(SpectralGate::new(SpectralGateConfig::default()));
        let output = separator.separate(&input, dir.path()).unwrap();

        assert_eq!(output, dir.path().join("vocals_nr.wav"));
        let written = Waveform::read(&output).unwrap();
        assert_eq!(written.sample_rate(), RATE);
        assert_eq!(written.samples().len(), RATE as usize * 3 / 2);
    }

    #[test]
    fn separator_unreadable_input_is_error() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.wav");
        std::fs::write(&input, b"junk").unwrap();
        let separator = SpectralGateSeparator::new(SpectralGate::new(SpectralGateConfig::default()));
        assert!(matches!(
            separator.separate(&input, dir.path()),
            Err(PipelineError::Separation { .. })
        ));
    }
}
