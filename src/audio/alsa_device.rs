//! ALSA implementation of [`AudioPort`]: mono S16LE capture and playback
//! PCMs plus a mixer element for volume and amplifier power.

use std::sync::atomic::{AtomicBool, Ordering};

use alsa::mixer::{Mixer, Selem, SelemId};
use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};
use parking_lot::Mutex;

use super::port::AudioPort;

/// Consecutive failed recoveries before a write is abandoned.
const MAX_RECOVERY_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct AlsaConfig {
    pub capture_device: String,
    pub playback_device: String,
    /// Requested rate for both directions; the hardware may pick another.
    pub sample_rate: u32,
    pub mixer_card: String,
    pub mixer_control: String,
}

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
struct AlsaParams {
    sample_rate: u32,
    period_size: usize,
}

pub struct AlsaPort {
    capture: Mutex<PCM>,
    playback: Mutex<PCM>,
    input_rate: u32,
    output_rate: u32,
    input_enabled: AtomicBool,
    output_enabled: AtomicBool,
    mixer_card: String,
    mixer_control: String,
}

impl AlsaPort {
    pub fn open(config: &AlsaConfig) -> Result<Self> {
        let (capture, cap) = open_pcm(&config.capture_device, Direction::Capture, config.sample_rate)?;
        let (playback, pb) = open_pcm(&config.playback_device, Direction::Playback, config.sample_rate)?;

        // Both streams stay stopped until their path is enabled.
        if let Err(e) = capture.drop() {
            log::warn!("ALSA capture stop failed: {}", e);
        }
        if let Err(e) = playback.drop() {
            log::warn!("ALSA playback stop failed: {}", e);
        }

        log::info!(
            "AlsaPort ready: capture {}Hz (period {}), playback {}Hz (period {})",
            cap.sample_rate,
            cap.period_size,
            pb.sample_rate,
            pb.period_size,
        );

        Ok(Self {
            capture: Mutex::new(capture),
            playback: Mutex::new(playback),
            input_rate: cap.sample_rate,
            output_rate: pb.sample_rate,
            input_enabled: AtomicBool::new(false),
            output_enabled: AtomicBool::new(false),
            mixer_card: config.mixer_card.clone(),
            mixer_control: config.mixer_control.clone(),
        })
    }

    /// Mixers are not shareable across threads, so each call reopens one.
    fn with_selem(&self, f: impl FnOnce(&Selem) -> Result<()>) -> Result<()> {
        let mixer = Mixer::new(&self.mixer_card, false)
            .with_context(|| format!("Failed to open mixer '{}'", self.mixer_card))?;
        let id = SelemId::new(&self.mixer_control, 0);
        let selem = mixer
            .find_selem(&id)
            .with_context(|| format!("Mixer control '{}' not found", self.mixer_control))?;
        f(&selem)
    }

    fn set_amp_power(&self, on: bool) {
        let result = self.with_selem(|selem| {
            if selem.has_playback_switch() {
                selem.set_playback_switch_all(on as i32)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            log::warn!("Amplifier switch failed: {:#}", e);
        }
    }
}

impl AudioPort for AlsaPort {
    fn input_sample_rate(&self) -> u32 {
        self.input_rate
    }

    fn output_sample_rate(&self) -> u32 {
        self.output_rate
    }

    fn read(&self, dst: &mut [i16]) -> usize {
        if !self.input_enabled.load(Ordering::Relaxed) {
            dst.fill(0);
            return dst.len();
        }

        let pcm = self.capture.lock();
        let io = match pcm.io_i16() {
            Ok(io) => io,
            Err(e) => {
                log::error!("ALSA capture io unavailable: {}", e);
                dst.fill(0);
                return dst.len();
            }
        };

        let mut filled = 0;
        while filled < dst.len() {
            match io.readi(&mut dst[filled..]) {
                Ok(n) => filled += n,
                Err(e) => {
                    log::warn!("ALSA capture error: {}, recovering...", e);
                    if let Err(e2) = pcm.prepare() {
                        log::error!("Failed to recover PCM capture: {}", e2);
                    }
                    // The lost span is replaced with silence.
                    dst[filled..].fill(0);
                    break;
                }
            }
        }
        dst.len()
    }

    fn write(&self, data: &[i16]) {
        if !self.output_enabled.load(Ordering::Relaxed) {
            return;
        }

        let pcm = self.playback.lock();
        let io = match pcm.io_i16() {
            Ok(io) => io,
            Err(e) => {
                log::error!("ALSA playback io unavailable: {}", e);
                return;
            }
        };

        let mut written = 0;
        let mut retry_count = 0u32;
        while written < data.len() {
            match io.writei(&data[written..]) {
                Ok(n) => {
                    written += n;
                    retry_count = 0;
                }
                Err(e) => {
                    log::warn!("ALSA XRUN or error: {}, recovering...", e);
                    retry_count += 1;
                    if let Err(e2) = pcm.prepare() {
                        log::error!("Failed to recover PCM playback: {}", e2);
                        break;
                    }
                    if retry_count >= MAX_RECOVERY_RETRIES {
                        log::error!(
                            "Max recovery retries ({}) reached. Dropping {} unwritten frames.",
                            retry_count,
                            data.len() - written,
                        );
                        break;
                    }
                }
            }
        }
    }

    fn enable_input(&self, enable: bool) {
        if self.input_enabled.swap(enable, Ordering::Relaxed) == enable {
            return;
        }
        let pcm = self.capture.lock();
        let result = if enable {
            pcm.prepare().and_then(|_| pcm.start())
        } else {
            PCM::drop(&pcm)
        };
        if let Err(e) = result {
            log::error!("ALSA capture {} failed: {}", if enable { "start" } else { "stop" }, e);
        }
    }

    fn enable_output(&self, enable: bool) {
        if self.output_enabled.swap(enable, Ordering::Relaxed) == enable {
            return;
        }
        {
            let pcm = self.playback.lock();
            let result = if enable { pcm.prepare() } else { pcm.drain() };
            if let Err(e) = result {
                log::error!("ALSA playback {} failed: {}", if enable { "prepare" } else { "drain" }, e);
            }
        }
        self.set_amp_power(enable);
    }

    fn set_volume(&self, volume: u8) {
        let percent = volume.min(100) as i64;
        let result = self.with_selem(|selem| {
            let (min, max) = selem.get_playback_volume_range();
            selem.set_playback_volume_all(min + (max - min) * percent / 100)?;
            Ok(())
        });
        match result {
            Ok(()) => log::info!("Volume set to {}%", percent),
            Err(e) => log::warn!("Failed to set volume: {:#}", e),
        }
    }

    fn input_enabled(&self) -> bool {
        self.input_enabled.load(Ordering::Relaxed)
    }

    fn output_enabled(&self) -> bool {
        self.output_enabled.load(Ordering::Relaxed)
    }
}

fn open_pcm(device: &str, direction: Direction, sample_rate: u32) -> Result<(PCM, AlsaParams)> {
    let dir_name = match direction {
        Direction::Capture => "Capture",
        Direction::Playback => "Playback",
    };
    let pcm = PCM::new(device, direction, false)
        .with_context(|| format!("Failed to open PCM device '{}' for {}", device, dir_name))?;

    // Configure hardware parameters
    {
        let hwp = HwParams::any(&pcm).context("Failed to initialize HwParams")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels(1)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
        pcm.hw_params(&hwp)?;
    }

    // Read back actual negotiated parameters
    let params = {
        let hwp = pcm.hw_params_current()?;
        AlsaParams {
            sample_rate: hwp.get_rate()?,
            period_size: hwp.get_period_size()? as usize,
        }
    };

    log::info!(
        "ALSA {}: device={}, rate={}, period_size={}",
        dir_name,
        device,
        params.sample_rate,
        params.period_size,
    );

    Ok((pcm, params))
}
