//! Audio output collaborator.
//!
//! Real backends deliver one period of rendered, interleaved output per
//! callback on a high-priority thread they own. [`ToneDriver`] stands in for
//! such a backend by synthesising a test tone on its own thread.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::{AudioConfig, Result, VisualiserError};

/// Invoked once per period with the rendered interleaved output and its
/// channel count.
pub type OutputCallback = Box<dyn FnMut(&[f32], usize) + Send + 'static>;

/// Registration interface of an audio output backend.
pub trait AudioDriver {
    fn stream_spec(&self) -> &AudioConfig;

    fn start(&mut self, callback: OutputCallback) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;
}

/// Deterministic sine source whose level swells with a slow LFO, so the
/// waterfall shows movement.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    sample_rate: f32,
    frequency: f32,
    lfo_frequency: f32,
    phase: f32,
    lfo_phase: f32,
}

impl ToneGenerator {
    pub fn new(sample_rate: u32, frequency: f32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            frequency,
            lfo_frequency: 0.5,
            phase: 0.0,
            lfo_phase: 0.0,
        }
    }

    pub fn with_lfo(mut self, lfo_frequency: f32) -> Self {
        self.lfo_frequency = lfo_frequency;
        self
    }

    /// Fills `buffer` with whole frames, writing the same value to every
    /// channel.
    pub fn render(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let step = TAU * self.frequency / self.sample_rate;
        let lfo_step = TAU * self.lfo_frequency / self.sample_rate;

        for frame in buffer.chunks_exact_mut(channels) {
            let level = 0.55 + 0.45 * self.lfo_phase.sin();
            frame.fill(level * self.phase.sin());
            self.phase = (self.phase + step) % TAU;
            self.lfo_phase = (self.lfo_phase + lfo_step) % TAU;
        }
    }
}

/// Synthetic backend that renders a [`ToneGenerator`] on a dedicated thread
/// at the configured period cadence.
pub struct ToneDriver {
    spec: AudioConfig,
    frequency: f32,
    worker: Option<JoinHandle<()>>,
    should_stop: Arc<AtomicBool>,
    periods: Arc<AtomicU64>,
}

impl ToneDriver {
    pub fn new(spec: AudioConfig, frequency: f32) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            spec,
            frequency,
            worker: None,
            should_stop: Arc::new(AtomicBool::new(false)),
            periods: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Number of periods delivered since the driver was created.
    pub fn periods_delivered(&self) -> u64 {
        self.periods.load(Ordering::Relaxed)
    }
}

impl AudioDriver for ToneDriver {
    fn stream_spec(&self) -> &AudioConfig {
        &self.spec
    }

    fn start(&mut self, mut callback: OutputCallback) -> Result<()> {
        if self.worker.is_some() {
            return Err(VisualiserError::msg("tone driver is already running"));
        }

        self.should_stop.store(false, Ordering::SeqCst);
        let should_stop = self.should_stop.clone();
        let periods = self.periods.clone();
        let channels = self.spec.channels;
        let period = self.spec.period();
        let mut generator = ToneGenerator::new(self.spec.sample_rate, self.frequency);
        let mut buffer = vec![0.0_f32; self.spec.period_frames * channels];

        let worker = thread::Builder::new()
            .name("tone-driver".into())
            .spawn(move || {
                let mut deadline = Instant::now();
                while !should_stop.load(Ordering::SeqCst) {
                    generator.render(&mut buffer, channels);
                    callback(&buffer, channels);
                    periods.fetch_add(1, Ordering::Relaxed);

                    deadline += period;
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else if now - deadline > period * 4 {
                        // far behind; drop the backlog rather than spin
                        deadline = now;
                    }
                }
            })?;

        tracing::info!(
            sample_rate = self.spec.sample_rate,
            channels,
            period_frames = self.spec.period_frames,
            frequency = self.frequency,
            "tone driver started"
        );
        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.should_stop.store(true, Ordering::SeqCst);
        worker
            .join()
            .map_err(|_| VisualiserError::msg("tone driver thread panicked"))?;
        tracing::info!(periods = self.periods_delivered(), "tone driver stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for ToneDriver {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(%err, "failed to stop tone driver");
        }
    }
}

impl std::fmt::Debug for ToneDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToneDriver")
            .field("spec", &self.spec)
            .field("frequency", &self.frequency)
            .field("running", &self.worker.is_some())
            .finish()
    }
}

/// Wraps a [`crate::CaptureSink`] as a driver callback. Capture failures are
/// logged, never propagated into the audio thread.
pub fn capture_callback(sink: crate::CaptureSink) -> OutputCallback {
    Box::new(move |output: &[f32], channels: usize| {
        if let Err(err) = sink.capture(output, channels) {
            tracing::error!(%err, "dropping audio period");
        }
    })
}
