use serde::Serialize;

use crate::history::{lock_history, SharedHistory};
use crate::{HistoryConfig, RenderConfig, Result, SetFeatures};

/// Linear age ramp: the oldest set sits near zero, the newest gets 1.0.
pub fn age_weight(age: usize, num_sets: usize) -> f32 {
    if num_sets <= 1 {
        return 1.0;
    }
    age.min(num_sets - 1) as f32 / (num_sets - 1) as f32
}

/// Per-vertex attributes consumed by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaveformPoint {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// Owned copy of every set's usable samples, ordered oldest to newest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformSnapshot {
    num_sets: usize,
    usable_samples: usize,
    cursor: usize,
    captured_sets: u64,
    samples: Vec<f32>,
}

impl WaveformSnapshot {
    /// Empty snapshot whose buffer already fits every usable sample.
    pub(crate) fn with_capacity(config: HistoryConfig) -> Self {
        Self {
            num_sets: config.num_sets,
            usable_samples: config.usable_samples_per_set,
            cursor: 0,
            captured_sets: 0,
            samples: Vec::with_capacity(config.point_count()),
        }
    }

    pub fn num_sets(&self) -> usize {
        self.num_sets
    }

    pub fn usable_samples(&self) -> usize {
        self.usable_samples
    }

    /// Ring index of the newest set at the time of the snapshot.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn captured_sets(&self) -> u64 {
        self.captured_sets
    }

    /// Samples of the set `age` steps from the oldest.
    pub fn set(&self, age: usize) -> &[f32] {
        let start = age * self.usable_samples;
        &self.samples[start..start + self.usable_samples]
    }

    pub fn newest(&self) -> &[f32] {
        self.set(self.num_sets - 1)
    }

    pub fn weight(&self, age: usize) -> f32 {
        age_weight(age, self.num_sets)
    }

    pub fn sets(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.samples.chunks_exact(self.usable_samples)
    }

    /// Builds the waterfall geometry. `features`, when given, swells the
    /// vertical displacement by the newest set's loudness.
    pub fn points(
        &self,
        render: &RenderConfig,
        features: Option<&SetFeatures>,
    ) -> Vec<WaveformPoint> {
        let gain = features
            .map(|features| 1.0 + render.reactivity * features.rms)
            .unwrap_or(1.0);
        let last_sample = self.usable_samples.saturating_sub(1).max(1) as f32;
        let newest_age = self.num_sets - 1;

        let mut points = Vec::with_capacity(self.samples.len());
        for (age, set) in self.sets().enumerate() {
            let emphasis = self.weight(age).powf(render.emphasis_exponent);
            let z = -((newest_age - age) as f32) * render.depth_spacing;

            for (index, &sample) in set.iter().enumerate() {
                let x = if self.usable_samples == 1 {
                    0.0
                } else {
                    -1.0 + 2.0 * index as f32 / last_sample
                };
                let y = sample * render.amplitude_scale * emphasis * gain;
                let mix = emphasis * sample.abs().min(1.0);

                points.push(WaveformPoint {
                    position: [x, y, z],
                    color: [
                        lerp(render.base_color[0], render.peak_color[0], mix),
                        lerp(render.base_color[1], render.peak_color[1], mix),
                        lerp(render.base_color[2], render.peak_color[2], mix),
                        emphasis,
                    ],
                });
            }
        }
        points
    }
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// Consumer side of the sample history, polled once per rendered frame.
///
/// The lock is held only while copying the usable samples out. Buffers are
/// sized before locking, and weighting and geometry happen on the copy.
/// Nothing is cached between frames.
#[derive(Clone)]
pub struct SnapshotReader {
    shared: SharedHistory,
    config: HistoryConfig,
}

impl SnapshotReader {
    pub(crate) fn new(shared: SharedHistory, config: HistoryConfig) -> Self {
        Self { shared, config }
    }

    pub fn snapshot(&self) -> Result<WaveformSnapshot> {
        let mut snapshot = WaveformSnapshot::with_capacity(self.config);
        self.snapshot_into(&mut snapshot)?;
        Ok(snapshot)
    }

    /// Refreshes `target` in place, reusing its buffer. Frame loops call this
    /// every frame so the steady state never allocates.
    pub fn snapshot_into(&self, target: &mut WaveformSnapshot) -> Result<()> {
        target.samples.clear();
        target.samples.reserve(self.config.point_count());

        let history = lock_history(&self.shared)?;
        for set in history.sets_by_age() {
            target.samples.extend_from_slice(set);
        }
        target.num_sets = history.num_sets();
        target.usable_samples = history.usable_samples();
        target.cursor = history.cursor();
        target.captured_sets = history.captured_sets();
        Ok(())
    }

    /// Snapshot plus geometry in one call, for callers that only draw.
    pub fn read_points(&self, render: &RenderConfig) -> Result<Vec<WaveformPoint>> {
        Ok(self.snapshot()?.points(render, None))
    }
}

impl std::fmt::Debug for SnapshotReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotReader").finish()
    }
}
