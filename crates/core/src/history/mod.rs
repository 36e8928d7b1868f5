use std::sync::{Arc, Mutex, MutexGuard};

use crate::{HistoryConfig, Result, VisualiserError};

/// History shared between the audio callback and the frame loop.
pub type SharedHistory = Arc<Mutex<SampleHistory>>;

/// Whether any block has been captured since creation or the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryState {
    Uninitialized,
    SteadyState,
}

/// Fixed ring of equally sized sample sets.
///
/// The cursor names the most recently completed set, so the set right after
/// it (modulo the ring length) holds the oldest live data. Storage is
/// allocated once in [`SampleHistory::new`] and never resized.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    config: HistoryConfig,
    cursor: usize,
    captured_sets: u64,
    samples: Vec<f32>,
}

impl SampleHistory {
    pub fn new(config: HistoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cursor: 0,
            captured_sets: 0,
            samples: vec![0.0; config.num_sets * config.samples_per_set],
        })
    }

    pub fn num_sets(&self) -> usize {
        self.config.num_sets
    }

    pub fn usable_samples(&self) -> usize {
        self.config.usable_samples_per_set
    }

    /// Index of the most recently written set.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total number of blocks captured, including ones long overwritten.
    pub fn captured_sets(&self) -> u64 {
        self.captured_sets
    }

    pub fn state(&self) -> HistoryState {
        if self.captured_sets == 0 {
            HistoryState::Uninitialized
        } else {
            HistoryState::SteadyState
        }
    }

    /// Advances the cursor and copies the first channel of each interleaved
    /// frame into the new set. Returns the number of samples written.
    ///
    /// At most `usable_samples_per_set` samples are copied. Positions past
    /// the copied prefix keep whatever an earlier cycle left there. A
    /// trailing partial frame is ignored, and zero channels means zero
    /// frames. Never allocates.
    pub fn record_block(&mut self, interleaved: &[f32], channels: usize) -> usize {
        self.cursor = (self.cursor + 1) % self.config.num_sets;
        self.captured_sets += 1;

        if channels == 0 {
            return 0;
        }

        let start = self.cursor * self.config.samples_per_set;
        let usable = self.config.usable_samples_per_set;
        let target = &mut self.samples[start..start + usable];

        let mut written = 0;
        for (slot, frame) in target.iter_mut().zip(interleaved.chunks_exact(channels)) {
            *slot = frame[0];
            written += 1;
        }
        written
    }

    /// Usable samples of the set stored at `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index >= num_sets`.
    pub fn set(&self, index: usize) -> &[f32] {
        let start = index * self.config.samples_per_set;
        &self.samples[start..start + self.config.usable_samples_per_set]
    }

    /// Ring index of the set that is `age` steps old, where age 0 is the
    /// oldest set and `num_sets - 1` is the cursor.
    pub fn index_for_age(&self, age: usize) -> usize {
        (self.cursor + 1 + age) % self.config.num_sets
    }

    /// Iterates sets from oldest to newest.
    pub fn sets_by_age(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.config.num_sets).map(move |age| self.set(self.index_for_age(age)))
    }

    /// Zeroes the ring and returns it to [`HistoryState::Uninitialized`].
    pub fn reset(&mut self) {
        self.samples.fill(0.0);
        self.cursor = 0;
        self.captured_sets = 0;
    }
}

/// Locks the shared history, surfacing poisoning as a crate error.
pub fn lock_history(history: &SharedHistory) -> Result<MutexGuard<'_, SampleHistory>> {
    history
        .lock()
        .map_err(|_| VisualiserError::msg("sample history has been poisoned"))
}
