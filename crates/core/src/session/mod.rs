use std::sync::{Arc, Mutex};

use crate::history::{lock_history, SharedHistory};
use crate::{CaptureSink, HistoryConfig, HistoryState, Result, SampleHistory, SnapshotReader};

/// Owns the sample history for one audio session and hands out the
/// producer and consumer ends that share it.
#[derive(Debug)]
pub struct WaveformSession {
    config: HistoryConfig,
    history: SharedHistory,
}

impl WaveformSession {
    /// Allocates the full ring up front. Fails if the geometry is invalid.
    pub fn new(config: HistoryConfig) -> Result<Self> {
        let history = SampleHistory::new(config)?;
        tracing::info!(
            num_sets = config.num_sets,
            samples_per_set = config.samples_per_set,
            usable = config.usable_samples_per_set,
            "allocated sample history"
        );
        Ok(Self {
            config,
            history: Arc::new(Mutex::new(history)),
        })
    }

    /// Producer end, meant to be moved into the audio output callback.
    pub fn sink(&self) -> CaptureSink {
        CaptureSink::new(self.history.clone())
    }

    /// Consumer end, polled by the frame loop.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader::new(self.history.clone(), self.config)
    }

    pub fn state(&self) -> Result<HistoryState> {
        Ok(lock_history(&self.history)?.state())
    }

    pub fn cursor(&self) -> Result<usize> {
        Ok(lock_history(&self.history)?.cursor())
    }

    /// Clears the ring when playback restarts. Existing sinks and readers
    /// stay attached.
    pub fn reset(&self) -> Result<()> {
        lock_history(&self.history)?.reset();
        tracing::debug!("sample history reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn sink_and_reader_share_one_history() {
        let session = WaveformSession::new(HistoryConfig::new(4, 8, 8)).unwrap();
        assert_eq!(session.state().unwrap(), HistoryState::Uninitialized);

        session.sink().capture(&[0.75; 8], 1).unwrap();
        assert_eq!(session.state().unwrap(), HistoryState::SteadyState);
        assert_eq!(session.reader().snapshot().unwrap().newest(), &[0.75; 8]);
    }

    #[test]
    fn full_cycle_returns_cursor_to_start() {
        let session = WaveformSession::new(HistoryConfig::new(100, 512, 480)).unwrap();
        let sink = session.sink();
        let start = session.cursor().unwrap();

        for _ in 0..100 {
            sink.capture(&[0.5; 480], 1).unwrap();
        }

        assert_eq!(session.cursor().unwrap(), start);
        let snapshot = session.reader().snapshot().unwrap();
        assert!(snapshot.sets().all(|set| set.iter().all(|&s| s == 0.5)));
    }

    #[test]
    fn reset_clears_state_for_attached_handles() {
        let session = WaveformSession::new(HistoryConfig::new(3, 4, 4)).unwrap();
        let sink = session.sink();
        let reader = session.reader();
        sink.capture(&[1.0; 4], 1).unwrap();

        session.reset().unwrap();

        let snapshot = reader.snapshot().unwrap();
        assert_eq!(snapshot.cursor(), 0);
        assert!(snapshot.sets().flatten().all(|&s| s == 0.0));
    }

    #[test]
    fn concurrent_capture_never_exposes_torn_sets() {
        const ITERATIONS: usize = 5_000;
        const CHANNELS: usize = 2;

        let session = WaveformSession::new(HistoryConfig::new(16, 64, 48)).unwrap();
        let sink = session.sink();
        let reader = session.reader();

        let producer = thread::spawn(move || {
            let mut block = vec![0.0_f32; 48 * CHANNELS];
            for iteration in 1..=ITERATIONS {
                block.fill(iteration as f32);
                sink.capture(&block, CHANNELS).unwrap();
            }
        });

        let consumer = thread::spawn(move || {
            for _ in 0..ITERATIONS {
                let snapshot = reader.snapshot().unwrap();
                for set in snapshot.sets() {
                    let first = set[0];
                    assert!(
                        set.iter().all(|&s| s == first),
                        "observed a partially written set"
                    );
                }
                let newest = snapshot.newest()[0];
                assert_eq!(newest as u64, snapshot.captured_sets());
            }
        });

        producer.join().unwrap();
        consumer.join().unwrap();
        assert_eq!(session.reader().snapshot().unwrap().captured_sets(), ITERATIONS as u64);
    }
}
