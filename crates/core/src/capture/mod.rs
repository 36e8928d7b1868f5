use crate::history::{lock_history, SharedHistory};
use crate::Result;

/// Producer side of the sample history, handed to the audio output callback.
///
/// Each call holds the history lock only for one bounded copy of at most
/// `usable_samples_per_set` values and performs no allocation.
#[derive(Clone)]
pub struct CaptureSink {
    shared: SharedHistory,
}

impl CaptureSink {
    pub(crate) fn new(shared: SharedHistory) -> Self {
        Self { shared }
    }

    /// Records one driver period of interleaved frames. Only the first
    /// channel is kept; over-long blocks are truncated silently.
    pub fn capture(&self, interleaved: &[f32], channels: usize) -> Result<usize> {
        let written = {
            let mut history = lock_history(&self.shared)?;
            history.record_block(interleaved, channels)
        };
        tracing::trace!(written, channels, "captured block");
        Ok(written)
    }
}

impl std::fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSink").finish()
    }
}
