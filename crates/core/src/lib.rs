//! Core library for the audio-reactive waveform visualiser.
//!
//! A fixed ring of sample sets ([`SampleHistory`]) is written by the audio
//! output callback through a [`CaptureSink`] and read once per frame through
//! a [`SnapshotReader`]. Both ends share one mutex owned by a
//! [`WaveformSession`]. The remaining modules wire that core to an audio
//! driver, a renderer and a frame clock.

pub mod analysis;
pub mod capture;
pub mod config;
pub mod driver;
pub mod error;
pub mod history;
pub mod render;
pub mod session;
pub mod snapshot;
pub mod timeline;

pub use analysis::{SetAnalyzer, SetFeatures};
pub use capture::CaptureSink;
pub use config::{AppConfig, AudioConfig, HistoryConfig, RenderConfig};
pub use driver::{capture_callback, AudioDriver, OutputCallback, ToneDriver, ToneGenerator};
pub use error::{Result, VisualiserError};
pub use history::{HistoryState, SampleHistory, SharedHistory};
pub use render::{FrameRecorder, FrameStats, VertexSink};
pub use session::WaveformSession;
pub use snapshot::{age_weight, SnapshotReader, WaveformPoint, WaveformSnapshot};
pub use timeline::FrameClock;
