use serde::Serialize;

use crate::{Result, WaveformPoint};

/// Rendering collaborator. A GPU backend would upload `points` as a vertex
/// buffer; everything here is backend agnostic.
pub trait VertexSink {
    fn submit(&mut self, points: &[WaveformPoint]) -> Result<()>;
}

/// Summary of the last submitted frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FrameStats {
    pub point_count: usize,
    pub max_displacement: f32,
    pub mean_alpha: f32,
}

impl FrameStats {
    pub fn from_points(points: &[WaveformPoint]) -> Self {
        if points.is_empty() {
            return Self::default();
        }

        let mut max_displacement = 0.0_f32;
        let mut alpha_sum = 0.0_f32;
        for point in points {
            max_displacement = max_displacement.max(point.position[1].abs());
            alpha_sum += point.color[3];
        }

        Self {
            point_count: points.len(),
            max_displacement,
            mean_alpha: alpha_sum / points.len() as f32,
        }
    }
}

/// Headless sink that keeps statistics instead of drawing.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    frames: u64,
    last: FrameStats,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last
    }
}

impl VertexSink for FrameRecorder {
    fn submit(&mut self, points: &[WaveformPoint]) -> Result<()> {
        self.frames += 1;
        self.last = FrameStats::from_points(points);
        tracing::trace!(frame = self.frames, points = self.last.point_count, "frame submitted");
        Ok(())
    }
}
