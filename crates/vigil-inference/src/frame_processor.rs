//! Wraps a `DetectionEngine` with frame-rate sampling: run inference at a
//! base rate, burst to a higher rate while a rule has recently fired.

#[derive(Debug, Clone, Copy)]
pub struct FrameProcessorConfig {
    pub default_fps: f64,
    pub burst_fps: f64,
    pub source_fps: f64,
    /// Frames within which a recent event extends the burst window.
    pub burst_window_frames: u64,
}

impl Default for FrameProcessorConfig {
    fn default() -> Self {
        Self {
            default_fps: 5.0,
            burst_fps: 30.0,
            source_fps: 30.0,
            burst_window_frames: 30,
        }
    }
}

/// Decides which frames participate in inference; non-sampled frames are
/// read-and-discarded to keep the decoder in sync.
pub struct FrameProcessor {
    config: FrameProcessorConfig,
    last_event_frame: Option<u64>,
}

impl FrameProcessor {
    pub fn new(config: FrameProcessorConfig) -> Self {
        Self {
            config,
            last_event_frame: None,
        }
    }

    /// Call when a rule fires on `frame_number`, to extend the burst
    /// window for subsequent frames.
    pub fn record_event(&mut self, frame_number: u64) {
        self.last_event_frame = Some(frame_number);
    }

    fn event_recent(&self, frame_number: u64) -> bool {
        match self.last_event_frame {
            Some(last) => frame_number.saturating_sub(last) <= self.config.burst_window_frames,
            None => false,
        }
    }

    /// Whether `frame_number` should be sampled, given whether an event
    /// has fired within the last `burst_window_frames` frames.
    pub fn should_sample_frame(&self, frame_number: u64) -> bool {
        let event_recent = self.event_recent(frame_number);
        let target_fps = if event_recent {
            self.config.burst_fps
        } else {
            self.config.default_fps
        };
        if self.config.source_fps <= 0.0 || target_fps <= 0.0 {
            return false;
        }
        let stride = (self.config.source_fps / target_fps).max(1.0).round() as u64;
        frame_number % stride.max(1) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_rate_samples_every_nth_frame() {
        let config = FrameProcessorConfig {
            default_fps: 5.0,
            burst_fps: 30.0,
            source_fps: 30.0,
            burst_window_frames: 30,
        };
        let processor = FrameProcessor::new(config);
        // stride = 30/5 = 6
        assert!(processor.should_sample_frame(0));
        assert!(!processor.should_sample_frame(1));
        assert!(processor.should_sample_frame(6));
    }

    #[test]
    fn burst_rate_kicks_in_after_recent_event() {
        let config = FrameProcessorConfig {
            default_fps: 5.0,
            burst_fps: 30.0,
            source_fps: 30.0,
            burst_window_frames: 30,
        };
        let mut processor = FrameProcessor::new(config);
        processor.record_event(100);
        // stride = 30/30 = 1, every frame sampled within the burst window
        assert!(processor.should_sample_frame(101));
        assert!(processor.should_sample_frame(102));
    }
}
