//! What a single `retro_run` produced.

/// One converted video frame: RGBA8888, rows packed at `width * 4` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// RGBA of the pixel at `(x, y)`, if inside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * 4;
        let px = self.pixels.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Everything the core emitted while running one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    /// Last frame delivered during the call, if it delivered a new one.
    pub video: Option<VideoFrame>,
    /// The core asked to repeat the previous frame.
    pub duplicated: bool,
    /// Interleaved stereo samples, left first.
    pub audio: Vec<i16>,
    pub input_polled: bool,
    /// Zero-based index of this frame since the game was loaded.
    pub frame_index: u64,
}

impl FrameOutput {
    /// Number of stereo sample pairs in [`audio`](Self::audio).
    pub fn audio_frames(&self) -> usize {
        self.audio.len() / 2
    }
}

/// Collects callback output between two `retro_run` calls.
#[derive(Debug, Default)]
pub(crate) struct FrameSink {
    video: Option<VideoFrame>,
    duplicated: bool,
    audio: Vec<i16>,
    input_polled: bool,
    /// Conversion target reused across frames.
    scratch: Vec<u8>,
}

impl FrameSink {
    pub fn scratch(&mut self) -> &mut Vec<u8> {
        &mut self.scratch
    }

    /// Publishes the frame currently held in the scratch buffer.
    pub fn commit_video(&mut self, width: u32, height: u32) {
        let pixels = std::mem::take(&mut self.scratch);
        self.video = Some(VideoFrame {
            width,
            height,
            pixels,
        });
        self.duplicated = false;
    }

    pub fn mark_duplicated(&mut self) {
        self.duplicated = true;
    }

    pub fn push_sample(&mut self, left: i16, right: i16) {
        self.audio.extend_from_slice(&[left, right]);
    }

    pub fn push_batch(&mut self, samples: &[i16]) {
        self.audio.extend_from_slice(samples);
    }

    pub fn mark_polled(&mut self) {
        self.input_polled = true;
    }

    /// Drains everything gathered so far into a [`FrameOutput`].
    pub fn take(&mut self, frame_index: u64) -> FrameOutput {
        let output = FrameOutput {
            video: self.video.take(),
            duplicated: std::mem::take(&mut self.duplicated),
            audio: std::mem::take(&mut self.audio),
            input_polled: std::mem::take(&mut self.input_polled),
            frame_index,
        };
        if let Some(video) = &output.video {
            // Keep the allocation for the next conversion.
            self.scratch.reserve(video.pixels.len());
        }
        output
    }

    pub fn clear(&mut self) {
        self.video = None;
        self.duplicated = false;
        self.audio.clear();
        self.input_polled = false;
    }
}
