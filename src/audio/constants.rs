//! Central constants for the audio pipeline.

// ── PCM output format ────────────────────────────────────────────────────────

/// Output sample rate sent to the voice sink (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 48_000;

/// Interleaved stereo.
pub const CHANNELS: usize = 2;

/// Bytes per signed 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Samples per channel in one 20 ms frame at 48 kHz.
pub const FRAME_SAMPLES_PER_CHANNEL: usize = 960;

/// One 20 ms s16le stereo frame (960 × 2 × 2).
pub const FRAME_BYTES: usize = FRAME_SAMPLES_PER_CHANNEL * CHANNELS * BYTES_PER_SAMPLE;

/// Real-time duration of one frame.
pub const FRAME_DURATION_MS: u64 = 20;

// ── i16 PCM clip boundaries ──────────────────────────────────────────────────

pub const INT16_MAX_F: f32 = 32_767.0;
pub const INT16_MIN_F: f32 = -32_768.0;

// ── Volume ───────────────────────────────────────────────────────────────────

pub const MAX_VOLUME: u8 = 100;

// ── External processes ───────────────────────────────────────────────────────

/// ffmpeg input options that let a remote stream survive short network drops.
pub const FFMPEG_RECONNECT_ARGS: [&str; 6] = [
    "-reconnect",
    "1",
    "-reconnect_streamed",
    "1",
    "-reconnect_delay_max",
    "5",
];
