//! Data model shared by the loader and the playback engine.

use std::sync::Arc;

/// Atari ST PSG master clock (Hz).
pub const ATARI_CLOCK: u32 = 2_000_000;
/// Amstrad CPC PSG master clock (Hz).
pub const AMSTRAD_CLOCK: u32 = 1_000_000;
/// ZX Spectrum PSG master clock (Hz).
pub const SPECTRUM_CLOCK: u32 = 1_773_400;
/// MC68901 MFP timer clock (Hz); the ST special effects are clocked off it.
pub const MFP_CLOCK: u32 = 2_457_600;

/// MFP timer predivisor, indexed by the 3-bit prediv field of an effect.
pub(crate) const MFP_PREDIV: [u32; 8] = [0, 4, 10, 16, 50, 64, 100, 200];

// Attribute flags carried by YM5/YM6/MIX1/YMT headers.
pub(crate) const A_STREAM_INTERLEAVED: u32 = 1;
pub(crate) const A_DRUM_SIGNED: u32 = 2;
pub(crate) const A_DRUM_4BITS: u32 = 4;
pub(crate) const A_TIME_CONTROL: u32 = 8;

/// Identified file family; drives the per-frame interpretation of the
/// register stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SongType {
    /// Mad Max register dumps (fixed buzzer envelope, built-in drums).
    Ym2,
    /// Plain interleaved register dump.
    Ym3,
    /// YM3 with a trailing loop frame.
    Ym3b,
    /// Full header, digi-drum bank, r14/r15 effect timers.
    Ym5,
    /// YM5 layout with two generalized effect slots per frame.
    Ym6,
    /// Digital stream: catenated PCM blocks instead of register frames.
    Mix1,
    /// Universal Tracker, 4 bytes per voice per frame.
    Tracker1,
    /// Tracker with per-drum loop lengths.
    Tracker2,
}

impl SongType {
    pub(crate) fn is_mix(self) -> bool {
        matches!(self, SongType::Mix1)
    }

    pub(crate) fn is_tracker(self) -> bool {
        matches!(self, SongType::Tracker1 | SongType::Tracker2)
    }
}

/// Immutable description of a loaded song.
#[derive(Clone, Debug, Default)]
pub struct MusicInfo {
    /// Song title, empty if the format carries none.
    pub title: String,
    /// Composer or ripper credit.
    pub author: String,
    /// Free-form comment.
    pub comment: String,
    /// Format name, e.g. "YM 6".
    pub song_type: String,
    /// Driver name, e.g. "YM-Chip driver".
    pub player: String,
    /// Total duration in milliseconds.
    pub duration_ms: u32,
}

/// One digi-drum sample of the music's bank.
#[derive(Clone, Debug)]
pub(crate) struct DigiDrum {
    /// Unsigned 8-bit PCM, shared with any chip slot playing it.
    pub data: Arc<[u8]>,
    /// Loop length in bytes (tracker formats; equals the size elsewhere).
    pub rep_len: u32,
}

/// One block of a MIX1 digital stream.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MixBlock {
    /// Byte offset of the block's PCM in the sample buffer.
    pub sample_start: u32,
    /// Block length in bytes.
    pub sample_length: u32,
    /// How many times the block plays back to back.
    pub nb_repeat: u16,
    /// Source sample rate of the PCM (Hz).
    pub replay_freq: u16,
}

/// Seek key derived from the mix blocks at load time; one per repeat.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TimeKey {
    /// Absolute start time of this repeat (ms).
    pub time_ms: u32,
    /// Repeats left including this one.
    pub n_repeat: u16,
    /// Index into the block list.
    pub block: u16,
}
