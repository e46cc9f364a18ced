//! Timer-effect state carried per voice.

use std::sync::Arc;

/// Fixed-point precision of the DigiDrum playback cursor.
pub(crate) const DRUM_PREC: u32 = 15;

/// One timer effect per voice; starting a new effect replaces the slot.
///
/// Effects survive ordinary register writes. The playback engine stops SID
/// voices explicitly on every frame, while a drum keeps running until its
/// sample is exhausted.
#[derive(Clone, Default)]
pub(crate) enum VoiceEffect {
    /// No effect active.
    #[default]
    Off,
    /// Timer-driven square overlay on the voice's amplitude register.
    Sid {
        /// Phase accumulator; bit 31 selects full volume vs silence.
        pos: u32,
        /// Per-sample phase increment, `timer_freq * 2^31 / replay_rate`.
        step: u32,
        /// Amplitude written while the square is high (0..15).
        vol: u8,
    },
    /// 8-bit PCM streamed into the voice DAC, bypassing the mixer gates.
    Drum {
        /// Sample data, shared with the loaded music's drum bank.
        data: Arc<[u8]>,
        /// Playback cursor in Q17.15.
        pos: u32,
        /// Per-sample increment, `freq << 15 / replay_rate`.
        step: u32,
        /// Sample length in bytes.
        size: u32,
    },
}

impl std::fmt::Debug for VoiceEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceEffect::Off => f.write_str("Off"),
            VoiceEffect::Sid { pos, step, vol } => f
                .debug_struct("Sid")
                .field("pos", pos)
                .field("step", step)
                .field("vol", vol)
                .finish(),
            VoiceEffect::Drum { pos, step, size, .. } => f
                .debug_struct("Drum")
                .field("pos", pos)
                .field("step", step)
                .field("size", size)
                .finish_non_exhaustive(),
        }
    }
}
