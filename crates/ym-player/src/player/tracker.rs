//! YM-Tracker (YMT1/YMT2) playback.
//!
//! Up to eight sample voices, each driven by a 4-byte line per frame
//! (`note_on`, `volume`, `freq_hi`, `freq_lo`). Voices walk their drum
//! sample with a Q16 cursor, apply a precomputed 256×64 volume table with
//! linear interpolation, and sum additively into the output buffer.

use crate::format::A_STREAM_INTERLEAVED;
use crate::player::YmMusic;

use std::sync::Arc;

/// Maximum number of tracker voices.
pub(crate) const MAX_VOICE: usize = 8;

/// Fixed-point precision of the sample cursor.
const YMT_PREC: u32 = 16;

/// State of one tracker voice.
#[derive(Clone, Debug, Default)]
pub(crate) struct TrackerVoice {
    pub data: Option<Arc<[u8]>>,
    pub sample_pos: u32,
    pub sample_size: u32,
    pub rep_len: u32,
    pub volume: i32,
    pub freq: u32,
    pub looping: bool,
    pub running: bool,
}

impl YmMusic {
    /// Build the volume table and de-interleave the line stream. Called once
    /// at load; `vol_max_percent` spreads the headroom over the voices.
    pub(crate) fn tracker_init(&mut self, vol_max_percent: i32) {
        for voice in &mut self.tracker_voices {
            voice.running = false;
        }
        self.tracker_samples_before = 0;

        let scale = (256 * vol_max_percent) / (self.nb_voice as i32 * 100);
        self.tracker_volume_table = Vec::with_capacity(256 * 64);
        for vol in 0..64i32 {
            for s in -128..128i32 {
                self.tracker_volume_table.push(((s * scale * vol) / 64) as i16);
            }
        }

        self.tracker_deinterleave();
    }

    /// Line streams may be stored column-major like the register formats;
    /// rewrite to one line per voice per frame.
    fn tracker_deinterleave(&mut self) {
        if self.attrib & A_STREAM_INTERLEAVED == 0 {
            return;
        }
        let step = 4 * self.nb_voice;
        let total = step * self.nb_frame;
        let mut out = vec![0u8; total];
        let mut src = 0;
        for column in 0..step {
            let mut dst = column;
            for _ in 0..self.nb_frame {
                out[dst] = self.stream[src];
                src += 1;
                dst += step;
            }
        }
        self.stream = out;
        self.attrib &= !A_STREAM_INTERLEAVED;
    }

    /// Read one frame of voice lines. A zero frequency stops the voice; a
    /// `note_on` other than 0xFF retriggers it with the indexed drum.
    fn tracker_player(&mut self) {
        let offset = self.current_frame * self.stream_inc;
        for i in 0..self.nb_voice {
            let line = &self.stream[offset + i * 4..offset + i * 4 + 4];
            let (note_on, volume) = (line[0], line[1]);
            let freq = u32::from(line[2]) << 8 | u32::from(line[3]);

            if freq != 0 {
                let drum = if note_on != 0xff {
                    self.drums.get(usize::from(note_on)).cloned()
                } else {
                    None
                };
                let voice = &mut self.tracker_voices[i];
                voice.freq = freq;
                voice.volume = i32::from(volume & 63);
                voice.looping = volume & 0x40 != 0;
                if let Some(drum) = drum {
                    voice.running = true;
                    voice.sample_size = drum.data.len() as u32;
                    voice.rep_len = drum.rep_len;
                    voice.data = Some(drum.data);
                    voice.sample_pos = 0;
                }
            } else {
                self.tracker_voices[i].running = false;
                self.tracker_voices[i].freq = 0;
            }
        }

        self.current_frame += 1;
        if self.current_frame >= self.nb_frame {
            if !self.loop_mode {
                self.music_over = true;
            }
            self.current_frame = self.loop_frame;
        }
    }

    /// Mix one voice into `buffer`.
    fn tracker_voice_add(&mut self, index: usize, buffer: &mut [i16]) {
        let shift = self.tracker_freq_shift;
        let replay_rate = self.replay_rate;
        let voice = &mut self.tracker_voices[index];
        if !voice.running {
            return;
        }
        let Some(data) = voice.data.clone() else {
            voice.running = false;
            return;
        };

        let table_base = 256 * (voice.volume & 63) as usize;
        let table = &self.tracker_volume_table[table_base..table_base + 256];

        let step =
            ((u64::from(voice.freq) << (YMT_PREC + shift)) / u64::from(replay_rate)) as u32;
        let sample_end = voice.sample_size << YMT_PREC;
        let rep_len = voice.rep_len << YMT_PREC;
        let mut pos = voice.sample_pos;

        for out in buffer.iter_mut() {
            let idx = (pos >> YMT_PREC) as usize;
            if idx >= data.len() {
                voice.running = false;
                break;
            }
            let va = i32::from(table[usize::from(data[idx])]);
            let vb = if pos < sample_end.saturating_sub(1 << YMT_PREC) {
                match data.get(idx + 1) {
                    Some(&next) => i32::from(table[usize::from(next)]),
                    None => va,
                }
            } else {
                va
            };
            let frac = (pos & ((1 << YMT_PREC) - 1)) as i32;
            let mixed = va + (((vb - va) * frac) >> YMT_PREC);
            *out = out.wrapping_add(mixed as i16);

            pos += step;
            if pos >= sample_end {
                if voice.looping {
                    pos = pos.wrapping_sub(rep_len);
                } else {
                    voice.running = false;
                    break;
                }
            }
        }
        voice.sample_pos = pos;
    }

    /// Fill `buffer` from the tracker voices, stepping frames at the player
    /// rate.
    pub(crate) fn tracker_update(&mut self, buffer: &mut [i16]) {
        buffer.fill(0);
        if self.music_over {
            return;
        }

        let mut pos = 0;
        let mut remaining = buffer.len();
        while remaining > 0 {
            if self.tracker_samples_before == 0 {
                self.tracker_player();
                if self.music_over {
                    return;
                }
                self.tracker_samples_before =
                    (self.replay_rate / self.player_rate).max(1) as usize;
            }
            let nbs = self.tracker_samples_before.min(remaining);
            self.tracker_samples_before -= nbs;
            if nbs > 0 {
                for voice in 0..self.nb_voice {
                    self.tracker_voice_add(voice, &mut buffer[pos..pos + nbs]);
                }
                pos += nbs;
                remaining -= nbs;
            }
        }
    }
}
