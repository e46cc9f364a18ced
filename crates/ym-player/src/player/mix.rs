//! MIX1 digital-stream playback.
//!
//! A MIX1 file replaces the register stream with raw PCM and a block list;
//! each block plays `nb_repeat` times at its own source rate. The mixer
//! walks the PCM with a Q12 fixed-point cursor and linear interpolation,
//! shifting bytes into the signed 16-bit range. Seeking goes through the
//! time keys precomputed at load, one per block repeat.

use crate::player::YmMusic;

/// Fixed-point precision of the mix cursor.
const MIX_PREC: u32 = 12;

impl YmMusic {
    /// Derive the seek keys and total duration from the block list. Repeat
    /// counts are clamped to 32 to bound the key table.
    pub(crate) fn compute_time_info(&mut self) {
        for block in &mut self.mix_blocks {
            if block.nb_repeat >= 32 {
                block.nb_repeat = 32;
            }
        }

        let total: usize = self.mix_blocks.iter().map(|b| usize::from(b.nb_repeat)).sum();
        self.time_keys = Vec::with_capacity(total);
        let mut time = 0u64;
        for (i, block) in self.mix_blocks.iter().enumerate() {
            for j in 0..block.nb_repeat {
                self.time_keys.push(crate::format::TimeKey {
                    time_ms: time as u32,
                    n_repeat: block.nb_repeat - j,
                    block: i as u16,
                });
                time += u64::from(block.sample_length) * 1000 / u64::from(block.replay_freq);
            }
        }
        self.music_len_ms = time as u32;
    }

    fn load_mix_block(&mut self, block: usize) {
        let b = &self.mix_blocks[block];
        self.mix_sample_start = b.sample_start as usize;
        self.mix_sample_length = b.sample_length << MIX_PREC;
        self.mix_step = (u32::from(b.replay_freq) << MIX_PREC) / self.replay_rate;
    }

    /// Advance the repeat/block cursor; wraps to block 0 at the end of the
    /// list, marking the music over unless looping.
    pub(crate) fn advance_mix_block(&mut self) {
        self.mix_repeat_left -= 1;
        if self.mix_repeat_left <= 0 {
            let mut next = match self.mix_pos {
                None => 0,
                Some(pos) => pos + 1,
            };
            if next >= self.mix_blocks.len() {
                next = 0;
                if !self.loop_mode {
                    self.music_over = true;
                }
                self.mix_pos_ms = 0;
                self.mix_pos_frac = 0;
            }
            self.mix_pos = Some(next);
            self.mix_repeat_left = i32::from(self.mix_blocks[next].nb_repeat);
        }
        let block = self.mix_pos.unwrap_or(0);
        self.load_mix_block(block);
        self.mix_cursor &= (1 << MIX_PREC) - 1;
    }

    /// Fill `buffer` from the digital stream.
    pub(crate) fn digit_mix_update(&mut self, buffer: &mut [i16]) {
        if self.music_over {
            buffer.fill(0);
            return;
        }
        if self.mix_pos.is_none() {
            self.mix_repeat_left = 0;
            self.advance_mix_block();
        }

        // Position bookkeeping in whole ms plus a sample-accurate remainder.
        self.mix_pos_frac += buffer.len() as u32 * 1000;
        self.mix_pos_ms += self.mix_pos_frac / self.replay_rate;
        self.mix_pos_frac %= self.replay_rate;

        for i in 0..buffer.len() {
            let idx = self.mix_sample_start + (self.mix_cursor >> MIX_PREC) as usize;
            let sa = i32::from(((u16::from(self.sample_buffer[idx])) << 8) as i16);
            let sb = if (self.mix_cursor >> MIX_PREC) + 1 < self.mix_sample_length >> MIX_PREC {
                i32::from(((u16::from(self.sample_buffer[idx + 1])) << 8) as i16)
            } else {
                sa
            };
            let frac = (self.mix_cursor & ((1 << MIX_PREC) - 1)) as i32;
            buffer[i] = (sa + (((sb - sa) * frac) >> MIX_PREC)) as i16;

            self.mix_cursor += self.mix_step;
            if self.mix_cursor >= self.mix_sample_length {
                self.advance_mix_block();
                if self.music_over {
                    buffer[i + 1..].fill(0);
                    return;
                }
            }
        }
    }

    /// Seek inside the digital stream using the precomputed keys.
    pub(crate) fn set_mix_time(&mut self, time_ms: u32) {
        if time_ms >= self.music_len_ms || self.time_keys.is_empty() {
            if time_ms == 0 {
                self.mix_pos = None;
                self.mix_cursor = 0;
                self.mix_pos_ms = 0;
                self.mix_pos_frac = 0;
            }
            return;
        }

        // Last key starting at or before the target.
        let idx = self
            .time_keys
            .partition_point(|key| key.time_ms <= time_ms)
            .saturating_sub(1);
        let key = self.time_keys[idx];
        let key_end = self
            .time_keys
            .get(idx + 1)
            .map(|next| next.time_ms)
            .unwrap_or(self.music_len_ms);

        let block = usize::from(key.block);
        self.mix_pos = Some(block);
        self.mix_repeat_left = i32::from(key.n_repeat);
        self.load_mix_block(block);

        let span = key_end - key.time_ms;
        let offset = if span > 0 {
            (u64::from(time_ms - key.time_ms) * u64::from(self.mix_blocks[block].sample_length)
                / u64::from(span)) as u32
        } else {
            0
        };
        self.mix_cursor = offset << MIX_PREC;
        self.mix_pos_ms = time_ms;
        self.mix_pos_frac = 0;
    }
}
