//! Per-frame special-effect decoding for YM5 and YM6.
//!
//! Both formats smuggle effect parameters through otherwise-unused register
//! bits: the voice selector lives in the high nibble of a period register,
//! the MFP predivisor in the top bits of another, and r14/r15 carry the
//! timer counts. The effect frequency is always
//! `MFP_CLOCK / (prediv * count)`.

use crate::format::{MFP_CLOCK, MFP_PREDIV};
use crate::player::YmMusic;

impl YmMusic {
    /// YM5 carries one SID slot (keyed off r1/r6/r14) and one DigiDrum slot
    /// (keyed off r3/r8/r15) per frame.
    pub(crate) fn read_ym5_effects(&mut self, regs: &[u8; 16]) {
        let code = (regs[1] >> 4) & 3;
        if code != 0 {
            let voice = usize::from(code - 1);
            let timer = MFP_PREDIV[usize::from((regs[6] >> 5) & 7)] * u32::from(regs[14]);
            if timer != 0 {
                self.chip
                    .sid_start(voice, MFP_CLOCK / timer, regs[voice + 8] & 15);
            }
        }

        let code = (regs[3] >> 4) & 3;
        if code != 0 {
            let voice = usize::from(code - 1);
            let ndrum = usize::from(regs[8 + voice] & 31);
            if ndrum < self.drums.len() {
                let timer = MFP_PREDIV[usize::from((regs[8] >> 5) & 7)] * u32::from(regs[15]);
                if timer != 0 {
                    let drum = self.drums[ndrum].data.clone();
                    self.chip.drum_start(voice, drum, MFP_CLOCK / timer);
                }
            }
        }
    }

    /// One YM6 effect slot: `regs[code]` selects voice (bits 4-5) and action
    /// (bits 6-7), `regs[prediv]` the predivisor, `regs[count]` the count.
    /// Action 0x80 (Sinus-SID) degrades to a plain SID voice.
    pub(crate) fn read_ym6_effect(
        &mut self,
        regs: &[u8; 16],
        code: usize,
        prediv: usize,
        count: usize,
    ) {
        let effect = regs[code] & 0xf0;
        if effect & 0x30 == 0 {
            return;
        }
        let voice = usize::from(((effect & 0x30) >> 4) - 1);
        let timer = MFP_PREDIV[usize::from((regs[prediv] >> 5) & 7)] * u32::from(regs[count]);
        if timer == 0 {
            return;
        }
        let freq = MFP_CLOCK / timer;

        match effect & 0xc0 {
            0x00 | 0x80 => self.chip.sid_start(voice, freq, regs[voice + 8] & 15),
            0x40 => {
                let ndrum = usize::from(regs[voice + 8] & 31);
                if ndrum < self.drums.len() {
                    let drum = self.drums[ndrum].data.clone();
                    self.chip.drum_start(voice, drum, freq);
                }
            }
            _ => self.chip.sync_buzzer_start(freq, regs[voice + 8] & 15),
        }
    }
}
