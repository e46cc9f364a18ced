//! YM2149 PSG emulation
//!
//! Integer-only, sample-accurate model of the Yamaha YM2149 (a.k.a.
//! AY-3-8910) Programmable Sound Generator: three square-wave tone channels,
//! one noise channel, the hardware envelope generator, mixer gates and the
//! per-voice 4-bit logarithmic DAC. On top of the plain chip it carries the
//! three Atari-era timer effects used by ST music drivers: SID voice,
//! DigiDrum sample playback and Sync-Buzzer envelope retrigger.
//!
//! The chip runs at the host replay rate: every call to
//! [`Ym2149Ex::next_sample`] produces one 16-bit mono sample, with all
//! oscillators advanced by precomputed fixed-point steps derived from the
//! master clock. Given the same register writes and replay rate, two runs
//! produce bit-identical output.
//!
//! # Quick start
//! ```
//! use ym2149::Ym2149Ex;
//!
//! let mut chip = Ym2149Ex::new(2_000_000, 44_100);
//! chip.write_register(0, 0x00); // Tone A period low
//! chip.write_register(1, 0x01); // Tone A period high
//! chip.write_register(7, 0x3e); // Mixer: tone A only
//! chip.write_register(8, 0x0f); // Volume A: max
//! let sample = chip.next_sample();
//! # let _ = sample;
//! ```
//!
//! For YM file playback (formats, LZH containers, VBL scheduling) use the
//! `ym-player` crate, which drives this chip.

#![warn(missing_docs)]

mod chip;
mod dc_filter;
mod effects;
mod tables;

pub use chip::Ym2149Ex;
pub use tables::YM_VOLUME_TABLE;
