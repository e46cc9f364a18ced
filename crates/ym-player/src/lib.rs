//! YM music file player core.
//!
//! Loads and plays the YM-family register-dump formats produced by Atari ST
//! / Amstrad CPC / ZX Spectrum rippers, driving the [`ym2149`] chip
//! emulator:
//!
//! - **YM2 / YM3 / YM3b** — bare interleaved register dumps (YM3b adds a
//!   loop frame),
//! - **YM5 / YM6** — full headers with metadata, digi-drum banks and the
//!   timer effects (SID voice, DigiDrum, Sync-Buzzer),
//! - **MIX1** — digital PCM streams,
//! - **YMT1 / YMT2** — Universal Tracker modules,
//!
//! all transparently unpacked from their usual LZH (`-lh0-`/`-lh4-`/`-lh5-`)
//! containers.
//!
//! The crate is the player *core*: it turns file bytes into 16-bit mono
//! samples deterministically and leaves audio output, file I/O and UI to the
//! host.
//!
//! # Example
//! ```no_run
//! use ym_player::YmMusic;
//!
//! let data = std::fs::read("song.ym").unwrap();
//! let mut music = YmMusic::new(44_100);
//! music.load_memory(&data).unwrap();
//! music.set_loop_mode(false);
//!
//! let mut buffer = [0i16; 1024];
//! while music.update(&mut buffer) {
//!     // hand the buffer to the audio sink
//! }
//! ```

#![warn(missing_docs)]

mod bytes;
mod error;
mod format;
mod loader;
pub mod lzh;
mod player;

pub use error::{Result, YmError};
pub use format::{AMSTRAD_CLOCK, ATARI_CLOCK, MFP_CLOCK, MusicInfo, SPECTRUM_CLOCK};
pub use player::YmMusic;
