//! The playback engine.
//!
//! [`YmMusic`] owns the chip, the decoded music and the scheduler state. For
//! register-dump formats it replays one frame of register writes per VBL and
//! lets the chip fill the samples in between; MIX1 and the trackers bypass
//! the PSG and mix PCM directly. Everything is single-threaded and
//! non-blocking: `update` never suspends and allocates nothing.

mod effects;
mod madmax;
pub(crate) mod mix;
pub(crate) mod tracker;

use ym2149::Ym2149Ex;

use crate::error::Result;
use crate::format::{
    A_TIME_CONTROL, ATARI_CLOCK, MFP_CLOCK, DigiDrum, MixBlock, MusicInfo, SongType, TimeKey,
};
use crate::lzh;
use self::tracker::{MAX_VOICE, TrackerVoice};

/// A loaded YM music and its playback state.
///
/// Create one per output stream, load a file image with
/// [`load_memory`](Self::load_memory), then pull samples with
/// [`update`](Self::update) from the audio producer. Control calls (`play`,
/// `pause`, seeking, loop mode) may come from another context as long as the
/// host serializes access.
pub struct YmMusic {
    pub(crate) chip: Ym2149Ex,
    pub(crate) song_type: SongType,
    pub(crate) nb_frame: usize,
    pub(crate) loop_frame: usize,
    pub(crate) current_frame: usize,
    pub(crate) drums: Vec<DigiDrum>,
    pub(crate) stream: Vec<u8>,
    pub(crate) stream_inc: usize,
    pub(crate) attrib: u32,
    pub(crate) player_rate: u32,
    pub(crate) replay_rate: u32,
    pub(crate) inner_sample_pos: usize,
    pub(crate) music_ok: bool,
    pub(crate) paused: bool,
    pub(crate) music_over: bool,
    pub(crate) loop_mode: bool,

    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) comment: String,
    pub(crate) type_name: String,
    pub(crate) player_name: String,

    // MIX1 digital stream.
    pub(crate) mix_blocks: Vec<MixBlock>,
    pub(crate) sample_buffer: Vec<u8>,
    pub(crate) mix_pos: Option<usize>,
    pub(crate) mix_repeat_left: i32,
    pub(crate) mix_sample_start: usize,
    pub(crate) mix_sample_length: u32,
    pub(crate) mix_step: u32,
    pub(crate) mix_cursor: u32,
    pub(crate) time_keys: Vec<TimeKey>,
    pub(crate) music_len_ms: u32,
    pub(crate) mix_pos_ms: u32,
    pub(crate) mix_pos_frac: u32,

    // Tracker.
    pub(crate) nb_voice: usize,
    pub(crate) tracker_voices: [TrackerVoice; MAX_VOICE],
    pub(crate) tracker_samples_before: usize,
    pub(crate) tracker_volume_table: Vec<i16>,
    pub(crate) tracker_freq_shift: u32,
}

impl YmMusic {
    /// Create a player producing mono samples at `replay_rate` Hz
    /// (0 selects the default 44100).
    pub fn new(replay_rate: u32) -> Self {
        let rate = if replay_rate == 0 { 44_100 } else { replay_rate };
        Self {
            chip: Ym2149Ex::new(ATARI_CLOCK, rate),
            song_type: SongType::Ym3,
            nb_frame: 0,
            loop_frame: 0,
            current_frame: 0,
            drums: Vec::new(),
            stream: Vec::new(),
            stream_inc: 14,
            attrib: 0,
            player_rate: 50,
            replay_rate: rate,
            inner_sample_pos: 0,
            music_ok: false,
            paused: true,
            music_over: false,
            loop_mode: false,
            title: String::new(),
            author: String::new(),
            comment: String::new(),
            type_name: String::new(),
            player_name: String::new(),
            mix_blocks: Vec::new(),
            sample_buffer: Vec::new(),
            mix_pos: None,
            mix_repeat_left: 0,
            mix_sample_start: 0,
            mix_sample_length: 0,
            mix_step: 0,
            mix_cursor: 0,
            time_keys: Vec::new(),
            music_len_ms: 0,
            mix_pos_ms: 0,
            mix_pos_frac: 0,
            nb_voice: 0,
            tracker_voices: Default::default(),
            tracker_samples_before: 0,
            tracker_volume_table: Vec::new(),
            tracker_freq_shift: 0,
        }
    }

    /// Load a YM file image (optionally LZH-packed) and get ready to play.
    ///
    /// On failure the player is left unloaded and every runtime call behaves
    /// as if stopped.
    pub fn load_memory(&mut self, data: &[u8]) -> Result<()> {
        self.stop();
        self.unload();

        let depacked = if lzh::is_lzh(data) {
            lzh::decompress(data)?
        } else {
            data.to_vec()
        };
        if let Err(err) = self.ym_decode(depacked) {
            self.unload();
            return Err(err);
        }

        self.chip.reset();
        self.music_ok = true;
        self.paused = false;
        Ok(())
    }

    /// Drop the loaded music and return to the unloaded state.
    pub fn unload(&mut self) {
        self.music_ok = false;
        self.paused = true;
        self.music_over = false;
        self.attrib = 0;
        self.nb_frame = 0;
        self.loop_frame = 0;
        self.current_frame = 0;
        self.inner_sample_pos = 0;
        self.drums.clear();
        self.stream.clear();
        self.title.clear();
        self.author.clear();
        self.comment.clear();
        self.type_name.clear();
        self.player_name.clear();
        self.mix_blocks.clear();
        self.sample_buffer.clear();
        self.mix_pos = None;
        self.time_keys.clear();
        self.music_len_ms = 0;
        self.mix_pos_ms = 0;
        self.mix_pos_frac = 0;
        self.nb_voice = 0;
        self.tracker_voices = Default::default();
        self.tracker_volume_table.clear();
    }

    /// Fill `buffer` with the next mono samples.
    ///
    /// Always writes exactly `buffer.len()` samples. Returns `false` once
    /// the song has ended with looping off; the buffer is zeroed in that
    /// case (and while paused or unloaded).
    pub fn update(&mut self, buffer: &mut [i16]) -> bool {
        if !self.music_ok || self.paused || self.music_over {
            buffer.fill(0);
            return !self.music_over;
        }

        if self.song_type.is_mix() {
            self.digit_mix_update(buffer);
        } else if self.song_type.is_tracker() {
            self.tracker_update(buffer);
        } else {
            self.register_stream_update(buffer);
        }
        true
    }

    /// The VBL scheduler of the register-dump formats: replay one frame of
    /// register writes every `replay_rate / player_rate` samples.
    fn register_stream_update(&mut self, buffer: &mut [i16]) {
        let vbl_samples = (self.replay_rate / self.player_rate).max(1) as usize;
        let mut pos = 0;
        let mut remaining = buffer.len();

        while remaining > 0 {
            let mut to_compute = vbl_samples - self.inner_sample_pos;
            if to_compute > remaining {
                to_compute = remaining;
            }
            self.inner_sample_pos += to_compute;
            if self.inner_sample_pos >= vbl_samples {
                self.player_frame();
                self.inner_sample_pos -= vbl_samples;
            }
            if to_compute > 0 {
                self.chip.update(&mut buffer[pos..pos + to_compute]);
                pos += to_compute;
            }
            remaining -= to_compute;
        }
    }

    /// Replay one frame: registers 0..10 go to the chip verbatim, SID and
    /// Sync-Buzzer are rearmed from scratch, and the envelope registers are
    /// written per format (0xFF in r13 means "do not retrigger").
    fn player_frame(&mut self) {
        if self.current_frame >= self.nb_frame {
            if self.loop_mode {
                self.current_frame = self.loop_frame;
            } else {
                self.music_over = true;
                self.chip.reset();
                return;
            }
        }

        let offset = self.current_frame * self.stream_inc;
        let mut frame = [0u8; 16];
        frame[..self.stream_inc].copy_from_slice(&self.stream[offset..offset + self.stream_inc]);

        for reg in 0..=10 {
            self.chip.write_register(reg, frame[reg]);
        }
        self.chip.sid_stop(0);
        self.chip.sid_stop(1);
        self.chip.sid_stop(2);
        self.chip.sync_buzzer_stop();

        if self.song_type == SongType::Ym2 {
            // Mad Max rewrote the envelope every frame with a fixed buzzer
            // shape, and flagged drums in the volume register of voice C.
            if frame[13] != 0xff {
                self.chip.write_register(11, frame[11]);
                self.chip.write_register(12, 0);
                self.chip.write_register(13, 10);
            }
            if frame[10] & 0x80 != 0 && frame[12] != 0 {
                let sample_num = usize::from(frame[10] & 0x7f);
                if let Some(drum) = madmax::sample(sample_num) {
                    let freq = MFP_CLOCK / u32::from(frame[12]);
                    self.chip.drum_start(2, drum, freq);
                }
            }
        } else {
            self.chip.write_register(11, frame[11]);
            self.chip.write_register(12, frame[12]);
            if frame[13] != 0xff {
                self.chip.write_register(13, frame[13]);
            }
            match self.song_type {
                SongType::Ym5 => self.read_ym5_effects(&frame),
                SongType::Ym6 => {
                    self.read_ym6_effect(&frame, 1, 6, 14);
                    self.read_ym6_effect(&frame, 3, 8, 15);
                }
                _ => {}
            }
        }

        self.current_frame += 1;
    }

    /// Start or resume playback.
    pub fn play(&mut self) {
        self.paused = false;
    }

    /// Pause; `update` produces silence until resumed.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Stop and rewind to the beginning.
    pub fn stop(&mut self) {
        self.paused = true;
        self.current_frame = 0;
        self.inner_sample_pos = 0;
        self.mix_pos = None;
        self.mix_cursor = 0;
        self.mix_pos_ms = 0;
        self.mix_pos_frac = 0;
    }

    /// Rewind to the beginning and clear the over-state, without pausing.
    pub fn restart(&mut self) {
        self.seek_ms(0);
        self.music_over = false;
    }

    /// Current position in milliseconds.
    pub fn pos_ms(&self) -> u32 {
        if self.song_type.is_mix() {
            self.mix_pos_ms
        } else if self.nb_frame > 0 && self.player_rate > 0 {
            (self.current_frame as u64 * 1000 / u64::from(self.player_rate)) as u32
        } else {
            0
        }
    }

    /// Total duration in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        if self.song_type.is_mix() {
            self.music_len_ms
        } else if self.nb_frame > 0 && self.player_rate > 0 {
            (self.nb_frame as u64 * 1000 / u64::from(self.player_rate)) as u32
        } else {
            0
        }
    }

    /// Seek to `time_ms`, returning the actual position reached (rounded to
    /// the containing frame or mix key). A no-op when the music is not
    /// seekable.
    pub fn seek_ms(&mut self, time_ms: u32) -> u32 {
        if !self.is_seekable() || !self.music_ok {
            return 0;
        }
        if self.song_type.is_mix() {
            self.set_mix_time(time_ms);
            self.mix_pos_ms
        } else {
            let mut time = time_ms;
            if time >= self.duration_ms() {
                time = 0;
            }
            self.current_frame = (u64::from(time) * u64::from(self.player_rate) / 1000) as usize;
            time
        }
    }

    /// Can this music seek? (all shipped formats can; the flag is carried
    /// per file).
    pub fn is_seekable(&self) -> bool {
        self.attrib & A_TIME_CONTROL != 0
    }

    /// Has playback run past the end with looping off?
    pub fn is_over(&self) -> bool {
        self.music_over
    }

    /// Loop at `loop_frame` (register formats) / restart (streams) instead
    /// of ending.
    pub fn set_loop_mode(&mut self, looping: bool) {
        self.loop_mode = looping;
    }

    /// Toggle the chip's output low-pass filter (on by default).
    pub fn set_lowpass_filter(&mut self, active: bool) {
        self.chip.set_filter(active);
    }

    /// Read back a PSG register (0..13); −1 outside that range.
    pub fn read_ym_register(&self, reg: usize) -> i32 {
        self.chip.read_register(reg)
    }

    /// Metadata of the loaded song.
    pub fn info(&self) -> MusicInfo {
        MusicInfo {
            title: self.title.clone(),
            author: self.author.clone(),
            comment: self.comment.clone(),
            song_type: self.type_name.clone(),
            player: self.player_name.clone(),
            duration_ms: self.duration_ms(),
        }
    }
}
