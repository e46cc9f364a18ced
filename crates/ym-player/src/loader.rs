//! Format decoding: tag dispatch, headers, drum banks, de-interleaving.
//!
//! Every format is identified by a 4-byte ASCII tag at offset 0 of the
//! depacked buffer. The register-dump family (YM2..YM6) ends up as a
//! frame-major stream of `stream_inc` bytes per VBL; MIX1 carries a block
//! list plus raw PCM; the trackers carry a per-voice line stream and their
//! own drum bank.

use std::sync::Arc;

use log::debug;
use ym2149::YM_VOLUME_TABLE;

use crate::bytes::{ByteReader, sign_flip};
use crate::error::{Result, YmError};
use crate::format::{
    A_DRUM_4BITS, A_DRUM_SIGNED, A_STREAM_INTERLEAVED, A_TIME_CONTROL, ATARI_CLOCK, DigiDrum,
    MixBlock, SongType,
};
use crate::player::YmMusic;
use crate::player::tracker::MAX_VOICE;

impl YmMusic {
    /// Decode a depacked buffer into playable state.
    pub(crate) fn ym_decode(&mut self, data: Vec<u8>) -> Result<()> {
        let Some(tag) = data.first_chunk::<4>() else {
            return Err(YmError::Truncated("missing format tag"));
        };
        match tag {
            b"YM2!" => self.decode_register_dump(data, SongType::Ym2),
            b"YM3!" => self.decode_register_dump(data, SongType::Ym3),
            b"YM3b" => self.decode_register_dump(data, SongType::Ym3b),
            b"YM4!" => Err(YmError::FormatUnsupported("YM4".into())),
            b"YM5!" => self.decode_ym5(data, SongType::Ym5),
            b"YM6!" => self.decode_ym5(data, SongType::Ym6),
            b"MIX1" => self.decode_mix1(data),
            b"YMT1" => self.decode_tracker(data, SongType::Tracker1),
            b"YMT2" => self.decode_tracker(data, SongType::Tracker2),
            _ => Err(YmError::FormatUnsupported(format!(
                "unknown tag \"{}\"",
                String::from_utf8_lossy(tag)
            ))),
        }
    }

    /// YM2/YM3/YM3b: a bare tag followed by the interleaved 14-register
    /// stream; YM3b appends a little-endian loop frame.
    fn decode_register_dump(&mut self, data: Vec<u8>, kind: SongType) -> Result<()> {
        let nb_frame = (data.len() - 4) / 14;
        if nb_frame == 0 {
            return Err(YmError::Truncated("empty register stream"));
        }

        self.song_type = kind;
        self.nb_frame = nb_frame;
        self.loop_frame = if kind == SongType::Ym3b {
            let tail = &data[data.len() - 4..];
            u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]) as usize
        } else {
            0
        };
        self.chip.set_clock(ATARI_CLOCK);
        self.player_rate = 50;
        self.stream = data[4..].to_vec();
        self.stream_inc = 14;
        self.drums.clear();
        self.attrib = A_STREAM_INTERLEAVED | A_TIME_CONTROL;

        self.title = "Unknown".into();
        self.author = "Unknown".into();
        match kind {
            SongType::Ym2 => {
                self.comment = "Converted by Leonard.".into();
                self.type_name = "YM 2".into();
            }
            SongType::Ym3b => {
                self.comment.clear();
                self.type_name = "YM 3b (loop)".into();
            }
            _ => {
                self.comment.clear();
                self.type_name = "YM 3".into();
            }
        }
        self.player_name = "YM-Chip driver".into();

        debug!("{}: {} frames, loop {}", self.type_name, self.nb_frame, self.loop_frame);

        self.finish_register_stream()
    }

    /// YM5/YM6: "LeOnArD!" check string, big-endian header, digi-drum bank,
    /// metadata strings, then the 16-register stream.
    fn decode_ym5(&mut self, data: Vec<u8>, kind: SongType) -> Result<()> {
        let mut r = ByteReader::new(&data[4..]);
        if r.take(8)? != b"LeOnArD!" {
            return Err(YmError::BadSignature);
        }

        let nb_frame = r.be_u32()? as usize;
        let mut attrib = r.be_u32()? | A_TIME_CONTROL;
        let nb_drum = usize::from(r.be_u16()?);
        let chip_clock = r.be_u32()?;
        let player_rate = r.be_u16()?;
        let loop_frame = r.be_u32()? as usize;
        let additional_skip = usize::from(r.be_u16()?);
        r.skip(additional_skip)?;

        let mut drums = Vec::with_capacity(nb_drum);
        for _ in 0..nb_drum {
            let size = r.be_u32()? as usize;
            let mut pcm = r
                .take(size)
                .map_err(|_| YmError::Truncated("digi-drum data"))?
                .to_vec();
            if attrib & A_DRUM_4BITS != 0 {
                // 4-bit drums are DAC indices; resolve them to PCM once.
                for b in &mut pcm {
                    *b = (YM_VOLUME_TABLE[usize::from(*b & 15)] >> 7) as u8;
                }
            }
            drums.push(DigiDrum {
                data: Arc::from(pcm),
                rep_len: size as u32,
            });
        }
        attrib &= !A_DRUM_4BITS;

        let title = r.nt_string();
        let author = r.nt_string();
        let comment = r.nt_string();
        let stream = r.rest().to_vec();

        if nb_frame == 0 {
            return Err(YmError::Truncated("empty register stream"));
        }

        self.song_type = kind;
        self.nb_frame = nb_frame;
        self.loop_frame = loop_frame;
        self.chip
            .set_clock(if chip_clock != 0 { chip_clock } else { ATARI_CLOCK });
        self.player_rate = if player_rate != 0 { u32::from(player_rate) } else { 50 };
        self.stream = stream;
        self.stream_inc = 16;
        self.drums = drums;
        self.attrib = attrib;
        self.title = title;
        self.author = author;
        self.comment = comment;
        self.type_name = if kind == SongType::Ym6 { "YM 6" } else { "YM 5" }.into();
        self.player_name = "YM-Chip driver".into();

        debug!(
            "{}: {} frames at {} Hz, {} drums, loop {}",
            self.type_name, self.nb_frame, self.player_rate, self.drums.len(), self.loop_frame
        );

        self.finish_register_stream()
    }

    /// MIX1: block list plus raw PCM, mixed without the PSG.
    fn decode_mix1(&mut self, data: Vec<u8>) -> Result<()> {
        let mut r = ByteReader::new(&data[4..]);
        let mix_attrib = r.be_u32()?;
        let nb_block = r.be_u32()? as usize;
        if nb_block == 0 {
            return Err(YmError::Truncated("MIX1 block table"));
        }

        let mut blocks = Vec::with_capacity(nb_block);
        for _ in 0..nb_block {
            let block = MixBlock {
                sample_start: r.be_u32()?,
                sample_length: r.be_u32()?,
                nb_repeat: r.be_u16()?,
                replay_freq: r.be_u16()?,
            };
            if block.sample_length == 0 || block.replay_freq == 0 {
                return Err(YmError::OutOfRange("MIX1 block length or replay rate"));
            }
            blocks.push(block);
        }

        self.title = r.nt_string();
        self.author = r.nt_string();
        self.comment = r.nt_string();

        let mut pcm = r.rest().to_vec();
        if mix_attrib & 1 != 0 {
            sign_flip(&mut pcm);
        }
        for block in &blocks {
            let end = block.sample_start as usize + block.sample_length as usize;
            if end > pcm.len() {
                return Err(YmError::Truncated("MIX1 sample data"));
            }
        }

        self.song_type = SongType::Mix1;
        self.attrib = A_TIME_CONTROL;
        self.mix_blocks = blocks;
        self.sample_buffer = pcm;
        self.compute_time_info();
        self.type_name = "MIX1".into();
        self.player_name = "Digi-Mix driver".into();

        debug!(
            "MIX1: {} blocks, {} PCM bytes, {} ms",
            self.mix_blocks.len(), self.sample_buffer.len(), self.music_len_ms
        );
        Ok(())
    }

    /// YMT1/YMT2: tracker header, drum bank, per-voice line stream.
    fn decode_tracker(&mut self, data: Vec<u8>, kind: SongType) -> Result<()> {
        let mut r = ByteReader::new(&data[4..]);
        let nb_voice = usize::from(r.be_u16()?);
        let player_rate = r.be_u16()?;
        let nb_frame = r.be_u32()? as usize;
        let loop_frame = r.be_u32()? as usize;
        let mut attrib = r.be_u32()?;
        let nb_drum = usize::from(r.be_u16()?);

        if nb_voice == 0 || nb_voice > MAX_VOICE {
            return Err(YmError::OutOfRange("tracker voice count"));
        }
        if nb_frame == 0 {
            return Err(YmError::Truncated("empty tracker stream"));
        }

        let mut drums = Vec::with_capacity(nb_drum);
        for _ in 0..nb_drum {
            let size = usize::from(r.be_u16()?);
            let mut rep_len = size as u32;
            if kind == SongType::Tracker2 {
                rep_len = r.be_u32()?.max(1).min(size as u32);
            }
            let mut pcm = r
                .take(size)
                .map_err(|_| YmError::Truncated("tracker drum data"))?
                .to_vec();
            if attrib & A_DRUM_SIGNED != 0 {
                sign_flip(&mut pcm);
            }
            drums.push(DigiDrum {
                data: Arc::from(pcm),
                rep_len,
            });
        }
        attrib &= !A_DRUM_SIGNED;

        self.title = r.nt_string();
        self.author = r.nt_string();
        self.comment = r.nt_string();
        let stream = r.rest().to_vec();

        // The attribute high nibble tunes the playback octave.
        self.tracker_freq_shift = (attrib >> 28) & 15;
        attrib &= 0x0fff_ffff;

        self.song_type = kind;
        self.nb_voice = nb_voice;
        self.nb_frame = nb_frame;
        self.loop_frame = loop_frame;
        self.player_rate = if player_rate != 0 { u32::from(player_rate) } else { 50 };
        self.stream = stream;
        self.stream_inc = 4 * nb_voice;
        self.drums = drums;
        self.attrib = attrib | A_TIME_CONTROL;
        self.type_name = if kind == SongType::Tracker2 { "YM-T2" } else { "YM-T1" }.into();
        self.player_name = "Universal Tracker".into();

        if self.stream.len() < self.nb_frame * self.stream_inc {
            return Err(YmError::Truncated("tracker line stream"));
        }
        self.clamp_loop_frame();
        self.tracker_init(100);

        debug!(
            "{}: {} voices, {} frames at {} Hz, {} drums",
            self.type_name, self.nb_voice, self.nb_frame, self.player_rate, self.drums.len()
        );
        Ok(())
    }

    /// Common tail of the register-dump formats: bounds, loop clamp,
    /// de-interleave.
    fn finish_register_stream(&mut self) -> Result<()> {
        if self.stream.len() < self.nb_frame * self.stream_inc {
            return Err(YmError::Truncated("register stream"));
        }
        self.clamp_loop_frame();
        self.de_interleave();
        Ok(())
    }

    fn clamp_loop_frame(&mut self) {
        if self.loop_frame >= self.nb_frame {
            self.loop_frame = 0;
        }
    }

    /// Turn a register-major stream (all r0 bytes, then all r1 bytes, ...)
    /// into frame-major order and clear the flag; after load the stream is
    /// always frame-major.
    fn de_interleave(&mut self) {
        if self.attrib & A_STREAM_INTERLEAVED == 0 {
            return;
        }
        let total = self.nb_frame * self.stream_inc;
        let mut out = vec![0u8; total];
        for reg in 0..self.stream_inc {
            let base = reg * self.nb_frame;
            for frame in 0..self.nb_frame {
                out[frame * self.stream_inc + reg] = self.stream[base + frame];
            }
        }
        self.stream = out;
        self.attrib &= !A_STREAM_INTERLEAVED;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym3_image(frames: &[[u8; 14]]) -> Vec<u8> {
        let mut data = b"YM3!".to_vec();
        for reg in 0..14 {
            for frame in frames {
                data.push(frame[reg]);
            }
        }
        data
    }

    #[test]
    fn test_ym3_deinterleaves_to_frame_major() {
        let mut frames = [[0u8; 14]; 3];
        for (i, frame) in frames.iter_mut().enumerate() {
            for (reg, byte) in frame.iter_mut().enumerate() {
                *byte = (i * 14 + reg) as u8;
            }
        }
        let mut music = YmMusic::new(44_100);
        music.ym_decode(ym3_image(&frames)).unwrap();

        assert_eq!(music.nb_frame, 3);
        assert_eq!(music.stream_inc, 14);
        assert_eq!(music.attrib & A_STREAM_INTERLEAVED, 0);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(&music.stream[i * 14..(i + 1) * 14], frame);
        }
    }

    #[test]
    fn test_ym3b_reads_little_endian_loop_frame() {
        let mut data = ym3_image(&[[0u8; 14]; 5]);
        data[3] = b'b';
        data.extend_from_slice(&3u32.to_le_bytes());
        let mut music = YmMusic::new(44_100);
        music.ym_decode(data).unwrap();
        assert_eq!(music.song_type, SongType::Ym3b);
        assert_eq!(music.nb_frame, 5);
        assert_eq!(music.loop_frame, 3);
    }

    #[test]
    fn test_ym3b_out_of_range_loop_clamps_to_zero() {
        let mut data = ym3_image(&[[0u8; 14]; 2]);
        data[3] = b'b';
        data.extend_from_slice(&9u32.to_le_bytes());
        let mut music = YmMusic::new(44_100);
        music.ym_decode(data).unwrap();
        assert_eq!(music.loop_frame, 0);
    }

    fn ym5_image(frames: usize, drums: &[&[u8]], attrib: u32) -> Vec<u8> {
        let mut data = b"YM5!LeOnArD!".to_vec();
        data.extend_from_slice(&(frames as u32).to_be_bytes());
        data.extend_from_slice(&attrib.to_be_bytes());
        data.extend_from_slice(&(drums.len() as u16).to_be_bytes());
        data.extend_from_slice(&2_000_000u32.to_be_bytes());
        data.extend_from_slice(&50u16.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes()); // loop frame
        data.extend_from_slice(&0u16.to_be_bytes()); // additional skip
        for drum in drums {
            data.extend_from_slice(&(drum.len() as u32).to_be_bytes());
            data.extend_from_slice(drum);
        }
        data.extend_from_slice(b"Title\0Author\0Comment\0");
        data.extend_from_slice(&vec![0u8; frames * 16]);
        data
    }

    #[test]
    fn test_ym5_header_and_metadata() {
        let mut music = YmMusic::new(44_100);
        music.ym_decode(ym5_image(4, &[], 0)).unwrap();
        assert_eq!(music.song_type, SongType::Ym5);
        assert_eq!(music.nb_frame, 4);
        assert_eq!(music.stream_inc, 16);
        assert_eq!(music.player_rate, 50);
        assert_eq!(music.title, "Title");
        assert_eq!(music.author, "Author");
        assert_eq!(music.comment, "Comment");
    }

    #[test]
    fn test_ym5_4bit_drums_resolved_through_dac() {
        let mut music = YmMusic::new(44_100);
        music
            .ym_decode(ym5_image(1, &[&[0x0f, 0x00]], A_DRUM_4BITS))
            .unwrap();
        let drum = &music.drums[0];
        assert_eq!(drum.data[0], (YM_VOLUME_TABLE[15] >> 7) as u8);
        assert_eq!(drum.data[1], (YM_VOLUME_TABLE[0] >> 7) as u8);
        assert_eq!(music.attrib & A_DRUM_4BITS, 0);
    }

    #[test]
    fn test_ym5_bad_signature() {
        let mut data = ym5_image(1, &[], 0);
        data[4] = b'X';
        let mut music = YmMusic::new(44_100);
        assert!(matches!(
            music.ym_decode(data),
            Err(YmError::BadSignature)
        ));
    }

    #[test]
    fn test_ym5_truncated_stream() {
        let mut data = ym5_image(4, &[], 0);
        data.truncate(data.len() - 20);
        let mut music = YmMusic::new(44_100);
        assert!(matches!(
            music.ym_decode(data),
            Err(YmError::Truncated(_))
        ));
    }

    #[test]
    fn test_ym4_is_rejected() {
        let mut music = YmMusic::new(44_100);
        let err = music.ym_decode(b"YM4!rest".to_vec()).unwrap_err();
        assert!(matches!(err, YmError::FormatUnsupported(_)));
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let mut music = YmMusic::new(44_100);
        let err = music.ym_decode(b"WAVEdata".to_vec()).unwrap_err();
        assert!(matches!(err, YmError::FormatUnsupported(_)));
    }
}
