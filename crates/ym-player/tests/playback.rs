//! End-to-end playback tests over synthetic in-memory YM images.

use ym_player::{YmError, YmMusic};

/// Build a YM3 image from frame-major register data (the file stores the
/// stream register-major, so interleave here).
fn ym3_image(frames: &[[u8; 14]]) -> Vec<u8> {
    let mut data = b"YM3!".to_vec();
    for reg in 0..14 {
        for frame in frames {
            data.push(frame[reg]);
        }
    }
    data
}

fn ym3b_image(frames: &[[u8; 14]], loop_frame: u32) -> Vec<u8> {
    let mut data = ym3_image(frames);
    data[3] = b'b';
    data.extend_from_slice(&loop_frame.to_le_bytes());
    data
}

/// Build a non-interleaved YM5/YM6 image.
fn ym56_image(tag: &[u8; 4], frames: &[[u8; 16]], drums: &[&[u8]]) -> Vec<u8> {
    let mut data = tag.to_vec();
    data.extend_from_slice(b"LeOnArD!");
    data.extend_from_slice(&(frames.len() as u32).to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes()); // attributes: frame-major
    data.extend_from_slice(&(drums.len() as u16).to_be_bytes());
    data.extend_from_slice(&2_000_000u32.to_be_bytes());
    data.extend_from_slice(&50u16.to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes()); // loop frame
    data.extend_from_slice(&0u16.to_be_bytes()); // additional skip
    for drum in drums {
        data.extend_from_slice(&(drum.len() as u32).to_be_bytes());
        data.extend_from_slice(drum);
    }
    data.extend_from_slice(b"Song\0Author\0Comment\0");
    for frame in frames {
        data.extend_from_slice(frame);
    }
    data
}

const VBL_SAMPLES: usize = 44_100 / 50;

#[test]
fn test_pure_tone_ym3() {
    // Tone A at period 0x100: 2e6 / (16 * 256) = 488.28 Hz.
    let mut frame = [0u8; 14];
    frame[0] = 0x00;
    frame[1] = 0x01;
    frame[7] = 0x3e;
    frame[8] = 0x0f;
    frame[13] = 0xff;
    let frames = vec![frame; 50];

    let mut music = YmMusic::new(44_100);
    music.load_memory(&ym3_image(&frames)).unwrap();
    music.set_lowpass_filter(false);

    let mut samples = vec![0i16; 44_100];
    assert!(music.update(&mut samples));

    let mut crossings = 0;
    for pair in samples.windows(2) {
        if (pair[0] >= 0) != (pair[1] >= 0) {
            crossings += 1;
        }
    }
    assert!(
        (975..=979).contains(&crossings),
        "expected ~977 zero crossings per second, got {crossings}"
    );
}

#[test]
fn test_update_fills_exactly_and_signals_end() {
    let frames = vec![[0u8; 14]; 2];
    let mut music = YmMusic::new(44_100);
    music.load_memory(&ym3_image(&frames)).unwrap();

    let mut buffer = vec![0i16; VBL_SAMPLES * 2];
    assert!(music.update(&mut buffer), "song still playing");

    // The call that walks off the last frame still returns true...
    let mut tail = vec![0x55i16; VBL_SAMPLES];
    assert!(music.update(&mut tail));
    assert!(music.is_over());

    // ...the next one reports the end and zeroes the buffer.
    let mut silent = vec![0x55i16; 256];
    assert!(!music.update(&mut silent));
    assert!(silent.iter().all(|&s| s == 0));
}

#[test]
fn test_ym3b_loop_is_sample_periodic() {
    // Ten frames of distinct constant DAC levels (all voices pinned by
    // period 0), looping back to frame 2.
    let mut frames = Vec::new();
    for i in 0..10u8 {
        let mut frame = [0u8; 14];
        frame[7] = 0xff;
        frame[8] = i;
        frame[13] = 0xff;
        frames.push(frame);
    }

    let mut music = YmMusic::new(44_100);
    music.load_memory(&ym3b_image(&frames, 2)).unwrap();
    music.set_loop_mode(true);

    let mut samples = vec![0i16; VBL_SAMPLES * 26];
    assert!(music.update(&mut samples));

    // Frame windows 10..18 and 18..26 both play file frames 2..10 with the
    // same predecessor; the output must repeat exactly.
    let first = &samples[VBL_SAMPLES * 10..VBL_SAMPLES * 18];
    let second = &samples[VBL_SAMPLES * 18..VBL_SAMPLES * 26];
    assert_eq!(first, second);
}

#[test]
fn test_bit_exact_determinism_of_independent_runs() {
    let mut frame = [0u8; 16];
    frame[0] = 0x40;
    frame[1] = 0x02;
    frame[6] = 0x0c; // noise period
    frame[7] = 0x26; // tone A, noise B
    frame[8] = 0x0d;
    frame[9] = 0x10; // envelope mode on B
    frame[11] = 0x80; // envelope period
    frame[13] = 0x0a;
    let frames = vec![frame; 60];
    let image = ym56_image(b"YM5!", &frames, &[]);

    let mut a = YmMusic::new(44_100);
    a.load_memory(&image).unwrap();
    let mut b = YmMusic::new(44_100);
    b.load_memory(&image).unwrap();

    let total = 44_100;
    let mut out_a = vec![0i16; total];
    let mut out_b = vec![0i16; total];
    for chunk in out_a.chunks_mut(512) {
        a.update(chunk);
    }
    for chunk in out_b.chunks_mut(512) {
        b.update(chunk);
    }
    assert_eq!(out_a, out_b);
}

#[test]
fn test_seek_is_idempotent_at_frame_granularity() {
    let frames = vec![[0u8; 14]; 20];
    let mut music = YmMusic::new(44_100);
    music.load_memory(&ym3_image(&frames)).unwrap();
    assert!(music.is_seekable());

    let mut buffer = vec![0i16; 1000];
    music.update(&mut buffer);

    let pos = music.pos_ms();
    assert_eq!(music.seek_ms(pos), pos);
    assert_eq!(music.pos_ms(), pos);
}

#[test]
fn test_ym5_digidrum_trigger() {
    let drum: &[u8] = &[6, 12, 18, 24, 30, 36, 42, 48];
    let mut frame = [0u8; 16];
    frame[3] = 0x10; // drum on voice A
    frame[7] = 0xff;
    frame[8] = 0x60; // prediv index 3 (-> 16), drum index 0
    frame[13] = 0xff;
    frame[15] = 0x01; // count 1 -> 2457600 / 16 = 153600 Hz
    let frames = vec![frame, [0u8; 16]];

    let mut music = YmMusic::new(44_100);
    music.load_memory(&ym56_image(b"YM5!", &frames, &[drum])).unwrap();
    music.set_lowpass_filter(false);

    // The drum steps (153600 << 15) / 44100 = 114130 per sample, so the
    // first output samples read drum bytes 0, 3 and 6. The idle voices add
    // twice the DAC floor (20 each); DC removal tracks the running mean.
    let step = (153_600u64 << 15) / 44_100;
    let mut expected = Vec::new();
    let mut dc = 0i64;
    for i in 0..3u64 {
        let byte = drum[((i * step) >> 15) as usize];
        let level = i32::from(byte) * 255 / 6 + 40;
        dc += i64::from(level);
        expected.push((level - (dc / 512) as i32) as i16);
    }

    // A full-VBL pull replays frame 0 before the first sample.
    let mut samples = vec![0i16; VBL_SAMPLES];
    music.update(&mut samples);
    assert_eq!(&samples[..3], &expected[..]);
}

#[test]
fn test_ym6_sid_effect_toggles_amplitude_register() {
    let mut frame = [0u8; 16];
    frame[1] = 0x10; // effect slot 1: SID on voice A
    frame[6] = 0x80; // prediv index 4 (-> 50)
    frame[7] = 0xff;
    frame[8] = 0x0f; // SID volume
    frame[13] = 0xff;
    frame[14] = 0x04; // count 4 -> 2457600 / 200 = 12288 Hz
    let frames = vec![frame; 10];

    let mut music = YmMusic::new(44_100);
    music.load_memory(&ym56_image(b"YM6!", &frames, &[])).unwrap();

    // Pull a whole VBL so frame 0 (and its effect) is armed, then step one
    // sample at a time and watch the amplitude register.
    let mut vbl = vec![0i16; VBL_SAMPLES];
    music.update(&mut vbl);

    let mut seen = std::collections::HashSet::new();
    let mut one = [0i16; 1];
    for _ in 0..100 {
        music.update(&mut one);
        seen.insert(music.read_ym_register(8));
    }
    assert!(
        seen.contains(&15) && seen.contains(&0),
        "SID square should toggle r8 between 15 and 0, saw {seen:?}"
    );
}

#[test]
fn test_ym2_forces_buzzer_envelope() {
    let mut frame = [0u8; 14];
    frame[11] = 0x42;
    // r13 = 0 -> the Mad Max driver rewrites the envelope every frame.
    let mut data = ym3_image(&vec![frame; 4]);
    data[..4].copy_from_slice(b"YM2!");

    let mut music = YmMusic::new(44_100);
    music.load_memory(&data).unwrap();
    assert_eq!(music.info().song_type, "YM 2");

    let mut buffer = vec![0i16; VBL_SAMPLES];
    music.update(&mut buffer);
    assert_eq!(music.read_ym_register(13), 10);
    assert_eq!(music.read_ym_register(11), 0x42);
    assert_eq!(music.read_ym_register(12), 0);
}

#[test]
fn test_mix1_linear_stream() {
    let pcm: Vec<u8> = vec![0x00, 0x10, 0x20, 0x30, 0x40, 0x50, 0x90, 0xa0];
    let mut data = b"MIX1".to_vec();
    data.extend_from_slice(&0u32.to_be_bytes()); // attributes: unsigned
    data.extend_from_slice(&1u32.to_be_bytes()); // one block
    data.extend_from_slice(&0u32.to_be_bytes()); // sample start
    data.extend_from_slice(&(pcm.len() as u32).to_be_bytes());
    data.extend_from_slice(&1u16.to_be_bytes()); // one repeat
    data.extend_from_slice(&44_100u16.to_be_bytes());
    data.extend_from_slice(b"Mix\0Author\0\0");
    data.extend_from_slice(&pcm);

    let mut music = YmMusic::new(44_100);
    music.load_memory(&data).unwrap();
    assert_eq!(music.info().song_type, "MIX1");

    // 1:1 rate: each output sample is one PCM byte shifted into i16 range.
    let mut samples = vec![0i16; pcm.len()];
    assert!(music.update(&mut samples));
    let expected: Vec<i16> = pcm.iter().map(|&b| (u16::from(b) << 8) as i16).collect();
    assert_eq!(samples, expected);

    let mut tail = vec![0i16; 16];
    assert!(!music.update(&mut tail));
    assert!(music.is_over());
}

#[test]
fn test_mix1_seek_through_time_keys() {
    let pcm = vec![0x40u8; 4410];
    let mut data = b"MIX1".to_vec();
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(&4410u32.to_be_bytes());
    data.extend_from_slice(&4u16.to_be_bytes()); // 4 repeats of 100 ms
    data.extend_from_slice(&44_100u16.to_be_bytes());
    data.extend_from_slice(b"\0\0\0");
    data.extend_from_slice(&pcm);

    let mut music = YmMusic::new(44_100);
    music.load_memory(&data).unwrap();
    assert_eq!(music.duration_ms(), 400);
    assert!(music.is_seekable());

    assert_eq!(music.seek_ms(250), 250);
    assert_eq!(music.pos_ms(), 250);

    // Seeking must keep playback alive.
    let mut buffer = vec![0i16; 64];
    assert!(music.update(&mut buffer));
}

#[test]
fn test_tracker_mixes_drum_voice() {
    let mut data = b"YMT2".to_vec();
    data.extend_from_slice(&1u16.to_be_bytes()); // one voice
    data.extend_from_slice(&50u16.to_be_bytes());
    data.extend_from_slice(&2u32.to_be_bytes()); // two frames
    data.extend_from_slice(&0u32.to_be_bytes()); // loop frame
    data.extend_from_slice(&0u32.to_be_bytes()); // attributes
    data.extend_from_slice(&1u16.to_be_bytes()); // one drum
    data.extend_from_slice(&4u16.to_be_bytes()); // drum size
    data.extend_from_slice(&4u32.to_be_bytes()); // rep len
    data.extend_from_slice(&[128, 129, 130, 131]);
    data.extend_from_slice(b"Track\0Author\0\0");
    // Frame 0: trigger drum 0 at 44100 Hz, volume 63. Frame 1: keep running.
    data.extend_from_slice(&[0x00, 63, 0xac, 0x44]);
    data.extend_from_slice(&[0xff, 63, 0xac, 0x44]);

    let mut music = YmMusic::new(44_100);
    music.load_memory(&data).unwrap();
    assert_eq!(music.info().song_type, "YM-T2");
    assert_eq!(music.duration_ms(), 40);

    // Volume table row 63 maps byte b to (b - 128) * 252 at full scale.
    let mut samples = vec![0i16; 4];
    assert!(music.update(&mut samples));
    assert_eq!(samples, vec![0, 252, 504, 756]);
}

#[test]
fn test_failed_load_leaves_player_inert() {
    let mut music = YmMusic::new(44_100);
    assert!(matches!(
        music.load_memory(b"not a module"),
        Err(YmError::FormatUnsupported(_))
    ));

    let mut buffer = vec![0x11i16; 64];
    assert!(music.update(&mut buffer));
    assert!(buffer.iter().all(|&s| s == 0));
    assert_eq!(music.pos_ms(), 0);
    assert_eq!(music.duration_ms(), 0);
    assert!(!music.is_over());
}

#[test]
fn test_info_reports_metadata() {
    let frames = vec![[0u8; 16]; 50];
    let mut music = YmMusic::new(44_100);
    music.load_memory(&ym56_image(b"YM5!", &frames, &[])).unwrap();

    let info = music.info();
    assert_eq!(info.title, "Song");
    assert_eq!(info.author, "Author");
    assert_eq!(info.comment, "Comment");
    assert_eq!(info.song_type, "YM 5");
    assert_eq!(info.player, "YM-Chip driver");
    assert_eq!(info.duration_ms, 1000);
}
