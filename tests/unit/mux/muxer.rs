use super::*;
use crate::encode::codec::ConfigBox;
use crate::mux::demux::Mp4Track;

fn descriptor() -> CodecDescriptor {
    CodecDescriptor {
        fourcc: *b"test",
        compressor: "test".to_string(),
        depth: 24,
        config_box: None,
    }
}

fn cfg(fast_start: bool) -> MuxerConfig {
    MuxerConfig {
        width: 64,
        height: 48,
        fps: Fps::integer(30).unwrap(),
        codec: descriptor(),
        fast_start,
    }
}

fn chunk(seq: u64, timestamp_us: u64, key_frame: bool) -> EncodedChunk {
    EncodedChunk {
        seq,
        timestamp_us,
        key_frame,
        data: vec![seq as u8; 10 + seq as usize],
    }
}

fn mux_frames(fast_start: bool, n: u64) -> Bytes {
    let fps = Fps::integer(30).unwrap();
    let mut m = Muxer::new(cfg(fast_start)).unwrap();
    for i in 0..n {
        m.add_chunk(
            chunk(i, fps.timestamp_us(FrameIndex(i)), i % 10 == 0),
            ChunkMetadata::default(),
        )
        .unwrap();
    }
    m.finalize().unwrap()
}

#[test]
fn finalize_twice_is_state_error() {
    let mut m = Muxer::new(cfg(true)).unwrap();
    m.add_chunk(chunk(0, 0, true), ChunkMetadata::default())
        .unwrap();
    m.finalize().unwrap();
    assert_eq!(m.state(), MuxerState::Finalized);
    let err = m.finalize().unwrap_err();
    assert!(matches!(err, ReelError::MuxerState { chunk: 1, .. }));
}

#[test]
fn add_after_finalize_is_state_error() {
    let mut m = Muxer::new(cfg(true)).unwrap();
    m.finalize().unwrap();
    let err = m
        .add_chunk(chunk(0, 0, true), ChunkMetadata::default())
        .unwrap_err();
    assert!(matches!(err, ReelError::MuxerState { chunk: 0, .. }));
}

#[test]
fn rejects_non_increasing_timestamps_and_empty_payloads() {
    let mut m = Muxer::new(cfg(true)).unwrap();
    m.add_chunk(chunk(0, 100, true), ChunkMetadata::default())
        .unwrap();
    assert!(matches!(
        m.add_chunk(chunk(1, 100, false), ChunkMetadata::default()),
        Err(ReelError::MuxerState { chunk: 1, .. })
    ));
    let mut empty = chunk(1, 200, false);
    empty.data.clear();
    assert!(matches!(
        m.add_chunk(empty, ChunkMetadata::default()),
        Err(ReelError::MuxerState { .. })
    ));
    assert_eq!(m.chunk_count(), 1);
}

#[test]
fn first_chunk_must_be_key_frame() {
    let mut m = Muxer::new(cfg(true)).unwrap();
    assert!(matches!(
        m.add_chunk(chunk(0, 0, false), ChunkMetadata::default()),
        Err(ReelError::MuxerState { chunk: 0, .. })
    ));
}

#[test]
fn empty_stream_is_header_and_trailer_only() {
    let mut m = Muxer::new(cfg(true)).unwrap();
    let buf = m.finalize().unwrap();
    assert_eq!(m.buffer(), Some(&buf));

    let track = Mp4Track::parse(&buf).unwrap();
    assert_eq!(track.frame_count(), 0);
    assert_eq!((track.width, track.height), (64, 48));
    assert_eq!(track.duration_us(), 0);
}

#[test]
fn timestamps_round_trip_exactly() {
    let fps = Fps::integer(30).unwrap();
    let buf = mux_frames(true, 60);
    let track = Mp4Track::parse(&buf).unwrap();

    assert_eq!(track.timescale, 1_000_000);
    assert_eq!(track.frame_count(), 60);
    let expected: Vec<u64> = (0..60).map(|i| fps.timestamp_us(FrameIndex(i))).collect();
    assert_eq!(track.timestamps_us(), expected);
    assert_eq!(track.samples[59].timestamp_us, 1_966_666);
    assert_eq!(track.duration_us(), 2_000_000);
}

#[test]
fn payloads_are_addressable_in_both_layouts() {
    for fast_start in [true, false] {
        let buf = mux_frames(fast_start, 12);
        let track = Mp4Track::parse(&buf).unwrap();
        assert_eq!(track.fast_start, fast_start);
        for i in 0..12usize {
            let data = track.sample_data(&buf, i).unwrap();
            assert_eq!(data, vec![i as u8; 10 + i].as_slice());
        }
    }
}

#[test]
fn key_frames_are_indexed() {
    let buf = mux_frames(false, 25);
    let track = Mp4Track::parse(&buf).unwrap();
    let keys: Vec<usize> = track
        .samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.key_frame)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(keys, vec![0, 10, 20]);
}

#[test]
fn non_zero_start_is_preserved_through_edit_list() {
    let mut m = Muxer::new(cfg(true)).unwrap();
    for (i, ts) in [40_000u64, 73_333, 106_666].into_iter().enumerate() {
        m.add_chunk(chunk(i as u64, ts, true), ChunkMetadata::default())
            .unwrap();
    }
    let buf = m.finalize().unwrap();
    let track = Mp4Track::parse(&buf).unwrap();
    assert_eq!(track.timestamps_us(), vec![40_000, 73_333, 106_666]);
}

#[test]
fn last_sample_falls_back_to_previous_delta_past_nominal_end() {
    let mut m = Muxer::new(cfg(true)).unwrap();
    // Nominal end for 2 frames at 30 fps is 66_666us, both samples start later.
    m.add_chunk(chunk(0, 1_000_000, true), ChunkMetadata::default())
        .unwrap();
    m.add_chunk(chunk(1, 1_050_000, true), ChunkMetadata::default())
        .unwrap();
    let buf = m.finalize().unwrap();
    let track = Mp4Track::parse(&buf).unwrap();
    assert_eq!(track.samples[1].duration_us, 50_000);
}

#[test]
fn decoder_config_replaces_config_box_payload_once() {
    let mut config = cfg(true);
    config.codec.config_box = Some(ConfigBox {
        kind: *b"cfgx",
        payload: vec![0],
    });
    let mut m = Muxer::new(config).unwrap();
    m.add_chunk(
        chunk(0, 0, true),
        ChunkMetadata {
            decoder_config: Some(vec![1, 2, 3]),
        },
    )
    .unwrap();
    m.add_chunk(
        chunk(1, 33_333, true),
        ChunkMetadata {
            decoder_config: Some(vec![9]),
        },
    )
    .unwrap();
    assert_eq!(
        m.codec().config_box.as_ref().map(|c| c.payload.clone()),
        Some(vec![1, 2, 3])
    );

    let buf = m.finalize().unwrap();
    let track = Mp4Track::parse(&buf).unwrap();
    assert_eq!(track.config_box, Some(("cfgx".to_string(), vec![1, 2, 3])));
}

#[test]
fn oversized_dimensions_are_config_errors() {
    let mut c = cfg(true);
    c.width = 70_000;
    assert!(matches!(Muxer::new(c), Err(ReelError::Config(_))));
    let mut c = cfg(true);
    c.height = 0;
    assert!(matches!(Muxer::new(c), Err(ReelError::Config(_))));
}

#[test]
fn muxer_works_as_chunk_sink() {
    fn push(sink: &mut dyn ChunkSink, c: EncodedChunk) -> ReelResult<()> {
        sink.add_chunk(c, ChunkMetadata::default())
    }
    let mut m = Muxer::new(cfg(false)).unwrap();
    push(&mut m, chunk(0, 0, true)).unwrap();
    push(&mut m, chunk(1, 10, false)).unwrap();
    assert_eq!(m.chunk_count(), 2);
}
