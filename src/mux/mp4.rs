//! ISO-BMFF box builders for a single video track.
//!
//! Both the movie and the media timescale are microseconds, so every timestamp the pipeline
//! produces is stored without rounding.

use crate::encode::codec::CodecDescriptor;

/// Ticks per second for `mvhd` and `mdhd`.
pub(crate) const TIMESCALE: u32 = 1_000_000;

const UNITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];
const LANGUAGE_UND: u16 = 0x55C4;

/// Index entry for one sample, in media timescale units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SampleRecord {
    /// Offset of the payload inside the `mdat` body.
    pub(crate) mdat_offset: u64,
    pub(crate) size: u32,
    pub(crate) timestamp: u64,
    pub(crate) duration: u32,
    pub(crate) key_frame: bool,
}

/// Everything `moov` needs to describe the track.
pub(crate) struct TrackTables<'a> {
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) codec: &'a CodecDescriptor,
    pub(crate) samples: &'a [SampleRecord],
}

impl TrackTables<'_> {
    fn first_timestamp(&self) -> u64 {
        self.samples.first().map(|s| s.timestamp).unwrap_or(0)
    }

    fn media_duration(&self) -> u64 {
        self.samples.iter().map(|s| u64::from(s.duration)).sum()
    }

    /// Presentation end: leading gap (edit list) plus media duration.
    fn movie_duration(&self) -> u64 {
        self.first_timestamp() + self.media_duration()
    }
}

pub(crate) fn build_box(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(payload.len() + 8);
    buffer.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    buffer.extend_from_slice(typ);
    buffer.extend_from_slice(payload);
    buffer
}

fn build_full_box(typ: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut full = Vec::with_capacity(payload.len() + 4);
    full.extend_from_slice(&((u32::from(version) << 24) | (flags & 0x00FF_FFFF)).to_be_bytes());
    full.extend_from_slice(payload);
    build_box(typ, &full)
}

fn build_container(typ: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    build_box(typ, &children.concat())
}

/// `mdat` header for a body of `body_len` bytes; switches to a 64-bit size when needed.
pub(crate) fn mdat_header(body_len: u64) -> Vec<u8> {
    if body_len + 8 <= u64::from(u32::MAX) {
        let mut h = Vec::with_capacity(8);
        h.extend_from_slice(&((body_len + 8) as u32).to_be_bytes());
        h.extend_from_slice(b"mdat");
        h
    } else {
        let mut h = Vec::with_capacity(16);
        h.extend_from_slice(&1u32.to_be_bytes());
        h.extend_from_slice(b"mdat");
        h.extend_from_slice(&(body_len + 16).to_be_bytes());
        h
    }
}

pub(crate) fn build_ftyp() -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(b"isom");
    payload.extend_from_slice(&0x200_u32.to_be_bytes());
    payload.extend_from_slice(b"isomiso2mp41");
    build_box(b"ftyp", &payload)
}

/// Build `moov` with chunk offsets relative to the file start (`mdat_body_start` is where the
/// `mdat` payload begins).
pub(crate) fn build_moov(tables: &TrackTables<'_>, mdat_body_start: u64, use_co64: bool) -> Vec<u8> {
    build_container(
        b"moov",
        &[
            build_mvhd(tables.movie_duration()),
            build_trak(tables, mdat_body_start, use_co64),
        ],
    )
}

fn push_time_fields(payload: &mut Vec<u8>, version: u8, duration: u64, timescale: Option<u32>) {
    // creation_time, modification_time: zero keeps the output deterministic.
    if version == 1 {
        payload.extend_from_slice(&0u64.to_be_bytes());
        payload.extend_from_slice(&0u64.to_be_bytes());
    } else {
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&0u32.to_be_bytes());
    }
    if let Some(ts) = timescale {
        payload.extend_from_slice(&ts.to_be_bytes());
    }
    if version == 1 {
        payload.extend_from_slice(&duration.to_be_bytes());
    } else {
        payload.extend_from_slice(&(duration as u32).to_be_bytes());
    }
}

fn version_for(value: u64) -> u8 {
    if value > u64::from(u32::MAX) { 1 } else { 0 }
}

fn build_mvhd(duration: u64) -> Vec<u8> {
    let version = version_for(duration);
    let mut payload = Vec::new();
    push_time_fields(&mut payload, version, duration, Some(TIMESCALE));
    payload.extend_from_slice(&0x0001_0000_u32.to_be_bytes()); // rate 1.0
    payload.extend_from_slice(&0x0100_u16.to_be_bytes()); // volume 1.0
    payload.extend_from_slice(&[0u8; 10]);
    for v in UNITY_MATRIX {
        payload.extend_from_slice(&v.to_be_bytes());
    }
    payload.extend_from_slice(&[0u8; 24]); // pre_defined
    payload.extend_from_slice(&2u32.to_be_bytes()); // next_track_ID
    build_full_box(b"mvhd", version, 0, &payload)
}

fn build_trak(tables: &TrackTables<'_>, mdat_body_start: u64, use_co64: bool) -> Vec<u8> {
    let mut children = vec![build_tkhd(tables)];
    if tables.first_timestamp() > 0 {
        children.push(build_edts(tables));
    }
    children.push(build_mdia(tables, mdat_body_start, use_co64));
    build_container(b"trak", &children)
}

fn build_tkhd(tables: &TrackTables<'_>) -> Vec<u8> {
    let duration = tables.movie_duration();
    let version = version_for(duration);
    let mut payload = Vec::new();
    if version == 1 {
        payload.extend_from_slice(&[0u8; 16]);
    } else {
        payload.extend_from_slice(&[0u8; 8]);
    }
    payload.extend_from_slice(&1u32.to_be_bytes()); // track_ID
    payload.extend_from_slice(&0u32.to_be_bytes()); // reserved
    if version == 1 {
        payload.extend_from_slice(&duration.to_be_bytes());
    } else {
        payload.extend_from_slice(&(duration as u32).to_be_bytes());
    }
    payload.extend_from_slice(&[0u8; 8]); // reserved
    payload.extend_from_slice(&0u16.to_be_bytes()); // layer
    payload.extend_from_slice(&0u16.to_be_bytes()); // alternate_group
    payload.extend_from_slice(&0u16.to_be_bytes()); // volume
    payload.extend_from_slice(&0u16.to_be_bytes()); // reserved
    for v in UNITY_MATRIX {
        payload.extend_from_slice(&v.to_be_bytes());
    }
    payload.extend_from_slice(&(u32::from(tables.width) << 16).to_be_bytes());
    payload.extend_from_slice(&(u32::from(tables.height) << 16).to_be_bytes());
    // enabled | in_movie | in_preview
    build_full_box(b"tkhd", version, 0x7, &payload)
}

/// Empty edit covering the gap before the first sample, then the whole media.
fn build_edts(tables: &TrackTables<'_>) -> Vec<u8> {
    let gap = tables.first_timestamp();
    let media = tables.media_duration();
    let version = version_for(gap.max(media));

    let mut payload = Vec::new();
    payload.extend_from_slice(&2u32.to_be_bytes());
    for (segment_duration, media_time) in [(gap, -1i64), (media, 0i64)] {
        if version == 1 {
            payload.extend_from_slice(&segment_duration.to_be_bytes());
            payload.extend_from_slice(&media_time.to_be_bytes());
        } else {
            payload.extend_from_slice(&(segment_duration as u32).to_be_bytes());
            payload.extend_from_slice(&(media_time as i32).to_be_bytes());
        }
        payload.extend_from_slice(&1u16.to_be_bytes()); // media_rate_integer
        payload.extend_from_slice(&0u16.to_be_bytes()); // media_rate_fraction
    }
    build_container(b"edts", &[build_full_box(b"elst", version, 0, &payload)])
}

fn build_mdia(tables: &TrackTables<'_>, mdat_body_start: u64, use_co64: bool) -> Vec<u8> {
    build_container(
        b"mdia",
        &[
            build_mdhd(tables.media_duration()),
            build_hdlr(),
            build_minf(tables, mdat_body_start, use_co64),
        ],
    )
}

fn build_mdhd(duration: u64) -> Vec<u8> {
    let version = version_for(duration);
    let mut payload = Vec::new();
    push_time_fields(&mut payload, version, duration, Some(TIMESCALE));
    payload.extend_from_slice(&LANGUAGE_UND.to_be_bytes());
    payload.extend_from_slice(&0u16.to_be_bytes()); // pre_defined
    build_full_box(b"mdhd", version, 0, &payload)
}

fn build_hdlr() -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&0u32.to_be_bytes()); // pre_defined
    payload.extend_from_slice(b"vide");
    payload.extend_from_slice(&[0u8; 12]);
    payload.extend_from_slice(b"VideoHandler\0");
    build_full_box(b"hdlr", 0, 0, &payload)
}

fn build_minf(tables: &TrackTables<'_>, mdat_body_start: u64, use_co64: bool) -> Vec<u8> {
    let vmhd = build_full_box(b"vmhd", 0, 1, &[0u8; 8]);
    let url = build_full_box(b"url ", 0, 1, &[]);
    let mut dref_payload = 1u32.to_be_bytes().to_vec();
    dref_payload.extend_from_slice(&url);
    let dinf = build_container(b"dinf", &[build_full_box(b"dref", 0, 0, &dref_payload)]);
    build_container(
        b"minf",
        &[vmhd, dinf, build_stbl(tables, mdat_body_start, use_co64)],
    )
}

fn build_stbl(tables: &TrackTables<'_>, mdat_body_start: u64, use_co64: bool) -> Vec<u8> {
    let mut children = vec![
        build_stsd(tables),
        build_stts(tables.samples),
    ];
    if tables.samples.iter().any(|s| !s.key_frame) {
        children.push(build_stss(tables.samples));
    }
    children.push(build_stsc(tables.samples.len()));
    children.push(build_stsz(tables.samples));
    children.push(build_chunk_offsets(tables.samples, mdat_body_start, use_co64));
    build_container(b"stbl", &children)
}

fn build_stsd(tables: &TrackTables<'_>) -> Vec<u8> {
    let mut payload = 1u32.to_be_bytes().to_vec();
    payload.extend_from_slice(&build_visual_sample_entry(tables));
    build_full_box(b"stsd", 0, 0, &payload)
}

fn build_visual_sample_entry(tables: &TrackTables<'_>) -> Vec<u8> {
    let codec = tables.codec;
    let mut payload = Vec::new();
    payload.extend_from_slice(&[0u8; 6]); // reserved
    payload.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    payload.extend_from_slice(&[0u8; 16]); // pre_defined + reserved
    payload.extend_from_slice(&tables.width.to_be_bytes());
    payload.extend_from_slice(&tables.height.to_be_bytes());
    payload.extend_from_slice(&0x0048_0000_u32.to_be_bytes()); // 72 dpi
    payload.extend_from_slice(&0x0048_0000_u32.to_be_bytes());
    payload.extend_from_slice(&0u32.to_be_bytes()); // reserved
    payload.extend_from_slice(&1u16.to_be_bytes()); // frame_count

    let mut name = [0u8; 32];
    let bytes = codec.compressor.as_bytes();
    let n = bytes.len().min(31);
    name[0] = n as u8;
    name[1..=n].copy_from_slice(&bytes[..n]);
    payload.extend_from_slice(&name);

    payload.extend_from_slice(&codec.depth.to_be_bytes());
    payload.extend_from_slice(&(-1i16).to_be_bytes()); // pre_defined
    if let Some(cfg) = &codec.config_box {
        payload.extend_from_slice(&build_box(&cfg.kind, &cfg.payload));
    }
    build_box(&codec.fourcc, &payload)
}

/// Run-length encoded sample durations.
pub(crate) fn build_stts(samples: &[SampleRecord]) -> Vec<u8> {
    let mut entries: Vec<(u32, u32)> = Vec::new();
    for s in samples {
        match entries.last_mut() {
            Some(last) if last.1 == s.duration => last.0 += 1,
            _ => entries.push((1, s.duration)),
        }
    }

    let mut payload = (entries.len() as u32).to_be_bytes().to_vec();
    for (count, delta) in entries {
        payload.extend_from_slice(&count.to_be_bytes());
        payload.extend_from_slice(&delta.to_be_bytes());
    }
    build_full_box(b"stts", 0, 0, &payload)
}

fn build_stss(samples: &[SampleRecord]) -> Vec<u8> {
    let keys: Vec<u32> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.key_frame)
        .map(|(i, _)| i as u32 + 1)
        .collect();
    let mut payload = (keys.len() as u32).to_be_bytes().to_vec();
    for k in keys {
        payload.extend_from_slice(&k.to_be_bytes());
    }
    build_full_box(b"stss", 0, 0, &payload)
}

/// One sample per chunk, so every sample is individually addressable through `stco`.
fn build_stsc(sample_count: usize) -> Vec<u8> {
    let mut payload = Vec::new();
    if sample_count == 0 {
        payload.extend_from_slice(&0u32.to_be_bytes());
    } else {
        payload.extend_from_slice(&1u32.to_be_bytes());
        payload.extend_from_slice(&1u32.to_be_bytes()); // first_chunk
        payload.extend_from_slice(&1u32.to_be_bytes()); // samples_per_chunk
        payload.extend_from_slice(&1u32.to_be_bytes()); // sample_description_index
    }
    build_full_box(b"stsc", 0, 0, &payload)
}

fn build_stsz(samples: &[SampleRecord]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8 + samples.len() * 4);
    payload.extend_from_slice(&0u32.to_be_bytes()); // sample_size: per-sample table follows
    payload.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    for s in samples {
        payload.extend_from_slice(&s.size.to_be_bytes());
    }
    build_full_box(b"stsz", 0, 0, &payload)
}

fn build_chunk_offsets(samples: &[SampleRecord], mdat_body_start: u64, use_co64: bool) -> Vec<u8> {
    let mut payload = (samples.len() as u32).to_be_bytes().to_vec();
    for s in samples {
        let offset = mdat_body_start + s.mdat_offset;
        if use_co64 {
            payload.extend_from_slice(&offset.to_be_bytes());
        } else {
            payload.extend_from_slice(&(offset as u32).to_be_bytes());
        }
    }
    if use_co64 {
        build_full_box(b"co64", 0, 0, &payload)
    } else {
        build_full_box(b"stco", 0, 0, &payload)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mux/mp4.rs"]
mod tests;
