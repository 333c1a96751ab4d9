//! Read-back of single-video-track MP4 buffers.
//!
//! Covers the boxes [`crate::mux::muxer::Muxer`] writes plus the common variations other
//! writers produce (multi-sample chunks, `co64`, 64-bit box sizes, empty edits).

use crate::foundation::core::MICROS_PER_SEC;
use crate::foundation::error::{ReelError, ReelResult};

/// One sample as indexed by the track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Mp4Sample {
    /// Absolute byte offset of the payload in the buffer.
    pub offset: u64,
    /// Payload size in bytes.
    pub size: u32,
    /// Presentation timestamp in microseconds.
    pub timestamp_us: u64,
    /// Duration in microseconds.
    pub duration_us: u64,
    /// Sync sample.
    pub key_frame: bool,
}

/// Parsed video track.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Mp4Track {
    /// Width from the sample entry.
    pub width: u16,
    /// Height from the sample entry.
    pub height: u16,
    /// Sample entry fourcc.
    pub fourcc: String,
    /// Compressor name from the sample entry.
    pub compressor: String,
    /// First child box of the sample entry, as `(type, payload)`.
    pub config_box: Option<(String, Vec<u8>)>,
    /// Media timescale (ticks per second).
    pub timescale: u32,
    /// `moov` precedes `mdat`.
    pub fast_start: bool,
    /// Samples in decode order.
    pub samples: Vec<Mp4Sample>,
}

impl Mp4Track {
    /// Parse the first video track of `buf`.
    pub fn parse(buf: &[u8]) -> ReelResult<Self> {
        let top = read_boxes(buf, 0)?;
        if top.first().map(|b| &b.kind) != Some(b"ftyp") {
            return Err(ReelError::container("buffer does not start with ftyp"));
        }
        let moov = find(&top, b"moov")?;
        let mdat_pos = top.iter().position(|b| &b.kind == b"mdat");
        let moov_pos = top.iter().position(|b| &b.kind == b"moov");
        let fast_start = matches!((moov_pos, mdat_pos), (Some(m), Some(d)) if m < d);

        let moov_children = read_boxes(moov.payload, moov.payload_offset)?;
        let movie_timescale = parse_mvhd_timescale(find(&moov_children, b"mvhd")?.payload)?;

        let mut last_err = ReelError::container("moov has no video track");
        for trak in moov_children.iter().filter(|b| &b.kind == b"trak") {
            match parse_trak(trak, movie_timescale, fast_start, buf.len() as u64) {
                Ok(track) => return Ok(track),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// Number of samples.
    pub fn frame_count(&self) -> usize {
        self.samples.len()
    }

    /// Presentation end in microseconds.
    pub fn duration_us(&self) -> u64 {
        self.samples
            .last()
            .map(|s| s.timestamp_us.saturating_add(s.duration_us))
            .unwrap_or(0)
    }

    /// Sample timestamps in microseconds.
    pub fn timestamps_us(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.timestamp_us).collect()
    }

    /// Payload bytes of sample `index` inside `buf`.
    pub fn sample_data<'a>(&self, buf: &'a [u8], index: usize) -> ReelResult<&'a [u8]> {
        let s = self
            .samples
            .get(index)
            .ok_or_else(|| ReelError::container(format!("sample {index} out of range")))?;
        let start = usize::try_from(s.offset)
            .map_err(|_| ReelError::container("sample offset out of range"))?;
        let end = start
            .checked_add(s.size as usize)
            .filter(|&end| end <= buf.len())
            .ok_or_else(|| ReelError::container(format!("sample {index} exceeds buffer")))?;
        Ok(&buf[start..end])
    }
}

struct RawBox<'a> {
    kind: [u8; 4],
    payload: &'a [u8],
    payload_offset: u64,
}

fn read_boxes(data: &[u8], base_offset: u64) -> ReelResult<Vec<RawBox<'_>>> {
    let mut boxes = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        let rest = &data[pos..];
        if rest.len() < 8 {
            return Err(ReelError::container("truncated box header"));
        }
        let size32 = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
        let kind = [rest[4], rest[5], rest[6], rest[7]];
        let (header, size) = match size32 {
            0 => (8usize, rest.len() as u64),
            1 => {
                if rest.len() < 16 {
                    return Err(ReelError::container("truncated largesize header"));
                }
                (16usize, read_u64(rest, 8)?)
            }
            n => (8usize, u64::from(n)),
        };
        let size = usize::try_from(size)
            .map_err(|_| ReelError::container("box size out of range"))?;
        if size < header || size > rest.len() {
            return Err(ReelError::container(format!(
                "box '{}' has invalid size {size}",
                fourcc_string(&kind)
            )));
        }
        boxes.push(RawBox {
            kind,
            payload: &rest[header..size],
            payload_offset: base_offset + (pos + header) as u64,
        });
        pos += size;
    }
    Ok(boxes)
}

fn find<'b, 'a>(boxes: &'b [RawBox<'a>], kind: &[u8; 4]) -> ReelResult<&'b RawBox<'a>> {
    boxes
        .iter()
        .find(|b| &b.kind == kind)
        .ok_or_else(|| ReelError::container(format!("missing '{}' box", fourcc_string(kind))))
}

fn children<'a>(parent: &RawBox<'a>) -> ReelResult<Vec<RawBox<'a>>> {
    read_boxes(parent.payload, parent.payload_offset)
}

fn fourcc_string(kind: &[u8; 4]) -> String {
    String::from_utf8_lossy(kind).into_owned()
}

fn read_u16(data: &[u8], at: usize) -> ReelResult<u16> {
    data.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| ReelError::container("truncated field"))
}

fn read_u32(data: &[u8], at: usize) -> ReelResult<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| ReelError::container("truncated field"))
}

fn read_u64(data: &[u8], at: usize) -> ReelResult<u64> {
    data.get(at..at + 8)
        .map(|b| {
            let mut a = [0u8; 8];
            a.copy_from_slice(b);
            u64::from_be_bytes(a)
        })
        .ok_or_else(|| ReelError::container("truncated field"))
}

/// Full-box version and the payload after the version/flags word.
fn full_box(payload: &[u8]) -> ReelResult<(u8, &[u8])> {
    if payload.len() < 4 {
        return Err(ReelError::container("truncated full box"));
    }
    Ok((payload[0], &payload[4..]))
}

fn parse_mvhd_timescale(payload: &[u8]) -> ReelResult<u32> {
    let (version, body) = full_box(payload)?;
    let at = if version == 1 { 16 } else { 8 };
    read_u32(body, at)
}

fn parse_mdhd(payload: &[u8]) -> ReelResult<u32> {
    let (version, body) = full_box(payload)?;
    let at = if version == 1 { 16 } else { 8 };
    let timescale = read_u32(body, at)?;
    if timescale == 0 {
        return Err(ReelError::container("mdhd timescale is zero"));
    }
    Ok(timescale)
}

fn parse_handler(payload: &[u8]) -> ReelResult<[u8; 4]> {
    let (_, body) = full_box(payload)?;
    body.get(4..8)
        .map(|b| [b[0], b[1], b[2], b[3]])
        .ok_or_else(|| ReelError::container("truncated hdlr"))
}

/// Leading empty edits, in movie timescale units.
fn parse_elst_gap(payload: &[u8]) -> ReelResult<u64> {
    let (version, body) = full_box(payload)?;
    let count = read_u32(body, 0)? as usize;
    let entry_len = if version == 1 { 20 } else { 12 };
    let mut gap = 0u64;
    for i in 0..count {
        let at = 4 + i * entry_len;
        let (segment, media_time) = if version == 1 {
            (read_u64(body, at)?, read_u64(body, at + 8)? as i64)
        } else {
            (u64::from(read_u32(body, at)?), i64::from(read_u32(body, at + 4)? as i32))
        };
        if media_time != -1 {
            break;
        }
        gap = gap
            .checked_add(segment)
            .ok_or_else(|| ReelError::container("elst gap overflows"))?;
    }
    Ok(gap)
}

struct SampleEntry {
    width: u16,
    height: u16,
    fourcc: String,
    compressor: String,
    config_box: Option<(String, Vec<u8>)>,
}

fn parse_stsd(stsd: &RawBox<'_>) -> ReelResult<SampleEntry> {
    let (_, body) = full_box(stsd.payload)?;
    if read_u32(body, 0)? == 0 {
        return Err(ReelError::container("stsd has no entries"));
    }
    let entries = read_boxes(&body[4..], stsd.payload_offset + 8)?;
    let entry = entries
        .first()
        .ok_or_else(|| ReelError::container("stsd has no entries"))?;

    // 8 bytes SampleEntry + 70 bytes VisualSampleEntry before any child box.
    const VISUAL_FIELDS: usize = 78;
    let p = entry.payload;
    if p.len() < VISUAL_FIELDS {
        return Err(ReelError::container("truncated visual sample entry"));
    }
    let width = read_u16(p, 24)?;
    let height = read_u16(p, 26)?;
    let name_len = (p[42] as usize).min(31);
    let compressor = String::from_utf8_lossy(&p[43..43 + name_len]).into_owned();
    let config_box = read_boxes(&p[VISUAL_FIELDS..], entry.payload_offset + VISUAL_FIELDS as u64)?
        .first()
        .map(|b| (fourcc_string(&b.kind), b.payload.to_vec()));

    Ok(SampleEntry {
        width,
        height,
        fourcc: fourcc_string(&entry.kind),
        compressor,
        config_box,
    })
}

/// Expanded per-sample deltas; runs may not describe more than `max_samples` samples.
fn parse_stts(payload: &[u8], max_samples: usize) -> ReelResult<Vec<u32>> {
    let (_, body) = full_box(payload)?;
    let count = read_u32(body, 0)? as usize;
    let mut deltas = Vec::new();
    for i in 0..count {
        let n = read_u32(body, 4 + i * 8)? as usize;
        let delta = read_u32(body, 8 + i * 8)?;
        if n > max_samples - deltas.len() {
            return Err(ReelError::container(format!(
                "stts describes more than {max_samples} samples"
            )));
        }
        deltas.extend(std::iter::repeat_n(delta, n));
    }
    Ok(deltas)
}

fn parse_u32_table(payload: &[u8]) -> ReelResult<Vec<u32>> {
    let (_, body) = full_box(payload)?;
    let count = read_u32(body, 0)? as usize;
    (0..count).map(|i| read_u32(body, 4 + i * 4)).collect()
}

/// Sample sizes; a constant size must fit `buf_len` bytes of payload.
fn parse_stsz(payload: &[u8], buf_len: u64) -> ReelResult<Vec<u32>> {
    let (_, body) = full_box(payload)?;
    let constant = read_u32(body, 0)?;
    let count = read_u32(body, 4)?;
    if constant != 0 {
        if u64::from(constant) * u64::from(count) > buf_len {
            return Err(ReelError::container(format!(
                "stsz declares {count} samples of {constant} bytes in a {buf_len} byte buffer"
            )));
        }
        return Ok(vec![constant; count as usize]);
    }
    let count = count as usize;
    (0..count).map(|i| read_u32(body, 8 + i * 4)).collect()
}

/// `(first_chunk, samples_per_chunk)` runs.
fn parse_stsc(payload: &[u8]) -> ReelResult<Vec<(u32, u32)>> {
    let (_, body) = full_box(payload)?;
    let count = read_u32(body, 0)? as usize;
    (0..count)
        .map(|i| Ok((read_u32(body, 4 + i * 12)?, read_u32(body, 8 + i * 12)?)))
        .collect()
}

fn parse_chunk_offsets(stbl: &[RawBox<'_>]) -> ReelResult<Vec<u64>> {
    if let Ok(stco) = find(stbl, b"stco") {
        return Ok(parse_u32_table(stco.payload)?
            .into_iter()
            .map(u64::from)
            .collect());
    }
    let co64 = find(stbl, b"co64")?;
    let (_, body) = full_box(co64.payload)?;
    let count = read_u32(body, 0)? as usize;
    (0..count).map(|i| read_u64(body, 4 + i * 8)).collect()
}

fn sample_offsets(sizes: &[u32], stsc: &[(u32, u32)], chunk_offsets: &[u64]) -> ReelResult<Vec<u64>> {
    let mut offsets = Vec::with_capacity(sizes.len());
    let mut sample = 0usize;
    for (chunk_idx, &chunk_offset) in chunk_offsets.iter().enumerate() {
        let chunk_no = chunk_idx as u32 + 1;
        let per_chunk = stsc
            .iter()
            .rev()
            .find(|(first, _)| *first <= chunk_no)
            .map(|(_, n)| *n)
            .ok_or_else(|| ReelError::container(format!("no stsc run covers chunk {chunk_no}")))?;
        let mut offset = chunk_offset;
        for _ in 0..per_chunk {
            let Some(&size) = sizes.get(sample) else {
                return Err(ReelError::container("stsc describes more samples than stsz"));
            };
            offsets.push(offset);
            offset = offset.checked_add(u64::from(size)).ok_or_else(|| {
                ReelError::container(format!("chunk {chunk_no} overflows the offset range"))
            })?;
            sample += 1;
        }
    }
    if offsets.len() != sizes.len() {
        return Err(ReelError::container(format!(
            "chunk table covers {} of {} samples",
            offsets.len(),
            sizes.len()
        )));
    }
    Ok(offsets)
}

fn to_micros(ticks: u64, timescale: u32) -> u64 {
    let us = u128::from(ticks) * u128::from(MICROS_PER_SEC) / u128::from(timescale);
    u64::try_from(us).unwrap_or(u64::MAX)
}

fn parse_trak(
    trak: &RawBox<'_>,
    movie_timescale: u32,
    fast_start: bool,
    buf_len: u64,
) -> ReelResult<Mp4Track> {
    let trak_children = children(trak)?;
    let mdia = find(&trak_children, b"mdia")?;
    let mdia_children = children(mdia)?;
    if &parse_handler(find(&mdia_children, b"hdlr")?.payload)? != b"vide" {
        return Err(ReelError::container("track is not a video track"));
    }
    let timescale = parse_mdhd(find(&mdia_children, b"mdhd")?.payload)?;

    let gap_movie = match find(&trak_children, b"edts") {
        Ok(edts) => match find(&children(edts)?, b"elst") {
            Ok(elst) => parse_elst_gap(elst.payload)?,
            Err(_) => 0,
        },
        Err(_) => 0,
    };
    let gap_us = if movie_timescale == 0 {
        0
    } else {
        to_micros(gap_movie, movie_timescale)
    };

    let minf = find(&mdia_children, b"minf")?;
    let minf_children = children(minf)?;
    let stbl = find(&minf_children, b"stbl")?;
    let stbl_children = children(stbl)?;

    let entry = parse_stsd(find(&stbl_children, b"stsd")?)?;
    let sizes = parse_stsz(find(&stbl_children, b"stsz")?.payload, buf_len)?;
    let deltas = parse_stts(find(&stbl_children, b"stts")?.payload, sizes.len())?;
    let stsc = parse_stsc(find(&stbl_children, b"stsc")?.payload)?;
    let chunk_offsets = parse_chunk_offsets(&stbl_children)?;
    let sync = match find(&stbl_children, b"stss") {
        Ok(stss) => Some(parse_u32_table(stss.payload)?),
        Err(_) => None,
    };

    if deltas.len() != sizes.len() {
        return Err(ReelError::container(format!(
            "stts covers {} samples, stsz {}",
            deltas.len(),
            sizes.len()
        )));
    }
    let offsets = sample_offsets(&sizes, &stsc, &chunk_offsets)?;

    let mut samples = Vec::with_capacity(sizes.len());
    let mut decode_time = 0u64;
    for (i, (&size, &offset)) in sizes.iter().zip(&offsets).enumerate() {
        let delta = u64::from(deltas[i]);
        let key_frame = sync
            .as_ref()
            .is_none_or(|keys| keys.binary_search(&(i as u32 + 1)).is_ok());
        let timestamp_us = gap_us
            .checked_add(to_micros(decode_time, timescale))
            .ok_or_else(|| ReelError::container(format!("sample {i} timestamp overflows")))?;
        samples.push(Mp4Sample {
            offset,
            size,
            timestamp_us,
            duration_us: to_micros(delta, timescale),
            key_frame,
        });
        decode_time = decode_time
            .checked_add(delta)
            .ok_or_else(|| ReelError::container(format!("sample {i} decode time overflows")))?;
    }

    Ok(Mp4Track {
        width: entry.width,
        height: entry.height,
        fourcc: entry.fourcc,
        compressor: entry.compressor,
        config_box: entry.config_box,
        timescale,
        fast_start,
        samples,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/mux/demux.rs"]
mod tests;
