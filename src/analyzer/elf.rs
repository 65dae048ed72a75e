//! ELF load-segment alignment probe.
//!
//! A library placed on a 16 KB boundary inside the archive still cannot be
//! mapped on a 16 KB-page device if its `PT_LOAD` segments were linked with
//! a smaller `p_align`. This reads the start of the payload, inflating it if
//! needed, and reports the smallest load alignment found.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use flate2::read::DeflateDecoder;
use std::io::Read;

use crate::io::ReadAt;
use crate::zip::{ArchiveEntry, CompressionMethod, effective_offset};
use anyhow::Result;

/// Decoded bytes examined per library; program headers sit near the start.
pub const ELF_PROBE_LIMIT: usize = 64 * 1024;

const ELF_MAGIC: &[u8] = b"\x7fELF";
const PT_LOAD: u32 = 1;

/// Read the head of a library's payload and return its smallest `PT_LOAD`
/// alignment, or `None` if the data is not a parsable ELF image.
pub async fn probe_load_alignment<R: ReadAt>(
    reader: &R,
    entry: &ArchiveEntry,
) -> Result<Option<u64>> {
    let raw_len = (entry.compressed_size as usize).min(ELF_PROBE_LIMIT);
    let mut raw = vec![0u8; raw_len];
    reader.read_exact_at(effective_offset(entry), &mut raw).await?;

    let image = match entry.compression_method {
        CompressionMethod::Stored => raw,
        CompressionMethod::Deflate => inflate_prefix(&raw),
        CompressionMethod::Unknown(_) => return Ok(None),
    };
    Ok(min_load_alignment(&image))
}

/// Inflate as much of a truncated raw DEFLATE stream as possible.
fn inflate_prefix(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    // The input is cut short on purpose; keep whatever decoded before the error
    let _ = DeflateDecoder::new(raw)
        .take(ELF_PROBE_LIMIT as u64)
        .read_to_end(&mut out);
    out
}

/// Smallest `p_align` among `PT_LOAD` program headers.
pub fn min_load_alignment(image: &[u8]) -> Option<u64> {
    if image.len() < 16 || &image[0..4] != ELF_MAGIC {
        return None;
    }
    let is_64 = match image[4] {
        1 => false,
        2 => true,
        _ => return None,
    };
    match image[5] {
        1 => load_alignment::<LittleEndian>(image, is_64),
        2 => load_alignment::<BigEndian>(image, is_64),
        _ => None,
    }
}

fn load_alignment<B: ByteOrder>(image: &[u8], is_64: bool) -> Option<u64> {
    let (phoff, phentsize, phnum) = if is_64 {
        let header = image.get(..64)?;
        (
            B::read_u64(&header[0x20..]),
            B::read_u16(&header[0x36..]) as usize,
            B::read_u16(&header[0x38..]) as usize,
        )
    } else {
        let header = image.get(..52)?;
        (
            B::read_u32(&header[0x1C..]) as u64,
            B::read_u16(&header[0x2A..]) as usize,
            B::read_u16(&header[0x2C..]) as usize,
        )
    };
    let min_entsize = if is_64 { 56 } else { 32 };
    if phentsize < min_entsize {
        return None;
    }

    let mut min_align: Option<u64> = None;
    for i in 0..phnum {
        let start = usize::try_from(phoff).ok()?.checked_add(i * phentsize)?;
        let ph = image.get(start..start.checked_add(min_entsize)?)?;
        if B::read_u32(ph) != PT_LOAD {
            continue;
        }
        let align = if is_64 {
            B::read_u64(&ph[48..])
        } else {
            B::read_u32(&ph[28..]) as u64
        };
        min_align = Some(min_align.map_or(align, |m| m.min(align)));
    }
    min_align
}
