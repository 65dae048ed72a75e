//! Payload offset resolution.
//!
//! A local file header is a fixed 30-byte block followed by the file name
//! and the extra field. The payload starts right after it, so its position
//! depends on the lengths recorded in the local header itself. Compression
//! and encryption never change those lengths; extra-field padding (zipalign,
//! ZIP64) does.

use super::structures::{ArchiveEntry, LFH_SIZE};

/// Length of the local header for the given variable field lengths.
pub fn local_header_length(filename_length: u16, extra_field_length: u16) -> u64 {
    LFH_SIZE as u64 + filename_length as u64 + extra_field_length as u64
}

/// Byte offset of the entry's payload within the archive.
///
/// Always `>= entry.header_offset`; saturates instead of wrapping on
/// nonsensical 64-bit offsets.
pub fn effective_offset(entry: &ArchiveEntry) -> u64 {
    entry.header_offset.saturating_add(local_header_length(
        entry.filename_length,
        entry.extra_field_length,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::CompressionMethod;

    fn entry(header_offset: u64, filename_length: u16, extra_field_length: u16) -> ArchiveEntry {
        ArchiveEntry {
            name: "lib/arm64-v8a/libapp.so".to_string(),
            header_offset,
            compressed_size: 0,
            uncompressed_size: 0,
            compression_method: CompressionMethod::Stored,
            filename_length,
            extra_field_length,
        }
    }

    #[test]
    fn header_length_counts_fixed_and_variable_parts() {
        assert_eq!(local_header_length(0, 0), 30);
        assert_eq!(local_header_length(23, 0), 53);
        assert_eq!(local_header_length(23, 4), 57);
    }

    #[test]
    fn offset_follows_header() {
        // 1048576 - 30 - 23 - 3 = 1048520
        let e = entry(1_048_520, 23, 3);
        assert_eq!(effective_offset(&e), 1_048_576);
    }

    #[test]
    fn offset_never_precedes_header() {
        for (off, name, extra) in [(0, 0, 0), (7, 1, 65535), (u64::MAX - 5, 10, 10)] {
            let e = entry(off, name, extra);
            assert!(effective_offset(&e) >= e.header_offset);
        }
    }

    #[test]
    fn max_lengths_do_not_overflow() {
        assert_eq!(local_header_length(u16::MAX, u16::MAX), 30 + 2 * 65535);
        assert_eq!(effective_offset(&entry(u64::MAX, 1, 1)), u64::MAX);
    }
}
