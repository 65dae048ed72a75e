#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes zip archives byte by byte so tests control every offset.
#[derive(Default)]
pub struct ZipBuilder {
    data: Vec<u8>,
    central: Vec<u8>,
    count: u16,
    zip64: bool,
    comment: Vec<u8>,
    declared: Option<u16>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store local header offsets in ZIP64 extra fields and end the archive
    /// with ZIP64 end records.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.as_bytes().to_vec();
        self
    }

    /// Entry count written to the end records instead of the real one.
    pub fn declared_entries(mut self, count: u16) -> Self {
        self.declared = Some(count);
        self
    }

    /// Raw bytes not belonging to any entry.
    pub fn gap(mut self, len: usize) -> Self {
        self.data.extend(std::iter::repeat_n(0u8, len));
        self
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data.to_vec(), data.len(), 0, Vec::new())
    }

    /// Stored entry whose payload starts exactly at `payload_offset`.
    pub fn stored_at(self, name: &str, data: &[u8], payload_offset: u64) -> Self {
        let header_offset = payload_offset - 30 - name.len() as u64;
        let gap = header_offset
            .checked_sub(self.data.len() as u64)
            .expect("payload offset already passed");
        self.gap(gap as usize).stored(name, data)
    }

    /// Stored entry padded through the local extra field only, the way
    /// alignment tools do, so the payload lands on a multiple of `align`.
    pub fn stored_aligned(self, name: &str, data: &[u8], align: u64) -> Self {
        let unpadded = self.data.len() as u64 + 30 + name.len() as u64;
        let mut pad = ((align - unpadded % align) % align) as usize;
        if pad > 0 && pad < 4 {
            pad += align as usize;
        }
        let mut extra = Vec::new();
        if pad > 0 {
            extra.extend_from_slice(&0xD935u16.to_le_bytes());
            extra.extend_from_slice(&((pad - 4) as u16).to_le_bytes());
            extra.extend(std::iter::repeat_n(0u8, pad - 4));
        }
        self.entry(name, data.to_vec(), data.len(), 0, extra)
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();
        self.entry(name, compressed, data.len(), 8, Vec::new())
    }

    /// Entry whose central record points at `bogus_offset` instead of its
    /// real local header.
    pub fn misdirected(mut self, name: &str, data: &[u8], bogus_offset: u32) -> Self {
        self = self.stored(name, data);
        // Patch the offset field of the record just written (42 bytes into the CDFH)
        let record_start = self.central.len() - 46 - name.len();
        self.central[record_start + 42..record_start + 46].copy_from_slice(&bogus_offset.to_le_bytes());
        self
    }

    fn entry(
        mut self,
        name: &str,
        payload: Vec<u8>,
        uncompressed: usize,
        method: u16,
        local_extra: Vec<u8>,
    ) -> Self {
        let lfh_offset = self.data.len() as u64;

        self.data.extend_from_slice(b"PK\x03\x04");
        self.data.extend_from_slice(&20u16.to_le_bytes());
        self.data.extend_from_slice(&0u16.to_le_bytes());
        self.data.extend_from_slice(&method.to_le_bytes());
        self.data.extend_from_slice(&[0u8; 8]); // time, date, crc
        self.data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.data.extend_from_slice(&(uncompressed as u32).to_le_bytes());
        self.data.extend_from_slice(&(name.len() as u16).to_le_bytes());
        self.data.extend_from_slice(&(local_extra.len() as u16).to_le_bytes());
        self.data.extend_from_slice(name.as_bytes());
        self.data.extend_from_slice(&local_extra);
        self.data.extend_from_slice(&payload);

        let mut central_extra = Vec::new();
        let offset_field = if self.zip64 {
            central_extra.extend_from_slice(&1u16.to_le_bytes());
            central_extra.extend_from_slice(&8u16.to_le_bytes());
            central_extra.extend_from_slice(&lfh_offset.to_le_bytes());
            0xFFFF_FFFF
        } else {
            lfh_offset as u32
        };

        self.central.extend_from_slice(b"PK\x01\x02");
        self.central.extend_from_slice(&20u16.to_le_bytes());
        self.central.extend_from_slice(&20u16.to_le_bytes());
        self.central.extend_from_slice(&0u16.to_le_bytes());
        self.central.extend_from_slice(&method.to_le_bytes());
        self.central.extend_from_slice(&[0u8; 8]);
        self.central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.central.extend_from_slice(&(uncompressed as u32).to_le_bytes());
        self.central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        self.central.extend_from_slice(&(central_extra.len() as u16).to_le_bytes());
        self.central.extend_from_slice(&[0u8; 10]); // comment len, disk, attrs
        self.central.extend_from_slice(&offset_field.to_le_bytes());
        self.central.extend_from_slice(name.as_bytes());
        self.central.extend_from_slice(&central_extra);

        self.count += 1;
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        let declared = self.declared.unwrap_or(self.count);
        let cd_offset = self.data.len() as u64;
        let cd_size = self.central.len() as u64;
        let central = std::mem::take(&mut self.central);
        self.data.extend_from_slice(&central);

        if self.zip64 {
            let eocd64_offset = self.data.len() as u64;
            self.data.extend_from_slice(b"PK\x06\x06");
            self.data.extend_from_slice(&44u64.to_le_bytes());
            self.data.extend_from_slice(&45u16.to_le_bytes());
            self.data.extend_from_slice(&45u16.to_le_bytes());
            self.data.extend_from_slice(&[0u8; 8]);
            self.data.extend_from_slice(&(declared as u64).to_le_bytes());
            self.data.extend_from_slice(&(declared as u64).to_le_bytes());
            self.data.extend_from_slice(&cd_size.to_le_bytes());
            self.data.extend_from_slice(&cd_offset.to_le_bytes());

            self.data.extend_from_slice(b"PK\x06\x07");
            self.data.extend_from_slice(&0u32.to_le_bytes());
            self.data.extend_from_slice(&eocd64_offset.to_le_bytes());
            self.data.extend_from_slice(&1u32.to_le_bytes());
        }

        let (entries, size, offset) = if self.zip64 {
            (0xFFFF, 0xFFFF_FFFF, 0xFFFF_FFFF)
        } else {
            (declared, cd_size as u32, cd_offset as u32)
        };
        self.data.extend_from_slice(b"PK\x05\x06");
        self.data.extend_from_slice(&[0u8; 4]);
        self.data.extend_from_slice(&entries.to_le_bytes());
        self.data.extend_from_slice(&entries.to_le_bytes());
        self.data.extend_from_slice(&size.to_le_bytes());
        self.data.extend_from_slice(&offset.to_le_bytes());
        self.data.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        self.data.extend_from_slice(&self.comment);
        self.data
    }

    pub fn write(self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.finish()).unwrap();
        path
    }
}

/// Minimal little-endian ELF64 image with one `PT_LOAD` per alignment.
pub fn elf64(load_alignments: &[u64]) -> Vec<u8> {
    let mut out = vec![0u8; 64];
    out[0..4].copy_from_slice(b"\x7fELF");
    out[4] = 2;
    out[5] = 1;
    out[0x20..0x28].copy_from_slice(&64u64.to_le_bytes());
    out[0x36..0x38].copy_from_slice(&56u16.to_le_bytes());
    out[0x38..0x3A].copy_from_slice(&(load_alignments.len() as u16).to_le_bytes());
    for align in load_alignments {
        let mut ph = vec![0u8; 56];
        ph[0..4].copy_from_slice(&1u32.to_le_bytes());
        ph[48..56].copy_from_slice(&align.to_le_bytes());
        out.extend(ph);
    }
    out
}
