//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory in one request
//! 4. Read each entry's Local File Header to learn where its payload starts
//!
//! Parsing the directory records themselves is separated from reading
//! ([`parse_cdfh`]) so the scanner can decode records one at a time.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Raw central directory bytes plus the entry count the EOCD promised.
#[derive(Debug)]
pub struct CentralDirectory {
    pub data: Vec<u8>,
    pub total_entries: u64,
}

/// Low-level ZIP file parser.
///
/// Generic over the reader so tests and callers can plug in any
/// random-access source.
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Total size of the archive in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Returns the record and its offset in the file. Archives with a
    /// trailing comment are handled by searching backwards for the signature.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            bail!("Not a valid ZIP file: {} bytes is too small", self.size);
        }

        // Common case: no comment, EOCD is the last 22 bytes
        let offset = self.size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf).await?;
        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            return Ok((EndOfCentralDirectory::from_bytes(&buf)?, offset));
        }

        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            // The comment length must account for every trailing byte
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                return Ok((eocd, search_start + i as u64));
            }
        }

        bail!("Not a valid ZIP file: End of Central Directory not found")
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// The locator sits immediately before the regular EOCD.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .context("ZIP64 End of Central Directory Locator missing")?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_exact_at(locator_offset, &mut locator_buf)
            .await?;
        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;
        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// Locate and read the whole Central Directory.
    pub async fn read_central_directory(&self) -> Result<CentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        // Reject directories that overlap the EOCD before allocating for them
        match cd_offset.checked_add(cd_size) {
            Some(end) if end <= eocd_offset => {}
            _ => bail!(
                "Central Directory out of bounds: offset {} size {} (EOCD at {})",
                cd_offset,
                cd_size,
                eocd_offset
            ),
        }
        if total_entries.saturating_mul(CDFH_MIN_SIZE as u64) > cd_size {
            bail!(
                "Central Directory too small for {} entries ({} bytes)",
                total_entries,
                cd_size
            );
        }

        let mut data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut data).await?;

        Ok(CentralDirectory {
            data,
            total_entries,
        })
    }

    /// Read the variable-length fields of the local header at `lfh_offset`.
    pub async fn read_local_header(&self, lfh_offset: u64) -> Result<LocalFileHeader> {
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader.read_exact_at(lfh_offset, &mut lfh_buf).await?;
        LocalFileHeader::from_bytes(&lfh_buf)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

/// Parse a Central Directory File Header from a cursor.
///
/// ZIP64 extended information (extra field `0x0001`) overrides sizes and the
/// local header offset when the 32-bit fields are saturated.
pub fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<CentralDirectoryRecord> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        bail!(
            "Invalid Central Directory File Header at directory offset {}",
            cursor.position() - 4
        );
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let _crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    // Lossy: entry names are only matched against ASCII suffixes and prefixes
    let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();
    if file_name.is_empty() {
        bail!("Central Directory entry with empty name");
    }

    let extra_field_end = cursor.position() + extra_field_length as u64;
    if extra_field_end + file_comment_length as u64 > cursor.get_ref().len() as u64 {
        bail!("Central Directory entry '{}' is truncated", file_name);
    }

    while cursor.position() + 4 <= extra_field_end {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()?;
        let field_end = (cursor.position() + field_size as u64).min(extra_field_end);

        if header_id == ZIP64_EXTRA_ID {
            // Values appear only for header fields saturated at 0xFFFFFFFF, in this order
            if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                lfh_offset = cursor.read_u64::<LittleEndian>()?;
            }
        }
        cursor.set_position(field_end);
    }

    cursor.set_position(extra_field_end + file_comment_length as u64);

    Ok(CentralDirectoryRecord {
        file_name,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        lfh_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cdfh(name: &str, lfh_offset: u32, extra: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(CDFH_SIGNATURE);
        out.extend_from_slice(&[20, 0, 20, 0, 0, 0, 8, 0, 0, 0, 0, 0]);
        out.extend_from_slice(&0u32.to_le_bytes()); // crc
        out.extend_from_slice(&10u32.to_le_bytes());
        out.extend_from_slice(&20u32.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        out.extend_from_slice(&lfh_offset.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(extra);
        out
    }

    #[test]
    fn parses_plain_record() {
        let data = cdfh("lib/arm64-v8a/libapp.so", 4096, &[]);
        let mut cursor = Cursor::new(data.as_slice());
        let record = parse_cdfh(&mut cursor).unwrap();
        assert_eq!(record.file_name, "lib/arm64-v8a/libapp.so");
        assert_eq!(record.lfh_offset, 4096);
        assert_eq!(record.compressed_size, 10);
        assert_eq!(record.uncompressed_size, 20);
        assert_eq!(record.compression_method, CompressionMethod::Deflate);
        assert_eq!(cursor.position(), data.len() as u64);
    }

    #[test]
    fn zip64_extra_overrides_offset() {
        let mut extra = Vec::new();
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&8u16.to_le_bytes());
        extra.extend_from_slice(&0x1_0000_4000u64.to_le_bytes());
        let data = cdfh("big.so", 0xFFFFFFFF, &extra);

        let record = parse_cdfh(&mut Cursor::new(data.as_slice())).unwrap();
        assert_eq!(record.lfh_offset, 0x1_0000_4000);
    }

    #[test]
    fn unknown_extra_fields_are_skipped() {
        let mut extra = Vec::new();
        extra.extend_from_slice(&0xD935u16.to_le_bytes());
        extra.extend_from_slice(&6u16.to_le_bytes());
        extra.extend_from_slice(&[0; 6]);
        let mut data = cdfh("a.so", 12, &extra);
        data.extend(cdfh("b.so", 99, &[]));

        let mut cursor = Cursor::new(data.as_slice());
        assert_eq!(parse_cdfh(&mut cursor).unwrap().lfh_offset, 12);
        let second = parse_cdfh(&mut cursor).unwrap();
        assert_eq!(second.file_name, "b.so");
        assert_eq!(second.lfh_offset, 99);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut data = cdfh("a.so", 0, &[]);
        data[0] = b'X';
        assert!(parse_cdfh(&mut Cursor::new(data.as_slice())).is_err());
    }

    fn eocd(disk: u16, cd_disk: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        out.extend_from_slice(&disk.to_le_bytes());
        out.extend_from_slice(&cd_disk.to_le_bytes());
        out.extend_from_slice(&[1, 0, 1, 0]);
        out.extend_from_slice(&46u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&[0, 0]);
        out
    }

    #[test]
    fn rejects_multi_disk_archives() {
        let single = EndOfCentralDirectory::from_bytes(&eocd(0, 0)).unwrap();
        assert_eq!(single.total_entries, 1);
        assert_eq!(single.cd_size, 46);

        let err = EndOfCentralDirectory::from_bytes(&eocd(1, 0)).unwrap_err();
        assert!(err.to_string().contains("Multi-disk"));
        assert!(EndOfCentralDirectory::from_bytes(&eocd(2, 1)).is_err());
        assert!(EndOfCentralDirectory::from_bytes(&eocd(0xFFFF, 0xFFFF)).is_ok());
    }

    #[test]
    fn rejects_truncated_record() {
        let data = cdfh("lib/x86/libfoo.so", 0, &[]);
        let short = &data[..data.len() - 4];
        assert!(parse_cdfh(&mut Cursor::new(short)).is_err());
    }
}
