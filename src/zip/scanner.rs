//! Archive entry scanner.
//!
//! [`ArchiveScanner`] owns the archive's reader; every [`EntryCursor`] it
//! hands out shares that reader and decodes directory records lazily. The
//! file handle closes once the scanner and all cursors are dropped, whether
//! iteration completed, failed, or stopped early.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::AnalysisError;
use crate::io::{LocalFileReader, ReadAt};

use super::offset::effective_offset;
use super::parser::{ZipParser, parse_cdfh};
use super::structures::{ArchiveEntry, CentralDirectoryRecord};

/// Opens a zip container and yields its entries in directory order.
pub struct ArchiveScanner<R: ReadAt> {
    parser: ZipParser<R>,
    path: PathBuf,
}

impl ArchiveScanner<LocalFileReader> {
    /// Open a local container read-only.
    pub fn open(path: &Path) -> Result<Self, AnalysisError> {
        let reader = LocalFileReader::new(path).map_err(|source| AnalysisError::ArtifactNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::with_reader(Arc::new(reader), path))
    }
}

impl<R: ReadAt> ArchiveScanner<R> {
    pub fn with_reader(reader: Arc<R>, path: &Path) -> Self {
        Self {
            parser: ZipParser::new(reader),
            path: path.to_path_buf(),
        }
    }

    /// Size of the container in bytes.
    pub fn size(&self) -> u64 {
        self.parser.size()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reader(&self) -> &Arc<R> {
        self.parser.reader()
    }

    /// Start a fresh pass over the directory.
    ///
    /// Each call re-reads the central directory, so a scan can be restarted
    /// at any time.
    pub async fn entries(&self) -> Result<EntryCursor<R>, AnalysisError> {
        let cd = self
            .parser
            .read_central_directory()
            .await
            .map_err(|e| AnalysisError::unreadable(&self.path, e))?;
        debug!(
            path = %self.path.display(),
            entries = cd.total_entries,
            cd_bytes = cd.data.len(),
            "read central directory"
        );

        Ok(EntryCursor {
            parser: ZipParser::new(Arc::clone(self.parser.reader())),
            path: self.path.clone(),
            data: cd.data,
            position: 0,
            declared: cd.total_entries,
            remaining: cd.total_entries,
        })
    }

    /// Convenience: drain a cursor into a vector, stopping at the first error.
    pub async fn collect_entries(&self) -> Result<Vec<ArchiveEntry>, AnalysisError> {
        let mut cursor = self.entries().await?;
        let mut out = Vec::new();
        while let Some(entry) = cursor.next_entry().await {
            out.push(entry?);
        }
        Ok(out)
    }
}

/// A lazy pass over one archive's central directory.
pub struct EntryCursor<R: ReadAt> {
    parser: ZipParser<R>,
    path: PathBuf,
    data: Vec<u8>,
    position: u64,
    /// Entry count promised by the end record
    declared: u64,
    remaining: u64,
}

impl<R: ReadAt> EntryCursor<R> {
    /// Decode the next entry and read its local header.
    ///
    /// Returns `None` once the declared entries are read and the directory
    /// bytes are fully consumed. A corrupt directory record, or directory
    /// bytes left over after the declared count, yields
    /// [`AnalysisError::ArchiveUnreadable`] and ends the pass; a bad local
    /// header yields [`AnalysisError::OffsetComputation`] for that entry
    /// only, and iteration may continue.
    pub async fn next_entry(&mut self) -> Option<Result<ArchiveEntry, AnalysisError>> {
        let len = self.data.len() as u64;
        if self.remaining == 0 {
            if self.position >= len {
                return None;
            }
            let leftover = len - self.position;
            self.position = len;
            return Some(Err(AnalysisError::unreadable(
                &self.path,
                format!(
                    "Central Directory holds {} bytes beyond the {} entries declared",
                    leftover, self.declared
                ),
            )));
        }
        self.remaining -= 1;

        let mut cursor = Cursor::new(self.data.as_slice());
        cursor.set_position(self.position);
        let record = match parse_cdfh(&mut cursor) {
            Ok(record) => record,
            Err(e) => {
                self.remaining = 0;
                self.position = len;
                return Some(Err(AnalysisError::unreadable(&self.path, e)));
            }
        };
        self.position = cursor.position();

        Some(self.resolve_local(record).await)
    }

    /// Entries still to be decoded in this pass.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    async fn resolve_local(
        &self,
        record: CentralDirectoryRecord,
    ) -> Result<ArchiveEntry, AnalysisError> {
        let header = self
            .parser
            .read_local_header(record.lfh_offset)
            .await
            .map_err(|e| AnalysisError::OffsetComputation {
                entry: record.file_name.clone(),
                reason: format!("local header at offset {}: {e}", record.lfh_offset),
            })?;

        let entry = ArchiveEntry {
            name: record.file_name,
            header_offset: record.lfh_offset,
            compressed_size: record.compressed_size,
            uncompressed_size: record.uncompressed_size,
            compression_method: record.compression_method,
            filename_length: header.file_name_length,
            extra_field_length: header.extra_field_length,
        };

        // The payload must fit inside the archive
        let start = effective_offset(&entry);
        if start.saturating_add(entry.compressed_size) > self.parser.size() {
            return Err(AnalysisError::OffsetComputation {
                reason: format!(
                    "payload at {} with {} bytes extends past archive end ({} bytes)",
                    start,
                    entry.compressed_size,
                    self.parser.size()
                ),
                entry: entry.name,
            });
        }

        trace!(name = %entry.name, header_offset = entry.header_offset, payload = start, "entry");
        Ok(entry)
    }
}
