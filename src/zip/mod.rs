//! ZIP container reading for alignment analysis.
//!
//! Only the parts of the format needed to enumerate entries and locate
//! their payloads are decoded; payload contents are never validated.
//!
//! ## Architecture
//!
//! - [`structures`]: format records (EOCD, ZIP64 EOCD, headers) and [`ArchiveEntry`]
//! - [`parser`]: reading those records from a [`ReadAt`](crate::io::ReadAt) source
//! - [`scanner`]: lazy, re-openable iteration over a container's entries
//! - [`offset`]: payload offset arithmetic
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and (possibly compressed) data for each entry
//! 2. Central Directory with metadata for all entries
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Offsets stored in the Central Directory point at local headers, not at
//! payloads. The local header has to be read to find where data begins.
//!
//! ## Limitations
//!
//! - No multi-disk archive support
//! - Encrypted entries are enumerated but never decoded

mod offset;
mod parser;
mod scanner;
mod structures;

pub use offset::{effective_offset, local_header_length};
pub use parser::{CentralDirectory, ZipParser};
pub use scanner::{ArchiveScanner, EntryCursor};
pub use structures::*;
