//! Bundle structure check.
//!
//! A bundle is recognised by its top-level manifest record. Its presence says
//! nothing about byte alignment: the store regenerates aligned packages from
//! bundles, so readiness only requires a well-formed bundle that carries
//! native code.

use super::classify::LibraryRecord;

/// Reserved top-level entry of every well-formed app bundle
pub const BUNDLE_MANIFEST_RECORD: &str = "BundleConfig.pb";

pub fn is_manifest_record(name: &str) -> bool {
    name == BUNDLE_MANIFEST_RECORD
}

/// Bundle readiness: manifest record present and at least one library.
pub fn bundle_ready(has_manifest_record: bool, libraries: &[LibraryRecord]) -> bool {
    has_manifest_record && !libraries.is_empty()
}
