use serde::Serialize;
use serde::ser::SerializeMap;

use crate::zip::{ArchiveEntry, CompressionMethod, effective_offset};

use super::{ArtifactKind, PAGE_SIZE};

/// Entry-name suffix identifying native shared libraries
pub const NATIVE_LIBRARY_SUFFIX: &str = ".so";

/// Module name for libraries outside any bundle module
pub const ROOT_MODULE: &str = "root";

pub fn is_native_library(name: &str) -> bool {
    name.ends_with(NATIVE_LIBRARY_SUFFIX)
}

/// Final path segment of an entry name.
pub fn library_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Module owning an entry: the first path segment for bundle entries with
/// at least two segments, otherwise [`ROOT_MODULE`].
pub fn module_of(name: &str, kind: ArtifactKind) -> &str {
    if kind != ArtifactKind::Bundle {
        return ROOT_MODULE;
    }
    match name.split_once('/') {
        Some((first, _)) if !first.is_empty() => first,
        _ => ROOT_MODULE,
    }
}

/// A classified native library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryRecord {
    pub library_name: String,
    pub module: String,
    /// Full entry name inside the archive
    pub path: String,
    pub effective_offset: u64,
    pub page_remainder: u64,
    pub aligned: bool,
    /// Stored with a compression method other than STORED
    pub compressed: bool,
    /// Smallest `PT_LOAD` alignment of the ELF image, when probed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_alignment: Option<u64>,
}

impl LibraryRecord {
    pub fn classify(entry: &ArchiveEntry, kind: ArtifactKind) -> Self {
        let effective_offset = effective_offset(entry);
        let page_remainder = effective_offset % PAGE_SIZE;
        Self {
            library_name: library_name(&entry.name).to_string(),
            module: module_of(&entry.name, kind).to_string(),
            path: entry.name.clone(),
            effective_offset,
            page_remainder,
            aligned: page_remainder == 0,
            compressed: entry.compression_method != CompressionMethod::Stored,
            load_alignment: None,
        }
    }

    /// Whether every loadable segment was linked for 16 KB pages.
    ///
    /// `None` when the ELF image was not probed or could not be parsed.
    pub fn load_segments_page_ready(&self) -> Option<bool> {
        self.load_alignment.map(|align| align >= PAGE_SIZE)
    }
}

/// Libraries of one module, in directory order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLibraries {
    pub name: String,
    pub libraries: Vec<LibraryRecord>,
}

/// Module name → libraries, ordered by first appearance.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleMap(Vec<ModuleLibraries>);

impl ModuleMap {
    pub fn group(libraries: &[LibraryRecord]) -> Self {
        let mut modules: Vec<ModuleLibraries> = Vec::new();
        for library in libraries {
            match modules.iter_mut().find(|m| m.name == library.module) {
                Some(module) => module.libraries.push(library.clone()),
                None => modules.push(ModuleLibraries {
                    name: library.module.clone(),
                    libraries: vec![library.clone()],
                }),
            }
        }
        Self(modules)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, name: &str) -> Option<&[LibraryRecord]> {
        self.0
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.libraries.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|m| m.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleLibraries> {
        self.0.iter()
    }
}

impl Serialize for ModuleMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for module in &self.0 {
            map.serialize_entry(&module.name, &module.libraries)?;
        }
        map.end()
    }
}
