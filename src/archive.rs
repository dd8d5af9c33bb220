//! Locating the registry entry inside the downloaded ZIP container

use crate::error::LocateError;
use crate::types::ArchiveEntry;
use bytes::Bytes;
use std::io::Cursor;
use tracing::debug;
use zip::ZipArchive;

/// Selects the registry entry from an in-memory archive by exact path
#[derive(Clone, Debug)]
pub struct ArchiveLocator {
    target: String,
}

impl ArchiveLocator {
    /// Locator for the entry at `target` (e.g. `TMP/DGII_RNC.TXT`)
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Configured entry path
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Parse the container and find the configured entry
    ///
    /// Entries are listed in directory order and each name is logged at debug
    /// level. Only an exact name match is accepted.
    pub fn locate(&self, bytes: Bytes) -> Result<LocatedArchive, LocateError> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| LocateError::CorruptArchive {
                reason: format!("failed to read ZIP directory: {e}"),
            })?;

        let mut available = Vec::with_capacity(archive.len());
        let mut found = None;

        for index in 0..archive.len() {
            let file = archive
                .by_index_raw(index)
                .map_err(|e| LocateError::CorruptArchive {
                    reason: format!("failed to read ZIP entry {index}: {e}"),
                })?;

            let name = file.name().to_string();
            debug!(index, entry = %name, size = file.size(), "archive entry");

            if found.is_none() && name == self.target {
                found = Some(ArchiveEntry {
                    name: name.clone(),
                    index,
                    compressed_size: file.compressed_size(),
                    size: file.size(),
                });
            }
            available.push(name);
        }

        match found {
            Some(entry) => {
                debug!(entry = %entry.name, index = entry.index, "registry entry located");
                Ok(LocatedArchive { archive, entry })
            }
            None => Err(LocateError::EntryNotFound {
                expected: self.target.clone(),
                available,
            }),
        }
    }
}

/// An archive with its registry entry selected, ready to be opened
pub struct LocatedArchive {
    archive: ZipArchive<Cursor<Bytes>>,
    entry: ArchiveEntry,
}

impl LocatedArchive {
    /// Descriptor of the selected entry
    pub fn entry(&self) -> &ArchiveEntry {
        &self.entry
    }

    /// Open the selected entry for reading (container decompression applied)
    pub fn open(&mut self) -> Result<zip::read::ZipFile<'_>, LocateError> {
        self.archive
            .by_index(self.entry.index)
            .map_err(|e| LocateError::CorruptArchive {
                reason: format!("failed to open entry {}: {e}", self.entry.name),
            })
    }
}

impl std::fmt::Debug for LocatedArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocatedArchive")
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}
