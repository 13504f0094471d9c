//! Import input detection and bundle unpacking.

use std::io::{Read, Seek};

use serde::Serialize;
use tracing::debug;
use zip::ZipArchive;

use crate::assets::AssetEntry;
use crate::error::{MigrateError, MigrateResult};
use crate::layout::{
    COLLECTIONS_ENTRY, PROFILE_ENTRY, README_ENTRY, SOLD_ITEMS_ENTRY, SOLD_ITEMS_ENTRY_ALIAS,
    entry_matches, is_image_entry,
};

/// Resource-fork junk added by macOS archivers.
const MACOS_METADATA_DIR: &str = "__MACOSX/";

/// What kind of file the user handed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// A single JSON document.
    Document,
    /// A zip bundle.
    Bundle,
}

impl InputKind {
    /// Picks the import path from the file extension.
    pub fn from_file_name(file_name: &str) -> MigrateResult<Self> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "json" => Ok(Self::Document),
            "zip" => Ok(Self::Bundle),
            _ => Err(MigrateError::UnsupportedInput(file_name.to_string())),
        }
    }
}

/// The parts of a bundle the importer cares about. Every part is optional.
#[derive(Debug, Clone, Default)]
pub struct BundleContents {
    pub collections: Option<Vec<u8>>,
    pub profile: Option<Vec<u8>>,
    pub sold_items: Option<Vec<u8>>,
    pub assets: Vec<AssetEntry>,
    pub readme: Option<Vec<u8>>,
}

impl BundleContents {
    /// Opens a zip bundle and extracts the known entries.
    pub fn open<R: Read + Seek>(reader: R) -> MigrateResult<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut contents = Self::default();
        let mut sold_alias = None;

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            if name.starts_with(MACOS_METADATA_DIR) {
                continue;
            }

            let slot = if entry_matches(&name, COLLECTIONS_ENTRY) {
                Some(&mut contents.collections)
            } else if entry_matches(&name, PROFILE_ENTRY) {
                Some(&mut contents.profile)
            } else if entry_matches(&name, SOLD_ITEMS_ENTRY) {
                Some(&mut contents.sold_items)
            } else if entry_matches(&name, SOLD_ITEMS_ENTRY_ALIAS) {
                Some(&mut sold_alias)
            } else if entry_matches(&name, README_ENTRY) {
                Some(&mut contents.readme)
            } else {
                None
            };

            let mut data = Vec::new();
            match slot {
                Some(slot) => {
                    file.read_to_end(&mut data)?;
                    *slot = Some(data);
                }
                None if is_image_entry(&name) => {
                    file.read_to_end(&mut data)?;
                    contents.assets.push(AssetEntry {
                        path: name,
                        content: data,
                    });
                }
                None => debug!(entry = %name, "ignoring unknown bundle entry"),
            }
        }

        if contents.sold_items.is_none() {
            contents.sold_items = sold_alias;
        }
        Ok(contents)
    }

    /// Summarizes the bundle without importing anything.
    pub fn inspection(&self) -> BundleInspection {
        BundleInspection {
            has_collections: self.collections.is_some(),
            has_profile: self.profile.is_some(),
            has_sold_items: self.sold_items.is_some(),
            assets: self.assets.len(),
            readme: self
                .readme
                .as_deref()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// Which parts a bundle contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleInspection {
    pub has_collections: bool,
    pub has_profile: bool,
    pub has_sold_items: bool,
    pub assets: usize,
    pub readme: Option<String>,
}

/// Opens a bundle from bytes and reports what it contains.
pub fn inspect_bundle(bytes: &[u8]) -> MigrateResult<BundleInspection> {
    let contents = BundleContents::open(std::io::Cursor::new(bytes))?;
    Ok(contents.inspection())
}
