//! Bundle layout shared by the reader and the builder.
//!
//! ```text
//! README.txt
//! data/collections.json
//! data/profile.json        (optional)
//! data/soldCards.json      (optional)
//! images/<cardId>.<ext>    (optional)
//! ```

use chrono::{DateTime, Utc};

use crate::stats::ExportSummary;

pub const README_ENTRY: &str = "README.txt";
pub const COLLECTIONS_ENTRY: &str = "data/collections.json";
pub const PROFILE_ENTRY: &str = "data/profile.json";
pub const SOLD_ITEMS_ENTRY: &str = "data/soldCards.json";
/// Older name of the sold-items document, still accepted on import.
pub const SOLD_ITEMS_ENTRY_ALIAS: &str = "data/sold-items.json";
pub const IMAGES_DIR: &str = "images";

/// Version written into exported collections documents.
pub const FORMAT_VERSION: u32 = 1;

/// Download name of an export created at `at`.
pub fn bundle_file_name(at: DateTime<Utc>) -> String {
    format!("cardvault-backup-{}.zip", at.format("%Y-%m-%d"))
}

pub(crate) fn readme(account: &str, at: DateTime<Utc>, summary: &ExportSummary) -> String {
    format!(
        "Card Vault backup\n\
         =================\n\
         \n\
         Account:   {account}\n\
         Exported:  {exported}\n\
         \n\
         Contents\n\
         --------\n\
         {COLLECTIONS_ENTRY}   {collections} collections, {cards} cards\n\
         {PROFILE_ENTRY}       {profile}\n\
         {SOLD_ITEMS_ENTRY}     {sold} sold items\n\
         {IMAGES_DIR}/                  {images} card images, named <cardId>.<ext>\n\
         \n\
         Import this file from the Backup & Restore screen to restore your data.\n\
         Collections are matched by name, so importing twice does not duplicate them.\n",
        exported = at.to_rfc3339(),
        collections = summary.collections,
        cards = summary.cards,
        profile = if summary.profile_included { "profile" } else { "no profile" },
        sold = summary.sold_items,
        images = summary.images,
    )
}

/// True if `name` is `target` or ends with `/target`, which tolerates one
/// or more wrapping folders added by archiving tools.
pub(crate) fn entry_matches(name: &str, target: &str) -> bool {
    name == target
        || name
            .strip_suffix(target)
            .is_some_and(|prefix| prefix.ends_with('/'))
}

/// True if `name` is a file somewhere under an `images/` folder.
pub(crate) fn is_image_entry(name: &str) -> bool {
    if name.ends_with('/') {
        return false;
    }
    let mut segments: Vec<&str> = name.split('/').collect();
    segments.pop();
    segments.last() == Some(&IMAGES_DIR)
}
