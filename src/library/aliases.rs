//! Optional `aliases.json` mapping category names to extra trigger names.
//!
//! ```json
//! { "epic": ["legendary", "wow"], "horns": ["airhorn"] }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use super::LibraryError;

/// File name looked up inside the sounds directory.
pub const ALIAS_FILE_NAME: &str = "aliases.json";

/// Category name → alias names.
pub type AliasMap = BTreeMap<String, Vec<String>>;

/// Read `aliases.json` from `sounds_dir`.
///
/// A missing file is not an error and yields an empty map.
pub fn read_aliases(sounds_dir: &Path) -> Result<AliasMap, LibraryError> {
    let path = sounds_dir.join(ALIAS_FILE_NAME);

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("no {ALIAS_FILE_NAME} found, not configuring aliases");
            return Ok(AliasMap::new());
        }
        Err(source) => return Err(LibraryError::Io { path, source }),
    };

    serde_json::from_str(&content).map_err(|source| LibraryError::Aliases { path, source })
}
