//! JSON persistence for fitted models and other serializable objects

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Write `value` as pretty JSON, creating parent directories and replacing any existing file
pub fn save_object<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    tracing::debug!(path = %path.display(), "Saved object");
    Ok(())
}

/// Read an object previously written by [`save_object`]
pub fn load_object<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
