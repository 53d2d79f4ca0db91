use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

pub const LIBRARY_KEY: &str = "interface.library";
pub const LOCATION_KEY: &str = "interface.location";
pub const STATE_KEY: &str = "launcher.state";

/// One JSON document per key, stored under a scope directory. The launcher
/// scope is the daemon data dir; per-version settings use the selected
/// interface's settings directory as their scope.
fn key_path(key: &str, scope: &Path) -> PathBuf {
    scope.join(format!("{key}.json"))
}

/// A missing key reads as `Ok(None)`, never as an error.
pub fn get(key: &str, scope: &Path) -> Result<Option<Value>, String> {
    let path = key_path(key, scope);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Ok(None),
    };
    let value = serde_json::from_str(&content)
        .map_err(|e| format!("failed to parse setting {key}: {e}"))?;
    Ok(Some(value))
}

pub fn set(key: &str, value: &Value, scope: &Path) -> Result<(), String> {
    fs::create_dir_all(scope)
        .map_err(|e| format!("failed to create settings dir {}: {e}", scope.display()))?;
    let payload = serde_json::to_string_pretty(value)
        .map_err(|e| format!("failed to serialize setting {key}: {e}"))?;
    fs::write(key_path(key, scope), payload)
        .map_err(|e| format!("failed to write setting {key}: {e}"))?;
    Ok(())
}

pub fn get_string(key: &str, scope: &Path) -> Result<Option<String>, String> {
    Ok(get(key, scope)?.and_then(|value| value.as_str().map(str::to_string)))
}

pub fn set_string(key: &str, value: &str, scope: &Path) -> Result<(), String> {
    set(key, &Value::String(value.to_string()), scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_key_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(get("interface.library", dir.path()).unwrap(), None);
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let value = json!({"noSteamVR": true, "customParameters": "--foo,--bar"});
        set(STATE_KEY, &value, dir.path()).unwrap();
        assert_eq!(get(STATE_KEY, dir.path()).unwrap(), Some(value));
    }

    #[test]
    fn string_helpers_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        set_string(LIBRARY_KEY, "/srv/orbit/library", dir.path()).unwrap();
        assert_eq!(
            get_string(LIBRARY_KEY, dir.path()).unwrap().as_deref(),
            Some("/srv/orbit/library")
        );
    }

    #[test]
    fn non_string_value_reads_as_none_string() {
        let dir = tempfile::tempdir().unwrap();
        set(LOCATION_KEY, &json!(42), dir.path()).unwrap();
        assert_eq!(get_string(LOCATION_KEY, dir.path()).unwrap(), None);
    }
}
