use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a successful login leaves behind between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub username: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl StoredSession {
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read session file")?;
        let session = serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(session))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).context("Failed to create session directory")?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize session")?;
        std::fs::write(path, contents).context("Failed to write session file")?;
        Ok(())
    }

    pub fn delete(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path).context("Failed to delete session file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        assert_eq!(StoredSession::load_from(&path).unwrap(), None);

        let session = StoredSession {
            username: "ocean".into(),
            token: Some("ocean_token_ocean_1234abcd".into()),
        };
        session.save_to(&path).unwrap();
        assert_eq!(StoredSession::load_from(&path).unwrap(), Some(session));

        StoredSession::delete(&path).unwrap();
        StoredSession::delete(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(StoredSession::load_from(&path).is_err());
    }
}
