use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::util::env_optional;

/// Bearer credential loaded once at startup from the token file written by
/// the one-time `auth` flow. Never refreshed or written back in-process; an
/// expired token simply makes calls fail.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Credential {
    pub(crate) access_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub(crate) expires_in: Option<u64>,
}

pub(crate) fn token_file_path() -> PathBuf {
    if let Some(path) = env_optional("OUTLOOK_TOKEN_FILE") {
        return PathBuf::from(path);
    }
    let home = env_optional("HOME")
        .or_else(|| env_optional("USERPROFILE"))
        .unwrap_or_else(|| ".".to_string());
    PathBuf::from(home).join(".outlook_token.json")
}

/// Absent or unparsable files both report `None`; the caller owns the
/// decision to treat that as fatal.
pub(crate) fn load_credential_from(path: &Path) -> Option<Credential> {
    let bytes = fs::read(path).ok()?;
    let credential: Credential = serde_json::from_slice(&bytes).ok()?;
    if credential.access_token.trim().is_empty() {
        return None;
    }
    Some(credential)
}

pub(crate) fn load_credential() -> Option<Credential> {
    load_credential_from(&token_file_path())
}

pub(crate) fn save_token(path: &Path, token: &serde_json::Value) -> io::Result<()> {
    let payload = serde_json::to_vec_pretty(token)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{e}")))?;
    fs::write(path, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("outlook-connector-test-{}-{name}", std::process::id()))
    }

    #[test]
    fn load_missing_file_is_not_found() {
        assert!(load_credential_from(Path::new("/nonexistent/token.json")).is_none());
    }

    #[test]
    fn load_round_trip() {
        let path = temp_path("round-trip.json");
        let token = serde_json::json!({
            "access_token": "tok-123",
            "token_type": "Bearer",
            "expires_in": 3600
        });
        save_token(&path, &token).unwrap();
        let credential = load_credential_from(&path).unwrap();
        assert_eq!(credential.access_token, "tok-123");
        assert_eq!(credential.expires_in, Some(3600));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn load_unparsable_file_is_not_found() {
        let path = temp_path("garbage.json");
        fs::write(&path, "not json at all").unwrap();
        assert!(load_credential_from(&path).is_none());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn load_empty_token_is_not_found() {
        let path = temp_path("empty-token.json");
        fs::write(&path, r#"{"access_token": ""}"#).unwrap();
        assert!(load_credential_from(&path).is_none());
        let _ = fs::remove_file(&path);
    }
}
