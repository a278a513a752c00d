//! Directory-backed store: one `<key>.json` file per key.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::KeyValueStore;

const FILE_EXTENSION: &str = ".json";

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", encode_key(key), FILE_EXTENSION))
    }
}

/// Keys may contain characters that are not safe in file names (`/`, `:`),
/// so everything outside `[A-Za-z0-9_.-]` is percent-encoded.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read store entry: {}", key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        tokio::fs::write(&path, value)
            .await
            .with_context(|| format!("Failed to write store entry: {}", key))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove store entry: {}", key)),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to list store directory: {}", self.dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(FILE_EXTENSION) else { continue };
            match decode_key(stem) {
                Some(key) => keys.push(key),
                None => debug!(file = name, "Skipping file with undecodable key"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_encoding() {
        assert_eq!(encode_key("cache_news"), "cache_news");
        assert_eq!(encode_key("recent_spot/1:a"), "recent_spot%2F1%3Aa");
        assert_eq!(decode_key("recent_spot%2F1%3Aa").as_deref(), Some("recent_spot/1:a"));
        assert_eq!(decode_key("bad%2"), None);
    }

    #[tokio::test]
    async fn test_file_store_roundtrip_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store")).unwrap();

        assert!(store.get("pending_actions").await.unwrap().is_none());
        store.set("pending_actions", "[]").await.unwrap();
        store.set("draft_report/issue", "{}").await.unwrap();
        std::fs::write(store.dir().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.get("pending_actions").await.unwrap().as_deref(), Some("[]"));
        assert_eq!(
            store.list_keys().await.unwrap(),
            vec!["draft_report/issue".to_string(), "pending_actions".to_string()]
        );

        store.remove("pending_actions").await.unwrap();
        store.remove("pending_actions").await.unwrap();
        assert!(store.get("pending_actions").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::new(dir.path().to_path_buf()).unwrap();
            store.set("session", "{\"token\":\"t\"}").await.unwrap();
        }
        let reopened = FileStore::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(
            reopened.get("session").await.unwrap().as_deref(),
            Some("{\"token\":\"t\"}")
        );
    }
}
