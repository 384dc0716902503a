// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs as tokiofs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::KnownHostsStorePort;
use crate::app::types::TrustedHostKey;

/// `hostname key-type base64-key`
pub fn format_line(key: &TrustedHostKey) -> String {
    format!("{} {} {}", key.hostname, key.key_type, key.key_base64)
}

/// Parses one store line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Option<TrustedHostKey> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut parts = line.split_whitespace();
    let hostname = parts.next()?;
    let key_type = parts.next()?;
    let key_base64 = parts.next()?;
    Some(TrustedHostKey::new(hostname, key_type, key_base64))
}

/// Append-only text file of trusted keys, one per line.
///
/// Appends through one instance (and its clones) are serialized, and a key
/// already in the file is not written again.
#[derive(Debug, Clone)]
pub struct KnownHostsFile {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl KnownHostsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn store_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::with_message(
        AppErrorKind::Local,
        codes::LOCAL_ERROR,
        format!("failed to {action} {}: {err}", path.display()),
    )
}

#[async_trait]
impl KnownHostsStorePort for KnownHostsFile {
    async fn load(&self) -> AppResult<Vec<TrustedHostKey>> {
        self.read_keys().await
    }

    async fn append(&self, key: &TrustedHostKey) -> AppResult<()> {
        let _write = self.write_lock.lock().await;
        if self.read_keys().await?.contains(key) {
            log::debug!("{} key for {} already saved", key.key_type, key.hostname);
            return Ok(());
        }
        self.append_line(key).await
    }
}

impl KnownHostsFile {
    async fn read_keys(&self) -> AppResult<Vec<TrustedHostKey>> {
        let contents = match tokiofs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(store_error("read", &self.path, err)),
        };
        let mut keys = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            match parse_line(line) {
                Some(key) => keys.push(key),
                None if line.trim().is_empty() || line.trim_start().starts_with('#') => {}
                None => log::warn!(
                    "ignoring malformed line {} in {}",
                    idx + 1,
                    self.path.display()
                ),
            }
        }
        Ok(keys)
    }

    async fn append_line(&self, key: &TrustedHostKey) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokiofs::create_dir_all(parent)
                .await
                .map_err(|err| store_error("create", parent, err))?;
        }
        let mut file = tokiofs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| store_error("open", &self.path, err))?;
        let mut line = format_line(key);
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|err| store_error("write", &self.path, err))?;
        file.flush()
            .await
            .map_err(|err| store_error("flush", &self.path, err))?;
        log::info!("saved {} key for {} to {}", key.key_type, key.hostname, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{HostKeyPromptPort, HostKeyResponse, HostKeyVerifier};
    use crate::app::services::host_keys::{InteractiveTrust, RejectUnknown, present};
    use crate::app::types::PresentedHostKey;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const BLOB: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";

    struct AlwaysAccept(AtomicUsize);

    #[async_trait]
    impl HostKeyPromptPort for AlwaysAccept {
        async fn ask(&self, _presented: &PresentedHostKey) -> AppResult<Option<HostKeyResponse>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Some(HostKeyResponse::AcceptAndPersist))
        }
    }

    #[test]
    fn parses_store_lines() {
        assert_eq!(
            parse_line("scylla.cs.uoi.gr ssh-ed25519 AAAA"),
            Some(TrustedHostKey::new("scylla.cs.uoi.gr", "ssh-ed25519", "AAAA"))
        );
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("# comment"), None);
        assert_eq!(parse_line("host-only ssh-rsa"), None);
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = KnownHostsFile::new(dir.path().join("absent"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_creates_parent_and_skips_malformed_lines_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ssh").join("turnin_known_hosts");
        let store = KnownHostsFile::new(&path);
        let key = TrustedHostKey::new("dl380ws01", "ssh-ed25519", BLOB);
        store.append(&key).await.unwrap();

        let mut contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, format!("dl380ws01 ssh-ed25519 {BLOB}\n"));
        contents.push_str("broken\n# note\n");
        std::fs::write(&path, contents).unwrap();

        assert_eq!(store.load().await.unwrap(), vec![key]);
    }

    #[tokio::test]
    async fn accepted_key_survives_a_fresh_store_instance() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("known");
        let presented = present(TrustedHostKey::new("scylla", "ssh-ed25519", BLOB)).unwrap();

        let prompt = Arc::new(AlwaysAccept(AtomicUsize::new(0)));
        for _ in 0..3 {
            let verifier = InteractiveTrust::new(
                Arc::new(KnownHostsFile::new(&path)),
                Vec::new(),
                Some(prompt.clone()),
            );
            verifier.verify(&presented).await.unwrap();
        }
        assert_eq!(prompt.0.load(Ordering::SeqCst), 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);

        // A headless verifier trusts it too, without any prompt.
        RejectUnknown::new(Arc::new(KnownHostsFile::new(&path)), Vec::new())
            .verify(&presented)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_appends_of_one_key_write_it_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("known");
        let store = KnownHostsFile::new(&path);
        let key = TrustedHostKey::new("scylla", "ssh-ed25519", BLOB);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let key = key.clone();
            tasks.push(tokio::spawn(async move { store.append(&key).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, format!("scylla ssh-ed25519 {BLOB}\n"));
    }

    #[tokio::test]
    async fn concurrent_verifications_write_whole_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("known");
        let store: Arc<dyn KnownHostsStorePort> = Arc::new(KnownHostsFile::new(&path));
        let prompt = Arc::new(AlwaysAccept(AtomicUsize::new(0)));
        let verifier = Arc::new(InteractiveTrust::new(store, Vec::new(), Some(prompt)));

        let mut tasks = Vec::new();
        for idx in 0..8 {
            let verifier = verifier.clone();
            tasks.push(tokio::spawn(async move {
                let presented =
                    present(TrustedHostKey::new(format!("dl380ws{idx:02}"), "ssh-ed25519", BLOB))
                        .unwrap();
                verifier.verify(&presented).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let reloaded = KnownHostsFile::new(&path).load().await.unwrap();
        assert_eq!(reloaded.len(), 8);
    }
}
