// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Host key trust decisions.
//!
//! Three strategies share the [`HostKeyVerifier`] seam:
//! - [`PinnedKeys`] trusts only keys supplied by configuration.
//! - [`RejectUnknown`] also trusts the persisted store and rejects the rest.
//! - [`InteractiveTrust`] asks a person about unknown keys and persists the
//!   ones they accept.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use md5::Md5;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{HostKeyPromptPort, HostKeyResponse, HostKeyVerifier, KnownHostsStorePort};
use crate::app::types::{PresentedHostKey, TrustedHostKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyMode {
    PinnedOnly,
    Interactive,
    RejectUnknown,
}

impl HostKeyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            HostKeyMode::PinnedOnly => "pinned",
            HostKeyMode::Interactive => "interactive",
            HostKeyMode::RejectUnknown => "reject-unknown",
        }
    }
}

impl FromStr for HostKeyMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pinned" | "pinned-only" => Ok(HostKeyMode::PinnedOnly),
            "interactive" => Ok(HostKeyMode::Interactive),
            "reject-unknown" | "reject" | "headless" => Ok(HostKeyMode::RejectUnknown),
            other => Err(AppError::with_message(
                AppErrorKind::InvalidArgument,
                codes::INVALID_ARGUMENT,
                format!(
                    "unknown host key mode '{other}' (expected pinned, interactive or reject-unknown)"
                ),
            )),
        }
    }
}

/// Builds the verifier for `mode`. `prompt` is only consulted in interactive mode.
pub fn build_verifier(
    mode: HostKeyMode,
    store: Arc<dyn KnownHostsStorePort>,
    pinned: Vec<TrustedHostKey>,
    prompt: Option<Arc<dyn HostKeyPromptPort>>,
) -> Arc<dyn HostKeyVerifier> {
    match mode {
        HostKeyMode::PinnedOnly => Arc::new(PinnedKeys::new(pinned)),
        HostKeyMode::RejectUnknown => Arc::new(RejectUnknown::new(store, pinned)),
        HostKeyMode::Interactive => Arc::new(InteractiveTrust::new(store, pinned, prompt)),
    }
}

/// `SHA256:` fingerprint in the unpadded base64 form OpenSSH prints.
pub fn sha256_fingerprint(blob: &[u8]) -> String {
    format!("SHA256:{}", STANDARD_NO_PAD.encode(Sha256::digest(blob)))
}

pub fn md5_fingerprint(blob: &[u8]) -> String {
    let hex: Vec<String> = Md5::digest(blob)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    format!("MD5:{}", hex.join(":"))
}

/// Attaches fingerprints to a key taken from a handshake.
pub fn present(key: TrustedHostKey) -> AppResult<PresentedHostKey> {
    let blob = STANDARD.decode(key.key_base64.as_bytes()).map_err(|err| {
        AppError::with_message(
            AppErrorKind::HostKey,
            codes::HOST_KEY_REJECTED,
            format!("host key for {} is not valid base64: {err}", key.hostname),
        )
    })?;
    Ok(PresentedHostKey {
        sha256_fingerprint: sha256_fingerprint(&blob),
        md5_fingerprint: md5_fingerprint(&blob),
        key,
    })
}

fn rejected(presented: &PresentedHostKey, why: &str) -> AppError {
    AppError::with_message(
        AppErrorKind::HostKey,
        codes::HOST_KEY_REJECTED,
        format!(
            "{} key for {} ({}) {why}",
            presented.key.key_type, presented.key.hostname, presented.sha256_fingerprint
        ),
    )
}

fn warn_if_changed(known: &[TrustedHostKey], presented: &PresentedHostKey) {
    let changed = known.iter().any(|key| {
        key.hostname == presented.key.hostname
            && key.key_type == presented.key.key_type
            && key.key_base64 != presented.key.key_base64
    });
    if changed {
        tracing::warn!(
            host = %presented.key.hostname,
            key_type = %presented.key.key_type,
            "host key differs from the one on record"
        );
    }
}

pub struct PinnedKeys {
    pinned: Vec<TrustedHostKey>,
}

impl PinnedKeys {
    pub fn new(pinned: Vec<TrustedHostKey>) -> Self {
        Self { pinned }
    }

    pub fn trusts(&self, key: &TrustedHostKey) -> bool {
        self.pinned.contains(key)
    }
}

#[async_trait]
impl HostKeyVerifier for PinnedKeys {
    async fn verify(&self, presented: &PresentedHostKey) -> AppResult<()> {
        if self.trusts(&presented.key) {
            return Ok(());
        }
        warn_if_changed(&self.pinned, presented);
        Err(rejected(presented, "is not in the pinned key list"))
    }
}

pub struct RejectUnknown {
    store: Arc<dyn KnownHostsStorePort>,
    pinned: Vec<TrustedHostKey>,
}

impl RejectUnknown {
    pub fn new(store: Arc<dyn KnownHostsStorePort>, pinned: Vec<TrustedHostKey>) -> Self {
        Self { store, pinned }
    }
}

#[async_trait]
impl HostKeyVerifier for RejectUnknown {
    async fn verify(&self, presented: &PresentedHostKey) -> AppResult<()> {
        if self.pinned.contains(&presented.key) {
            return Ok(());
        }
        let known = self.store.load().await?;
        if known.contains(&presented.key) {
            return Ok(());
        }
        warn_if_changed(&known, presented);
        Err(rejected(presented, "is unknown and no one is available to confirm it"))
    }
}

pub struct InteractiveTrust {
    store: Arc<dyn KnownHostsStorePort>,
    pinned: PinnedKeys,
    prompt: Option<Arc<dyn HostKeyPromptPort>>,
    // One verification event at a time, so accept-and-persist never races.
    serial: Mutex<()>,
}

impl InteractiveTrust {
    pub fn new(
        store: Arc<dyn KnownHostsStorePort>,
        pinned: Vec<TrustedHostKey>,
        prompt: Option<Arc<dyn HostKeyPromptPort>>,
    ) -> Self {
        Self {
            store,
            pinned: PinnedKeys::new(pinned),
            prompt,
            serial: Mutex::new(()),
        }
    }

    async fn persist(&self, key: &TrustedHostKey) -> AppResult<()> {
        if self.store.load().await?.contains(key) {
            return Ok(());
        }
        self.store.append(key).await
    }
}

#[async_trait]
impl HostKeyVerifier for InteractiveTrust {
    async fn verify(&self, presented: &PresentedHostKey) -> AppResult<()> {
        let _serial = self.serial.lock().await;

        if self.pinned.trusts(&presented.key) {
            return Ok(());
        }
        let known = self.store.load().await?;
        if known.contains(&presented.key) {
            return Ok(());
        }
        warn_if_changed(&known, presented);

        let Some(prompt) = &self.prompt else {
            return Err(rejected(presented, "is unknown and no prompt is available"));
        };
        match prompt.ask(presented).await? {
            Some(HostKeyResponse::AcceptAndPersist) => {
                self.persist(&presented.key).await?;
                tracing::info!(
                    host = %presented.key.hostname,
                    key_type = %presented.key.key_type,
                    "host key accepted and saved"
                );
                Ok(())
            }
            Some(HostKeyResponse::Reject) => Err(rejected(presented, "was rejected")),
            Some(HostKeyResponse::PinnedOnly) => self.pinned.verify(presented).await,
            None => Err(rejected(presented, "is unknown and no prompt is available")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ED25519_BLOB: &str =
        "AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";

    #[derive(Default)]
    struct MemoryStore {
        keys: std::sync::Mutex<Vec<TrustedHostKey>>,
        appends: AtomicUsize,
    }

    #[async_trait]
    impl KnownHostsStorePort for MemoryStore {
        async fn load(&self) -> AppResult<Vec<TrustedHostKey>> {
            Ok(self.keys.lock().unwrap().clone())
        }

        async fn append(&self, key: &TrustedHostKey) -> AppResult<()> {
            self.appends.fetch_add(1, Ordering::SeqCst);
            self.keys.lock().unwrap().push(key.clone());
            Ok(())
        }
    }

    struct ScriptedPrompt {
        answer: Option<HostKeyResponse>,
        asked: AtomicUsize,
    }

    impl ScriptedPrompt {
        fn new(answer: Option<HostKeyResponse>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                asked: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HostKeyPromptPort for ScriptedPrompt {
        async fn ask(&self, _presented: &PresentedHostKey) -> AppResult<Option<HostKeyResponse>> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    fn key(host: &str) -> PresentedHostKey {
        present(TrustedHostKey::new(host, "ssh-ed25519", ED25519_BLOB)).unwrap()
    }

    #[test]
    fn fingerprints_have_openssh_shape() {
        let presented = key("scylla.cs.uoi.gr");
        assert!(presented.sha256_fingerprint.starts_with("SHA256:"));
        assert!(!presented.sha256_fingerprint.ends_with('='));
        assert_eq!(presented.sha256_fingerprint.len(), "SHA256:".len() + 43);
        let md5 = presented.md5_fingerprint.strip_prefix("MD5:").unwrap();
        assert_eq!(md5.split(':').count(), 16);
        assert!(md5.chars().all(|c| c == ':' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn md5_of_empty_input_is_known_value() {
        assert_eq!(
            md5_fingerprint(b""),
            "MD5:d4:1d:8c:d9:8f:00:b2:04:e9:80:09:98:ec:f8:42:7e"
        );
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let err = present(TrustedHostKey::new("h", "ssh-rsa", "!!!")).unwrap_err();
        assert_eq!(err.kind(), AppErrorKind::HostKey);
    }

    #[test]
    fn parses_modes() {
        assert_eq!(
            "Interactive".parse::<HostKeyMode>().unwrap(),
            HostKeyMode::Interactive
        );
        assert_eq!(
            "pinned".parse::<HostKeyMode>().unwrap(),
            HostKeyMode::PinnedOnly
        );
        assert_eq!(
            "reject-unknown".parse::<HostKeyMode>().unwrap(),
            HostKeyMode::RejectUnknown
        );
        assert!("always".parse::<HostKeyMode>().is_err());
    }

    #[tokio::test]
    async fn pinned_keys_trust_only_exact_triples() {
        let presented = key("dl380ws01");
        let verifier = PinnedKeys::new(vec![presented.key.clone()]);
        verifier.verify(&presented).await.unwrap();

        let other_host = key("dl380ws02");
        assert!(verifier.verify(&other_host).await.is_err());
    }

    #[tokio::test]
    async fn reject_unknown_never_trusts_unmatched_keys() {
        let store = Arc::new(MemoryStore::default());
        let verifier = RejectUnknown::new(store.clone(), Vec::new());
        let err = verifier.verify(&key("scylla")).await.unwrap_err();
        assert_eq!(err.kind(), AppErrorKind::HostKey);
        assert_eq!(store.appends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reject_unknown_trusts_persisted_keys() {
        let store = Arc::new(MemoryStore::default());
        let presented = key("scylla");
        store.keys.lock().unwrap().push(presented.key.clone());
        RejectUnknown::new(store, Vec::new())
            .verify(&presented)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn interactive_without_prompt_rejects() {
        let store = Arc::new(MemoryStore::default());
        let verifier = InteractiveTrust::new(store, Vec::new(), None);
        assert!(verifier.verify(&key("scylla")).await.is_err());
    }

    #[tokio::test]
    async fn headless_prompt_rejects() {
        let store = Arc::new(MemoryStore::default());
        let prompt = ScriptedPrompt::new(None);
        let verifier = InteractiveTrust::new(store.clone(), Vec::new(), Some(prompt.clone()));
        assert!(verifier.verify(&key("scylla")).await.is_err());
        assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
        assert!(store.keys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn accepted_key_is_persisted_exactly_once() {
        let store = Arc::new(MemoryStore::default());
        let prompt = ScriptedPrompt::new(Some(HostKeyResponse::AcceptAndPersist));
        let verifier = InteractiveTrust::new(store.clone(), Vec::new(), Some(prompt.clone()));
        let presented = key("scylla");

        verifier.verify(&presented).await.unwrap();
        verifier.verify(&presented).await.unwrap();

        assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
        assert_eq!(store.keys.lock().unwrap().as_slice(), &[presented.key]);
    }

    #[tokio::test]
    async fn reject_response_fails_and_persists_nothing() {
        let store = Arc::new(MemoryStore::default());
        let prompt = ScriptedPrompt::new(Some(HostKeyResponse::Reject));
        let verifier = InteractiveTrust::new(store.clone(), Vec::new(), Some(prompt));
        assert!(verifier.verify(&key("scylla")).await.is_err());
        assert_eq!(store.appends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pinned_fallback_response_checks_pinned_list() {
        let store = Arc::new(MemoryStore::default());
        let prompt = ScriptedPrompt::new(Some(HostKeyResponse::PinnedOnly));
        let pinned = key("dl380ws01");
        let verifier = InteractiveTrust::new(
            store.clone(),
            vec![TrustedHostKey::new("dl380ws01", "ssh-rsa", "AAAAB3NzaC1yc2E=")],
            Some(prompt.clone()),
        );
        // Same host, different key type: falls through to the prompt, then the pinned list rejects.
        assert!(verifier.verify(&pinned).await.is_err());
        assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
        assert_eq!(store.appends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pinned_keys_skip_the_prompt() {
        let store = Arc::new(MemoryStore::default());
        let prompt = ScriptedPrompt::new(Some(HostKeyResponse::Reject));
        let presented = key("dl380ws01");
        let verifier = build_verifier(
            HostKeyMode::Interactive,
            store,
            vec![presented.key.clone()],
            Some(prompt.clone()),
        );
        verifier.verify(&presented).await.unwrap();
        assert_eq!(prompt.asked.load(Ordering::SeqCst), 0);
    }
}
