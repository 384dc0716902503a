// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::types::{PresentedHostKey, TrustedHostKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyResponse {
    AcceptAndPersist,
    Reject,
    PinnedOnly,
}

#[async_trait]
/// Asks a person whether an unknown host key should be trusted.
/// `Ok(None)` means no interactive surface is available.
pub trait HostKeyPromptPort: Send + Sync {
    async fn ask(&self, presented: &PresentedHostKey) -> AppResult<Option<HostKeyResponse>>;
}

#[async_trait]
/// Append-only persisted set of trusted host keys.
pub trait KnownHostsStorePort: Send + Sync {
    async fn load(&self) -> AppResult<Vec<TrustedHostKey>>;

    async fn append(&self, key: &TrustedHostKey) -> AppResult<()>;
}

#[async_trait]
/// Decides whether a key presented during a handshake is trusted.
/// `Ok(())` trusts it; any error rejects it and aborts the handshake.
pub trait HostKeyVerifier: Send + Sync {
    async fn verify(&self, presented: &PresentedHostKey) -> AppResult<()>;
}
