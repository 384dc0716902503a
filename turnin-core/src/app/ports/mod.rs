// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod host_keys;
pub mod progress;
pub mod remote;

pub use host_keys::{HostKeyPromptPort, HostKeyResponse, HostKeyVerifier, KnownHostsStorePort};
pub use progress::{NoopProgress, ProgressPort};
pub use remote::{GatewayConnectPort, GatewaySessionPort, StagingPort, WorkerSessionPort};
