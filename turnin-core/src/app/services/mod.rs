// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod classify;
pub mod cluster;
pub mod host_keys;
pub mod progress;
pub mod shell;
pub mod upload;
pub mod validation;
