// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod known_hosts;
pub mod network;
pub mod ssh;
