// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod adapters;
pub mod app;

pub use app::errors::{AppError, AppErrorKind, AppResult};
pub use app::usecases::{GatewayConnection, SubmitRequest, SubmitSettings, Submitter};
