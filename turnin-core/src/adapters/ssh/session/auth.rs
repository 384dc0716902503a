// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use russh::client::{AuthResult, Handle, KeyboardInteractiveAuthResponse};

use crate::adapters::ssh::error::AuthenticationFailure;
use crate::app::types::Credentials;

use super::ClientHandler;

const MAX_CHALLENGE_ROUNDS: usize = 4;

enum AuthDecision {
    Success,
    KeyboardInteractive,
    Failure,
}

fn auth_decision(result: AuthResult, keyboard_interactive_fallback: bool) -> AuthDecision {
    match result {
        AuthResult::Success => AuthDecision::Success,
        AuthResult::Failure {
            remaining_methods, ..
        } if keyboard_interactive_fallback
            && remaining_methods.contains(&russh::MethodKind::KeyboardInteractive) =>
        {
            AuthDecision::KeyboardInteractive
        }
        AuthResult::Failure { .. } => AuthDecision::Failure,
    }
}

/// Password first; on rejection, optionally retry as keyboard-interactive.
pub(super) async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    credentials: &Credentials,
    keyboard_interactive_fallback: bool,
) -> Result<()> {
    let result = handle
        .authenticate_password(credentials.username.clone(), credentials.secret())
        .await
        .context("password auth failed")?;
    match auth_decision(result, keyboard_interactive_fallback) {
        AuthDecision::Success => Ok(()),
        AuthDecision::KeyboardInteractive => {
            log::debug!("password rejected, retrying with keyboard-interactive");
            keyboard_interactive(handle, credentials).await
        }
        AuthDecision::Failure => Err(AuthenticationFailure.into()),
    }
}

/// Answers every challenge prompt with the secret.
async fn keyboard_interactive(
    handle: &mut Handle<ClientHandler>,
    credentials: &Credentials,
) -> Result<()> {
    let mut ki = handle
        .authenticate_keyboard_interactive_start(credentials.username.clone(), None::<String>)
        .await
        .context("KI start failed")?;

    for _ in 0..MAX_CHALLENGE_ROUNDS {
        match ki {
            KeyboardInteractiveAuthResponse::Success => return Ok(()),
            KeyboardInteractiveAuthResponse::Failure {
                remaining_methods,
                partial_success,
            } => {
                log::debug!(
                    "authentication failed (partial_success={}, remaining={:?})",
                    partial_success,
                    remaining_methods
                );
                return Err(AuthenticationFailure.into());
            }
            KeyboardInteractiveAuthResponse::InfoRequest { prompts, .. } => {
                let answers = challenge_answers(prompts.len(), credentials);
                ki = handle
                    .authenticate_keyboard_interactive_respond(answers)
                    .await
                    .context("KI respond failed")?;
            }
        }
    }
    log::debug!("giving up after {MAX_CHALLENGE_ROUNDS} keyboard-interactive rounds");
    Err(AuthenticationFailure.into())
}

fn challenge_answers(prompt_count: usize, credentials: &Credentials) -> Vec<String> {
    vec![credentials.secret().to_string(); prompt_count]
}
