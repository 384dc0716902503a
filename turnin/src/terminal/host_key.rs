// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use turnin_core::app::errors::{AppError, AppErrorKind, AppResult, codes};
use turnin_core::app::ports::{HostKeyPromptPort, HostKeyResponse};
use turnin_core::app::types::PresentedHostKey;

use super::prompt::{has_tty, prompt_line};

/// Asks on the controlling terminal whether to trust an unknown host key.
pub struct TerminalHostKeyPrompt;

fn describe(presented: &PresentedHostKey) -> String {
    format!(
        "The authenticity of host '{}' can't be established.\n\
         {} key fingerprint is {}\n\
         ({})\n",
        presented.key.hostname,
        presented.key.key_type,
        presented.sha256_fingerprint,
        presented.md5_fingerprint,
    )
}

fn parse_answer(input: &str) -> Option<HostKeyResponse> {
    match input.trim().to_ascii_lowercase().as_str() {
        "a" | "accept" | "y" | "yes" => Some(HostKeyResponse::AcceptAndPersist),
        "r" | "reject" | "n" | "no" => Some(HostKeyResponse::Reject),
        "p" | "pinned" => Some(HostKeyResponse::PinnedOnly),
        _ => None,
    }
}

fn ask_blocking(description: &str) -> anyhow::Result<HostKeyResponse> {
    eprint!("{description}");
    loop {
        let answer = match prompt_line(
            "Trust this host? [a]ccept and save, [r]eject, [p]inned keys only: ",
            "a/r/p",
        ) {
            Ok(answer) => answer,
            Err(err) => {
                log::debug!("host key prompt ended: {err}");
                return Ok(HostKeyResponse::Reject);
            }
        };
        if let Some(response) = parse_answer(&answer) {
            return Ok(response);
        }
        eprintln!("Please answer 'a', 'r' or 'p'.");
    }
}

#[async_trait]
impl HostKeyPromptPort for TerminalHostKeyPrompt {
    async fn ask(&self, presented: &PresentedHostKey) -> AppResult<Option<HostKeyResponse>> {
        if !has_tty() {
            return Ok(None);
        }
        let description = describe(presented);
        let response = tokio::task::spawn_blocking(move || ask_blocking(&description))
            .await
            .map_err(|err| {
                AppError::with_message(
                    AppErrorKind::Internal,
                    codes::INTERNAL_ERROR,
                    format!("host key prompt task failed: {err}"),
                )
            })?
            .map_err(|err| {
                AppError::with_message(AppErrorKind::Local, codes::LOCAL_ERROR, err.to_string())
            })?;
        Ok(Some(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnin_core::app::services::host_keys::present;
    use turnin_core::app::types::TrustedHostKey;

    #[test]
    fn answers_map_to_responses() {
        assert_eq!(parse_answer("a"), Some(HostKeyResponse::AcceptAndPersist));
        assert_eq!(parse_answer(" Yes "), Some(HostKeyResponse::AcceptAndPersist));
        assert_eq!(parse_answer("R"), Some(HostKeyResponse::Reject));
        assert_eq!(parse_answer("p"), Some(HostKeyResponse::PinnedOnly));
        assert_eq!(parse_answer(""), None);
        assert_eq!(parse_answer("maybe"), None);
    }

    #[test]
    fn description_names_host_and_fingerprints() {
        let presented = present(TrustedHostKey::new(
            "scylla.cs.uoi.gr",
            "ssh-ed25519",
            "AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl",
        ))
        .unwrap();
        let text = describe(&presented);
        assert!(text.contains("'scylla.cs.uoi.gr'"));
        assert!(text.contains("ssh-ed25519 key fingerprint is SHA256:"));
        assert!(text.contains("(MD5:"));
    }
}
