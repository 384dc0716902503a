// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

/// What the remote `turnin` run told us, judged from its text output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurninResult {
    AlreadySubmitted,
    UnknownAssignment,
    PermissionDenied,
    QuotaExceeded,
    MissingFile,
    ConnectionProblem,
    UnrecognizedError,
    Submitted,
}

const SUCCESS_PHRASES: &[&str] = &[
    "submitted successfully",
    "submission successful",
    "turned in",
    "assignment submitted",
];

impl TurninResult {
    pub fn is_success(self) -> bool {
        matches!(self, TurninResult::Submitted)
    }

    pub fn message(self) -> &'static str {
        match self {
            TurninResult::AlreadySubmitted => {
                "You have already submitted this assignment. Multiple submissions are not allowed."
            }
            TurninResult::UnknownAssignment => {
                "Assignment not found. Please check the assignment name and try again."
            }
            TurninResult::PermissionDenied => {
                "Permission denied. Please check your credentials and try again."
            }
            TurninResult::QuotaExceeded => {
                "Storage quota exceeded. Please contact your instructor or system administrator."
            }
            TurninResult::MissingFile => {
                "Some files could not be found on the server. Please try uploading again."
            }
            TurninResult::ConnectionProblem => {
                "Connection error occurred. Please check your network connection and try again."
            }
            TurninResult::UnrecognizedError => {
                "An error occurred during submission. Please check the details below."
            }
            TurninResult::Submitted => "Assignment submitted successfully!",
        }
    }
}

/// First matching rule wins; matching is case-insensitive over stdout and stderr.
pub fn classify(stdout: &str, stderr: &str) -> TurninResult {
    let text = format!("{stdout}\n{stderr}").to_lowercase();
    let has = |needle: &str| text.contains(needle);

    if has("already turned in") {
        TurninResult::AlreadySubmitted
    } else if has("no such assignment") || has("assignment not found") {
        TurninResult::UnknownAssignment
    } else if has("permission denied") {
        TurninResult::PermissionDenied
    } else if has("disk quota exceeded") || has("no space left") {
        TurninResult::QuotaExceeded
    } else if has("file not found") {
        TurninResult::MissingFile
    } else if has("connection") && (has("timeout") || has("refused") || has("failed")) {
        TurninResult::ConnectionProblem
    } else if !stderr.trim().is_empty() {
        TurninResult::UnrecognizedError
    } else if SUCCESS_PHRASES.iter().any(|phrase| has(phrase)) {
        TurninResult::Submitted
    } else {
        tracing::debug!("no success phrase in turnin output; clean stderr counts as success");
        TurninResult::Submitted
    }
}

/// Remote stdout followed by stderr, as shown under "Technical details".
pub fn combined_output(stdout: &str, stderr: &str) -> String {
    let stdout = stdout.trim_end();
    let stderr = stderr.trim_end();
    match (stdout.is_empty(), stderr.is_empty()) {
        (true, true) => String::new(),
        (false, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}
