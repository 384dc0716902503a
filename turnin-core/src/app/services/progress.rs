// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::app::ports::ProgressPort;

/// Forwards progress to an optional sink, swallowing its errors and panics.
#[derive(Clone, Copy)]
pub struct Progress<'a> {
    sink: Option<&'a dyn ProgressPort>,
}

impl<'a> Progress<'a> {
    pub fn new(sink: Option<&'a dyn ProgressPort>) -> Self {
        Self { sink }
    }

    pub fn silent() -> Self {
        Self { sink: None }
    }

    pub fn report(&self, percent: u8, message: &str) {
        let Some(sink) = self.sink else {
            return;
        };
        let percent = percent.min(100);
        match catch_unwind(AssertUnwindSafe(|| sink.report(percent, message))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::debug!(percent, "progress sink failed: {err}"),
            Err(_) => tracing::warn!(percent, "progress sink panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<(u8, String)>>);

    impl ProgressPort for Recording {
        fn report(&self, percent: u8, message: &str) -> AppResult<()> {
            self.0.lock().unwrap().push((percent, message.to_string()));
            Ok(())
        }
    }

    struct Failing;

    impl ProgressPort for Failing {
        fn report(&self, _percent: u8, _message: &str) -> AppResult<()> {
            Err(AppError::new(AppErrorKind::Internal, codes::INTERNAL_ERROR))
        }
    }

    struct Panicking;

    impl ProgressPort for Panicking {
        fn report(&self, _percent: u8, _message: &str) -> AppResult<()> {
            panic!("sink exploded");
        }
    }

    #[test]
    fn clamps_percent_to_100() {
        let sink = Recording(Mutex::new(Vec::new()));
        Progress::new(Some(&sink)).report(250, "done");
        assert_eq!(sink.0.lock().unwrap()[0], (100, "done".to_string()));
    }

    #[test]
    fn sink_errors_and_panics_are_swallowed() {
        Progress::new(Some(&Failing)).report(10, "a");
        Progress::new(Some(&Panicking)).report(10, "b");
        Progress::silent().report(10, "c");
    }
}
