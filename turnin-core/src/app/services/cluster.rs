// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::types::WorkerHost;

pub const DEFAULT_STATUS_COMMAND: &str = "rupt";
pub const DEFAULT_WORKER_MARKER: &str = "dl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus<'a> {
    pub hostname: &'a str,
    pub status: &'a str,
}

impl NodeStatus<'_> {
    pub fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Parses `<hostname> <status> ...` lines; lines with fewer than two tokens are skipped.
pub fn parse_status(output: &str) -> Vec<NodeStatus<'_>> {
    output
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let hostname = tokens.next()?;
            let status = tokens.next()?;
            Some(NodeStatus { hostname, status })
        })
        .collect()
}

/// First host, in report order, that is up and whose name contains `marker`.
pub fn select_worker(output: &str, marker: &str) -> Option<WorkerHost> {
    parse_status(output)
        .into_iter()
        .find(|node| node.is_up() && node.hostname.contains(marker))
        .map(|node| WorkerHost::new(node.hostname))
}
