// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error as ThisError;
use tokio::net::lookup_host;

#[derive(ThisError, Debug)]
pub enum ResolveError {
    #[error("unknown host {0}")]
    NotFound(String),

    #[error("couldn't resolve {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("no addresses resolved for {0}")]
    NoAddrs(String),

    #[error("resolving {host} timed out after {secs}s")]
    TimedOut { host: String, secs: u64 },
}

/// First address for `host:port`, bounded by `timeout`.
pub async fn resolve(host: &str, port: u16, timeout: Duration) -> Result<SocketAddr, ResolveError> {
    let addrs = tokio::time::timeout(timeout, lookup_host((host, port)))
        .await
        .map_err(|_| ResolveError::TimedOut {
            host: host.to_owned(),
            secs: timeout.as_secs(),
        })?
        .map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ResolveError::NotFound(host.to_owned()),
            _ => ResolveError::Lookup {
                host: host.to_owned(),
                source,
            },
        })?;

    let mut addrs: Vec<SocketAddr> = addrs.collect();
    // IPv4 first.
    addrs.sort_by_key(|addr| !addr.is_ipv4());
    addrs
        .into_iter()
        .next()
        .ok_or_else(|| ResolveError::NoAddrs(host.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_localhost_with_port() {
        let addr = resolve("localhost", 2222, Duration::from_secs(5))
            .await
            .expect("localhost should resolve");
        assert_eq!(addr.port(), 2222);
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn literal_addresses_need_no_dns() {
        let addr = resolve("127.0.0.1", 22, Duration::from_secs(1)).await.unwrap();
        assert_eq!(addr, "127.0.0.1:22".parse().unwrap());
    }
}
