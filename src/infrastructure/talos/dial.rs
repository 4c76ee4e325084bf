// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::tls::{build_connector, configure, TlsMode};
use crate::infrastructure::constants::{
    DEFAULT_APID_PORT, DEFAULT_DIAL_TIMEOUT_SECS, DEFAULT_READY_DEADLINE_SECS,
    DEFAULT_RETRY_INTERVAL_SECS,
};
use crate::shared::error::{ProvisionError, Result};
use backon::{BackoffBuilder, ConstantBuilder};
use hyper_util::rt::TokioIo;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_openssl::SslStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint, Uri};
use tracing::{debug, info};

/// Timing for reaching a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialOptions {
    /// Bound on a single TCP connect plus TLS handshake.
    pub dial_timeout: Duration,
    /// Fixed wait between attempts.
    pub retry_interval: Duration,
    /// Bound on all attempts together.
    pub deadline: Duration,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(DEFAULT_DIAL_TIMEOUT_SECS),
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            deadline: Duration::from_secs(DEFAULT_READY_DEADLINE_SECS),
        }
    }
}

/// A node address split into host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    /// Accepts `host`, `host:port`, `[v6]`, `[v6]:port` and bare IPv6 literals.
    /// The apid port is used when none is given.
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ProvisionError::validation("node address is empty"));
        }

        let (host, port) = if let Some(rest) = address.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                ProvisionError::validation(format!("unterminated IPv6 literal in '{}'", address))
            })?;
            let port = match tail.strip_prefix(':') {
                Some(p) => Some(p),
                None if tail.is_empty() => None,
                None => {
                    return Err(ProvisionError::validation(format!(
                        "unexpected characters after IPv6 literal in '{}'",
                        address
                    )))
                }
            };
            (host, port)
        } else if address.matches(':').count() > 1 {
            (address, None)
        } else {
            match address.split_once(':') {
                Some((h, p)) => (h, Some(p)),
                None => (address, None),
            }
        };

        if host.is_empty() {
            return Err(ProvisionError::validation(format!(
                "node address '{}' has no host",
                address
            )));
        }
        let port = match port {
            Some(p) => p.parse::<u16>().map_err(|_| {
                ProvisionError::validation(format!("invalid port in node address '{}'", address))
            })?,
            None => DEFAULT_APID_PORT,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.authority())
    }
}

/// Flatten an error and its sources into one line.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// One attempt: TCP connect, TLS handshake and HTTP/2 setup, bounded by `timeout`.
pub async fn dial(
    address: &NodeAddress,
    tls: &TlsMode,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Channel> {
    let connector = build_connector(tls)?;
    let endpoint = Endpoint::from_shared(format!("http://{}", address.authority()))
        .map_err(|e| ProvisionError::validation(format!("invalid node address {}: {}", address, e)))?;

    let mode = tls.clone();
    let host = address.host.clone();
    let service = tower::service_fn(move |uri: Uri| {
        let connector = connector.clone();
        let mode = mode.clone();
        let host = host.clone();
        async move {
            let authority = uri
                .authority()
                .map(|a| a.as_str().to_string())
                .ok_or_else(|| std::io::Error::other(format!("no authority in {}", uri)))?;
            let tcp = TcpStream::connect(authority.as_str()).await?;
            tcp.set_nodelay(true)?;

            let ssl = configure(&connector, &mode, &host).map_err(std::io::Error::other)?;
            let mut stream = SslStream::new(ssl, tcp).map_err(std::io::Error::other)?;
            Pin::new(&mut stream)
                .connect()
                .await
                .map_err(std::io::Error::other)?;
            Ok::<_, std::io::Error>(TokioIo::new(stream))
        }
    });

    let attempt = tokio::time::timeout(timeout, endpoint.connect_with_connector(service));
    tokio::select! {
        _ = cancel.cancelled() => Err(ProvisionError::Cancelled(format!("dial {}", address))),
        res = attempt => match res {
            Err(_) => Err(ProvisionError::connectivity(
                address.to_string(),
                format!("{} handshake timed out after {:?}", tls.as_str(), timeout),
            )),
            Ok(Err(e)) => Err(ProvisionError::connectivity(address.to_string(), error_chain(&e))),
            Ok(Ok(channel)) => Ok(channel),
        },
    }
}

/// Dial on a fixed interval until success, a non-retryable error or the deadline.
pub async fn dial_with_retry(
    address: &NodeAddress,
    tls: &TlsMode,
    options: &DialOptions,
    cancel: &CancellationToken,
) -> Result<Channel> {
    let deadline = Instant::now() + options.deadline;
    let interval_ms = options.retry_interval.as_millis().max(1);
    let max_times = (options.deadline.as_millis() / interval_ms) as usize + 1;
    let mut backoff = ConstantBuilder::default()
        .with_delay(options.retry_interval)
        .with_max_times(max_times)
        .build();

    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ProvisionError::connectivity(
                address.to_string(),
                format!("not reachable within {:?}", options.deadline),
            ));
        }

        let err = match dial(address, tls, options.dial_timeout.min(remaining), cancel).await {
            Ok(channel) => {
                info!(
                    "Connected to {} ({}) after {} attempt(s)",
                    address,
                    tls.as_str(),
                    attempt
                );
                return Ok(channel);
            }
            Err(e) if e.is_retryable() => e,
            Err(e) => return Err(e),
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let delay = match backoff.next() {
            Some(delay) if !remaining.is_zero() => delay.min(remaining),
            _ => {
                return Err(ProvisionError::connectivity(
                    address.to_string(),
                    format!("not reachable within {:?}: {}", options.deadline, err),
                ))
            }
        };
        debug!("Attempt {} to {} failed: {}; retrying in {:?}", attempt, address, err, delay);

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(ProvisionError::Cancelled(format!("dial {}", address)));
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_addresses() {
        assert_eq!(
            NodeAddress::parse("10.0.0.10").unwrap(),
            NodeAddress {
                host: "10.0.0.10".to_string(),
                port: DEFAULT_APID_PORT
            }
        );
        assert_eq!(NodeAddress::parse("cp-1.lan:50001").unwrap().port, 50001);
        assert_eq!(NodeAddress::parse("fd00::10").unwrap().host, "fd00::10");
        let v6 = NodeAddress::parse("[fd00::10]:50000").unwrap();
        assert_eq!(v6.host, "fd00::10");
        assert_eq!(v6.authority(), "[fd00::10]:50000");
        assert_eq!(NodeAddress::parse("[fd00::10]").unwrap().port, DEFAULT_APID_PORT);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(NodeAddress::parse("").is_err());
        assert!(NodeAddress::parse(":50000").is_err());
        assert!(NodeAddress::parse("10.0.0.10:http").is_err());
        assert!(NodeAddress::parse("[fd00::10").is_err());
        assert!(NodeAddress::parse("[fd00::10]x").is_err());
    }

    #[tokio::test]
    async fn test_refused_connection_is_connectivity_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let address = NodeAddress::parse(&format!("127.0.0.1:{}", port)).unwrap();
        let err = dial(
            &address,
            &TlsMode::Insecure,
            Duration::from_secs(2),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn test_cancelled_dial() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = NodeAddress::parse(&listener.local_addr().unwrap().to_string()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let options = DialOptions {
            dial_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(100),
            deadline: Duration::from_secs(30),
        };
        let err = dial_with_retry(&address, &TlsMode::Insecure, &options, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Cancelled(_)));
    }
}
