//! NTP reachability probing and the configuration baseline built from it.
//!
//! A probe is a single SNTP client request; a server counts as usable only
//! if a well-formed server reply comes back before the timeout. There are no
//! retries.

use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use log::{debug, info};
use tokio::net::UdpSocket;

use crate::error::ProbeError;

/// Size of an NTP packet without extensions.
pub const NTP_PACKET_LEN: usize = 48;

/// LI = 0, VN = 3, Mode = 3 (client).
const CLIENT_REQUEST_FLAGS: u8 = 0x1b;

const MODE_SERVER: u8 = 4;
const MODE_BROADCAST: u8 = 5;

/// Anything that can decide whether an NTP server is usable.
pub trait NtpProbe: Sync {
    /// True if `server` answered a time request.
    fn probe(&self, server: &str) -> impl Future<Output = bool> + Send;
}

/// SNTP client probe over UDP.
#[derive(Debug, Clone)]
pub struct NtpProber {
    port: u16,
    timeout: Duration,
}

impl NtpProber {
    /// Prober for the standard NTP port.
    pub fn new(timeout: Duration) -> Self {
        Self { port: 123, timeout }
    }

    /// Probe a port other than 123 for candidates given without one.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Probe one resolved address.
    pub async fn probe_addr(&self, addr: SocketAddr) -> Result<(), ProbeError> {
        self.within(exchange(addr)).await
    }

    /// Resolve a candidate written as `host` or `host:port`.
    async fn resolve(&self, server: &str) -> Result<SocketAddr, ProbeError> {
        if let Ok(addr) = server.parse::<SocketAddr>() {
            return Ok(addr);
        }

        let resolved = match server.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => {
                tokio::net::lookup_host(server)
                    .await
                    .map(|addrs| addrs.collect::<Vec<_>>().into_iter())
            }
            _ => tokio::net::lookup_host((server, self.port))
                .await
                .map(|addrs| addrs.collect::<Vec<_>>().into_iter()),
        };

        resolved?.next().ok_or_else(|| ProbeError::Resolve {
            server: server.to_string(),
        })
    }

    async fn check(&self, server: &str) -> Result<(), ProbeError> {
        self.within(async {
            let addr = self.resolve(server).await?;
            exchange(addr).await
        })
        .await
    }

    /// Run `attempt` under the probe deadline, resolution included.
    async fn within<F>(&self, attempt: F) -> Result<(), ProbeError>
    where
        F: Future<Output = Result<(), ProbeError>>,
    {
        tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
    }
}

impl NtpProbe for NtpProber {
    async fn probe(&self, server: &str) -> bool {
        match self.check(server).await {
            Ok(()) => {
                debug!("NTP server {} answered", server);
                true
            }
            Err(e) => {
                debug!("NTP server {} unusable: {}", server, e);
                false
            }
        }
    }
}

/// Client-mode request packet.
pub fn request_packet() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = CLIENT_REQUEST_FLAGS;
    packet
}

/// Check that a datagram is an NTP server reply.
pub fn validate_reply(reply: &[u8]) -> Result<(), ProbeError> {
    if reply.len() < NTP_PACKET_LEN {
        return Err(ProbeError::Truncated(reply.len()));
    }
    match reply[0] & 0x07 {
        MODE_SERVER | MODE_BROADCAST => Ok(()),
        mode => Err(ProbeError::UnexpectedMode(mode)),
    }
}

async fn exchange(addr: SocketAddr) -> Result<(), ProbeError> {
    let local: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(local).await?;
    // A connected socket only receives datagrams from the probed server
    socket.connect(addr).await?;
    socket.send(&request_packet()).await?;

    let mut buf = [0u8; 1024];
    let len = socket.recv(&mut buf).await?;
    validate_reply(&buf[..len])
}

/// Configuration lines pushed to every device in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBaseline {
    commands: Vec<String>,
}

impl ConfigBaseline {
    /// Probe every candidate, in order, and keep the ones that answered.
    pub async fn build<P: NtpProbe>(timezone: &str, candidates: &[String], prober: &P) -> Self {
        let mut commands = vec![timezone.to_string()];
        for candidate in candidates {
            if prober.probe(candidate).await {
                commands.push(format!("ntp server {candidate}"));
            }
        }

        info!(
            "NTP baseline: {} of {} candidates reachable",
            commands.len() - 1,
            candidates.len()
        );
        Self { commands }
    }

    /// Baseline from already-known lines.
    pub fn from_commands(commands: Vec<String>) -> Self {
        Self { commands }
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// NTP servers included in the baseline.
    pub fn ntp_servers(&self) -> impl Iterator<Item = &str> {
        self.commands
            .iter()
            .filter_map(|line| line.strip_prefix("ntp server "))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Instant;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    /// UDP server answering every request with `reply`.
    async fn fake_server(reply: Vec<u8>) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            while let Ok((_, peer)) = socket.recv_from(&mut buf).await {
                let _ = socket.send_to(&reply, peer).await;
            }
        });
        addr
    }

    fn server_reply() -> Vec<u8> {
        let mut reply = vec![0u8; NTP_PACKET_LEN];
        reply[0] = 0x24; // LI 0, VN 4, mode 4
        reply[1] = 2;
        reply
    }

    #[test]
    fn test_request_packet() {
        let packet = request_packet();
        assert_eq!(packet.len(), 48);
        assert_eq!(packet[0], 0x1b);
        assert!(packet[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_validate_reply() {
        assert_ok!(validate_reply(&server_reply()));
        assert!(matches!(
            validate_reply(&[0x24; 10]),
            Err(ProbeError::Truncated(10))
        ));
        assert!(matches!(
            validate_reply(&request_packet()),
            Err(ProbeError::UnexpectedMode(3))
        ));
    }

    #[tokio::test]
    async fn test_reachable_server() {
        let addr = fake_server(server_reply()).await;
        let prober = NtpProber::new(Duration::from_secs(1)).with_port(addr.port());

        assert_ok!(prober.probe_addr(addr).await);
        assert!(prober.probe("127.0.0.1").await);
        assert!(prober.probe(&addr.to_string()).await);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        // Bound but never answers, so no ICMP error either
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();
        let prober = NtpProber::new(Duration::from_millis(200));

        let start = Instant::now();
        assert!(!prober.probe(&addr.to_string()).await);
        assert!(start.elapsed() < Duration::from_secs(1));
        drop(silent);
    }

    #[tokio::test]
    async fn test_slow_lookup_shares_the_deadline() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();
        let prober = NtpProber::new(Duration::from_millis(200));

        let start = Instant::now();
        let result = prober
            .within(async {
                // Lookup eats most of the budget
                tokio::time::sleep(Duration::from_millis(150)).await;
                exchange(addr).await
            })
            .await;

        assert!(matches!(result, Err(ProbeError::Timeout(_))));
        assert!(start.elapsed() < Duration::from_millis(340), "took {:?}", start.elapsed());
        drop(silent);
    }

    #[tokio::test]
    async fn test_malformed_reply_rejected() {
        let addr = fake_server(vec![0x24; 12]).await;
        let prober = NtpProber::new(Duration::from_millis(500));
        assert_err!(prober.probe_addr(addr).await);
    }

    #[tokio::test]
    async fn test_unresolvable_candidate() {
        let prober = NtpProber::new(Duration::from_millis(500));
        assert!(!prober.probe("").await);
    }

    struct FixedProbe {
        reachable: HashSet<&'static str>,
    }

    impl NtpProbe for FixedProbe {
        async fn probe(&self, server: &str) -> bool {
            self.reachable.contains(server)
        }
    }

    #[tokio::test]
    async fn test_baseline_keeps_declared_order() {
        let candidates: Vec<String> = ["10.0.0.4", "10.0.0.1", "10.0.0.3", "10.0.0.2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let probe = FixedProbe {
            reachable: HashSet::from(["10.0.0.2", "10.0.0.4", "10.0.0.1"]),
        };

        let first = ConfigBaseline::build("clock timezone GMT 0 0", &candidates, &probe).await;
        let second = ConfigBaseline::build("clock timezone GMT 0 0", &candidates, &probe).await;

        assert_eq!(first, second);
        assert_eq!(
            first.commands(),
            &[
                "clock timezone GMT 0 0".to_string(),
                "ntp server 10.0.0.4".to_string(),
                "ntp server 10.0.0.1".to_string(),
                "ntp server 10.0.0.2".to_string(),
            ]
        );
        assert_eq!(
            first.ntp_servers().collect::<Vec<_>>(),
            vec!["10.0.0.4", "10.0.0.1", "10.0.0.2"]
        );
    }

    #[tokio::test]
    async fn test_baseline_without_reachable_servers() {
        let probe = FixedProbe {
            reachable: HashSet::new(),
        };
        let baseline =
            ConfigBaseline::build("clock timezone GMT 0 0", &["10.9.9.9".to_string()], &probe)
                .await;
        assert_eq!(baseline.commands(), &["clock timezone GMT 0 0".to_string()]);
    }
}
