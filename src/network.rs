//! Peer registry: the set of nodes consulted during conflict resolution.
//!
//! Peers are stored by network location only (`host[:port]`), so
//! `http://10.0.0.2:5000/`, `10.0.0.2:5000` and `https://10.0.0.2:5000/chain`
//! all name the same peer.

use crate::error::ChainError;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::info;

/// A normalised peer location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Node {
    pub host: String,
    pub port: Option<u16>,
}

impl Node {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host: host.to_ascii_lowercase(),
            port: Some(port),
        }
    }

    /// Extract the authority from a URL or bare `host[:port]`.
    ///
    /// Scheme, user info, path, query and fragment are discarded.
    pub fn parse(address: &str) -> Result<Self, ChainError> {
        let trimmed = address.trim();
        let rest = match trimmed.find("://") {
            Some(pos) => &trimmed[pos + 3..],
            None => trimmed.strip_prefix("//").unwrap_or(trimmed),
        };
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let host_port = match authority.rfind('@') {
            Some(pos) => &authority[pos + 1..],
            None => authority,
        };

        let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
            let end = bracketed.find(']').ok_or_else(|| {
                ChainError::MalformedInput(format!("Unterminated IPv6 address in '{}'", address))
            })?;
            let host = &host_port[..end + 2];
            let port = bracketed[end + 1..].strip_prefix(':');
            (host, port)
        } else {
            match host_port.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (host_port, None),
            }
        };

        if host.is_empty() {
            return Err(ChainError::MalformedInput(format!(
                "No host found in node address '{}'",
                address
            )));
        }
        let port = match port {
            Some(p) => Some(p.parse::<u16>().map_err(|_| {
                ChainError::MalformedInput(format!("Invalid port '{}' in '{}'", p, address))
            })?),
            None => None,
        };

        Ok(Self {
            host: host.to_ascii_lowercase(),
            port,
        })
    }

    /// The `host[:port]` form used as the registry key and in peer URLs.
    pub fn addr(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.addr())
    }
}

/// Known peers, deduplicated by normalised location.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: RwLock<BTreeSet<String>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalise and insert `address`, returning the stored key.
    /// Registering the same location twice is a no-op.
    pub fn register(&self, address: &str) -> Result<String, ChainError> {
        let node = Node::parse(address)?;
        let key = node.addr();
        if self.peers.write().insert(key.clone()) {
            info!(peer = %key, "registered peer");
        }
        Ok(key)
    }

    /// Snapshot of the current membership.
    pub fn all(&self) -> BTreeSet<String> {
        self.peers.read().clone()
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.peers.read().contains(addr)
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}
