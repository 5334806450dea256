//! Proxies: lightweight references to remote objects.
//!
//! A stringified proxy looks like one of
//!
//! ```text
//! identity [-t|-o|-O|-d|-D] [-f facet] [: endpoint [: endpoint ...]]
//! identity [-t|-o|-O|-d|-D] [-f facet] @ adapter-id
//! ```
//!
//! where `identity` is `[category/]name` and an endpoint is
//! `tcp|udp|ssl [-h host] [-p port] [-t timeout]`. A proxy with neither
//! endpoints nor an adapter id is "well-known" and must be resolved through a
//! locator.

use std::fmt;
use std::str::FromStr;

use crate::error::{IceError, Result};

/// Identity of a remote object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub category: String,
    pub name: String,
}

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            category: String::new(),
            name: name.into(),
        }
    }

    pub fn with_category(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }
}

impl FromStr for Identity {
    type Err = IceError;

    fn from_str(s: &str) -> Result<Self> {
        let err = |reason: &str| IceError::IdentityParse {
            identity: s.to_string(),
            reason: reason.to_string(),
        };

        let (category, name) = match s.split_once('/') {
            Some((category, name)) => (category, name),
            None => ("", s),
        };
        if name.is_empty() {
            return Err(err("name must not be empty"));
        }
        if name.contains('/') {
            return Err(err("more than one `/`"));
        }
        if s.chars().any(|c| c.is_whitespace() || c == ':' || c == '@') {
            return Err(err("contains a reserved character"));
        }
        Ok(Identity::with_category(category, name))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.category.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.category, self.name)
        }
    }
}

/// Endpoint transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
    Ssl,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
            Transport::Ssl => "ssl",
        }
    }
}

/// A single addressable endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub transport: Transport,
    pub host: Option<String>,
    /// `0` lets the server pick a port.
    pub port: u16,
    /// Timeout in milliseconds, if any.
    pub timeout: Option<u32>,
}

impl Endpoint {
    /// Parse a `:`-separated endpoint list. An empty string yields no endpoints.
    pub fn parse_list(s: &str) -> Result<Vec<Endpoint>> {
        if s.trim().is_empty() {
            return Ok(Vec::new());
        }
        s.split(':').map(str::parse).collect()
    }
}

impl FromStr for Endpoint {
    type Err = IceError;

    fn from_str(s: &str) -> Result<Self> {
        let mut tokens = s.split_whitespace();
        let transport = match tokens.next() {
            Some("tcp") => Transport::Tcp,
            Some("udp") => Transport::Udp,
            Some("ssl") => Transport::Ssl,
            Some(other) => {
                return Err(IceError::endpoint_parse(s, format!("unknown transport `{}`", other)))
            }
            None => return Err(IceError::endpoint_parse(s, "empty endpoint")),
        };

        let mut endpoint = Endpoint {
            transport,
            host: None,
            port: 0,
            timeout: None,
        };

        while let Some(option) = tokens.next() {
            let value = tokens
                .next()
                .ok_or_else(|| IceError::endpoint_parse(s, format!("no argument for `{}`", option)))?;
            match option {
                "-h" => endpoint.host = Some(value.to_string()),
                "-p" => {
                    endpoint.port = value
                        .parse()
                        .map_err(|_| IceError::endpoint_parse(s, format!("invalid port `{}`", value)))?
                }
                "-t" => {
                    endpoint.timeout = Some(value.parse().map_err(|_| {
                        IceError::endpoint_parse(s, format!("invalid timeout `{}`", value))
                    })?)
                }
                _ => {
                    return Err(IceError::endpoint_parse(s, format!("unknown option `{}`", option)))
                }
            }
        }

        Ok(endpoint)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.transport.as_str())?;
        if let Some(host) = &self.host {
            write!(f, " -h {}", host)?;
        }
        write!(f, " -p {}", self.port)?;
        if let Some(timeout) = self.timeout {
            write!(f, " -t {}", timeout)?;
        }
        Ok(())
    }
}

/// Invocation mode carried by a proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProxyMode {
    #[default]
    Twoway,
    Oneway,
    BatchOneway,
    Datagram,
    BatchDatagram,
}

impl ProxyMode {
    fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "-t" => Some(ProxyMode::Twoway),
            "-o" => Some(ProxyMode::Oneway),
            "-O" => Some(ProxyMode::BatchOneway),
            "-d" => Some(ProxyMode::Datagram),
            "-D" => Some(ProxyMode::BatchDatagram),
            _ => None,
        }
    }

    fn flag(&self) -> &'static str {
        match self {
            ProxyMode::Twoway => "-t",
            ProxyMode::Oneway => "-o",
            ProxyMode::BatchOneway => "-O",
            ProxyMode::Datagram => "-d",
            ProxyMode::BatchDatagram => "-D",
        }
    }
}

/// Reference to a remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPrx {
    identity: Identity,
    facet: String,
    mode: ProxyMode,
    endpoints: Vec<Endpoint>,
    adapter_id: String,
}

impl ObjectPrx {
    /// Well-known proxy with no addressing information.
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            facet: String::new(),
            mode: ProxyMode::Twoway,
            endpoints: Vec::new(),
            adapter_id: String::new(),
        }
    }

    /// Direct proxy addressed by endpoints.
    pub fn direct(identity: Identity, endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints,
            ..Self::new(identity)
        }
    }

    /// Indirect proxy resolved through a locator by adapter id.
    pub fn indirect(identity: Identity, adapter_id: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            ..Self::new(identity)
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn facet(&self) -> &str {
        &self.facet
    }

    pub fn mode(&self) -> ProxyMode {
        self.mode
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn adapter_id(&self) -> &str {
        &self.adapter_id
    }

    pub fn is_indirect(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn with_facet(mut self, facet: impl Into<String>) -> Self {
        self.facet = facet.into();
        self
    }

    pub fn with_mode(mut self, mode: ProxyMode) -> Self {
        self.mode = mode;
        self
    }
}

impl FromStr for ObjectPrx {
    type Err = IceError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s.find([':', '@']);
        let (head, tail) = match split {
            Some(pos) => (&s[..pos], Some((&s[pos..pos + 1], &s[pos + 1..]))),
            None => (s, None),
        };

        let mut tokens = head.split_whitespace();
        let identity: Identity = tokens
            .next()
            .ok_or_else(|| IceError::proxy_parse(s, "missing identity"))?
            .parse::<Identity>()
            .map_err(|e| IceError::proxy_parse(s, e.to_string()))?;

        let mut proxy = ObjectPrx::new(identity);
        while let Some(option) = tokens.next() {
            if let Some(mode) = ProxyMode::from_flag(option) {
                proxy.mode = mode;
                continue;
            }
            match option {
                "-f" => {
                    proxy.facet = tokens
                        .next()
                        .ok_or_else(|| IceError::proxy_parse(s, "no argument for `-f`"))?
                        .to_string();
                }
                _ => return Err(IceError::proxy_parse(s, format!("unknown option `{}`", option))),
            }
        }

        match tail {
            None => {}
            Some(("@", adapter_id)) => {
                let adapter_id = adapter_id.trim();
                if adapter_id.is_empty() {
                    return Err(IceError::proxy_parse(s, "empty adapter id"));
                }
                proxy.adapter_id = adapter_id.to_string();
            }
            Some((_, endpoints)) => {
                proxy.endpoints = Endpoint::parse_list(endpoints)?;
                if proxy.endpoints.is_empty() {
                    return Err(IceError::proxy_parse(s, "empty endpoint list"));
                }
            }
        }

        Ok(proxy)
    }
}

impl fmt::Display for ObjectPrx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity)?;
        if !self.facet.is_empty() {
            write!(f, " -f {}", self.facet)?;
        }
        write!(f, " {}", self.mode.flag())?;
        if !self.adapter_id.is_empty() {
            write!(f, " @ {}", self.adapter_id)?;
        }
        for endpoint in &self.endpoints {
            write!(f, ":{}", endpoint)?;
        }
        Ok(())
    }
}

/// Proxy to a router. Produced by an unchecked cast; the runtime never
/// verifies that the target actually implements the router interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouterPrx(ObjectPrx);

impl RouterPrx {
    pub fn unchecked_cast(proxy: ObjectPrx) -> Self {
        Self(proxy)
    }

    pub fn as_object(&self) -> &ObjectPrx {
        &self.0
    }
}

impl fmt::Display for RouterPrx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Proxy to a locator, obtained by unchecked cast.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocatorPrx(ObjectPrx);

impl LocatorPrx {
    pub fn unchecked_cast(proxy: ObjectPrx) -> Self {
        Self(proxy)
    }

    pub fn as_object(&self) -> &ObjectPrx {
        &self.0
    }
}

impl fmt::Display for LocatorPrx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
