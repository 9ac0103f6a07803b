//! Listen address parsing.
//!
//! # Responsibilities
//! - Parse address strings such as `http://localhost:3000`
//! - Reject anything that is not `http` or `https`
//! - Translate a set of addresses into the port/host lists a transport
//!   listens on
//!
//! # Design Decisions
//! - An unsupported scheme fails the whole set; there is no partial plan
//! - A missing port takes the scheme default (80/443)
//! - Ports and hosts keep first-seen order and are deduplicated
//! - Only http addresses contribute bind hosts; https hosts are used only
//!   when no http address names one

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};

/// Errors produced while parsing listen addresses.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("invalid listen address '{address}'")]
    Invalid {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme '{scheme}' in listen address '{address}'")]
    UnsupportedScheme { address: String, scheme: String },

    #[error("listen address '{0}' has no host")]
    MissingHost(String),
}

/// Listener scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed listen address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddress {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl FromStr for ListenAddress {
    type Err = AddressError;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(address).map_err(|source| AddressError::Invalid {
            address: address.to_string(),
            source,
        })?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(AddressError::UnsupportedScheme {
                    address: address.to_string(),
                    scheme: other.to_string(),
                })
            }
        };

        // Ipv6 hosts are stored without brackets so they can be bound directly.
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(AddressError::MissingHost(address.to_string())),
        };

        Ok(Self {
            scheme,
            host,
            port: url.port().unwrap_or_else(|| scheme.default_port()),
        })
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

/// Ports and hosts a transport should listen on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenPlan {
    pub http_ports: Vec<u16>,
    pub https_ports: Vec<u16>,
    /// Hosts named by http addresses; every port binds on these.
    pub hosts: Vec<String>,
    /// Hosts named by https addresses; bound only when `hosts` is empty.
    pub https_hosts: Vec<String>,
}

impl ListenPlan {
    /// Parse every address; the first failure aborts the whole plan.
    pub fn from_addresses<S: AsRef<str>>(addresses: &[S]) -> Result<Self, AddressError> {
        let parsed = addresses
            .iter()
            .map(|address| address.as_ref().parse::<ListenAddress>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut plan = Self::default();
        for address in parsed {
            match address.scheme {
                Scheme::Http => {
                    push_unique(&mut plan.http_ports, address.port);
                    push_unique(&mut plan.hosts, address.host);
                }
                Scheme::Https => {
                    push_unique(&mut plan.https_ports, address.port);
                    push_unique(&mut plan.https_hosts, address.host);
                }
            }
        }
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.http_ports.is_empty() && self.https_ports.is_empty()
    }

    /// Hosts the https ports bind on.
    pub fn tls_hosts(&self) -> &[String] {
        if self.hosts.is_empty() {
            &self.https_hosts
        } else {
            &self.hosts
        }
    }

    /// Every `(scheme, host, port)` combination to bind.
    pub fn endpoints(&self) -> impl Iterator<Item = ListenAddress> + '_ {
        let http = self.http_ports.iter().map(move |port| (Scheme::Http, *port, self.hosts.as_slice()));
        let https = self.https_ports.iter().map(move |port| (Scheme::Https, *port, self.tls_hosts()));
        http.chain(https).flat_map(|(scheme, port, hosts)| {
            hosts.iter().map(move |host| ListenAddress {
                scheme,
                host: host.clone(),
                port,
            })
        })
    }
}

impl fmt::Display for ListenPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "http={:?} https={:?} hosts={:?}",
            self.http_ports, self.https_ports, self.hosts
        )
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}
