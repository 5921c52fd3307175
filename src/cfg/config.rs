// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    cfg::enums::{Scheme, flag_is_set},
    proto::{messages, version::VersionPolicy},
};

/// Default Bolt server port.
pub const DEFAULT_PORT: u16 = 7687;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// `bolt[+routing]://` connection string. Credentials, timeout and TLS
    /// query flags parsed out of it take precedence over the fields below.
    pub uri: String,

    /// Authentication token; overridden by URL credentials when present.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Socket and protocol tuning.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// TLS material; only consulted when TLS is enabled.
    #[serde(default)]
    pub tls: TlsOptions,

    /// Pool sizing and refresh cadence.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Derived from `uri` by `validate_and_normalize`.
    #[serde(skip)]
    pub endpoint: Endpoint,
}

/// Where the first connection is dialed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            scheme: Scheme::Bolt,
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Endpoint {
    /// `host:port`, the key used for pool bookkeeping and topology diffs.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum AuthConfig {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        realm: Option<String>,
    },
    Kerberos {
        /// Base64-encoded service ticket.
        ticket: String,
    },
}

impl AuthConfig {
    /// The wire-shape token carried inside INIT / HELLO.
    pub fn to_token(
        &self,
    ) -> std::collections::HashMap<String, crate::codec::value::Value> {
        match self {
            AuthConfig::None => messages::auth_token_none(),
            AuthConfig::Basic {
                username,
                password,
                realm,
            } => messages::auth_token_basic_with_realm(
                username,
                password,
                realm.as_deref().unwrap_or(""),
            ),
            AuthConfig::Kerberos { ticket } => messages::auth_token_kerberos(ticket),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ConnectionConfig {
    /// Per-call read/write deadline, and the TCP dial timeout.
    #[serde(default = "default_timeout", with = "serde_secs")]
    pub timeout: Duration,

    /// Upper bound for outbound chunk payloads.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u16,

    /// How the handshake's four version slots are filled.
    #[serde(default)]
    pub version: VersionPolicy,

    /// Agent string reported during session initiation.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            chunk_size: default_chunk_size(),
            version: VersionPolicy::default(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    #[serde(default)]
    pub enabled: bool,

    /// PEM bundle of additional trust anchors; the webpki roots are used
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_file: Option<String>,

    /// Client certificate chain; requires `key_file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,

    /// Client private key; requires `cert_file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,

    /// Skip server certificate verification entirely.
    #[serde(default)]
    pub no_verify: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PoolConfig {
    /// Hard cap on live connections per pool. The routing pool splits this
    /// across its write and read halves.
    #[serde(default = "default_max_total")]
    pub max_total: usize,

    /// Idle connections kept beyond which returns are destroyed.
    #[serde(default = "default_max_total")]
    pub max_idle: usize,

    /// Idle connections the rebalance pass tops the pool back up to.
    #[serde(default)]
    pub min_idle: usize,

    /// How long a borrow waits on an exhausted pool before failing.
    #[serde(
        default,
        with = "serde_opt_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub borrow_timeout: Option<Duration>,

    /// Cadence of the routing pool's topology refresh.
    #[serde(default = "default_refresh_interval", with = "serde_secs")]
    pub refresh_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: default_max_total(),
            max_idle: default_max_total(),
            min_idle: 0,
            borrow_timeout: None,
            refresh_interval: default_refresh_interval(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_chunk_size() -> u16 {
    u16::MAX
}

fn default_user_agent() -> String {
    messages::CLIENT_ID.to_string()
}

fn default_max_total() -> usize {
    4
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(300)
}

impl Config {
    /// Builds a configuration from a connection string alone.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let mut cfg = Self {
            uri: uri.to_string(),
            auth: AuthConfig::default(),
            connection: ConnectionConfig::default(),
            tls: TlsOptions::default(),
            pool: PoolConfig::default(),
            endpoint: Endpoint::default(),
        };
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Parses the connection string, folds its credentials and query flags
    /// into the config, and checks cross-field invariants.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        let parsed = Url::parse(&self.uri)
            .with_context(|| format!("invalid connection string {:?}", self.uri))?;

        let scheme = Scheme::parse(parsed.scheme()).with_context(|| {
            format!(
                "unsupported connection string scheme {:?}; only 'bolt' and \
                 'bolt+routing' are supported",
                parsed.scheme()
            )
        })?;

        let host = parsed
            .host_str()
            .context("connection string is missing a host")?
            .to_string();
        let port = parsed.port().unwrap_or(DEFAULT_PORT);
        self.endpoint = Endpoint { scheme, host, port };

        if !parsed.username().is_empty() {
            let password = parsed
                .password()
                .context("must specify password when passing user")?;
            self.auth = AuthConfig::Basic {
                username: parsed.username().to_string(),
                password: password.to_string(),
                realm: None,
            };
        }

        for (key, raw) in parsed.query_pairs() {
            match key.as_ref() {
                "timeout" => {
                    let secs: u64 = raw.parse().with_context(|| {
                        format!("invalid format for timeout {raw:?}, must be integer")
                    })?;
                    self.connection.timeout = Duration::from_secs(secs);
                },
                "tls" => self.tls.enabled = flag_is_set(&raw),
                "tls_no_verify" => self.tls.no_verify = flag_is_set(&raw),
                "tls_cert_file" => self.tls.cert_file = Some(raw.into_owned()),
                "tls_key_file" => self.tls.key_file = Some(raw.into_owned()),
                "tls_ca_cert_file" => self.tls.ca_cert_file = Some(raw.into_owned()),
                _ => {},
            }
        }

        ensure!(self.connection.chunk_size >= 1, "chunk_size must be >= 1");
        ensure!(self.pool.max_total >= 1, "pool.max_total must be >= 1");
        if self.is_routing() {
            ensure!(
                self.pool.max_total >= 2,
                "a routing pool needs pool.max_total >= 2 to split reads and writes"
            );
        }

        if self.tls.cert_file.is_some() != self.tls.key_file.is_some() {
            bail!("tls cert_file and key_file must be provided together");
        }

        Ok(())
    }

    pub fn is_routing(&self) -> bool {
        self.endpoint.scheme.is_routing()
    }

    /// A copy of this config pointed at another cluster member. Accepts bare
    /// `host:port` pairs as well as full `bolt://host:port` addresses; the
    /// routing scheme never survives, since member connections are direct.
    pub fn with_address(&self, address: &str) -> Result<Self> {
        let trimmed = address
            .strip_prefix("bolt+routing://")
            .or_else(|| address.strip_prefix("bolt://"))
            .unwrap_or(address);

        let (host, port) = match trimmed.rsplit_once(':') {
            Some((host, port)) => {
                let port: u16 = port.parse().with_context(|| {
                    format!("invalid port in cluster address {address:?}")
                })?;
                (host.to_string(), port)
            },
            None => (trimmed.to_string(), DEFAULT_PORT),
        };
        ensure!(!host.is_empty(), "empty host in cluster address {address:?}");

        let mut cfg = self.clone();
        cfg.endpoint = Endpoint {
            scheme: Scheme::Bolt,
            host,
            port,
        };
        Ok(cfg)
    }
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Same as `serde_secs`, for optional durations.
mod serde_opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        d: &Option<Duration>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<u64>::deserialize(d)?;
        Ok(secs.map(Duration::from_secs))
    }
}
