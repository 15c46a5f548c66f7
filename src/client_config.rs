use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use getset::{CopyGetters, Getters};
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";
pub const CLIENT_ID: &str = "client.id";
pub const SECURITY_PROTOCOL: &str = "security.protocol";
pub const SSL_CA_LOCATION: &str = "ssl.ca.location";
pub const SSL_CA_PEM: &str = "ssl.ca.pem";
pub const SSL_VERIFY: &str = "enable.ssl.certificate.verification";
pub const SASL_MECHANISM: &str = "sasl.mechanism";
pub const SASL_USERNAME: &str = "sasl.username";
pub const SASL_PASSWORD: &str = "sasl.password";
pub const SOCKET_TIMEOUT_MS: &str = "socket.timeout.ms";
pub const OPERATION_TIMEOUT_MS: &str = "admin.operation.timeout.ms";
pub const DEBUG: &str = "debug";

const DEFAULT_CLIENT_ID: &str = "topicadmin";
const DEFAULT_TIMEOUT_MS: i64 = 60_000;

/// A single raw option value, as found in a YAML file or built in code.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(v) => write!(f, "{v}"),
            ConfigValue::Int(v) => write!(f, "{v}"),
            ConfigValue::String(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum SecurityProtocol {
    #[default]
    Plaintext,
    Ssl,
    SaslPlaintext,
    SaslSsl,
}

impl SecurityProtocol {
    pub fn uses_sasl(&self) -> bool {
        matches!(self, Self::SaslPlaintext | Self::SaslSsl)
    }
}

impl FromStr for SecurityProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plaintext" => Ok(Self::Plaintext),
            "ssl" => Ok(Self::Ssl),
            "sasl_plaintext" => Ok(Self::SaslPlaintext),
            "sasl_ssl" => Ok(Self::SaslSsl),
            other => Err(format!("unsupported security protocol {other:?}")),
        }
    }
}

impl fmt::Display for SecurityProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plaintext => "plaintext",
            Self::Ssl => "ssl",
            Self::SaslPlaintext => "sasl_plaintext",
            Self::SaslSsl => "sasl_ssl",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CaSource {
    #[default]
    System,
    Location(String),
    Pem(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaslSettings {
    pub mechanism: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Validated, immutable admin client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Getters, CopyGetters)]
pub struct AdminConfig {
    #[getset(get = "pub")]
    bootstrap_servers: Vec<String>,

    #[getset(get = "pub")]
    client_id: String,

    #[getset(get_copy = "pub")]
    security_protocol: SecurityProtocol,

    #[getset(get = "pub")]
    ca: CaSource,

    #[getset(get_copy = "pub")]
    verify_certificates: Option<bool>,

    #[getset(get = "pub")]
    sasl: SaslSettings,

    #[getset(get_copy = "pub")]
    socket_timeout: Duration,

    /// Batch deadline applied when a call supplies no timeout of its own.
    #[getset(get_copy = "pub")]
    operation_timeout: Duration,

    #[getset(get = "pub")]
    debug: Option<String>,
}

impl AdminConfig {
    /// Validate a raw option map. Every key must be recognised and carry the
    /// expected value type.
    pub fn resolve(raw: &BTreeMap<String, ConfigValue>) -> Result<Self, ConfigError> {
        let reader = OptionReader { raw };
        reader.reject_unknown()?;

        let servers = reader
            .string(BOOTSTRAP_SERVERS)?
            .ok_or(ConfigError::MissingKey(BOOTSTRAP_SERVERS))?;
        let bootstrap_servers = parse_brokers(servers)?;

        let client_id = reader
            .string(CLIENT_ID)?
            .map(str::to_owned)
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_owned());
        if client_id.trim().is_empty() {
            return Err(invalid(CLIENT_ID, "must not be empty"));
        }

        let security_protocol = match reader.string(SECURITY_PROTOCOL)? {
            Some(value) => value
                .parse()
                .map_err(|reason| invalid(SECURITY_PROTOCOL, reason))?,
            None => SecurityProtocol::default(),
        };

        let ca = match (
            reader.string(SSL_CA_LOCATION)?,
            reader.string(SSL_CA_PEM)?,
        ) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::MutuallyExclusive(SSL_CA_LOCATION, SSL_CA_PEM));
            }
            (Some(location), None) => CaSource::Location(location.to_owned()),
            (None, Some(pem)) => CaSource::Pem(pem.to_owned()),
            (None, None) => CaSource::System,
        };

        let sasl = SaslSettings {
            mechanism: reader.string(SASL_MECHANISM)?.map(str::to_owned),
            username: reader.string(SASL_USERNAME)?.map(str::to_owned),
            password: reader.string(SASL_PASSWORD)?.map(str::to_owned),
        };
        if !security_protocol.uses_sasl() && sasl.mechanism.is_some() {
            return Err(invalid(
                SASL_MECHANISM,
                format!("requires a sasl security protocol, got {security_protocol}"),
            ));
        }

        Ok(AdminConfig {
            bootstrap_servers,
            client_id,
            security_protocol,
            ca,
            verify_certificates: reader.boolean(SSL_VERIFY)?,
            sasl,
            socket_timeout: reader.millis(SOCKET_TIMEOUT_MS)?,
            operation_timeout: reader.millis(OPERATION_TIMEOUT_MS)?,
            debug: reader.string(DEBUG)?.map(str::to_owned),
        })
    }

    /// Render the librdkafka properties for this configuration. Keys that only
    /// steer this client (such as the default operation timeout) are left out.
    pub fn to_client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set(BOOTSTRAP_SERVERS, self.bootstrap_servers.join(","))
            .set(CLIENT_ID, &self.client_id)
            .set(SECURITY_PROTOCOL, self.security_protocol.to_string())
            .set(
                SOCKET_TIMEOUT_MS,
                self.socket_timeout.as_millis().to_string(),
            );

        match &self.ca {
            CaSource::System => {}
            CaSource::Location(location) => {
                config.set(SSL_CA_LOCATION, location);
            }
            CaSource::Pem(pem) => {
                config.set(SSL_CA_PEM, pem);
            }
        }
        if let Some(verify) = self.verify_certificates {
            config.set(SSL_VERIFY, verify.to_string());
        }
        if let Some(mechanism) = &self.sasl.mechanism {
            config.set(SASL_MECHANISM, mechanism);
        }
        if let Some(username) = &self.sasl.username {
            config.set(SASL_USERNAME, username);
        }
        if let Some(password) = &self.sasl.password {
            config.set(SASL_PASSWORD, password);
        }
        if let Some(debug) = &self.debug {
            config.set(DEBUG, debug);
        }

        config
    }
}

struct OptionReader<'a> {
    raw: &'a BTreeMap<String, ConfigValue>,
}

impl<'a> OptionReader<'a> {
    const KNOWN: [&'static str; 12] = [
        BOOTSTRAP_SERVERS,
        CLIENT_ID,
        SECURITY_PROTOCOL,
        SSL_CA_LOCATION,
        SSL_CA_PEM,
        SSL_VERIFY,
        SASL_MECHANISM,
        SASL_USERNAME,
        SASL_PASSWORD,
        SOCKET_TIMEOUT_MS,
        OPERATION_TIMEOUT_MS,
        DEBUG,
    ];

    fn reject_unknown(&self) -> Result<(), ConfigError> {
        match self.raw.keys().find(|key| !Self::KNOWN.contains(&key.as_str())) {
            Some(key) => Err(ConfigError::UnknownKey(key.clone())),
            None => Ok(()),
        }
    }

    fn string(&self, key: &str) -> Result<Option<&'a str>, ConfigError> {
        match self.raw.get(key) {
            None => Ok(None),
            Some(ConfigValue::String(value)) => Ok(Some(value.as_str())),
            Some(_) => Err(wrong_type(key, "string")),
        }
    }

    fn boolean(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.raw.get(key) {
            None => Ok(None),
            Some(ConfigValue::Bool(value)) => Ok(Some(*value)),
            Some(_) => Err(wrong_type(key, "boolean")),
        }
    }

    fn millis(&self, key: &str) -> Result<Duration, ConfigError> {
        let ms = match self.raw.get(key) {
            None => DEFAULT_TIMEOUT_MS,
            Some(ConfigValue::Int(value)) => *value,
            Some(_) => return Err(wrong_type(key, "integer")),
        };
        if ms <= 0 {
            return Err(invalid(key, format!("must be positive, got {ms}")));
        }
        Ok(Duration::from_millis(ms as u64))
    }
}

fn parse_brokers(servers: &str) -> Result<Vec<String>, ConfigError> {
    let brokers: Vec<String> = servers
        .split(',')
        .map(str::trim)
        .filter(|broker| !broker.is_empty())
        .map(str::to_owned)
        .collect();

    if brokers.is_empty() {
        return Err(invalid(BOOTSTRAP_SERVERS, "at least one broker is required"));
    }
    for broker in &brokers {
        let Some((host, port)) = broker.rsplit_once(':') else {
            return Err(invalid(
                BOOTSTRAP_SERVERS,
                format!("{broker:?} is not in host:port form"),
            ));
        };
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(invalid(
                BOOTSTRAP_SERVERS,
                format!("{broker:?} is not in host:port form"),
            ));
        }
    }
    Ok(brokers)
}

fn wrong_type(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidType {
        key: key.to_owned(),
        expected,
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_owned(),
        reason: reason.into(),
    }
}
