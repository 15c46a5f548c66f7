use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeMap};

use crate::{
    Args,
    client_config::{BOOTSTRAP_SERVERS, ConfigValue},
    logging::LogFormat,
};

#[derive(PartialEq, Debug, Deserialize, Serialize)]
pub struct Config {
    /// The sentry DSN to use for error reporting.
    pub sentry_dsn: Option<String>,

    /// The environment to report to sentry errors to.
    pub sentry_env: Option<Cow<'static, str>>,

    /// The tracing sample rate
    pub traces_sample_rate: Option<f32>,

    /// The log filter to apply, in `EnvFilter` syntax.
    pub log_filter: String,

    /// The log format to use
    pub log_format: LogFormat,

    /// The statsd address to report metrics to. Metrics are not
    /// reported when unset.
    pub statsd_addr: Option<String>,

    /// Extra admin client options, e.g. `security.protocol` or `client.id`.
    /// `bootstrap.servers` from the command line always wins.
    pub admin_client_properties: BTreeMap<String, ConfigValue>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sentry_dsn: None,
            sentry_env: None,
            traces_sample_rate: None,
            log_filter: "warn,topicadmin=info".to_owned(),
            log_format: LogFormat::Text,
            statsd_addr: None,
            admin_client_properties: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Build a config instance from defaults, env vars, file + CLI options
    pub fn from_args(args: &Args) -> Result<Self, figment::Error> {
        let mut builder = Figment::from(Config::default()).merge(Env::prefixed("TOPICADMIN_"));

        if let Some(path) = &args.config {
            builder = builder.merge(Yaml::file(path));
        }
        if let Some(log_filter) = &args.log_filter {
            builder = builder.merge(Serialized::default("log_filter", log_filter));
        }
        let config = builder.extract()?;
        Ok(config)
    }

    /// Raw admin client options for a cluster reachable at `bootstrap_servers`.
    pub fn admin_client_options(&self, bootstrap_servers: &str) -> BTreeMap<String, ConfigValue> {
        let mut options = self.admin_client_properties.clone();
        options.insert(BOOTSTRAP_SERVERS.to_owned(), bootstrap_servers.into());
        options
    }
}

impl Provider for Config {
    fn metadata(&self) -> Metadata {
        Metadata::named("Topicadmin config")
    }

    fn data(&self) -> Result<figment::value::Map<Profile, figment::value::Dict>, figment::Error> {
        figment::providers::Serialized::defaults(Config::default()).data()
    }
}
