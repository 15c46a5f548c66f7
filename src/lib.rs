use clap::Parser;

pub mod cli;
pub mod client_config;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod request;
pub mod result;
pub mod session;
pub mod transport;

#[cfg(test)]
pub mod test_utils;

pub use client_config::{AdminConfig, ConfigValue};
pub use error::{AdminError, ConfigError, InvalidSpecError, TransportError};
pub use request::{OperationOptions, TopicSpecification};
pub use result::{FailureReason, ResultSequence, TopicResult};
pub use session::AdminClient;

pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[derive(Parser, Debug)]
#[command(version, about = "Create a topic on a Kafka cluster")]
pub struct Args {
    /// Comma separated host:port list of brokers to bootstrap from
    pub bootstrap_servers: String,

    /// Name of the topic to create
    pub topic: String,

    /// Number of partitions
    #[arg(allow_hyphen_values = true)]
    pub partition_count: String,

    /// Number of replicas for each partition
    #[arg(allow_hyphen_values = true)]
    pub replication_factor: String,

    /// Path to the configuration file
    #[arg(short, long, help = "The path to a config file")]
    pub config: Option<String>,

    #[arg(long, help = "Log filter, overrides the config file")]
    pub log_filter: Option<String>,
}
