use crate::config::Config;
use anyhow::{Context, anyhow};
use metrics_exporter_statsd::StatsdBuilder;
use std::net::{SocketAddr, ToSocketAddrs};

pub struct MetricsConfig {
    pub statsd_addr: SocketAddr,
}

impl MetricsConfig {
    /// `None` when no statsd address is configured.
    pub fn from_config(config: &Config) -> anyhow::Result<Option<Self>> {
        let Some(addr) = &config.statsd_addr else {
            return Ok(None);
        };
        let socket_addrs: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .with_context(|| format!("Could not resolve statsd address {addr}"))?
            .collect();
        let [statsd_addr] = socket_addrs.as_slice() else {
            return Err(anyhow!(
                "Expect statsd_addr {addr} to resolve into a single socket address"
            ));
        };
        Ok(Some(MetricsConfig {
            statsd_addr: *statsd_addr,
        }))
    }
}

pub fn init(metrics_config: MetricsConfig) -> anyhow::Result<()> {
    let address = metrics_config.statsd_addr;

    let recorder = StatsdBuilder::from(address.ip().to_string(), address.port())
        .with_queue_size(5000)
        .with_buffer_size(1024)
        .build(Some("topicadmin"))
        .context("Could not create StatsdRecorder")?;

    metrics::set_global_recorder(recorder)
        .map_err(|_| anyhow!("Could not set global metrics recorder"))
}
