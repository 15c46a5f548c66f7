use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use topicadmin::Args;
use topicadmin::cli::{self, ArgumentError, CreateTopicCommand};
use topicadmin::config::Config;
use topicadmin::logging::{self, LoggingConfig};
use topicadmin::metrics::{self, MetricsConfig};
use topicadmin::transport::KafkaTransport;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => {
            eprintln!("{}", ArgumentError::Usage { program: program_name() });
            return ExitCode::FAILURE;
        }
    };

    let command = match CreateTopicCommand::try_from(&args) {
        Ok(command) => command,
        Err(err) => {
            println!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(err) => {
            println!("Failed to load config: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_observability(&config) {
        println!("{err:#}");
        return ExitCode::FAILURE;
    }
    info!("topicadmin starting, version {}", topicadmin::get_version());

    let cancel = CancellationToken::new();
    tokio::spawn(async {
        elegant_departure::tokio::depart()
            .on_termination()
            .on_sigint()
            .await
    });
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let guard = elegant_departure::get_shutdown_guard().shutdown_on_drop();
            guard.wait().await;
            debug!("Shutdown signal received, cancelling outstanding requests");
            cancel.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    match cli::run::<KafkaTransport>(command, &config, &cancel, &mut stdout).await {
        Ok(results) => {
            for failure in results.failures() {
                warn!("Topic {:?} was not created", failure.name());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_observability(config: &Config) -> anyhow::Result<()> {
    logging::init(LoggingConfig::from_config(config))?;
    if let Some(metrics_config) = MetricsConfig::from_config(config)? {
        metrics::init(metrics_config)?;
    }
    Ok(())
}

fn program_name() -> String {
    std::env::args()
        .next()
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned())
}
