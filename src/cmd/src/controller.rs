use clap::Parser;
use nimbusd_controller::{config::Config, error::Error};

#[derive(Debug, Clone, Parser)]
pub struct ControllerCmd {
    #[arg(short = 'f', long, help = "Config file path for nimbusd controller")]
    pub file: Option<String>,

    #[arg(short, long, help = "Endpoint serving health, metrics and queries")]
    pub endpoint: Option<String>,

    #[arg(long = "topology-file", help = "Path to the topology document to resync from")]
    pub topology_file: Option<String>,

    #[arg(long, help = "Resync interval in seconds")]
    pub interval: Option<u64>,
}

impl ControllerCmd {
    // Flags take precedence over the config file.
    pub fn into_config(self) -> Result<Config, Error> {
        let mut config = match self.file {
            Some(file) => Config::load(&file)?,
            None => Config::default(),
        };
        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(topology_file) = self.topology_file {
            config.topology_file = Some(topology_file);
        }
        if let Some(interval) = self.interval {
            config.resync_interval = interval;
        }
        config.validate()?;
        Ok(config)
    }
}
