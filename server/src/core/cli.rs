use clap::Parser;

use super::constants::{ENV_HOST, ENV_LOG, ENV_PORT};

#[derive(Parser, Debug, Default)]
#[command(name = "glpi-dash")]
#[command(version, about = "GLPI dashboard metrics service", long_about = None)]
pub struct Cli {
    /// Server host address
    #[arg(long, short = 'H', env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', env = ENV_PORT)]
    pub port: Option<u16>,

    /// Log filter (e.g. info, debug, glpi_dash_server=trace)
    #[arg(long, env = ENV_LOG)]
    pub log: Option<String>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_none() {
        let cli = Cli::try_parse_from(["glpi-dash"]).unwrap();
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
    }

    #[test]
    fn cli_accepts_host_and_port() {
        let cli = Cli::try_parse_from(["glpi-dash", "-H", "0.0.0.0", "-p", "9000"]).unwrap();
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(9000));
    }
}
