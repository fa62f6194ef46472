//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Only pair with glasses whose advertised name contains this text
    #[arg(short, long)]
    pub filter: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect the glasses and bridge them to the cloud relay until Ctrl+C
    Run {
        /// Run without the cloud session
        #[arg(long)]
        no_cloud: bool,
    },
    /// List advertising glasses arms
    Scan {
        /// Seconds to listen for advertisements
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,
    },
    /// Show text on the glasses
    Text {
        /// Text to display; wrapped to the display width
        text: String,
    },
    /// Set display brightness
    Brightness {
        /// Brightness in percent (0-100)
        percent: u8,
        /// Let the glasses adjust brightness automatically
        #[arg(long)]
        auto: bool,
    },
    /// Set the head-up activation angle
    HeadUpAngle {
        /// Angle in degrees (0-60)
        degrees: u8,
    },
    /// Move the dashboard
    Dashboard {
        /// Vertical position (0-8)
        height: u8,
        /// Depth (1-9)
        depth: u8,
    },
    /// Turn the microphone on or off
    Mic {
        /// on or off
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        state: bool,
    },
    /// Query the battery level of both arms
    Battery,
    /// Query the serial number, frame style and color
    Serial,
    /// Forget the paired glasses
    Forget,
    /// Show configuration and pairing state
    Status,
    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(format!("expected on or off, got {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::parse_from(["glasslink", "-v", "brightness", "40", "--auto"]);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Brightness {
                percent: 40,
                auto: true
            }
        ));

        let cli = Cli::parse_from(["glasslink", "--filter", "_74_", "mic", "off"]);
        assert_eq!(cli.filter.as_deref(), Some("_74_"));
        assert!(matches!(cli.command, Commands::Mic { state: false }));
    }

    #[test]
    fn test_bad_switch_is_rejected() {
        assert!(Cli::try_parse_from(["glasslink", "mic", "maybe"]).is_err());
    }
}
