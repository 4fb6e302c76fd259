//! CLI argument definitions using clap
//!
//! Commands:
//! - retailpos init --config <path>
//! - retailpos serve --config <path> [--port <port>]
//! - retailpos token --config <path> --user <id> [--role R]… [--permission P]… [--shop S]…

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// retailpos - point-of-sale REST backend
#[derive(Parser, Debug)]
#[command(name = "retailpos")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database file and its tables
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./retailpos.json")]
        config: PathBuf,
    },

    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./retailpos.json")]
        config: PathBuf,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Mint a bearer token for development use
    Token {
        /// Path to configuration file
        #[arg(long, default_value = "./retailpos.json")]
        config: PathBuf,

        /// Subject of the token
        #[arg(long)]
        user: String,

        /// Role granted to the subject (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,

        /// Permission granted to the subject (repeatable)
        #[arg(long = "permission")]
        permissions: Vec<String>,

        /// Retail shop the subject may access (repeatable)
        #[arg(long = "shop")]
        shops: Vec<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_arguments_repeat() {
        let cli = Cli::try_parse_from([
            "retailpos",
            "token",
            "--user",
            "u-1",
            "--role",
            "admin",
            "--permission",
            "view_tag",
            "--permission",
            "create_tag",
            "--shop",
            "s-1",
        ])
        .unwrap();

        match cli.command {
            Command::Token {
                user,
                roles,
                permissions,
                shops,
                ..
            } => {
                assert_eq!(user, "u-1");
                assert_eq!(roles, vec!["admin"]);
                assert_eq!(permissions, vec!["view_tag", "create_tag"]);
                assert_eq!(shops, vec!["s-1"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["retailpos", "serve"]).unwrap();
        match cli.command {
            Command::Serve { config, port } => {
                assert_eq!(config, PathBuf::from("./retailpos.json"));
                assert_eq!(port, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
