use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "hiveot", version, about = "HiveOT Hub trust core administration")]
pub struct Cli {
    /// Hub home directory.
    #[arg(long, global = true, env = "HIVEOT_HOME")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print version information
    Version,

    /// Create the password file, signing key and bootstrap accounts
    Init,

    /// List clients with their type and role
    Clients,

    /// Add or update a consumer
    AddConsumer {
        client_id: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        password: Option<String>,
    },

    /// Add or update an agent and print its token
    AddAgent {
        client_id: String,
        #[arg(long, default_value = "")]
        name: String,
        /// PEM file with the agent's public key. Generated when omitted.
        #[arg(long)]
        pubkey_file: Option<PathBuf>,
    },

    /// Add or update a service, write its token file and print the token
    AddService {
        client_id: String,
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Set a client's password
    SetPassword { client_id: String, password: String },

    /// Set a client's role
    SetRole { client_id: String, role: String },

    /// Remove a client
    Remove { client_id: String },

    /// Print a fresh session-less token for a client
    NewToken { client_id: String },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_add_consumer_flags() {
        let cli = Cli::try_parse_from([
            "hiveot",
            "--home",
            "/tmp/h",
            "add-consumer",
            "alice",
            "--name",
            "Alice",
            "--password",
            "hunter22",
        ])
        .unwrap();
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/h")));
        match cli.command {
            Commands::AddConsumer {
                client_id,
                name,
                password,
            } => {
                assert_eq!(client_id, "alice");
                assert_eq!(name, "Alice");
                assert_eq!(password.as_deref(), Some("hunter22"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
