//! Command-line interface.

use clap::{Parser, Subcommand};

/// Bulk package install/activate/delete service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Print an argon2 hash for `password_hash` in the accounts file.
    HashPassword {
        /// Password to hash.
        password: String,
    },

    /// Generate an API token and the hash to store in the accounts file.
    GenerateToken,

    /// List installed packages.
    List,

    /// Print the installation status of the given slugs.
    Status {
        #[arg(required = true)]
        slugs: Vec<String>,
    },
}
