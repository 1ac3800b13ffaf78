pub mod commands;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "schoolhub-api")]
#[command(about = "Multi-school backend API server and operator tools")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to bind, overrides PORT")]
        port: Option<u16>,
    },

    #[command(about = "Issue a session token signed with the configured secret")]
    IssueToken {
        #[arg(help = "Subject user id")]
        user_id: i32,
        #[arg(long, help = "Tenant slug to embed in the token")]
        tenant: Option<String>,
        #[arg(long, help = "Mark the token as a super-admin session")]
        super_admin: bool,
    },

    #[command(about = "Produce an Argon2 hash for provisioning a user")]
    HashPassword {
        #[arg(help = "Plain-text password")]
        password: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => commands::serve::handle(port).await,
        Commands::IssueToken {
            user_id,
            tenant,
            super_admin,
        } => commands::token::issue(user_id, tenant, super_admin, output_format),
        Commands::HashPassword { password } => commands::token::hash(&password, output_format),
    }
}
