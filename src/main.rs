mod auth;
mod cli;
mod errors;
mod graph;
mod mcp;
mod render;
mod token;
mod tool_args;
mod tool_defs;
mod tool_exec;
mod util;

use std::fs;

use clap::Parser;

use crate::cli::{Cli, Command, MailCommand};
use crate::graph::GraphClient;
use crate::mcp::run_mcp_server;
use crate::token::load_credential;
use crate::tool_defs::tool_catalog;
use crate::tool_exec::Dispatcher;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            // Refuse to start a session that can only answer with auth errors.
            let Some(credential) = load_credential() else {
                eprintln!(
                    "[outlook-connector] no saved access token; run `outlook-connector auth` first"
                );
                std::process::exit(1);
            };
            let dispatcher = Dispatcher::new(Some(GraphClient::new(&credential)));
            eprintln!(
                "[outlook-connector] serving {} tools over stdio",
                dispatcher.catalog().len()
            );
            run_mcp_server(&dispatcher)
        }

        Command::Auth { bind, port } => auth::run_auth_flow(&bind, port),

        Command::Tools => {
            println!("{}", serde_json::to_string_pretty(&tool_catalog())?);
            Ok(())
        }

        Command::Call { name, args, raw } => {
            let arguments: serde_json::Value = serde_json::from_str(&args).map_err(|e| {
                format!("--args must be a JSON object: {e}")
            })?;
            let client = load_credential().map(|credential| GraphClient::new(&credential));
            let dispatcher = Dispatcher::new(client);
            let execution = dispatcher.invoke(&name, &arguments);
            println!("{}", execution.output);
            if raw {
                if let Some(details) = &execution.details {
                    println!("{}", serde_json::to_string_pretty(details)?);
                }
            }
            if execution.is_error {
                std::process::exit(1);
            }
            Ok(())
        }

        Command::Mail { command } => {
            let Some(credential) = load_credential() else {
                eprintln!(
                    "[outlook-connector] no saved access token; run `outlook-connector auth` first"
                );
                std::process::exit(1);
            };
            let client = GraphClient::new(&credential);
            match command {
                MailCommand::UnreadCount { folder } => {
                    let count = client.get_unread_count(&folder)?;
                    println!("{folder}: {count} unread");
                }
                MailCommand::MarkRead { ids } => {
                    if ids.is_empty() {
                        eprintln!("no message ids given");
                        std::process::exit(2);
                    }
                    let outcomes = client.bulk_mark_read(&ids);
                    println!("{}", serde_json::to_string_pretty(&outcomes)?);
                    if outcomes.iter().any(|outcome| !outcome.success) {
                        std::process::exit(1);
                    }
                }
                MailCommand::Attachment {
                    message_id,
                    attachment_id,
                    out,
                } => {
                    let bytes = client.download_attachment(&message_id, &attachment_id)?;
                    fs::write(&out, &bytes)?;
                    println!("wrote {} bytes to {}", bytes.len(), out.display());
                }
            }
            Ok(())
        }
    }
}
