use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "outlook-connector")]
#[command(about = "MCP stdio server for Outlook mail and calendar via Microsoft Graph", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the MCP server over stdin/stdout.
    Serve,

    /// One-time OAuth authorization; saves the token file.
    Auth {
        /// Address the local callback listener binds to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Callback port (must match the app registration's redirect URI)
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },

    /// Print the tool catalog as JSON.
    Tools,

    /// Invoke one tool directly, bypassing the protocol loop.
    Call {
        /// Tool name (e.g. get_emails)
        name: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
        /// Also print the raw Graph payload
        #[arg(long)]
        raw: bool,
    },

    /// Mailbox management helpers.
    Mail {
        #[command(subcommand)]
        command: MailCommand,
    },
}

#[derive(Subcommand)]
pub(crate) enum MailCommand {
    /// Show the unread message count for a folder.
    UnreadCount {
        #[arg(long, default_value = "inbox")]
        folder: String,
    },

    /// Mark one or more messages as read.
    MarkRead {
        /// Message ids (repeatable)
        ids: Vec<String>,
    },

    /// Download a file attachment to disk.
    Attachment {
        message_id: String,
        attachment_id: String,
        /// Output path for the decoded bytes
        #[arg(long)]
        out: std::path::PathBuf,
    },
}
