use crate::operator::{
    list_contacts, preview_recipients, resend_verification, ListArgs, RecipientsArgs, ResendArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use county_desk::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "County Desk",
    about = "Forward property requests to county offices and verify contact emails",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect saved contacts or resend their confirmation link
    Contacts {
        #[command(subcommand)]
        command: ContactsCommand,
    },
    /// Show which PVA and Zoning addresses a request would be sent to
    Recipients(RecipientsArgs),
}

#[derive(Subcommand, Debug)]
enum ContactsCommand {
    /// List contacts from the configured store
    List(ListArgs),
    /// Issue a fresh confirmation link to a pending contact
    Resend(ResendArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Contacts {
            command: ContactsCommand::List(args),
        } => list_contacts(args),
        Command::Contacts {
            command: ContactsCommand::Resend(args),
        } => resend_verification(args),
        Command::Recipients(args) => preview_recipients(args),
    }
}
