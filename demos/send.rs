use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use sendgrid_mailer::{
    domain::mail::{MailMessage, MailSender, MailSenderImpl, SendOutcome, ValidationPolicy},
    infrastructure::email::sendgrid::{ConfigOverrides, HttpTransport, SendgridConfig},
};
use tracing::{error, info, warn};

#[derive(Parser)]
pub struct Args {
    #[clap(flatten)]
    pub sendgrid: SendgridConfig,

    /// A JSON file holding the message to send
    #[arg(long)]
    pub message: PathBuf,

    /// Refuse messages without a body
    #[arg(long)]
    pub strict: bool,
}

#[mutants::skip]
#[tokio::main]
pub async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let policy = if args.strict {
        ValidationPolicy::Strict
    } else {
        ValidationPolicy::Lenient
    };

    let config = args
        .sendgrid
        .sender_config(ConfigOverrides::default(), policy)?;
    let transport = HttpTransport::new(&args.sendgrid)?;
    let sender = MailSenderImpl::new(config, Arc::new(transport));

    let raw = tokio::fs::read_to_string(&args.message).await?;
    let message: MailMessage = serde_json::from_str(&raw)?;

    let report = sender.send(&message).await?;

    match report.outcome {
        SendOutcome::Sent => info!("sent to {}", message.to),
        SendOutcome::Failed(error) => error!("failed to send to {}: {error}", message.to),
        SendOutcome::Unrecognized(body) => warn!("unrecognized response: {body}"),
    }

    Ok(())
}
