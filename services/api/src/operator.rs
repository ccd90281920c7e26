use clap::Args;
use county_desk::config::AppConfig;
use county_desk::error::AppError;
use county_desk::mail::MailTransport;
use county_desk::telemetry;
use county_desk::workflows::contacts::{ContactView, JsonFileContactRepository, VerificationService};
use county_desk::workflows::requests::{
    infer_city, County, MappingSource, RecipientDirectory, Recipients,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct ListArgs {
    /// Print contacts as JSON instead of one line per contact
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ResendArgs {
    /// Email address of the pending contact
    #[arg(long)]
    pub(crate) email: String,
}

#[derive(Args, Debug)]
pub(crate) struct RecipientsArgs {
    /// County the request is for
    #[arg(long)]
    pub(crate) county: String,
    /// City within the county; inferred from --address when omitted
    #[arg(long)]
    pub(crate) city: Option<String>,
    /// Property address in `street, city, state zip` form
    #[arg(long)]
    pub(crate) address: Option<String>,
    /// Print the resolution as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RecipientPreview {
    pub(crate) county: String,
    pub(crate) served: bool,
    pub(crate) city: Option<String>,
    pub(crate) source: MappingSource,
    pub(crate) recipients: Recipients,
}

type OperatorService = VerificationService<JsonFileContactRepository, MailTransport>;

fn contact_service(config: &AppConfig, path: &Path) -> Result<OperatorService, AppError> {
    let repository = JsonFileContactRepository::open(path)?;
    let mailer = MailTransport::from_config(&config.mail)?;
    Ok(VerificationService::new(
        Arc::new(repository),
        Arc::new(mailer),
        config.verification.clone(),
    ))
}

pub(crate) fn list_contacts(args: ListArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let Some(path) = config.storage.contacts_path.as_deref() else {
        println!("CONTACTS_DB_PATH is not set; there is no persisted contact store to list.");
        return Ok(());
    };

    let views = contact_service(&config, path)?.list_contacts()?;
    if args.json {
        let rendered = serde_json::to_string_pretty(&views).map_err(std::io::Error::from)?;
        println!("{rendered}");
        return Ok(());
    }

    if views.is_empty() {
        println!("No contacts saved in {}", path.display());
        return Ok(());
    }
    println!("{} contact(s) in {}", views.len(), path.display());
    for view in &views {
        println!("  {}", contact_line(view));
    }
    Ok(())
}

pub(crate) fn contact_line(view: &ContactView) -> String {
    let mut line = format!("{} [{}]", view.email, view.status);
    if let Some(name) = &view.name {
        line.push_str(&format!(" {name}"));
    }
    line.push_str(if view.opt_in { " opted-in" } else { " not opted-in" });
    line.push_str(&format!(" created {}", view.created_at.to_rfc3339()));
    match view.verified_at {
        Some(at) => line.push_str(&format!(" verified {}", at.to_rfc3339())),
        None if view.awaiting_confirmation => line.push_str(" awaiting confirmation"),
        None => {}
    }
    line
}

pub(crate) fn resend_verification(args: ResendArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let Some(path) = config.storage.contacts_path.as_deref() else {
        println!("CONTACTS_DB_PATH is not set; pending contacts only exist inside a running server.");
        return Ok(());
    };

    let receipt = contact_service(&config, path)?.resend_verification(&args.email)?;
    println!("{}", receipt.message);
    Ok(())
}

pub(crate) fn preview_recipients(args: RecipientsArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let directory = RecipientDirectory::from_config(&config.dispatch)?;
    let preview = resolve_preview(&directory, &args);

    if args.json {
        let rendered = serde_json::to_string_pretty(&preview).map_err(std::io::Error::from)?;
        println!("{rendered}");
        return Ok(());
    }

    if !preview.served {
        println!("Note: {} county is not served; requests would be rejected.", preview.county);
    }
    println!(
        "County: {}  City: {}  (mapping: {:?})",
        preview.county,
        preview.city.as_deref().unwrap_or("-"),
        preview.source
    );
    println!(
        "  PVA:    {}",
        preview.recipients.pva.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Zoning: {}",
        preview.recipients.zoning.as_deref().unwrap_or("(none)")
    );
    Ok(())
}

pub(crate) fn resolve_preview(directory: &RecipientDirectory, args: &RecipientsArgs) -> RecipientPreview {
    let county = County::parse(&args.county);
    let county_name = county
        .map(|county| county.name().to_string())
        .unwrap_or_else(|| args.county.trim().to_string());
    let city = args
        .city
        .clone()
        .or_else(|| args.address.as_deref().and_then(infer_city));
    let resolution = directory.resolve(Some(&county_name), city.as_deref());

    RecipientPreview {
        county: county_name,
        served: county.is_some(),
        city,
        source: resolution.source,
        recipients: resolution.recipients,
    }
}
