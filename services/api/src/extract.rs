use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;
use doc_intake::config::AppConfig;
use doc_intake::error::AppError;
use doc_intake::intake::{
    IntakeError, IntakePipeline, IntakeSubmission, RawApplicantFields, UploadedDocument,
};
use doc_intake::telemetry;

use crate::infra::{guess_content_type, parse_date};

#[derive(Args, Debug)]
pub(crate) struct ExtractArgs {
    /// Document to extract (PDF, JPEG or PNG)
    #[arg(long)]
    pub(crate) file: PathBuf,
    #[arg(long)]
    pub(crate) first_name: String,
    #[arg(long)]
    pub(crate) last_name: String,
    /// Date of birth in YYYY-MM-DD format
    #[arg(long, value_parser = parse_date)]
    pub(crate) dob: NaiveDate,
    /// Extraction method: standard or ai
    #[arg(long, default_value = "standard")]
    pub(crate) method: String,
    /// Override the content type guessed from the file extension
    #[arg(long)]
    pub(crate) content_type: Option<String>,
}

pub(crate) async fn run_extract(args: ExtractArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let pipeline = IntakePipeline::from_config(&config)?;
    let submission = build_submission(args).await?;
    let result = pipeline.submit(submission).await?;

    let rendered = serde_json::to_string_pretty(&result)
        .map_err(|err| IntakeError::Internal(format!("failed to render result: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn build_submission(args: ExtractArgs) -> Result<IntakeSubmission, AppError> {
    let bytes = tokio::fs::read(&args.file).await?;
    let content_type = args
        .content_type
        .unwrap_or_else(|| guess_content_type(&args.file));
    let filename = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    Ok(IntakeSubmission {
        fields: RawApplicantFields {
            first_name: Some(args.first_name),
            last_name: Some(args.last_name),
            dob: Some(args.dob.format("%Y-%m-%d").to_string()),
        },
        method: Some(args.method),
        document: Some(UploadedDocument::new(filename, content_type, bytes)),
    })
}
