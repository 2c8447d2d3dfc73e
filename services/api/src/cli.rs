use crate::extract::{run_extract, ExtractArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use doc_intake::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "doc-intake-api",
    about = "Run the document intake service or extract a single document from the command line",
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
    /// Run one document through the extraction pipeline and print the result as JSON
    Extract(ExtractArgs),
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
        Command::Extract(args) => run_extract(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["doc-intake-api"]).expect("parses");
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["doc-intake-api", "serve", "--port", "9090"])
            .expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => assert_eq!(args.port, Some(9090)),
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn extract_parses_applicant_fields() {
        let cli = Cli::try_parse_from([
            "doc-intake-api",
            "extract",
            "--file",
            "scan.png",
            "--first-name",
            "Ada",
            "--last-name",
            "Lovelace",
            "--dob",
            "2000-06-15",
            "--method",
            "ai",
        ])
        .expect("parses");

        let Some(Command::Extract(args)) = cli.command else {
            panic!("expected extract command");
        };
        assert_eq!(args.first_name, "Ada");
        assert_eq!(args.dob, NaiveDate::from_ymd_opt(2000, 6, 15).expect("valid"));
        assert_eq!(args.method, "ai");
        assert!(args.content_type.is_none());
    }

    #[test]
    fn extract_rejects_malformed_dob() {
        let result = Cli::try_parse_from([
            "doc-intake-api",
            "extract",
            "--file",
            "scan.png",
            "--first-name",
            "Ada",
            "--last-name",
            "Lovelace",
            "--dob",
            "06/15/2000",
        ]);
        assert!(result.is_err());
    }
}
