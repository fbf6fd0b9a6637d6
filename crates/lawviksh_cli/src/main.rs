//! LawViksh storage CLI.
//!
//! Resolves backend configuration from `LAWVIKSH_*` variables, opens the
//! configured database and runs one core operation, printing JSON.
//!
//! Exit codes: 0 = success, 1 = operation rejected or failed,
//! 2 = configuration error, 3 = database unavailable.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use lawviksh_core::db::migrations::POSTGRES_SCHEMA_SQL;
use lawviksh_core::{
    init_logging, AppConfig, Database, EmailScope, ExportService, FeedbackService,
    FeedbackSubmission, OptOutParty, PartyRole, PartyService, RegisteredParty,
    RegistrationOutcome, SqlFeedbackRepository, SqlPartyRepository, SubmissionOutcome,
};

#[derive(Parser)]
#[command(name = "lawviksh", version, about = "LawViksh submission storage tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store one feedback submission read from a JSON file.
    Submit {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Register a user or creator read from a JSON file.
    Register {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Store an opt-out read from a JSON file.
    OptOut {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Check whether an email is already stored.
    EmailExists {
        email: String,
        /// Probe the opt-out table instead of registrations.
        #[arg(long)]
        opt_outs: bool,
    },
    /// List every feedback submission, newest first.
    Feedback,
    /// Recent submissions plus rounded rating analytics.
    Summary,
    /// Rating averages, totals and consent counts.
    Analytics,
    /// Registered users, newest first.
    Users,
    /// Registered creators, newest first.
    Creators,
    /// Opt-outs, newest first.
    OptOuts,
    /// Registration and opt-out distributions.
    PartyAnalytics,
    /// Every listing and rollup as one document.
    Export,
    /// Print the PostgreSQL schema DDL.
    Schema,
}

fn main() {
    process::exit(run(Cli::parse()));
}

fn run(cli: Cli) -> i32 {
    if let Commands::Schema = cli.command {
        println!("{POSTGRES_SCHEMA_SQL}");
        return 0;
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return 2;
        }
    };
    if let Err(err) = init_logging(&config.logging) {
        eprintln!("Error: {err}");
        return 2;
    }

    let db = match Database::open(&config.backend) {
        Ok(db) => db,
        Err(err) => {
            eprintln!("Error: failed to open database: {err}");
            return 3;
        }
    };
    info!("event=cli_run module=cli status=start backend={}", db.kind());

    let code = dispatch(&db, cli.command);
    db.disconnect();
    code
}

fn dispatch(db: &Database, command: Commands) -> i32 {
    let feedback = FeedbackService::new(SqlFeedbackRepository::new(db));
    let parties = PartyService::new(SqlPartyRepository::new(db));

    match command {
        Commands::Submit { file } => match read_json::<FeedbackSubmission>(&file) {
            Ok(submission) => print_submission_outcome(feedback.submit(&submission)),
            Err(message) => fail(&message),
        },
        Commands::Register { file } => match read_json::<RegisteredParty>(&file) {
            Ok(party) => print_registration_outcome(parties.register(&party)),
            Err(message) => fail(&message),
        },
        Commands::OptOut { file } => match read_json::<OptOutParty>(&file) {
            Ok(party) => print_registration_outcome(parties.opt_out(&party)),
            Err(message) => fail(&message),
        },
        Commands::EmailExists { email, opt_outs } => {
            let scope = if opt_outs {
                EmailScope::OptOuts
            } else {
                EmailScope::Users
            };
            print_json(&json!({ "exists": parties.email_exists(&email, scope) }))
        }
        Commands::Feedback => print_json(&feedback.list_submissions()),
        Commands::Summary => print_json(&feedback.summarize()),
        Commands::Analytics => print_json(&feedback.submission_analytics()),
        Commands::Users => print_json(&parties.list_registered_parties(PartyRole::User)),
        Commands::Creators => print_json(&parties.list_registered_parties(PartyRole::Creator)),
        Commands::OptOuts => print_json(&parties.list_opt_out_parties()),
        Commands::PartyAnalytics => print_json(&parties.party_analytics()),
        Commands::Export => {
            let exporter =
                ExportService::new(SqlFeedbackRepository::new(db), SqlPartyRepository::new(db));
            print_json(&exporter.export())
        }
        Commands::Schema => {
            println!("{POSTGRES_SCHEMA_SQL}");
            0
        }
    }
}

fn print_submission_outcome(outcome: SubmissionOutcome) -> i32 {
    match outcome {
        SubmissionOutcome::Accepted(id) => print_json(&json!({ "submission_id": id })),
        SubmissionOutcome::Rejected(err) => fail(&format!("submission rejected: {err}")),
        SubmissionOutcome::Failed(err) => fail(&format!("submission failed: {err}")),
    }
}

fn print_registration_outcome(outcome: RegistrationOutcome) -> i32 {
    match outcome {
        RegistrationOutcome::Registered(id) => print_json(&json!({ "id": id })),
        RegistrationOutcome::AlreadyExists => fail("email already exists"),
        RegistrationOutcome::Rejected(err) => fail(&format!("rejected: {err}")),
        RegistrationOutcome::Failed(err) => fail(&format!("failed: {err}")),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed to read '{}': {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid JSON in '{}': {err}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            0
        }
        Err(err) => fail(&format!("failed to serialize output: {err}")),
    }
}

fn fail(message: &str) -> i32 {
    eprintln!("Error: {message}");
    1
}
