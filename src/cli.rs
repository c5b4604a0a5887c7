//! # cpms command line
//!
//! Thin dispatch from clap subcommands onto the document service, the
//! policy store and the archive engine. Every command prints JSON.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::SqliteAuditSink;
use crate::config;
use crate::db::sqlite::open_database;
use crate::documents::DocumentService;
use crate::models::enums::{AutoAction, StatusFilter, STANDARD_DOCUMENT_TYPES};
use crate::models::{ActingUser, ArchiveFilter, PolicyDraft};
use crate::retention::{ArchiveEngine, PolicyStore, SystemClock};
use crate::storage::LocalFileStore;

/// Clinical document archive and retention lifecycle.
#[derive(Parser, Debug)]
#[command(name = "cpms", version, about)]
pub struct Cli {
    /// Data directory (defaults to $CPMS_DATA_DIR or ~/CPMS).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Id of the acting user, recorded on archives and in the audit log.
    #[arg(long, global = true, default_value = "cli")]
    pub user_id: String,

    /// Display name of the acting user.
    #[arg(long, global = true, default_value = "Command Line")]
    pub user_name: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Patient records.
    #[command(subcommand)]
    Patient(PatientCommand),
    /// Document upload, versions and lookup.
    #[command(subcommand)]
    Document(DocumentCommand),
    /// Archive, restore and purge.
    #[command(subcommand)]
    Archive(ArchiveCommand),
    /// Retention policies.
    #[command(subcommand)]
    Policy(PolicyCommand),
}

#[derive(Subcommand, Debug)]
pub enum PatientCommand {
    Add {
        first_name: String,
        last_name: String,
        /// YYYY-MM-DD
        birth_date: NaiveDate,
        #[arg(long, default_value = "")]
        gender: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DocumentCommand {
    /// Upload a new document (creates version 1).
    Add {
        patient_id: Uuid,
        file: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long = "type")]
        document_type: String,
    },
    /// Upload a new version of an existing document.
    Version { document_id: Uuid, file: PathBuf },
    /// Edit title and type.
    Edit {
        document_id: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long = "type")]
        document_type: String,
    },
    /// Show a document with its active versions.
    Show {
        document_id: Uuid,
        #[arg(long)]
        version: Option<Uuid>,
    },
    /// Search non-archived documents.
    Search { term: Option<String> },
    /// Check a stored version against its digest.
    Verify { version_id: Uuid },
    /// List the standard document types.
    Types,
}

#[derive(Subcommand, Debug)]
pub enum ArchiveCommand {
    /// Archive a whole document.
    Document {
        document_id: Uuid,
        #[arg(long)]
        reason: String,
    },
    /// Archive one version of a document.
    Version {
        document_id: Uuid,
        version_id: Uuid,
        #[arg(long)]
        reason: String,
    },
    /// Restore an archive within its retention period.
    Restore { archive_id: Uuid },
    /// Permanently delete an archive whose retention has expired.
    Purge { archive_id: Uuid },
    /// List archived items.
    List(ListArgs),
    /// Report whether a document's flag and ledger agree.
    State { document_id: Uuid },
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long, value_enum, ignore_case = true, default_value_t = StatusFilter::All)]
    pub status: StatusFilter,
    #[arg(long, default_value_t = 1)]
    pub page: u32,
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    Add(PolicyArgs),
    Edit {
        policy_id: Uuid,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Enable or disable a policy.
    Toggle { policy_id: Uuid },
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

#[derive(Args, Debug)]
pub struct PolicyArgs {
    /// Document type the policy governs (exact match).
    #[arg(long)]
    pub module: String,
    #[arg(long)]
    pub months: u32,
    #[arg(long, value_parser = parse_auto_action, default_value = "ManualReview")]
    pub action: AutoAction,
    #[arg(long)]
    pub disabled: bool,
}

impl PolicyArgs {
    fn draft(&self) -> PolicyDraft {
        PolicyDraft {
            module_name: self.module.clone(),
            duration_months: self.months,
            auto_action: self.action,
            is_enabled: !self.disabled,
        }
    }
}

fn parse_auto_action(s: &str) -> Result<AutoAction, String> {
    s.parse::<AutoAction>().map_err(|e| e.to_string())
}

/// Open storage under the data directory and execute one command.
pub fn run(cli: Cli) -> anyhow::Result<Value> {
    let data_dir = cli.data_dir.clone().unwrap_or_else(config::app_data_dir);
    let db_path = config::database_file(&data_dir);
    let conn = open_database(&db_path)
        .with_context(|| format!("opening database at {}", db_path.display()))?;
    let files = LocalFileStore::new(config::storage_dir(&data_dir));
    let actor = ActingUser::new(cli.user_id, cli.user_name);

    tracing::debug!(data_dir = %data_dir.display(), user = %actor.id, "Running command");
    execute(&conn, &files, &actor, cli.command)
}

fn execute(conn: &Connection, files: &LocalFileStore, actor: &ActingUser, command: Commands) -> anyhow::Result<Value> {
    let audit = SqliteAuditSink::new(conn);
    let clock = SystemClock;

    let value = match command {
        Commands::Patient(PatientCommand::Add {
            first_name,
            last_name,
            birth_date,
            gender,
        }) => {
            let documents = DocumentService::new(conn, files, &audit);
            json!(documents.add_patient(&first_name, &last_name, birth_date, &gender)?)
        }

        Commands::Document(cmd) => {
            let documents = DocumentService::new(conn, files, &audit);
            match cmd {
                DocumentCommand::Add {
                    patient_id,
                    file,
                    title,
                    document_type,
                } => {
                    let (name, bytes) = read_upload(&file)?;
                    let (document, version) =
                        documents.add_document(&patient_id, &title, &document_type, &name, &bytes, actor)?;
                    json!({ "document": document, "version": version })
                }
                DocumentCommand::Version { document_id, file } => {
                    let (name, bytes) = read_upload(&file)?;
                    json!(documents.add_version(&document_id, &name, &bytes, actor)?)
                }
                DocumentCommand::Edit {
                    document_id,
                    title,
                    document_type,
                } => json!(documents.update_metadata(&document_id, &title, &document_type, actor)?),
                DocumentCommand::Show { document_id, version } => {
                    json!(documents.document_detail(&document_id, version.as_ref())?)
                }
                DocumentCommand::Search { term } => json!(documents.search_active_documents(term.as_deref())?),
                DocumentCommand::Verify { version_id } => json!(documents.verify_version(&version_id)?),
                DocumentCommand::Types => json!(STANDARD_DOCUMENT_TYPES),
            }
        }

        Commands::Archive(cmd) => {
            let engine = ArchiveEngine::new(conn, files, &audit, &clock);
            match cmd {
                ArchiveCommand::Document { document_id, reason } => {
                    json!(engine.archive_document(&document_id, &reason, actor)?)
                }
                ArchiveCommand::Version {
                    document_id,
                    version_id,
                    reason,
                } => json!(engine.archive_version(&document_id, &version_id, &reason, actor)?),
                ArchiveCommand::Restore { archive_id } => json!(engine.restore(&archive_id, actor)?),
                ArchiveCommand::Purge { archive_id } => json!(engine.permanent_delete(&archive_id, actor)?),
                ArchiveCommand::List(args) => {
                    let filter = ArchiveFilter {
                        search_term: args.search,
                        status: args.status,
                    };
                    json!(engine.list_archived(&filter, args.page)?)
                }
                ArchiveCommand::State { document_id } => json!(engine.document_state(&document_id)?),
            }
        }

        Commands::Policy(cmd) => {
            let policies = PolicyStore::new(conn, &audit);
            match cmd {
                PolicyCommand::Add(args) => json!(policies.create_policy(&args.draft(), actor)?),
                PolicyCommand::Edit { policy_id, policy } => {
                    json!(policies.update_policy(&policy_id, &policy.draft(), actor)?)
                }
                PolicyCommand::Toggle { policy_id } => json!(policies.toggle_enabled(&policy_id, actor)?),
                PolicyCommand::List { page } => json!(policies.list_policies(page)?),
            }
        }
    };
    Ok(value)
}

fn read_upload(path: &Path) -> anyhow::Result<(String, Vec<u8>)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file name: {}", path.display()))?
        .to_string();
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok((name, bytes))
}
