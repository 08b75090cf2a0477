use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use time::OffsetDateTime;

use crate::api::{CashflowResponse, DEFAULT_PORT, DEFAULT_STORE_PATH, RetirementResponse};
use crate::error::ExportError;
use crate::export::{cashflow_csv, retirement_csv};
use crate::state::store::{FileStore, LocalStore, MemoryStore};
use crate::state::{CashflowPlanner, Planner, RetirementPlanner, Session};

#[derive(Parser, Debug)]
#[command(name = "lifeplan", version, about = "Household cash-flow and retirement planner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the planner JSON API
    Serve {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// File backing the planners' saved inputs
        #[arg(long, default_value = DEFAULT_STORE_PATH)]
        store: PathBuf,
    },

    /// Project yearly household cash flow
    Cashflow(ProjectArgs),

    /// Project retirement assets
    Retirement(ProjectArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Share query to restore inputs from, e.g. "y=2025&n=20&a=..."
    #[arg(short, long, default_value = "")]
    pub query: String,

    /// Saved inputs to fall back on and update. Nothing is saved without it.
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Write CSV in man-yen instead of JSON
    #[arg(long)]
    pub csv: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("could not write output: {0}")]
    Io(#[from] io::Error),

    #[error("could not serialize output: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Runs `f` on a session hydrated from `args`, against the file store when
/// one is given and a throwaway store otherwise.
fn with_session<P: Planner, R>(
    args: &ProjectArgs,
    this_year: i32,
    f: impl FnOnce(&Session<P, &mut dyn LocalStore>) -> R,
) -> R {
    let mut file;
    let mut memory;
    let store: &mut dyn LocalStore = match &args.store {
        Some(path) => {
            file = FileStore::open(path);
            &mut file
        }
        None => {
            memory = MemoryStore::new();
            &mut memory
        }
    };
    let mut session = Session::<P, _>::new(store, this_year);
    session.hydrate(&args.query);
    f(&session)
}

pub fn run_cashflow(args: &ProjectArgs, out: &mut impl Write, err: &mut impl Write) -> Result<(), CliError> {
    let this_year = OffsetDateTime::now_utc().year();
    with_session::<CashflowPlanner, _>(args, this_year, |session| -> Result<(), CliError> {
        if args.csv {
            out.write_all(&cashflow_csv(session.model(), session.projection())?.body)?;
        } else {
            let body = CashflowResponse::new(session.model(), session.projection(), session.share_query());
            serde_json::to_writer_pretty(&mut *out, &body)?;
            writeln!(out)?;
        }
        writeln!(err, "?{}", session.share_query())?;
        Ok(())
    })
}

pub fn run_retirement(
    args: &ProjectArgs,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<(), CliError> {
    let this_year = OffsetDateTime::now_utc().year();
    with_session::<RetirementPlanner, _>(args, this_year, |session| -> Result<(), CliError> {
        if args.csv {
            out.write_all(&retirement_csv(session.model(), session.projection())?.body)?;
        } else {
            let body =
                RetirementResponse::new(session.model(), session.projection(), session.share_query());
            serde_json::to_writer_pretty(&mut *out, &body)?;
            writeln!(out)?;
        }
        writeln!(err, "?{}", session.share_query())?;
        Ok(())
    })
}
