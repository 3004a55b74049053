//! Command-line front end for the rotation store.
//!
//! # Responsibility
//! - Manage the roster, run rotations and apply task transitions against
//!   one SQLite database.
//! - Print plain, line-oriented output for scripting.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use log::error;
use rota_core::{
    default_log_level, init_logging, open_db, EngineConfig, Person, RosterRepository,
    RotationService, SqliteRosterRepository, SqliteTaskRepository, Task, TaskService,
};
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

/// Household chore rotation.
#[derive(Parser, Debug)]
#[command(name = "rota", version, about)]
struct Cli {
    /// SQLite database file; created and migrated on first use.
    #[arg(long, env = "ROTA_DB", default_value = "rota.sqlite3")]
    db: PathBuf,

    /// Engine config JSON. Built-in defaults when omitted.
    #[arg(long, env = "ROTA_CONFIG")]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files. Logging is off when omitted.
    #[arg(long, env = "ROTA_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage people.
    #[command(subcommand)]
    Roster(RosterCommand),
    /// Plan the next cycle and make it current.
    Plan,
    /// List the current rotation.
    Tasks,
    /// Mark a task completed, or withdraw completion with `--undo`.
    Complete {
        task: Uuid,
        #[arg(long)]
        person: String,
        #[arg(long)]
        undo: bool,
    },
    /// Cast a verification vote.
    Vote(VoteArgs),
    /// Negotiate or force task swaps.
    #[command(subcommand)]
    Swap(SwapCommand),
    /// List finally approved tasks old enough to archive.
    Archive,
}

#[derive(Subcommand, Debug)]
enum RosterCommand {
    /// Add or update a person.
    Add {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        unavailable: bool,
    },
    /// Set whether a person joins the next rotation.
    Available {
        id: String,
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        value: bool,
    },
    /// List everyone in join order.
    List,
}

#[derive(Args, Debug)]
struct VoteArgs {
    task: Uuid,
    #[arg(long)]
    verifier: String,
    /// Reject instead of approve.
    #[arg(long)]
    reject: bool,
    #[arg(long)]
    comment: Option<String>,
}

#[derive(Subcommand, Debug)]
enum SwapCommand {
    /// Offer one of your tasks in exchange for another.
    Request {
        requested: Uuid,
        #[arg(long)]
        offered: Uuid,
        #[arg(long)]
        person: String,
    },
    /// Accept or reject a pending request.
    Respond {
        requested: Uuid,
        #[arg(long)]
        request: Uuid,
        #[arg(long)]
        person: String,
        #[arg(long)]
        reject: bool,
    },
    /// Swap two tasks immediately.
    Direct {
        first: Uuid,
        second: Uuid,
        #[arg(long)]
        person: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(log_dir) = &cli.log_dir {
        init_logging(default_log_level(), log_dir)
            .with_context(|| format!("failed to start logging in `{}`", log_dir.display()))?;
    }
    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("failed to load config `{}`", path.display()))?,
        None => EngineConfig::default(),
    };
    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open database `{}`", cli.db.display()))?;
    let now = Utc::now();

    match cli.command {
        Command::Roster(command) => {
            let roster = SqliteRosterRepository::try_new(&conn)?;
            run_roster(&roster, command)?;
        }
        Command::Plan => {
            let service = RotationService::new(
                SqliteTaskRepository::try_new(&conn)?,
                SqliteRosterRepository::try_new(&conn)?,
                config,
            );
            let outcome = service.run_rotation(now)?;
            println!(
                "planned {} tasks (target workload {:.2}, superseded {})",
                outcome.tasks.len(),
                outcome.target_workload,
                outcome.superseded
            );
            for task in &outcome.tasks {
                print_task(task);
            }
        }
        Command::Tasks => {
            let service = TaskService::from_config(SqliteTaskRepository::try_new(&conn)?, &config);
            for task in service.list_current()? {
                print_task(&task);
            }
        }
        Command::Complete { task, person, undo } => {
            let service = TaskService::from_config(SqliteTaskRepository::try_new(&conn)?, &config);
            print_task(&service.set_completion(task, &person, !undo, now)?);
        }
        Command::Vote(args) => {
            let service = TaskService::from_config(SqliteTaskRepository::try_new(&conn)?, &config);
            let task = service.cast_vote(
                args.task,
                &args.verifier,
                !args.reject,
                args.comment,
                now,
            )?;
            print_task(&task);
        }
        Command::Swap(command) => {
            let service = TaskService::from_config(SqliteTaskRepository::try_new(&conn)?, &config);
            run_swap(&service, command, now)?;
        }
        Command::Archive => {
            let service = TaskService::from_config(SqliteTaskRepository::try_new(&conn)?, &config);
            for task in service.archive_candidates(now)? {
                print_task(&task);
            }
        }
    }
    Ok(())
}

fn run_roster(roster: &SqliteRosterRepository<'_>, command: RosterCommand) -> Result<()> {
    match command {
        RosterCommand::Add {
            id,
            name,
            unavailable,
        } => {
            let person = Person::new(id, name).with_availability(!unavailable);
            roster.upsert_person(&person)?;
            println!("{} {}", person.id, availability_label(person.available));
        }
        RosterCommand::Available { id, value } => {
            roster.set_availability(&id, value)?;
            println!("{id} {}", availability_label(value));
        }
        RosterCommand::List => {
            for person in roster.list_people()? {
                println!(
                    "{}\t{}\t{}",
                    person.id,
                    person.display_name,
                    availability_label(person.available)
                );
            }
        }
    }
    Ok(())
}

fn run_swap(
    service: &TaskService<SqliteTaskRepository<'_>>,
    command: SwapCommand,
    now: DateTime<Utc>,
) -> Result<()> {
    match command {
        SwapCommand::Request {
            requested,
            offered,
            person,
        } => {
            let task = service.request_swap(requested, offered, &person, now)?;
            for request in task.pending_swap_requests() {
                println!("request {} from {}", request.id, request.requester);
            }
        }
        SwapCommand::Respond {
            requested,
            request,
            person,
            reject,
        } => {
            for task in service
                .respond_to_swap(requested, request, &person, !reject, now)?
                .into_tasks()
            {
                print_task(&task);
            }
        }
        SwapCommand::Direct {
            first,
            second,
            person,
        } => {
            let (first, second) = service.direct_swap(first, second, &person)?;
            print_task(&first);
            print_task(&second);
        }
    }
    Ok(())
}

fn print_task(task: &Task) {
    let holders: Vec<&str> = task.holders().into_iter().map(String::as_str).collect();
    println!(
        "{}\t{}\t{}..{}\t{}\tverify:{}\t{}",
        task.id,
        task.area,
        task.start_date.format("%Y-%m-%d"),
        task.end_date.format("%Y-%m-%d"),
        holders.join(","),
        task.verifiers.join(","),
        task.verification_status.as_str()
    );
}

fn availability_label(available: bool) -> &'static str {
    if available {
        "available"
    } else {
        "unavailable"
    }
}
