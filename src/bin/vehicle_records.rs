//! vehicle_records - vehicle sighting records and operator accounts

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::io::{BufRead, IsTerminal};

use motion_sentinel::storage::{
    validate_plate_number, NewVehicleRecord, SearchField, SqliteUserStore, SqliteVehicleStore,
    UserStore, VehicleRecord, VehicleRecordStore,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the records database.
    #[arg(long, env = "SENTINEL_DB_PATH", default_value = "security_system.db")]
    db_path: String,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a vehicle sighting.
    Add {
        plate: String,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long = "type")]
        vehicle_type: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Substring search on one field, newest first.
    Search {
        term: String,
        /// plate | owner | type
        #[arg(long, default_value = "plate")]
        by: SearchField,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Show one record by id.
    Show { id: i64 },
    /// Create an operator account.
    Register {
        username: String,
        /// Read from the first stdin line when not given.
        #[arg(long, env = "SENTINEL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Check operator credentials; exits non-zero when they are rejected.
    Login {
        username: String,
        /// Read from the first stdin line when not given.
        #[arg(long, env = "SENTINEL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    match &args.command {
        Command::Register { username, password } => {
            let password = password_or_stdin(password.clone())?;
            let mut users = SqliteUserStore::open(&args.db_path)?;
            let id = {
                let _stage = ui.stage("Register user");
                users.register(username, &password)?
            };
            println!("{id}");
            return Ok(());
        }
        Command::Login { username, password } => {
            let password = password_or_stdin(password.clone())?;
            let users = SqliteUserStore::open(&args.db_path)?;
            let ok = {
                let _stage = ui.stage("Check credentials");
                users.login(username, &password)?
            };
            if !ok {
                return Err(anyhow!("invalid username or password"));
            }
            println!("login ok: {}", username.trim());
            return Ok(());
        }
        _ => {}
    }

    let mut store = {
        let _stage = ui.stage("Open records database");
        SqliteVehicleStore::open(&args.db_path)?
    };

    match args.command {
        Command::Add {
            plate,
            owner,
            vehicle_type,
            notes,
        } => {
            if !validate_plate_number(&plate) {
                return Err(anyhow!("invalid plate number '{}'", plate));
            }
            let id = {
                let _stage = ui.stage("Add record");
                store.add_record(NewVehicleRecord {
                    plate_number: plate,
                    owner_name: owner,
                    vehicle_type,
                    notes,
                    detected_at: Some(Local::now()),
                })?
            };
            println!("{id}");
        }
        Command::Search { term, by, json } => {
            let records = {
                let _stage = ui.stage("Search records");
                store.search(&term, by)?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for record in &records {
                    println!("{}", format_row(record));
                }
                eprintln!("{} record(s)", records.len());
            }
        }
        Command::Show { id } => {
            let record = store
                .get_record(id)?
                .ok_or_else(|| anyhow!("no vehicle record with id {}", id))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Register { .. } | Command::Login { .. } => {}
    }
    Ok(())
}

fn password_or_stdin(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| anyhow!("failed to read password from stdin: {}", e))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn format_row(record: &VehicleRecord) -> String {
    format!(
        "{:>5}  {:<12}  {}  {:<16}  {:<10}  {}",
        record.id,
        record.plate_number,
        record.detected_at.format("%Y-%m-%d %H:%M:%S"),
        record.owner_name.as_deref().unwrap_or("N/A"),
        record.vehicle_type.as_deref().unwrap_or("N/A"),
        record.notes.as_deref().unwrap_or("")
    )
}
