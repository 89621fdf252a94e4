use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ulid::Ulid;

use slotbook::model::Ms;
use slotbook::{Config, SchedulingEngine};

/// Book doctor appointments and leave on an hourly UTC grid.
///
/// Instants are Unix milliseconds. Configuration comes from `SLOTBOOK_*` variables.
#[derive(Parser)]
#[command(name = "slotbook", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a doctor.
    AddDoctor {
        #[arg(long)]
        name: String,
        #[arg(long)]
        specialty: Option<String>,
    },
    /// List doctors.
    Doctors {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        page_size: usize,
    },
    /// Book a one-hour appointment.
    Book {
        #[arg(long)]
        doctor: Ulid,
        #[arg(long)]
        patient: Ulid,
        #[arg(long)]
        at: Ms,
    },
    /// Schedule leave; without --end it lasts one hour.
    Leave {
        #[arg(long)]
        doctor: Ulid,
        #[arg(long = "type")]
        leave_type: String,
        #[arg(long)]
        start: Ms,
        #[arg(long)]
        end: Option<Ms>,
    },
    /// Free slots over the availability horizon.
    Availability {
        #[arg(long)]
        doctor: Ulid,
        /// Evaluate as of this instant instead of now.
        #[arg(long)]
        now: Option<Ms>,
    },
    /// A doctor's patient appointments.
    Appointments {
        #[arg(long)]
        doctor: Ulid,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        page_size: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let engine = SchedulingEngine::open(&config)?;
    let policy = engine.policy();
    info!(
        wal = %config.wal_path().display(),
        open_hour = policy.open_hour,
        close_hour = policy.close_hour,
        horizon_days = policy.horizon_days,
        "slotbook opened"
    );

    let output = match cli.command {
        Command::AddDoctor { name, specialty } => {
            let id = engine.create_resource(&name, specialty.as_deref()).await?;
            json!({ "id": id })
        }
        Command::Doctors { page, page_size } => {
            serde_json::to_value(engine.list_resources(page, page_size).await?)?
        }
        Command::Book { doctor, patient, at } => {
            let id = engine.book_appointment(doctor, patient, at).await?;
            json!({ "id": id })
        }
        Command::Leave {
            doctor,
            leave_type,
            start,
            end,
        } => {
            let id = engine.book_leave(doctor, &leave_type, start, end).await?;
            json!({ "id": id })
        }
        Command::Availability { doctor, now } => {
            let slots = match now {
                Some(now) => engine.compute_availability(doctor, now).await?,
                None => engine.availability(doctor).await?,
            };
            json!({ "available_time_slots": slots })
        }
        Command::Appointments {
            doctor,
            page,
            page_size,
        } => serde_json::to_value(engine.list_appointments(doctor, page, page_size).await?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
