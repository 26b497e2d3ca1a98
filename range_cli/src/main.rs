use clap::{Parser, Subcommand};
use range_core::*;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "rangelog")]
#[command(about = "Personal shooting-range logbook", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Acting user id
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Act with administrative visibility (no ownership scoping)
    #[arg(long, global = true)]
    admin: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage firearms
    Gun {
        #[command(subcommand)]
        command: GunCommands,
    },

    /// Manage ammunition packages
    Ammo {
        #[command(subcommand)]
        command: AmmoCommands,
    },

    /// Manage shooting sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Manage maintenance records
    Maintenance {
        #[command(subcommand)]
        command: MaintenanceCommands,
    },

    /// Show the current rank and progress
    Rank,

    /// Monthly cost and shot totals
    Summary,

    /// Export session history to CSV
    Export {
        /// Output file path
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum GunCommands {
    /// Register a firearm
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        caliber: Option<String>,
    },

    /// List firearms
    List,
}

#[derive(Subcommand)]
enum AmmoCommands {
    /// Register an ammunition package
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        caliber: Option<String>,

        /// Price per round
        #[arg(long)]
        price: f64,

        /// Rounds in the package
        #[arg(long)]
        units: Option<i64>,
    },

    /// List ammunition packages with remaining stock
    List,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Log a session
    Add {
        #[arg(long)]
        gun: Uuid,

        #[arg(long)]
        ammo: Uuid,

        #[arg(long)]
        shots: i64,

        /// Session date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        distance: Option<i64>,

        #[arg(long)]
        hits: Option<i64>,

        /// Group size in cm
        #[arg(long)]
        group: Option<f64>,

        /// Total cost override
        #[arg(long)]
        cost: Option<f64>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Update a session; only supplied fields change
    Update {
        id: Uuid,

        #[arg(long)]
        gun: Option<Uuid>,

        #[arg(long)]
        ammo: Option<Uuid>,

        #[arg(long)]
        shots: Option<i64>,

        #[arg(long)]
        date: Option<String>,

        #[arg(long, conflicts_with = "clear_distance")]
        distance: Option<i64>,

        #[arg(long)]
        clear_distance: bool,

        #[arg(long, conflicts_with = "clear_hits")]
        hits: Option<i64>,

        #[arg(long)]
        clear_hits: bool,

        #[arg(long, conflicts_with = "clear_group")]
        group: Option<f64>,

        #[arg(long)]
        clear_group: bool,

        #[arg(long)]
        cost: Option<f64>,

        #[arg(long, conflicts_with = "clear_notes")]
        notes: Option<String>,

        #[arg(long)]
        clear_notes: bool,
    },

    /// Delete a session, restoring its rounds to stock
    Delete { id: Uuid },

    /// List sessions, newest first
    List,
}

#[derive(Subcommand)]
enum MaintenanceCommands {
    /// Record a maintenance event
    Add {
        #[arg(long)]
        gun: Uuid,

        /// Maintenance date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long)]
        activities: Option<String>,

        /// Explicit round count since the previous maintenance
        #[arg(long)]
        rounds: Option<i64>,
    },

    /// List a firearm's maintenance history
    List {
        #[arg(long)]
        gun: Uuid,
    },

    /// Green/yellow/red maintenance status for a firearm
    Status {
        #[arg(long)]
        gun: Uuid,
    },

    /// Recompute the whole maintenance history from session data
    Rebuild {
        #[arg(long)]
        gun: Uuid,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    range_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    let store = JsonStore::new(data_dir.join("rangelog.json"));

    let user = if cli.admin {
        UserContext::admin(cli.user.clone())
    } else {
        UserContext::user(cli.user.clone())
    };
    let today = chrono::Local::now().date_naive();

    match cli.command {
        Commands::Gun { command } => cmd_gun(&store, &user, today, command),
        Commands::Ammo { command } => cmd_ammo(&store, &user, command),
        Commands::Session { command } => cmd_session(&store, &config, &user, command),
        Commands::Maintenance { command } => {
            cmd_maintenance(&store, &config, &user, today, command)
        }
        Commands::Rank => cmd_rank(&store, &user),
        Commands::Summary => cmd_summary(&store, &user),
        Commands::Export { out } => cmd_export(&store, &user, &out),
    }
}

fn cmd_gun(
    store: &JsonStore,
    user: &UserContext,
    today: chrono::NaiveDate,
    command: GunCommands,
) -> Result<()> {
    match command {
        GunCommands::Add { name, caliber } => {
            let mut db = store.snapshot()?;
            let gun = Firearm {
                id: Uuid::new_v4(),
                user_id: user.user_id.clone(),
                name,
                caliber,
                created_at: today,
            };
            db.guns.push(gun.clone());
            store.commit(db)?;
            println!("✓ Registered firearm \"{}\" ({})", gun.name, gun.id);
        }
        GunCommands::List => {
            let db = store.snapshot()?;
            for gun in db.guns.iter().filter(|g| user.can_see(&g.user_id)) {
                println!(
                    "{}  {}  [{}]",
                    gun.id,
                    gun.name,
                    gun.caliber.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

fn cmd_ammo(store: &JsonStore, user: &UserContext, command: AmmoCommands) -> Result<()> {
    match command {
        AmmoCommands::Add {
            name,
            caliber,
            price,
            units,
        } => {
            if price <= 0.0 {
                return Err(Error::BadRequest("price must be positive".into()));
            }
            if units.map_or(false, |u| u < 0) {
                return Err(Error::BadRequest("units cannot be negative".into()));
            }
            let mut db = store.snapshot()?;
            let ammo = Ammo {
                id: Uuid::new_v4(),
                user_id: user.user_id.clone(),
                name,
                caliber,
                price_per_unit: price,
                units_in_package: units,
            };
            db.ammo.push(ammo.clone());
            store.commit(db)?;
            println!("✓ Registered ammunition \"{}\" ({})", ammo.name, ammo.id);
        }
        AmmoCommands::List => {
            let db = store.snapshot()?;
            for ammo in db.ammo.iter().filter(|a| user.can_see(&a.user_id)) {
                let units = ammo
                    .units_in_package
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "?".into());
                println!(
                    "{}  {}  [{}]  {:.2}/rd  {} rounds left",
                    ammo.id,
                    ammo.name,
                    ammo.caliber.as_deref().unwrap_or("-"),
                    ammo.price_per_unit,
                    units
                );
            }
        }
    }
    Ok(())
}

fn cmd_session(
    store: &JsonStore,
    config: &Config,
    user: &UserContext,
    command: SessionCommands,
) -> Result<()> {
    let ledger = SessionLedger::with_default_hooks(store, config.calibers.matcher());

    match command {
        SessionCommands::Add {
            gun,
            ammo,
            shots,
            date,
            distance,
            hits,
            group,
            cost,
            notes,
        } => {
            let draft = SessionDraft {
                gun_id: gun,
                ammo_id: ammo,
                date: date.as_deref().map(metrics::parse_date).transpose()?,
                shots,
                cost,
                notes,
                distance_m: distance,
                hits,
                group_cm: group,
            };
            let outcome = ledger.create_session(user, draft)?;
            println!("✓ Session logged ({})", outcome.session.id);
            print_session(&outcome.session);
            if let Some(remaining) = outcome.remaining_ammo {
                println!("  Remaining ammo: {}", remaining);
            }
        }
        SessionCommands::Update {
            id,
            gun,
            ammo,
            shots,
            date,
            distance,
            clear_distance,
            hits,
            clear_hits,
            group,
            clear_group,
            cost,
            notes,
            clear_notes,
        } => {
            let patch = SessionPatch {
                gun_id: gun,
                ammo_id: ammo,
                date: date.as_deref().map(metrics::parse_date).transpose()?,
                shots,
                cost,
                notes: patch_from(notes, clear_notes),
                distance_m: patch_from(distance, clear_distance),
                hits: patch_from(hits, clear_hits),
                group_cm: patch_from(group, clear_group),
            };
            let outcome = ledger.update_session(user, id, patch)?;
            println!("✓ Session updated ({})", outcome.session.id);
            print_session(&outcome.session);
            if let Some(remaining) = outcome.remaining_ammo {
                println!("  Remaining ammo: {}", remaining);
            }
        }
        SessionCommands::Delete { id } => {
            ledger.delete_session(user, id)?;
            println!("✓ Session deleted ({})", id);
        }
        SessionCommands::List => {
            let db = store.snapshot()?;
            let mut sessions: Vec<_> = db
                .sessions
                .iter()
                .filter(|s| user.can_see(&s.user_id))
                .collect();
            sessions.sort_by(|a, b| b.date.cmp(&a.date));
            for session in sessions {
                let accuracy = session
                    .accuracy_percent
                    .map(|a| format!("{:.1}%", a))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{}  {}  {} shots  accuracy {}",
                    session.id, session.date, session.shots, accuracy
                );
            }
        }
    }
    Ok(())
}

fn cmd_maintenance(
    store: &JsonStore,
    config: &Config,
    user: &UserContext,
    today: chrono::NaiveDate,
    command: MaintenanceCommands,
) -> Result<()> {
    let service = MaintenanceService::new(store, config.maintenance.clone());

    match command {
        MaintenanceCommands::Add {
            gun,
            date,
            notes,
            activities,
            rounds,
        } => {
            let draft = MaintenanceDraft {
                date: date.as_deref().map(metrics::parse_date).transpose()?,
                notes,
                activities,
                rounds_since_last: rounds,
            };
            let record = service.create(user, gun, draft, today)?;
            println!(
                "✓ Maintenance recorded ({}) — {} rounds since previous",
                record.id, record.rounds_since_last
            );
        }
        MaintenanceCommands::List { gun } => {
            for record in service.list(user, gun)? {
                println!(
                    "{}  {}  {} rounds  {}",
                    record.id,
                    record.date,
                    record.rounds_since_last,
                    record.notes.as_deref().unwrap_or("-")
                );
            }
        }
        MaintenanceCommands::Status { gun } => {
            let report = service.status(user, gun, today)?;
            println!("Status: {:?}", report.status);
            println!("  Rounds since last service: {}", report.rounds_since_last);
            println!("  Days since last service: {}", report.days_since_last);
        }
        MaintenanceCommands::Rebuild { gun } => {
            service.rebuild(user, gun)?;
            println!("✓ Maintenance history recomputed");
        }
    }
    Ok(())
}

fn cmd_rank(store: &JsonStore, user: &UserContext) -> Result<()> {
    let service = RankService::new(store);
    let info = service.rank_info(&user.user_id)?;

    println!("Rank: {}", info.rank);
    println!("  Passed sessions: {}", info.passed_sessions);
    if info.is_max_rank {
        println!("  Top of the ladder reached");
    } else if let Some(next) = &info.next_rank {
        println!(
            "  Progress: {:.0}% — {} more passed sessions to \"{}\"",
            info.progress_percent, info.sessions_to_next_rank, next
        );
    }
    Ok(())
}

fn cmd_summary(store: &JsonStore, user: &UserContext) -> Result<()> {
    let db = store.snapshot()?;
    let sessions: Vec<_> = db
        .sessions
        .iter()
        .filter(|s| user.can_see(&s.user_id))
        .collect();
    for month in monthly_summary(sessions.into_iter()) {
        println!(
            "{}  {:>10.2}  {:>6} shots",
            month.month, month.total_cost, month.total_shots
        );
    }
    Ok(())
}

fn cmd_export(store: &JsonStore, user: &UserContext, out: &std::path::Path) -> Result<()> {
    let db = store.snapshot()?;
    let count = export_sessions(&db, user, out)?;
    println!("✓ Exported {} sessions to {}", count, out.display());
    Ok(())
}

fn print_session(session: &ShootingSession) {
    println!("  Date: {}", session.date);
    println!("  Shots: {}", session.shots);
    if let Some(cost) = session.cost {
        println!("  Cost: {:.2}", cost);
    }
    if let Some(accuracy) = session.accuracy_percent {
        println!("  Accuracy: {:.2}%", accuracy);
    }
    if let Some(score) = session.final_score {
        println!("  Final score: {:.2}", score);
    }
}

/// Combine a set-option and a clear-flag into a three-state patch field
fn patch_from<T>(value: Option<T>, clear: bool) -> Patch<T> {
    match (value, clear) {
        (Some(v), _) => Patch::Set(v),
        (None, true) => Patch::Clear,
        (None, false) => Patch::Omit,
    }
}
