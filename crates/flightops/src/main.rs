//! `fltops` - CLI for flightops
//!
//! Opens the configured database and runs one audited operation or report
//! per invocation.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;

use flightops::cli::{
    AlertsCommand, AuditCommand, Cli, Command, ConfigCommand, FlightCommand, FleetCommand,
    MaintenanceCommand, TelemetryCommand,
};
use flightops::dashboard;
use flightops::model::{
    Account, FlightDraft, FlightPatch, MaintenancePatch, NewAircraft, NewBase, NewCrew,
    NewMaintenanceRecord, NewPilot, NewTelemetrySample, Role,
};
use flightops::notify::BroadcastNotifier;
use flightops::ops::{Caller, Operations};
use flightops::{init_logging, Config, Storage};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    if let Command::Config(config_cmd) = cli.command {
        return handle_config(&config, config_cmd);
    }

    let mut ops = open(&config)?;
    let actor = resolve_actor(&ops, cli.actor.as_deref())?;
    let caller = Caller::new(actor.as_ref(), cli.origin.as_deref());

    match cli.command {
        Command::Fleet(cmd) => handle_fleet(&mut ops, caller, cmd),
        Command::Maintenance(cmd) => handle_maintenance(&mut ops, caller, cmd),
        Command::Alerts(cmd) => handle_alerts(&ops, cmd),
        Command::Flight(cmd) => handle_flight(&mut ops, caller, cmd),
        Command::Telemetry(cmd) => handle_telemetry(&mut ops, caller, cmd),
        Command::Audit(cmd) => handle_audit(&ops, caller, cmd),
        Command::Dashboard(args) => handle_dashboard(&ops, &config, args.json),
        Command::Status(args) => handle_status(&ops, args.json),
        Command::Config(_) => Ok(()),
    }
}

fn open(config: &Config) -> Result<Operations> {
    let path = config.database_path();
    let storage = Storage::open_with_timeout(&path, config.busy_timeout())
        .with_context(|| format!("opening {}", path.display()))?;
    let notifier = Arc::new(BroadcastNotifier::new(config.notify.channel_capacity));
    Ok(Operations::new(storage, notifier).with_recipient_role(config.alerts.recipient_role.clone()))
}

fn resolve_actor(ops: &Operations, username: Option<&str>) -> Result<Option<Account>> {
    let Some(username) = username else {
        return Ok(None);
    };
    match ops.storage().account_by_username(username)? {
        Some(account) => Ok(Some(account)),
        None => bail!("no account named {username:?}"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_fleet(ops: &mut Operations, caller: Caller<'_>, cmd: FleetCommand) -> Result<()> {
    match cmd {
        FleetCommand::AddBase { name, location } => {
            let base = ops.add_base(caller, &NewBase { name, location })?;
            println!("Base #{} {}", base.id, base.name);
        }
        FleetCommand::AddAircraft {
            tail_number,
            model,
            base,
            aircraft_type,
            threshold,
        } => {
            let mut new = NewAircraft::new(tail_number, model, base).with_threshold(threshold);
            new.aircraft_type = aircraft_type;
            let aircraft = ops.add_aircraft(caller, &new)?;
            println!(
                "Aircraft #{} {} (maintenance at {} h)",
                aircraft.id, aircraft.tail_number, aircraft.maintenance_threshold_hours
            );
        }
        FleetCommand::SetStatus { aircraft, status } => {
            let aircraft = ops.set_aircraft_status(caller, aircraft, status.into())?;
            println!("{} is {}", aircraft.tail_number, aircraft.status);
        }
        FleetCommand::AddPilot {
            name,
            rank,
            contact,
        } => {
            let pilot = ops.add_pilot(
                caller,
                &NewPilot {
                    full_name: name,
                    rank,
                    contact_info: contact,
                },
            )?;
            println!("Pilot #{} {}", pilot.id, pilot.full_name);
        }
        FleetCommand::AddCrew { name, rank, role } => {
            let crew = ops.add_crew(
                caller,
                &NewCrew {
                    full_name: name,
                    rank,
                    role,
                },
            )?;
            println!("Crew #{} {}", crew.id, crew.full_name);
        }
        FleetCommand::AddAccount { username, role } => {
            let account = ops.add_account(caller, &username, role.into())?;
            println!("Account #{} {} ({})", account.id, account.username, account.role);
        }
        FleetCommand::SetRole { username, role } => {
            let Some(account) = ops.storage().account_by_username(&username)? else {
                bail!("no account named {username:?}");
            };
            let account = ops.change_role(caller, account.id, role.into())?;
            println!("{} is now {}", account.username, account.role);
        }
        FleetCommand::List { json } => {
            let storage = ops.storage();
            let bases = storage.bases()?;
            let aircraft = storage.fleet()?;
            let pilots = storage.pilots()?;
            let crew = storage.crew()?;
            if json {
                return print_json(&serde_json::json!({
                    "bases": bases,
                    "aircraft": aircraft,
                    "pilots": pilots,
                    "crew": crew,
                }));
            }
            println!("Bases");
            for base in &bases {
                println!("  #{:<4} {:<20} {}", base.id, base.name, base.location);
            }
            println!("Aircraft");
            for a in &aircraft {
                println!(
                    "  #{:<4} {:<12} {:<12} {:<15} threshold {} h",
                    a.id, a.tail_number, a.model, a.status, a.maintenance_threshold_hours
                );
            }
            println!("Pilots");
            for p in &pilots {
                println!("  #{:<4} {} {}", p.id, p.rank, p.full_name);
            }
            println!("Crew");
            for c in &crew {
                let availability = if c.is_available { "available" } else { "unavailable" };
                println!("  #{:<4} {} {} ({}, {availability})", c.id, c.rank, c.full_name, c.role);
            }
        }
    }
    Ok(())
}

fn handle_maintenance(
    ops: &mut Operations,
    caller: Caller<'_>,
    cmd: MaintenanceCommand,
) -> Result<()> {
    match cmd {
        MaintenanceCommand::Log {
            aircraft,
            hours,
            service_date,
            components,
            notes,
        } => {
            let outcome = ops.log_maintenance(
                caller,
                &NewMaintenanceRecord {
                    aircraft_id: aircraft,
                    total_flight_hours: hours,
                    last_service_date: service_date,
                    component_status: components,
                    notes,
                },
            )?;
            println!("Maintenance log #{}", outcome.record.id);
            print_alert_outcome(outcome.alert);
        }
        MaintenanceCommand::Update {
            id,
            aircraft,
            hours,
            service_date,
            components,
            notes,
        } => {
            let outcome = ops.update_maintenance(
                caller,
                id,
                &MaintenancePatch {
                    aircraft_id: aircraft,
                    total_flight_hours: hours,
                    last_service_date: service_date,
                    component_status: components,
                    notes,
                },
            )?;
            println!(
                "Maintenance log #{} now at {} h",
                outcome.record.id, outcome.record.total_flight_hours
            );
            print_alert_outcome(outcome.alert);
        }
        MaintenanceCommand::Delete { id } => {
            ops.delete_maintenance(caller, id)?;
            println!("Deleted maintenance log #{id}");
        }
        MaintenanceCommand::List {
            aircraft,
            limit,
            json,
        } => {
            let records = ops.storage().maintenance_records(aircraft, limit)?;
            if json {
                return print_json(&records);
            }
            for r in &records {
                println!(
                    "#{:<5} aircraft #{:<4} {:>8} h  serviced {}  {}",
                    r.id, r.aircraft_id, r.total_flight_hours, r.last_service_date, r.component_status
                );
            }
        }
    }
    Ok(())
}

fn print_alert_outcome(outcome: flightops::alerts::AlertOutcome) {
    use flightops::alerts::AlertOutcome;

    match outcome {
        AlertOutcome::Opened { alert_id } => println!("Threshold reached: opened alert #{alert_id}"),
        AlertOutcome::Reopened { alert_id } => {
            println!("Threshold reached: reopened alert #{alert_id}");
        }
        AlertOutcome::Refreshed { alert_id } => println!("Alert #{alert_id} still open"),
        AlertOutcome::Resolved { alert_id } => println!("Alert #{alert_id} resolved"),
        AlertOutcome::Unchanged => {}
    }
}

fn handle_alerts(ops: &Operations, cmd: AlertsCommand) -> Result<()> {
    let AlertsCommand::List { all, role, json } = cmd;
    let alerts = ops.storage().alerts(!all, role.as_deref())?;
    if json {
        return print_json(&alerts);
    }
    if alerts.is_empty() {
        println!("No alerts.");
    }
    for alert in &alerts {
        let state = if alert.is_resolved { "resolved" } else { "OPEN" };
        println!(
            "#{:<5} [{:<8}] {:<6} -> {}: {}",
            alert.id, state, alert.severity, alert.recipient_role, alert.message
        );
    }
    Ok(())
}

fn handle_flight(ops: &mut Operations, caller: Caller<'_>, cmd: FlightCommand) -> Result<()> {
    match cmd {
        FlightCommand::Log(args) => {
            let draft = FlightDraft {
                aircraft_id: args.aircraft,
                pilot_id: args.pilot,
                crew_ids: args.crew,
                mission_type: args.mission,
                departed_at: None,
                atd: Some(args.atd),
                eta: Some(args.eta),
                ata: args.ata,
                flight_hours: args.hours,
                fuel_used: args.fuel,
                departure_base_id: args.from,
                arrival_base_id: args.to,
                remarks: args.remarks,
            };
            let outcome = ops.log_flight(caller, &draft)?;
            println!(
                "Flight #{} ({}) flown by {}",
                outcome.flight.id, outcome.flight.mission_status, outcome.flight.pilot_name
            );
        }
        FlightCommand::Arrive { id, at, clear } => {
            let patch = if clear {
                FlightPatch::clear_arrival()
            } else {
                FlightPatch::arrival(at.unwrap_or_else(Utc::now))
            };
            let outcome = ops.update_flight(caller, id, &patch)?;
            println!("Flight #{} is {}", id, outcome.flight.mission_status);
        }
        FlightCommand::Delete { id } => {
            ops.delete_flight(caller, id)?;
            println!("Deleted flight #{id}");
        }
        FlightCommand::List { limit, json } => {
            let flights = ops.storage().recent_flights(limit)?;
            if json {
                return print_json(&flights);
            }
            for f in &flights {
                println!(
                    "#{:<5} aircraft #{:<4} {:<10} {}  {:>5} h  {}",
                    f.id,
                    f.aircraft_id,
                    f.mission_status,
                    f.atd.format("%Y-%m-%d %H:%M"),
                    f.flight_hours,
                    f.pilot_name
                );
            }
        }
    }
    Ok(())
}

fn handle_telemetry(
    ops: &mut Operations,
    caller: Caller<'_>,
    cmd: TelemetryCommand,
) -> Result<()> {
    match cmd {
        TelemetryCommand::Record {
            flight,
            at,
            altitude,
            speed,
            engine_temp,
            fuel_level,
            heading,
        } => {
            let sample = ops.record_telemetry(
                caller,
                &NewTelemetrySample {
                    flight_id: flight,
                    recorded_at: at.unwrap_or_else(Utc::now),
                    altitude,
                    speed,
                    engine_temp,
                    fuel_level,
                    heading,
                },
            )?;
            println!("Sample #{} for flight #{}", sample.id, sample.flight_id);
        }
        TelemetryCommand::List {
            flight,
            limit,
            json,
        } => {
            let samples = ops.storage().telemetry_for(flight, limit)?;
            if json {
                return print_json(&samples);
            }
            for s in &samples {
                println!(
                    "{}  alt {:>7} ft  spd {:>5} kt  hdg {:>3}",
                    s.recorded_at.format("%H:%M:%S"),
                    s.altitude,
                    s.speed,
                    s.heading
                );
            }
        }
    }
    Ok(())
}

fn handle_audit(ops: &Operations, caller: Caller<'_>, cmd: AuditCommand) -> Result<()> {
    caller.authorize(Role::can_read_audit, "read the audit trail")?;
    match cmd {
        AuditCommand::List {
            user,
            entity,
            id,
            limit,
            json,
        } => {
            let storage = ops.storage();
            let entries = match (user, entity, id) {
                (Some(username), _, _) => {
                    let Some(account) = storage.account_by_username(&username)? else {
                        bail!("no account named {username:?}");
                    };
                    storage.audit_entries_by_actor(account.id, limit)?
                }
                (None, Some(entity), Some(id)) => storage.audit_entries_for(&entity, id)?,
                _ => storage.audit_entries(limit)?,
            };
            if json {
                return print_json(&entries);
            }
            for e in &entries {
                let actor = e
                    .actor_id
                    .map_or_else(|| "system".to_string(), |id| format!("user #{id}"));
                println!(
                    "#{:<6} {}  {:<11} {:<10} {}",
                    e.id,
                    e.created_at.format("%Y-%m-%d %H:%M:%S"),
                    e.action,
                    actor,
                    e.description
                );
            }
        }
        AuditCommand::Verify { json } => {
            let report = ops.verify_ledger()?;
            if json {
                print_json(&report)?;
            } else {
                println!("Entries checked: {}", report.entries_checked);
                println!("Head:            {}", report.head);
                for violation in &report.violations {
                    println!("  {violation}");
                }
            }
            report.into_result()?;
            if !json {
                println!("Ledger intact.");
            }
        }
    }
    Ok(())
}

fn handle_dashboard(ops: &Operations, config: &Config, json: bool) -> Result<()> {
    let settings = config.dashboard_settings()?;
    let metrics = dashboard::collect(ops.storage(), Utc::now(), &settings)?;
    if json {
        return print_json(&metrics);
    }

    println!("Operations dashboard ({})", metrics.last_updated.format("%Y-%m-%d %H:%M UTC"));
    println!("-----------------------------------------");
    println!("Aircraft available:  {}", metrics.aircraft_available);
    println!("Crew available:      {}", metrics.crew_availability);
    println!("Flights today:       {}", metrics.flights_today);
    println!("Active missions:     {}", metrics.active_missions);
    println!("On-time rate:        {}%", metrics.on_time_departure_rate);
    println!("Delayed / cancelled: {} / {}", metrics.delayed_arrivals, metrics.cancelled_flights);
    println!("Open alerts:         {}", metrics.maintenance_alerts);
    let feed = &metrics.live_feed;
    println!(
        "Live feed:           {} {} kt M{} at {}",
        feed.flight_level, feed.speed_knots, feed.mach, feed.updated_time
    );
    if !metrics.aircraft_utilization.is_empty() {
        println!("Utilization:");
        for u in &metrics.aircraft_utilization {
            println!("  {:<12} {} h", u.aircraft, u.hours);
        }
    }
    Ok(())
}

fn handle_status(ops: &Operations, json: bool) -> Result<()> {
    let stats = ops.storage().stats()?;
    if json {
        let status = serde_json::json!({
            "database_path": ops.storage().path(),
            "stats": stats,
        });
        return print_json(&status);
    }
    println!("fltops status");
    println!("-------------");
    println!("Database:      {}", ops.storage().path().display());
    println!("Size:          {} bytes", stats.db_size_bytes);
    println!("Aircraft:      {}", stats.aircraft);
    println!("Flights:       {}", stats.flights);
    println!("Maintenance:   {}", stats.maintenance_records);
    println!("Open alerts:   {}", stats.open_alerts);
    println!("Audit entries: {}", stats.audit_entries);
    if let Some(at) = stats.last_audit_at {
        println!("Last change:   {}", at.to_rfc3339());
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                print_json(config)?;
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Busy timeout (ms):  {}", config.storage.busy_timeout_ms);
                println!();
                println!("[Alerts]");
                println!("  Recipient role:     {}", config.alerts.recipient_role);
                println!();
                println!("[Dashboard]");
                println!("  Delay patterns:     {:?}", config.dashboard.delay_patterns);
                println!("  Cancel patterns:    {:?}", config.dashboard.cancel_patterns);
                println!("  Utilization limit:  {}", config.dashboard.utilization_limit);
                println!("  Trend points:       {}", config.dashboard.trend_points);
                println!();
                println!("[Notify]");
                println!("  Channel capacity:   {}", config.notify.channel_capacity);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
