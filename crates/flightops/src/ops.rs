//! Audited write path.
//!
//! Every mutation first checks the caller's [`Role`] and returns
//! [`Error::Forbidden`] before touching the store. It then runs inside one
//! [`Storage::write`] transaction together with the ledger entry that
//! describes it, so either both land or neither does. Derived state (mission status, threshold alerts) is computed in the
//! same transaction. Notifications go out only after commit.

use chrono::Utc;
use tracing::info;

use crate::alerts::{evaluate, AlertOutcome, DEFAULT_RECIPIENT_ROLE};
use crate::error::{Error, Result, ValidationErrors};
use crate::ledger::{ActionKind, AuditEntry, ChainReport, NewAuditEntry};
use crate::mission::{derive, FlightFields};
use crate::model::{
    Account, Aircraft, AircraftStatus, Base, Crew, FlightDraft, FlightPatch, FlightRecord,
    MaintenancePatch, MaintenanceRecord, MissionStatus, NewAircraft, NewBase, NewCrew,
    NewMaintenanceRecord, NewPilot, NewTelemetrySample, Pilot, Role, TelemetrySample,
};
use crate::notify::{publish, Notification, SharedNotifier};
use crate::storage::{self, fleet, flights, maintenance, Storage};

/// Who is making a change and from where.
#[derive(Debug, Clone, Copy, Default)]
pub struct Caller<'a> {
    /// Signed-in account, `None` for system writes.
    pub actor: Option<&'a Account>,
    /// Client address, if known.
    pub origin: Option<&'a str>,
}

impl<'a> Caller<'a> {
    /// A change made by `actor` from `origin`.
    #[must_use]
    pub fn new(actor: Option<&'a Account>, origin: Option<&'a str>) -> Self {
        Self { actor, origin }
    }

    /// A change with no actor and no origin.
    #[must_use]
    pub fn system() -> Self {
        Self::default()
    }

    /// Check that the signed-in account's role passes `allowed`. Calls
    /// without an actor are system writes and always pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] naming `action` when the role is refused.
    pub fn authorize(&self, allowed: fn(Role) -> bool, action: &'static str) -> Result<()> {
        match self.actor {
            Some(account) if !allowed(account.role) => Err(Error::Forbidden {
                username: account.username.clone(),
                role: account.role,
                action,
            }),
            _ => Ok(()),
        }
    }

    fn actor_id(&self) -> Option<i64> {
        self.actor.map(|a| a.id)
    }

    fn stamp(&self, entry: NewAuditEntry) -> NewAuditEntry {
        entry.actor(self.actor_id()).origin(self.origin)
    }
}

/// A stored maintenance log and what the alert engine did about it.
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceOutcome {
    /// The log as stored.
    pub record: MaintenanceRecord,
    /// Effect on the log's alert.
    pub alert: AlertOutcome,
}

/// A stored flight and its derived status change.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightOutcome {
    /// The flight as stored.
    pub flight: FlightRecord,
    /// Status before the write, `None` on create.
    pub previous_status: Option<MissionStatus>,
}

impl FlightOutcome {
    /// Whether the write moved the flight to a different status.
    #[must_use]
    pub fn status_changed(&self) -> bool {
        self.previous_status
            .is_some_and(|previous| previous != self.flight.mission_status)
    }
}

/// The audited operations over one store.
#[derive(Debug)]
pub struct Operations {
    storage: Storage,
    notifier: SharedNotifier,
    recipient_role: String,
}

impl Operations {
    /// Wrap `storage`, publishing to `notifier`.
    #[must_use]
    pub fn new(storage: Storage, notifier: SharedNotifier) -> Self {
        Self {
            storage,
            notifier,
            recipient_role: DEFAULT_RECIPIENT_ROLE.to_string(),
        }
    }

    /// Route threshold alerts to `role`.
    #[must_use]
    pub fn with_recipient_role(mut self, role: impl Into<String>) -> Self {
        self.recipient_role = role.into();
        self
    }

    /// Read access to the store.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Replay the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn verify_ledger(&self) -> Result<ChainReport> {
        self.storage.verify_ledger()
    }

    fn notify(&self, notification: &Notification) {
        publish(self.notifier.as_ref(), notification);
    }

    // === Ledger ===

    /// Append an arbitrary entry on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails.
    pub fn record(&mut self, caller: Caller<'_>, entry: NewAuditEntry) -> Result<AuditEntry> {
        let entry = caller.stamp(entry);
        let now = Utc::now();
        self.storage
            .write(|tx| storage::ledger::append(tx, &entry, now))
    }

    /// Record a sign-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails.
    pub fn record_login(&mut self, caller: Caller<'_>) -> Result<AuditEntry> {
        let entry = session_entry(ActionKind::Login, caller, "User logged in");
        self.record(caller, entry)
    }

    /// Record a sign-out.
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails.
    pub fn record_logout(&mut self, caller: Caller<'_>) -> Result<AuditEntry> {
        let entry = session_entry(ActionKind::Logout, caller, "User logged out");
        self.record(caller, entry)
    }

    /// Record that `caller` looked at a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails.
    pub fn record_view(
        &mut self,
        caller: Caller<'_>,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<AuditEntry> {
        let entry = NewAuditEntry::new(ActionKind::View, entity_type)
            .entity(entity_id)
            .describe(format!("Viewed {entity_type} #{entity_id}"));
        self.record(caller, entry)
    }

    // === Fleet ===

    /// Register a base.
    ///
    /// # Errors
    ///
    /// Returns a conflict if the name is taken.
    pub fn add_base(&mut self, caller: Caller<'_>, base: &NewBase) -> Result<Base> {
        caller.authorize(Role::can_manage_fleet, "manage the fleet")?;
        let now = Utc::now();
        let stored = self.storage.write(|tx| {
            let id = fleet::insert_base(tx, base)?;
            storage::ledger::append(tx, &caller.stamp(NewAuditEntry::created("Base", id)), now)?;
            Ok(Base {
                id,
                name: base.name.clone(),
                location: base.location.clone(),
            })
        })?;
        info!("Added base {} ({})", stored.name, stored.id);
        self.notify(&Notification::dashboard_refresh());
        Ok(stored)
    }

    /// Remove a base no aircraft or flight references.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id and [`Error::Protected`]
    /// while the base is referenced.
    pub fn delete_base(&mut self, caller: Caller<'_>, id: i64) -> Result<()> {
        caller.authorize(Role::can_manage_fleet, "manage the fleet")?;
        let now = Utc::now();
        self.storage.write(|tx| {
            if !fleet::delete_base(tx, id)? {
                return Err(Error::not_found("Base", id));
            }
            storage::ledger::append(tx, &caller.stamp(NewAuditEntry::deleted("Base", id)), now)?;
            Ok(())
        })?;
        info!("Deleted base {}", id);
        self.notify(&Notification::dashboard_refresh());
        Ok(())
    }

    /// Register an aircraft. The tail number is trimmed and upper-cased
    /// before it is checked or stored.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty tail number or a threshold
    /// under one hour, [`Error::NotFound`] for an unknown home base, and a
    /// conflict for a tail number already taken in any letter case.
    pub fn add_aircraft(&mut self, caller: Caller<'_>, aircraft: &NewAircraft) -> Result<Aircraft> {
        caller.authorize(Role::can_manage_fleet, "manage the fleet")?;
        let aircraft = &aircraft.normalized();
        let mut errors = ValidationErrors::new();
        if aircraft.tail_number.is_empty() {
            errors.add("tail_number", "This field may not be blank.");
        }
        if aircraft.maintenance_threshold_hours.is_nan() || aircraft.maintenance_threshold_hours < 1.0
        {
            errors.add(
                "maintenance_threshold_hours",
                "Ensure this value is greater than or equal to 1.",
            );
        }
        errors.finish()?;

        let now = Utc::now();
        let stored = self.storage.write(|tx| {
            if fleet::get_base(tx, aircraft.home_base_id)?.is_none() {
                return Err(Error::not_found("Base", aircraft.home_base_id));
            }
            let id = fleet::insert_aircraft(tx, aircraft)?;
            let entry = NewAuditEntry::new(ActionKind::Create, "Aircraft")
                .entity(id)
                .describe(format!(
                    "Registered aircraft {} ({})",
                    aircraft.tail_number, aircraft.model
                ));
            storage::ledger::append(tx, &caller.stamp(entry), now)?;
            fleet::get_aircraft(tx, id)?
                .ok_or_else(|| Error::internal("inserted aircraft vanished"))
        })?;
        info!("Registered aircraft {}", stored.tail_number);
        self.notify(&Notification::dashboard_refresh());
        Ok(stored)
    }

    /// Move an aircraft to `status`. A no-op write still leaves an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown aircraft.
    pub fn set_aircraft_status(
        &mut self,
        caller: Caller<'_>,
        id: i64,
        status: AircraftStatus,
    ) -> Result<Aircraft> {
        caller.authorize(Role::can_manage_fleet, "manage the fleet")?;
        let now = Utc::now();
        let updated = self.storage.write(|tx| {
            let current = fleet::get_aircraft(tx, id)?.ok_or(Error::not_found("Aircraft", id))?;
            fleet::set_aircraft_status(tx, id, status)?;
            let description = if current.status == status {
                format!("Updated aircraft {}", current.tail_number)
            } else {
                format!("Changed status from {} to {}", current.status, status)
            };
            let entry = NewAuditEntry::new(ActionKind::Update, "Aircraft")
                .entity(id)
                .describe(description);
            storage::ledger::append(tx, &caller.stamp(entry), now)?;
            Ok(Aircraft { status, ..current })
        })?;
        info!("Aircraft {} is now {}", updated.tail_number, updated.status);
        self.notify(&Notification::dashboard_refresh());
        Ok(updated)
    }

    /// Remove an aircraft with its flights, logs, and alerts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown aircraft.
    pub fn delete_aircraft(&mut self, caller: Caller<'_>, id: i64) -> Result<()> {
        caller.authorize(Role::can_manage_fleet, "manage the fleet")?;
        let now = Utc::now();
        self.storage.write(|tx| {
            if !fleet::delete_aircraft(tx, id)? {
                return Err(Error::not_found("Aircraft", id));
            }
            storage::ledger::append(
                tx,
                &caller.stamp(NewAuditEntry::deleted("Aircraft", id)),
                now,
            )?;
            Ok(())
        })?;
        info!("Deleted aircraft {}", id);
        self.notify(&Notification::dashboard_refresh());
        Ok(())
    }

    /// Register a pilot.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name.
    pub fn add_pilot(&mut self, caller: Caller<'_>, pilot: &NewPilot) -> Result<Pilot> {
        caller.authorize(Role::can_manage_fleet, "manage the fleet")?;
        if pilot.full_name.trim().is_empty() {
            return Err(Error::invalid("full_name", "This field may not be blank."));
        }
        let now = Utc::now();
        let stored = self.storage.write(|tx| {
            let id = fleet::insert_pilot(tx, pilot)?;
            storage::ledger::append(tx, &caller.stamp(NewAuditEntry::created("Pilot", id)), now)?;
            Ok(Pilot {
                id,
                full_name: pilot.full_name.clone(),
                rank: pilot.rank.clone(),
                contact_info: pilot.contact_info.clone(),
                is_active: true,
            })
        })?;
        info!("Added pilot {}", stored.full_name);
        Ok(stored)
    }

    /// Rename a pilot. Flights keep the name captured when they were written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown pilot.
    pub fn rename_pilot(&mut self, caller: Caller<'_>, id: i64, full_name: &str) -> Result<()> {
        caller.authorize(Role::can_manage_fleet, "manage the fleet")?;
        let now = Utc::now();
        self.storage.write(|tx| {
            if !fleet::rename_pilot(tx, id, full_name)? {
                return Err(Error::not_found("Pilot", id));
            }
            storage::ledger::append(tx, &caller.stamp(NewAuditEntry::updated("Pilot", id)), now)?;
            Ok(())
        })
    }

    /// Register a crew member.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn add_crew(&mut self, caller: Caller<'_>, crew: &NewCrew) -> Result<Crew> {
        caller.authorize(Role::can_manage_fleet, "manage the fleet")?;
        let now = Utc::now();
        let stored = self.storage.write(|tx| {
            let id = fleet::insert_crew(tx, crew)?;
            storage::ledger::append(tx, &caller.stamp(NewAuditEntry::created("Crew", id)), now)?;
            Ok(Crew {
                id,
                full_name: crew.full_name.clone(),
                rank: crew.rank.clone(),
                role: crew.role.clone(),
                is_available: true,
            })
        })?;
        info!("Added crew member {}", stored.full_name);
        self.notify(&Notification::dashboard_refresh());
        Ok(stored)
    }

    /// Mark a crew member available or not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown crew member.
    pub fn set_crew_available(&mut self, caller: Caller<'_>, id: i64, available: bool) -> Result<()> {
        caller.authorize(Role::can_manage_fleet, "manage the fleet")?;
        let now = Utc::now();
        self.storage.write(|tx| {
            if !fleet::set_crew_available(tx, id, available)? {
                return Err(Error::not_found("Crew", id));
            }
            storage::ledger::append(tx, &caller.stamp(NewAuditEntry::updated("Crew", id)), now)?;
            Ok(())
        })?;
        self.notify(&Notification::dashboard_refresh());
        Ok(())
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns a conflict if the username is taken.
    pub fn add_account(&mut self, caller: Caller<'_>, username: &str, role: Role) -> Result<Account> {
        caller.authorize(Role::can_manage_accounts, "manage accounts")?;
        if username.trim().is_empty() {
            return Err(Error::invalid("username", "This field may not be blank."));
        }
        let now = Utc::now();
        let account = self.storage.write(|tx| {
            let account = fleet::insert_account(tx, username, role)?;
            let entry = NewAuditEntry::new(ActionKind::Create, "User")
                .entity(account.id)
                .describe(format!("Created user {username} with role {role}"));
            storage::ledger::append(tx, &caller.stamp(entry), now)?;
            Ok(account)
        })?;
        info!("Created account {} ({})", account.username, account.role);
        Ok(account)
    }

    /// Change an account's role.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown account.
    pub fn change_role(&mut self, caller: Caller<'_>, account_id: i64, role: Role) -> Result<Account> {
        caller.authorize(Role::can_manage_accounts, "manage accounts")?;
        let now = Utc::now();
        let account = self.storage.write(|tx| {
            let current =
                fleet::get_account(tx, account_id)?.ok_or(Error::not_found("User", account_id))?;
            fleet::set_role(tx, account_id, role)?;
            let entry = NewAuditEntry::new(ActionKind::RoleChange, "User")
                .entity(account_id)
                .describe(format!(
                    "Role changed for {} from {} to {}",
                    current.username, current.role, role
                ));
            storage::ledger::append(tx, &caller.stamp(entry), now)?;
            Ok(Account { role, ..current })
        })?;
        info!("Account {} now has role {}", account.username, account.role);
        Ok(account)
    }

    // === Maintenance ===

    /// Log maintenance and run the threshold check.
    ///
    /// # Errors
    ///
    /// Returns a validation error for negative hours and
    /// [`Error::NotFound`] for an unknown aircraft.
    pub fn log_maintenance(
        &mut self,
        caller: Caller<'_>,
        record: &NewMaintenanceRecord,
    ) -> Result<MaintenanceOutcome> {
        caller.authorize(Role::can_log_maintenance, "log maintenance")?;
        record.validate()?;
        let role = self.recipient_role.as_str();
        let now = Utc::now();

        let outcome = self.storage.write(|tx| {
            let aircraft = fleet::get_aircraft(tx, record.aircraft_id)?
                .ok_or(Error::not_found("Aircraft", record.aircraft_id))?;
            let stored = maintenance::insert_record(tx, record, caller.actor_id(), now)?;
            storage::ledger::append(
                tx,
                &caller.stamp(NewAuditEntry::created("MaintenanceLog", stored.id)),
                now,
            )?;
            let alert = check_threshold(tx, &aircraft, &stored, role, now)?;
            Ok(MaintenanceOutcome {
                record: stored,
                alert,
            })
        })?;

        info!(
            "Logged maintenance {} ({} h) for aircraft {}",
            outcome.record.id, outcome.record.total_flight_hours, outcome.record.aircraft_id
        );
        self.notify(&Notification::maintenance_log_created(outcome.record.id));
        self.notify_alert(outcome.alert);
        Ok(outcome)
    }

    /// Patch a maintenance log and rerun the threshold check. A log moved to
    /// another aircraft takes its alert along and is checked against the new
    /// aircraft's threshold.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown log or aircraft and a
    /// validation error for negative hours.
    pub fn update_maintenance(
        &mut self,
        caller: Caller<'_>,
        id: i64,
        patch: &MaintenancePatch,
    ) -> Result<MaintenanceOutcome> {
        caller.authorize(Role::can_log_maintenance, "log maintenance")?;
        let role = self.recipient_role.as_str();
        let now = Utc::now();

        let outcome = self.storage.write(|tx| {
            let current =
                maintenance::get_record(tx, id)?.ok_or(Error::not_found("MaintenanceLog", id))?;
            let merged = patch.apply(&current)?;
            let aircraft = fleet::get_aircraft(tx, merged.aircraft_id)?
                .ok_or(Error::not_found("Aircraft", merged.aircraft_id))?;
            maintenance::update_record(tx, &merged)?;
            if merged.aircraft_id != current.aircraft_id {
                maintenance::move_alerts(tx, id, merged.aircraft_id)?;
            }
            storage::ledger::append(
                tx,
                &caller.stamp(NewAuditEntry::updated("MaintenanceLog", id)),
                now,
            )?;
            let alert = check_threshold(tx, &aircraft, &merged, role, now)?;
            Ok(MaintenanceOutcome {
                record: merged,
                alert,
            })
        })?;

        info!("Updated maintenance {}", id);
        self.notify_alert(outcome.alert);
        self.notify(&Notification::dashboard_refresh());
        Ok(outcome)
    }

    /// Delete a maintenance log with its alerts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown log.
    pub fn delete_maintenance(&mut self, caller: Caller<'_>, id: i64) -> Result<()> {
        caller.authorize(Role::can_log_maintenance, "log maintenance")?;
        let now = Utc::now();
        self.storage.write(|tx| {
            if !maintenance::delete_record(tx, id)? {
                return Err(Error::not_found("MaintenanceLog", id));
            }
            storage::ledger::append(
                tx,
                &caller.stamp(NewAuditEntry::deleted("MaintenanceLog", id)),
                now,
            )?;
            Ok(())
        })?;
        info!("Deleted maintenance {}", id);
        self.notify(&Notification::dashboard_refresh());
        Ok(())
    }

    fn notify_alert(&self, outcome: AlertOutcome) {
        if let AlertOutcome::Opened { alert_id } = outcome {
            self.notify(&Notification::maintenance_alert(alert_id));
        }
    }

    // === Flights ===

    /// Log a flight, deriving its status and pilot snapshot.
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every failed rule and
    /// [`Error::NotFound`] for an unknown aircraft, base, pilot, or crew
    /// member.
    pub fn log_flight(&mut self, caller: Caller<'_>, draft: &FlightDraft) -> Result<FlightOutcome> {
        caller.authorize(Role::can_log_flights, "log flights")?;
        let now = Utc::now();
        let outcome = self.storage.write(|tx| {
            let fields = FlightFields::from_draft(draft);
            check_references(tx, &fields)?;
            let pilot = lookup_pilot(tx, fields.pilot_id)?;
            let resolved = derive(fields, pilot.as_ref(), "")?;
            let flight = flights::insert_flight(tx, &resolved, caller.actor_id(), now)?;
            storage::ledger::append(
                tx,
                &caller.stamp(NewAuditEntry::created("FlightLog", flight.id)),
                now,
            )?;
            Ok(FlightOutcome {
                flight,
                previous_status: None,
            })
        })?;

        info!(
            "Logged flight {} ({})",
            outcome.flight.id, outcome.flight.mission_status
        );
        self.notify(&Notification::flight_log_created(outcome.flight.id));
        Ok(outcome)
    }

    /// Patch a flight and rederive its status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown flight or reference and a
    /// validation error listing every failed rule.
    pub fn update_flight(
        &mut self,
        caller: Caller<'_>,
        id: i64,
        patch: &FlightPatch,
    ) -> Result<FlightOutcome> {
        caller.authorize(Role::can_log_flights, "log flights")?;
        let now = Utc::now();
        let outcome = self.storage.write(|tx| {
            let current = flights::get_flight(tx, id)?.ok_or(Error::not_found("FlightLog", id))?;
            let fields = FlightFields::merge(&current, patch);
            check_references(tx, &fields)?;
            let pilot = lookup_pilot(tx, fields.pilot_id)?;
            let resolved = derive(fields, pilot.as_ref(), &current.pilot_name)?;
            let flight = flights::update_flight(tx, id, &resolved, now)?
                .ok_or(Error::not_found("FlightLog", id))?;
            storage::ledger::append(
                tx,
                &caller.stamp(NewAuditEntry::updated("FlightLog", id)),
                now,
            )?;
            Ok(FlightOutcome {
                flight,
                previous_status: Some(current.mission_status),
            })
        })?;

        if outcome.status_changed() {
            info!("Flight {} is now {}", id, outcome.flight.mission_status);
        }
        self.notify(&Notification::dashboard_refresh());
        Ok(outcome)
    }

    /// Delete a flight with its telemetry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown flight.
    pub fn delete_flight(&mut self, caller: Caller<'_>, id: i64) -> Result<()> {
        caller.authorize(Role::can_log_flights, "log flights")?;
        let now = Utc::now();
        self.storage.write(|tx| {
            if !flights::delete_flight(tx, id)? {
                return Err(Error::not_found("FlightLog", id));
            }
            storage::ledger::append(
                tx,
                &caller.stamp(NewAuditEntry::deleted("FlightLog", id)),
                now,
            )?;
            Ok(())
        })?;
        info!("Deleted flight {}", id);
        self.notify(&Notification::dashboard_refresh());
        Ok(())
    }

    // === Telemetry ===

    /// Record a telemetry sample.
    ///
    /// # Errors
    ///
    /// Returns a validation error for negative readings and
    /// [`Error::NotFound`] for an unknown flight.
    pub fn record_telemetry(
        &mut self,
        caller: Caller<'_>,
        sample: &NewTelemetrySample,
    ) -> Result<TelemetrySample> {
        caller.authorize(Role::can_log_flights, "log flights")?;
        sample.validate()?;
        let now = Utc::now();
        let stored = self.storage.write(|tx| {
            if flights::get_flight(tx, sample.flight_id)?.is_none() {
                return Err(Error::not_found("FlightLog", sample.flight_id));
            }
            let stored = flights::insert_telemetry(tx, sample, now)?;
            storage::ledger::append(
                tx,
                &caller.stamp(NewAuditEntry::created("FlightData", stored.id)),
                now,
            )?;
            Ok(stored)
        })?;
        self.notify(&Notification::flight_data_logged(stored.id));
        Ok(stored)
    }

    /// Overwrite a telemetry sample.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown sample.
    pub fn update_telemetry(
        &mut self,
        caller: Caller<'_>,
        id: i64,
        sample: &NewTelemetrySample,
    ) -> Result<()> {
        caller.authorize(Role::can_log_flights, "log flights")?;
        sample.validate()?;
        let now = Utc::now();
        self.storage.write(|tx| {
            if !flights::update_telemetry(tx, id, sample)? {
                return Err(Error::not_found("FlightData", id));
            }
            storage::ledger::append(
                tx,
                &caller.stamp(NewAuditEntry::updated("FlightData", id)),
                now,
            )?;
            Ok(())
        })?;
        self.notify(&Notification::dashboard_refresh());
        Ok(())
    }

    /// Delete a telemetry sample.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown sample.
    pub fn delete_telemetry(&mut self, caller: Caller<'_>, id: i64) -> Result<()> {
        caller.authorize(Role::can_log_flights, "log flights")?;
        let now = Utc::now();
        self.storage.write(|tx| {
            if !flights::delete_telemetry(tx, id)? {
                return Err(Error::not_found("FlightData", id));
            }
            storage::ledger::append(
                tx,
                &caller.stamp(NewAuditEntry::deleted("FlightData", id)),
                now,
            )?;
            Ok(())
        })?;
        self.notify(&Notification::dashboard_refresh());
        Ok(())
    }
}

fn session_entry(action: ActionKind, caller: Caller<'_>, description: &str) -> NewAuditEntry {
    let entry = NewAuditEntry::new(action, "User").describe(description);
    match caller.actor {
        Some(account) => entry.entity(account.id),
        None => entry,
    }
}

fn check_threshold(
    conn: &rusqlite::Connection,
    aircraft: &Aircraft,
    record: &MaintenanceRecord,
    recipient_role: &str,
    now: chrono::DateTime<Utc>,
) -> Result<AlertOutcome> {
    let decision = evaluate(
        &aircraft.tail_number,
        record.total_flight_hours,
        aircraft.maintenance_threshold_hours,
        recipient_role,
    );
    maintenance::apply_decision(conn, aircraft.id, record.id, &decision, now)
}

fn check_references(conn: &rusqlite::Connection, fields: &FlightFields) -> Result<()> {
    if fleet::get_aircraft(conn, fields.aircraft_id)?.is_none() {
        return Err(Error::not_found("Aircraft", fields.aircraft_id));
    }
    for base in [fields.departure_base_id, fields.arrival_base_id] {
        if fleet::get_base(conn, base)?.is_none() {
            return Err(Error::not_found("Base", base));
        }
    }
    if let Some(missing) = fleet::first_missing_crew(conn, &fields.crew_ids)? {
        return Err(Error::not_found("Crew", missing));
    }
    Ok(())
}

fn lookup_pilot(conn: &rusqlite::Connection, pilot_id: Option<i64>) -> Result<Option<Pilot>> {
    match pilot_id {
        Some(id) => fleet::get_pilot(conn, id)?
            .map(Some)
            .ok_or(Error::not_found("Pilot", id)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::ledger::ChainViolation;
    use crate::model::Severity;
    use crate::notify::{BroadcastNotifier, EventKind, NullNotifier};
    use crate::storage::test_support::*;

    fn create_ops() -> (Operations, Seed) {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        (Operations::new(storage, Arc::new(NullNotifier)), seed)
    }

    fn maintenance_log(aircraft_id: i64, hours: f64) -> NewMaintenanceRecord {
        NewMaintenanceRecord {
            aircraft_id,
            total_flight_hours: hours,
            last_service_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            component_status: "Nominal".to_string(),
            notes: String::new(),
        }
    }

    fn draft(seed: &Seed) -> FlightDraft {
        FlightDraft {
            aircraft_id: seed.aircraft,
            pilot_id: Some(seed.pilot),
            mission_type: "Patrol".to_string(),
            atd: Some(at(3, 8)),
            eta: Some(at(3, 10)),
            flight_hours: 2.0,
            fuel_used: 400.0,
            departure_base_id: seed.accra,
            arrival_base_id: seed.tamale,
            ..FlightDraft::default()
        }
    }

    #[test]
    fn test_threshold_scenario() {
        let (mut ops, seed) = create_ops();

        let logged = ops
            .log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 120.0))
            .unwrap();
        let AlertOutcome::Opened { alert_id } = logged.alert else {
            panic!("expected a new alert, got {:?}", logged.alert);
        };

        let open = ops.storage().alerts(true, None).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, alert_id);
        assert_eq!(open[0].severity, Severity::High);
        assert_eq!(open[0].recipient_role, "maintenance");
        assert_eq!(open[0].title, "Maintenance Threshold Reached");
        assert_eq!(
            open[0].message,
            "Aircraft GAF-002 recorded 120.0 flight hours (threshold: 100.0). \
             Maintenance officer action required."
        );

        let patch = MaintenancePatch {
            total_flight_hours: Some(80.0),
            ..MaintenancePatch::default()
        };
        let updated = ops
            .update_maintenance(Caller::system(), logged.record.id, &patch)
            .unwrap();
        assert_eq!(updated.alert, AlertOutcome::Resolved { alert_id });

        assert!(ops.storage().alerts(true, None).unwrap().is_empty());
        let all = ops.storage().alerts(false, None).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].is_resolved);
    }

    #[test]
    fn test_each_log_over_threshold_gets_its_own_alert() {
        let (mut ops, seed) = create_ops();

        let first = ops
            .log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 120.0))
            .unwrap();
        let first_alert = first.alert.alert_id().unwrap();

        let second = ops
            .log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 80.0))
            .unwrap();
        assert_eq!(second.alert, AlertOutcome::Unchanged);

        let third = ops
            .log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 130.0))
            .unwrap();
        let AlertOutcome::Opened { alert_id: third_alert } = third.alert else {
            panic!("expected a new alert, got {:?}", third.alert);
        };
        assert_ne!(third_alert, first_alert);

        let again = ops
            .update_maintenance(Caller::system(), third.record.id, &MaintenancePatch::default())
            .unwrap();
        assert_eq!(again.alert, AlertOutcome::Refreshed { alert_id: third_alert });

        let mut alerts: Vec<(i64, bool)> = ops
            .storage()
            .alerts(false, None)
            .unwrap()
            .iter()
            .map(|a| (a.maintenance_record_id, a.is_resolved))
            .collect();
        alerts.sort_unstable();
        assert_eq!(alerts, vec![(first.record.id, false), (third.record.id, false)]);
    }

    #[test]
    fn test_moved_log_takes_its_alert_along() {
        let (mut ops, seed) = create_ops();
        let spare = ops
            .add_aircraft(
                Caller::system(),
                &NewAircraft::new("GAF-003", "C-295", seed.accra).with_threshold(200.0),
            )
            .unwrap();
        let logged = ops
            .log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 150.0))
            .unwrap();
        let alert_id = logged.alert.alert_id().unwrap();

        let patch = MaintenancePatch {
            aircraft_id: Some(spare.id),
            ..MaintenancePatch::default()
        };
        let moved = ops
            .update_maintenance(Caller::system(), logged.record.id, &patch)
            .unwrap();
        assert_eq!(moved.record.aircraft_id, spare.id);
        assert_eq!(moved.alert, AlertOutcome::Resolved { alert_id });

        let stored = ops.storage().alert_for(spare.id, logged.record.id).unwrap().unwrap();
        assert!(stored.is_resolved);
        assert!(ops
            .storage()
            .alert_for(seed.aircraft, logged.record.id)
            .unwrap()
            .is_none());

        let patch = MaintenancePatch {
            aircraft_id: Some(404),
            ..MaintenancePatch::default()
        };
        let err = ops
            .update_maintenance(Caller::system(), logged.record.id, &patch)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Aircraft", id: 404 }));
    }

    #[test]
    fn test_threshold_is_inclusive_and_idempotent() {
        let (mut ops, seed) = create_ops();
        let logged = ops
            .log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 100.0))
            .unwrap();
        assert!(logged.alert.is_open());

        let again = ops
            .update_maintenance(Caller::system(), logged.record.id, &MaintenancePatch::default())
            .unwrap();
        assert_eq!(
            again.alert,
            AlertOutcome::Refreshed {
                alert_id: logged.alert.alert_id().unwrap()
            }
        );
        assert_eq!(ops.storage().alerts(false, None).unwrap().len(), 1);
    }

    #[test]
    fn test_resolved_alert_reopens() {
        crate::logging::init_test_logging();
        let (mut ops, seed) = create_ops();
        let logged = ops
            .log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 150.0))
            .unwrap();
        let alert_id = logged.alert.alert_id().unwrap();

        let hours = |h| MaintenancePatch {
            total_flight_hours: Some(h),
            ..MaintenancePatch::default()
        };
        ops.update_maintenance(Caller::system(), logged.record.id, &hours(10.0))
            .unwrap();
        let reopened = ops
            .update_maintenance(Caller::system(), logged.record.id, &hours(110.0))
            .unwrap();
        assert_eq!(reopened.alert, AlertOutcome::Reopened { alert_id });
        assert_eq!(ops.storage().alerts(true, None).unwrap().len(), 1);
    }

    #[test]
    fn test_below_threshold_creates_no_alert() {
        let (mut ops, seed) = create_ops();
        let logged = ops
            .log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 99.9))
            .unwrap();
        assert_eq!(logged.alert, AlertOutcome::Unchanged);
        assert!(ops.storage().alerts(false, None).unwrap().is_empty());
    }

    #[test]
    fn test_alert_routed_to_configured_role() {
        let (ops, seed) = create_ops();
        let mut ops = ops.with_recipient_role("commander");
        ops.log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 200.0))
            .unwrap();
        assert_eq!(ops.storage().alerts(true, Some("commander")).unwrap().len(), 1);
        assert!(ops.storage().alerts(true, Some("maintenance")).unwrap().is_empty());
    }

    #[test]
    fn test_maintenance_for_unknown_aircraft_rolls_back() {
        let (mut ops, _) = create_ops();
        let err = ops
            .log_maintenance(Caller::system(), &maintenance_log(999, 120.0))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Aircraft", id: 999 }));
        assert!(ops.storage().audit_entries(10).unwrap().is_empty());
    }

    #[test]
    fn test_every_write_is_audited_with_actor() {
        let (mut ops, seed) = create_ops();
        let admin = ops
            .add_account(Caller::system(), "kofi", Role::Admin)
            .unwrap();
        let caller = Caller::new(Some(&admin), Some("10.1.1.1"));

        let logged = ops
            .log_maintenance(caller, &maintenance_log(seed.aircraft, 5.0))
            .unwrap();
        assert_eq!(logged.record.recorded_by, Some(admin.id));

        let entries = ops.storage().audit_entries_for("MaintenanceLog", logged.record.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor_id, Some(admin.id));
        assert_eq!(entries[0].origin.as_deref(), Some("10.1.1.1"));
        assert_eq!(
            entries[0].description,
            format!("Created MaintenanceLog #{}", logged.record.id)
        );

        let user = ops.storage().audit_entries_for("User", admin.id).unwrap();
        assert_eq!(user[0].description, "Created user kofi with role admin");
        assert_eq!(user[0].actor_id, None);
    }

    #[test]
    fn test_chain_stays_intact_across_operations() {
        let (mut ops, seed) = create_ops();
        let account = ops
            .add_account(Caller::system(), "efua", Role::FlightOps)
            .unwrap();
        let caller = Caller::new(Some(&account), None);

        ops.record_login(caller).unwrap();
        let flight = ops.log_flight(caller, &draft(&seed)).unwrap();
        ops.update_flight(caller, flight.flight.id, &FlightPatch::arrival(at(3, 10)))
            .unwrap();
        ops.log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 130.0))
            .unwrap();
        ops.change_role(Caller::system(), account.id, Role::Commander)
            .unwrap();
        ops.record_logout(caller).unwrap();

        let report = ops.verify_ledger().unwrap();
        assert!(report.is_intact());
        assert_eq!(report.entries_checked, 7);

        let latest = ops.storage().audit_entries(2).unwrap();
        assert_eq!(latest[0].description, "User logged out");
        assert_eq!(latest[1].action, ActionKind::RoleChange);
        assert_eq!(
            latest[1].description,
            "Role changed for efua from flight_ops to commander"
        );
    }

    #[test]
    fn test_tampering_is_detected() {
        let (mut ops, seed) = create_ops();
        ops.log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 1.0))
            .unwrap();
        ops.record_view(Caller::system(), "Aircraft", seed.aircraft)
            .unwrap();

        ops.storage
            .write(|tx| {
                tx.execute_batch(
                    "DROP TRIGGER audit_log_no_update;
                     UPDATE audit_log SET actor_id = 42 WHERE id = 1;",
                )?;
                Ok(())
            })
            .unwrap();

        let report = ops.verify_ledger().unwrap();
        assert!(!report.is_intact());
        assert!(matches!(
            report.violations[0],
            ChainViolation::ChecksumMismatch { entry_id: 1, .. }
        ));
        assert!(matches!(
            report.into_result(),
            Err(Error::ChainIntegrity { .. })
        ));
    }

    #[test]
    fn test_flight_status_follows_arrival() {
        let (mut ops, seed) = create_ops();
        let logged = ops.log_flight(Caller::system(), &draft(&seed)).unwrap();
        assert_eq!(logged.flight.mission_status, MissionStatus::Active);
        assert_eq!(logged.flight.pilot_name, "Ama Owusu");
        assert_eq!(logged.flight.departed_at, logged.flight.atd);
        assert!(!logged.status_changed());

        let arrived = ops
            .update_flight(
                Caller::system(),
                logged.flight.id,
                &FlightPatch::arrival(at(3, 11)),
            )
            .unwrap();
        assert_eq!(arrived.flight.mission_status, MissionStatus::Completed);
        assert!(arrived.status_changed());
        assert!((arrived.flight.flight_hours - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cleared_arrival_makes_flight_active() {
        let (mut ops, seed) = create_ops();
        let logged = ops.log_flight(Caller::system(), &draft(&seed)).unwrap();
        ops.update_flight(
            Caller::system(),
            logged.flight.id,
            &FlightPatch::arrival(at(3, 10)),
        )
        .unwrap();

        let reopened = ops
            .update_flight(Caller::system(), logged.flight.id, &FlightPatch::clear_arrival())
            .unwrap();
        assert_eq!(reopened.flight.mission_status, MissionStatus::Active);
        assert_eq!(reopened.flight.ata, None);
        assert_eq!(reopened.previous_status, Some(MissionStatus::Completed));

        let stored = ops.storage().flight(logged.flight.id).unwrap().unwrap();
        assert_eq!(stored.mission_status, MissionStatus::Active);
    }

    #[test]
    fn test_flight_keeps_snapshot_after_pilot_rename() {
        let (mut ops, seed) = create_ops();
        let logged = ops.log_flight(Caller::system(), &draft(&seed)).unwrap();
        ops.rename_pilot(Caller::system(), seed.pilot, "Ama Owusu-Mensah")
            .unwrap();

        let stored = ops.storage().flight(logged.flight.id).unwrap().unwrap();
        assert_eq!(stored.pilot_name, "Ama Owusu");

        let patch = FlightPatch {
            remarks: Some("Smooth".to_string()),
            ..FlightPatch::default()
        };
        let updated = ops
            .update_flight(Caller::system(), logged.flight.id, &patch)
            .unwrap();
        assert_eq!(updated.flight.pilot_name, "Ama Owusu-Mensah");
    }

    #[test]
    fn test_invalid_flight_is_rejected_without_writes() {
        let (mut ops, seed) = create_ops();
        let bad = FlightDraft {
            flight_hours: 0.0,
            eta: Some(at(3, 7)),
            arrival_base_id: seed.accra,
            ..draft(&seed)
        };

        let err = ops.log_flight(Caller::system(), &bad).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has_field("flight_hours"));
        assert!(errors.has_field("eta"));
        assert!(errors.has_field("arrival_base"));
        assert!(ops.storage().recent_flights(10).unwrap().is_empty());
        assert!(ops.storage().audit_entries(10).unwrap().is_empty());
    }

    #[test]
    fn test_flight_with_unknown_crew_rejected() {
        let (mut ops, seed) = create_ops();
        let crew = ops
            .add_crew(
                Caller::system(),
                &NewCrew {
                    full_name: "Yaw Boateng".to_string(),
                    rank: "Sgt".to_string(),
                    role: "Loadmaster".to_string(),
                },
            )
            .unwrap();

        let with_crew = FlightDraft {
            crew_ids: vec![crew.id, 77],
            ..draft(&seed)
        };
        let err = ops.log_flight(Caller::system(), &with_crew).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Crew", id: 77 }));

        let ok = FlightDraft {
            crew_ids: vec![crew.id],
            ..draft(&seed)
        };
        let logged = ops.log_flight(Caller::system(), &ok).unwrap();
        assert_eq!(logged.flight.crew_ids, vec![crew.id]);
    }

    #[test]
    fn test_telemetry_validation_and_audit() {
        let (mut ops, seed) = create_ops();
        let flight = ops.log_flight(Caller::system(), &draft(&seed)).unwrap();
        let mut sample = NewTelemetrySample {
            flight_id: flight.flight.id,
            recorded_at: at(3, 9),
            altitude: 18_000.0,
            speed: 320.0,
            engine_temp: 610.0,
            fuel_level: 55.0,
            heading: 270.0,
        };

        let stored = ops.record_telemetry(Caller::system(), &sample).unwrap();
        assert_eq!(
            ops.storage().audit_entries_for("FlightData", stored.id).unwrap().len(),
            1
        );

        sample.speed = -1.0;
        let err = ops.record_telemetry(Caller::system(), &sample).unwrap_err();
        assert!(err.validation_errors().unwrap().has_field("speed"));

        sample.speed = 1.0;
        sample.flight_id = 404;
        let err = ops.record_telemetry(Caller::system(), &sample).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "FlightLog", .. }));
    }

    #[test]
    fn test_aircraft_validation_and_status() {
        let (mut ops, seed) = create_ops();
        let bad = NewAircraft::new("", "C-295", seed.accra).with_threshold(0.5);
        let err = ops.add_aircraft(Caller::system(), &bad).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has_field("tail_number"));
        assert!(errors.has_field("maintenance_threshold_hours"));

        let err = ops
            .add_aircraft(Caller::system(), &NewAircraft::new("GAF-003", "C-295", 99))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Base", id: 99 }));

        let err = ops
            .add_aircraft(Caller::system(), &NewAircraft::new("GAF-002", "L-39", seed.accra))
            .unwrap_err();
        assert!(err.is_conflict());

        for near in ["gaf-002", " GAF-002 ", "Gaf-002\t"] {
            let err = ops
                .add_aircraft(Caller::system(), &NewAircraft::new(near, "L-39", seed.accra))
                .unwrap_err();
            assert!(err.is_conflict(), "{near:?} was accepted");
        }
        let stored = ops
            .add_aircraft(Caller::system(), &NewAircraft::new("  gaf-010 ", "L-39", seed.accra))
            .unwrap();
        assert_eq!(stored.tail_number, "GAF-010");
        let tails: Vec<String> = ops
            .storage()
            .fleet()
            .unwrap()
            .into_iter()
            .map(|a| a.tail_number)
            .collect();
        assert_eq!(tails, vec!["GAF-002", "GAF-010"]);

        let err = ops
            .add_aircraft(Caller::system(), &NewAircraft::new("   ", "L-39", seed.accra))
            .unwrap_err();
        assert!(err.validation_errors().unwrap().has_field("tail_number"));

        let updated = ops
            .set_aircraft_status(Caller::system(), seed.aircraft, AircraftStatus::InMaintenance)
            .unwrap();
        assert_eq!(updated.status, AircraftStatus::InMaintenance);
        let entries = ops.storage().audit_entries_for("Aircraft", seed.aircraft).unwrap();
        assert_eq!(
            entries[0].description,
            "Changed status from available to in_maintenance"
        );
    }

    #[test]
    fn test_referenced_base_is_protected() {
        let (mut ops, seed) = create_ops();
        let err = ops.delete_base(Caller::system(), seed.accra).unwrap_err();
        assert!(matches!(err, Error::Protected { .. }));

        let spare = ops
            .add_base(
                Caller::system(),
                &NewBase {
                    name: "Takoradi".to_string(),
                    location: "Western".to_string(),
                },
            )
            .unwrap();
        ops.delete_base(Caller::system(), spare.id).unwrap();
        assert!(ops.storage().base(spare.id).unwrap().is_none());
    }

    #[test]
    fn test_deleting_maintenance_removes_alerts() {
        let (mut ops, seed) = create_ops();
        let logged = ops
            .log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 120.0))
            .unwrap();
        ops.delete_maintenance(Caller::system(), logged.record.id)
            .unwrap();
        assert!(ops.storage().alerts(false, None).unwrap().is_empty());

        let err = ops
            .delete_maintenance(Caller::system(), logged.record.id)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    fn account(ops: &mut Operations, username: &str, role: Role) -> Account {
        ops.add_account(Caller::system(), username, role).unwrap()
    }

    fn assert_forbidden<T: std::fmt::Debug>(result: Result<T>, action: &str) {
        match result {
            Err(Error::Forbidden { action: refused, .. }) => assert_eq!(refused, action),
            other => panic!("expected a refusal to {action}, got {other:?}"),
        }
    }

    #[test]
    fn test_audit_reads_need_an_audit_role() {
        let auditor = Account {
            id: 1,
            username: "abena".to_string(),
            role: Role::Auditor,
        };
        let officer = Account {
            role: Role::FlightOps,
            ..auditor.clone()
        };

        assert!(Caller::new(Some(&auditor), None)
            .authorize(Role::can_read_audit, "read the audit trail")
            .is_ok());
        assert!(Caller::system()
            .authorize(Role::can_read_audit, "read the audit trail")
            .is_ok());
        let err = Caller::new(Some(&officer), None)
            .authorize(Role::can_read_audit, "read the audit trail")
            .unwrap_err();
        assert_eq!(err.to_string(), "abena (flight_ops) may not read the audit trail");
    }

    #[test]
    fn test_auditor_cannot_write() {
        let (mut ops, seed) = create_ops();
        let auditor = account(&mut ops, "abena", Role::Auditor);
        let caller = Caller::new(Some(&auditor), None);
        let before = ops.storage().audit_entries(50).unwrap().len();

        assert_forbidden(
            ops.log_maintenance(caller, &maintenance_log(seed.aircraft, 120.0)),
            "log maintenance",
        );
        assert_forbidden(ops.log_flight(caller, &draft(&seed)), "log flights");
        assert_forbidden(
            ops.add_aircraft(caller, &NewAircraft::new("GAF-020", "L-39", seed.accra)),
            "manage the fleet",
        );

        assert!(ops.storage().alerts(false, None).unwrap().is_empty());
        assert!(ops.storage().recent_flights(10).unwrap().is_empty());
        assert_eq!(ops.storage().audit_entries(50).unwrap().len(), before);
        assert!(ops.record_login(caller).is_ok());
    }

    #[test]
    fn test_commander_cannot_write() {
        let (mut ops, seed) = create_ops();
        let commander = account(&mut ops, "kwesi", Role::Commander);
        let caller = Caller::new(Some(&commander), None);

        assert_forbidden(ops.log_flight(caller, &draft(&seed)), "log flights");
        assert_forbidden(
            ops.set_aircraft_status(caller, seed.aircraft, AircraftStatus::InMaintenance),
            "manage the fleet",
        );
        assert_forbidden(
            ops.change_role(caller, commander.id, Role::Admin),
            "manage accounts",
        );
        assert_eq!(
            ops.storage().account(commander.id).unwrap().unwrap().role,
            Role::Commander
        );
    }

    #[test]
    fn test_flight_ops_logs_flights_only() {
        let (mut ops, seed) = create_ops();
        let officer = account(&mut ops, "efua", Role::FlightOps);
        let caller = Caller::new(Some(&officer), None);

        let logged = ops.log_flight(caller, &draft(&seed)).unwrap();
        assert_eq!(logged.flight.logged_by, Some(officer.id));
        assert_forbidden(
            ops.log_maintenance(caller, &maintenance_log(seed.aircraft, 10.0)),
            "log maintenance",
        );
        assert_forbidden(
            ops.add_aircraft(caller, &NewAircraft::new("GAF-021", "L-39", seed.accra)),
            "manage the fleet",
        );
        assert_forbidden(ops.add_account(caller, "yaw", Role::Admin), "manage accounts");
    }

    #[test]
    fn test_maintenance_officer_logs_maintenance_only() {
        let (mut ops, seed) = create_ops();
        let officer = account(&mut ops, "kojo", Role::Maintenance);
        let caller = Caller::new(Some(&officer), None);

        let logged = ops
            .log_maintenance(caller, &maintenance_log(seed.aircraft, 120.0))
            .unwrap();
        assert!(logged.alert.is_open());
        assert_forbidden(ops.log_flight(caller, &draft(&seed)), "log flights");
        assert_forbidden(ops.delete_base(caller, seed.tamale), "manage the fleet");
    }

    #[test]
    fn test_admin_may_do_everything() {
        let (mut ops, seed) = create_ops();
        let admin = account(&mut ops, "ama", Role::Admin);
        let caller = Caller::new(Some(&admin), None);

        ops.add_aircraft(caller, &NewAircraft::new("GAF-022", "L-39", seed.accra))
            .unwrap();
        ops.log_flight(caller, &draft(&seed)).unwrap();
        ops.log_maintenance(caller, &maintenance_log(seed.aircraft, 5.0))
            .unwrap();
        let clerk = ops.add_account(caller, "esi", Role::Auditor).unwrap();
        ops.change_role(caller, clerk.id, Role::Commander).unwrap();
        assert!(ops.verify_ledger().unwrap().is_intact());
    }

    #[tokio::test]
    async fn test_notifications_after_commit() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let notifier = Arc::new(BroadcastNotifier::new(16));
        let mut rx = notifier.subscribe();
        let mut ops = Operations::new(storage, notifier);

        let logged = ops
            .log_maintenance(Caller::system(), &maintenance_log(seed.aircraft, 120.0))
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, EventKind::MaintenanceLogCreated);
        assert_eq!(first.payload["maintenance_log_id"], logged.record.id);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.event, EventKind::MaintenanceAlert);
        assert_eq!(
            second.payload["alert_id"],
            logged.alert.alert_id().unwrap()
        );

        let flight = ops.log_flight(Caller::system(), &draft(&seed)).unwrap();
        let third = rx.recv().await.unwrap();
        assert_eq!(third.event, EventKind::FlightLogCreated);
        assert_eq!(third.payload["flight_log_id"], flight.flight.id);

        let _ = ops.log_flight(
            Caller::system(),
            &FlightDraft {
                flight_hours: -1.0,
                ..draft(&seed)
            },
        );
        assert!(rx.try_recv().is_err());
    }
}
