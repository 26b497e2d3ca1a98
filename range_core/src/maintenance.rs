//! Maintenance intervals: reconstructing "rounds fired since the previous
//! service" from raw session history.
//!
//! The stored `rounds_since_last` values are a derived cache. For every
//! record except the newest the value covers the half-open interval from
//! the previous record's date to its own; the newest record instead counts
//! everything fired after it, so it answers "how many rounds since the gun
//! was last serviced" at any moment. All of it is recomputable from
//! session history at any time.

use crate::config::MaintenanceConfig;
use crate::ledger::PostCommitHook;
use crate::store::{Database, RecordStore};
use crate::{Error, Maintenance, MaintenanceDraft, MaintenancePatch, Result, UserContext};
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// Sum of shots fired with a firearm in `(after, until]`; either bound may
/// be open.
pub fn rounds_between(
    db: &Database,
    owner_id: &str,
    gun_id: Uuid,
    after: Option<NaiveDate>,
    until: Option<NaiveDate>,
) -> i64 {
    db.sessions_for_gun(gun_id, owner_id)
        .filter(|s| after.map_or(true, |a| s.date > a))
        .filter(|s| until.map_or(true, |u| s.date <= u))
        .map(|s| s.shots)
        .sum()
}

/// Recompute `rounds_since_last` across a firearm's whole maintenance
/// history. Idempotent; safe to run at any time.
pub fn reconstruct(db: &mut Database, owner_id: &str, gun_id: Uuid) -> bool {
    let mut ordered: Vec<(usize, NaiveDate)> = db
        .maintenance
        .iter()
        .enumerate()
        .filter(|(_, m)| m.gun_id == gun_id && m.user_id == owner_id)
        .map(|(i, m)| (i, m.date))
        .collect();
    ordered.sort_by_key(|(_, date)| *date);

    let last = match ordered.len().checked_sub(1) {
        Some(last) => last,
        None => return false,
    };

    let mut changed = false;
    for pos in 0..=last {
        let (index, date) = ordered[pos];
        let rounds = if pos == last {
            // The newest record counts forward: rounds since last service
            rounds_between(db, owner_id, gun_id, Some(date), None)
        } else {
            let after = if pos == 0 {
                None
            } else {
                Some(ordered[pos - 1].1)
            };
            rounds_between(db, owner_id, gun_id, after, Some(date))
        };
        if db.maintenance[index].rounds_since_last != rounds {
            db.maintenance[index].rounds_since_last = rounds;
            changed = true;
        }
    }
    changed
}

/// Recompute only the newest record's forward-looking count.
///
/// Cheaper than [`reconstruct`]; this is what runs after every session
/// mutation.
pub fn refresh_latest(db: &mut Database, owner_id: &str, gun_id: Uuid) -> bool {
    let latest = db
        .maintenance
        .iter()
        .enumerate()
        .filter(|(_, m)| m.gun_id == gun_id && m.user_id == owner_id)
        .max_by_key(|(_, m)| m.date)
        .map(|(i, m)| (i, m.date));

    if let Some((index, date)) = latest {
        let rounds = rounds_between(db, owner_id, gun_id, Some(date), None);
        if db.maintenance[index].rounds_since_last != rounds {
            db.maintenance[index].rounds_since_last = rounds;
            return true;
        }
    }
    false
}

// ============================================================================
// Status
// ============================================================================

/// Traffic-light maintenance urgency; ordering is by urgency
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Green,
    Yellow,
    Red,
}

/// Status report for one firearm
#[derive(Clone, Debug, Serialize)]
pub struct MaintenanceStatusReport {
    pub status: MaintenanceStatus,
    pub rounds_since_last: i64,
    pub days_since_last: i64,
}

/// Per-gun entry in the statistics report
#[derive(Clone, Debug, Serialize)]
pub struct GunMaintenanceDays {
    pub gun_id: Uuid,
    pub gun_name: String,
    pub days_since_last: i64,
}

/// Fleet-wide maintenance statistics
#[derive(Clone, Debug, Serialize)]
pub struct MaintenanceStatistics {
    pub longest_without_maintenance: Option<GunMaintenanceDays>,
    pub guns_status: Vec<GunMaintenanceDays>,
}

// ============================================================================
// Service
// ============================================================================

/// Maintenance record service
pub struct MaintenanceService<'a> {
    store: &'a dyn RecordStore,
    config: MaintenanceConfig,
}

impl<'a> MaintenanceService<'a> {
    pub fn new(store: &'a dyn RecordStore, config: MaintenanceConfig) -> Self {
        Self { store, config }
    }

    /// Create a maintenance record.
    ///
    /// An omitted or zero round count is computed from session history
    /// between the previous record (if any) and the new date.
    pub fn create(
        &self,
        user: &UserContext,
        gun_id: Uuid,
        draft: MaintenanceDraft,
        today: NaiveDate,
    ) -> Result<Maintenance> {
        let mut db = self.store.snapshot()?;

        let gun = db
            .firearm(gun_id, user)
            .ok_or_else(|| Error::NotFound("firearm not found".into()))?;
        let owner_id = gun.user_id.clone();

        let date = draft.date.unwrap_or(today);
        if date > today {
            return Err(Error::BadRequest(
                "maintenance date cannot be in the future".into(),
            ));
        }

        let rounds_since_last = match draft.rounds_since_last {
            Some(rounds) if rounds < 0 => {
                return Err(Error::BadRequest("round count cannot be negative".into()))
            }
            Some(rounds) if rounds > 0 => rounds,
            _ => {
                let previous = db
                    .maintenance_for_gun(gun_id, &owner_id)
                    .last()
                    .map(|m| m.date);
                rounds_between(&db, &owner_id, gun_id, previous, Some(date))
            }
        };

        let record = Maintenance {
            id: Uuid::new_v4(),
            user_id: owner_id,
            gun_id,
            date,
            notes: draft.notes,
            activities: draft.activities,
            rounds_since_last,
        };

        db.maintenance.push(record.clone());
        self.store.commit(db)?;
        tracing::info!("Created maintenance {} for gun {}", record.id, gun_id);
        Ok(record)
    }

    /// Update a maintenance record
    pub fn update(
        &self,
        user: &UserContext,
        maintenance_id: Uuid,
        patch: MaintenancePatch,
        today: NaiveDate,
    ) -> Result<Maintenance> {
        let mut db = self.store.snapshot()?;

        let old = db
            .maintenance_record(maintenance_id, user)
            .ok_or_else(|| Error::NotFound("maintenance record not found".into()))?
            .clone();

        let mut updated = old;
        if let Some(date) = patch.date {
            if date > today {
                return Err(Error::BadRequest(
                    "maintenance date cannot be in the future".into(),
                ));
            }
            updated.date = date;
        }
        updated.notes = patch.notes.apply(updated.notes);
        updated.activities = patch.activities.apply(updated.activities);
        if let Some(rounds) = patch.rounds_since_last {
            if rounds < 0 {
                return Err(Error::BadRequest("round count cannot be negative".into()));
            }
            updated.rounds_since_last = rounds;
        }

        if let Some(slot) = db.maintenance.iter_mut().find(|m| m.id == maintenance_id) {
            *slot = updated.clone();
        }
        self.store.commit(db)?;
        Ok(updated)
    }

    /// Delete a maintenance record
    pub fn delete(&self, user: &UserContext, maintenance_id: Uuid) -> Result<()> {
        let mut db = self.store.snapshot()?;

        if db.maintenance_record(maintenance_id, user).is_none() {
            return Err(Error::NotFound("maintenance record not found".into()));
        }
        db.maintenance.retain(|m| m.id != maintenance_id);
        self.store.commit(db)?;
        tracing::info!("Deleted maintenance {}", maintenance_id);
        Ok(())
    }

    /// Recompute the whole maintenance history of a firearm from raw
    /// session data
    pub fn rebuild(&self, user: &UserContext, gun_id: Uuid) -> Result<()> {
        let mut db = self.store.snapshot()?;

        let gun = db
            .firearm(gun_id, user)
            .ok_or_else(|| Error::NotFound("firearm not found".into()))?;
        let owner_id = gun.user_id.clone();

        if reconstruct(&mut db, &owner_id, gun_id) {
            self.store.commit(db)?;
        }
        Ok(())
    }

    /// List a firearm's maintenance history, newest first, refreshing the
    /// newest record's round count on the way out
    pub fn list(&self, user: &UserContext, gun_id: Uuid) -> Result<Vec<Maintenance>> {
        let mut db = self.store.snapshot()?;

        let gun = db
            .firearm(gun_id, user)
            .ok_or_else(|| Error::NotFound("firearm not found".into()))?;
        let owner_id = gun.user_id.clone();

        if refresh_latest(&mut db, &owner_id, gun_id) {
            self.store.commit(db.clone())?;
        }

        let mut records: Vec<Maintenance> = db
            .maintenance_for_gun(gun_id, &owner_id)
            .into_iter()
            .cloned()
            .collect();
        records.reverse();
        Ok(records)
    }

    /// Status for one firearm: round-count and day-count thresholds
    /// combined by taking the worse of the two.
    ///
    /// With no maintenance on file the day count falls back to the first
    /// session, then to the firearm's creation date, and the round count
    /// covers the whole session history.
    pub fn status(
        &self,
        user: &UserContext,
        gun_id: Uuid,
        today: NaiveDate,
    ) -> Result<MaintenanceStatusReport> {
        let db = self.store.snapshot()?;

        let gun = db
            .firearm(gun_id, user)
            .ok_or_else(|| Error::NotFound("firearm not found".into()))?;
        let owner_id = gun.user_id.clone();
        let created_at = gun.created_at;

        let latest = db
            .maintenance_for_gun(gun_id, &owner_id)
            .last()
            .map(|m| m.date);

        let (rounds, days) = match latest {
            Some(date) => (
                rounds_between(&db, &owner_id, gun_id, Some(date), None),
                (today - date).num_days(),
            ),
            None => {
                let baseline = db
                    .sessions_for_gun(gun_id, &owner_id)
                    .map(|s| s.date)
                    .min()
                    .unwrap_or(created_at);
                (
                    rounds_between(&db, &owner_id, gun_id, None, None),
                    (today - baseline).num_days(),
                )
            }
        };

        let status = self.rounds_status(rounds).max(self.days_status(days));
        Ok(MaintenanceStatusReport {
            status,
            rounds_since_last: rounds,
            days_since_last: days,
        })
    }

    /// Per-gun days-since-last-service plus the longest-neglected firearm
    pub fn statistics(&self, user: &UserContext, today: NaiveDate) -> Result<MaintenanceStatistics> {
        let db = self.store.snapshot()?;

        let mut guns_status = Vec::new();
        for gun in db.guns.iter().filter(|g| user.can_see(&g.user_id)) {
            let latest = db
                .maintenance_for_gun(gun.id, &gun.user_id)
                .last()
                .map(|m| m.date);
            let baseline = latest
                .or_else(|| {
                    db.sessions_for_gun(gun.id, &gun.user_id)
                        .map(|s| s.date)
                        .min()
                })
                .unwrap_or(gun.created_at);
            guns_status.push(GunMaintenanceDays {
                gun_id: gun.id,
                gun_name: gun.name.clone(),
                days_since_last: (today - baseline).num_days(),
            });
        }

        let longest_without_maintenance = guns_status
            .iter()
            .max_by_key(|g| g.days_since_last)
            .cloned();

        Ok(MaintenanceStatistics {
            longest_without_maintenance,
            guns_status,
        })
    }

    fn rounds_status(&self, rounds: i64) -> MaintenanceStatus {
        if rounds < self.config.rounds_warn {
            MaintenanceStatus::Green
        } else if rounds < self.config.rounds_alert {
            MaintenanceStatus::Yellow
        } else {
            MaintenanceStatus::Red
        }
    }

    fn days_status(&self, days: i64) -> MaintenanceStatus {
        if days < self.config.days_warn {
            MaintenanceStatus::Green
        } else if days < self.config.days_alert {
            MaintenanceStatus::Yellow
        } else {
            MaintenanceStatus::Red
        }
    }
}

/// Post-commit hook keeping the newest maintenance record's round count in
/// step with session history
pub struct MaintenanceRefreshHook;

impl PostCommitHook for MaintenanceRefreshHook {
    fn name(&self) -> &'static str {
        "maintenance-refresh"
    }

    fn after_session_change(
        &self,
        store: &dyn RecordStore,
        owner_id: &str,
        gun_id: Uuid,
    ) -> Result<()> {
        let mut db = store.snapshot()?;
        if refresh_latest(&mut db, owner_id, gun_id) {
            store.commit(db)?;
        }
        Ok(())
    }
}
