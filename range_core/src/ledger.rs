//! Session ledger: create/update/delete for shooting sessions with
//! ammunition stock reconciliation.
//!
//! Every mutation is validated fail-fast, applied to a store snapshot and
//! committed as one unit, so no partial write survives a rejected
//! operation. Advisory recomputations (maintenance round counts, user
//! rank) run as post-commit hooks and never fail the primary operation.

use crate::caliber::CaliberMatcher;
use crate::maintenance::MaintenanceRefreshHook;
use crate::metrics;
use crate::rank::RankRefreshHook;
use crate::store::RecordStore;
use crate::{Error, Result, SessionDraft, SessionPatch, ShootingSession, UserContext};
use uuid::Uuid;

/// Result of a session create/update: the persisted session plus the
/// referenced ammunition's remaining stock when it changed
#[derive(Clone, Debug)]
pub struct SessionOutcome {
    pub session: ShootingSession,
    pub remaining_ammo: Option<i64>,
}

/// Advisory recomputation run after a ledger commit succeeds.
///
/// Hooks are idempotent caches; a failure is logged and skipped, and the
/// next session mutation (or direct read path) recomputes the same value.
pub trait PostCommitHook {
    fn name(&self) -> &'static str;
    fn after_session_change(
        &self,
        store: &dyn RecordStore,
        owner_id: &str,
        gun_id: Uuid,
    ) -> Result<()>;
}

/// The session ledger service
pub struct SessionLedger<'a> {
    store: &'a dyn RecordStore,
    matcher: &'a dyn CaliberMatcher,
    hooks: Vec<Box<dyn PostCommitHook>>,
}

impl<'a> SessionLedger<'a> {
    /// Ledger without post-commit hooks (unit tests, batch imports)
    pub fn new(store: &'a dyn RecordStore, matcher: &'a dyn CaliberMatcher) -> Self {
        Self {
            store,
            matcher,
            hooks: Vec::new(),
        }
    }

    /// Ledger with the standard maintenance-refresh and rank-refresh hooks
    pub fn with_default_hooks(
        store: &'a dyn RecordStore,
        matcher: &'a dyn CaliberMatcher,
    ) -> Self {
        Self::new(store, matcher)
            .hook(Box::new(MaintenanceRefreshHook))
            .hook(Box::new(RankRefreshHook))
    }

    pub fn hook(mut self, hook: Box<dyn PostCommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Create a session, decrementing the ammunition stock by `shots`.
    pub fn create_session(
        &self,
        user: &UserContext,
        draft: SessionDraft,
    ) -> Result<SessionOutcome> {
        if draft.shots <= 0 {
            return Err(Error::BadRequest("shots must be positive".into()));
        }

        let mut db = self.store.snapshot()?;

        let gun = db
            .firearm(draft.gun_id, user)
            .ok_or_else(|| Error::NotFound("firearm not found".into()))?;
        let ammo = db
            .ammo(draft.ammo_id, user)
            .ok_or_else(|| Error::NotFound("ammunition not found".into()))?;

        if gun.user_id != ammo.user_id {
            return Err(Error::BadRequest(
                "selected firearm and ammunition belong to different users".into(),
            ));
        }
        if !self
            .matcher
            .compatible(ammo.caliber.as_deref(), gun.caliber.as_deref())
        {
            return Err(Error::BadRequest(
                "selected ammunition does not match the firearm caliber".into(),
            ));
        }
        let available = ammo.units_in_package;
        if available.map_or(true, |units| units < draft.shots) {
            return Err(Error::BadRequest(format!(
                "not enough ammunition: only {} rounds left",
                available.unwrap_or(0)
            )));
        }
        if let Some(hits) = draft.hits {
            if hits < 0 || hits > draft.shots {
                return Err(Error::BadRequest(
                    "hits must be between 0 and the total number of shots".into(),
                ));
            }
        }

        let owner_id = gun.user_id.clone();
        let price_per_unit = ammo.price_per_unit;

        let cost = draft
            .cost
            .unwrap_or_else(|| metrics::cost(price_per_unit, draft.shots));
        let (accuracy_percent, final_score) =
            metrics::derive_scores(draft.distance_m, draft.hits, draft.shots, draft.group_cm);

        let session = ShootingSession {
            id: Uuid::new_v4(),
            user_id: owner_id.clone(),
            gun_id: draft.gun_id,
            ammo_id: draft.ammo_id,
            date: draft
                .date
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
            shots: draft.shots,
            cost: Some(cost),
            notes: draft.notes,
            distance_m: draft.distance_m,
            hits: draft.hits,
            group_cm: draft.group_cm,
            accuracy_percent,
            final_score,
        };

        db.adjust_ammo_stock(draft.ammo_id, -draft.shots);
        let remaining_ammo = db
            .ammo(draft.ammo_id, user)
            .and_then(|a| a.units_in_package);
        db.sessions.push(session.clone());

        self.store.commit(db)?;
        tracing::info!(
            "Created session {} ({} shots) for gun {}",
            session.id,
            session.shots,
            session.gun_id
        );

        self.run_hooks(&owner_id, &[draft.gun_id]);

        Ok(SessionOutcome {
            session,
            remaining_ammo,
        })
    }

    /// Apply a partial update, reconciling the ammunition stock delta.
    ///
    /// Only supplied fields are revalidated. An ammunition switch first
    /// restores the old package, then validates and charges the new one;
    /// a failed validation rolls the restoration back so no net stock
    /// drift survives a rejected update.
    pub fn update_session(
        &self,
        user: &UserContext,
        session_id: Uuid,
        patch: SessionPatch,
    ) -> Result<SessionOutcome> {
        let mut db = self.store.snapshot()?;

        let old = db
            .session(session_id, user)
            .ok_or_else(|| Error::NotFound("session not found".into()))?
            .clone();

        if patch.is_empty() {
            return Ok(SessionOutcome {
                session: old,
                remaining_ammo: None,
            });
        }

        let new_gun_id = patch.gun_id.unwrap_or(old.gun_id);
        let new_ammo_id = patch.ammo_id.unwrap_or(old.ammo_id);
        let new_shots = patch.shots.unwrap_or(old.shots);
        if new_shots <= 0 {
            return Err(Error::BadRequest("shots must be positive".into()));
        }
        let new_hits = patch.hits.clone().apply(old.hits);

        let refs_changed = patch.gun_id.is_some()
            || patch.ammo_id.is_some()
            || patch.shots.is_some()
            || !patch.hits.is_omitted();

        let mut new_price = None;
        if refs_changed {
            let gun = db
                .firearm(new_gun_id, user)
                .ok_or_else(|| Error::NotFound("firearm not found".into()))?;
            let ammo = db
                .ammo(new_ammo_id, user)
                .ok_or_else(|| Error::NotFound("ammunition not found".into()))?;

            if gun.user_id != ammo.user_id {
                return Err(Error::BadRequest(
                    "selected firearm and ammunition belong to different users".into(),
                ));
            }
            if let Some(hits) = new_hits {
                if hits < 0 || hits > new_shots {
                    return Err(Error::BadRequest(
                        "hits must be between 0 and the total number of shots".into(),
                    ));
                }
            }

            let gun_caliber = gun.caliber.clone();
            let ammo_caliber = ammo.caliber.clone();
            new_price = Some(ammo.price_per_unit);

            let shots_diff = new_shots - old.shots;
            let ammo_changed = new_ammo_id != old.ammo_id;

            if shots_diff > 0 || ammo_changed {
                if !self
                    .matcher
                    .compatible(ammo_caliber.as_deref(), gun_caliber.as_deref())
                {
                    return Err(Error::BadRequest(
                        "selected ammunition does not match the firearm caliber".into(),
                    ));
                }

                // Restore the old package before charging the new one
                let mut restored_old = false;
                if ammo_changed {
                    let old_stock_known = db
                        .ammo(old.ammo_id, user)
                        .map_or(false, |a| a.units_in_package.is_some());
                    if old_stock_known {
                        db.adjust_ammo_stock(old.ammo_id, old.shots);
                        restored_old = true;
                    }
                }

                let needed = if ammo_changed { new_shots } else { shots_diff };
                let available = db.ammo(new_ammo_id, user).and_then(|a| a.units_in_package);
                match available {
                    Some(units) if units >= needed => {
                        db.adjust_ammo_stock(new_ammo_id, -needed);
                    }
                    _ => {
                        if restored_old {
                            db.adjust_ammo_stock(old.ammo_id, -old.shots);
                        }
                        return Err(Error::BadRequest(format!(
                            "not enough ammunition: only {} rounds left",
                            available.unwrap_or(0)
                        )));
                    }
                }
            } else if shots_diff < 0 {
                // Same package, fewer shots: hand the unused rounds back
                db.adjust_ammo_stock(new_ammo_id, -shots_diff);
            }
        }

        let consumption_changed = patch.shots.is_some() || patch.ammo_id.is_some();

        let mut updated = old.clone();
        updated.gun_id = new_gun_id;
        updated.ammo_id = new_ammo_id;
        updated.shots = new_shots;
        if let Some(date) = patch.date {
            updated.date = date;
        }
        updated.notes = patch.notes.clone().apply(old.notes.clone());
        updated.distance_m = patch.distance_m.clone().apply(old.distance_m);
        updated.hits = new_hits;
        updated.group_cm = patch.group_cm.clone().apply(old.group_cm);

        updated.cost = if patch.cost.is_some() {
            patch.cost
        } else if consumption_changed {
            // Preserve any fixed cost surplus (range fees etc.) the user
            // entered on top of the ammunition price
            let old_ammo_cost = db
                .ammo(old.ammo_id, user)
                .map(|a| a.price_per_unit * old.shots as f64)
                .unwrap_or(0.0);
            let fixed = (old.cost.unwrap_or(0.0) - old_ammo_cost).max(0.0);
            let price = new_price.unwrap_or(0.0);
            Some(metrics::cost_with_fixed(price, new_shots, fixed))
        } else {
            old.cost
        };

        if patch.touches_scores() {
            let (accuracy_percent, final_score) = metrics::derive_scores(
                updated.distance_m,
                updated.hits,
                updated.shots,
                updated.group_cm,
            );
            updated.accuracy_percent = accuracy_percent;
            updated.final_score = final_score;
        }

        let remaining_ammo = if consumption_changed {
            db.ammo(new_ammo_id, user).and_then(|a| a.units_in_package)
        } else {
            None
        };

        if let Some(slot) = db.sessions.iter_mut().find(|s| s.id == session_id) {
            *slot = updated.clone();
        }

        self.store.commit(db)?;
        tracing::info!("Updated session {}", session_id);

        let owner_id = updated.user_id.clone();
        let mut guns = vec![old.gun_id];
        if new_gun_id != old.gun_id {
            guns.push(new_gun_id);
        }
        self.run_hooks(&owner_id, &guns);

        Ok(SessionOutcome {
            session: updated,
            remaining_ammo,
        })
    }

    /// Delete a session, handing its shots back to the ammunition stock.
    ///
    /// A vanished ammunition record skips the restoration silently.
    pub fn delete_session(&self, user: &UserContext, session_id: Uuid) -> Result<()> {
        let mut db = self.store.snapshot()?;

        let session = db
            .session(session_id, user)
            .ok_or_else(|| Error::NotFound("session not found".into()))?
            .clone();

        db.adjust_ammo_stock(session.ammo_id, session.shots);
        db.sessions.retain(|s| s.id != session_id);

        self.store.commit(db)?;
        tracing::info!("Deleted session {}", session_id);

        self.run_hooks(&session.user_id, &[session.gun_id]);
        Ok(())
    }

    fn run_hooks(&self, owner_id: &str, gun_ids: &[Uuid]) {
        for hook in &self.hooks {
            for &gun_id in gun_ids {
                if let Err(e) = hook.after_session_change(self.store, owner_id, gun_id) {
                    tracing::warn!(
                        "Post-commit hook '{}' failed for gun {}: {}",
                        hook.name(),
                        gun_id,
                        e
                    );
                }
            }
        }
    }
}
