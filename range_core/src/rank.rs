//! Rank engine: mapping a user's passed-session count to a named tier.
//!
//! A session passes when its accuracy meets the threshold for the user's
//! skill level. The stored rank is a cache of this computation, refreshed
//! after every session mutation and corrected whenever it disagrees with a
//! fresh recomputation.

use crate::ledger::PostCommitHook;
use crate::metrics;
use crate::store::{Database, RecordStore};
use crate::{Result, User, UserContext};
use once_cell::sync::Lazy;
use serde::Serialize;
use uuid::Uuid;

/// One tier of the ladder: a closed range of passed-session counts
struct RankTier {
    min: i64,
    max: i64,
    name: &'static str,
}

const fn tier(min: i64, max: i64, name: &'static str) -> RankTier {
    RankTier { min, max, name }
}

/// The rank ladder, ascending. The final tier is open-ended.
static RANK_LADDER: Lazy<Vec<RankTier>> = Lazy::new(|| {
    vec![
        tier(0, 4, "Novice"),
        tier(5, 9, "Apprentice"),
        tier(10, 14, "Steady Shooter"),
        tier(15, 19, "Sharp Shooter"),
        tier(20, 29, "Precise Shooter"),
        tier(30, 39, "Advanced Shooter"),
        tier(40, 49, "Quick Operator"),
        tier(50, 59, "Sure Hand"),
        tier(60, 69, "Tactician"),
        tier(70, 79, "Accuracy Specialist"),
        tier(80, 89, "Accuracy Expert"),
        tier(90, 99, "Field Marksman"),
        tier(100, 109, "Analyst"),
        tier(110, 119, "Tactical Marksman"),
        tier(120, 129, "Range Veteran"),
        tier(130, 139, "Master of Control"),
        tier(140, 149, "Precision Elite"),
        tier(150, 169, "Target Dominator"),
        tier(170, 199, "Master of the Firing Line"),
        tier(200, i64::MAX, "Range Legend"),
    ]
});

/// Rank name for a passed-session count
pub fn rank_name(passed_sessions: i64) -> &'static str {
    RANK_LADDER[tier_index(passed_sessions)].name
}

fn tier_index(passed_sessions: i64) -> usize {
    let passed = passed_sessions.max(0);
    RANK_LADDER
        .iter()
        .position(|t| passed >= t.min && passed <= t.max)
        .unwrap_or(0)
}

fn tier_index_by_name(name: &str) -> Option<usize> {
    RANK_LADDER.iter().position(|t| t.name == name)
}

/// Count the user's sessions meeting their skill-level accuracy threshold.
///
/// Uses the stored accuracy when present, falls back to hits/shots, and
/// skips sessions whose accuracy lies outside [0, 100].
pub fn count_passed_sessions(db: &Database, user: &User) -> i64 {
    let required = user.skill_level.required_accuracy();
    let mut passed = 0;

    for session in db.sessions_for_user(&user.user_id) {
        let accuracy = session.accuracy_percent.or_else(|| match session.hits {
            Some(hits) if session.shots > 0 => {
                Some(metrics::accuracy_percent(hits, session.shots))
            }
            _ => None,
        });

        if let Some(accuracy) = accuracy {
            if !(0.0..=100.0).contains(&accuracy) {
                tracing::warn!(
                    "Session {}: accuracy {}% out of range, skipped for rank",
                    session.id,
                    accuracy
                );
                continue;
            }
            if accuracy >= required {
                passed += 1;
            }
        }
    }

    passed
}

/// Full rank picture for a user
#[derive(Clone, Debug, Serialize)]
pub struct RankInfo {
    pub rank: String,
    pub passed_sessions: i64,
    pub current_rank_min: i64,
    pub current_rank_max: i64,
    pub next_rank: Option<String>,
    pub next_rank_min: Option<i64>,
    pub progress_percent: f64,
    pub sessions_to_next_rank: i64,
    pub is_max_rank: bool,
}

/// Compute the rank info for a user against a database snapshot
pub fn rank_info_for(db: &Database, user: &User) -> RankInfo {
    let passed = count_passed_sessions(db, user);
    let index = tier_index(passed);
    let current = &RANK_LADDER[index];
    let is_max_rank = index == RANK_LADDER.len() - 1;

    let (next_rank, next_rank_min) = if is_max_rank {
        (None, None)
    } else {
        let next = &RANK_LADDER[index + 1];
        (Some(next.name.to_string()), Some(next.min))
    };

    let (progress_percent, sessions_to_next_rank) = match next_rank_min {
        None => (100.0, 0),
        Some(next_min) => {
            let span = (next_min - current.min).max(1);
            let in_span = (passed - current.min).max(0);
            let percent = (in_span as f64 / span as f64 * 100.0).clamp(0.0, 100.0);
            (percent, (next_min - passed).max(0))
        }
    };

    RankInfo {
        rank: current.name.to_string(),
        passed_sessions: passed,
        current_rank_min: current.min,
        current_rank_max: current.max,
        next_rank,
        next_rank_min,
        progress_percent,
        sessions_to_next_rank,
        is_max_rank,
    }
}

/// Recompute and store the user's rank; returns true when the stored value
/// changed. An unknown user record is created so the cache has somewhere
/// to live.
pub fn update_user_rank_in(db: &mut Database, user_id: &str) -> bool {
    let user = db.user(user_id).cloned().unwrap_or_else(|| User {
        user_id: user_id.to_string(),
        skill_level: Default::default(),
        rank: None,
    });

    let passed = count_passed_sessions(db, &user);
    let new_rank = rank_name(passed);

    let stored_is_valid = user
        .rank
        .as_deref()
        .map_or(false, |r| tier_index_by_name(r).is_some());

    if stored_is_valid && user.rank.as_deref() == Some(new_rank) {
        return false;
    }

    if let Some(old) = &user.rank {
        tracing::info!(
            "User {}: rank '{}' -> '{}' ({} passed sessions)",
            user_id,
            old,
            new_rank,
            passed
        );
    }

    db.upsert_user(User {
        rank: Some(new_rank.to_string()),
        ..user
    });
    true
}

/// Rank service over a record store
pub struct RankService<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> RankService<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Rank info for a user id; an unregistered user reports the bottom
    /// tier with default skill level
    pub fn rank_info(&self, user_id: &str) -> Result<RankInfo> {
        let db = self.store.snapshot()?;
        let user = db.user(user_id).cloned().unwrap_or_else(|| User {
            user_id: user_id.to_string(),
            skill_level: Default::default(),
            rank: None,
        });
        Ok(rank_info_for(&db, &user))
    }

    /// Recompute the rank and persist it when it moved; returns the
    /// current rank name
    pub fn update_user_rank(&self, user_id: &str) -> Result<String> {
        let mut db = self.store.snapshot()?;
        let changed = update_user_rank_in(&mut db, user_id);
        let name = db
            .user(user_id)
            .and_then(|u| u.rank.clone())
            .unwrap_or_else(|| rank_name(0).to_string());
        if changed {
            self.store.commit(db)?;
        }
        Ok(name)
    }
}

/// Post-commit hook refreshing the owner's cached rank
pub struct RankRefreshHook;

impl PostCommitHook for RankRefreshHook {
    fn name(&self) -> &'static str {
        "rank-refresh"
    }

    fn after_session_change(
        &self,
        store: &dyn RecordStore,
        owner_id: &str,
        _gun_id: Uuid,
    ) -> Result<()> {
        let mut db = store.snapshot()?;
        if update_user_rank_in(&mut db, owner_id) {
            store.commit(db)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{ShootingSession, SkillLevel};
    use chrono::NaiveDate;

    fn session_with_accuracy(user_id: &str, accuracy: f64) -> ShootingSession {
        ShootingSession {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            gun_id: Uuid::new_v4(),
            ammo_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            shots: 10,
            cost: None,
            notes: None,
            distance_m: Some(25),
            hits: None,
            group_cm: None,
            accuracy_percent: Some(accuracy),
            final_score: None,
        }
    }

    fn user(skill_level: SkillLevel) -> User {
        User {
            user_id: "alice".into(),
            skill_level,
            rank: None,
        }
    }

    #[test]
    fn test_ladder_names() {
        assert_eq!(rank_name(0), "Novice");
        assert_eq!(rank_name(4), "Novice");
        assert_eq!(rank_name(5), "Apprentice");
        assert_eq!(rank_name(199), "Master of the Firing Line");
        assert_eq!(rank_name(200), "Range Legend");
        assert_eq!(rank_name(5000), "Range Legend");
        assert_eq!(rank_name(-3), "Novice");
    }

    #[test]
    fn test_rank_is_monotone_in_passed_count() {
        let mut last_index = 0;
        for passed in 0..250 {
            let index = tier_index(passed);
            assert!(index >= last_index);
            last_index = index;
        }
    }

    #[test]
    fn test_count_passed_per_skill_level() {
        let mut db = Database::default();
        db.sessions.push(session_with_accuracy("alice", 80.0));
        db.sessions.push(session_with_accuracy("alice", 90.0));
        db.sessions.push(session_with_accuracy("alice", 96.0));

        assert_eq!(count_passed_sessions(&db, &user(SkillLevel::Beginner)), 3);
        assert_eq!(
            count_passed_sessions(&db, &user(SkillLevel::Intermediate)),
            2
        );
        assert_eq!(count_passed_sessions(&db, &user(SkillLevel::Advanced)), 1);
    }

    #[test]
    fn test_count_passed_falls_back_to_hits() {
        let mut db = Database::default();
        let mut s = session_with_accuracy("alice", 0.0);
        s.accuracy_percent = None;
        s.hits = Some(8);
        db.sessions.push(s);

        assert_eq!(count_passed_sessions(&db, &user(SkillLevel::Beginner)), 1);
    }

    #[test]
    fn test_count_passed_skips_out_of_range_accuracy() {
        let mut db = Database::default();
        db.sessions.push(session_with_accuracy("alice", 140.0));
        db.sessions.push(session_with_accuracy("alice", 80.0));

        assert_eq!(count_passed_sessions(&db, &user(SkillLevel::Beginner)), 1);
    }

    #[test]
    fn test_rank_advances_at_five_passed() {
        let mut db = Database::default();
        for _ in 0..5 {
            db.sessions.push(session_with_accuracy("alice", 80.0));
        }
        // A failing session does not move the count
        db.sessions.push(session_with_accuracy("alice", 60.0));
        db.users.push(user(SkillLevel::Beginner));

        let info = rank_info_for(&db, db.user("alice").unwrap());
        assert_eq!(info.passed_sessions, 5);
        assert_eq!(info.rank, "Apprentice");
        assert_eq!(info.next_rank.as_deref(), Some("Steady Shooter"));
        assert_eq!(info.sessions_to_next_rank, 5);
        assert_eq!(info.progress_percent, 0.0);
        assert!(!info.is_max_rank);
    }

    #[test]
    fn test_progress_within_tier() {
        let mut db = Database::default();
        for _ in 0..7 {
            db.sessions.push(session_with_accuracy("alice", 80.0));
        }
        db.users.push(user(SkillLevel::Beginner));

        let info = rank_info_for(&db, db.user("alice").unwrap());
        assert_eq!(info.passed_sessions, 7);
        assert_eq!(info.current_rank_min, 5);
        assert_eq!(info.progress_percent, 40.0);
        assert_eq!(info.sessions_to_next_rank, 3);
    }

    #[test]
    fn test_max_rank_reports_complete() {
        let mut db = Database::default();
        for _ in 0..210 {
            db.sessions.push(session_with_accuracy("alice", 80.0));
        }
        db.users.push(user(SkillLevel::Beginner));

        let info = rank_info_for(&db, db.user("alice").unwrap());
        assert!(info.is_max_rank);
        assert_eq!(info.rank, "Range Legend");
        assert_eq!(info.progress_percent, 100.0);
        assert_eq!(info.sessions_to_next_rank, 0);
        assert_eq!(info.next_rank, None);
    }

    #[test]
    fn test_update_user_rank_corrects_invalid_cache() {
        let mut db = Database::default();
        db.users.push(User {
            user_id: "alice".into(),
            skill_level: SkillLevel::Beginner,
            rank: Some("Space Marshal".into()),
        });

        assert!(update_user_rank_in(&mut db, "alice"));
        assert_eq!(db.user("alice").unwrap().rank.as_deref(), Some("Novice"));

        // Stable once corrected
        assert!(!update_user_rank_in(&mut db, "alice"));
    }

    #[test]
    fn test_rank_service_persists() {
        let store = MemoryStore::new();
        {
            let mut db = store.snapshot().unwrap();
            for _ in 0..5 {
                db.sessions.push(session_with_accuracy("alice", 80.0));
            }
            store.commit(db).unwrap();
        }
        let service = RankService::new(&store);

        let name = service.update_user_rank("alice").unwrap();
        assert_eq!(name, "Apprentice");

        let db = store.snapshot().unwrap();
        assert_eq!(db.user("alice").unwrap().rank.as_deref(), Some("Apprentice"));
    }
}
