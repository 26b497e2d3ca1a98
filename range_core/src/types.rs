//! Core domain types for the shooting-range log.
//!
//! This module defines the fundamental types used throughout the system:
//! - Firearm, ammunition, session and maintenance records
//! - User identity, skill level and role scoping
//! - Create payloads and three-state update patches

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identity Types
// ============================================================================

/// Role of the acting caller
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

/// Identity context resolved by the (out-of-scope) auth layer
#[derive(Clone, Debug)]
pub struct UserContext {
    pub user_id: String,
    pub role: Role,
}

impl UserContext {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::User,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    /// Whether a record owned by `owner_id` is visible to this caller
    pub fn can_see(&self, owner_id: &str) -> bool {
        self.role == Role::Admin || self.user_id == owner_id
    }
}

/// Self-declared shooting proficiency, drives the rank pass threshold
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    /// Minimum accuracy percent a session needs to count toward rank
    pub fn required_accuracy(&self) -> f64 {
        match self {
            SkillLevel::Beginner => 75.0,
            SkillLevel::Intermediate => 85.0,
            SkillLevel::Advanced => 95.0,
        }
    }
}

/// A registered user with the rank cache
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub skill_level: SkillLevel,
    #[serde(default)]
    pub rank: Option<String>,
}

// ============================================================================
// Record Types
// ============================================================================

/// A firearm owned by exactly one user
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Firearm {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub caliber: Option<String>,
    pub created_at: NaiveDate,
}

/// An ammunition package; `units_in_package` is the live stock count,
/// None meaning unknown/unbounded
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ammo {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub caliber: Option<String>,
    pub price_per_unit: f64,
    pub units_in_package: Option<i64>,
}

/// One range visit; the unit of ammunition consumption
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShootingSession {
    pub id: Uuid,
    pub user_id: String,
    pub gun_id: Uuid,
    pub ammo_id: Uuid,
    pub date: NaiveDate,
    pub shots: i64,
    pub cost: Option<f64>,
    pub notes: Option<String>,
    pub distance_m: Option<i64>,
    pub hits: Option<i64>,
    pub group_cm: Option<f64>,
    pub accuracy_percent: Option<f64>,
    pub final_score: Option<f64>,
}

/// A maintenance event for a firearm.
///
/// For the newest record of a firearm, `rounds_since_last` counts shots
/// fired strictly after its date; for older records it counts shots fired
/// between the previous record and this one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Maintenance {
    pub id: Uuid,
    pub user_id: String,
    pub gun_id: Uuid,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub activities: Option<String>,
    pub rounds_since_last: i64,
}

// ============================================================================
// Create Payloads
// ============================================================================

/// Input for creating a session
#[derive(Clone, Debug, Default)]
pub struct SessionDraft {
    pub gun_id: Uuid,
    pub ammo_id: Uuid,
    pub date: Option<NaiveDate>,
    pub shots: i64,
    pub cost: Option<f64>,
    pub notes: Option<String>,
    pub distance_m: Option<i64>,
    pub hits: Option<i64>,
    pub group_cm: Option<f64>,
}

/// Input for creating a maintenance record
#[derive(Clone, Debug, Default)]
pub struct MaintenanceDraft {
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub activities: Option<String>,
    /// Explicit override; zero or None means "compute from session history"
    pub rounds_since_last: Option<i64>,
}

// ============================================================================
// Update Patches
// ============================================================================

/// Three-state update field: untouched, explicitly cleared, or set.
///
/// Distinguishes "field omitted from the payload" from "field set to null",
/// which a plain `Option<Option<T>>` obscures at call sites.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Patch<T> {
    #[default]
    Omit,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_omitted(&self) -> bool {
        matches!(self, Patch::Omit)
    }

    /// Resolve against the current value: Omit keeps it, Clear drops it,
    /// Set replaces it.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Omit => current,
            Patch::Clear => None,
            Patch::Set(value) => Some(value),
        }
    }

    pub fn as_ref(&self) -> Patch<&T> {
        match self {
            Patch::Omit => Patch::Omit,
            Patch::Clear => Patch::Clear,
            Patch::Set(value) => Patch::Set(value),
        }
    }
}

/// Partial update for a session.
///
/// `gun_id`, `ammo_id`, `date` and `shots` can only be replaced, never
/// cleared; the optional measurement fields use the full three-state form.
#[derive(Clone, Debug, Default)]
pub struct SessionPatch {
    pub gun_id: Option<Uuid>,
    pub ammo_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub shots: Option<i64>,
    pub cost: Option<f64>,
    pub notes: Patch<String>,
    pub distance_m: Patch<i64>,
    pub hits: Patch<i64>,
    pub group_cm: Patch<f64>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self.gun_id.is_none()
            && self.ammo_id.is_none()
            && self.date.is_none()
            && self.shots.is_none()
            && self.cost.is_none()
            && self.notes.is_omitted()
            && self.distance_m.is_omitted()
            && self.hits.is_omitted()
            && self.group_cm.is_omitted()
    }

    /// True when any field feeding accuracy/final-score is touched
    pub fn touches_scores(&self) -> bool {
        self.shots.is_some()
            || !self.distance_m.is_omitted()
            || !self.hits.is_omitted()
            || !self.group_cm.is_omitted()
    }
}

/// Partial update for a maintenance record
#[derive(Clone, Debug, Default)]
pub struct MaintenancePatch {
    pub date: Option<NaiveDate>,
    pub notes: Patch<String>,
    pub activities: Patch<String>,
    pub rounds_since_last: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_apply() {
        assert_eq!(Patch::<i64>::Omit.apply(Some(3)), Some(3));
        assert_eq!(Patch::<i64>::Clear.apply(Some(3)), None);
        assert_eq!(Patch::Set(7).apply(Some(3)), Some(7));
        assert_eq!(Patch::Set(7).apply(None), Some(7));
    }

    #[test]
    fn test_empty_session_patch() {
        let patch = SessionPatch::default();
        assert!(patch.is_empty());
        assert!(!patch.touches_scores());
    }

    #[test]
    fn test_patch_touches_scores() {
        let patch = SessionPatch {
            hits: Patch::Clear,
            ..Default::default()
        };
        assert!(!patch.is_empty());
        assert!(patch.touches_scores());

        let patch = SessionPatch {
            notes: Patch::Set("windy day".into()),
            ..Default::default()
        };
        assert!(!patch.touches_scores());
    }

    #[test]
    fn test_visibility_scoping() {
        let owner = UserContext::user("alice");
        assert!(owner.can_see("alice"));
        assert!(!owner.can_see("bob"));

        let admin = UserContext::admin("root");
        assert!(admin.can_see("alice"));
    }

    #[test]
    fn test_required_accuracy_per_level() {
        assert_eq!(SkillLevel::Beginner.required_accuracy(), 75.0);
        assert_eq!(SkillLevel::Intermediate.required_accuracy(), 85.0);
        assert_eq!(SkillLevel::Advanced.required_accuracy(), 95.0);
    }
}
