//! CSV export of session history.

use crate::store::Database;
use crate::{Result, UserContext};
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    date: String,
    gun: String,
    ammo: String,
    shots: i64,
    hits: Option<i64>,
    distance_m: Option<i64>,
    group_cm: Option<f64>,
    cost: Option<f64>,
    accuracy_percent: Option<f64>,
    final_score: Option<f64>,
    notes: Option<String>,
}

/// Write the caller's session history to a CSV file, oldest first.
///
/// Returns the number of rows written. Gun and ammunition names fall back
/// to the raw id when the record has been deleted since.
pub fn export_sessions(db: &Database, user: &UserContext, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut sessions: Vec<_> = db
        .sessions
        .iter()
        .filter(|s| user.can_see(&s.user_id))
        .collect();
    sessions.sort_by_key(|s| s.date);

    let mut writer = csv::Writer::from_path(path)?;
    for session in &sessions {
        let gun = db
            .firearm(session.gun_id, user)
            .map(|g| g.name.clone())
            .unwrap_or_else(|| session.gun_id.to_string());
        let ammo = db
            .ammo(session.ammo_id, user)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| session.ammo_id.to_string());

        writer.serialize(CsvRow {
            id: session.id.to_string(),
            date: session.date.to_string(),
            gun,
            ammo,
            shots: session.shots,
            hits: session.hits,
            distance_m: session.distance_m,
            group_cm: session.group_cm,
            cost: session.cost,
            accuracy_percent: session.accuracy_percent,
            final_score: session.final_score,
            notes: session.notes.clone(),
        })?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Exported {} sessions to {:?}", sessions.len(), path);
    Ok(sessions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Ammo, Firearm, ShootingSession};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn seeded_db() -> (Database, Uuid) {
        let mut db = Database::default();
        let gun_id = Uuid::new_v4();
        let ammo_id = Uuid::new_v4();
        db.guns.push(Firearm {
            id: gun_id,
            user_id: "alice".into(),
            name: "P-01".into(),
            caliber: Some("9mm".into()),
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        });
        db.ammo.push(Ammo {
            id: ammo_id,
            user_id: "alice".into(),
            name: "S&B FMJ".into(),
            caliber: Some("9x19".into()),
            price_per_unit: 2.0,
            units_in_package: Some(200),
        });
        db.sessions.push(ShootingSession {
            id: Uuid::new_v4(),
            user_id: "alice".into(),
            gun_id,
            ammo_id,
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            shots: 20,
            cost: Some(40.0),
            notes: Some("zeroing".into()),
            distance_m: Some(25),
            hits: Some(15),
            group_cm: None,
            accuracy_percent: Some(75.0),
            final_score: Some(75.0),
        });
        (db, gun_id)
    }

    #[test]
    fn test_export_writes_rows() {
        let (db, _) = seeded_db();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sessions.csv");

        let count = export_sessions(&db, &UserContext::user("alice"), &path).unwrap();
        assert_eq!(count, 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("id,date,gun,ammo"));
        assert!(contents.contains("P-01"));
        assert!(contents.contains("S&B FMJ"));
        assert!(contents.contains("zeroing"));
    }

    #[test]
    fn test_export_scopes_to_caller() {
        let (db, _) = seeded_db();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sessions.csv");

        let count = export_sessions(&db, &UserContext::user("bob"), &path).unwrap();
        assert_eq!(count, 0);
    }
}
