//! Caliber compatibility matching.
//!
//! Firearm and ammunition calibers are free text, so compatibility is a
//! heuristic: normalize both designations, accept substring matches, then
//! consult a small table of real-world equivalence groups.

use once_cell::sync::Lazy;

/// Textual variants of the same real-world caliber. Normalized form
/// (lowercase, no spaces or periods).
static EQUIVALENCE_GROUPS: Lazy<Vec<Vec<&'static str>>> = Lazy::new(|| {
    vec![
        vec!["9mm", "9x19", "9mmparabellum", "9mmpara"],
        vec!["45acp", "45apc", "45auto", "045"],
        vec!["556", "556nato", "223", "223rem"],
        vec!["762", "762nato", "762x51", "308", "308win"],
    ]
});

/// Pluggable compatibility verdict between two free-text caliber strings.
///
/// Implementations differ only in how a missing caliber is treated; the
/// comparison of two present designations is shared.
pub trait CaliberMatcher {
    fn compatible(&self, ammo_caliber: Option<&str>, gun_caliber: Option<&str>) -> bool;
}

/// A missing caliber on either side is incompatible.
///
/// This is the default policy: an unknown caliber gives the ledger nothing
/// to check, and silently accepting it lets a data-entry gap bypass the
/// whole validation.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrictCalibers;

impl CaliberMatcher for StrictCalibers {
    fn compatible(&self, ammo_caliber: Option<&str>, gun_caliber: Option<&str>) -> bool {
        match (present(ammo_caliber), present(gun_caliber)) {
            (Some(ammo), Some(gun)) => designations_match(ammo, gun),
            _ => false,
        }
    }
}

/// A missing caliber on either side is compatible.
///
/// Matches the historical backend behavior; selectable through config for
/// data sets with sparsely-filled caliber fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct PermissiveCalibers;

impl CaliberMatcher for PermissiveCalibers {
    fn compatible(&self, ammo_caliber: Option<&str>, gun_caliber: Option<&str>) -> bool {
        match (present(ammo_caliber), present(gun_caliber)) {
            (Some(ammo), Some(gun)) => designations_match(ammo, gun),
            _ => true,
        }
    }
}

/// Treat empty and whitespace-only strings as absent
fn present(caliber: Option<&str>) -> Option<&str> {
    caliber.map(str::trim).filter(|s| !s.is_empty())
}

/// Compare two present designations: substring either way, then the
/// equivalence table.
fn designations_match(ammo_caliber: &str, gun_caliber: &str) -> bool {
    let ammo = normalize(ammo_caliber);
    let gun = normalize(gun_caliber);

    if ammo.is_empty() || gun.is_empty() {
        return false;
    }

    if ammo.contains(&gun) || gun.contains(&ammo) {
        return true;
    }

    EQUIVALENCE_GROUPS
        .iter()
        .any(|group| group.contains(&ammo.as_str()) && group.contains(&gun.as_str()))
}

fn normalize(caliber: &str) -> String {
    caliber
        .to_lowercase()
        .chars()
        .filter(|c| *c != ' ' && *c != '.')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict(ammo: Option<&str>, gun: Option<&str>) -> bool {
        StrictCalibers.compatible(ammo, gun)
    }

    #[test]
    fn test_identical_calibers() {
        assert!(strict(Some("9mm"), Some("9mm")));
        assert!(strict(Some(".45 ACP"), Some("45acp")));
    }

    #[test]
    fn test_equivalence_groups() {
        assert!(strict(Some("9mm"), Some("9x19")));
        assert!(strict(Some("9mm Parabellum"), Some("9x19")));
        assert!(strict(Some("223 Rem"), Some("5.56")));
        assert!(strict(Some(".308 Win"), Some("7.62x51")));
    }

    #[test]
    fn test_substring_match() {
        assert!(strict(Some("9mm Luger"), Some("9mm")));
        assert!(strict(Some("12"), Some("12/76")));
    }

    #[test]
    fn test_mismatched_calibers() {
        assert!(!strict(Some("9mm"), Some("45 ACP")));
        assert!(!strict(Some("22lr"), Some("9x19")));
        assert!(!strict(Some("5.56"), Some("7.62x51")));
    }

    #[test]
    fn test_strict_rejects_missing() {
        assert!(!strict(None, Some("9mm")));
        assert!(!strict(Some("9mm"), None));
        assert!(!strict(None, None));
        assert!(!strict(Some("   "), Some("9mm")));
    }

    #[test]
    fn test_permissive_accepts_missing() {
        let permissive = PermissiveCalibers;
        assert!(permissive.compatible(None, Some("9mm")));
        assert!(permissive.compatible(Some("9mm"), None));
        assert!(permissive.compatible(None, None));
        // Both present still requires a real match
        assert!(!permissive.compatible(Some("9mm"), Some("45 ACP")));
    }

    #[test]
    fn test_arbitrary_text_never_panics() {
        assert!(!strict(Some("caliber? no idea!!"), Some("9mm")));
        assert!(!strict(Some("🤷"), Some("9x19")));
        assert!(strict(Some("9 . m m"), Some("9mm")));
    }
}
