//! Incident type mapping utilities.
//!
//! Maps free-text call types from dispatch feeds (e.g. `"Aid Response"`,
//! `"SHOTS FIRED"`, `"MVI - Motor Vehicle Incident"`) onto the alert
//! taxonomy. Each feed has different naming conventions, so we use
//! case-insensitive keyword detection, checking the most dangerous
//! patterns first.

use risk_radar_alert_models::{AlertCategory, RiskLevel};

/// Category, risk and priority inferred from a raw incident type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncidentClass {
    /// Top-level category.
    pub category: AlertCategory,
    /// Inferred risk level.
    pub risk_level: RiskLevel,
    /// Inferred urgency (1 = highest).
    pub priority: u8,
}

impl IncidentClass {
    const fn new(category: AlertCategory, risk_level: RiskLevel, priority: u8) -> Self {
        Self {
            category,
            risk_level,
            priority,
        }
    }
}

/// Classifies a raw incident type string.
///
/// Returns [`AlertCategory::Other`] at [`RiskLevel::Low`] when no keyword
/// matches.
#[must_use]
pub fn map_incident_type(raw: &str) -> IncidentClass {
    let lower = raw.to_lowercase();

    // ── Life-threatening violence ───────────────────────────────────
    if contains_any(
        &lower,
        &["shooting", "shots fired", "active shooter", "homicide", "stabbing"],
    ) {
        return IncidentClass::new(AlertCategory::Crime, RiskLevel::Extreme, 1);
    }

    // ── Fire ────────────────────────────────────────────────────────
    if contains_any(
        &lower,
        &["working fire", "building fire", "residential fire", "commercial fire", "explosion"],
    ) {
        return IncidentClass::new(AlertCategory::Fire, RiskLevel::Severe, 1);
    }
    if contains_any(&lower, &["hazmat", "gas leak", "natural gas", "fuel spill"]) {
        return IncidentClass::new(AlertCategory::Fire, RiskLevel::High, 2);
    }
    if contains_any(&lower, &["fire", "smoke", "alarm"]) {
        return IncidentClass::new(AlertCategory::Fire, RiskLevel::Moderate, 3);
    }

    // ── Civil unrest (before crime: "riot" calls also mention assault) ──
    if contains_any(&lower, &["riot", "civil disturbance", "protest", "demonstration"]) {
        return IncidentClass::new(AlertCategory::CivilUnrest, RiskLevel::High, 2);
    }

    // ── Crime ───────────────────────────────────────────────────────
    if contains_any(
        &lower,
        &["robbery", "assault", "battery", "weapon", "kidnap", "carjack"],
    ) {
        return IncidentClass::new(AlertCategory::Crime, RiskLevel::High, 2);
    }
    if contains_any(
        &lower,
        &["burglary", "break-in", "prowler", "theft", "stolen", "vandal", "trespass", "suspicious"],
    ) {
        return IncidentClass::new(AlertCategory::Crime, RiskLevel::Moderate, 3);
    }
    if contains_any(&lower, &["noise", "disturbance", "welfare check"]) {
        return IncidentClass::new(AlertCategory::Crime, RiskLevel::Low, 4);
    }

    // ── Traffic ─────────────────────────────────────────────────────
    if contains_any(&lower, &["injury collision", "mvi", "vehicle accident", "hit and run", "hit & run"]) {
        return IncidentClass::new(AlertCategory::Traffic, RiskLevel::High, 2);
    }
    if contains_any(&lower, &["collision", "traffic", "crash", "road closure", "blocking"]) {
        return IncidentClass::new(AlertCategory::Traffic, RiskLevel::Moderate, 3);
    }

    // ── Medical ─────────────────────────────────────────────────────
    if contains_any(&lower, &["cardiac", "overdose", "unconscious", "trauma", "rescue"]) {
        return IncidentClass::new(AlertCategory::Medical, RiskLevel::High, 2);
    }
    if contains_any(&lower, &["aid response", "medic", "medical", "injur"]) {
        return IncidentClass::new(AlertCategory::Medical, RiskLevel::Moderate, 3);
    }

    IncidentClass::new(AlertCategory::Other, RiskLevel::Low, 5)
}

/// Checks if `haystack` contains any of the given `needles`.
fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_seattle_fire_types() {
        assert_eq!(
            map_incident_type("Aid Response").category,
            AlertCategory::Medical
        );
        assert_eq!(
            map_incident_type("Medic Response").category,
            AlertCategory::Medical
        );
        assert_eq!(
            map_incident_type("MVI - Motor Vehicle Incident").category,
            AlertCategory::Traffic
        );
        assert_eq!(
            map_incident_type("Auto Fire Alarm"),
            IncidentClass::new(AlertCategory::Fire, RiskLevel::Moderate, 3)
        );
        assert_eq!(
            map_incident_type("Residential Fire").risk_level,
            RiskLevel::Severe
        );
    }

    #[test]
    fn maps_police_call_types() {
        assert_eq!(
            map_incident_type("SHOTS FIRED"),
            IncidentClass::new(AlertCategory::Crime, RiskLevel::Extreme, 1)
        );
        assert_eq!(
            map_incident_type("ASSAULT / BATTERY").risk_level,
            RiskLevel::High
        );
        assert_eq!(
            map_incident_type("BURGLARY").category,
            AlertCategory::Crime
        );
        assert_eq!(
            map_incident_type("CIVIL DISTURBANCE").category,
            AlertCategory::CivilUnrest
        );
    }

    #[test]
    fn unknown_fallback() {
        assert_eq!(
            map_incident_type("SOME_UNRECOGNIZED_TYPE"),
            IncidentClass::new(AlertCategory::Other, RiskLevel::Low, 5)
        );
    }
}
