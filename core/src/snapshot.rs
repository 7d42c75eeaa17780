//! Save records: versioned, self-contained copies of PlayerState.
//!
//! A record holds source data only. `click_yield` and `production_rate`
//! are never written, and never read back: the engine recomputes them
//! after every restore, so a hand-edited save cannot desync them.

use crate::{
    config::{Catalog, GameConfig},
    error::{EngineError, EngineResult},
    state::{Multipliers, OwnedBuilding, PlayerState, Settings, Stats},
    types::{BuildingId, Timestamp, UpgradeId},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    pub schema_version:     String,
    pub currency:           f64,
    pub total_earned:       f64,
    #[serde(deserialize_with = "buildings_full_or_counts")]
    pub owned_buildings:    BTreeMap<BuildingId, OwnedBuilding>,
    #[serde(deserialize_with = "upgrade_set_or_flags")]
    pub purchased_upgrades: BTreeSet<UpgradeId>,
    pub multipliers:        Multipliers,
    pub stats:              Stats,
    #[serde(default)]
    pub settings:           Settings,
    pub captured_at:        Timestamp,
}

/// Older saves stored upgrades as `{ "id": true }`; current ones as a list.
fn upgrade_set_or_flags<'de, D>(deserializer: D) -> Result<BTreeSet<UpgradeId>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Set(BTreeSet<UpgradeId>),
        Flags(BTreeMap<UpgradeId, bool>),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Set(set) => set,
        Repr::Flags(flags) => flags
            .into_iter()
            .filter_map(|(id, purchased)| purchased.then_some(id))
            .collect(),
    })
}

/// Buildings may be stored as `{ "id": { "count": n, ... } }` or as bare
/// counts `{ "id": n }`. Bare counts carry no spend history.
fn buildings_full_or_counts<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<BuildingId, OwnedBuilding>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Count(u32),
        Full(OwnedBuilding),
    }

    let entries = BTreeMap::<BuildingId, Entry>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .map(|(id, entry)| {
            let owned = match entry {
                Entry::Count(count) => OwnedBuilding { count, total_spent: 0.0 },
                Entry::Full(owned) => owned,
            };
            (id, owned)
        })
        .collect())
}

impl SaveRecord {
    /// Parse a serialized record, checking its version tag before the body.
    /// A record from another schema may have a different layout, so its body
    /// is never parsed against this one.
    pub fn from_json(json: &str, expected_version: &str) -> EngineResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| EngineError::MalformedRecord(format!("not JSON: {e}")))?;
        let found = value
            .get("schemaVersion")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| EngineError::MalformedRecord("missing schemaVersion".into()))?;
        if found != expected_version {
            return Err(EngineError::IncompatibleSchema {
                expected: expected_version.to_string(),
                found:    found.to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| EngineError::MalformedRecord(e.to_string()))
    }

    pub fn capture(state: &PlayerState, config: &GameConfig, captured_at: Timestamp) -> Self {
        Self {
            schema_version:     config.schema_version.clone(),
            currency:           state.currency,
            total_earned:       state.total_earned,
            owned_buildings:    state.owned_buildings.clone(),
            purchased_upgrades: state.purchased_upgrades.clone(),
            multipliers:        state.multipliers.clone(),
            stats:              state.stats.clone(),
            settings:           state.settings,
            captured_at,
        }
    }

    /// Rebuild a PlayerState from this record, checking it against the
    /// catalog and the state invariants. Derived fields come back at their
    /// defaults; the caller recomputes them.
    pub fn to_state(&self, catalog: &Catalog, config: &GameConfig) -> EngineResult<PlayerState> {
        if self.schema_version != config.schema_version {
            return Err(EngineError::IncompatibleSchema {
                expected: config.schema_version.clone(),
                found:    self.schema_version.clone(),
            });
        }
        self.validate(catalog)?;

        let mut state = PlayerState::new(catalog, config, self.stats.session_start);
        state.currency = self.currency;
        state.total_earned = self.total_earned;
        for (id, owned) in &self.owned_buildings {
            state.owned_buildings.insert(id.clone(), *owned);
        }
        state.purchased_upgrades = self.purchased_upgrades.clone();
        state.multipliers.click = self.multipliers.click;
        state.multipliers.global = self.multipliers.global;
        for (id, factor) in &self.multipliers.per_building {
            state.multipliers.per_building.insert(id.clone(), *factor);
        }
        state.stats = self.stats.clone();
        state.settings = self.settings;
        Ok(state)
    }

    fn validate(&self, catalog: &Catalog) -> EngineResult<()> {
        let malformed = |msg: String| Err(EngineError::MalformedRecord(msg));

        if !non_negative(self.currency) || !non_negative(self.total_earned) {
            return malformed("balances must be finite and non-negative".into());
        }
        if self.currency > self.total_earned {
            return malformed(format!(
                "currency {} exceeds lifetime earnings {}",
                self.currency, self.total_earned
            ));
        }
        for (id, owned) in &self.owned_buildings {
            if !catalog.has_building(id) {
                return malformed(format!("unknown building '{id}'"));
            }
            if !non_negative(owned.total_spent) {
                return malformed(format!("building '{id}': total spent must be non-negative"));
            }
        }
        for id in &self.purchased_upgrades {
            if !catalog.has_upgrade(id) {
                return malformed(format!("unknown upgrade '{id}'"));
            }
        }
        if !at_least_one(self.multipliers.click) || !at_least_one(self.multipliers.global) {
            return malformed("click and global multipliers must be at least 1".into());
        }
        for (id, factor) in &self.multipliers.per_building {
            if !catalog.has_building(id) {
                return malformed(format!("multiplier for unknown building '{id}'"));
            }
            if !at_least_one(*factor) {
                return malformed(format!("building '{id}': multiplier must be at least 1"));
            }
        }
        Ok(())
    }
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

fn at_least_one(v: f64) -> bool {
    v.is_finite() && v >= 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn fixture() -> (Catalog, GameConfig, SaveRecord) {
        let catalog = Catalog::builtin().unwrap();
        let config = GameConfig::default();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let mut state = PlayerState::new(&catalog, &config, at);
        state.currency = 40.0;
        state.total_earned = 90.0;
        state.owned_buildings.insert("cursor".into(), OwnedBuilding { count: 3, total_spent: 50.0 });
        let record = SaveRecord::capture(&state, &config, at);
        (catalog, config, record)
    }

    #[test]
    fn json_keys_are_camel_case() {
        let (_, _, record) = fixture();
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("schemaVersion").is_some());
        assert!(json.get("totalEarned").is_some());
        assert!(json.get("ownedBuildings").is_some());
        assert!(json["multipliers"].get("perBuilding").is_some());
        assert!(json["stats"].get("sessionStart").is_some());
        assert!(json.get("capturedAt").is_some());
        assert!(json.get("clickYield").is_none(), "derived fields must not be saved");
    }

    #[test]
    fn upgrade_flags_map_is_accepted() {
        let (_, _, record) = fixture();
        let mut json = serde_json::to_value(&record).unwrap();
        json["purchasedUpgrades"] =
            serde_json::json!({ "click_upgrade_1": true, "click_upgrade_2": false });
        let parsed: SaveRecord = serde_json::from_value(json).unwrap();
        assert_eq!(
            parsed.purchased_upgrades,
            BTreeSet::from(["click_upgrade_1".to_string()])
        );
    }

    #[test]
    fn bare_building_counts_are_accepted() {
        let (_, _, record) = fixture();
        let mut json = serde_json::to_value(&record).unwrap();
        json["ownedBuildings"] = serde_json::json!({ "cursor": 4, "grandma": { "count": 2 } });
        let parsed: SaveRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.owned_buildings["cursor"], OwnedBuilding { count: 4, total_spent: 0.0 });
        assert_eq!(parsed.owned_buildings["grandma"].count, 2);
    }

    #[test]
    fn missing_field_fails_to_parse() {
        let (_, _, record) = fixture();
        let mut json = serde_json::to_value(&record).unwrap();
        json.as_object_mut().unwrap().remove("currency");
        assert!(serde_json::from_value::<SaveRecord>(json).is_err());
    }

    #[test]
    fn absent_buildings_default_to_zero() {
        let (catalog, config, mut record) = fixture();
        record.owned_buildings.retain(|id, _| id == "cursor");
        let state = record.to_state(&catalog, &config).unwrap();
        assert_eq!(state.count_of("cursor"), 3);
        assert_eq!(state.count_of("farm"), 0);
        assert_eq!(state.owned_buildings.len(), catalog.buildings().len());
    }

    #[test]
    fn invariant_violations_are_malformed() {
        let (catalog, config, record) = fixture();

        let mut r = record.clone();
        r.currency = r.total_earned + 1.0;
        assert!(matches!(r.to_state(&catalog, &config), Err(EngineError::MalformedRecord(_))));

        let mut r = record.clone();
        r.multipliers.global = 0.5;
        assert!(matches!(r.to_state(&catalog, &config), Err(EngineError::MalformedRecord(_))));

        let mut r = record.clone();
        r.owned_buildings.insert("castle".into(), OwnedBuilding::default());
        assert!(matches!(r.to_state(&catalog, &config), Err(EngineError::MalformedRecord(_))));

        let mut r = record.clone();
        r.purchased_upgrades.insert("ghost".into());
        assert!(matches!(r.to_state(&catalog, &config), Err(EngineError::MalformedRecord(_))));

        let mut r = record;
        r.currency = f64::NAN;
        assert!(matches!(r.to_state(&catalog, &config), Err(EngineError::MalformedRecord(_))));
    }

    #[test]
    fn from_json_checks_version_before_layout() {
        let foreign = r#"{ "schemaVersion": "2.0.0", "wallet": { "currency": 5 } }"#;
        match SaveRecord::from_json(foreign, "1.0.0") {
            Err(EngineError::IncompatibleSchema { expected, found }) => {
                assert_eq!(expected, "1.0.0");
                assert_eq!(found, "2.0.0");
            }
            other => panic!("expected IncompatibleSchema, got {other:?}"),
        }
    }

    #[test]
    fn from_json_reports_bad_data_as_malformed() {
        for json in ["{ not json", r#"{ "currency": 5 }"#, r#"{ "schemaVersion": "1.0.0" }"#] {
            assert!(
                matches!(SaveRecord::from_json(json, "1.0.0"), Err(EngineError::MalformedRecord(_))),
                "{json} was not reported as malformed"
            );
        }

        let (_, _, record) = fixture();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(SaveRecord::from_json(&json, "1.0.0").unwrap(), record);
    }

    #[test]
    fn version_checked_before_contents() {
        let (catalog, config, mut record) = fixture();
        record.schema_version = "0.9.0".into();
        record.currency = -1.0;
        assert!(matches!(
            record.to_state(&catalog, &config),
            Err(EngineError::IncompatibleSchema { .. })
        ));
    }
}
