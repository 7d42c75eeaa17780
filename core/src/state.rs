//! Mutable player state owned by the engine.
//!
//! RULE: Only engine.rs and snapshot.rs mutate PlayerState.
//! Derived fields (`click_yield`, `production_rate`) are written solely by
//! `Engine::recompute_derived`; everything else is source data.

use crate::{
    config::{Catalog, GameConfig},
    types::{BuildingId, Timestamp, UpgradeId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedBuilding {
    pub count:       u32,
    /// Lifetime currency spent on this building.
    #[serde(default)]
    pub total_spent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Multipliers {
    pub click:        f64,
    pub global:       f64,
    pub per_building: BTreeMap<BuildingId, f64>,
}

impl Multipliers {
    fn neutral(catalog: &Catalog) -> Self {
        Self {
            click:        1.0,
            global:       1.0,
            per_building: catalog.buildings().iter().map(|b| (b.id.clone(), 1.0)).collect(),
        }
    }

    pub fn for_building(&self, id: &str) -> f64 {
        self.per_building.get(id).copied().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_clicks:      u64,
    pub play_time_elapsed: Duration,
    pub session_start:     Timestamp,
}

/// Host preferences carried in the save. Not touched by `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub auto_save: bool,
    pub sound:     bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { auto_save: true, sound: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub currency:           f64,
    pub total_earned:       f64,
    pub owned_buildings:    BTreeMap<BuildingId, OwnedBuilding>,
    pub purchased_upgrades: BTreeSet<UpgradeId>,
    pub multipliers:        Multipliers,
    pub stats:              Stats,
    pub settings:           Settings,
    click_yield:            f64,
    production_rate:        f64,
}

impl PlayerState {
    /// Fresh state: nothing owned, every multiplier at 1.
    pub fn new(catalog: &Catalog, config: &GameConfig, session_start: Timestamp) -> Self {
        Self {
            currency:           0.0,
            total_earned:       0.0,
            owned_buildings:    catalog
                .buildings()
                .iter()
                .map(|b| (b.id.clone(), OwnedBuilding::default()))
                .collect(),
            purchased_upgrades: BTreeSet::new(),
            multipliers:        Multipliers::neutral(catalog),
            stats:              Stats {
                total_clicks:      0,
                play_time_elapsed: Duration::ZERO,
                session_start,
            },
            settings:           Settings::default(),
            click_yield:        config.base_click_value,
            production_rate:    0.0,
        }
    }

    pub fn click_yield(&self) -> f64 {
        self.click_yield
    }

    pub fn production_rate(&self) -> f64 {
        self.production_rate
    }

    pub fn count_of(&self, id: &str) -> u32 {
        self.owned_buildings.get(id).map(|b| b.count).unwrap_or(0)
    }

    pub fn has_upgrade(&self, id: &str) -> bool {
        self.purchased_upgrades.contains(id)
    }

    /// Credit currency earned from clicks or production.
    pub(crate) fn earn(&mut self, amount: f64) {
        self.currency += amount;
        self.total_earned += amount;
    }

    pub(crate) fn set_derived(&mut self, click_yield: f64, production_rate: f64) {
        self.click_yield = click_yield;
        self.production_rate = production_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn fresh_state_covers_every_catalog_building() {
        let catalog = Catalog::builtin().unwrap();
        let state = PlayerState::new(&catalog, &GameConfig::default(), Utc::now());

        assert_eq!(state.owned_buildings.len(), catalog.buildings().len());
        assert_eq!(state.multipliers.per_building.len(), catalog.buildings().len());
        assert!(state.owned_buildings.values().all(|b| b.count == 0));
        assert!(state.multipliers.per_building.values().all(|m| *m == 1.0));
        assert_eq!(state.click_yield(), 1.0);
        assert_eq!(state.production_rate(), 0.0);
    }

    #[test]
    fn earn_credits_both_balances() {
        let catalog = Catalog::builtin().unwrap();
        let mut state = PlayerState::new(&catalog, &GameConfig::default(), Utc::now());
        state.earn(2.5);
        state.currency -= 1.0;
        state.earn(0.5);
        assert_eq!(state.currency, 2.0);
        assert_eq!(state.total_earned, 3.0);
    }

    #[test]
    fn settings_default_on() {
        let s: Settings = serde_json::from_str("{}").unwrap();
        assert!(s.auto_save);
        assert!(s.sound);
    }
}
