//! Static game data: the building/upgrade catalog and engine tunables.
//!
//! RULE: Catalog data is immutable once loaded.
//! The engine holds it behind an `Arc` and never writes to it.

use crate::{
    error::{EngineError, EngineResult},
    types::{BuildingId, UpgradeId},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const BUILTIN_CATALOG: &str = include_str!("../../data/catalog.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingDef {
    pub id:              BuildingId,
    #[serde(default)]
    pub name:            String,
    #[serde(default)]
    pub description:     String,
    pub base_cost:       f64,
    pub cost_multiplier: f64,
    pub base_production: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDef {
    pub id:          UpgradeId,
    #[serde(default)]
    pub name:        String,
    #[serde(default)]
    pub description: String,
    pub cost:        f64,
    pub effect:      Effect,
    #[serde(default)]
    pub requirement: Option<Requirement>,
}

/// What an upgrade does once bought. Factors multiply the matching
/// multiplier; they are never added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    ClickMultiplier    { factor: f64 },
    BuildingMultiplier { building: BuildingId, factor: f64 },
    GlobalMultiplier   { factor: f64 },
}

impl Effect {
    pub fn factor(&self) -> f64 {
        match self {
            Effect::ClickMultiplier { factor }
            | Effect::BuildingMultiplier { factor, .. }
            | Effect::GlobalMultiplier { factor } => *factor,
        }
    }
}

/// Gate on an upgrade's availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Requirement {
    OwnsBuilding { building: BuildingId, count: u32 },
    HasUpgrade   { upgrade: UpgradeId },
    TotalEarned  { amount: f64 },
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    buildings: Vec<BuildingDef>,
    upgrades:  Vec<UpgradeDef>,
}

/// The full, validated set of building and upgrade definitions.
/// Order is display order and is preserved from the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    buildings: Vec<BuildingDef>,
    upgrades:  Vec<UpgradeDef>,
}

impl Catalog {
    /// Build a catalog from definitions, validating every cross reference.
    pub fn new(buildings: Vec<BuildingDef>, upgrades: Vec<UpgradeDef>) -> EngineResult<Self> {
        let catalog = Self { buildings, upgrades };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The catalog bundled with the crate (`data/catalog.json`).
    pub fn builtin() -> EngineResult<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.buildings, file.upgrades)
    }

    /// Load from `{data_dir}/catalog.json`.
    pub fn load(data_dir: &str) -> EngineResult<Self> {
        let path = format!("{data_dir}/catalog.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Self::from_json(&content)
    }

    pub fn buildings(&self) -> &[BuildingDef] {
        &self.buildings
    }

    pub fn upgrades(&self) -> &[UpgradeDef] {
        &self.upgrades
    }

    pub fn building(&self, id: &str) -> EngineResult<&BuildingDef> {
        self.buildings
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| EngineError::UnknownBuilding { id: id.to_string() })
    }

    pub fn upgrade(&self, id: &str) -> EngineResult<&UpgradeDef> {
        self.upgrades
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| EngineError::UnknownUpgrade { id: id.to_string() })
    }

    pub fn has_building(&self, id: &str) -> bool {
        self.buildings.iter().any(|b| b.id == id)
    }

    pub fn has_upgrade(&self, id: &str) -> bool {
        self.upgrades.iter().any(|u| u.id == id)
    }

    fn validate(&self) -> EngineResult<()> {
        let invalid = |msg: String| Err(EngineError::InvalidCatalog(msg));

        let mut seen = HashSet::new();
        for b in &self.buildings {
            if !seen.insert(b.id.as_str()) {
                return invalid(format!("duplicate building id '{}'", b.id));
            }
            if !(b.base_cost.is_finite() && b.base_cost > 0.0) {
                return invalid(format!("building '{}': base_cost must be positive", b.id));
            }
            if !(b.cost_multiplier.is_finite() && b.cost_multiplier > 1.0) {
                return invalid(format!("building '{}': cost_multiplier must exceed 1", b.id));
            }
            if !(b.base_production.is_finite() && b.base_production >= 0.0) {
                return invalid(format!("building '{}': base_production must be non-negative", b.id));
            }
        }

        let mut seen = HashSet::new();
        for u in &self.upgrades {
            if !seen.insert(u.id.as_str()) {
                return invalid(format!("duplicate upgrade id '{}'", u.id));
            }
            if !(u.cost.is_finite() && u.cost > 0.0) {
                return invalid(format!("upgrade '{}': cost must be positive", u.id));
            }
            let factor = u.effect.factor();
            if !(factor.is_finite() && factor >= 1.0) {
                return invalid(format!("upgrade '{}': effect factor must be at least 1", u.id));
            }
            if let Effect::BuildingMultiplier { building, .. } = &u.effect {
                if !self.has_building(building) {
                    return invalid(format!("upgrade '{}' targets unknown building '{building}'", u.id));
                }
            }
            match &u.requirement {
                Some(Requirement::OwnsBuilding { building, .. }) if !self.has_building(building) => {
                    return invalid(format!("upgrade '{}' requires unknown building '{building}'", u.id));
                }
                Some(Requirement::HasUpgrade { upgrade }) if !self.has_upgrade(upgrade) => {
                    return invalid(format!("upgrade '{}' requires unknown upgrade '{upgrade}'", u.id));
                }
                Some(Requirement::TotalEarned { amount }) if !(amount.is_finite() && *amount >= 0.0) => {
                    return invalid(format!("upgrade '{}': earned threshold must be non-negative", u.id));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Engine tunables. Everything here has a default matching the shipped game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Save records must carry exactly this version to be restored.
    pub schema_version:         String,
    /// Slot key used when the engine saves to / loads from a store.
    pub save_key:               String,
    /// Simulated seconds between autosaves. Enforced by the host, not the engine.
    pub autosave_interval_secs: u64,
    pub base_click_value:       f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            schema_version:         "1.0.0".into(),
            save_key:               "cookie_clicker_save".into(),
            autosave_interval_secs: 30,
            base_click_value:       1.0,
        }
    }
}

impl GameConfig {
    /// Load from `{data_dir}/game_config.json`. Missing keys keep their defaults.
    pub fn load(data_dir: &str) -> EngineResult<Self> {
        let path = format!("{data_dir}/game_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: GameConfig = serde_json::from_str(&content)?;
        if !(config.base_click_value.is_finite() && config.base_click_value >= 0.0) {
            return Err(EngineError::InvalidCatalog(
                "base_click_value must be non-negative".into(),
            ));
        }
        Ok(config)
    }
}
