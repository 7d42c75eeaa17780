//! The economy engine: the heart of the clicker.
//!
//! RULES:
//!   - The engine owns PlayerState; the catalog is shared and read-only.
//!   - Every mutating command ends with `recompute_derived`. Nothing else
//!     writes `click_yield` or `production_rate`.
//!   - A rejected purchase leaves the state exactly as it was.
//!   - Unknown catalog ids are errors, not rejections: they mean the caller
//!     is out of sync with the catalog.
//!   - No command blocks, sleeps or touches storage. Storage helpers take
//!     the store as an argument and go through the snapshot boundary.

use crate::{
    clock::{Clock, SystemClock},
    codec,
    command::{CommandOutcome, PlayerCommand},
    config::{BuildingDef, Catalog, Effect, GameConfig, Requirement, UpgradeDef},
    error::EngineResult,
    snapshot::SaveRecord,
    state::{PlayerState, Settings},
    store::SaveStore,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Result of a purchase attempt that referenced a known catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PurchaseOutcome {
    Bought   { cost: f64 },
    Rejected { reason: PurchaseRejection },
}

impl PurchaseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PurchaseOutcome::Bought { .. })
    }
}

/// Why an otherwise valid purchase was refused. Ordinary gameplay, not a fault.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurchaseRejection {
    InsufficientFunds { cost: f64, available: f64 },
    AlreadyPurchased,
    RequirementNotMet,
}

pub struct Engine {
    catalog: Arc<Catalog>,
    config:  GameConfig,
    clock:   Arc<dyn Clock>,
    state:   PlayerState,
}

impl Engine {
    pub fn new(catalog: Arc<Catalog>, config: GameConfig, clock: Arc<dyn Clock>) -> Self {
        let state = PlayerState::new(&catalog, &config, clock.now());
        let mut engine = Self { catalog, config, clock, state };
        engine.recompute_derived();
        engine
    }

    /// Builtin catalog, default config, system clock.
    pub fn with_defaults() -> EngineResult<Self> {
        Ok(Self::new(
            Arc::new(Catalog::builtin()?),
            GameConfig::default(),
            Arc::new(SystemClock),
        ))
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn currency(&self) -> f64 {
        self.state.currency
    }

    pub fn total_earned(&self) -> f64 {
        self.state.total_earned
    }

    pub fn click_yield(&self) -> f64 {
        self.state.click_yield()
    }

    /// Total production across all buildings, global multiplier included.
    pub fn cookies_per_second(&self) -> f64 {
        self.state.production_rate()
    }

    pub fn building_count(&self, id: &str) -> EngineResult<u32> {
        self.catalog.building(id)?;
        Ok(self.state.count_of(id))
    }

    /// Cost of the next unit: `floor(base_cost × cost_multiplier^owned)`.
    pub fn building_cost(&self, id: &str) -> EngineResult<f64> {
        let def = self.catalog.building(id)?;
        Ok(self.cost_of_next(def))
    }

    /// Output of everything owned of one building, before the global multiplier.
    pub fn production_per_second(&self, id: &str) -> EngineResult<f64> {
        let def = self.catalog.building(id)?;
        Ok(self.building_output(def))
    }

    /// What one more unit of a building would add to `cookies_per_second`.
    pub fn unit_production(&self, id: &str) -> EngineResult<f64> {
        let def = self.catalog.building(id)?;
        Ok(def.base_production
            * self.state.multipliers.for_building(&def.id)
            * self.state.multipliers.global)
    }

    pub fn can_afford_building(&self, id: &str) -> EngineResult<bool> {
        Ok(self.state.currency >= self.building_cost(id)?)
    }

    pub fn can_afford_upgrade(&self, id: &str) -> EngineResult<bool> {
        Ok(self.state.currency >= self.catalog.upgrade(id)?.cost)
    }

    /// False once purchased; otherwise whether the upgrade's requirement holds.
    pub fn is_upgrade_available(&self, id: &str) -> EngineResult<bool> {
        let upgrade = self.catalog.upgrade(id)?;
        Ok(self.available(upgrade))
    }

    /// Upgrades that could be bought now (funds aside), in catalog order.
    pub fn available_upgrades(&self) -> Vec<&UpgradeDef> {
        self.catalog
            .upgrades()
            .iter()
            .filter(|u| self.available(u))
            .collect()
    }

    // ── Commands ───────────────────────────────────────────────

    /// Manual click. Returns the currency granted.
    pub fn click(&mut self) -> f64 {
        let granted = self.state.click_yield();
        self.state.earn(granted);
        self.state.stats.total_clicks += 1;
        self.recompute_derived();
        granted
    }

    pub fn buy_building(&mut self, id: &str) -> EngineResult<PurchaseOutcome> {
        let catalog = Arc::clone(&self.catalog);
        let def = catalog.building(id)?;
        let cost = self.cost_of_next(def);

        if self.state.currency < cost {
            log::debug!(
                "engine: cannot afford {id} (cost={cost}, currency={:.2})",
                self.state.currency
            );
            return Ok(PurchaseOutcome::Rejected {
                reason: PurchaseRejection::InsufficientFunds {
                    cost,
                    available: self.state.currency,
                },
            });
        }

        self.state.currency -= cost;
        let owned = self.state.owned_buildings.entry(def.id.clone()).or_default();
        owned.count += 1;
        owned.total_spent += cost;
        let count = owned.count;
        self.recompute_derived();

        log::debug!(
            "engine: bought {id} #{count} for {cost} (cps={:.2})",
            self.state.production_rate()
        );
        Ok(PurchaseOutcome::Bought { cost })
    }

    pub fn buy_upgrade(&mut self, id: &str) -> EngineResult<PurchaseOutcome> {
        let catalog = Arc::clone(&self.catalog);
        let upgrade = catalog.upgrade(id)?;

        // This guard is what keeps an effect from stacking twice.
        if self.state.has_upgrade(id) {
            return Ok(PurchaseOutcome::Rejected { reason: PurchaseRejection::AlreadyPurchased });
        }
        if !self.requirement_met(upgrade.requirement.as_ref()) {
            return Ok(PurchaseOutcome::Rejected { reason: PurchaseRejection::RequirementNotMet });
        }
        if self.state.currency < upgrade.cost {
            return Ok(PurchaseOutcome::Rejected {
                reason: PurchaseRejection::InsufficientFunds {
                    cost:      upgrade.cost,
                    available: self.state.currency,
                },
            });
        }

        self.state.currency -= upgrade.cost;
        self.state.purchased_upgrades.insert(upgrade.id.clone());
        self.apply_effect(&upgrade.effect);
        self.recompute_derived();

        log::debug!(
            "engine: bought upgrade {id} for {} (click={}, cps={:.2})",
            upgrade.cost,
            self.state.click_yield(),
            self.state.production_rate()
        );
        Ok(PurchaseOutcome::Bought { cost: upgrade.cost })
    }

    /// Advance idle production by `elapsed`. Returns the currency granted.
    /// Production is not truncated, so many short ticks sum to one long one.
    pub fn tick(&mut self, elapsed: Duration) -> f64 {
        let granted = self.state.production_rate() * elapsed.as_secs_f64();
        self.state.earn(granted);
        self.state.stats.play_time_elapsed =
            self.state.stats.play_time_elapsed.saturating_add(elapsed);
        self.recompute_derived();
        granted
    }

    /// Back to a fresh game. Settings survive; a new session starts now.
    pub fn reset(&mut self) {
        let settings = self.state.settings;
        self.state = PlayerState::new(&self.catalog, &self.config, self.clock.now());
        self.state.settings = settings;
        self.recompute_derived();
        log::info!("engine: state reset");
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.state.settings = settings;
        self.recompute_derived();
    }

    /// Dispatch a serialized command. Used by scripted and IPC callers.
    pub fn apply(&mut self, command: &PlayerCommand) -> EngineResult<CommandOutcome> {
        let outcome = match command {
            PlayerCommand::Click => CommandOutcome::Clicked { granted: self.click() },
            PlayerCommand::BuyBuilding { building } => CommandOutcome::Purchase {
                result: self.buy_building(building)?,
            },
            PlayerCommand::BuyUpgrade { upgrade } => CommandOutcome::Purchase {
                result: self.buy_upgrade(upgrade)?,
            },
            PlayerCommand::Tick { millis } => CommandOutcome::Ticked {
                granted: self.tick(Duration::from_millis(*millis)),
            },
            PlayerCommand::Reset => {
                self.reset();
                CommandOutcome::Reset
            }
            PlayerCommand::SetSettings { settings } => {
                self.set_settings(*settings);
                CommandOutcome::SettingsUpdated
            }
        };
        Ok(outcome)
    }

    // ── Persistence ────────────────────────────────────────────

    /// Deep, versioned copy of the current state.
    pub fn snapshot(&self) -> SaveRecord {
        SaveRecord::capture(&self.state, &self.config, self.clock.now())
    }

    /// Replace the state wholesale with `record`. On error nothing changes.
    pub fn restore(&mut self, record: &SaveRecord) -> EngineResult<()> {
        let state = match record.to_state(&self.catalog, &self.config) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("engine: restore rejected: {e}");
                return Err(e);
            }
        };
        self.state = state;
        self.recompute_derived();
        log::info!(
            "engine: restored save captured at {} (currency={:.2}, cps={:.2})",
            record.captured_at,
            self.state.currency,
            self.state.production_rate()
        );
        Ok(())
    }

    pub fn export_text(&self) -> EngineResult<String> {
        codec::encode(&self.snapshot())
    }

    pub fn import_text(&mut self, text: &str) -> EngineResult<()> {
        let record = match codec::decode(text, &self.config.schema_version) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("engine: import rejected: {e}");
                return Err(e);
            }
        };
        self.restore(&record)
    }

    /// Write a snapshot under `config.save_key`.
    pub fn save_to(&self, store: &SaveStore) -> EngineResult<()> {
        store.save(&self.config.save_key, &self.snapshot())?;
        log::info!("engine: saved to slot '{}'", self.config.save_key);
        Ok(())
    }

    /// Restore from `config.save_key`. Ok(false) when there is no save yet.
    /// On any error the current state is kept.
    pub fn load_from(&mut self, store: &SaveStore) -> EngineResult<bool> {
        let loaded = match store.load(&self.config.save_key, &self.config.schema_version) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("engine: load from slot '{}' rejected: {e}", self.config.save_key);
                return Err(e);
            }
        };
        match loaded {
            Some(record) => {
                self.restore(&record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reset and drop the stored save, so a restart does not bring it back.
    pub fn reset_and_forget(&mut self, store: &SaveStore) -> EngineResult<()> {
        store.delete(&self.config.save_key)?;
        self.reset();
        Ok(())
    }

    // ── Internals ──────────────────────────────────────────────

    fn cost_of_next(&self, def: &BuildingDef) -> f64 {
        let owned = f64::from(self.state.count_of(&def.id));
        (def.base_cost * def.cost_multiplier.powf(owned)).floor()
    }

    fn building_output(&self, def: &BuildingDef) -> f64 {
        def.base_production
            * f64::from(self.state.count_of(&def.id))
            * self.state.multipliers.for_building(&def.id)
    }

    fn available(&self, upgrade: &UpgradeDef) -> bool {
        !self.state.has_upgrade(&upgrade.id) && self.requirement_met(upgrade.requirement.as_ref())
    }

    fn requirement_met(&self, requirement: Option<&Requirement>) -> bool {
        match requirement {
            None => true,
            Some(Requirement::OwnsBuilding { building, count }) => {
                self.state.count_of(building) >= *count
            }
            Some(Requirement::HasUpgrade { upgrade }) => self.state.has_upgrade(upgrade),
            Some(Requirement::TotalEarned { amount }) => self.state.total_earned >= *amount,
        }
    }

    fn apply_effect(&mut self, effect: &Effect) {
        let multipliers = &mut self.state.multipliers;
        match effect {
            Effect::ClickMultiplier { factor } => multipliers.click *= factor,
            Effect::BuildingMultiplier { building, factor } => {
                *multipliers.per_building.entry(building.clone()).or_insert(1.0) *= factor;
            }
            Effect::GlobalMultiplier { factor } => multipliers.global *= factor,
        }
    }

    fn recompute_derived(&mut self) {
        let click_yield = self.config.base_click_value * self.state.multipliers.click;
        let raw: f64 = self
            .catalog
            .buildings()
            .iter()
            .map(|def| self.building_output(def))
            .sum();
        let production_rate = raw * self.state.multipliers.global;
        self.state.set_derived(click_yield, production_rate);
    }
}
