//! Scripted players for headless runs.
//!
//! RULE: The bot only uses the engine's public command surface.
//! Every random choice goes through the seeded generator, so a run is
//! reproducible from `--seed` alone.

use clicker_core::{engine::Engine, error::EngineResult};
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::str::FromStr;

/// Hard stop for one `act` call. Spending always lowers currency, so this
/// is never reached in practice.
const MAX_PURCHASES_PER_ACT: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Buy available upgrades cheapest first, then the building with the
    /// shortest payback (cost / added production), until nothing is affordable.
    Greedy,
    /// Buy one affordable item picked at random per step.
    Random,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(Strategy::Greedy),
            "random" => Ok(Strategy::Random),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Purchase {
    Building(String),
    Upgrade(String),
}

pub struct Bot {
    strategy: Strategy,
    rng:      Pcg64Mcg,
    bought:   u64,
}

impl Bot {
    pub fn new(strategy: Strategy, seed: u64) -> Self {
        Self {
            strategy,
            rng: Pcg64Mcg::seed_from_u64(seed),
            bought: 0,
        }
    }

    /// Total purchases made over the bot's life.
    pub fn purchases(&self) -> u64 {
        self.bought
    }

    /// Spend according to the strategy. Returns the number of purchases made.
    pub fn act(&mut self, engine: &mut Engine) -> EngineResult<u32> {
        let mut made = 0;
        while made < MAX_PURCHASES_PER_ACT {
            let choice = match self.strategy {
                Strategy::Greedy => greedy_choice(engine)?,
                Strategy::Random => self.random_choice(engine)?,
            };
            let Some(choice) = choice else { break };

            let outcome = match &choice {
                Purchase::Building(id) => engine.buy_building(id)?,
                Purchase::Upgrade(id) => engine.buy_upgrade(id)?,
            };
            if !outcome.is_success() {
                log::warn!("bot: {choice:?} refused: {outcome:?}");
                break;
            }
            log::trace!("bot: bought {choice:?}");
            made += 1;

            if self.strategy == Strategy::Random {
                break;
            }
        }
        self.bought += u64::from(made);
        Ok(made)
    }

    fn random_choice(&mut self, engine: &Engine) -> EngineResult<Option<Purchase>> {
        let options = affordable(engine)?;
        if options.is_empty() {
            return Ok(None);
        }
        let pick = (self.rng.next_u64() % options.len() as u64) as usize;
        Ok(options.into_iter().nth(pick))
    }
}

fn affordable(engine: &Engine) -> EngineResult<Vec<Purchase>> {
    let mut options = Vec::new();
    for upgrade in engine.available_upgrades() {
        if engine.can_afford_upgrade(&upgrade.id)? {
            options.push(Purchase::Upgrade(upgrade.id.clone()));
        }
    }
    for building in engine.catalog().buildings() {
        if engine.can_afford_building(&building.id)? {
            options.push(Purchase::Building(building.id.clone()));
        }
    }
    Ok(options)
}

fn greedy_choice(engine: &Engine) -> EngineResult<Option<Purchase>> {
    let mut cheapest_upgrade: Option<(&str, f64)> = None;
    for upgrade in engine.available_upgrades() {
        if !engine.can_afford_upgrade(&upgrade.id)? {
            continue;
        }
        if cheapest_upgrade.map_or(true, |(_, cost)| upgrade.cost < cost) {
            cheapest_upgrade = Some((&upgrade.id, upgrade.cost));
        }
    }
    if let Some((id, _)) = cheapest_upgrade {
        return Ok(Some(Purchase::Upgrade(id.to_string())));
    }

    let mut best: Option<(&str, f64)> = None;
    for building in engine.catalog().buildings() {
        if !engine.can_afford_building(&building.id)? {
            continue;
        }
        let gain = engine.unit_production(&building.id)?;
        if gain <= 0.0 {
            continue;
        }
        let payback = engine.building_cost(&building.id)? / gain;
        if best.map_or(true, |(_, p)| payback < p) {
            best = Some((&building.id, payback));
        }
    }
    Ok(best.map(|(id, _)| Purchase::Building(id.to_string())))
}
