use crate::{
    engine::PurchaseOutcome,
    state::Settings,
    types::{BuildingId, UpgradeId},
};
use serde::{Deserialize, Serialize};

/// All player-issued commands, in serialized form.
/// Hosts that drive the engine over a wire (IPC, replay files) submit these
/// through `Engine::apply`; in-process callers may call the methods directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PlayerCommand {
    Click,
    BuyBuilding { building: BuildingId },
    BuyUpgrade  { upgrade: UpgradeId },
    /// Advance idle production by `millis` milliseconds.
    Tick        { millis: u64 },
    Reset,
    SetSettings { settings: Settings },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Clicked  { granted: f64 },
    Purchase { result: PurchaseOutcome },
    Ticked   { granted: f64 },
    Reset,
    SettingsUpdated,
}
