//! Shared primitive types used across the economy engine.

use chrono::{DateTime, Utc};

/// Catalog key of a building definition (e.g. `"cursor"`).
pub type BuildingId = String;

/// Catalog key of an upgrade definition (e.g. `"click_upgrade_1"`).
pub type UpgradeId = String;

/// Wall-clock instant, always UTC.
pub type Timestamp = DateTime<Utc>;

/// Key under which a save record lives in the durable store.
pub type SlotKey = String;
