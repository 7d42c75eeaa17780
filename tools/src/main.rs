//! idle-runner: headless driver for the clicker economy.
//!
//! Usage:
//!   idle-runner --seconds 600 --clicks-per-sec 5 --strategy greedy --db save.db
//!   idle-runner --import <TEXT> --seconds 60 --export
//!   idle-runner --db save.db --ipc-mode

mod bot;

use anyhow::Result;
use bot::{Bot, Strategy};
use clicker_core::{
    clock::SystemClock,
    command::{CommandOutcome, PlayerCommand},
    config::{Catalog, GameConfig},
    engine::Engine,
    store::SaveStore,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

/// Host-level requests. Anything that does not match one of these is tried
/// as a `PlayerCommand`, which is also how time is advanced (`{"cmd":"tick"}`).
#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlCommand {
    GetState,
    Save,
    Export,
    Quit,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum IpcRequest {
    Control(ControlCommand),
    Player(PlayerCommand),
}

#[derive(serde::Serialize)]
struct BuildingView {
    id:         String,
    name:       String,
    count:      u32,
    next_cost:  f64,
    production: f64,
}

#[derive(serde::Serialize)]
struct UiState {
    currency:           f64,
    total_earned:       f64,
    click_yield:        f64,
    cookies_per_second: f64,
    total_clicks:       u64,
    play_time_secs:     f64,
    buildings:          Vec<BuildingView>,
    available_upgrades: Vec<String>,
    purchased_upgrades: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_outcome:       Option<CommandOutcome>,
}

struct RunOptions {
    seconds:        u64,
    step_ms:        u64,
    clicks_per_sec: f64,
    strategy:       Strategy,
    seed:           u64,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seconds = parse_arg(&args, "--seconds", 300u64);
    let step_ms = parse_arg(&args, "--step-ms", 100u64).max(1);
    let clicks_per_sec = parse_arg(&args, "--clicks-per-sec", 5.0f64).max(0.0);
    let strategy = parse_arg(&args, "--strategy", Strategy::Greedy);
    let seed = parse_arg(&args, "--seed", 42u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let export = args.iter().any(|a| a == "--export");
    let db = str_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = str_arg(&args, "--data-dir");
    let import = str_arg(&args, "--import");

    if !ipc_mode {
        println!("Idle Clicker: idle-runner");
        println!("  seconds:    {seconds}");
        println!("  step_ms:    {step_ms}");
        println!("  clicks/sec: {clicks_per_sec}");
        println!("  strategy:   {strategy:?}");
        println!("  seed:       {seed}");
        println!("  db:         {db}");
        println!("  data_dir:   {}", data_dir.unwrap_or("(builtin)"));
        println!();
    }

    let (catalog, config) = match data_dir {
        Some(dir) => (Catalog::load(dir)?, GameConfig::load(dir)?),
        None => (Catalog::builtin()?, GameConfig::default()),
    };
    let store = if db == ":memory:" {
        SaveStore::in_memory()?
    } else {
        SaveStore::open(db)?
    };
    store.migrate()?;

    let mut engine = Engine::new(Arc::new(catalog), config, Arc::new(SystemClock));
    if resume_save(&mut engine, &store) {
        log::info!("runner: resumed save from {db}");
    }
    if let Some(text) = import {
        engine.import_text(text)?;
        log::info!("runner: imported save text");
    }

    if ipc_mode {
        run_ipc_loop(&mut engine, &store)?;
    } else {
        let options = RunOptions { seconds, step_ms, clicks_per_sec, strategy, seed };
        let purchases = run_simulation(&mut engine, &store, &options)?;
        engine.save_to(&store)?;
        print_summary(&engine, purchases)?;
        if export {
            println!();
            println!("=== EXPORT ===");
            println!("{}", engine.export_text()?);
        }
    }

    Ok(())
}

/// Pick up the stored save if it is usable. An incompatible or corrupt save
/// is discarded with a warning and the run starts fresh; the next save
/// overwrites the slot.
fn resume_save(engine: &mut Engine, store: &SaveStore) -> bool {
    match engine.load_from(store) {
        Ok(found) => found,
        Err(e) => {
            log::warn!("runner: discarding unusable save: {e}");
            false
        }
    }
}

/// Click, tick and let the bot spend, one step at a time. Returns the number
/// of purchases the bot made.
fn run_simulation(engine: &mut Engine, store: &SaveStore, options: &RunOptions) -> Result<u64> {
    let step = Duration::from_millis(options.step_ms);
    let steps = options.seconds.saturating_mul(1000) / options.step_ms;
    let autosave_every = Duration::from_secs(engine.config().autosave_interval_secs);
    let mut bot = Bot::new(options.strategy, options.seed);

    let mut click_carry = 0.0;
    let mut since_save = Duration::ZERO;

    for _ in 0..steps {
        click_carry += options.clicks_per_sec * step.as_secs_f64();
        while click_carry >= 1.0 {
            engine.click();
            click_carry -= 1.0;
        }
        engine.tick(step);
        bot.act(engine)?;

        since_save += step;
        let autosave_due = !autosave_every.is_zero() && since_save >= autosave_every;
        if autosave_due && engine.state().settings.auto_save {
            engine.save_to(store)?;
            since_save = Duration::ZERO;
        }
    }
    Ok(bot.purchases())
}

fn run_ipc_loop(engine: &mut Engine, store: &SaveStore) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let request: IpcRequest = match serde_json::from_str(&buffer) {
            Ok(r) => r,
            Err(e) => {
                write_error(&mut stdout, &format!("unrecognized request: {e}"))?;
                continue;
            }
        };

        match request {
            IpcRequest::Control(ControlCommand::Quit) => break,
            IpcRequest::Control(ControlCommand::GetState) => {
                write_json(&mut stdout, &build_ui_state(engine, None)?)?;
            }
            IpcRequest::Control(ControlCommand::Save) => match engine.save_to(store) {
                Ok(()) => write_json(&mut stdout, &serde_json::json!({ "saved": true }))?,
                Err(e) => write_error(&mut stdout, &e.to_string())?,
            },
            IpcRequest::Control(ControlCommand::Export) => match engine.export_text() {
                Ok(text) => write_json(&mut stdout, &serde_json::json!({ "export": text }))?,
                Err(e) => write_error(&mut stdout, &e.to_string())?,
            },
            IpcRequest::Player(cmd) => match engine.apply(&cmd) {
                Ok(outcome) => write_json(&mut stdout, &build_ui_state(engine, Some(outcome))?)?,
                Err(e) => write_error(&mut stdout, &e.to_string())?,
            },
        }
    }
    Ok(())
}

fn write_json<T: serde::Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string(value)?)?;
    out.flush()?;
    Ok(())
}

fn write_error(out: &mut impl Write, message: &str) -> Result<()> {
    write_json(out, &serde_json::json!({ "error": message }))
}

fn build_ui_state(engine: &Engine, last_outcome: Option<CommandOutcome>) -> Result<UiState> {
    let state = engine.state();
    let buildings = engine
        .catalog()
        .buildings()
        .iter()
        .map(|def| -> Result<BuildingView> {
            Ok(BuildingView {
                id:         def.id.clone(),
                name:       def.name.clone(),
                count:      engine.building_count(&def.id)?,
                next_cost:  engine.building_cost(&def.id)?,
                production: engine.production_per_second(&def.id)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(UiState {
        currency:           engine.currency(),
        total_earned:       engine.total_earned(),
        click_yield:        engine.click_yield(),
        cookies_per_second: engine.cookies_per_second(),
        total_clicks:       state.stats.total_clicks,
        play_time_secs:     state.stats.play_time_elapsed.as_secs_f64(),
        buildings,
        available_upgrades: engine.available_upgrades().iter().map(|u| u.id.clone()).collect(),
        purchased_upgrades: state.purchased_upgrades.iter().cloned().collect(),
        last_outcome,
    })
}

fn print_summary(engine: &Engine, purchases: u64) -> Result<()> {
    let state = engine.state();

    println!("=== RUN SUMMARY ===");
    println!("  currency:      {:.1}", engine.currency());
    println!("  total earned:  {:.1}", engine.total_earned());
    println!("  per second:    {:.1}", engine.cookies_per_second());
    println!("  click yield:   {:.1}", engine.click_yield());
    println!("  clicks:        {}", state.stats.total_clicks);
    println!("  play time:     {:.0}s", state.stats.play_time_elapsed.as_secs_f64());
    println!("  purchases:     {purchases}");
    println!("  session start: {}", state.stats.session_start.to_rfc3339());

    println!();
    println!("=== BUILDINGS ===");
    for def in engine.catalog().buildings() {
        let count = engine.building_count(&def.id)?;
        if count == 0 {
            continue;
        }
        println!(
            "  {:<14} x{:<4} | {:>12.1}/s | next: {:.0}",
            def.name,
            count,
            engine.production_per_second(&def.id)?,
            engine.building_cost(&def.id)?
        );
    }

    println!();
    println!("=== UPGRADES ===");
    if state.purchased_upgrades.is_empty() {
        println!("  (none purchased)");
    } else {
        for upgrade in engine.catalog().upgrades() {
            if state.has_upgrade(&upgrade.id) {
                println!("  {} ({})", upgrade.name, upgrade.id);
            }
        }
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use clicker_core::clock::ManualClock;

    fn build_engine() -> Engine {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Engine::new(
            Arc::new(Catalog::builtin().unwrap()),
            GameConfig::default(),
            Arc::new(ManualClock::new(start)),
        )
    }

    fn build_store() -> SaveStore {
        let store = SaveStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    #[test]
    fn resume_picks_up_a_usable_save() {
        let store = build_store();
        let mut saved = build_engine();
        for _ in 0..7 {
            saved.click();
        }
        saved.save_to(&store).unwrap();

        let mut engine = build_engine();
        assert!(resume_save(&mut engine, &store));
        assert_eq!(engine.currency(), 7.0);
    }

    #[test]
    fn incompatible_save_is_discarded_and_later_overwritten() {
        let store = build_store();
        let mut stale = build_engine().snapshot();
        stale.schema_version = "0.9.0".into();
        store.save(&GameConfig::default().save_key, &stale).unwrap();

        let mut engine = build_engine();
        assert!(!resume_save(&mut engine, &store), "stale save must not be resumed");
        assert_eq!(engine.currency(), 0.0);

        engine.click();
        engine.save_to(&store).unwrap();
        let mut next_run = build_engine();
        assert!(resume_save(&mut next_run, &store));
        assert_eq!(next_run.currency(), 1.0);
    }

    #[test]
    fn ipc_tick_is_a_player_command() {
        let request: IpcRequest = serde_json::from_str(r#"{"cmd":"tick","millis":500}"#).unwrap();
        assert!(matches!(
            request,
            IpcRequest::Player(PlayerCommand::Tick { millis: 500 })
        ));
        assert!(serde_json::from_str::<IpcRequest>(r#"{"type":"tick","millis":500}"#).is_err());

        let request: IpcRequest = serde_json::from_str(r#"{"type":"export"}"#).unwrap();
        assert!(matches!(request, IpcRequest::Control(ControlCommand::Export)));
    }
}
