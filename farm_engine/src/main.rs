/// Farm engine — Script Runner
///
/// Replays an action script through the engine, re-runs the recorded
/// envelopes for a determinism check, and prints the summary and hash.
///
/// Usage: farm_engine <script.json> [--catalog <catalog.json>] [--seed <n>]
///
/// A script is a JSON array. Entries carrying an `action` key are recorded
/// envelopes and are applied as-is; any other entry is a bare action and
/// is dispatched with the engine's next sequence at `index * 1000` ms.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use serde_json::Value;
use tracing::{debug, info, warn};

use farm_engine::actions::{Action, ActionEnvelope};
use farm_engine::catalog::Catalog;
use farm_engine::engine::FarmEngine;
use farm_engine::hashing::canonical_hash;
use farm_engine::ruins::total_ruins;

struct Args {
    script: PathBuf,
    catalog: Option<PathBuf>,
    seed: u64,
}

fn parse_args() -> Result<Args, String> {
    let mut script = None;
    let mut catalog = None;
    let mut seed = 0;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--catalog" => {
                let path = args.next().ok_or("--catalog needs a path")?;
                catalog = Some(PathBuf::from(path));
            }
            "--seed" => {
                let raw = args.next().ok_or("--seed needs a value")?;
                seed = raw.parse().map_err(|_| format!("bad seed {:?}", raw))?;
            }
            other if script.is_none() => script = Some(PathBuf::from(other)),
            other => return Err(format!("unexpected argument {:?}", other)),
        }
    }

    Ok(Args {
        script: script.ok_or("usage: farm_engine <script.json> [--catalog <path>] [--seed <n>]")?,
        catalog,
        seed,
    })
}

fn run(args: Args) -> Result<bool, Box<dyn Error>> {
    let catalog = match &args.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::standard(),
    };
    catalog.validate()?;

    let text = fs::read_to_string(&args.script)?;
    let entries: Vec<Value> = serde_json::from_str(&text)?;
    info!(script = %args.script.display(), entries = entries.len(), "loaded script");

    // Run 1
    let mut engine = FarmEngine::new(catalog.clone(), args.seed);
    let mut log = Vec::with_capacity(entries.len());
    let mut accepted = 0usize;
    for (index, entry) in entries.iter().enumerate() {
        let (envelope, result) = if entry.get("action").is_some() {
            let envelope = ActionEnvelope::from_value(entry);
            let result = engine.apply_envelope(&envelope)?;
            (envelope, result)
        } else {
            engine.dispatch(Action::from_value(entry), index as i64 * 1_000)
        };
        if result.applied {
            accepted += 1;
        } else if let Some(reason) = &result.rejection {
            debug!(sequence = envelope.sequence, action = %result.action_type, %reason, "no-op");
        }
        log.push(envelope);
    }
    let h1 = canonical_hash(engine.state());

    // Run 2 (determinism check)
    let mut second = FarmEngine::new(catalog, args.seed);
    second.replay(&log)?;
    let h2 = canonical_hash(second.state());

    let state = engine.state();
    println!("actions:     {} ({} applied, {} rejected)", log.len(), accepted, log.len() - accepted);
    println!("money:       {}", state.money);
    println!("citizens:    {}", state.citizens);
    println!("facilities:  {}", state.facilities.len());
    println!("companies:   {}", state.companies.len());
    println!("ruins:       {}", total_ruins(state)?);
    println!("countries:   {}", state.countries.len());
    println!("trophies:    {}", state.nba_state.trophies);
    println!("hash:        {}", h1);

    if h1 != h2 {
        warn!(run1 = %h1, run2 = %h2, "determinism failure");
        return Ok(false);
    }
    Ok(true)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
