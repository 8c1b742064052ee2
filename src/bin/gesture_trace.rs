use glidescroll_core_lib::{
    engine::{EngineConfig, EngineSnapshot, ScrollEngine},
    init_tracing,
    injection::{RecordingBackend, ScrollEvent},
    phase::GesturePhase,
    ramp::{GestureRequest, RampCurve},
};
use serde::Serialize;
use std::{fs, path::PathBuf};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GestureTrace {
    request: GestureRequest,
    stop_after: Option<u32>,
    final_state: EngineSnapshot,
    events: Vec<ScrollEvent>,
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("gesture trace failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    let request = GestureRequest::new(
        parse_or(&args, "--start", 1.0)?,
        parse_or(&args, "--end", 80.0)?,
        parse_or(&args, "--steps", 80)?,
    )
    .with_curve(match parse_arg_value(&args, "--curve") {
        Some(raw) => RampCurve::parse(raw).ok_or_else(|| format!("unknown curve '{raw}'"))?,
        None => RampCurve::Linear,
    });
    let stop_after = parse_arg_value(&args, "--stop-after")
        .map(|raw| {
            raw.parse::<u32>()
                .map_err(|_| format!("--stop-after expects a tick count, got '{raw}'"))
        })
        .transpose()?;

    let backend = RecordingBackend::trusted();
    let engine = ScrollEngine::new(Box::new(backend.clone()), EngineConfig::default());
    engine
        .start_with_curve(request)
        .await
        .map_err(|err| err.to_string())?;

    if let Some(ticks) = stop_after {
        let mut updates = engine.subscribe();
        let _ = updates
            .wait_for(|s| s.tick_index >= ticks || s.phase != GesturePhase::Ramping)
            .await;
        engine.stop().await;
    }
    let final_state = engine.wait_for_idle().await;

    let trace = GestureTrace {
        request,
        stop_after,
        final_state,
        events: backend.events(),
    };
    let data = serde_json::to_string_pretty(&trace)
        .map_err(|err| format!("failed serializing trace: {err}"))?;
    match parse_arg_value(&args, "--out").map(PathBuf::from) {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|err| format!("failed creating output dir: {err}"))?;
            }
            fs::write(&path, data).map_err(|err| format!("failed writing trace: {err}"))?;
            println!("gesture trace written to {}", path.display());
        }
        None => println!("{data}"),
    }
    Ok(())
}

fn parse_or<T: std::str::FromStr>(args: &[String], key: &str, default: T) -> Result<T, String> {
    match parse_arg_value(args, key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("{key} got an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn parse_arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == key)
        .and_then(|idx| args.get(idx + 1))
        .map(String::as_str)
}
