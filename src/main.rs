use glidescroll_core_lib::{
    engine::{EngineConfig, ScrollEngine},
    init_tracing,
    permissions::InjectionCapability,
    ramp::RampCurve,
    settings::{ScrollSettings, SettingsStore},
};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("glidescroll failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    let settings = apply_overrides(load_settings(&args)?, &args)?;
    let request = settings.to_request();
    request.validate().map_err(|err| err.to_string())?;

    let engine = ScrollEngine::new(
        Box::new(glidescroll_core_lib::injection::PlatformScrollBackend),
        EngineConfig::from_settings(&settings),
    );

    let permission = engine.ensure_capability().await;
    if permission.capability != InjectionCapability::Trusted {
        return Err(permission
            .message
            .unwrap_or_else(|| "input injection is not trusted".to_string()));
    }

    let started = if settings.use_countdown {
        engine.start_with_countdown(request).await
    } else {
        engine.start_with_curve(request).await
    };
    started.map_err(|err| err.to_string())?;

    let finished = tokio::select! {
        snapshot = engine.wait_for_idle() => snapshot,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; stopping gesture");
            engine.stop_all().await
        }
    };

    info!(
        posted = finished.events.posted,
        skipped = finished.events.skipped,
        "gesture finished"
    );
    Ok(())
}

fn load_settings(args: &[String]) -> Result<ScrollSettings, String> {
    let store = match parse_arg_value(args, "--settings") {
        Some(path) => SettingsStore::from_path(path),
        None => SettingsStore::new().map_err(|err| err.to_string())?,
    };
    info!(path = %store.path().display(), "loading settings");
    store.load().map_err(|err| err.to_string())
}

fn apply_overrides(mut settings: ScrollSettings, args: &[String]) -> Result<ScrollSettings, String> {
    if let Some(raw) = parse_arg_value(args, "--start") {
        settings.start_speed = parse_number(raw, "--start")?;
    }
    if let Some(raw) = parse_arg_value(args, "--end") {
        settings.end_speed = parse_number(raw, "--end")?;
    }
    if let Some(raw) = parse_arg_value(args, "--steps") {
        settings.step_count = raw
            .parse::<u32>()
            .map_err(|_| format!("--steps expects a whole number, got '{raw}'"))?;
    }
    if let Some(raw) = parse_arg_value(args, "--curve") {
        settings.curve = RampCurve::parse(raw).ok_or_else(|| {
            format!("unknown curve '{raw}', expected linear|easeIn|easeOut|easeInOut")
        })?;
    }
    if args.iter().any(|arg| arg == "--no-countdown") {
        settings.use_countdown = false;
    }
    if args.iter().any(|arg| arg == "--no-momentum") {
        settings.momentum_enabled = false;
    }
    Ok(settings)
}

fn parse_number(raw: &str, key: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("{key} expects a number, got '{raw}'"))
}

fn parse_arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == key)
        .and_then(|idx| args.get(idx + 1))
        .map(String::as_str)
}
