use std::io::{self, BufRead, Write};

use wirelens_rs::capture::FrameEvent;
use wirelens_rs::collector::ExchangeStore;
use wirelens_rs::config::load_config;
use wirelens_rs::error::LensError;
use wirelens_rs::observability::init_tracing;
use wirelens_rs::render::RenderLimits;
use wirelens_rs::rules::ProviderRules;

fn main() {
    let config = load_config("config.yaml").unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });

    init_tracing(&config.log_level);

    let rules = ProviderRules::load(config.rules_path.as_deref());
    let store = ExchangeStore::new(config.collector.retention);
    let limits = RenderLimits::from(&config.limits);

    if let Err(e) = run(&store, &rules, &limits) {
        eprintln!("wirelens: {e}");
        std::process::exit(1);
    }
}

/// Replay captured frame events from stdin (one JSON event per line) and emit
/// one inspection report per exchange to stdout, in arrival order.
fn run(store: &ExchangeStore, rules: &ProviderRules, limits: &RenderLimits) -> Result<(), LensError> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<FrameEvent>(&line) {
            Ok(frame) => store.push_frame(&frame),
            Err(e) => tracing::warn!(error = %e, "skipping malformed frame event"),
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for id in store.ids() {
        let Some(snapshot) = store.snapshot(&id) else {
            continue;
        };
        let Some(inspection) = store.inspect(&id, limits) else {
            continue;
        };
        let provider = rules.match_exchange(&snapshot.headers, &snapshot.text);
        let report = serde_json::json!({
            "exchange_id": id,
            "provider": provider,
            "message": inspection.message,
            "render": inspection.render,
        });
        writeln!(out, "{report}")?;
    }
    Ok(())
}
