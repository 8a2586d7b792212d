//! # Complication Feeds Entry Point
//!
//! Runs both complications against the in-process loopback host with a
//! simulated heart-rate sensor, printing every render the host requests.
//!
//! ```text
//! complication-feeds [--stdout | --json] [--seconds N] [--config PATH]
//! ```
//!
//! `--stdout` prints text plus an ASCII version of each icon, `--json` prints
//! one JSON object per render. Without either flag a one-line summary per
//! render is logged.

use anyhow::Context;
use complication_lib::host::{ComplicationData, ComplicationType, LoopbackHost, Rendered};
use complication_lib::moon_phase::SystemClock;
use complication_lib::sensor::{SimulatedHeartSensor, StreamSettings};
use complication_lib::{Config, ComplicationDataSource, Feeds, HeartRateFeed, MoonPhaseFeed};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Log,
    Stdout,
    Json,
}

struct Args {
    output: Output,
    seconds: u64,
    config_path: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        output: Output::Log,
        seconds: 10,
        config_path: None,
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--stdout" => args.output = Output::Stdout,
            "--json" => args.output = Output::Json,
            "--seconds" => {
                let value = iter.next().context("--seconds needs a value")?;
                args.seconds = value
                    .parse()
                    .with_context(|| format!("invalid --seconds value {value:?}"))?;
            }
            "--config" => {
                args.config_path = Some(iter.next().context("--config needs a path")?);
            }
            other => warn!("ignoring unknown argument {}", other),
        }
    }
    Ok(args)
}

fn print_rendered(rendered: &Rendered, output: Output) -> anyhow::Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string(rendered)?),
        Output::Log => info!(
            "{} #{} -> {}",
            rendered.component.class,
            rendered.instance_id,
            summary(rendered.data.as_ref())
        ),
        Output::Stdout => {
            println!(
                "{} #{}: {}",
                rendered.component.class,
                rendered.instance_id,
                summary(rendered.data.as_ref())
            );
            if let Some(icon) = rendered.data.as_ref().and_then(ComplicationData::icon) {
                print!("{}", icon.glyph.to_ascii());
            }
        }
    }
    Ok(())
}

fn summary(data: Option<&ComplicationData>) -> String {
    match data {
        None => "no data".to_string(),
        Some(ComplicationData::ShortText { text, .. }) => format!("short text {text}"),
        Some(ComplicationData::RangedValue {
            value, min, max, ..
        }) => format!("ranged {value} in [{min}, {max}]"),
        Some(ComplicationData::PhotoImage {
            image,
            content_description,
        })
        | Some(ComplicationData::SmallImage {
            image,
            content_description,
            ..
        }) => format!("{:?} ({content_description})", image.asset),
    }
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = parse_args()?;
    let config = match &args.config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    // Create Tokio runtime for the sensor stream and refresh timer
    let rt = tokio::runtime::Runtime::new()?;

    let sensor = Arc::new(SimulatedHeartSensor::streaming(
        rt.handle().clone(),
        StreamSettings {
            baseline_bpm: config.simulator.baseline_bpm,
            sample_interval: config.simulator.sample_interval(),
        },
    ));

    let mut host = LoopbackHost::new();
    let feeds = Feeds::build(
        &config,
        &host,
        sensor,
        Arc::new(SystemClock),
        rt.handle().clone(),
    );
    feeds.register(&mut host);

    // Editor previews never show live data.
    let sources: [Arc<dyn ComplicationDataSource>; 2] =
        [feeds.heart_rate.clone(), feeds.moon_phase.clone()];
    for source in sources {
        let preview = source.preview(ComplicationType::ShortText);
        info!("preview {}: {}", source.component().class, summary(Some(&preview)));
    }

    let heart = HeartRateFeed::component_name();
    let moon = MoonPhaseFeed::component_name();
    host.activate(&heart, 1, ComplicationType::ShortText);
    host.activate(&heart, 2, ComplicationType::RangedValue);
    host.activate(&moon, 3, ComplicationType::PhotoImage);
    host.activate(&moon, 4, ComplicationType::SmallImage);

    let phase = feeds.moon_phase.current_phase();
    info!(
        "moon is {} (bucket {}, {:.1} days old, {:.0}% lit)",
        phase.name.label(),
        phase.bucket,
        phase.age_days,
        phase.illumination * 100.0
    );

    let run_for = Duration::from_secs(args.seconds);
    rt.block_on(async {
        let deadline = tokio::time::sleep(run_for);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                update = host.next_update() => {
                    let Some(rendered) = update else { break };
                    for r in &rendered {
                        print_rendered(r, args.output)?;
                    }
                }
            }
        }
        anyhow::Ok(())
    })?;

    for id in [1, 2] {
        host.deactivate(&heart, id);
    }
    for id in [3, 4] {
        host.deactivate(&moon, id);
    }
    info!("all complications deactivated");
    Ok(())
}
