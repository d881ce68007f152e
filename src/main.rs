use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::Duration;

use navicue_engine::catalog::{self, CatalogEntry};
use navicue_engine::config::EngineConfig;
use navicue_engine::entry::{EntryOrchestrator, EntryPattern, EntrySettings};
use navicue_engine::interaction::{Interaction, InteractionPhase};
use navicue_engine::lifecycle::{Stage, StageMachine};
use navicue_engine::runtime::spawn_interaction;
use navicue_engine::telemetry::init_telemetry;

#[derive(Parser)]
#[command(name = "navicue")]
#[command(about = "Simulate NaviCue entry choreographies and stage lifecycles")]
#[command(long_about = "Runs the NaviCue lifecycle engine outside of any renderer. Entry \
                       choreographies and catalogue interactions are simulated on a virtual \
                       clock, or in real time with --realtime.")]
struct Cli {
    /// Log level used when RUST_LOG is not set (overrides navicue.toml)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the entry pattern registry
    Patterns {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Simulate one entry choreography and print its phase timeline
    Entry {
        /// Pattern key, e.g. fade_text or breath_gate
        pattern: EntryPattern,
        /// Comma-separated breath amplitudes, one per sample
        #[arg(long, value_delimiter = ',')]
        breath: Vec<f32>,
        /// Milliseconds between breath samples
        #[arg(long, default_value = "100")]
        sample_ms: u64,
        /// Generate a noisy synthetic breath signal from this seed
        #[arg(long)]
        noise: Option<u64>,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Simulate a catalogue interaction
    Run {
        /// standard, brick-wall, cooling-ember or knock-to-open
        interaction: CatalogEntry,
        /// Wrap the first stage in this entry pattern
        #[arg(long)]
        entry: Option<EntryPattern>,
        /// Number of user actions to perform (defaults to what the interaction needs)
        #[arg(long)]
        actions: Option<u32>,
        /// Milliseconds between user actions
        #[arg(long, default_value = "400")]
        action_every_ms: u64,
        /// Run on the async driver against the wall clock
        #[arg(long)]
        realtime: bool,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct TimelineEvent {
    at_ms: u64,
    phase: String,
}

#[derive(Debug, Serialize)]
struct PatternRow {
    pattern: EntryPattern,
    atmosphere_first: bool,
    text_delay_ms: u64,
    duration_ms: u64,
    reveal_ms: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = EngineConfig::load_env_file();
    let config = EngineConfig::load()?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    init_telemetry(&level, config.observability.json_logs)?;

    match cli.command {
        Commands::Patterns { json } => patterns_command(&config, json),
        Commands::Entry {
            pattern,
            breath,
            sample_ms,
            noise,
            json,
        } => {
            let samples = match noise {
                Some(seed) if breath.is_empty() => synthetic_breath(seed, 120),
                _ => breath,
            };
            entry_command(&config, pattern, &samples, Duration::from_millis(sample_ms), json)
        }
        Commands::Run {
            interaction,
            entry,
            actions,
            action_every_ms,
            realtime,
            json,
        } => {
            let plan = RunPlan {
                entry,
                actions: actions.unwrap_or(interaction.required_actions()),
                action_every: Duration::from_millis(action_every_ms),
                realtime,
                json,
            };
            run_command(&config, interaction, &plan)
        }
    }
}

fn patterns_command(config: &EngineConfig, json: bool) -> Result<()> {
    let floor = config.entry.settings().reveal_floor;
    let rows: Vec<PatternRow> = EntryPattern::ALL
        .into_iter()
        .map(|pattern| {
            let entry = pattern.config();
            PatternRow {
                pattern,
                atmosphere_first: entry.atmosphere_first,
                text_delay_ms: entry.text_delay_ms,
                duration_ms: entry.duration_ms,
                reveal_ms: entry.reveal_duration(floor).as_millis() as u64,
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:<16} {:>10} {:>10} {:>10} {:>10}",
        "PATTERN", "ATMOS", "DELAY_MS", "TOTAL_MS", "REVEAL_MS"
    );
    for row in rows {
        println!(
            "{:<16} {:>10} {:>10} {:>10} {:>10}",
            row.pattern.key(),
            row.atmosphere_first,
            row.text_delay_ms,
            row.duration_ms,
            row.reveal_ms
        );
    }
    Ok(())
}

/// Slow sine breathing (one cycle every 40 samples) with uniform noise.
fn synthetic_breath(seed: u64, samples: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..samples)
        .map(|i| {
            let phase = i as f32 / 40.0 * std::f32::consts::TAU;
            let clean = 0.5 - 0.45 * phase.cos();
            (clean + rng.random_range(-0.08..0.08)).clamp(0.0, 1.0)
        })
        .collect()
}

fn entry_command(
    config: &EngineConfig,
    pattern: EntryPattern,
    samples: &[f32],
    sample_every: Duration,
    json: bool,
) -> Result<()> {
    let mut entry = EntryOrchestrator::with_settings(pattern, config.entry.settings())?;
    let mut timeline = Vec::new();
    let mut last_phase = None;

    entry.run(Duration::ZERO);
    let mut next_sample = 0usize;
    loop {
        let phase = format!("{:?}", entry.phase()).to_lowercase();
        if last_phase.as_ref() != Some(&phase) {
            timeline.push(TimelineEvent {
                at_ms: entry.now().as_millis() as u64,
                phase: phase.clone(),
            });
            last_phase = Some(phase);
        }
        if entry.is_complete() {
            break;
        }

        let sample_at = (next_sample < samples.len()).then(|| sample_every * next_sample as u32);
        match (entry.next_deadline(), sample_at) {
            (Some(deadline), Some(at)) if at < deadline => {
                entry.tick(at);
                entry.observe_breath(samples[next_sample]);
                next_sample += 1;
            }
            (Some(deadline), _) => entry.tick(deadline),
            (None, Some(at)) => {
                entry.tick(at);
                entry.observe_breath(samples[next_sample]);
                next_sample += 1;
            }
            (None, None) => break,
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&timeline)?);
    } else {
        println!("entry {pattern} (breath cycles observed: {})", entry.breath_cycles());
        for event in &timeline {
            println!("  {:>6} ms  {}", event.at_ms, event.phase);
        }
        if !entry.is_complete() {
            println!("  still waiting: no qualifying breath cycle in the supplied samples");
        }
    }
    Ok(())
}

struct RunPlan {
    entry: Option<EntryPattern>,
    actions: u32,
    action_every: Duration,
    realtime: bool,
    json: bool,
}

fn run_command(config: &EngineConfig, which: CatalogEntry, plan: &RunPlan) -> Result<()> {
    let settings = config.entry.settings();
    match which {
        CatalogEntry::Standard => run_machine(which, catalog::standard(&config.stages), settings, plan),
        CatalogEntry::BrickWall => run_machine(which, catalog::brick_wall(&config.stages)?, settings, plan),
        CatalogEntry::CoolingEmber => {
            run_machine(which, catalog::cooling_ember(&config.stages)?, settings, plan)
        }
        CatalogEntry::KnockToOpen => run_machine(which, catalog::knock_to_open()?, settings, plan),
    }
}

fn run_machine<S: Stage>(
    which: CatalogEntry,
    machine: StageMachine<S>,
    settings: EntrySettings,
    plan: &RunPlan,
) -> Result<()> {
    let mut interaction = Interaction::new(which.key(), machine, ());
    if let Some(pattern) = plan.entry {
        interaction = interaction.with_entry(EntryOrchestrator::with_settings(pattern, settings)?);
    }

    let timeline = if plan.realtime {
        tokio::runtime::Runtime::new()?.block_on(async { run_realtime(interaction, plan).await })?
    } else {
        run_virtual(interaction, plan)
    };

    if plan.json {
        println!("{}", serde_json::to_string_pretty(&timeline)?);
    } else {
        println!("run {which}");
        for event in &timeline {
            println!("  {:>6} ms  {}", event.at_ms, event.phase);
        }
    }
    Ok(())
}

fn describe<S: Stage>(phase: InteractionPhase<S>) -> String {
    match phase {
        InteractionPhase::NotMounted => "not mounted".to_string(),
        InteractionPhase::Entry(entry) => format!("entry:{}", format!("{entry:?}").to_lowercase()),
        InteractionPhase::Stage(stage) => format!("stage:{}", stage.name()),
        InteractionPhase::Disposed => "disposed".to_string(),
    }
}

fn run_virtual<S: Stage>(mut interaction: Interaction<S>, plan: &RunPlan) -> Vec<TimelineEvent> {
    let mut timeline = Vec::new();
    let mut last = None;
    let mut now = Duration::ZERO;
    let mut remaining = plan.actions;
    let mut next_action: Option<Duration> = None;

    interaction.mount(now);
    loop {
        let phase = interaction.phase();
        if last != Some(phase) {
            timeline.push(TimelineEvent {
                at_ms: now.as_millis() as u64,
                phase: describe(phase),
            });
            last = Some(phase);
        }
        if interaction.is_complete() {
            break;
        }

        let accepting = matches!(phase, InteractionPhase::Stage(_))
            && interaction.stages().action_count().is_some();
        if remaining > 0 && accepting && next_action.is_none() {
            next_action = Some(now + plan.action_every);
        }

        match (interaction.next_deadline(), next_action) {
            (Some(deadline), Some(at)) if at < deadline => {
                now = at;
                interaction.tick(now);
                interaction.record_action();
                remaining -= 1;
                next_action = None;
            }
            (Some(deadline), _) => {
                now = deadline;
                interaction.tick(now);
            }
            (None, Some(at)) => {
                now = at;
                interaction.tick(now);
                interaction.record_action();
                remaining -= 1;
                next_action = None;
            }
            (None, None) => {
                timeline.push(TimelineEvent {
                    at_ms: now.as_millis() as u64,
                    phase: "waiting for input".to_string(),
                });
                break;
            }
        }
    }
    interaction.dispose();
    timeline
}

async fn run_realtime<S: Stage>(interaction: Interaction<S>, plan: &RunPlan) -> Result<Vec<TimelineEvent>> {
    let mut handle = spawn_interaction(interaction);
    let mut timeline = Vec::new();
    let mut last = None;
    let mut remaining = plan.actions;
    let mut last_action = tokio::time::Instant::now();
    let mut quiet = false;

    let finished = loop {
        let snapshot = handle.snapshot();
        if last != Some(snapshot.phase) {
            timeline.push(TimelineEvent {
                at_ms: snapshot.elapsed.as_millis() as u64,
                phase: describe(snapshot.phase),
            });
            last = Some(snapshot.phase);
        }
        if snapshot.complete {
            break true;
        }

        let accepting = matches!(snapshot.phase, InteractionPhase::Stage(_)) && snapshot.action_count.is_some();
        // Nothing scheduled, nothing left to send, and no snapshot for a whole
        // action interval: only outside input could move it now.
        if quiet && snapshot.next_deadline.is_none() && !(remaining > 0 && accepting) {
            timeline.push(TimelineEvent {
                at_ms: snapshot.elapsed.as_millis() as u64,
                phase: "waiting for input".to_string(),
            });
            break false;
        }
        if remaining > 0 && accepting && last_action.elapsed() >= plan.action_every && handle.action() {
            remaining -= 1;
            last_action = tokio::time::Instant::now();
        }

        quiet = match tokio::time::timeout(plan.action_every, handle.changed()).await {
            Ok(false) => break true,
            Ok(true) => false,
            Err(_) => true,
        };
    };

    let report = if finished {
        handle.finished().await?
    } else {
        handle.teardown().await?
    };
    tracing::info!(
        completed = report.completed,
        cancelled_timers = report.cancelled_timers,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Realtime run finished"
    );
    Ok(timeline)
}
