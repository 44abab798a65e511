use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use signal_sim::simulation::{
    EmergencyDispatcher, EngineConfig, EngineSnapshot, FlowSummary, SimClock, SimEngine, SimRng,
    SystemStatus, TickObserver, TickReport,
};

#[derive(Parser)]
#[command(name = "signal_sim")]
#[command(about = "Traffic signal and emergency dispatch simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "60")]
    ticks: u64,

    /// Nominal tick interval in milliseconds
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Seed for reproducible runs (OS entropy when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Sleep between ticks to follow the wall clock
    #[arg(long)]
    realtime: bool,

    /// Command to submit before the first tick, e.g. "manual sig-1 green"
    #[arg(long = "command")]
    commands: Vec<String>,

    /// Don't raise signal overrides for active emergency vehicles
    #[arg(long)]
    no_dispatcher: bool,

    /// Log a status report every N ticks
    #[arg(long, default_value = "10")]
    report_every: u64,
}

/// Forwards ticks to the dispatcher and logs periodic status reports
struct ConsoleObserver {
    dispatcher: Option<EmergencyDispatcher>,
    report_every: u64,
}

impl TickObserver for ConsoleObserver {
    fn on_tick(&mut self, snapshot: &EngineSnapshot, report: &TickReport) {
        if let Some(dispatcher) = &mut self.dispatcher {
            dispatcher.on_tick(snapshot, report);
        }

        if self.report_every > 0 && report.tick % self.report_every == 0 {
            let status = SystemStatus::from_snapshot(snapshot);
            info!(
                "--- Tick {} ({:.1}s simulated) --- emergency signals: {}, active vehicles: {}, avg density: {:.1}%",
                report.tick,
                snapshot.time,
                status.emergency_signals,
                status.active_vehicles,
                status.average_density
            );
        }
    }
}

fn log_flow_summary(summary: &FlowSummary) {
    info!("--- Traffic Flow ---");
    for flow in &summary.per_direction {
        info!(
            "  {}: vehicles={}, avg speed={:.1}, congestion={}",
            flow.direction, flow.total_vehicles, flow.average_speed, flow.congestion_level
        );
    }
    info!("Total vehicles: {}", summary.totals.total_vehicles);
    info!("Average speed: {:.1}", summary.totals.average_speed);
    info!("High congestion samples: {}", summary.totals.high_congestion_samples);
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = EngineConfig {
        tick_interval: Duration::from_millis(cli.interval_ms),
        ..EngineConfig::default()
    };
    let rng = match cli.seed {
        Some(seed) => SimRng::seeded(seed),
        None => SimRng::from_entropy(),
    };

    let engine = SimEngine::create_demo_engine(config, rng).context("Failed to build engine")?;
    info!("Initial state:");
    engine.print_summary();

    let mut clock = SimClock::new(engine);
    let handle = clock.handle();

    for text in &cli.commands {
        let command = handle
            .submit_text(text)
            .with_context(|| format!("Rejected command {:?}", text))?;
        info!("Submitted {}", command);
    }

    let mut observer = ConsoleObserver {
        dispatcher: (!cli.no_dispatcher).then(|| EmergencyDispatcher::new(handle.clone())),
        report_every: cli.report_every,
    };

    let ticks = clock.run(Some(cli.ticks), cli.realtime, &mut observer);

    info!("=== SIMULATION COMPLETE ===");
    info!("Ticks run: {}", ticks);
    clock.engine().print_summary();
    log_flow_summary(&handle.flow_summary());

    Ok(())
}
