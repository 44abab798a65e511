//! Simulation clock and the handle readers and commanders hold
//!
//! The clock is the single writer. Each tick it:
//! 1. drains queued commands in arrival order,
//! 2. advances the signal registry,
//! 3. advances the emergency fleet,
//! 4. publishes an immutable snapshot.
//!
//! Readers only ever see a published snapshot, so a half-applied tick is
//! never observable.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::command::{Command, CommandQueue};
use super::emergency::SimEmergencyVehicle;
use super::engine::{EngineSnapshot, SimEngine, TickReport};
use super::error::{EngineError, EngineResult};
use super::flow::{aggregate, latest_per_pair, FlowSummary};
use super::signal::SimSignal;
use super::status::SystemStatus;
use super::types::{GeoPoint, LightState, SignalId, VehicleId};

/// A wake this many times later than nominal is logged as a catch-up tick
pub const CATCH_UP_FACTOR: f32 = 1.5;

/// Callbacks invoked by [`SimClock::run`] after each published tick
pub trait TickObserver {
    fn on_tick(&mut self, _snapshot: &EngineSnapshot, _report: &TickReport) {}
}

/// A [`TickObserver`] that does nothing
pub struct NoopObserver;

impl TickObserver for NoopObserver {}

/// Entity ids are fixed once the session starts, so submissions can be
/// checked without touching the engine.
#[derive(Debug, Default)]
struct KnownIds {
    signals: HashSet<SignalId>,
    vehicles: HashSet<VehicleId>,
}

/// Cloneable access to the engine for commanders and readers
#[derive(Debug, Clone)]
pub struct EngineHandle {
    queue: CommandQueue,
    published: Arc<Mutex<Arc<EngineSnapshot>>>,
    known: Arc<KnownIds>,
    stopped: Arc<AtomicBool>,
}

impl EngineHandle {
    /// Validate a command and queue it for the next tick.
    ///
    /// Unknown ids are reported before malformed payloads. Rejected commands
    /// are never queued.
    pub fn submit(&self, command: Command) -> EngineResult<()> {
        match &command {
            Command::SetManualState { signal, .. } | Command::SetEmergencyOverride { signal, .. } => {
                if !self.known.signals.contains(signal) {
                    return Err(EngineError::signal_not_found(signal.0.clone()));
                }
            }
            Command::SetVehicleActive { vehicle, .. } | Command::Dispatch { vehicle, .. } => {
                if !self.known.vehicles.contains(vehicle) {
                    return Err(EngineError::vehicle_not_found(vehicle.0.clone()));
                }
            }
        }
        command.validate()?;
        debug!("Queued command: {}", command);
        self.queue.push(command);
        Ok(())
    }

    /// Parse a text command and submit it, returning the parsed command
    pub fn submit_text(&self, text: &str) -> EngineResult<Command> {
        let command: Command = text.parse()?;
        self.submit(command.clone())?;
        Ok(command)
    }

    /// Queue a manual light state. An unknown id is reported before a bad state.
    pub fn set_manual_state(&self, signal: &str, state: &str) -> EngineResult<()> {
        let signal = SignalId::new(signal);
        if !self.known.signals.contains(&signal) {
            return Err(EngineError::signal_not_found(signal.0));
        }
        let state: LightState = state.parse()?;
        self.submit(Command::SetManualState { signal, state })
    }

    pub fn set_emergency_override(&self, signal: &str, enabled: bool) -> EngineResult<()> {
        self.submit(Command::SetEmergencyOverride {
            signal: SignalId::new(signal),
            enabled,
        })
    }

    pub fn set_vehicle_active(&self, vehicle: &str, active: bool) -> EngineResult<()> {
        self.submit(Command::SetVehicleActive {
            vehicle: VehicleId::new(vehicle),
            active,
        })
    }

    pub fn dispatch(&self, vehicle: &str, destination: GeoPoint) -> EngineResult<()> {
        self.submit(Command::Dispatch {
            vehicle: VehicleId::new(vehicle),
            destination,
        })
    }

    /// The most recently published snapshot
    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        Arc::clone(&self.published.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn signals(&self) -> Vec<SimSignal> {
        self.snapshot().signals.clone()
    }

    pub fn emergency_vehicles(&self) -> Vec<SimEmergencyVehicle> {
        self.snapshot().emergency_vehicles.clone()
    }

    pub fn active_vehicles(&self) -> Vec<SimEmergencyVehicle> {
        self.snapshot().active_vehicles().cloned().collect()
    }

    /// Aggregate the newest sample of every (signal, direction) pair
    pub fn flow_summary(&self) -> FlowSummary {
        aggregate(&latest_per_pair(&self.snapshot().flow))
    }

    pub fn system_status(&self) -> SystemStatus {
        SystemStatus::from_snapshot(&self.snapshot())
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    /// Stop scheduling further ticks. The tick in progress, if any, completes.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn publish(&self, snapshot: EngineSnapshot) {
        *self.published.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }
}

pub struct SimClock {
    engine: SimEngine,
    handle: EngineHandle,
    interval: Duration,
    last_wake: Option<Instant>,
}

impl SimClock {
    /// Take ownership of the engine and publish its initial snapshot
    pub fn new(engine: SimEngine) -> Self {
        let known = KnownIds {
            signals: engine.signals().list().iter().map(|s| s.id.clone()).collect(),
            vehicles: engine.fleet().list().iter().map(|v| v.id.clone()).collect(),
        };
        let handle = EngineHandle {
            queue: CommandQueue::new(),
            published: Arc::new(Mutex::new(Arc::new(engine.snapshot()))),
            known: Arc::new(known),
            stopped: Arc::new(AtomicBool::new(false)),
        };

        Self {
            interval: engine.config.tick_interval,
            engine,
            handle,
            last_wake: None,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn engine(&self) -> &SimEngine {
        &self.engine
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one tick of `delta_secs` simulated seconds
    pub fn tick(&mut self, delta_secs: f32) -> TickReport {
        let mut applied = 0;
        let mut rejected = 0;
        for command in self.handle.queue.drain() {
            match self.engine.apply(&command) {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!("Rejected queued command {}: {}", command, e);
                    rejected += 1;
                }
            }
        }

        let mut report = self.engine.step(delta_secs);
        report.commands_applied = applied;
        report.commands_rejected = rejected;

        self.handle.publish(self.engine.snapshot());
        report
    }

    /// Tick for a wake at `now`, using the time since the previous wake as the
    /// delta.
    ///
    /// A late wake is folded into one enlarged tick rather than replayed as
    /// several stale ones. The first wake uses the nominal interval.
    pub fn tick_at(&mut self, now: Instant) -> TickReport {
        let nominal = self.engine.config.nominal_delta();
        let delta = match self.last_wake {
            Some(previous) => now.saturating_duration_since(previous).as_secs_f32(),
            None => nominal,
        };
        if delta > nominal * CATCH_UP_FACTOR {
            warn!(
                "Clock woke {:.2}s late, applying catch-up tick of {:.2}s",
                delta - nominal,
                delta
            );
        }
        self.last_wake = Some(now);
        self.tick(delta)
    }

    /// Drive the clock until `max_ticks` have run or the handle is stopped.
    ///
    /// With `realtime` set the loop sleeps to the nominal cadence and measures
    /// real elapsed time; otherwise every tick advances by the nominal
    /// interval with no sleeping. Returns the number of ticks run.
    pub fn run<O: TickObserver>(
        &mut self,
        max_ticks: Option<u64>,
        realtime: bool,
        observer: &mut O,
    ) -> u64 {
        let mut ticks = 0;
        info!(
            "Clock started: interval {:?}, {}",
            self.interval,
            if realtime { "realtime" } else { "as fast as possible" }
        );

        while !self.handle.is_stopped() && max_ticks.map_or(true, |max| ticks < max) {
            let report = if realtime {
                if let Some(previous) = self.last_wake {
                    let deadline = previous + self.interval;
                    std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                }
                self.tick_at(Instant::now())
            } else {
                self.tick(self.engine.config.nominal_delta())
            };
            ticks += 1;

            let snapshot = self.handle.snapshot();
            observer.on_tick(&snapshot, &report);
        }

        info!("Clock stopped after {} ticks", ticks);
        ticks
    }
}
