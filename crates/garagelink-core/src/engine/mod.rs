// ── Door sync engine ──
//
// One engine per door. A single task owns the `SyncContext` and reacts to
// timer ticks, external actuator writes, and completions of remote calls.
// Remote calls run in their own tasks and report back over a channel, so
// the loop never blocks on the network and is the only mutator of state.

mod context;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use context::{SyncPhase, SyncSnapshot};
pub(crate) use context::SyncContext;

use crate::actuator::Actuator;
use crate::config::{DoorConfig, SyncConfig};
use crate::error::{CoreError, RemoteError};
use crate::model::{BatteryReading, UnknownStatePolicy};
use crate::normalize::normalize;
use crate::remote::RemoteDoor;

/// Results delivered back to the engine loop.
#[derive(Debug)]
enum Completion {
    Poll {
        generation: u64,
        result: Result<Value, RemoteError>,
    },
    Actuation {
        target: bool,
        result: Result<Value, RemoteError>,
    },
    CooldownExpired {
        generation: u64,
    },
    Battery(Result<Option<u8>, RemoteError>),
}

type Completions = mpsc::UnboundedSender<Completion>;

/// Reconciles one remote door with one local actuator.
pub struct SyncEngine<R, A> {
    door: DoorConfig,
    remote: Arc<R>,
    actuator: A,
    config: SyncConfig,
    cancel: CancellationToken,
}

impl<R: RemoteDoor, A: Actuator> SyncEngine<R, A> {
    /// Build an engine. Fails on an invalid [`SyncConfig`], before any
    /// timer exists.
    pub fn new(door: DoorConfig, remote: R, actuator: A, config: SyncConfig) -> Result<Self, CoreError> {
        config.validate()?;
        if door.name.trim().is_empty() {
            return Err(CoreError::config("door name must not be empty"));
        }
        Ok(Self {
            door,
            remote: Arc::new(remote),
            actuator,
            config,
            cancel: CancellationToken::new(),
        })
    }

    pub fn door(&self) -> &DoorConfig {
        &self.door
    }

    /// Start syncing: one immediate poll, then the poll timer and (if a
    /// low-battery threshold is configured) the battery timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> EngineHandle {
        let cancel = self.cancel.clone();
        let (snapshot_tx, snapshot_rx) = watch::channel(SyncSnapshot::default());
        let door = self.door.name.clone();
        let task = tokio::spawn(self.run(snapshot_tx));

        EngineHandle {
            door,
            snapshot: snapshot_rx,
            cancel,
            task,
        }
    }

    #[allow(clippy::cognitive_complexity)]
    async fn run(self, snapshot: watch::Sender<SyncSnapshot>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ctx = SyncContext::default();
        let mut writes = self.actuator.subscribe();
        let mut writes_open = true;

        info!(
            door = %self.door.name,
            device = self.door.address.device_number,
            garage = self.door.address.garage_number,
            poll_ms = duration_ms(self.config.poll_interval),
            "sync engine starting"
        );

        // The actuator should reflect reality before any controller reads it.
        self.start_poll(&mut ctx, &tx);
        snapshot.send_replace(ctx.snapshot());

        let mut poll_timer = periodic(self.config.poll_interval);
        let mut battery_timer = self
            .config
            .battery_low_level
            .map(|_| periodic(self.config.battery_poll_interval));
        if battery_timer.is_none() {
            debug!(door = %self.door.name, "no battery threshold; battery monitoring disabled");
        }

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                // Writes before completions: a pending write must bump the
                // generation before a pre-command poll result is applied.
                write = writes.recv(), if writes_open => match write {
                    Some(value) => self.on_external_write(&mut ctx, value, &tx),
                    None => {
                        warn!(door = %self.door.name, "actuator closed; no further external writes");
                        writes_open = false;
                    }
                },
                Some(done) = rx.recv() => self.on_completion(&mut ctx, done, &tx).await,
                _ = poll_timer.tick() => self.on_poll_tick(&mut ctx, &tx),
                () = tick_optional(battery_timer.as_mut()) => self.on_battery_tick(&mut ctx, &tx),
            }
            snapshot.send_replace(ctx.snapshot());
        }

        info!(door = %self.door.name, "sync engine stopped");
    }

    // ── Timer callbacks ──────────────────────────────────────────────

    fn on_poll_tick(&self, ctx: &mut SyncContext, tx: &Completions) {
        match ctx.phase {
            SyncPhase::Actuating | SyncPhase::Cooldown => {
                debug!(door = %self.door.name, phase = %ctx.phase, "poll tick skipped; awaiting door movement");
            }
            SyncPhase::Idle | SyncPhase::Polling if ctx.poll_in_flight.is_some() => {
                debug!(door = %self.door.name, "poll tick skipped; previous poll still in flight");
            }
            SyncPhase::Idle | SyncPhase::Polling => self.start_poll(ctx, tx),
        }
    }

    fn on_battery_tick(&self, ctx: &mut SyncContext, tx: &Completions) {
        if ctx.battery_in_flight {
            debug!(door = %self.door.name, "battery tick skipped; previous check still in flight");
            return;
        }
        ctx.battery_in_flight = true;

        let remote = Arc::clone(&self.remote);
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = remote.get_battery().await;
            let _ = tx.send(Completion::Battery(result));
        });
    }

    // ── Actuator callback ────────────────────────────────────────────

    fn on_external_write(&self, ctx: &mut SyncContext, target: bool, tx: &Completions) {
        let generation = ctx.bump_generation();
        ctx.last_actuation = Some(Utc::now());
        ctx.resync_pending = false;

        info!(
            door = %self.door.name,
            command = if target { "open" } else { "close" },
            generation,
            "controller write received"
        );

        if ctx.actuation_in_flight {
            debug!(door = %self.door.name, "command in flight; queueing latest target");
            ctx.queued_target = Some(target);
            return;
        }
        self.start_actuation(ctx, target, tx);
    }

    // ── Remote call launchers ────────────────────────────────────────

    fn start_poll(&self, ctx: &mut SyncContext, tx: &Completions) {
        let generation = ctx.generation;
        ctx.poll_in_flight = Some(generation);
        ctx.phase = SyncPhase::Polling;
        ctx.last_poll = Some(Utc::now());

        let remote = Arc::clone(&self.remote);
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = remote.get_status().await;
            let _ = tx.send(Completion::Poll { generation, result });
        });
    }

    fn start_actuation(&self, ctx: &mut SyncContext, target: bool, tx: &Completions) {
        ctx.actuation_in_flight = true;
        ctx.phase = SyncPhase::Actuating;

        let remote = Arc::clone(&self.remote);
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = if target {
                remote.open().await
            } else {
                remote.close().await
            };
            let _ = tx.send(Completion::Actuation { target, result });
        });
    }

    /// Arm the delayed re-sync. The callback carries the generation it was
    /// armed under and is ignored if a newer command has happened since.
    fn schedule_cooldown(&self, ctx: &mut SyncContext, tx: &Completions) {
        ctx.phase = SyncPhase::Cooldown;

        let generation = ctx.generation;
        let delay = self.config.cooldown;
        let tx = tx.clone();
        let cancel = self.cancel.clone();
        debug!(door = %self.door.name, generation, delay_ms = duration_ms(delay), "cooldown started");

        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = tx.send(Completion::CooldownExpired { generation });
                }
            }
        });
    }

    // ── Completion handling ──────────────────────────────────────────

    async fn on_completion(&self, ctx: &mut SyncContext, done: Completion, tx: &Completions) {
        match done {
            Completion::Poll { generation, result } => {
                self.on_poll_finished(ctx, generation, result, tx).await;
            }
            Completion::Actuation { target, result } => {
                self.on_actuation_finished(ctx, target, result, tx);
            }
            Completion::CooldownExpired { generation } => {
                self.on_cooldown_expired(ctx, generation, tx);
            }
            Completion::Battery(result) => {
                ctx.battery_in_flight = false;
                self.report_battery(result);
            }
        }
    }

    async fn on_poll_finished(
        &self,
        ctx: &mut SyncContext,
        generation: u64,
        result: Result<Value, RemoteError>,
        tx: &Completions,
    ) {
        ctx.poll_in_flight = None;
        if ctx.phase == SyncPhase::Polling {
            ctx.phase = SyncPhase::Idle;
        }

        if ctx.is_stale(generation) {
            debug!(
                door = %self.door.name,
                generation,
                current = ctx.generation,
                "discarding poll result from before the latest command"
            );
            if ctx.resync_pending && ctx.phase == SyncPhase::Idle {
                ctx.resync_pending = false;
                self.start_poll(ctx, tx);
            }
            return;
        }

        match result {
            Ok(payload) => self.apply_status(ctx, &payload).await,
            Err(e) => {
                warn!(door = %self.door.name, error = %e, auth = e.auth, "status poll failed; keeping local state");
            }
        }
    }

    fn on_actuation_finished(
        &self,
        ctx: &mut SyncContext,
        target: bool,
        result: Result<Value, RemoteError>,
        tx: &Completions,
    ) {
        ctx.actuation_in_flight = false;
        let action = if target { "open" } else { "close" };

        // Either way the actuator already shows the controller's intent;
        // the confirming poll after cooldown settles what really happened.
        match result {
            Ok(response) => info!(door = %self.door.name, action, %response, "door command accepted"),
            Err(e) => warn!(door = %self.door.name, action, error = %e, "door command failed"),
        }

        if let Some(next) = ctx.queued_target.take() {
            self.start_actuation(ctx, next, tx);
            return;
        }
        self.schedule_cooldown(ctx, tx);
    }

    fn on_cooldown_expired(&self, ctx: &mut SyncContext, generation: u64, tx: &Completions) {
        if generation != ctx.generation || ctx.phase != SyncPhase::Cooldown {
            debug!(
                door = %self.door.name,
                generation,
                current = ctx.generation,
                "superseded cooldown ignored"
            );
            return;
        }

        ctx.phase = SyncPhase::Idle;
        if ctx.poll_in_flight.is_some() {
            // A pre-command poll is still out; its answer is stale, so
            // poll again as soon as it lands.
            ctx.resync_pending = true;
            return;
        }
        debug!(door = %self.door.name, generation, "cooldown elapsed; re-syncing");
        self.start_poll(ctx, tx);
    }

    // ── State application ────────────────────────────────────────────

    async fn apply_status(&self, ctx: &mut SyncContext, payload: &Value) {
        let state = normalize(payload);
        let changed = state != ctx.last_state;
        ctx.last_state = state;

        if self.config.log_state_changes {
            info!(door = %self.door.name, raw = %payload, state = %state, "door status");
        } else if changed {
            debug!(door = %self.door.name, raw = %payload, state = %state, "door status changed");
        }

        let desired = match (state.actuator_value(), self.config.unknown_state) {
            (Some(value), _) => value,
            (None, UnknownStatePolicy::ForceClosed) => {
                info!(door = %self.door.name, raw = %payload, "unclassifiable status; forcing closed");
                false
            }
            (None, UnknownStatePolicy::Hold) => {
                info!(door = %self.door.name, raw = %payload, "unclassifiable status; leaving actuator unchanged");
                return;
            }
        };

        if self.actuator.get() == desired {
            return;
        }
        match self.actuator.set(desired).await {
            Ok(()) => info!(
                door = %self.door.name,
                state = %state,
                value = if desired { "on (open)" } else { "off (closed)" },
                "actuator updated from remote"
            ),
            Err(e) => warn!(door = %self.door.name, error = %e, "actuator write failed"),
        }
    }

    fn report_battery(&self, result: Result<Option<u8>, RemoteError>) {
        let percent = match result {
            Ok(percent) => percent,
            Err(e) => {
                warn!(door = %self.door.name, error = %e, "battery check failed");
                return;
            }
        };
        match BatteryReading::classify(percent, self.config.battery_low_level) {
            BatteryReading::Low(level) => warn!(
                door = %self.door.name,
                battery = level,
                threshold = ?self.config.battery_low_level,
                "battery low"
            ),
            BatteryReading::Ok(level) => info!(door = %self.door.name, battery = level, "battery level"),
            BatteryReading::Unreadable => warn!(door = %self.door.name, "battery status could not be parsed"),
        }
    }
}

/// Handle to a running [`SyncEngine`].
pub struct EngineHandle {
    door: String,
    snapshot: watch::Receiver<SyncSnapshot>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EngineHandle {
    pub fn door(&self) -> &str {
        &self.door
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn phase(&self) -> SyncPhase {
        self.snapshot.borrow().phase
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot.clone()
    }

    /// Stop all timers and wait for the loop to exit. Remote calls already
    /// in flight are left to finish on their own.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(door = %self.door, error = %e, "sync engine task ended abnormally");
        }
    }
}

/// Interval whose first tick is one period out, dropping missed ticks.
fn periodic(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn tick_optional(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
