#![allow(clippy::unwrap_used)]
// Behavioural tests for `SyncEngine`, driven by a scripted remote and
// tokio's paused clock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

use garagelink_core::{
    Actuator, ActuatorError, CoreError, DoorConfig, DoorState, EngineHandle, ExternalWrites,
    LocalSwitch, RemoteDoor, RemoteError, SyncConfig, SyncEngine, SyncPhase,
    UnknownStatePolicy,
};

// ── Scripted remote ─────────────────────────────────────────────────

#[derive(Clone, Default)]
struct FakeRemote {
    inner: Arc<FakeInner>,
}

struct FakeInner {
    statuses: Mutex<VecDeque<Result<Value, RemoteError>>>,
    fallback: Mutex<Value>,
    battery: Mutex<Option<u8>>,
    status_calls: AtomicUsize,
    open_calls: AtomicUsize,
    close_calls: AtomicUsize,
    battery_calls: AtomicUsize,
    hold_status: AtomicBool,
    status_gate: Semaphore,
    hold_commands: AtomicBool,
    command_gate: Semaphore,
}

impl Default for FakeInner {
    fn default() -> Self {
        Self {
            statuses: Mutex::default(),
            fallback: Mutex::default(),
            battery: Mutex::default(),
            status_calls: AtomicUsize::default(),
            open_calls: AtomicUsize::default(),
            close_calls: AtomicUsize::default(),
            battery_calls: AtomicUsize::default(),
            hold_status: AtomicBool::default(),
            status_gate: Semaphore::new(0),
            hold_commands: AtomicBool::default(),
            command_gate: Semaphore::new(0),
        }
    }
}

impl FakeRemote {
    fn answering(status: Value) -> Self {
        let remote = Self::default();
        remote.set_fallback(status);
        remote
    }

    fn set_fallback(&self, status: Value) {
        *self.inner.fallback.lock().unwrap() = status;
    }

    fn push_status(&self, result: Result<Value, RemoteError>) {
        self.inner.statuses.lock().unwrap().push_back(result);
    }

    fn hold_status(&self, hold: bool) {
        self.inner.hold_status.store(hold, Ordering::SeqCst);
    }

    fn release_status(&self) {
        self.inner.status_gate.add_permits(1);
    }

    fn hold_commands(&self, hold: bool) {
        self.inner.hold_commands.store(hold, Ordering::SeqCst);
    }

    fn release_command(&self) {
        self.inner.command_gate.add_permits(1);
    }

    fn status_calls(&self) -> usize {
        self.inner.status_calls.load(Ordering::SeqCst)
    }

    fn open_calls(&self) -> usize {
        self.inner.open_calls.load(Ordering::SeqCst)
    }

    fn close_calls(&self) -> usize {
        self.inner.close_calls.load(Ordering::SeqCst)
    }

    fn battery_calls(&self) -> usize {
        self.inner.battery_calls.load(Ordering::SeqCst)
    }

    fn next_status(&self) -> Result<Value, RemoteError> {
        let scripted = self.inner.statuses.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.inner.fallback.lock().unwrap().clone()))
    }

    async fn command(&self) -> Result<Value, RemoteError> {
        if self.inner.hold_commands.load(Ordering::SeqCst) {
            self.inner.command_gate.acquire().await.unwrap().forget();
        }
        Ok(json!({ "result": "accepted" }))
    }
}

impl RemoteDoor for FakeRemote {
    async fn get_status(&self) -> Result<Value, RemoteError> {
        self.inner.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.hold_status.load(Ordering::SeqCst) {
            self.inner.status_gate.acquire().await.unwrap().forget();
        }
        self.next_status()
    }

    async fn open(&self) -> Result<Value, RemoteError> {
        self.inner.open_calls.fetch_add(1, Ordering::SeqCst);
        self.command().await
    }

    async fn close(&self) -> Result<Value, RemoteError> {
        self.inner.close_calls.fetch_add(1, Ordering::SeqCst);
        self.command().await
    }

    async fn get_battery(&self) -> Result<Option<u8>, RemoteError> {
        self.inner.battery_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.inner.battery.lock().unwrap())
    }
}

// ── Failing actuator ────────────────────────────────────────────────

/// A switch whose next `failures` engine writes are rejected.
#[derive(Clone)]
struct FlakySwitch {
    switch: LocalSwitch,
    failures: Arc<AtomicUsize>,
    set_calls: Arc<AtomicUsize>,
}

impl FlakySwitch {
    fn new(initial: bool, failures: usize) -> Self {
        Self {
            switch: LocalSwitch::new("Garage Door", initial),
            failures: Arc::new(AtomicUsize::new(failures)),
            set_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }
}

impl Actuator for FlakySwitch {
    fn get(&self) -> bool {
        self.switch.get()
    }

    async fn set(&self, value: bool) -> Result<(), ActuatorError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ActuatorError::new("device unreachable"));
        }
        self.switch.set(value).await
    }

    fn subscribe(&self) -> ExternalWrites {
        self.switch.subscribe()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn door() -> DoorConfig {
    DoorConfig::new("Garage Door", 0, 1)
}

fn start(remote: &FakeRemote, switch: &LocalSwitch, config: SyncConfig) -> EngineHandle {
    SyncEngine::new(door(), remote.clone(), switch.clone(), config)
        .unwrap()
        .spawn()
}

/// Let every ready task run to quiescence.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

// ── Startup ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn initial_poll_runs_before_first_tick() {
    let remote = FakeRemote::answering(json!("CLOSED"));
    let switch = LocalSwitch::new("Garage Door", true);

    let handle = start(&remote, &switch, SyncConfig::default());
    settle().await;

    assert_eq!(remote.status_calls(), 1);
    assert!(!switch.get());

    let snap = handle.snapshot();
    assert_eq!(snap.last_state, DoorState::Closed);
    assert_eq!(snap.phase, SyncPhase::Idle);
    assert!(snap.last_poll.is_some());

    // The engine's own write must not come back as a door command.
    assert_eq!(remote.open_calls(), 0);
    assert_eq!(remote.close_calls(), 0);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn invalid_config_fails_before_spawn() {
    let config = SyncConfig {
        poll_interval: Duration::ZERO,
        ..SyncConfig::default()
    };
    let result = SyncEngine::new(
        door(),
        FakeRemote::default(),
        LocalSwitch::new("Garage Door", false),
        config,
    );
    assert!(matches!(result, Err(CoreError::Configuration { .. })));
}

// ── End-to-end scenarios ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn controller_open_is_confirmed_after_cooldown() {
    let remote = FakeRemote::answering(json!("CLOSED"));
    let switch = LocalSwitch::new("Garage Door", true);
    let handle = start(&remote, &switch, SyncConfig::default());
    settle().await;
    assert!(!switch.get());

    // Controller flips the switch on.
    remote.set_fallback(json!({ "status": "OPEN" }));
    assert!(switch.external_write(true));
    settle().await;

    assert_eq!(remote.open_calls(), 1);
    assert_eq!(handle.phase(), SyncPhase::Cooldown);
    assert_eq!(remote.status_calls(), 1);

    // Cooldown (10s) elapses before the first poll tick (15s).
    advance(10).await;
    settle().await;

    assert_eq!(remote.status_calls(), 2);
    assert!(switch.get());
    assert_eq!(handle.snapshot().last_state, DoorState::Open);
    assert_eq!(handle.phase(), SyncPhase::Idle);
    assert_eq!(remote.open_calls(), 1);
    assert_eq!(remote.close_calls(), 0);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn remote_error_keeps_state_and_next_tick_still_fires() {
    let remote = FakeRemote::answering(json!("CLOSED"));
    remote.push_status(Err(RemoteError {
        action: "status",
        message: "status rejected (HTTP 401)".into(),
        status: Some(401),
        auth: true,
    }));
    let switch = LocalSwitch::new("Garage Door", true);
    let handle = start(&remote, &switch, SyncConfig::default());
    settle().await;

    assert_eq!(remote.status_calls(), 1);
    assert!(switch.get(), "a failed poll must not touch the actuator");
    assert_eq!(handle.snapshot().last_state, DoorState::Unknown);

    advance(15).await;
    assert_eq!(remote.status_calls(), 2);
    assert!(!switch.get());

    advance(15).await;
    assert_eq!(remote.status_calls(), 3);

    handle.shutdown().await;
}

// ── Concurrency guards ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn ticks_are_skipped_while_a_poll_is_in_flight() {
    let remote = FakeRemote::answering(json!("OPEN"));
    remote.hold_status(true);
    let switch = LocalSwitch::new("Garage Door", false);
    let handle = start(&remote, &switch, SyncConfig::default());
    settle().await;

    assert_eq!(remote.status_calls(), 1);
    assert!(handle.snapshot().poll_in_flight);

    // Three ticks pass while the first poll hangs.
    advance(46).await;
    assert_eq!(remote.status_calls(), 1);

    remote.hold_status(false);
    remote.release_status();
    settle().await;
    assert!(switch.get());
    assert!(!handle.snapshot().poll_in_flight);

    // Next tick at t=60s polls normally.
    advance(14).await;
    assert_eq!(remote.status_calls(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn superseded_cooldown_does_not_poll() {
    let config = SyncConfig {
        poll_interval: Duration::from_secs(60),
        ..SyncConfig::default()
    };
    let remote = FakeRemote::answering(json!("CLOSED"));
    let switch = LocalSwitch::new("Garage Door", false);
    let handle = start(&remote, &switch, config);
    settle().await;
    assert_eq!(remote.status_calls(), 1);

    switch.external_write(true);
    settle().await;
    assert_eq!(remote.open_calls(), 1);
    assert_eq!(handle.snapshot().generation, 1);

    // Second write lands mid-cooldown.
    advance(5).await;
    switch.external_write(false);
    settle().await;
    assert_eq!(remote.close_calls(), 1);
    assert_eq!(handle.snapshot().generation, 2);

    // First cooldown would have expired at ~10s: suppressed.
    advance(7).await;
    assert_eq!(remote.status_calls(), 1);
    assert_eq!(handle.phase(), SyncPhase::Cooldown);

    // Second cooldown expires at ~15s and polls once.
    advance(4).await;
    assert_eq!(remote.status_calls(), 2);
    assert!(!switch.get());

    advance(14).await;
    assert_eq!(remote.status_calls(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn poll_started_before_a_command_is_discarded() {
    let remote = FakeRemote::answering(json!("CLOSED"));
    remote.hold_status(true);
    let switch = LocalSwitch::new("Garage Door", false);
    let handle = start(&remote, &switch, SyncConfig::default());
    settle().await;

    switch.external_write(true);
    settle().await;
    assert_eq!(remote.open_calls(), 1);

    // The pre-command poll answers "CLOSED"; it must not revert the switch.
    remote.hold_status(false);
    remote.release_status();
    settle().await;
    assert!(switch.get());
    assert_eq!(handle.snapshot().last_state, DoorState::Unknown);

    remote.set_fallback(json!("opening"));
    advance(10).await;
    assert_eq!(remote.status_calls(), 2);
    assert!(switch.get());
    assert_eq!(handle.snapshot().last_state, DoorState::Opening);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn write_arriving_with_a_poll_result_wins() {
    let remote = FakeRemote::answering(json!("CLOSED"));
    remote.hold_status(true);
    let switch = LocalSwitch::new("Garage Door", false);
    let handle = start(&remote, &switch, SyncConfig::default());
    settle().await;

    // The pre-command poll finishes in the same turn as the controller write.
    remote.hold_status(false);
    remote.release_status();
    assert!(switch.external_write(true));
    settle().await;

    assert_eq!(remote.open_calls(), 1);
    assert!(switch.get(), "the poll result must not revert the controller's write");
    assert_eq!(handle.snapshot().last_state, DoorState::Unknown);
    assert_eq!(handle.phase(), SyncPhase::Cooldown);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn poll_ticks_are_skipped_during_cooldown() {
    let config = SyncConfig {
        cooldown: Duration::from_secs(20),
        ..SyncConfig::default()
    };
    let remote = FakeRemote::answering(json!("CLOSED"));
    let switch = LocalSwitch::new("Garage Door", false);
    let handle = start(&remote, &switch, config);
    settle().await;

    remote.set_fallback(json!("OPEN"));
    switch.external_write(true);
    settle().await;
    assert_eq!(handle.phase(), SyncPhase::Cooldown);

    // The 15s tick falls inside the 20s cooldown.
    advance(16).await;
    assert_eq!(remote.status_calls(), 1);
    assert_eq!(handle.phase(), SyncPhase::Cooldown);

    advance(5).await;
    assert_eq!(remote.status_calls(), 2);
    assert_eq!(handle.phase(), SyncPhase::Idle);
    assert!(switch.get());

    // Regular ticks resume at 30s.
    advance(9).await;
    assert_eq!(remote.status_calls(), 3);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn cooldown_behind_a_slow_poll_resyncs_when_it_lands() {
    let remote = FakeRemote::answering(json!("CLOSED"));
    remote.hold_status(true);
    let switch = LocalSwitch::new("Garage Door", false);
    let handle = start(&remote, &switch, SyncConfig::default());
    settle().await;

    remote.set_fallback(json!("OPEN"));
    switch.external_write(true);
    settle().await;
    assert_eq!(remote.open_calls(), 1);

    // Cooldown ends while the pre-command poll still hangs.
    advance(11).await;
    assert_eq!(remote.status_calls(), 1);
    assert_eq!(handle.phase(), SyncPhase::Idle);

    // The stale answer is dropped and a fresh poll follows at once.
    remote.hold_status(false);
    remote.release_status();
    settle().await;
    assert_eq!(remote.status_calls(), 2);
    assert!(switch.get());
    assert_eq!(handle.snapshot().last_state, DoorState::Open);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn write_during_command_is_queued() {
    let remote = FakeRemote::answering(json!("CLOSED"));
    let switch = LocalSwitch::new("Garage Door", false);
    let handle = start(&remote, &switch, SyncConfig::default());
    settle().await;

    remote.hold_commands(true);
    switch.external_write(true);
    settle().await;
    assert_eq!(remote.open_calls(), 1);
    assert_eq!(handle.phase(), SyncPhase::Actuating);

    switch.external_write(false);
    settle().await;
    assert_eq!(remote.close_calls(), 0, "only one command may be in flight");

    remote.release_command();
    settle().await;
    assert_eq!(remote.close_calls(), 1);

    remote.hold_commands(false);
    remote.release_command();
    settle().await;
    assert_eq!(handle.phase(), SyncPhase::Cooldown);

    handle.shutdown().await;
}

// ── Actuator failures ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_actuator_write_is_corrected_on_next_poll() {
    let remote = FakeRemote::answering(json!("OPEN"));
    let actuator = FlakySwitch::new(false, 1);
    let handle = SyncEngine::new(door(), remote.clone(), actuator.clone(), SyncConfig::default())
        .unwrap()
        .spawn();
    settle().await;

    assert_eq!(actuator.set_calls(), 1);
    assert!(!actuator.get());

    // No retry within the same cycle; the engine keeps running.
    advance(10).await;
    assert_eq!(actuator.set_calls(), 1);
    assert_eq!(handle.phase(), SyncPhase::Idle);

    advance(5).await;
    assert_eq!(remote.status_calls(), 2);
    assert_eq!(actuator.set_calls(), 2);
    assert!(actuator.get());
    assert_eq!(remote.open_calls() + remote.close_calls(), 0);

    handle.shutdown().await;
}

// ── Unknown-state policy ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn unknown_status_holds_actuator_by_default() {
    let remote = FakeRemote::answering(json!({ "foo": 1 }));
    let switch = LocalSwitch::new("Garage Door", true);
    let handle = start(&remote, &switch, SyncConfig::default());
    settle().await;

    assert!(switch.get());
    assert_eq!(handle.snapshot().last_state, DoorState::Unknown);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_status_can_force_closed() {
    let config = SyncConfig {
        unknown_state: UnknownStatePolicy::ForceClosed,
        ..SyncConfig::default()
    };
    let remote = FakeRemote::answering(Value::Null);
    let switch = LocalSwitch::new("Garage Door", true);
    let handle = start(&remote, &switch, config);
    settle().await;

    assert!(!switch.get());
    assert_eq!(remote.close_calls(), 0);

    handle.shutdown().await;
}

// ── Battery monitoring ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn battery_timer_is_off_without_threshold() {
    let config = SyncConfig {
        poll_interval: Duration::from_secs(600),
        ..SyncConfig::default()
    };
    let remote = FakeRemote::answering(json!("CLOSED"));
    let switch = LocalSwitch::new("Garage Door", false);
    let handle = start(&remote, &switch, config);

    advance(2 * 3600 + 1).await;
    assert_eq!(remote.battery_calls(), 0);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn battery_timer_runs_hourly_with_threshold() {
    let config = SyncConfig {
        poll_interval: Duration::from_secs(600),
        battery_low_level: Some(20),
        ..SyncConfig::default()
    };
    let remote = FakeRemote::answering(json!("CLOSED"));
    *remote.inner.battery.lock().unwrap() = Some(12);
    let switch = LocalSwitch::new("Garage Door", false);
    let handle = start(&remote, &switch, config);
    settle().await;
    assert_eq!(remote.battery_calls(), 0);

    advance(3600).await;
    assert_eq!(remote.battery_calls(), 1);

    advance(3600).await;
    assert_eq!(remote.battery_calls(), 2);

    // Battery checks never touch the door state machine.
    assert_eq!(remote.open_calls() + remote.close_calls(), 0);
    assert!(!switch.get());

    handle.shutdown().await;
}

// ── Shutdown ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn shutdown_stops_all_timers() {
    let remote = FakeRemote::answering(json!("CLOSED"));
    let switch = LocalSwitch::new("Garage Door", false);
    let handle = start(&remote, &switch, SyncConfig::default());
    settle().await;

    switch.external_write(true);
    settle().await;
    handle.shutdown().await;

    advance(120).await;
    assert_eq!(remote.status_calls(), 1, "no cooldown or tick poll after shutdown");
}
