//! Gesture engine: owns the single `EngineState` and drives the countdown, ramp and
//! momentum generators from one periodic timer at a time.
//!
//! Every timer tick and every control call takes the state lock, so ticks and
//! calls are serialized even on a multi-threaded runtime. Each timer carries the
//! generation it was spawned with; a tick that wakes after its timer was replaced
//! sees a different generation and exits without touching the state.

use crate::{
    countdown::{CountdownScheduler, CountdownTick, COUNTDOWN_SECONDS},
    injection::{EmitStats, EventEmitter, PlatformScrollBackend, ScrollBackend, ScrollEvent},
    momentum::{self, MomentumTail, DEFAULT_MOMENTUM_THRESHOLD},
    permissions::{PermissionGate, PermissionSnapshot},
    phase::{GesturePhase, PhaseError, PhaseStateMachine},
    ramp::{GestureRequest, RampGenerator, RequestError},
    settings::{ScrollSettings, DEFAULT_TICK_INTERVAL_MS},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{watch, Mutex},
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub tick_interval: Duration,
    pub countdown_interval: Duration,
    pub countdown_seconds: u32,
    pub momentum_enabled: bool,
    pub momentum_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            countdown_interval: Duration::from_secs(1),
            countdown_seconds: COUNTDOWN_SECONDS,
            momentum_enabled: true,
            momentum_threshold: DEFAULT_MOMENTUM_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &ScrollSettings) -> Self {
        Self {
            tick_interval: Duration::from_millis(settings.tick_interval_ms.max(1)),
            countdown_seconds: settings.countdown_seconds.max(1),
            momentum_enabled: settings.momentum_enabled,
            momentum_threshold: settings.momentum_threshold.abs(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub phase: GesturePhase,
    pub is_scrolling: bool,
    pub is_counting_down: bool,
    pub countdown_remaining: u32,
    pub has_capability: bool,
    pub tick_index: u32,
    pub current_speed: f64,
    pub active_request: Option<GestureRequest>,
    pub pending_request: Option<GestureRequest>,
    pub events: EmitStats,
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("synthetic input is not trusted by the host OS")]
    CapabilityDenied,
    #[error("invalid gesture request: {0}")]
    InvalidRequest(#[from] RequestError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Countdown,
    Ramp,
    Momentum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Continue,
    Done,
}

struct ActiveTimer {
    generation: u64,
    kind: TimerKind,
    cancel: CancellationToken,
}

struct EngineState {
    machine: PhaseStateMachine,
    countdown: CountdownScheduler<RampGenerator>,
    ramp: Option<RampGenerator>,
    momentum: Option<MomentumTail>,
    active_request: Option<GestureRequest>,
    tick_index: u32,
    current_speed: f64,
    emitter: EventEmitter,
    gate: PermissionGate,
    timer: Option<ActiveTimer>,
    generation: u64,
    message: Option<String>,
}

impl EngineState {
    fn new(backend: Box<dyn ScrollBackend>, config: &EngineConfig) -> Self {
        let mut emitter = EventEmitter::new(backend);
        let gate = PermissionGate::new(emitter.backend_mut());
        Self {
            machine: PhaseStateMachine::new(),
            countdown: CountdownScheduler::new(config.countdown_seconds),
            ramp: None,
            momentum: None,
            active_request: None,
            tick_index: 0,
            current_speed: 0.0,
            emitter,
            gate,
            timer: None,
            generation: 0,
            message: None,
        }
    }

    fn snapshot(&self) -> EngineSnapshot {
        let phase = self.machine.phase();
        EngineSnapshot {
            phase,
            is_scrolling: matches!(phase, GesturePhase::Ramping | GesturePhase::Decaying),
            is_counting_down: phase == GesturePhase::CountingDown,
            countdown_remaining: self.countdown.remaining(),
            has_capability: self.gate.has_capability(),
            tick_index: self.tick_index,
            current_speed: self.current_speed,
            active_request: self.active_request,
            pending_request: self.countdown.pending().map(|ramp| *ramp.request()),
            events: self.emitter.stats(),
            message: self.message.clone(),
        }
    }

    fn check_capability(&mut self) -> bool {
        let trusted = self.gate.check(self.emitter.backend_mut());
        self.message = self.gate.snapshot().message;
        trusted
    }

    fn ensure_capability(&mut self) -> PermissionSnapshot {
        let snapshot = self.gate.ensure_capability(self.emitter.backend_mut());
        self.message = snapshot.message.clone();
        snapshot
    }

    fn emit_all(&mut self, events: impl IntoIterator<Item = ScrollEvent>) {
        for event in events {
            self.emitter.emit(event);
        }
    }

    fn owns_timer(&self, generation: u64) -> bool {
        self.timer
            .as_ref()
            .is_some_and(|timer| timer.generation == generation)
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            debug!(kind = ?timer.kind, generation = timer.generation, "timer cancelled");
            timer.cancel.cancel();
        }
    }

    fn clear_gesture(&mut self) {
        self.ramp = None;
        self.momentum = None;
        self.active_request = None;
        self.tick_index = 0;
        self.current_speed = 0.0;
    }
}

struct EngineShared {
    config: EngineConfig,
    state: Mutex<EngineState>,
    updates: watch::Sender<EngineSnapshot>,
}

impl EngineShared {
    fn publish(&self, state: &EngineState) -> EngineSnapshot {
        let snapshot = state.snapshot();
        self.updates.send_replace(snapshot.clone());
        snapshot
    }

    fn spawn_timer(self: &Arc<Self>, state: &mut EngineState, kind: TimerKind) {
        state.cancel_timer();
        state.generation += 1;
        let generation = state.generation;
        let cancel = CancellationToken::new();
        state.timer = Some(ActiveTimer {
            generation,
            kind,
            cancel: cancel.clone(),
        });

        let period = match kind {
            TimerKind::Countdown => self.config.countdown_interval,
            TimerKind::Ramp | TimerKind::Momentum => self.config.tick_interval,
        };
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let mut guard = shared.state.lock().await;
                let state = &mut *guard;
                if !state.owns_timer(generation) {
                    break;
                }
                let outcome = shared.on_tick(state, kind);
                if outcome == TickOutcome::Done && state.owns_timer(generation) {
                    state.timer = None;
                }
                shared.publish(state);
                if outcome == TickOutcome::Done {
                    break;
                }
            }
        });
    }

    fn on_tick(self: &Arc<Self>, state: &mut EngineState, kind: TimerKind) -> TickOutcome {
        match kind {
            TimerKind::Countdown => match state.countdown.tick() {
                CountdownTick::Remaining(remaining) => {
                    debug!(remaining, "countdown tick");
                    TickOutcome::Continue
                }
                CountdownTick::Finished(ramp) => {
                    info!("countdown finished");
                    self.begin_ramp(state, ramp);
                    TickOutcome::Done
                }
                CountdownTick::Idle => TickOutcome::Done,
            },
            TimerKind::Ramp => self.advance_ramp(state),
            TimerKind::Momentum => self.advance_momentum(state),
        }
    }

    fn begin_ramp(self: &Arc<Self>, state: &mut EngineState, mut ramp: RampGenerator) {
        let request = *ramp.request();
        let start_speed = ramp.next_speed().unwrap_or(request.start_speed);
        match state.machine.begin_ramp(start_speed) {
            Ok(events) => state.emit_all(events),
            Err(err) => return self.fault(state, err),
        }

        info!(
            start_speed = request.start_speed,
            end_speed = request.end_speed,
            step_count = request.step_count,
            curve = ?request.curve,
            "ramp started"
        );
        state.active_request = Some(request);
        state.ramp = Some(ramp);
        state.momentum = None;
        state.tick_index = 0;
        state.current_speed = start_speed;
        state.message = None;
        self.spawn_timer(state, TimerKind::Ramp);
    }

    fn advance_ramp(&self, state: &mut EngineState) -> TickOutcome {
        let Some(ramp) = state.ramp.as_mut() else {
            return TickOutcome::Done;
        };
        let next = ramp
            .next_speed()
            .map(|speed| (speed, ramp.current_index().unwrap_or_default()));

        match next {
            Some((speed, index)) => {
                match state.machine.ramp_tick(speed) {
                    Ok(event) => {
                        state.emitter.emit(event);
                    }
                    Err(err) => {
                        self.fault(state, err);
                        return TickOutcome::Done;
                    }
                }
                state.tick_index = index;
                state.current_speed = speed;
                TickOutcome::Continue
            }
            None => {
                match state.machine.complete_ramp() {
                    Ok(event) => {
                        state.emitter.emit(event);
                    }
                    Err(err) => {
                        self.fault(state, err);
                        return TickOutcome::Done;
                    }
                }
                info!("ramp completed");
                state.clear_gesture();
                TickOutcome::Done
            }
        }
    }

    fn advance_momentum(&self, state: &mut EngineState) -> TickOutcome {
        let Some(step) = state.momentum.as_mut().and_then(|tail| tail.next()) else {
            warn!("momentum timer fired without a tail");
            self.stop_all(state);
            return TickOutcome::Done;
        };

        match state.machine.momentum_tick(step.speed, step.is_last) {
            Ok(event) => {
                state.emitter.emit(event);
            }
            Err(err) => {
                self.fault(state, err);
                return TickOutcome::Done;
            }
        }
        state.tick_index = step.index;
        state.current_speed = step.speed;
        if !step.is_last {
            return TickOutcome::Continue;
        }

        match state.machine.finish_momentum() {
            Ok(event) => {
                state.emitter.emit(event);
            }
            Err(err) => {
                self.fault(state, err);
                return TickOutcome::Done;
            }
        }
        info!("momentum tail finished");
        state.clear_gesture();
        TickOutcome::Done
    }

    /// External stop mid-ramp. Hands off to the momentum tail when the release is fast enough.
    fn release_ramp(self: &Arc<Self>, state: &mut EngineState) {
        let speed = state.current_speed;
        let tail = (self.config.momentum_enabled
            && momentum::qualifies(speed, self.config.momentum_threshold))
        .then(|| MomentumTail::new(speed));

        state.cancel_timer();
        match state
            .machine
            .cancel_ramp(speed, tail.as_ref().map(MomentumTail::base_speed))
        {
            Ok(events) => state.emit_all(events),
            Err(err) => return self.fault(state, err),
        }
        state.ramp = None;
        state.tick_index = 0;

        match tail {
            Some(tail) => {
                info!(
                    release_speed = speed,
                    base_speed = tail.base_speed(),
                    "ramp released into momentum"
                );
                state.current_speed = tail.base_speed();
                state.momentum = Some(tail);
                self.spawn_timer(state, TimerKind::Momentum);
            }
            None => {
                info!(release_speed = speed, "ramp cancelled without momentum");
                state.clear_gesture();
            }
        }
    }

    fn stop_all(&self, state: &mut EngineState) {
        state.cancel_timer();
        if state.countdown.cancel().is_some() {
            debug!("pending request discarded");
        }
        if let Some(event) = state.machine.stop_all(state.current_speed) {
            state.emitter.emit(event);
        }
        state.clear_gesture();
    }

    fn fault(&self, state: &mut EngineState, err: PhaseError) {
        error!("gesture lifecycle fault: {err}");
        self.stop_all(state);
        state.message = Some(format!("Gesture aborted: {err}"));
    }
}

/// Cheap to clone; clones drive the same engine.
#[derive(Clone)]
pub struct ScrollEngine {
    shared: Arc<EngineShared>,
}

impl Default for ScrollEngine {
    fn default() -> Self {
        Self::new(Box::new(PlatformScrollBackend), EngineConfig::default())
    }
}

impl ScrollEngine {
    pub fn new(backend: Box<dyn ScrollBackend>, config: EngineConfig) -> Self {
        let state = EngineState::new(backend, &config);
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            shared: Arc::new(EngineShared {
                config,
                state: Mutex::new(state),
                updates,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Counts down, then ramps. Restarting during a countdown replaces the pending request.
    pub async fn start_with_countdown(
        &self,
        request: GestureRequest,
    ) -> Result<EngineSnapshot, EngineError> {
        let ramp = RampGenerator::new(request)?;
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;
        self.require_capability(state)?;

        match state.machine.phase() {
            GesturePhase::Ramping | GesturePhase::Decaying => {
                info!("new countdown replaces the gesture in flight");
                self.shared.stop_all(state);
            }
            GesturePhase::CountingDown => info!("countdown restarted with the newest request"),
            GesturePhase::Idle => {}
        }

        if let Err(err) = state.machine.begin_countdown() {
            self.shared.fault(state, err);
            return Ok(self.shared.publish(state));
        }
        if let Some(discarded) = state.countdown.start(ramp) {
            debug!(discarded = ?discarded.request(), "pending request replaced");
        }
        state.message = None;
        info!(seconds = state.countdown.remaining(), "countdown started");
        self.shared.spawn_timer(state, TimerKind::Countdown);
        Ok(self.shared.publish(state))
    }

    /// Ramps immediately with the request's curve. A gesture already in flight is stopped first.
    pub async fn start_with_curve(
        &self,
        request: GestureRequest,
    ) -> Result<EngineSnapshot, EngineError> {
        let ramp = RampGenerator::new(request)?;
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;
        self.require_capability(state)?;

        if state.machine.phase() != GesturePhase::Idle {
            info!("new gesture replaces the one in flight");
            self.shared.stop_all(state);
        }
        self.shared.begin_ramp(state, ramp);
        Ok(self.shared.publish(state))
    }

    /// Ends the ramp only, handing off to momentum when applicable. Aborts a countdown.
    pub async fn stop(&self) -> EngineSnapshot {
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;
        match state.machine.phase() {
            GesturePhase::Ramping => self.shared.release_ramp(state),
            GesturePhase::CountingDown => {
                state.cancel_timer();
                let _ = state.countdown.cancel();
                if let Err(err) = state.machine.abort_countdown() {
                    self.shared.fault(state, err);
                }
                info!("countdown aborted");
            }
            GesturePhase::Idle | GesturePhase::Decaying => {
                debug!(phase = ?state.machine.phase(), "stop ignored");
            }
        }
        self.shared.publish(state)
    }

    /// Ends countdown, ramp or momentum immediately. No tail follows. Idempotent.
    pub async fn stop_all(&self) -> EngineSnapshot {
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;
        if state.machine.phase() != GesturePhase::Idle {
            info!(phase = ?state.machine.phase(), "stopping all gesture activity");
        }
        self.shared.stop_all(state);
        self.shared.publish(state)
    }

    pub async fn has_capability(&self) -> bool {
        let mut guard = self.shared.state.lock().await;
        let trusted = guard.check_capability();
        self.shared.publish(&guard);
        trusted
    }

    pub async fn ensure_capability(&self) -> PermissionSnapshot {
        let mut guard = self.shared.state.lock().await;
        let snapshot = guard.ensure_capability();
        self.shared.publish(&guard);
        snapshot
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        self.shared.state.lock().await.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Resolves once the lifecycle is back to idle.
    pub async fn wait_for_idle(&self) -> EngineSnapshot {
        let mut updates = self.subscribe();
        let idle = updates
            .wait_for(|snapshot| snapshot.phase == GesturePhase::Idle)
            .await
            .map(|snapshot| (*snapshot).clone());
        match idle {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot().await,
        }
    }

    fn require_capability(&self, state: &mut EngineState) -> Result<(), EngineError> {
        if state.check_capability() {
            return Ok(());
        }
        warn!("gesture rejected: input injection is not trusted");
        self.shared.publish(state);
        Err(EngineError::CapabilityDenied)
    }
}
