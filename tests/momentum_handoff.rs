use glidescroll_core_lib::{
    engine::{EngineConfig, ScrollEngine},
    injection::{MomentumPhase, RecordingBackend, ScrollEvent, ScrollPhase},
    momentum::TAIL_TICKS,
    phase::GesturePhase,
    ramp::GestureRequest,
};

/// Speeds 10, 20, ..., 90: tick 4 runs at exactly 50.
fn nine_step_request() -> GestureRequest {
    GestureRequest::new(10.0, 90.0, 9)
}

async fn stop_at_tick(engine: &ScrollEngine, tick: u32) {
    let mut updates = engine.subscribe();
    let _ = updates.wait_for(|s| s.tick_index == tick).await;
    engine.stop().await;
}

fn tail_of(events: &[ScrollEvent]) -> &[ScrollEvent] {
    let cancel = events
        .iter()
        .position(|e| e.scroll_phase == ScrollPhase::Cancel)
        .expect("a cancel event should be recorded");
    &events[cancel + 1..]
}

#[tokio::test(start_paused = true)]
async fn cancel_at_fifty_hands_off_tail_starting_at_forty() {
    let backend = RecordingBackend::trusted();
    let engine = ScrollEngine::new(Box::new(backend.clone()), EngineConfig::default());

    engine
        .start_with_curve(nine_step_request())
        .await
        .expect("start should succeed");
    stop_at_tick(&engine, 4).await;

    let decaying = engine.snapshot().await;
    assert_eq!(decaying.phase, GesturePhase::Decaying);
    assert!(decaying.is_scrolling);

    let idle = engine.wait_for_idle().await;
    assert_eq!(idle.phase, GesturePhase::Idle);
    assert!(!idle.is_scrolling);

    let events = backend.events();
    let cancel = events
        .iter()
        .find(|e| e.scroll_phase == ScrollPhase::Cancel)
        .copied();
    assert_eq!(
        cancel,
        Some(ScrollEvent::new(50.0, ScrollPhase::Cancel, MomentumPhase::None))
    );

    let tail = tail_of(&events);
    assert_eq!(
        tail[0],
        ScrollEvent::new(40.0, ScrollPhase::Ended, MomentumPhase::Began)
    );
    assert!(tail.iter().all(|e| e.scroll_phase == ScrollPhase::Ended));

    let ticks = &tail[1..=TAIL_TICKS as usize];
    let momentum: Vec<MomentumPhase> = ticks.iter().map(|e| e.momentum_phase).collect();
    let mut expected = vec![MomentumPhase::Changed; TAIL_TICKS as usize - 1];
    expected.push(MomentumPhase::Ended);
    assert_eq!(momentum, expected);

    let mut previous = 40.0f64;
    for tick in ticks {
        assert!(tick.speed.abs() < previous);
        previous = tick.speed.abs();
    }
    assert!((previous - 40.0 * (-3.0f64).exp()).abs() < 1e-9);

    assert_eq!(tail.len(), 1 + TAIL_TICKS as usize + 1);
    assert_eq!(
        tail.last().copied(),
        Some(ScrollEvent::new(0.0, ScrollPhase::Ended, MomentumPhase::Ended))
    );
}

#[tokio::test(start_paused = true)]
async fn slow_release_skips_the_tail() {
    let backend = RecordingBackend::trusted();
    let engine = ScrollEngine::new(Box::new(backend.clone()), EngineConfig::default());

    engine
        .start_with_curve(GestureRequest::new(0.05, 0.08, 10))
        .await
        .expect("start should succeed");
    let stopped = engine.stop().await;
    assert_eq!(stopped.phase, GesturePhase::Idle);

    let phases: Vec<ScrollPhase> = backend.events().iter().map(|e| e.scroll_phase).collect();
    assert_eq!(
        phases,
        vec![ScrollPhase::Initial, ScrollPhase::Began, ScrollPhase::Cancel]
    );
}

#[tokio::test(start_paused = true)]
async fn natural_completion_never_starts_a_tail() {
    let backend = RecordingBackend::trusted();
    let engine = ScrollEngine::new(Box::new(backend.clone()), EngineConfig::default());

    engine
        .start_with_curve(nine_step_request())
        .await
        .expect("start should succeed");
    engine.wait_for_idle().await;

    // Stop after completion is a no-op.
    engine.stop().await;
    assert!(backend
        .events()
        .iter()
        .all(|e| e.momentum_phase == MomentumPhase::None));
    assert_eq!(
        backend.events().last().map(|e| e.scroll_phase),
        Some(ScrollPhase::Ended)
    );
}

#[tokio::test(start_paused = true)]
async fn disabled_momentum_goes_straight_to_idle() {
    let backend = RecordingBackend::trusted();
    let config = EngineConfig {
        momentum_enabled: false,
        ..EngineConfig::default()
    };
    let engine = ScrollEngine::new(Box::new(backend.clone()), config);

    engine
        .start_with_curve(nine_step_request())
        .await
        .expect("start should succeed");
    stop_at_tick(&engine, 4).await;

    assert_eq!(engine.snapshot().await.phase, GesturePhase::Idle);
    assert_eq!(
        backend.events().last().map(|e| e.scroll_phase),
        Some(ScrollPhase::Cancel)
    );
}

#[tokio::test(start_paused = true)]
async fn stop_all_mid_tail_closes_exactly_once() {
    let backend = RecordingBackend::trusted();
    let engine = ScrollEngine::new(Box::new(backend.clone()), EngineConfig::default());

    engine
        .start_with_curve(nine_step_request())
        .await
        .expect("start should succeed");
    stop_at_tick(&engine, 4).await;

    let mut updates = engine.subscribe();
    let _ = updates
        .wait_for(|s| s.phase == GesturePhase::Decaying && s.tick_index == 9)
        .await;
    let stopped = engine.stop_all().await;
    assert_eq!(stopped.phase, GesturePhase::Idle);
    assert_eq!(stopped.tick_index, 0);
    assert_eq!(stopped.current_speed, 0.0);

    // Let any stale timer wake up; it must not emit.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let again = engine.stop_all().await;
    assert_eq!(again.phase, GesturePhase::Idle);

    let events = backend.events();
    let tail = tail_of(&events);
    // Release event, ten tail ticks, closing event.
    assert_eq!(tail.len(), 1 + 10 + 1);
    let closing: Vec<&ScrollEvent> = tail
        .iter()
        .filter(|e| e.momentum_phase == MomentumPhase::Ended)
        .collect();
    assert_eq!(closing.len(), 1);
    assert_eq!(closing[0].speed, 0.0);
}
