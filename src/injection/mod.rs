use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Value written to the continuous-device field of every posted event.
pub const CONTINUOUS_DEVICE_FLAG: i64 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ScrollPhase {
    Ended,
    Began,
    Changed,
    Cancel,
    Initial,
}

impl ScrollPhase {
    pub fn code(self) -> i64 {
        match self {
            Self::Ended => 0,
            Self::Began => 1,
            Self::Changed => 2,
            Self::Cancel => 4,
            Self::Initial => 128,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MomentumPhase {
    None,
    Began,
    Changed,
    Ended,
}

impl MomentumPhase {
    pub fn code(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Began => 1,
            Self::Changed => 2,
            Self::Ended => 3,
        }
    }
}

/// One synthetic scroll-wheel event. Built per tick and never retained by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrollEvent {
    pub speed: f64,
    pub scroll_phase: ScrollPhase,
    pub momentum_phase: MomentumPhase,
}

impl ScrollEvent {
    pub fn new(speed: f64, scroll_phase: ScrollPhase, momentum_phase: MomentumPhase) -> Self {
        Self {
            speed,
            scroll_phase,
            momentum_phase,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("scroll event could not be constructed: {0}")]
    Construction(String),
    #[error("failed to post scroll event: {0}")]
    Post(String),
    #[error("synthetic scroll input is not supported on this platform")]
    Unsupported,
}

/// Host OS boundary: trust query, trust prompt and event posting.
pub trait ScrollBackend: Send {
    fn is_trusted(&mut self) -> bool;

    /// Fire-and-forget; callers re-check `is_trusted` later.
    fn request_trust_prompt(&mut self);

    fn post_scroll(&mut self, event: &ScrollEvent) -> Result<(), EmitError>;
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmitStats {
    pub posted: u64,
    pub skipped: u64,
}

pub struct EventEmitter {
    backend: Box<dyn ScrollBackend>,
    stats: EmitStats,
}

impl EventEmitter {
    pub fn new(backend: Box<dyn ScrollBackend>) -> Self {
        Self {
            backend,
            stats: EmitStats::default(),
        }
    }

    /// Posts one event. A failed post skips the tick and never aborts the caller's loop.
    pub fn emit(&mut self, event: ScrollEvent) -> bool {
        match self.backend.post_scroll(&event) {
            Ok(()) => {
                self.stats.posted += 1;
                debug!(
                    speed = event.speed,
                    scroll_phase = ?event.scroll_phase,
                    momentum_phase = ?event.momentum_phase,
                    "scroll event posted"
                );
                true
            }
            Err(err) => {
                self.stats.skipped += 1;
                warn!(
                    scroll_phase = ?event.scroll_phase,
                    momentum_phase = ?event.momentum_phase,
                    "scroll tick skipped: {err}"
                );
                false
            }
        }
    }

    pub fn stats(&self) -> EmitStats {
        self.stats
    }

    pub fn backend_mut(&mut self) -> &mut dyn ScrollBackend {
        self.backend.as_mut()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformScrollBackend;

impl ScrollBackend for PlatformScrollBackend {
    fn is_trusted(&mut self) -> bool {
        #[cfg(target_os = "macos")]
        {
            return macos::is_process_trusted();
        }

        #[cfg(target_os = "windows")]
        {
            return true;
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            false
        }
    }

    fn request_trust_prompt(&mut self) {
        #[cfg(target_os = "macos")]
        {
            macos::request_trust_prompt();
        }

        #[cfg(not(target_os = "macos"))]
        {
            debug!("trust prompt is not available on this platform");
        }
    }

    fn post_scroll(&mut self, event: &ScrollEvent) -> Result<(), EmitError> {
        #[cfg(target_os = "macos")]
        {
            return macos::post_scroll_event(event);
        }

        #[cfg(target_os = "windows")]
        {
            return send_wheel_input(event);
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            let _ = event;
            Err(EmitError::Unsupported)
        }
    }
}

#[cfg(target_os = "macos")]
mod macos {
    use super::{EmitError, ScrollEvent, CONTINUOUS_DEVICE_FLAG};
    use std::ffi::c_void;

    type CFTypeRef = *const c_void;
    type CFDictionaryRef = *const c_void;
    type CGEventRef = *mut c_void;

    #[repr(C)]
    struct CFDictionaryCallBacks {
        _opaque: [u8; 0],
    }

    const SCROLL_UNIT_PIXEL: u32 = 0;
    const HID_EVENT_TAP: u32 = 0;
    const FIELD_IS_CONTINUOUS: u32 = 88;
    const FIELD_FIXED_PT_DELTA_AXIS_1: u32 = 93;
    const FIELD_POINT_DELTA_AXIS_1: u32 = 96;
    const FIELD_SCROLL_PHASE: u32 = 99;
    const FIELD_MOMENTUM_PHASE: u32 = 123;

    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        static kAXTrustedCheckOptionPrompt: CFTypeRef;
        fn AXIsProcessTrusted() -> u8;
        fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> u8;
        fn CGEventCreateScrollWheelEvent2(
            source: *const c_void,
            units: u32,
            wheel_count: u32,
            wheel1: i32,
            wheel2: i32,
            wheel3: i32,
        ) -> CGEventRef;
        fn CGEventSetIntegerValueField(event: CGEventRef, field: u32, value: i64);
        fn CGEventSetDoubleValueField(event: CGEventRef, field: u32, value: f64);
        fn CGEventPost(tap: u32, event: CGEventRef);
    }

    #[link(name = "CoreFoundation", kind = "framework")]
    extern "C" {
        static kCFBooleanTrue: CFTypeRef;
        static kCFTypeDictionaryKeyCallBacks: CFDictionaryCallBacks;
        static kCFTypeDictionaryValueCallBacks: CFDictionaryCallBacks;
        fn CFDictionaryCreate(
            allocator: *const c_void,
            keys: *const CFTypeRef,
            values: *const CFTypeRef,
            count: isize,
            key_callbacks: *const CFDictionaryCallBacks,
            value_callbacks: *const CFDictionaryCallBacks,
        ) -> CFDictionaryRef;
        fn CFRelease(cf: CFTypeRef);
    }

    pub(super) fn is_process_trusted() -> bool {
        // SAFETY: AXIsProcessTrusted takes no arguments and only reads process state.
        unsafe { AXIsProcessTrusted() != 0 }
    }

    pub(super) fn request_trust_prompt() {
        // SAFETY: key and value are valid CF constants; the dictionary is released after use.
        unsafe {
            let keys = [kAXTrustedCheckOptionPrompt];
            let values = [kCFBooleanTrue];
            let options = CFDictionaryCreate(
                std::ptr::null(),
                keys.as_ptr(),
                values.as_ptr(),
                1,
                &kCFTypeDictionaryKeyCallBacks,
                &kCFTypeDictionaryValueCallBacks,
            );
            if options.is_null() {
                tracing::warn!("could not build accessibility prompt options");
                return;
            }
            let _ = AXIsProcessTrustedWithOptions(options);
            CFRelease(options);
        }
    }

    pub(super) fn post_scroll_event(event: &ScrollEvent) -> Result<(), EmitError> {
        let delta = event.speed.round() as i32;
        // SAFETY: a null source is allowed; the event is checked for null and released after posting.
        unsafe {
            let handle =
                CGEventCreateScrollWheelEvent2(std::ptr::null(), SCROLL_UNIT_PIXEL, 1, delta, 0, 0);
            if handle.is_null() {
                return Err(EmitError::Construction(
                    "CGEventCreateScrollWheelEvent2 returned null".to_string(),
                ));
            }
            CGEventSetDoubleValueField(handle, FIELD_FIXED_PT_DELTA_AXIS_1, event.speed);
            CGEventSetIntegerValueField(handle, FIELD_POINT_DELTA_AXIS_1, delta as i64);
            CGEventSetIntegerValueField(handle, FIELD_SCROLL_PHASE, event.scroll_phase.code());
            CGEventSetIntegerValueField(
                handle,
                FIELD_MOMENTUM_PHASE,
                event.momentum_phase.code(),
            );
            CGEventSetIntegerValueField(handle, FIELD_IS_CONTINUOUS, CONTINUOUS_DEVICE_FLAG);
            CGEventPost(HID_EVENT_TAP, handle);
            CFRelease(handle as CFTypeRef);
        }
        Ok(())
    }
}

#[cfg(target_os = "windows")]
fn send_wheel_input(event: &ScrollEvent) -> Result<(), EmitError> {
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_WHEEL, MOUSEINPUT,
    };

    let delta = event.speed.round() as i32;
    if delta == 0 {
        return Ok(());
    }

    let mut inputs = [INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: delta,
                dwFlags: MOUSEEVENTF_WHEEL,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }];

    // SAFETY: INPUT payload is fully initialized and SendInput is called with a valid pointer.
    let sent = unsafe {
        SendInput(
            inputs.len() as u32,
            inputs.as_mut_ptr(),
            std::mem::size_of::<INPUT>() as i32,
        )
    };
    if sent != inputs.len() as u32 {
        return Err(EmitError::Post(format!(
            "SendInput rejected wheel input: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct RecordingState {
    trusted: bool,
    grant_on_prompt: bool,
    prompts: usize,
    failure_budget: usize,
    events: Vec<ScrollEvent>,
}

/// In-memory backend that records every posted event. Clones share the same recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingBackend {
    pub fn trusted() -> Self {
        Self::default().with_trust(true)
    }

    pub fn untrusted() -> Self {
        Self::default().with_trust(false)
    }

    pub fn with_trust(self, trusted: bool) -> Self {
        self.lock().trusted = trusted;
        self
    }

    /// The next prompt request flips the backend to trusted.
    pub fn with_grant_on_prompt(self, grant: bool) -> Self {
        self.lock().grant_on_prompt = grant;
        self
    }

    /// The next `failures` posts fail with a construction error.
    pub fn with_failure_budget(self, failures: usize) -> Self {
        self.lock().failure_budget = failures;
        self
    }

    pub fn set_trusted(&self, trusted: bool) {
        self.lock().trusted = trusted;
    }

    pub fn events(&self) -> Vec<ScrollEvent> {
        self.lock().events.clone()
    }

    pub fn prompt_count(&self) -> usize {
        self.lock().prompts
    }

    pub fn clear(&self) {
        self.lock().events.clear();
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ScrollBackend for RecordingBackend {
    fn is_trusted(&mut self) -> bool {
        self.lock().trusted
    }

    fn request_trust_prompt(&mut self) {
        let mut state = self.lock();
        state.prompts += 1;
        if state.grant_on_prompt {
            state.trusted = true;
        }
    }

    fn post_scroll(&mut self, event: &ScrollEvent) -> Result<(), EmitError> {
        let mut state = self.lock();
        if state.failure_budget > 0 {
            state.failure_budget -= 1;
            return Err(EmitError::Construction(
                "recording backend refused the event".to_string(),
            ));
        }
        state.events.push(*event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_codes_match_gesture_recognizer_encoding() {
        assert_eq!(ScrollPhase::Ended.code(), 0);
        assert_eq!(ScrollPhase::Began.code(), 1);
        assert_eq!(ScrollPhase::Changed.code(), 2);
        assert_eq!(ScrollPhase::Cancel.code(), 4);
        assert_eq!(ScrollPhase::Initial.code(), 128);
        assert_eq!(MomentumPhase::None.code(), 0);
        assert_eq!(MomentumPhase::Began.code(), 1);
        assert_eq!(MomentumPhase::Changed.code(), 2);
        assert_eq!(MomentumPhase::Ended.code(), 3);
        assert_eq!(CONTINUOUS_DEVICE_FLAG, 1);
    }

    #[test]
    fn emitter_skips_failed_ticks_and_keeps_going() {
        let backend = RecordingBackend::trusted().with_failure_budget(2);
        let mut emitter = EventEmitter::new(Box::new(backend.clone()));

        for speed in [1.0, 2.0, 3.0, 4.0] {
            emitter.emit(ScrollEvent::new(
                speed,
                ScrollPhase::Changed,
                MomentumPhase::None,
            ));
        }

        assert_eq!(
            emitter.stats(),
            EmitStats {
                posted: 2,
                skipped: 2
            }
        );
        let speeds: Vec<f64> = backend.events().iter().map(|e| e.speed).collect();
        assert_eq!(speeds, vec![3.0, 4.0]);
    }

    #[test]
    fn prompt_can_grant_trust() {
        let mut backend = RecordingBackend::untrusted().with_grant_on_prompt(true);
        assert!(!backend.is_trusted());
        backend.request_trust_prompt();
        assert!(backend.is_trusted());
        assert_eq!(backend.prompt_count(), 1);
    }

    #[test]
    fn events_serialize_with_camel_case_phases() {
        let event = ScrollEvent::new(40.0, ScrollPhase::Ended, MomentumPhase::Began);
        let json = serde_json::to_string(&event).expect("event should serialize");
        assert_eq!(
            json,
            r#"{"speed":40.0,"scrollPhase":"ended","momentumPhase":"began"}"#
        );
    }
}
