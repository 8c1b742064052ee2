pub mod countdown;
pub mod engine;
pub mod injection;
pub mod momentum;
pub mod permissions;
pub mod phase;
pub mod ramp;
pub mod settings;

pub use engine::{EngineConfig, EngineError, EngineSnapshot, ScrollEngine};
pub use injection::{MomentumPhase, ScrollEvent, ScrollPhase};
pub use ramp::{GestureRequest, RampCurve};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the fmt subscriber used by the binaries. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
