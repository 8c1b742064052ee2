use crate::injection::ScrollBackend;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InjectionCapability {
    Trusted,
    Untrusted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSnapshot {
    pub capability: InjectionCapability,
    pub prompt_requested: bool,
    pub message: Option<String>,
}

/// Holds the last known "may inject input" state. Every read goes back to the host OS.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    snapshot: PermissionSnapshot,
}

impl PermissionGate {
    pub fn new(backend: &mut dyn ScrollBackend) -> Self {
        let capability = infer_capability(backend);
        Self {
            snapshot: PermissionSnapshot {
                capability,
                prompt_requested: false,
                message: capability_message(capability, false),
            },
        }
    }

    pub fn snapshot(&self) -> PermissionSnapshot {
        self.snapshot.clone()
    }

    /// Last value read by `check` or `ensure_capability`.
    pub fn has_capability(&self) -> bool {
        self.snapshot.capability == InjectionCapability::Trusted
    }

    pub fn check(&mut self, backend: &mut dyn ScrollBackend) -> bool {
        self.snapshot.capability = infer_capability(backend);
        self.snapshot.message = capability_message(self.snapshot.capability, false);
        self.has_capability()
    }

    /// Re-reads trust and, if it is missing, asks the OS to surface its grant UI.
    /// The prompt has no callback: callers re-check later.
    pub fn ensure_capability(&mut self, backend: &mut dyn ScrollBackend) -> PermissionSnapshot {
        if self.check(backend) {
            self.snapshot.prompt_requested = false;
            return self.snapshot();
        }

        info!("input injection is not trusted; requesting system prompt");
        backend.request_trust_prompt();
        self.snapshot.prompt_requested = true;
        self.snapshot.message = capability_message(self.snapshot.capability, true);
        self.snapshot()
    }
}

fn infer_capability(backend: &mut dyn ScrollBackend) -> InjectionCapability {
    if backend.is_trusted() {
        InjectionCapability::Trusted
    } else {
        InjectionCapability::Untrusted
    }
}

fn capability_message(capability: InjectionCapability, prompted: bool) -> Option<String> {
    match (capability, prompted) {
        (InjectionCapability::Trusted, _) => None,
        (InjectionCapability::Untrusted, false) => Some(
            "Synthetic scrolling needs accessibility access. Grant it in system settings, then retry."
                .to_string(),
        ),
        (InjectionCapability::Untrusted, true) => Some(
            "Accessibility prompt requested. Check again once access has been granted.".to_string(),
        ),
    }
}
