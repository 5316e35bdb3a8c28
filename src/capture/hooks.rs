//! Process-wide panic hook
//!
//! At most one capture hook is active per process. Installing chains the
//! previously registered hook (so default panic output is kept) and
//! uninstalling restores it.

use super::ExceptionCapture;
use std::panic::PanicHookInfo;
use std::sync::{Arc, Mutex};

type PanicHook = dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static;

/// `Some(previous hook)` while our hook is installed
static HOOK_STATE: Mutex<Option<Arc<PanicHook>>> = Mutex::new(None);

/// Install the capture panic hook
///
/// Returns `false` (and changes nothing) if a capture hook is already active.
pub fn install_panic_hook(capture: ExceptionCapture) -> bool {
    let mut state = HOOK_STATE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if state.is_some() {
        tracing::debug!("Panic hook already installed, skipping");
        return false;
    }

    let previous: Arc<PanicHook> = Arc::from(std::panic::take_hook());
    *state = Some(previous.clone());

    std::panic::set_hook(Box::new(move |info| {
        capture.report_panic(None, info.payload(), info.location());
        previous(info);
    }));

    tracing::info!("Panic capture hook installed");
    true
}

/// Remove the capture hook and restore the one it replaced
pub fn uninstall_panic_hook() -> bool {
    let mut state = HOOK_STATE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let Some(previous) = state.take() else {
        return false;
    };

    // Drop ours, put the chained one back
    let _ = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| previous(info)));

    tracing::info!("Panic capture hook removed");
    true
}

pub fn panic_hook_installed() -> bool {
    HOOK_STATE
        .lock()
        .map(|state| state.is_some())
        .unwrap_or(false)
}
