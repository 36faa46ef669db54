// Panic isolation for probe workers and custom processors
use std::any::Any;
use std::panic::{catch_unwind, UnwindSafe};
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed successfully
    Success(T),
    /// Execution panicked
    Panicked(String),
}

/// Render a panic payload as text
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Execute a closure with panic isolation
///
/// If the closure panics, the panic is caught and returned as
/// PanicGuardResult::Panicked. Used around custom output processors so a
/// parser choking on unexpected output cannot take the run down.
///
/// # Example
/// ```text
/// let result = execute_guarded(|| parse(output));
/// if let PanicGuardResult::Panicked(msg) = result {
///     reasons.push(Reason::text(format!("processor panicked: {}", msg)));
/// }
/// ```
pub fn execute_guarded<F, T>(f: F) -> PanicGuardResult<T>
where
    F: FnOnce() -> T + UnwindSafe,
{
    match catch_unwind(f) {
        Ok(result) => PanicGuardResult::Success(result),
        Err(payload) => {
            let panic_msg = panic_message(payload);
            error!(panic_msg = %panic_msg, "Guarded task panicked");
            PanicGuardResult::Panicked(panic_msg)
        }
    }
}
