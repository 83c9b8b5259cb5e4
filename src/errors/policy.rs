/// Classification for pipeline behaviour on error.
///
/// Used to determine how the orchestrator should respond to errors raised
/// while running a layer.
///
/// # Behavior Summary
///
/// | Class | Continue to next layer? | Surfaced to caller? |
/// |-------|------------------------|---------------------|
/// | `SkipLayer` | Yes | No (logged only) |
/// | `Fatal` | No | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LayerPolicy {
    /// The layer contributed nothing, but the cascade continues.
    ///
    /// Used for provider-level failures: rate limiting, timeouts, HTTP
    /// errors, malformed payloads, and unsupported operations. The failure
    /// is logged and the next layer is attempted regardless; a still-empty
    /// accumulated set after all layers triggers the synthetic grid.
    SkipLayer,

    /// Abort the run and surface the error to the caller.
    ///
    /// Used for caller cancellation and for entities whose own coordinates
    /// are invalid, which makes even the synthetic-grid fallback impossible.
    Fatal,
}
