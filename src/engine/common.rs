// src/engine/common.rs
//
// Common utilities shared across engine modules.
// Provides the engine Result alias and the codec panic policy.

use crate::error::AdapterError;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Result type used throughout the engine.
pub type EngineResult<T> = std::result::Result<T, AdapterError>;

/// Run a codec call, turning a panic into `InternalPanic`.
///
/// Codec crates occasionally panic on malformed input. A conversion must
/// either complete or fail, so the panic stops here and is reported with
/// `stage` as context.
pub fn run_with_panic_policy<T, F>(stage: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(AdapterError::internal_panic(format!("{stage}: {detail}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_ok_and_err() {
        assert_eq!(run_with_panic_policy("ok", || Ok(3)).unwrap(), 3);
        let err = run_with_panic_policy::<(), _>("err", || Err(AdapterError::corrupted_image()))
            .unwrap_err();
        assert!(matches!(err, AdapterError::CorruptedImage));
    }

    #[test]
    fn converts_panic_to_internal_error() {
        let err = run_with_panic_policy::<(), _>("decode:test", || panic!("bad header"))
            .unwrap_err();
        match err {
            AdapterError::InternalPanic { message } => {
                assert!(message.contains("decode:test"));
                assert!(message.contains("bad header"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
