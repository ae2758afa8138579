//! Context window accounting
//!
//! Computes how many tokens a request may consume before conversation
//! management must step in. The budget sits below the raw window size so the
//! response and the next user turn still fit.

use crate::Model;

/// Window size when a model does not declare one
const DEFAULT_CONTEXT_WINDOW: u64 = 128_000;

/// A model's raw context window and the usable budget below it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindowInfo {
    /// Raw window size in tokens
    pub context_window: u64,
    /// Tokens a request may use before history must shrink
    pub max_allowed: u64,
}

/// Compute the usable context budget for a model.
///
/// Common window sizes carry tuned buffers; anything else keeps at least 20%
/// of the window free.
pub fn context_window_info(model: &Model) -> ContextWindowInfo {
    let context_window = if model.context_window == 0 {
        DEFAULT_CONTEXT_WINDOW
    } else {
        model.context_window as u64
    };

    let max_allowed = match context_window {
        64_000 => context_window - 27_000,
        128_000 => context_window - 30_000,
        200_000 => context_window - 40_000,
        _ => context_window
            .saturating_sub(40_000)
            .max((context_window as f64 * 0.8) as u64),
    };

    ContextWindowInfo {
        context_window,
        max_allowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(window: u32) -> Model {
        Model::new("m", "Model", window, 8192)
    }

    #[test]
    fn test_known_window_buffers() {
        assert_eq!(context_window_info(&model(64_000)).max_allowed, 37_000);
        assert_eq!(context_window_info(&model(128_000)).max_allowed, 98_000);
        assert_eq!(context_window_info(&model(200_000)).max_allowed, 160_000);
    }

    #[test]
    fn test_undeclared_window_defaults() {
        let info = context_window_info(&model(0));
        assert_eq!(info.context_window, 128_000);
        assert_eq!(info.max_allowed, 98_000);
    }

    #[test]
    fn test_large_window_keeps_flat_buffer() {
        // 1M window: 1_000_000 - 40_000 beats 80%
        assert_eq!(context_window_info(&model(1_000_000)).max_allowed, 960_000);
    }

    #[test]
    fn test_small_window_keeps_fraction() {
        // 32k window: the flat buffer would leave almost nothing, 80% wins
        assert_eq!(context_window_info(&model(32_000)).max_allowed, 25_600);
    }
}
