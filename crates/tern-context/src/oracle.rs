//! Window oracle abstraction
//!
//! The orchestrator never inspects the API handler directly; it asks an
//! oracle how many tokens the previous request may have consumed before the
//! conversation must shrink. Answering may require I/O in the embedding
//! application, so the trait is async.

use async_trait::async_trait;

use tern_ai::{Model, context_window_info};

/// Reports the usable context budget of the active model
#[async_trait]
pub trait WindowOracle: Send + Sync {
    /// Maximum tokens the previous request may have used before history
    /// management must intervene
    async fn max_allowed_size(&self) -> u64;
}

/// Oracle backed by a fixed model definition
#[derive(Debug, Clone)]
pub struct ModelWindowOracle {
    model: Model,
}

impl ModelWindowOracle {
    /// Create an oracle for a model
    pub fn new(model: Model) -> Self {
        Self { model }
    }
}

#[async_trait]
impl WindowOracle for ModelWindowOracle {
    async fn max_allowed_size(&self) -> u64 {
        context_window_info(&self.model).max_allowed
    }
}
