use std::sync::Arc;

use kestrel_core::CancellationToken;

use crate::config::RefactorConfig;
use crate::error::RefactorError;
use crate::naming::{NamingPolicy, SuffixNaming};
use crate::semantic::AnalysisBackend;
use crate::snapshot::Snapshot;

/// Everything a refactoring request reads.
///
/// A context is immutable and can be shared between threads; each request
/// sees one snapshot from start to finish.
#[derive(Clone)]
pub struct RefactorContext {
    pub snapshot: Snapshot,
    pub backend: Arc<dyn AnalysisBackend>,
    pub config: RefactorConfig,
    pub naming: Arc<dyn NamingPolicy>,
    pub cancel: CancellationToken,
}

impl RefactorContext {
    pub fn new(snapshot: Snapshot, backend: Arc<dyn AnalysisBackend>) -> Self {
        let config = RefactorConfig::default();
        let naming = Arc::new(SuffixNaming {
            max_attempts: config.max_name_attempts,
        });
        Self {
            snapshot,
            backend,
            config,
            naming,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the configuration and reset naming to [`SuffixNaming`] with
    /// the configured attempt limit.
    #[must_use]
    pub fn with_config(mut self, config: RefactorConfig) -> Self {
        self.naming = Arc::new(SuffixNaming {
            max_attempts: config.max_name_attempts,
        });
        self.config = config;
        self
    }

    /// Use a custom naming policy. Call after [`RefactorContext::with_config`].
    #[must_use]
    pub fn with_naming(mut self, naming: Arc<dyn NamingPolicy>) -> Self {
        self.naming = naming;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn check_cancelled(&self) -> Result<(), RefactorError> {
        if self.cancel.is_cancelled() {
            tracing::debug!(target: "kestrel.refactor", "request cancelled");
            return Err(RefactorError::Cancelled);
        }
        Ok(())
    }
}

impl std::fmt::Debug for RefactorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefactorContext")
            .field("snapshot", &self.snapshot)
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
