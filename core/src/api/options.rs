//! Configuration options for the Subtext engine.

/// Configuration options for analysis.
///
/// # Example
///
/// ```
/// use subtext_core::api::AnalysisOptions;
///
/// let options = AnalysisOptions { max_deferrals: 1_000 };
/// ```
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Maximum number of deferred analysis steps per version.
    ///
    /// Deferred work can queue more deferred work; this bounds it.
    ///
    /// Default: 10_000
    pub max_deferrals: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_deferrals: 10_000,
        }
    }
}

/// Configuration options for execution.
///
/// These options control resource limits during evaluation.
///
/// # Example
///
/// ```
/// use subtext_core::api::ExecutionOptions;
///
/// let options = ExecutionOptions {
///     max_depth: 200,
///     max_provenance_depth: 64,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Maximum nesting of item evaluations (for recursion protection).
    ///
    /// Every nested evaluation uses native stack, so keep this well within
    /// the stack of the thread running the engine.
    ///
    /// Default: 400
    pub max_depth: usize,

    /// Maximum length of copy chains followed by `is_copy_of` and type checks.
    ///
    /// Default: 256
    pub max_provenance_depth: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_depth: 400,
            max_provenance_depth: 256,
        }
    }
}

/// Configuration options for the Subtext engine.
///
/// # Example
///
/// ```
/// use subtext_core::api::{AnalysisOptions, EngineOptions, ExecutionOptions};
///
/// let options = EngineOptions {
///     analysis: AnalysisOptions::default(),
///     execution: ExecutionOptions {
///         max_depth: 100,
///         ..ExecutionOptions::default()
///     },
/// };
/// ```
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub analysis: AnalysisOptions,
    pub execution: ExecutionOptions,
}
