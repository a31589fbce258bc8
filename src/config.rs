use anyhow::{Context, Result, ensure};
use planner::{PlanOptions, PropagationCheck, ResolveOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Upper bound on resolver worker threads
const MAX_JOBS: usize = 256;

// ============================================================================
// Planner Config
// ============================================================================

/// Planner settings, usually read from `stackplan.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Reference scan settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Lifecycle policy checks
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Scan entities on a rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Minimum entity count before the scan goes parallel
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Worker threads (0 = rayon default)
    #[serde(default)]
    pub jobs: usize,
}

fn default_parallel() -> bool {
    true
}

fn default_parallel_threshold() -> usize {
    64
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            parallel_threshold: default_parallel_threshold(),
            jobs: 0,
        }
    }
}

impl ResolverConfig {
    pub fn to_options(&self) -> ResolveOptions {
        ResolveOptions {
            parallel: self.parallel,
            parallel_threshold: self.parallel_threshold,
            jobs: self.jobs,
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.parallel_threshold > 0,
            "parallel_threshold must be at least 1 (set parallel = false to disable the parallel scan)"
        );
        ensure!(
            self.jobs <= MAX_JOBS,
            "jobs must be at most {MAX_JOBS}, got {}",
            self.jobs
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// `transitive` follows data sources, `direct` checks direct references only
    #[serde(default)]
    pub propagation: PropagationCheck,
}

impl PlannerConfig {
    /// Load config from `path`, or return the default if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!(
                "Planner config {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read planner config: {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid planner config: {}", path.display()))?;

        log::debug!("Loaded planner config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize planner config")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.resolver
            .validate()
            .context("Invalid [resolver] section")
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            propagation: self.lifecycle.propagation,
        }
    }
}
