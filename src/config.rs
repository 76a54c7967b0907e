//! Runtime configuration for cluster-explorer.
//!
//! Configuration is loaded from a JSON file or constructed programmatically.
//! Every section has defaults, so a partial file only overrides what it names.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cluster-explorer",
    about = "Member arrangement and classification server for clustered collections"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    /// Populate the in-memory tree with a small demonstration project.
    #[arg(long)]
    pub seed_demo: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Paginated result cache.
    pub cache: CacheConfig,

    /// Arrangement engine tuning.
    pub arrange: ArrangeConfig,

    /// Nearest-centroid classification.
    pub classify: ClassifyConfig,

    /// Recommendation queries.
    pub recommend: RecommendConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Page cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Members per page for membership queries.
    pub page_size: usize,

    /// Members per page for recommendation queries.
    pub recommendation_page_size: usize,

    /// Compress each cached page with zstd.
    pub compress: bool,

    /// zstd compression level (1-22).
    pub zstd_level: i32,

    /// Byte budget of the in-memory list store.
    pub memory_budget: usize,

    /// Start evicting keys when usage exceeds this fraction of the budget.
    pub high_watermark: f64,

    /// Stop evicting once usage drops below this fraction.
    pub low_watermark: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            recommendation_page_size: 20,
            compress: true,
            zstd_level: 3,
            memory_budget: 256 * 1024 * 1024, // 256 MiB
            high_watermark: 0.90,
            low_watermark: 0.70,
        }
    }
}

/// Similarity embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrangeConfig {
    /// Neighborhood size of the kNN graph.
    pub n_neighbors: usize,

    /// Fit the embedding on at most this many samples.
    pub fit_subsample: usize,

    /// Seed for subsampling. Unset means a fresh seed per call.
    pub seed: Option<u64>,

    /// Power iteration cap for the leading eigenpair.
    pub max_iterations: usize,

    /// Convergence tolerance of the power iteration.
    pub tolerance: f64,
}

impl Default for ArrangeConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            fit_subsample: 1000,
            seed: None,
            max_iterations: 1000,
            tolerance: 1e-9,
        }
    }
}

/// Rejection rule for safe classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Reject when `(d2 - d1) / d2` falls below this margin.
    pub safe_margin: f32,

    /// Reject when the nearest anchor is farther than this.
    pub safe_max_distance: Option<f32>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            safe_margin: 0.2,
            safe_max_distance: None,
        }
    }
}

/// Recommendation query limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    /// `max_n` used when the request omits it.
    pub default_max_n: usize,

    /// Upper clamp for `max_n`.
    pub max_n_limit: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            default_max_n: 100,
            max_n_limit: 1000,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Byte level above which the in-memory store starts evicting.
    pub fn cache_high_bytes(&self) -> usize {
        (self.cache.memory_budget as f64 * self.cache.high_watermark) as usize
    }

    /// Byte level the in-memory store evicts down to.
    pub fn cache_low_bytes(&self) -> usize {
        (self.cache.memory_budget as f64 * self.cache.low_watermark) as usize
    }
}
