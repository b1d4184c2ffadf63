use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WaypointError};
use crate::types::OnAgentFailure;

/// Top-level Waypoint configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scout: ScoutConfig,
    #[serde(default)]
    pub executor: Option<PathExecutorConfig>,
    #[serde(default)]
    pub fork_join: ForkJoinConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Scout pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutConfig {
    /// Beam width kept at each discovery depth.
    #[serde(default = "default_k_beam")]
    pub k_beam: usize,
    /// Longest path (in hops) the scout will propose.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Score gap between the top two candidates required to commit.
    #[serde(default = "default_commit_margin")]
    pub commit_margin: f64,
    /// Top score below which the scout aborts instead of deciding.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    /// Entries returned by a shortlist decision.
    #[serde(default = "default_shortlist_size")]
    pub shortlist_size: usize,
    /// Ask the candidate judge (LLM) to evaluate paths.
    #[serde(default)]
    pub llm_evaluation_enabled: bool,
    /// Use keyword heuristics when the judge fails.
    #[serde(default = "default_fallback_to_heuristics")]
    pub fallback_to_heuristics: bool,
    #[serde(default)]
    pub evaluation_model: Option<ModelConfig>,
    #[serde(default)]
    pub validation_model: Option<ModelConfig>,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub weights: ScoringWeights,
    /// Per-node prior scores (0.0 to 1.0). Unlisted nodes get 0.5.
    #[serde(default)]
    pub priors: HashMap<String, f64>,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            k_beam: default_k_beam(),
            max_depth: default_max_depth(),
            commit_margin: default_commit_margin(),
            min_score: default_min_score(),
            shortlist_size: default_shortlist_size(),
            llm_evaluation_enabled: false,
            fallback_to_heuristics: default_fallback_to_heuristics(),
            evaluation_model: None,
            validation_model: None,
            budget: BudgetConfig::default(),
            safety: SafetyConfig::default(),
            weights: ScoringWeights::default(),
            priors: HashMap::new(),
        }
    }
}

fn default_k_beam() -> usize { 3 }
fn default_max_depth() -> usize { 2 }
fn default_commit_margin() -> f64 { 0.15 }
fn default_min_score() -> f64 { 0.2 }
fn default_shortlist_size() -> usize { 3 }
fn default_fallback_to_heuristics() -> bool { true }

/// Model used by the candidate judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
}

fn default_provider() -> String { "ollama".to_string() }

/// Resource budget applied to every candidate path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Token budget per path (0 = unlimited).
    #[serde(default = "default_cost_budget_tokens")]
    pub cost_budget_tokens: u64,
    /// Latency budget per path in milliseconds (0 = unlimited).
    #[serde(default = "default_latency_budget_ms")]
    pub latency_budget_ms: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            cost_budget_tokens: default_cost_budget_tokens(),
            latency_budget_ms: default_latency_budget_ms(),
        }
    }
}

fn default_cost_budget_tokens() -> u64 { 800 }
fn default_latency_budget_ms() -> u64 { 1200 }

/// How strict the safety filter is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyProfile {
    Permissive,
    #[default]
    Default,
    Strict,
}

impl SafetyProfile {
    /// Minimum safety score a candidate needs under this profile.
    pub fn threshold(self) -> f64 {
        match self {
            Self::Permissive => 0.2,
            Self::Default => 0.5,
            Self::Strict => 0.8,
        }
    }
}

/// A labelled regex that lowers a node's safety score when it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskyPattern {
    pub pattern: String,
    pub label: String,
}

/// Safety filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default)]
    pub profile: SafetyProfile,
    /// Overrides the profile threshold.
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Capabilities that disqualify a path outright.
    #[serde(default)]
    pub forbidden_capabilities: Vec<String>,
    #[serde(default = "SafetyConfig::default_patterns")]
    pub risky_patterns: Vec<RiskyPattern>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            profile: SafetyProfile::Default,
            threshold: None,
            forbidden_capabilities: vec![],
            risky_patterns: Self::default_patterns(),
        }
    }
}

impl SafetyConfig {
    /// Built-in risky patterns.
    pub fn default_patterns() -> Vec<RiskyPattern> {
        vec![
            RiskyPattern {
                pattern: r"(?i)rm\s+-rf|drop\s+table|truncate\s+table|wipe\s+(disk|data)".to_string(),
                label: "destructive operation".to_string(),
            },
            RiskyPattern {
                pattern: r"(?i)\b(shell|subprocess|exec|eval)\b".to_string(),
                label: "arbitrary code execution".to_string(),
            },
            RiskyPattern {
                pattern: r"(?i)\b(passwords?|secrets?|api[_ ]?keys?|credentials?)\b".to_string(),
                label: "credential access".to_string(),
            },
            RiskyPattern {
                pattern: r"(?i)\b(payments?|transfer funds|purchase)\b".to_string(),
                label: "financial action".to_string(),
            },
        ]
    }

    /// Effective pass threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold.unwrap_or_else(|| self.profile.threshold())
    }
}

/// Weights of the scorer's built-in components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_weight_llm")]
    pub llm: f64,
    #[serde(default = "default_weight_heuristics")]
    pub heuristics: f64,
    #[serde(default = "default_weight_prior")]
    pub prior: f64,
    #[serde(default = "default_weight_cost")]
    pub cost: f64,
    #[serde(default = "default_weight_latency")]
    pub latency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            llm: default_weight_llm(),
            heuristics: default_weight_heuristics(),
            prior: default_weight_prior(),
            cost: default_weight_cost(),
            latency: default_weight_latency(),
        }
    }
}

fn default_weight_llm() -> f64 { 0.45 }
fn default_weight_heuristics() -> f64 { 0.20 }
fn default_weight_prior() -> f64 { 0.20 }
fn default_weight_cost() -> f64 { 0.10 }
fn default_weight_latency() -> f64 { 0.05 }

/// Path executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathExecutorConfig {
    /// Dotted path into `previous_outputs` holding the committed path.
    pub path_source: String,
    #[serde(default)]
    pub on_agent_failure: OnAgentFailure,
}

/// Fork/join group store selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ForkJoinConfig {
    /// Single-process map.
    #[default]
    Memory,
    /// SQLite database file shared by every process of a deployment.
    Sqlite { path: String },
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String { "waypoint=info,warn".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| WaypointError::ConfigNotFound(path.display().to_string()))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Parse config from TOML text, with env var expansion.
    pub fn from_toml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| WaypointError::Config(e.to_string()))
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}
