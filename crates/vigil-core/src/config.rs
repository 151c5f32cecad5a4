use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18920;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// A medium is online iff its last heartbeat is at most this old.
pub const PRESENCE_STALE_SECS: i64 = 60;

/// Top-level config (vigil.toml + VIGIL_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VigilConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ambient: AmbientConfig,
    #[serde(default)]
    pub exploration: ExplorationConfig,
    #[serde(default)]
    pub curiosity: CuriosityConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            graph: GraphConfig::default(),
            llm: LlmConfig::default(),
            ambient: AmbientConfig::default(),
            exploration: ExplorationConfig::default(),
            curiosity: CuriosityConfig::default(),
            summary: SummaryConfig::default(),
            queue: QueueConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// External knowledge-graph service. The core only speaks the narrow
/// adapter contract; this points it at the HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_url")]
    pub base_url: String,
    /// Tenant partition forwarded on every graph call.
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_graph_timeout")]
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_url(),
            group_id: default_group_id(),
            timeout_secs: default_graph_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Hard cap on a single model call.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            api_key: None,
            model: default_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Tunables for the ambient orchestrator loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbientConfig {
    /// The user this deployment serves (single-user by design).
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Base tick interval; ±30 % uniform jitter is applied per tick.
    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u64,
    #[serde(default = "default_startup_delay")]
    pub startup_delay_seconds: u64,
    /// The user counts as idle once the last interaction is at least this old.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_minutes: i64,
    /// Minimum gap between two proactive contacts.
    #[serde(default = "default_cooldown")]
    pub min_notification_interval_minutes: i64,
    /// Skip engagement when fingerprint similarity is at or above this.
    #[serde(default = "default_context_change_threshold")]
    pub context_change_threshold: f64,
    #[serde(default = "default_activity_lookback_hours")]
    pub activity_lookback_hours: i64,
    /// "daemon" routes through mediums only; anything else allows desktop fallback.
    #[serde(default = "default_notification_method")]
    pub notification_method: String,
    /// A session counts as active when its last activity is within this window.
    #[serde(default = "default_active_window")]
    pub active_session_window_minutes: i64,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            check_interval_minutes: default_check_interval(),
            startup_delay_seconds: default_startup_delay(),
            idle_threshold_minutes: default_idle_threshold(),
            min_notification_interval_minutes: default_cooldown(),
            context_change_threshold: default_context_change_threshold(),
            activity_lookback_hours: default_activity_lookback_hours(),
            notification_method: default_notification_method(),
            active_session_window_minutes: default_active_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_max_explorations")]
    pub max_per_day: i64,
    /// Force an exploration once this many hours have passed without one.
    #[serde(default = "default_max_hours_between")]
    pub max_hours_between_explorations: i64,
    /// The user must be idle at least this long before an exploration fires
    /// (unless forced by the cap above).
    #[serde(default = "default_explore_idle")]
    pub min_idle_minutes: i64,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_per_day: default_max_explorations(),
            max_hours_between_explorations: default_max_hours_between(),
            min_idle_minutes: default_explore_idle(),
        }
    }
}

/// Backlog bounds for the curiosity pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuriosityConfig {
    #[serde(default = "default_max_pending_per_user")]
    pub max_pending_per_user: i64,
    #[serde(default = "default_max_pending_per_type")]
    pub max_pending_per_type: i64,
}

impl Default for CuriosityConfig {
    fn default() -> Self {
        Self {
            max_pending_per_user: default_max_pending_per_user(),
            max_pending_per_type: default_max_pending_per_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_summary_interval")]
    pub pass_interval_minutes: u64,
    /// A session is summarizable once idle this long.
    #[serde(default = "default_idle_cutoff")]
    pub idle_cutoff_minutes: i64,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
    #[serde(default = "default_min_messages")]
    pub min_messages: i64,
    #[serde(default = "default_max_messages")]
    pub max_messages: i64,
    #[serde(default = "default_input_char_cap")]
    pub input_char_cap: usize,
    /// Default char limit for user-scoped core-memory blocks.
    #[serde(default = "default_char_limit")]
    pub char_limit: i64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            pass_interval_minutes: default_summary_interval(),
            idle_cutoff_minutes: default_idle_cutoff(),
            lookback_hours: default_lookback_hours(),
            min_messages: default_min_messages(),
            max_messages: default_max_messages(),
            input_char_cap: default_input_char_cap(),
            char_limit: default_char_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
    #[serde(default = "default_lease_timeout")]
    pub lease_timeout_minutes: i64,
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_retries: default_max_retries(),
            lease_timeout_minutes: default_lease_timeout(),
            reap_interval_secs: default_reap_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Cached context older than this is reported as not found.
    #[serde(default = "default_context_max_age")]
    pub max_age_minutes: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_age_minutes: default_context_max_age(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.vigil/vigil.db", home)
}
fn default_graph_url() -> String {
    "http://localhost:18930".to_string()
}
fn default_group_id() -> String {
    "default".to_string()
}
fn default_graph_timeout() -> u64 {
    15
}
fn default_llm_url() -> String {
    "http://localhost:11434/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout() -> u64 {
    30
}
fn default_user_id() -> String {
    "default".to_string()
}
fn default_check_interval() -> u64 {
    30
}
fn default_startup_delay() -> u64 {
    120
}
fn default_idle_threshold() -> i64 {
    15
}
fn default_cooldown() -> i64 {
    60
}
fn default_context_change_threshold() -> f64 {
    0.7
}
fn default_activity_lookback_hours() -> i64 {
    4
}
fn default_notification_method() -> String {
    "daemon".to_string()
}
fn default_active_window() -> i64 {
    10
}
fn default_max_explorations() -> i64 {
    6
}
fn default_max_hours_between() -> i64 {
    8
}
fn default_explore_idle() -> i64 {
    20
}
fn default_max_pending_per_user() -> i64 {
    100
}
fn default_max_pending_per_type() -> i64 {
    25
}
fn default_summary_interval() -> u64 {
    5
}
fn default_idle_cutoff() -> i64 {
    30
}
fn default_lookback_hours() -> i64 {
    24
}
fn default_min_messages() -> i64 {
    5
}
fn default_max_messages() -> i64 {
    50
}
fn default_input_char_cap() -> usize {
    2000
}
fn default_char_limit() -> i64 {
    8192
}
fn default_workers() -> usize {
    2
}
fn default_max_retries() -> i64 {
    3
}
fn default_lease_timeout() -> i64 {
    10
}
fn default_reap_interval() -> u64 {
    60
}
fn default_context_max_age() -> i64 {
    30
}

impl VigilConfig {
    /// Load config from a TOML file with VIGIL_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.vigil/vigil.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: VigilConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("VIGIL_").split("_"))
            .extract()
            .map_err(|e| crate::error::VigilError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.vigil/vigil.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_tunables() {
        let c = VigilConfig::default();
        assert_eq!(c.ambient.check_interval_minutes, 30);
        assert_eq!(c.ambient.idle_threshold_minutes, 15);
        assert_eq!(c.ambient.min_notification_interval_minutes, 60);
        assert!((c.ambient.context_change_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(c.curiosity.max_pending_per_user, 100);
        assert_eq!(c.curiosity.max_pending_per_type, 25);
        assert_eq!(c.summary.pass_interval_minutes, 5);
        assert_eq!(c.summary.idle_cutoff_minutes, 30);
        assert_eq!(c.summary.char_limit, 8192);
        assert_eq!(c.queue.max_retries, 3);
        assert_eq!(c.queue.lease_timeout_minutes, 10);
        assert_eq!(c.context.max_age_minutes, 30);
    }
}
