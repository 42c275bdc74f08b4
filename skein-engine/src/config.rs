//! Engine-wide configuration (SPEC_FULL.md ambient stack). Grounded on the
//! teacher's pattern of a typed config struct read from process env vars
//! with explicit defaults, loaded after `skein_config::load_and_apply` has
//! applied `.env`/XDG values to the process environment.

/// Default tool timeout when a template does not override it (spec §5).
pub const DEFAULT_TOOL_TIMEOUT_SECONDS: i64 = 30;

/// Fixed provider limit on cache-control markers per submission (spec §3, §9:
/// "a provider limit, not a business rule" — not configurable).
pub const CACHE_CONTROL_LIMIT: usize = 4;

/// Fixed file-read size ceiling enforced by the file-access gate (spec §4.2).
pub const MAX_FILE_READ_BYTES: u64 = 1024 * 1024;

/// Engine-wide tunables, read once at process start.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub tool_timeout_seconds: i64,
    pub event_channel_capacity: usize,
    pub max_agent_steps_default: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tool_timeout_seconds: DEFAULT_TOOL_TIMEOUT_SECONDS,
            event_channel_capacity: 256,
            max_agent_steps_default: 50,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from the process environment, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tool_timeout_seconds: env_i64("SKEIN_TOOL_TIMEOUT_SECONDS", defaults.tool_timeout_seconds),
            event_channel_capacity: env_usize(
                "SKEIN_EVENT_CHANNEL_CAPACITY",
                defaults.event_channel_capacity,
            ),
            max_agent_steps_default: env_u32(
                "SKEIN_MAX_AGENT_STEPS_DEFAULT",
                defaults.max_agent_steps_default,
            ),
        }
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
