// Engine constants (no magic values)
use std::time::Duration;

/// Placeholder substituted with each enumerated device
pub const DEVICE_PLACEHOLDER: &str = "{device}";

/// Characters of output quoted in a truncated-output failure reason
pub const OUTPUT_EXCERPT_CHARS: usize = 80;

/// Default LongProbe poll interval between checker rounds (1s)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Grace period between SIGTERM and SIGKILL when killing a stressor (5 seconds)
pub const GRACEFUL_KILL_TIMEOUT_MS: i64 = 5000;

/// Liveness check interval while waiting for a terminated process (100ms)
pub const KILL_CHECK_INTERVAL: Duration = Duration::from_millis(100);
