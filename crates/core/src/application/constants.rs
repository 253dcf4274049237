// Scheduling constants (no magic values)
use std::time::Duration;

/// Default interval between scheduled generation passes (1 minute)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Default budget for one generation pass; unreached definitions wait for the next tick
pub const DEFAULT_PASS_DEADLINE: Duration = Duration::from_secs(30);

/// Sleep after a failed pass before the loop resumes ticking (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);
