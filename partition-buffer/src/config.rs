use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

/// Settings for the [`crate::drain::BufferDrain`] consumer loop.
#[derive(Envconfig, Clone, Debug)]
pub struct DrainConfig {
    /// Wait after the first poll that finds nothing
    #[envconfig(default = "10")]
    pub idle_backoff: EnvMsDuration,

    /// Upper bound for the wait, which doubles on every consecutive empty poll
    #[envconfig(default = "500")]
    pub max_idle_backoff: EnvMsDuration,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            idle_backoff: EnvMsDuration(time::Duration::from_millis(10)),
            max_idle_backoff: EnvMsDuration(time::Duration::from_millis(500)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}
