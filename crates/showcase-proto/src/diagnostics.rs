//! Log verbosity, decided once per page from the host environment.
//!
//! This only changes how much gets logged.  No code path branches on it.

use tracing::Level;

use crate::config::DiagnosticsConfig;
use crate::platform::HostEnv;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub verbose: bool,
    level: Level,
}

impl Diagnostics {
    pub fn for_host(env: &HostEnv, config: &DiagnosticsConfig) -> Self {
        let raw = if env.is_local {
            &config.verbose_level
        } else {
            &config.quiet_level
        };
        let fallback = if env.is_local { Level::DEBUG } else { Level::WARN };
        Self {
            verbose: env.is_local,
            level: parse_level(raw).unwrap_or(fallback),
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// `EnvFilter` directive for native subscribers: our crates at the chosen
    /// level, everything else at warn.
    pub fn filter_directive(&self) -> String {
        let lvl = self.level.to_string().to_ascii_lowercase();
        format!(
            "warn,showcase_proto={},showcase_sim={},showcase_web={}",
            lvl, lvl, lvl
        )
    }
}

fn parse_level(raw: &str) -> Option<Level> {
    raw.trim().parse::<Level>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_host_is_verbose() {
        let env = HostEnv::detect("localhost", &["localhost".to_string()]);
        let diag = Diagnostics::for_host(&env, &DiagnosticsConfig::default());
        assert!(diag.verbose);
        assert_eq!(diag.level(), Level::DEBUG);
        assert!(diag.filter_directive().contains("showcase_proto=debug"));
    }

    #[test]
    fn test_remote_host_is_quiet() {
        let env = HostEnv::remote("shop.example.com");
        let diag = Diagnostics::for_host(&env, &DiagnosticsConfig::default());
        assert!(!diag.verbose);
        assert_eq!(diag.level(), Level::WARN);
    }

    #[test]
    fn test_bad_level_falls_back() {
        let env = HostEnv::remote("shop.example.com");
        let config = DiagnosticsConfig {
            verbose_level: "debug".into(),
            quiet_level: "loud".into(),
        };
        assert_eq!(Diagnostics::for_host(&env, &config).level(), Level::WARN);
    }
}
