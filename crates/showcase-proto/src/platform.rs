use std::path::PathBuf;

/// Hostnames treated as local development unless the config says otherwise.
pub const DEFAULT_LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Where the page is being served from.  Decided once at startup and handed
/// to whoever needs it (diagnostics, source resolver); nothing re-reads the
/// hostname afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnv {
    pub hostname: String,
    pub is_local: bool,
}

impl HostEnv {
    pub fn detect(hostname: &str, local_hosts: &[String]) -> Self {
        let hostname = hostname.trim().to_ascii_lowercase();
        let is_local = local_hosts
            .iter()
            .any(|h| h.trim().eq_ignore_ascii_case(&hostname));
        Self { hostname, is_local }
    }

    /// Production host, for drivers that have no page to ask.
    pub fn remote(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            is_local: false,
        }
    }
}

pub fn config_dir() -> PathBuf {
    // On Windows, check for portable config.toml in executable directory first
    #[cfg(windows)]
    {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                if exe_dir.join("config.toml").exists() {
                    return exe_dir.to_path_buf();
                }
            }
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("showcase")
    }

    // Everywhere else (wasm included, where the home dir is simply absent)
    // use ~/.config/showcase/
    #[cfg(not(windows))]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("showcase")
    }
}
