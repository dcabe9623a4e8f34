use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Clinsight";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn default_log_filter() -> &'static str {
    "clinsight=info"
}

/// Get the application data directory (~/Clinsight/ on all platforms)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Directory where uploaded artifacts are spooled while a job runs
pub fn spool_dir() -> PathBuf {
    app_data_dir().join("spool")
}

/// Explicitly constructed inference endpoint configuration.
///
/// Passed into the pipeline rather than read from process-wide state, so
/// tests can substitute a fake endpoint or skip HTTP entirely.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl InferenceConfig {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.to_string(),
            model: model.to_string(),
            timeout_secs,
        }
    }

    /// Default local instance with a 5-minute timeout.
    pub fn default_local() -> Self {
        Self::new("http://localhost:11434", "medgemma:4b", 300)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with(APP_NAME));
    }

    #[test]
    fn spool_dir_under_app_data() {
        assert!(spool_dir().starts_with(app_data_dir()));
    }

    #[test]
    fn default_local_uses_standard_port() {
        let config = InferenceConfig::default_local();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert!(config.timeout_secs >= 60);
    }
}
