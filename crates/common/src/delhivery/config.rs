use std::time::Duration;

pub const DELHIVERY_PRODUCTION_URL: &str = "https://track.delhivery.com";
pub const DELHIVERY_STAGING_URL: &str = "https://staging-express.delhivery.com";

/// Connection settings for the Delhivery REST API
#[derive(Clone, Debug)]
pub struct DelhiveryConfig {
    pub base_url: String,
    pub api_token: String,
    pub client_name: String,
    pub timeout: Duration,
}

impl DelhiveryConfig {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            ..Default::default()
        }
    }

    /// Build an absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl Default for DelhiveryConfig {
    fn default() -> Self {
        Self {
            base_url: DELHIVERY_STAGING_URL.to_string(),
            api_token: String::new(),
            client_name: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}
