//! Configuration

use lazy_observe::MonitorConfig;
use serde::{Deserialize, Serialize};
use url::Url;

/// Page-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document base URL; image sources resolve against it
    pub base_url: String,

    /// Default root margin for new elements
    pub margin: String,

    /// Default visibility threshold (fraction, 0.0 to 1.0)
    pub threshold: f64,

    /// User agent for image requests
    pub user_agent: String,

    /// Fetch images over HTTP; when false loads are only logged
    pub fetch_images: bool,
}

impl Default for Config {
    fn default() -> Self {
        let monitor = MonitorConfig::default();
        Self {
            base_url: "http://localhost/".to_string(),
            margin: monitor.margin,
            threshold: monitor.threshold,
            user_agent: format!("lazy-img/{}", crate::VERSION),
            fetch_images: false,
        }
    }
}

impl Config {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)
    }

    /// Default monitor settings for elements on this page
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::new(self.margin.clone(), self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.margin, "0px 0px 0px 0px");
        assert_eq!(config.threshold, 0.0);
        assert!(!config.fetch_images);
        assert!(config.base_url().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = Config::from_json(r#"{ "margin": "200px 0px", "fetch_images": true }"#).unwrap();
        assert_eq!(config.margin, "200px 0px");
        assert!(config.fetch_images);
        assert_eq!(config.monitor_config(), MonitorConfig::new("200px 0px", 0.0));
    }

    #[test]
    fn test_bad_json() {
        assert!(Config::from_json(r#"{ "threshold": "half" }"#).is_err());
    }
}
