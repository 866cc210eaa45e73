//! Client configuration

use crate::model::BLANK_LABEL;
use serde::{Deserialize, Serialize};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Scheme and host of the marking site
    pub base_url: String,
    /// Id of the page-level final submit control
    pub submit_control_id: String,
    /// Fields that identify a record rather than carry an answer
    pub identifying_fields: Vec<String>,
    /// Field whose value names the record in the autosave URL
    pub record_id_field: String,
    /// Name the anti-forgery token is posted under
    pub anti_forgery_field: String,
    /// Label of the leading blank option
    pub blank_label: String,
    /// Ignore a blur that moves focus onto the enabled submit control
    pub suppress_blur_onto_submit: bool,
    /// What a dependent select shows when a query has no results
    pub empty_results: EmptyResultsPolicy,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// Session cookie sent with every request
    pub cookie: Option<String>,
    /// Sent as `X-CSRFToken` when set
    pub csrf_header: Option<String>,
    /// Logging level
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            submit_control_id: "save_all_answers".into(),
            identifying_fields: vec!["question".into(), "authority".into()],
            record_id_field: "question".into(),
            anti_forgery_field: "csrfmiddlewaretoken".into(),
            blank_label: BLANK_LABEL.into(),
            suppress_blur_onto_submit: true,
            empty_results: EmptyResultsPolicy::Clear,
            request_timeout_secs: 30,
            cookie: None,
            csrf_header: None,
            log_level: "info".into(),
        }
    }
}

impl ClientConfig {
    /// Load from file
    pub fn load(path: &str) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save to file
    pub fn save(&self, path: &str) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &str) -> Result<Self, std::io::Error> {
        if std::path::Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Config file used when none is given
    pub fn default_path() -> String {
        "crowdsourcer-client.json".into()
    }

    /// Whether `logical` names a record rather than an answer
    pub fn is_identifying(&self, logical: &str) -> bool {
        self.identifying_fields.iter().any(|f| f == logical)
    }
}

/// Behavior of a dependent select when the server returns no options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyResultsPolicy {
    /// Reset the list to the blank option only
    #[default]
    Clear,
    /// Leave the previous options in place
    KeepExisting,
}
