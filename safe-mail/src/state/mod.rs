//! Application state management
//!
//! Owns the process-wide pieces every request shares: configuration, the
//! quota tracker, the mail connector and the content normalizer.

use std::sync::Arc;

use crate::{
    config::SafeMailConfig,
    content::ContentNormalizer,
    dispatch::BatchPolicy,
    email::{MailConnector, SmtpConnector},
    quota::QuotaTracker,
};

/// Shared state handed to every handler
///
/// # Example
///
/// ```rust
/// use safe_mail::{config::SafeMailConfig, state::AppState};
///
/// # fn example() -> anyhow::Result<()> {
/// let state = AppState::new(SafeMailConfig::default())?;
/// assert_eq!(state.quota().limit(), 28);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AppState {
    config: Arc<SafeMailConfig>,
    quota: QuotaTracker,
    connector: Arc<dyn MailConnector>,
    normalizer: Arc<ContentNormalizer>,
}

impl AppState {
    /// Create state that relays through the configured SMTP server
    ///
    /// # Errors
    ///
    /// Returns an error if a configured soften rule cannot be compiled
    pub fn new(config: SafeMailConfig) -> anyhow::Result<Self> {
        let connector = Arc::new(SmtpConnector::new(config.smtp.clone()));
        Self::with_connector(config, connector)
    }

    /// Create state with a custom mail connector
    ///
    /// # Errors
    ///
    /// Returns an error if a configured soften rule cannot be compiled
    pub fn with_connector(
        config: SafeMailConfig,
        connector: Arc<dyn MailConnector>,
    ) -> anyhow::Result<Self> {
        let normalizer = ContentNormalizer::from_settings(&config.content)?;
        let quota = QuotaTracker::new(&config.quota);

        Ok(Self {
            config: Arc::new(config),
            quota,
            connector,
            normalizer: Arc::new(normalizer),
        })
    }

    /// Configuration reference
    #[must_use]
    pub fn config(&self) -> &SafeMailConfig {
        &self.config
    }

    /// Quota tracker shared with the reset job
    #[must_use]
    pub const fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Factory for per-request mail senders
    #[must_use]
    pub fn connector(&self) -> &dyn MailConnector {
        self.connector.as_ref()
    }

    /// Subject/body normalizer
    #[must_use]
    pub fn normalizer(&self) -> &ContentNormalizer {
        &self.normalizer
    }

    /// Batch size and pacing from configuration
    #[must_use]
    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy::from(&self.config.dispatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SoftenRuleConfig;
    use crate::testing::StaticConnector;

    #[test]
    fn test_new_state() {
        let state = AppState::new(SafeMailConfig::default()).expect("Failed to create state");
        assert_eq!(state.quota().limit(), 28);
        assert_eq!(state.batch_policy().batch_size, 3);
        assert_eq!(state.normalizer().rules().len(), 2);
    }

    #[test]
    fn test_clone_shares_quota() {
        let state = AppState::with_connector(
            SafeMailConfig::default(),
            Arc::new(StaticConnector::default()),
        )
        .expect("Failed to create state");
        let cloned = state.clone();

        state.quota().commit("a@x.io", 3);
        assert_eq!(cloned.quota().count("a@x.io"), 3);
        assert!(Arc::ptr_eq(&state.config, &cloned.config));
    }

    #[test]
    fn test_custom_soften_rules() {
        let mut config = SafeMailConfig::default();
        config.content.soften = vec![SoftenRuleConfig {
            word: "invoice".to_string(),
            replacement: "the invoice details are attached below".to_string(),
        }];

        let state = AppState::new(config).expect("Failed to create state");
        assert_eq!(
            state.normalizer().body("invoice"),
            "the invoice details are attached below"
        );
    }
}
