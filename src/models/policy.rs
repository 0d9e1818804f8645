use std::time::Duration;

use super::AccountRef;

/// Instance-wide recommendation settings, loaded once per request
#[derive(Debug, Clone, PartialEq)]
pub struct InstancePolicy {
    pub external_recommendation_enabled: bool,
    /// URL template with `{{host}}`, `{{user}}`, `{{limit}}` and `{{offset}}` placeholders
    pub engine_url_template: String,
    /// `None` leaves engine requests without a per-request timeout
    pub request_timeout: Option<Duration>,
    pub local_hostname: String,
}

/// Settings needed to call the external engine
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEngine {
    pub url_template: String,
    pub timeout: Option<Duration>,
    pub local_hostname: String,
}

/// How a single request gets its recommendations
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy<'a> {
    /// Rank the local population
    Internal,
    /// Ask the external engine on behalf of `requester`
    External {
        engine: ExternalEngine,
        requester: &'a AccountRef,
    },
}

impl<'a> Strategy<'a> {
    /// The external engine is only used for signed-in requesters, and only when
    /// the instance has it enabled with a usable template.
    pub fn select(policy: &InstancePolicy, requester: Option<&'a AccountRef>) -> Self {
        match requester {
            Some(requester)
                if policy.external_recommendation_enabled
                    && !policy.engine_url_template.trim().is_empty() =>
            {
                Strategy::External {
                    engine: ExternalEngine {
                        url_template: policy.engine_url_template.clone(),
                        timeout: policy.request_timeout,
                        local_hostname: policy.local_hostname.clone(),
                    },
                    requester,
                }
            }
            _ => Strategy::Internal,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Internal => "internal",
            Strategy::External { .. } => "external",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountId;

    fn policy(enabled: bool, template: &str) -> InstancePolicy {
        InstancePolicy {
            external_recommendation_enabled: enabled,
            engine_url_template: template.to_string(),
            request_timeout: Some(Duration::from_millis(300)),
            local_hostname: "example.social".to_string(),
        }
    }

    fn alice() -> AccountRef {
        AccountRef {
            id: AccountId::new("a1"),
            username: "alice".to_string(),
        }
    }

    #[test]
    fn test_external_requires_flag_and_requester() {
        let requester = alice();
        let enabled = policy(true, "https://eng/{{user}}");

        match Strategy::select(&enabled, Some(&requester)) {
            Strategy::External { engine, requester } => {
                assert_eq!(engine.url_template, "https://eng/{{user}}");
                assert_eq!(engine.timeout, Some(Duration::from_millis(300)));
                assert_eq!(engine.local_hostname, "example.social");
                assert_eq!(requester.username, "alice");
            }
            other => panic!("expected external strategy, got {:?}", other),
        }

        assert_eq!(Strategy::select(&enabled, None), Strategy::Internal);
        assert_eq!(
            Strategy::select(&policy(false, "https://eng/{{user}}"), Some(&requester)),
            Strategy::Internal
        );
    }

    #[test]
    fn test_blank_template_falls_back_to_internal() {
        let requester = alice();
        assert_eq!(
            Strategy::select(&policy(true, "  "), Some(&requester)).name(),
            "internal"
        );
    }
}
