//! External recommendation engine client
//!
//! The engine is addressed by an operator-supplied URL template. Placeholders
//! are replaced literally (no URL encoding) and the response is expected to be
//! a JSON array of candidate descriptors.

use reqwest::{redirect, Client as HttpClient, Proxy};

use crate::{
    error::{AppError, AppResult},
    models::{AccountRef, CandidateDescriptor, ExternalEngine},
};

const MAX_REDIRECTS: usize = 10;

/// Values for the four template placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct UrlSubstitutions<'a> {
    pub host: &'a str,
    pub user: &'a str,
    pub limit: u32,
    pub offset: u32,
}

impl UrlSubstitutions<'_> {
    fn value_for(&self, placeholder: &str) -> Option<String> {
        match placeholder {
            "host" => Some(self.host.to_string()),
            "user" => Some(self.user.to_string()),
            "limit" => Some(self.limit.to_string()),
            "offset" => Some(self.offset.to_string()),
            _ => None,
        }
    }
}

/// Fills `{{host}}`, `{{user}}`, `{{limit}}` and `{{offset}}` in `template`.
///
/// Single left-to-right pass: substituted values are never rescanned, so the
/// result does not depend on placeholder order. Every occurrence is replaced;
/// unknown `{{...}}` sequences are copied through untouched.
pub fn build_url(template: &str, substitutions: &UrlSubstitutions<'_>) -> String {
    let mut url = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        url.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        match after_open.find("}}") {
            Some(end) => match substitutions.value_for(&after_open[..end]) {
                Some(value) => {
                    url.push_str(&value);
                    rest = &after_open[end + 2..];
                }
                None => {
                    url.push_str("{{");
                    rest = after_open;
                }
            },
            None => {
                url.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    url.push_str(rest);
    url
}

/// HTTP client for the external engine, shared process-wide
#[derive(Clone)]
pub struct DelegateClient {
    http_client: HttpClient,
}

impl DelegateClient {
    /// Builds the client, routing through `proxy` when one is configured
    pub fn new(proxy: Option<&str>) -> AppResult<Self> {
        let mut builder = HttpClient::builder().redirect(redirect::Policy::limited(MAX_REDIRECTS));

        if let Some(proxy) = proxy {
            let proxy = Proxy::all(proxy)
                .map_err(|e| AppError::Internal(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let http_client = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    /// Asks the engine for candidates on behalf of `requester`.
    ///
    /// Timeouts, connection failures, non-2xx statuses and undecodable bodies all
    /// fail with `DelegateUnavailable`. There is no retry.
    pub async fn fetch(
        &self,
        engine: &ExternalEngine,
        requester: &AccountRef,
        limit: u32,
        offset: u32,
    ) -> AppResult<Vec<CandidateDescriptor>> {
        let url = build_url(
            &engine.url_template,
            &UrlSubstitutions {
                host: &engine.local_hostname,
                user: &requester.username,
                limit,
                offset,
            },
        );

        let mut request = self.http_client.get(&url);
        if let Some(timeout) = engine.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(
                url = %url,
                error = %e,
                timed_out = e.is_timeout(),
                "Recommendation engine request failed"
            );
            AppError::DelegateUnavailable(format!("request to engine failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                url = %url,
                status = %status,
                "Recommendation engine returned an error status"
            );
            return Err(AppError::DelegateUnavailable(format!(
                "engine returned status {}: {}",
                status, body
            )));
        }

        let descriptors: Vec<CandidateDescriptor> = response.json().await.map_err(|e| {
            tracing::error!(
                url = %url,
                error = %e,
                "Failed to decode recommendation engine response"
            );
            AppError::DelegateUnavailable(format!("malformed engine response: {}", e))
        })?;

        tracing::info!(
            requester = %requester.id,
            candidates = descriptors.len(),
            "Recommendation engine responded"
        );

        Ok(descriptors)
    }
}
