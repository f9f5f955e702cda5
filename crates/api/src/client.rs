use std::{env, time::Duration};

use async_trait::async_trait;
use nodemap_util::redact_sensitive;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{Client, Url, header};
use tracing::debug;

use crate::{AggregatedInstanceList, AggregatedListRequest, ApiError, Credential, InventoryClient};

/// Default public Compute Engine API root.
pub const DEFAULT_COMPUTE_API_BASE: &str = "https://compute.googleapis.com/compute/v1";
/// Environment variable overriding [`DEFAULT_COMPUTE_API_BASE`].
pub const COMPUTE_API_BASE_ENV: &str = "COMPUTE_API_BASE";

/// Hostnames or base domains allowed for non-local API bases. Subdomains of
/// these domains are also allowed.
const ALLOWED_GOOGLE_DOMAINS: &[&str] = &["googleapis.com"];
/// Hostnames allowed for local development regardless of scheme.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

/// Bytes escaped when a scope id is placed in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'/').add(b'?').add(b'`');

/// Longest error body kept in an [`ApiError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Thin wrapper around a configured `reqwest::Client` for Compute API access.
#[derive(Debug, Clone)]
pub struct ComputeClient {
    base_url: String,
    http: Client,
    user_agent: String,
}

impl ComputeClient {
    /// Build a client for `credential`, honoring `COMPUTE_API_BASE` when set.
    pub fn new(credential: &Credential) -> Result<Self, ApiError> {
        let base_url = env::var(COMPUTE_API_BASE_ENV).unwrap_or_else(|_| DEFAULT_COMPUTE_API_BASE.to_string());
        Self::with_base_url(credential, &base_url)
    }

    /// Build a client from the access token found in the environment.
    pub fn new_from_env() -> Result<Self, ApiError> {
        Self::new(&Credential::from_env()?)
    }

    pub fn with_base_url(credential: &Credential, base_url: &str) -> Result<Self, ApiError> {
        validate_base_url(base_url)?;

        let mut authorization =
            header::HeaderValue::from_str(&credential.authorization_value()).map_err(|_| ApiError::InvalidCredential)?;
        authorization.set_sensitive(true);

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::AUTHORIZATION, authorization);
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            user_agent: format!("nodemap/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn aggregated_instances_url(&self, project: &str) -> String {
        format!(
            "{}/projects/{}/aggregated/instances",
            self.base_url,
            utf8_percent_encode(project, PATH_SEGMENT)
        )
    }
}

#[async_trait]
impl InventoryClient for ComputeClient {
    async fn aggregated_instances(&self, request: &AggregatedListRequest) -> Result<AggregatedInstanceList, ApiError> {
        let url = self.aggregated_instances_url(&request.project);
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(filter) = request.filter.as_ref().filter(|filter| !filter.is_empty()) {
            query.push(("filter", filter.clone()));
        }
        if let Some(token) = request.page_token.as_ref() {
            query.push(("pageToken", token.clone()));
        }
        if let Some(max_results) = request.max_results {
            query.push(("maxResults", max_results.to_string()));
        }
        debug!(%url, has_page_token = request.page_token.is_some(), "requesting aggregated instances");

        let response = self
            .http
            .get(url)
            .header(header::USER_AGENT, &self.user_agent)
            .query(&query)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::status(status.as_u16(), summarize_error_body(&text)));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn summarize_error_body(body: &str) -> String {
    let redacted = redact_sensitive(body.trim());
    if redacted.chars().count() <= MAX_ERROR_BODY_CHARS {
        return redacted;
    }
    let truncated: String = redacted.chars().take(MAX_ERROR_BODY_CHARS.saturating_sub(3)).collect();
    format!("{}...", truncated.trim_end())
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost` or `127.0.0.1`: any scheme is allowed
/// - otherwise: scheme must be HTTPS, and host must be one of the allowed
///   Google API domains or a subdomain thereof
fn validate_base_url(base: &str) -> Result<(), ApiError> {
    let parsed_base_url = Url::parse(base).map_err(|error| ApiError::invalid_base_url(base, error.to_string()))?;

    let host_name = parsed_base_url
        .host_str()
        .ok_or_else(|| ApiError::invalid_base_url(base, "URL must include a host"))?;

    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return Ok(());
    }

    if parsed_base_url.scheme() != "https" {
        return Err(ApiError::invalid_base_url(
            base,
            format!("must use https for non-localhost hosts; got '{}://'", parsed_base_url.scheme()),
        ));
    }

    let is_allowed_domain = ALLOWED_GOOGLE_DOMAINS.iter().any(|&allowed_domain| {
        host_name.eq_ignore_ascii_case(allowed_domain) || host_name.ends_with(&format!(".{}", allowed_domain))
    });
    if !is_allowed_domain {
        return Err(ApiError::invalid_base_url(
            base,
            format!("host '{}' is not one of {:?} or a subdomain, or localhost", host_name, ALLOWED_GOOGLE_DOMAINS),
        ));
    }

    Ok(())
}
