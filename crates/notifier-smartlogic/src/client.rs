//! Authenticated query client for the Smartlogic API.
//!
//! The client acquires a bearer token at construction and refreshes it once
//! whenever a request comes back 401. Five consecutive 401s trip a hard
//! failure; every later call errors without touching the network until the
//! process restarts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use url::{form_urlencoded, Url};

use async_trait::async_trait;
use notifier_core::{ConceptStore, Error, Result};

use crate::model::{ConceptGraph, Graph, TokenResponse};

/// Fixed credentials endpoint of the Smartlogic cloud.
pub const DEFAULT_CREDENTIALS_URL: &str = "https://cloud.smartlogic.com/token";

/// Default IRI prefix used when fetching a single concept.
pub const DEFAULT_CONCEPT_URI_PREFIX: &str = "http://www.ft.com/thing/";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const MANAGED_LOCATION_URI_PREFIX: &str = "http://www.ft.com/ontology/managedlocation/";

const MAX_ACCESS_FAILURE_COUNT: u32 = 5;

/// Timestamp layout understood by the changes-query filter.
const CHANGE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Configuration for the Smartlogic client.
#[derive(Debug, Clone)]
pub struct SmartlogicConfig {
    /// Base URL of the Smartlogic instance.
    pub base_url: String,
    /// Model to read from.
    pub model: String,
    /// API key exchanged for bearer tokens.
    pub api_key: String,
    /// IRI prefix for single-concept fetches.
    pub concept_uri_prefix: String,
    /// Token endpoint. Overridable so tests can point it at a fake.
    pub credentials_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Concept-hosting IRI prefixes recognized beyond the built-in two.
    pub extra_uri_prefixes: Vec<String>,
}

impl SmartlogicConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            concept_uri_prefix: DEFAULT_CONCEPT_URI_PREFIX.to_string(),
            credentials_url: DEFAULT_CREDENTIALS_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            extra_uri_prefixes: Vec::new(),
        }
    }

    pub fn with_concept_uri_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.concept_uri_prefix = prefix.into();
        self
    }

    pub fn with_credentials_url(mut self, url: impl Into<String>) -> Self {
        self.credentials_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Default)]
struct TokenState {
    access_token: String,
    access_failure_count: u32,
}

/// Token-bearing client to one Smartlogic model.
#[derive(Debug)]
pub struct SmartlogicClient {
    http: reqwest::Client,
    base_url: Url,
    config: SmartlogicConfig,
    token: Mutex<TokenState>,
}

impl SmartlogicClient {
    /// Create a client and acquire an initial token.
    ///
    /// Fails when the base URL does not parse or the credentials endpoint is
    /// unreachable or answers with malformed JSON.
    pub async fn new(config: SmartlogicConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid Smartlogic base URL: {}", e)))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        let client = Self {
            http,
            base_url,
            config,
            token: Mutex::new(TokenState::default()),
        };
        client.generate_token().await?;
        Ok(client)
    }

    /// Fetch a fresh bearer token and store it.
    ///
    /// Tokens have a limited life, so one is regenerated on every 401.
    async fn generate_token(&self) -> Result<()> {
        let resp = self
            .http
            .post(&self.config.credentials_url)
            .form(&[("grant_type", "apikey"), ("key", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!(op = "generate_token", error = %e, "Error making the token request");
                Error::Request(e.to_string())
            })?;

        let body = resp.bytes().await?;
        let token: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
            error!(op = "generate_token", error = %e, "Error decoding the token response body");
            Error::Serialization(e.to_string())
        })?;

        debug!("Setting Smartlogic access token");
        self.token.lock().await.access_token = token.access_token;
        Ok(())
    }

    /// Issue a bearer GET, refreshing the token once per 401.
    async fn make_request(&self, url: Url) -> Result<reqwest::Response> {
        loop {
            let token = {
                let state = self.token.lock().await;
                if state.access_failure_count >= MAX_ACCESS_FAILURE_COUNT {
                    error!(op = "make_request", "Failed to get a valid access token");
                    return Err(Error::TokenExhausted);
                }
                state.access_token.clone()
            };

            let resp = self
                .http
                .get(url.clone())
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| {
                    error!(op = "make_request", error = %e, "Error making the request");
                    Error::Request(e.to_string())
                })?;

            // A 401 means the token expired; generate a new one and retry.
            if resp.status() == StatusCode::UNAUTHORIZED {
                drop(resp);
                self.token.lock().await.access_failure_count += 1;
                if let Err(e) = self.generate_token().await {
                    // The retry will attempt another refresh.
                    info!("Failed to generate new Smartlogic token: {}", e);
                }
                continue;
            }

            self.token.lock().await.access_failure_count = 0;

            let status = resp.status();
            if !status.is_success() {
                return Err(Error::UpstreamStatus {
                    status: status.as_u16(),
                });
            }
            return Ok(resp);
        }
    }

    /*
       The concept IRI travels inside the `path` query parameter, so it is
       escaped twice: once to encode the IRI the way Smartlogic expects it and
       once more to survive the outer query encoding.
    */
    fn build_concept_path(&self, uuid: &str) -> String {
        let concept = format!("<{}{}>", self.config.concept_uri_prefix, uuid);
        let encoded_concept = query_escape(&query_escape(&concept));
        let encoded_properties = query_escape("<http://www.ft.com/ontology/shortLabel>");
        format!(
            "model:{}/{}&properties=%5B%5D,skosxl:prefLabel/skosxl:literalForm,skosxl:altLabel/skosxl:literalForm,{}/skosxl:literalForm",
            self.config.model, encoded_concept, encoded_properties
        )
    }

    fn changes_query_url(&self, since: DateTime<Utc>) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair(
                "path",
                &format!("tchmodel:{}/teamwork:Change/rdf:instance", self.config.model),
            )
            .append_pair("properties", "sem:about")
            .append_pair(
                "filters",
                &format!(
                    "subject(sem:committed>\"{}\"^^xsd:dateTime)",
                    since.format(CHANGE_TIME_FORMAT)
                ),
            );
        url
    }

    fn uuid_from_valid_uri(&self, uri: &str) -> Option<String> {
        if uri.contains("ConceptScheme") {
            return None;
        }
        uri.strip_prefix(DEFAULT_CONCEPT_URI_PREFIX)
            .or_else(|| uri.strip_prefix(MANAGED_LOCATION_URI_PREFIX))
            .or_else(|| {
                self.config
                    .extra_uri_prefixes
                    .iter()
                    .find_map(|p| uri.strip_prefix(p.as_str()))
            })
            .map(str::to_string)
    }
}

/// Form-encode a single query component (space becomes `+`).
fn query_escape(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[async_trait]
impl ConceptStore for SmartlogicClient {
    async fn get_concept(&self, uuid: &str) -> Result<Vec<u8>> {
        let mut url = self.base_url.clone();
        url.set_query(Some(&format!("path={}", self.build_concept_path(uuid))));

        debug!(op = "get_concept", "Smartlogic Request URL: {}", url);
        let resp = self.make_request(url).await.map_err(|e| {
            error!(op = "get_concept", error = %e, "Error making the request");
            e
        })?;

        let body = resp.bytes().await.map_err(|e| {
            error!(op = "get_concept", error = %e, "Error reading the response body");
            Error::Request(e.to_string())
        })?;

        // A well-formed answer with an empty @graph is the store's way of
        // saying the concept does not exist.
        if let Ok(ConceptGraph { graph: Some(graph) }) = serde_json::from_slice::<ConceptGraph>(&body) {
            if graph.is_empty() {
                return Err(Error::ConceptNotFound(uuid.to_string()));
            }
        }

        Ok(body.to_vec())
    }

    async fn get_changed_concept_list(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let url = self.changes_query_url(since);

        debug!(op = "get_changed_concept_list", "Smartlogic Change List Request URL: {}", url);
        let resp = self.make_request(url).await.map_err(|e| {
            error!(op = "get_changed_concept_list", error = %e, "Error making the request");
            e
        })?;

        let graph: Graph = resp.json().await.map_err(|e| {
            error!(op = "get_changed_concept_list", error = %e, "Error decoding the response body");
            Error::Serialization(e.to_string())
        })?;

        let mut seen = std::collections::HashSet::new();
        let mut output = Vec::new();
        for changeset in &graph.changesets {
            for concept in &changeset.concepts {
                if !seen.insert(concept.uri.as_str()) {
                    continue;
                }
                if let Some(uuid) = self.uuid_from_valid_uri(&concept.uri) {
                    output.push(uuid);
                }
            }
        }
        Ok(output)
    }

    async fn access_token(&self) -> String {
        self.token.lock().await.access_token.clone()
    }
}
