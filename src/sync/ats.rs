//! Applicant-tracking API client.
//!
//! Thin typed wrapper over the tracking vendor's REST API. Sign-in trades
//! tenant credentials for a bearer token that authorizes every later call.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const BASE_URL: &str = "https://api.breezy.hr/v3";

/// One page is enough in practice; positions rarely exceed this.
const CANDIDATE_PAGE_SIZE: u32 = 1000;

#[derive(Error, Debug)]
pub enum AtsError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tracking API returned {status}: {body}")]
    Service {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("not signed in")]
    NotSignedIn,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Company {
    #[serde(rename = "_id")]
    pub id: String,
    pub friendly_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Position {
    #[serde(rename = "_id")]
    pub id: String,
    pub friendly_id: String,
}

/// A candidate as returned by the list endpoint. Only the fields the sync
/// path maps are modeled; the wire payload carries many more.
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: String,
    pub email_address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    access_token: String,
}

pub struct AtsClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl Default for AtsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AtsClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: BASE_URL.to_string(),
            token: None,
        }
    }

    /// Exchange credentials for a bearer token kept on the client.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<(), AtsError> {
        let url = format!("{}/signin", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&SignInRequest { email, password })
            .send()
            .await?;
        let resp = check(resp).await?;
        let data: SignInResponse = resp.json().await?;
        self.token = Some(data.access_token);
        debug!(email, "signed in to tracking API");
        Ok(())
    }

    fn auth_headers(&self) -> Result<HeaderMap, AtsError> {
        let token = self.token.as_deref().ok_or(AtsError::NotSignedIn)?;
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(token).map_err(|_| AtsError::NotSignedIn)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, AtsError> {
        let resp = self
            .http
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await?;
        let resp = check(resp).await?;
        Ok(resp.json().await?)
    }

    pub async fn list_companies(&self) -> Result<Vec<Company>, AtsError> {
        self.get_json(format!("{}/companies", self.base_url)).await
    }

    /// Published positions only; drafts and archived positions are skipped.
    pub async fn list_positions(&self, company_id: &str) -> Result<Vec<Position>, AtsError> {
        self.get_json(format!(
            "{}/company/{}/positions?state=published",
            self.base_url, company_id
        ))
        .await
    }

    pub async fn list_candidates(
        &self,
        company_id: &str,
        position_id: &str,
    ) -> Result<Vec<Candidate>, AtsError> {
        self.get_json(format!(
            "{}/company/{}/position/{}/candidates?page_size={}&page=1&sort=created",
            self.base_url, company_id, position_id, CANDIDATE_PAGE_SIZE
        ))
        .await
    }

    /// Raw resume bytes for a candidate.
    pub async fn get_resume(
        &self,
        company_id: &str,
        position_id: &str,
        candidate_id: &str,
    ) -> Result<Vec<u8>, AtsError> {
        let url = format!(
            "{}/company/{}/position/{}/candidate/{}/resume",
            self.base_url, company_id, position_id, candidate_id
        );
        let resp = self
            .http
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await?;
        let resp = check(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, AtsError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(AtsError::Service { status, body })
}
