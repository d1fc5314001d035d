//! Spreadsheet table store client.
//!
//! The candidate table lives in an external records API. Two callers use
//! it: the session controller flips a candidate's status after the agent
//! starts, and the sync job upserts the merged candidate set keyed by
//! email.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::info;

/// Status written once the interview agent is up.
pub const ASSESSMENT_COMPLETED: &str = "assessment completed";

/// Records-per-request limit imposed by the table API.
const UPSERT_PAGE_SIZE: usize = 10;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("table service returned {status}: {body}")]
    Service {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("no record found where {field} = {value}")]
    NotFound { field: String, value: String },
}

/// Narrow seam the session controller depends on.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    async fn mark_assessment_completed(&self, email: &str) -> Result<(), TableError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableRecord {
    pub id: String,
    pub fields: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    records: Vec<TableRecord>,
}

pub struct TableClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    base_id: String,
    table_id: String,
}

impl TableClient {
    pub fn new(
        api_key: impl Into<String>,
        base_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.airtable.com/v0".to_string(),
            api_key: api_key.into(),
            base_id: base_id.into(),
            table_id: table_id.into(),
        }
    }

    fn records_url(&self) -> String {
        format!("{}/{}/{}", self.base_url, self.base_id, self.table_id)
    }

    /// First record whose `field` exactly matches `value`.
    pub async fn find_first(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<TableRecord>, TableError> {
        let formula = exact_match_formula(field, value);
        let resp = self
            .http
            .get(self.records_url())
            .bearer_auth(&self.api_key)
            .query(&[("filterByFormula", formula.as_str()), ("maxRecords", "1")])
            .send()
            .await?;
        let resp = check(resp).await?;
        let page: RecordPage = resp.json().await?;
        Ok(page.records.into_iter().next())
    }

    /// Overwrite the given fields on one record, leaving others untouched.
    pub async fn update(
        &self,
        record_id: &str,
        fields: serde_json::Value,
    ) -> Result<(), TableError> {
        let url = format!("{}/{}", self.records_url(), record_id);
        let resp = self
            .http
            .patch(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Upsert rows keyed by `key_field`, in pages of ten. Matched records
    /// keep their unmatched remote fields; submitted fields overwrite.
    pub async fn batch_upsert<T: Serialize>(
        &self,
        rows: &[T],
        key_field: &str,
    ) -> Result<usize, TableError> {
        for chunk in rows.chunks(UPSERT_PAGE_SIZE) {
            let body = upsert_body(chunk, key_field);
            let resp = self
                .http
                .patch(self.records_url())
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;
            check(resp).await?;
        }
        info!(rows = rows.len(), key_field, "table upsert complete");
        Ok(rows.len())
    }
}

#[async_trait]
impl TrackingStore for TableClient {
    async fn mark_assessment_completed(&self, email: &str) -> Result<(), TableError> {
        let record = self
            .find_first("email", email)
            .await?
            .ok_or_else(|| TableError::NotFound {
                field: "email".to_string(),
                value: email.to_string(),
            })?;
        self.update(&record.id, json!({ "status": ASSESSMENT_COMPLETED }))
            .await?;
        info!(email, record_id = %record.id, status = ASSESSMENT_COMPLETED, "tracking status updated");
        Ok(())
    }
}

fn exact_match_formula(field: &str, value: &str) -> String {
    // Single quotes inside the value would terminate the formula literal.
    format!("{{{}}} = '{}'", field, value.replace('\'', "\\'"))
}

fn upsert_body<T: Serialize>(chunk: &[T], key_field: &str) -> serde_json::Value {
    json!({
        "performUpsert": { "fieldsToMergeOn": [key_field] },
        "records": chunk
            .iter()
            .map(|row| json!({ "fields": row }))
            .collect::<Vec<_>>(),
    })
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, TableError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TableError::Service { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_formula_quotes_the_value() {
        assert_eq!(
            exact_match_formula("email", "a@x.com"),
            "{email} = 'a@x.com'"
        );
        assert_eq!(
            exact_match_formula("name", "O'Brien"),
            "{name} = 'O\\'Brien'"
        );
    }

    #[test]
    fn upsert_body_merges_on_the_key_field() {
        #[derive(Serialize)]
        struct Row {
            email: &'static str,
            status: &'static str,
        }

        let body = upsert_body(
            &[
                Row {
                    email: "a@x.com",
                    status: "new",
                },
                Row {
                    email: "b@x.com",
                    status: "new",
                },
            ],
            "email",
        );

        assert_eq!(body["performUpsert"]["fieldsToMergeOn"], json!(["email"]));
        assert_eq!(body["records"].as_array().unwrap().len(), 2);
        assert_eq!(body["records"][0]["fields"]["email"], "a@x.com");
    }

    #[test]
    fn record_page_deserializes() {
        let page: RecordPage = serde_json::from_str(
            r#"{"records":[{"id":"rec123","fields":{"email":"a@x.com","status":"applied"}}]}"#,
        )
        .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].id, "rec123");
        assert_eq!(page.records[0].fields["email"], "a@x.com");
    }
}
