//! One-way candidate sync.
//!
//! Pulls candidate lists from two applicant-tracking tenants, merges them
//! by email, and upserts the result into the shared candidate table. Fetches
//! fan out concurrently within a tenant; the two tenants run sequentially.

pub mod ats;

use anyhow::{Context, Result};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::settings::{Settings, TenantCredentials};
use crate::table::TableClient;
use ats::{AtsClient, AtsError, Candidate};

/// Which tenant a merged row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Primary,
    Secondary,
    Both,
}

/// One row of the candidate table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateRow {
    pub name: Option<String>,
    pub email: String,
    pub headline: Option<String>,
    pub phone: Option<String>,
    pub source: CandidateSource,
}

impl CandidateRow {
    fn from_candidate(candidate: Candidate, source: CandidateSource) -> Self {
        Self {
            name: candidate.name,
            email: candidate.email_address,
            headline: candidate.headline,
            phone: candidate.phone_number,
            source,
        }
    }
}

/// Every candidate across every published position of one tenant.
pub async fn fetch_tenant_candidates(
    creds: &TenantCredentials,
) -> Result<Vec<Candidate>, AtsError> {
    let mut client = AtsClient::new();
    client.sign_in(&creds.email, &creds.password).await?;

    let companies = client.list_companies().await?;

    let client = &client;
    let position_fetches = companies
        .iter()
        .map(|company| async move {
            let positions = client.list_positions(&company.id).await?;
            Ok::<_, AtsError>((company.id.clone(), positions))
        })
        .collect::<Vec<_>>();
    let positions = try_join_all(position_fetches).await?;

    let candidate_fetches = positions
        .iter()
        .flat_map(|(company_id, positions)| {
            positions
                .iter()
                .map(move |position| client.list_candidates(company_id, &position.id))
        })
        .collect::<Vec<_>>();
    let candidates = try_join_all(candidate_fetches).await?;

    Ok(candidates.into_iter().flatten().collect())
}

/// Merge the two tenant lists into one row per unique email.
///
/// An email seen in both lists keeps the first occurrence's fields and has
/// its source upgraded to `both`; field contents are never merged. Rows come
/// back sorted by email so the upsert order is stable.
pub fn merge_candidates(primary: Vec<Candidate>, secondary: Vec<Candidate>) -> Vec<CandidateRow> {
    let mut merged: HashMap<String, CandidateRow> = HashMap::new();

    for candidate in primary {
        merged.insert(
            candidate.email_address.clone(),
            CandidateRow::from_candidate(candidate, CandidateSource::Primary),
        );
    }
    for candidate in secondary {
        match merged.entry(candidate.email_address.clone()) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                entry.get_mut().source = CandidateSource::Both;
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(CandidateRow::from_candidate(
                    candidate,
                    CandidateSource::Secondary,
                ));
            }
        }
    }

    let mut rows: Vec<CandidateRow> = merged.into_values().collect();
    rows.sort_by(|a, b| a.email.cmp(&b.email));
    rows
}

#[derive(Debug, Clone, Copy)]
pub struct SyncReport {
    pub primary: usize,
    pub secondary: usize,
    pub merged: usize,
}

/// Run the full sync: fetch both tenants, merge, upsert.
pub async fn run_sync(settings: &Settings) -> Result<SyncReport> {
    let primary = fetch_tenant_candidates(&settings.tenants.primary)
        .await
        .context("primary tenant fetch failed")?;
    let secondary = fetch_tenant_candidates(&settings.tenants.secondary)
        .await
        .context("secondary tenant fetch failed")?;

    let primary_count = primary.len();
    let secondary_count = secondary.len();
    let rows = merge_candidates(primary, secondary);
    let report = SyncReport {
        primary: primary_count,
        secondary: secondary_count,
        merged: rows.len(),
    };
    info!(
        primary = report.primary,
        secondary = report.secondary,
        merged = report.merged,
        "merged candidate lists"
    );

    let table = TableClient::new(
        &settings.table.api_key,
        &settings.table.base_id,
        &settings.table.table_id,
    );
    table
        .batch_upsert(&rows, "email")
        .await
        .context("candidate upsert failed")?;

    Ok(report)
}
