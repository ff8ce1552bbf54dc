use serde::Deserialize;
use tracing::{debug, info, warn};
use wealthsignal_common::normalize_name;

use super::extractor::ContactCandidate;
use super::policy::{is_stop_listed, is_vague};
use crate::prompts;
use crate::traits::{IntelligenceRequest, IntelligenceService, IntelligenceTask, SearchError, WebSearcher};

const SNIPPETS_PER_LOOKUP: usize = 5;

#[derive(Debug, Deserialize)]
struct Resolution {
    name: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    company: Option<String>,
}

/// Replace a vague name ("the founders of Acme") with a specific person when
/// search snippets support one. Anything short of a clear improvement hands
/// the candidate back unchanged.
pub async fn disambiguate(
    intelligence: &dyn IntelligenceService,
    searcher: &dyn WebSearcher,
    candidate: ContactCandidate,
) -> ContactCandidate {
    if !is_vague(&candidate.name) {
        return candidate;
    }

    let query = match candidate.company.as_deref() {
        Some(company) if !company.trim().is_empty() => format!("{} {}", candidate.name, company),
        _ => candidate.name.clone(),
    };
    let hits = match searcher.search(&query, SNIPPETS_PER_LOOKUP).await {
        Ok(hits) if !hits.is_empty() => hits,
        Ok(_) => return candidate,
        Err(SearchError::Unavailable) => {
            debug!(name = candidate.name.as_str(), "Search unavailable, keeping vague name");
            return candidate;
        }
        Err(e) => {
            warn!(name = candidate.name.as_str(), error = %e, "Disambiguation search failed");
            return candidate;
        }
    };

    let snippets = hits
        .iter()
        .map(|h| format!("- {}: {}", h.title, h.snippet))
        .collect::<Vec<_>>()
        .join("\n");
    let user = format!(
        "Description: {}\nRole: {}\nCompany: {}\n\nSearch snippets:\n{}",
        candidate.name,
        candidate.role.as_deref().unwrap_or("unknown"),
        candidate.company.as_deref().unwrap_or("unknown"),
        snippets
    );
    let request = IntelligenceRequest::new(
        IntelligenceTask::ContactDisambiguation,
        prompts::CONTACT_DISAMBIGUATION_SYSTEM,
        user,
    );

    let resolution = match intelligence.complete_json(&request).await {
        Ok(value) => match serde_json::from_value::<Resolution>(value) {
            Ok(r) => r,
            Err(e) => {
                warn!(name = candidate.name.as_str(), error = %e, "Disambiguation response malformed");
                return candidate;
            }
        },
        Err(e) => {
            warn!(name = candidate.name.as_str(), error = %e, "Disambiguation call failed");
            return candidate;
        }
    };

    apply_resolution(candidate, resolution)
}

fn apply_resolution(mut candidate: ContactCandidate, resolution: Resolution) -> ContactCandidate {
    let resolved = resolution.name.trim();
    let improved = !resolved.is_empty()
        && normalize_name(resolved) != normalize_name(&candidate.name)
        && !is_vague(resolved)
        && !is_stop_listed(resolved);
    if !improved {
        return candidate;
    }

    info!(from = candidate.name.as_str(), to = resolved, "Resolved vague contact");
    candidate.name = resolved.to_string();
    if let Some(role) = resolution.role.filter(|r| !r.trim().is_empty()) {
        candidate.role = Some(role);
    }
    if let Some(company) = resolution.company.filter(|c| !c.trim().is_empty()) {
        candidate.company = Some(company);
    }
    candidate
}
