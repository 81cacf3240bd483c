//! Matching strategies for the grouping engine
//!
//! Each strategy answers one question: does this report belong to one of
//! the open incidents? Strategies share a single signature so they can be
//! tested and reordered independently; the engine runs them as an ordered
//! chain where the first match wins.

use async_trait::async_trait;
use std::sync::Arc;

use crate::clients::{AssistCandidate, AssistMatcher};
use crate::similarity::token_overlap;
use crate::types::{Incident, IncidentId, NewReport};

/// One pass of the matching cascade.
#[async_trait]
pub trait MatchStrategy: Send + Sync {
    /// Strategy name, for logging
    fn name(&self) -> &'static str;

    /// Return the open incident this report matches, or `None` to let the
    /// next strategy in the chain try. Must never fail the request: an
    /// internal error is a `None`.
    async fn match_report(&self, report: &NewReport, open: &[Incident]) -> Option<IncidentId>;
}

/// Step 1: exact category+subcategory match.
///
/// Both labels present and identical is the highest-confidence signal we
/// have; it joins immediately without comparing query text.
pub struct ExactLabelMatch;

#[async_trait]
impl MatchStrategy for ExactLabelMatch {
    fn name(&self) -> &'static str {
        "exact-label"
    }

    async fn match_report(&self, report: &NewReport, open: &[Incident]) -> Option<IncidentId> {
        let category = report.category.as_deref()?;
        let subcategory = report.subcategory.as_deref()?;

        open.iter()
            .find(|i| {
                i.category.as_deref() == Some(category)
                    && i.subcategory.as_deref() == Some(subcategory)
            })
            .map(|i| i.id.clone())
    }
}

/// Step 2: shared category plus query-text similarity.
///
/// The bar is lower than the global pass because the category already
/// narrows the candidate set.
pub struct CategoryTextMatch {
    pub threshold: f64,
}

#[async_trait]
impl MatchStrategy for CategoryTextMatch {
    fn name(&self) -> &'static str {
        "category-text"
    }

    async fn match_report(&self, report: &NewReport, open: &[Incident]) -> Option<IncidentId> {
        let category = report.category.as_deref()?;

        for incident in open {
            if incident.category.as_deref() != Some(category) {
                continue;
            }
            let score = token_overlap(&report.query, &incident.query);
            if score >= self.threshold {
                tracing::debug!(
                    id = %incident.id,
                    score,
                    threshold = self.threshold,
                    "Category text match"
                );
                return Some(incident.id.clone());
            }
        }
        None
    }
}

/// Step 3: ask the assist collaborator about the most recent open incidents.
///
/// Advisory only. An unreachable collaborator or an answer outside the
/// offered candidate set falls through silently; this pass is never allowed
/// to fail the request.
pub struct AssistMatch {
    pub matcher: Arc<dyn AssistMatcher>,
    /// How many most-recent open incidents to offer
    pub limit: usize,
}

#[async_trait]
impl MatchStrategy for AssistMatch {
    fn name(&self) -> &'static str {
        "assist"
    }

    async fn match_report(&self, report: &NewReport, open: &[Incident]) -> Option<IncidentId> {
        if open.is_empty() {
            return None;
        }

        // Open incidents are listed oldest first; offer the newest tail.
        let start = open.len().saturating_sub(self.limit);
        let candidates: Vec<AssistCandidate> = open[start..]
            .iter()
            .map(|i| AssistCandidate {
                id: i.id.clone(),
                query: i.query.clone(),
            })
            .collect();

        match self.matcher.match_incident(&report.query, &candidates).await {
            Ok(Some(id)) => {
                if candidates.iter().any(|c| c.id == id) {
                    Some(id)
                } else {
                    tracing::warn!(id = %id, "Assist returned an unrecognized id, ignoring");
                    None
                }
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Assist match unavailable, falling through");
                None
            }
        }
    }
}

/// Step 4: global fallback across all open incidents.
///
/// An exact query-string match joins immediately; otherwise token overlap
/// against every open incident, category notwithstanding.
pub struct GlobalTextMatch {
    pub threshold: f64,
}

#[async_trait]
impl MatchStrategy for GlobalTextMatch {
    fn name(&self) -> &'static str {
        "global-text"
    }

    async fn match_report(&self, report: &NewReport, open: &[Incident]) -> Option<IncidentId> {
        if let Some(exact) = open.iter().find(|i| i.query == report.query) {
            return Some(exact.id.clone());
        }

        for incident in open {
            let score = token_overlap(&report.query, &incident.query);
            if score >= self.threshold {
                tracing::debug!(
                    id = %incident.id,
                    score,
                    threshold = self.threshold,
                    "Global text match"
                );
                return Some(incident.id.clone());
            }
        }
        None
    }
}
