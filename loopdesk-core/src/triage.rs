//! Triage service
//!
//! The admin/user surface over the store. Submission runs the classifier
//! (when configured) and may answer directly instead of opening an
//! incident; everything that does open or join an incident goes through the
//! grouping engine. Resolution paths back-fill the knowledge base.

use std::sync::Arc;

use chrono::Utc;

use crate::clients::{Analysis, Classifier, Confidence};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::grouping::{GroupOutcome, GroupingEngine};
use crate::kb::KnowledgeBase;
use crate::types::{HistoryEntry, Incident, IncidentId, NewReport};

/// How a submission was handled.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The classifier was confident enough to answer without opening an
    /// incident; the caller should show the draft and offer to force-create.
    Suggested {
        draft: String,
        confidence: Confidence,
    },
    /// An incident was created (and possibly joined an existing group).
    Filed(GroupOutcome),
}

/// Selector for batch resolution.
#[derive(Debug, Clone)]
pub enum BatchFilter {
    Category(String),
    Ids(Vec<IncidentId>),
}

impl BatchFilter {
    fn matches(&self, incident: &Incident) -> bool {
        match self {
            BatchFilter::Category(c) => incident.category.as_deref() == Some(c.as_str()),
            BatchFilter::Ids(ids) => ids.contains(&incident.id),
        }
    }
}

pub struct TriageService {
    db: Arc<Database>,
    grouping: GroupingEngine,
    classifier: Option<Arc<dyn Classifier>>,
    kb: KnowledgeBase,
}

impl TriageService {
    pub fn new(
        db: Arc<Database>,
        grouping: GroupingEngine,
        classifier: Option<Arc<dyn Classifier>>,
    ) -> Self {
        let kb = KnowledgeBase::new(db.clone());
        Self {
            db,
            grouping,
            classifier,
            kb,
        }
    }

    pub fn list(&self) -> Result<Vec<Incident>> {
        self.db.list_incidents()
    }

    pub fn get(&self, id: &IncidentId) -> Result<Incident> {
        self.db
            .get_incident(id)?
            .ok_or_else(|| Error::IncidentNotFound(id.to_string()))
    }

    /// Handle an incoming report.
    ///
    /// With a confident, non-escalating analysis and `force` unset, the
    /// draft is returned instead of opening an incident. Every other path
    /// files the report through the grouping engine, enriched with whatever
    /// labels the classifier produced. Classifier failure never blocks
    /// filing.
    pub async fn submit(&self, report: NewReport, force: bool) -> Result<SubmitOutcome> {
        let analysis = match &self.classifier {
            Some(classifier) => match classifier.analyze(&report.query, &report.history).await {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!(error = %e, "Classifier unavailable, filing without analysis");
                    Analysis::unavailable()
                }
            },
            None => Analysis::unavailable(),
        };

        let confident = matches!(analysis.confidence, Confidence::High | Confidence::Medium);
        if !force && confident && !analysis.escalation_required && analysis.is_relevant {
            if let Some(draft) = analysis.draft.clone() {
                tracing::info!(confidence = ?analysis.confidence, "Intercepted with a suggested solution");
                return Ok(SubmitOutcome::Suggested {
                    draft,
                    confidence: analysis.confidence,
                });
            }
        }

        let mut enriched = report;
        enriched.title = enriched.title.or(analysis.title);
        enriched.category = enriched.category.or(analysis.category);
        enriched.subcategory = enriched.subcategory.or(analysis.subcategory);
        enriched.ai_draft = enriched.ai_draft.or(analysis.draft);

        let outcome = self.grouping.assign(&enriched).await?;
        Ok(SubmitOutcome::Filed(outcome))
    }

    /// Record a user reply on an existing incident, waking it if it was
    /// parked in `AwaitingInfo`.
    pub fn add_user_reply(&self, id: &IncidentId, message: &str) -> Result<()> {
        // Existence check first so a missing incident is a 404, not a no-op.
        let _ = self.get(id)?;
        let entry = HistoryEntry::user(message, Utc::now());
        self.db.append_history(id, &entry, true)?;
        Ok(())
    }

    /// Park an incident waiting on the user, recording the admin's question.
    pub fn ask_for_info(&self, id: &IncidentId, question: &str) -> Result<()> {
        self.db.set_awaiting_info(id, question)
    }

    /// Close an incident with a final answer.
    ///
    /// Returns `false` when the incident was already closed. On a real
    /// transition the answer is offered to the knowledge base; a rejected,
    /// duplicate, or unwritable entry is not an error.
    pub async fn resolve(&self, id: &IncidentId, final_answer: &str) -> Result<bool> {
        let incident = self.get(id)?;
        let transitioned = self.db.set_resolved(id, final_answer)?;
        if transitioned {
            // The resolution is already durable at this point; the KB
            // back-fill is best-effort and must not surface as a failure.
            if let Err(e) = self.kb.learn(
                &incident.query,
                final_answer,
                incident.category.as_deref(),
                incident.subcategory.as_deref(),
            ) {
                tracing::warn!(id = %id, error = %e, "Knowledge base back-fill failed");
            }
        }
        Ok(transitioned)
    }

    /// Resolve every `Pending` incident matched by the filter with one
    /// shared answer. Returns the ids that transitioned.
    ///
    /// The knowledge-base entry for the batch is tagged with the filter's
    /// category, or the first resolved incident's category when resolving
    /// by id.
    pub async fn resolve_batch(
        &self,
        filter: &BatchFilter,
        final_answer: &str,
    ) -> Result<Vec<IncidentId>> {
        let mut resolved = Vec::new();
        let mut representative: Option<String> = None;

        for incident in self.db.list_open()? {
            if !filter.matches(&incident) {
                continue;
            }
            if self.db.set_resolved(&incident.id, final_answer)? {
                if representative.is_none() {
                    representative = incident.category.clone();
                }
                resolved.push(incident.id);
            }
        }

        let category = match filter {
            BatchFilter::Category(c) => Some(c.as_str()),
            BatchFilter::Ids(_) => representative.as_deref(),
        };
        // Same as single resolution: the transitions above are committed,
        // so a KB write error is logged rather than returned.
        if let Err(e) = self.kb.learn_batch(final_answer, category, resolved.len()) {
            tracing::warn!(error = %e, "Knowledge base back-fill failed for batch");
        }

        tracing::info!(count = resolved.len(), "Batch resolution applied");
        Ok(resolved)
    }

    /// User closes their own incident after the draft solved it.
    pub fn self_resolve(&self, id: &IncidentId) -> Result<bool> {
        let _ = self.get(id)?;
        self.db.set_self_resolved(id)
    }

    /// Remove an incident entirely. Returns `false` when it did not exist.
    pub fn delete(&self, id: &IncidentId) -> Result<bool> {
        self.db.delete_incident(id)
    }
}
