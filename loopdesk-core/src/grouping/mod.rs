//! Incident grouping engine
//!
//! Decides whether an incoming report describes an issue already being
//! worked on. An ordered chain of [`MatchStrategy`] passes runs against the
//! currently open incidents; the first pass to produce a match wins and no
//! later pass runs. A matched report still gets its own incident record
//! (its own reporter, thread reference, and history) but shares the match's
//! `group_id`, and its text is appended to every existing member of that
//! group so the whole cluster wakes up.

mod strategy;

pub use strategy::{
    AssistMatch, CategoryTextMatch, ExactLabelMatch, GlobalTextMatch, MatchStrategy,
};

use chrono::Utc;
use std::sync::Arc;

use crate::clients::AssistMatcher;
use crate::config::GroupingConfig;
use crate::db::Database;
use crate::error::Result;
use crate::types::{HistoryEntry, Incident, IncidentId, NewReport};

/// How a report was placed.
#[derive(Debug, Clone)]
pub enum GroupOutcome {
    /// The report opened a new group of its own.
    Created(Incident),
    /// The report joined an existing group.
    Joined {
        incident: Incident,
        group_id: IncidentId,
    },
}

impl GroupOutcome {
    pub fn incident(&self) -> &Incident {
        match self {
            GroupOutcome::Created(i) => i,
            GroupOutcome::Joined { incident, .. } => incident,
        }
    }
}

pub struct GroupingEngine {
    db: Arc<Database>,
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl GroupingEngine {
    /// Build the standard four-step cascade.
    ///
    /// The assist step is only present when an assist matcher is configured;
    /// the chain degrades to the three deterministic passes otherwise.
    pub fn new(
        db: Arc<Database>,
        config: &GroupingConfig,
        assist: Option<Arc<dyn AssistMatcher>>,
    ) -> Self {
        let mut strategies: Vec<Box<dyn MatchStrategy>> = vec![
            Box::new(ExactLabelMatch),
            Box::new(CategoryTextMatch {
                threshold: config.category_threshold,
            }),
        ];
        if let Some(matcher) = assist {
            strategies.push(Box::new(AssistMatch {
                matcher,
                limit: config.assist_candidates,
            }));
        }
        strategies.push(Box::new(GlobalTextMatch {
            threshold: config.global_threshold,
        }));

        Self { db, strategies }
    }

    /// Replace the cascade, for tests and non-standard deployments.
    pub fn with_strategies(db: Arc<Database>, strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { db, strategies }
    }

    /// Place a report: join an existing open group or open a new one.
    ///
    /// Only `Pending` incidents are candidates. On a join, the new record is
    /// created first and the group-wide history append runs after it, so a
    /// crash in between leaves a correctly-grouped record behind; the append
    /// itself is idempotent and safe to replay.
    pub async fn assign(&self, report: &NewReport) -> Result<GroupOutcome> {
        let open = self.db.list_open()?;

        let mut matched: Option<IncidentId> = None;
        for strategy in &self.strategies {
            if let Some(id) = strategy.match_report(report, &open).await {
                tracing::info!(strategy = strategy.name(), matched = %id, "Report matched an open incident");
                matched = Some(id);
                break;
            }
        }

        let Some(match_id) = matched else {
            let incident = self.db.create_incident(report, None)?;
            tracing::info!(id = %incident.id, "Opened new incident group");
            return Ok(GroupOutcome::Created(incident));
        };

        // Strategies only return ids drawn from `open`, so this lookup
        // cannot miss; the matched record's group_id is the canonical group.
        let group_id = open
            .iter()
            .find(|i| i.id == match_id)
            .map(|i| i.group_id.clone())
            .unwrap_or(match_id);

        let incident = self.db.create_incident(report, Some(&group_id))?;
        self.append_to_group(&group_id, &incident.id, &report.query)?;

        tracing::info!(id = %incident.id, group = %group_id, "Report joined existing group");
        Ok(GroupOutcome::Joined {
            incident,
            group_id,
        })
    }

    /// Append the new report's text to every existing member of the group,
    /// waking any member that was parked in `AwaitingInfo`.
    fn append_to_group(
        &self,
        group_id: &IncidentId,
        new_id: &IncidentId,
        query: &str,
    ) -> Result<()> {
        let entry = HistoryEntry::user(query, Utc::now());
        for member in self.db.list_group(group_id)? {
            if member.id == *new_id {
                continue;
            }
            self.db.append_history(&member.id, &entry, true)?;
        }
        Ok(())
    }
}
