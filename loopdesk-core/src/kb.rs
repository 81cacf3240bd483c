//! Knowledge base learning
//!
//! Resolutions worth keeping get back-filled into the knowledge base when
//! an incident closes. Two gates protect its quality: a heuristic that
//! rejects hand-off and transactional replies, and a near-duplicate check
//! against the questions already stored.

use std::sync::Arc;

use crate::db::Database;
use crate::error::Result;
use crate::similarity::{ratio, KB_DUPLICATE_THRESHOLD};
use crate::types::KbEntry;

/// Hand-off phrases that are only disqualifying when the reply is short
const BRIDGE_PHRASES: &[&str] = &[
    "connecting you",
    "transferring",
    "admin to assist",
    "support team",
    "logged a ticket",
    "escalated",
];

/// Replies about request handling rather than problem solving
const TRANSACTIONAL_PHRASES: &[&str] = &[
    "received your request",
    "initiate the",
    "monitor the",
    "let you know",
    "approval",
    "access granted",
    "deployed",
    "shipping",
    "ordered",
    "will now",
    "have been added",
];

/// Words that mark a reply as actionable instructions
const ACTION_INDICATORS: &[&str] = &[
    "check", "try", "navigate", "click", "install", "reset", "restart", "verify", "password",
    "steps:", "how to",
];

/// Whether a resolution text is worth storing as reusable knowledge.
pub fn is_quality_solution(text: &str) -> bool {
    if text.len() < 15 {
        return false;
    }
    let lower = text.to_lowercase();

    if BRIDGE_PHRASES.iter().any(|p| lower.contains(p)) && text.len() < 60 {
        return false;
    }
    if TRANSACTIONAL_PHRASES.iter().any(|p| lower.contains(p)) {
        return false;
    }

    ACTION_INDICATORS.iter().any(|p| lower.contains(p)) || text.len() > 40
}

pub struct KnowledgeBase {
    db: Arc<Database>,
}

impl KnowledgeBase {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Whether a near-duplicate of `question` is already stored.
    pub fn has_duplicate(&self, question: &str) -> Result<bool> {
        for entry in self.db.list_kb_entries()? {
            let r = ratio(question, &entry.question);
            if r > KB_DUPLICATE_THRESHOLD {
                tracing::debug!(
                    question,
                    existing = %entry.question,
                    ratio = r,
                    "Knowledge-base duplicate prevented"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Store a resolution if it passes the quality and duplicate gates.
    ///
    /// Returns the stored entry, or `None` when either gate rejected it.
    pub fn learn(
        &self,
        question: &str,
        resolution: &str,
        category: Option<&str>,
        subcategory: Option<&str>,
    ) -> Result<Option<KbEntry>> {
        if !is_quality_solution(resolution) {
            tracing::debug!(question, "Resolution did not qualify for the knowledge base");
            return Ok(None);
        }
        if self.has_duplicate(question)? {
            return Ok(None);
        }

        let category = category.unwrap_or("General");
        let tags = format!("{};{};Resolved", category, subcategory.unwrap_or(""));
        let entry = KbEntry::new(category, question, resolution, Some(tags));
        self.db.insert_kb_entry(&entry)?;
        tracing::info!(id = %entry.id, question, "Added resolution to knowledge base");
        Ok(Some(entry))
    }

    /// Store a batch resolution applied to `count` incidents at once.
    ///
    /// The batch is keyed by a synthetic question so repeated identical
    /// batches dedupe against each other, not against real incidents.
    pub fn learn_batch(
        &self,
        resolution: &str,
        category: Option<&str>,
        count: usize,
    ) -> Result<Option<KbEntry>> {
        if count == 0 || !is_quality_solution(resolution) {
            return Ok(None);
        }
        let question = format!("Batch Resolved: {} tickets", count);
        if self.has_duplicate(&question)? {
            return Ok(None);
        }

        let category = category.unwrap_or("Batch");
        let tags = format!("{};BatchResolved", category);
        let entry = KbEntry::new(category, question, resolution, Some(tags));
        self.db.insert_kb_entry(&entry)?;
        tracing::info!(id = %entry.id, count, "Added batch resolution to knowledge base");
        Ok(Some(entry))
    }
}
