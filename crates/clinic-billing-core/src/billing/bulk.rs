//! Bulk completion of pending visits.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::events::EventPublisher;
use super::status::{Completion, CompletionRequest, VisitStatusMachine};
use super::BillingResult;
use crate::config::BillingConfig;
use crate::db::Database;
use crate::models::Visit;
use crate::money;

/// A visit the batch could not complete, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

/// Per-visit outcome of a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkCompletionReport {
    /// Visits this batch moved to completed
    pub succeeded: Vec<String>,
    /// Visits that were already completed (or needed no change)
    pub skipped: Vec<String>,
    /// Visits whose steps were saved but which are still not completed
    pub incomplete: Vec<BulkFailure>,
    pub failed: Vec<BulkFailure>,
}

impl BulkCompletionReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.incomplete.len() + self.failed.len()
    }
}

/// Runs one completion per visit, each in its own transaction.
pub struct BulkCompletion<'a> {
    db: &'a Database,
    machine: VisitStatusMachine<'a>,
}

impl<'a> BulkCompletion<'a> {
    pub fn new(db: &'a Database, config: &'a BillingConfig, publisher: &'a dyn EventPublisher) -> Self {
        Self {
            db,
            machine: VisitStatusMachine::new(db, config, publisher),
        }
    }

    /// Complete each visit independently. A failure is recorded against its id and the
    /// batch carries on; earlier successes stay committed.
    pub fn bulk_complete(&self, visit_ids: &[String], request: &CompletionRequest) -> BulkCompletionReport {
        let mut report = BulkCompletionReport::default();

        for id in visit_ids {
            match self.machine.complete(id, request) {
                Ok(Completion::Updated(visit)) if visit.is_completed() => report.succeeded.push(id.clone()),
                Ok(Completion::Updated(visit)) => {
                    let reason = outstanding_reason(&visit);
                    tracing::warn!(visit_id = %id, reason = %reason, "Bulk completion left visit open");
                    report.incomplete.push(BulkFailure { id: id.clone(), reason });
                }
                Ok(Completion::AlreadyCompleted(_)) | Ok(Completion::Unchanged(_)) => {
                    tracing::warn!(visit_id = %id, "Skipped visit in bulk completion");
                    report.skipped.push(id.clone());
                }
                Err(e) => {
                    tracing::warn!(visit_id = %id, error = %e, "Bulk completion failed for visit");
                    report.failed.push(BulkFailure {
                        id: id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            completion_type = request.completion_type.as_str(),
            succeeded = report.succeeded.len(),
            skipped = report.skipped.len(),
            incomplete = report.incomplete.len(),
            failed = report.failed.len(),
            "Bulk completion finished"
        );
        report
    }

    /// The ids from `visit_ids` that a batch could still complete.
    pub fn selectable(&self, visit_ids: &[String]) -> BillingResult<Vec<String>> {
        let mut selectable = Vec::new();
        for id in visit_ids {
            if let Some(visit) = self.db.get_visit(id)? {
                if !visit.is_completed() {
                    selectable.push(id.clone());
                }
            }
        }
        Ok(selectable)
    }
}

/// Why a visit that was just updated is still short of `completed`.
fn outstanding_reason(visit: &Visit) -> String {
    if visit.total_due > Decimal::ZERO {
        format!("Payment outstanding: {} due", money::format_money(visit.total_due))
    } else {
        format!("Visit is at {}", visit.overall_status.as_str())
    }
}
