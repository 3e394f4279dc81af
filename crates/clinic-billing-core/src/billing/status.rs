//! Visit status machine.
//!
//! Clinical steps move `pending -> completed` on evidence (a linked vision test or
//! prescription) or by force through `complete_visit`. Payment status and overall status
//! are always re-derived, never set.

use serde::{Deserialize, Serialize};

use super::events::{publish_committed, EventPublisher, VisitEventType};
use super::ledger::{invariant_violation, PaymentLedger, PaymentRequest};
use super::{load_visit, BillingError, BillingResult};
use crate::config::BillingConfig;
use crate::db::Database;
use crate::models::{Prescription, StepStatus, VisionTest, Visit};

/// Which steps a completion targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionType {
    VisionOnly,
    PrescriptionOnly,
    Both,
    /// Force both clinical steps regardless of evidence
    SimpleComplete,
}

impl CompletionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionType::VisionOnly => "vision_only",
            CompletionType::PrescriptionOnly => "prescription_only",
            CompletionType::Both => "both",
            CompletionType::SimpleComplete => "simple_complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vision_only" => Some(CompletionType::VisionOnly),
            "prescription_only" => Some(CompletionType::PrescriptionOnly),
            "both" => Some(CompletionType::Both),
            "simple_complete" => Some(CompletionType::SimpleComplete),
            _ => None,
        }
    }
}

/// Arguments for `complete_visit`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub completion_type: CompletionType,
    /// Appended to `visit_notes`
    pub notes: Option<String>,
    /// Force the vision test step without evidence
    pub skip_vision: bool,
    /// Force the prescription step without evidence
    pub skip_prescription: bool,
    /// Record a payment for the remaining due before completing
    pub settle_due: bool,
}

impl CompletionRequest {
    pub fn new(completion_type: CompletionType) -> Self {
        Self {
            completion_type,
            notes: None,
            skip_vision: false,
            skip_prescription: false,
            settle_due: false,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn settling_due(mut self) -> Self {
        self.settle_due = true;
        self
    }

    /// (vision, prescription) steps this request moves, and whether each is forced.
    fn targets(&self) -> [(ClinicalStep, bool, bool); 2] {
        let simple = self.completion_type == CompletionType::SimpleComplete;
        let wants_vision = matches!(
            self.completion_type,
            CompletionType::VisionOnly | CompletionType::Both
        );
        let wants_prescription = matches!(
            self.completion_type,
            CompletionType::PrescriptionOnly | CompletionType::Both
        );
        [
            (
                ClinicalStep::VisionTest,
                wants_vision || simple || self.skip_vision,
                simple || self.skip_vision,
            ),
            (
                ClinicalStep::Prescription,
                wants_prescription || simple || self.skip_prescription,
                simple || self.skip_prescription,
            ),
        ]
    }
}

/// Result of a completion attempt.
#[derive(Debug, Clone)]
pub enum Completion {
    /// The visit was already completed; nothing was written
    AlreadyCompleted(Visit),
    /// Nothing to change (steps already in the requested state, no notes, no payment)
    Unchanged(Visit),
    Updated(Visit),
}

impl Completion {
    pub fn into_visit(self) -> Visit {
        match self {
            Completion::AlreadyCompleted(v) | Completion::Unchanged(v) | Completion::Updated(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClinicalStep {
    VisionTest,
    Prescription,
}

impl ClinicalStep {
    fn name(&self) -> &'static str {
        match self {
            ClinicalStep::VisionTest => "vision_test",
            ClinicalStep::Prescription => "prescription",
        }
    }

    fn status(&self, visit: &Visit) -> StepStatus {
        match self {
            ClinicalStep::VisionTest => visit.vision_test_status,
            ClinicalStep::Prescription => visit.prescription_status,
        }
    }

    fn has_evidence(&self, db: &Database, visit_id: &str) -> BillingResult<bool> {
        Ok(match self {
            ClinicalStep::VisionTest => db.visit_has_vision_test(visit_id)?,
            ClinicalStep::Prescription => db.visit_has_prescription(visit_id)?,
        })
    }

    /// Set the step completed, stamping the time once.
    fn complete(&self, visit: &mut Visit) {
        let now = chrono::Utc::now().to_rfc3339();
        let (status, completed_at) = match self {
            ClinicalStep::VisionTest => (
                &mut visit.vision_test_status,
                &mut visit.vision_test_completed_at,
            ),
            ClinicalStep::Prescription => (
                &mut visit.prescription_status,
                &mut visit.prescription_completed_at,
            ),
        };
        if !status.is_completed() {
            *status = StepStatus::Completed;
            *completed_at = Some(now);
        }
    }
}

/// Drives visit status transitions.
pub struct VisitStatusMachine<'a> {
    db: &'a Database,
    config: &'a BillingConfig,
    publisher: &'a dyn EventPublisher,
}

impl<'a> VisitStatusMachine<'a> {
    pub fn new(db: &'a Database, config: &'a BillingConfig, publisher: &'a dyn EventPublisher) -> Self {
        Self { db, config, publisher }
    }

    /// Mark the vision test done. Needs a linked vision test; repeat calls are no-ops.
    pub fn mark_vision_test_complete(&self, visit_id: &str) -> BillingResult<Visit> {
        self.mark_step(visit_id, ClinicalStep::VisionTest)
    }

    /// Mark the prescription done. Needs a linked prescription; repeat calls are no-ops.
    pub fn mark_prescription_complete(&self, visit_id: &str) -> BillingResult<Visit> {
        self.mark_step(visit_id, ClinicalStep::Prescription)
    }

    /// Store a vision test; when linked to a visit its step completes in the same transaction.
    pub fn record_vision_test(
        &self,
        patient_id: &str,
        visit_id: Option<&str>,
    ) -> BillingResult<(VisionTest, Option<Visit>)> {
        let test = VisionTest::new(patient_id.to_string(), visit_id.map(str::to_string));
        let visit = self.attach_evidence(patient_id, visit_id, ClinicalStep::VisionTest, |db| {
            db.insert_vision_test(&test)
        })?;
        Ok((test, visit))
    }

    /// Store a prescription; when linked to a visit its step completes in the same transaction.
    pub fn record_prescription(
        &self,
        patient_id: &str,
        visit_id: Option<&str>,
    ) -> BillingResult<(Prescription, Option<Visit>)> {
        let prescription = Prescription::new(patient_id.to_string(), visit_id.map(str::to_string));
        let visit = self.attach_evidence(patient_id, visit_id, ClinicalStep::Prescription, |db| {
            db.insert_prescription(&prescription)
        })?;
        Ok((prescription, visit))
    }

    /// Apply a completion. Returns the visit as stored afterwards.
    pub fn complete_visit(&self, visit_id: &str, request: &CompletionRequest) -> BillingResult<Visit> {
        self.complete(visit_id, request).map(Completion::into_visit)
    }

    /// Like `complete_visit`, but reports whether anything happened.
    pub fn complete(&self, visit_id: &str, request: &CompletionRequest) -> BillingResult<Completion> {
        let tx = self.db.begin_immediate()?;
        let mut visit = load_visit(self.db, visit_id)?;
        if visit.is_completed() {
            return Ok(Completion::AlreadyCompleted(visit));
        }
        let before = visit.clone();

        let targets = request.targets();
        for (step, wanted, forced) in targets {
            if wanted && !forced && !step.status(&visit).is_completed() && !step.has_evidence(self.db, &visit.id)? {
                return Err(BillingError::MissingEvidence(format!(
                    "visit {} has no {} on record",
                    visit.id,
                    step.name()
                )));
            }
        }

        if request.settle_due && visit.total_due > rust_decimal::Decimal::ZERO {
            let ledger = PaymentLedger::new(self.db, self.config, self.publisher);
            let settlement = PaymentRequest::new(
                visit.id.clone(),
                visit.total_due,
                self.config.settlement_method_id.clone(),
            )
            .with_notes(format!("Settled on {}", request.completion_type.as_str()));
            ledger.record_locked(&mut visit, &settlement)?;
        }

        for (step, wanted, _) in targets {
            if wanted {
                step.complete(&mut visit);
            }
        }
        if let Some(notes) = &request.notes {
            visit.append_note(notes);
        }
        visit.refresh_statuses();

        if visit == before {
            return Ok(Completion::Unchanged(visit));
        }

        visit.touch();
        self.verify(&visit)?;
        self.db.update_visit(&visit)?;
        self.db.append_audit(
            &visit.id,
            "completed",
            Some(&format!(
                "{} -> {}",
                request.completion_type.as_str(),
                visit.overall_status.as_str()
            )),
        )?;

        tx.commit()?;

        tracing::info!(
            visit_id = %visit.id,
            completion_type = request.completion_type.as_str(),
            vision_test_status = visit.vision_test_status.as_str(),
            prescription_status = visit.prescription_status.as_str(),
            payment_status = visit.payment_status.as_str(),
            overall_status = visit.overall_status.as_str(),
            "Completed visit"
        );
        publish_committed(self.db, self.publisher, VisitEventType::Updated, visit.clone());

        Ok(Completion::Updated(visit))
    }

    /// Take a completed visit back to open clinical steps. Payments are untouched.
    pub fn reopen_visit(&self, visit_id: &str, reason: &str) -> BillingResult<Visit> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(BillingError::InvalidRequest(
                "reopening a visit requires a reason".to_string(),
            ));
        }

        let tx = self.db.begin_immediate()?;
        let mut visit = load_visit(self.db, visit_id)?;
        if !visit.is_completed() {
            return Ok(visit);
        }

        visit.vision_test_status = StepStatus::Pending;
        visit.vision_test_completed_at = None;
        visit.prescription_status = StepStatus::Pending;
        visit.prescription_completed_at = None;
        visit.append_note(&format!("Reopened: {}", reason));
        visit.refresh_statuses();
        visit.touch();
        self.db.update_visit(&visit)?;
        self.db.append_audit(&visit.id, "reopened", Some(reason))?;

        tx.commit()?;

        tracing::info!(visit_id = %visit.id, reason = %reason, "Reopened visit");
        publish_committed(self.db, self.publisher, VisitEventType::Updated, visit.clone());
        Ok(visit)
    }

    fn mark_step(&self, visit_id: &str, step: ClinicalStep) -> BillingResult<Visit> {
        let tx = self.db.begin_immediate()?;
        let mut visit = load_visit(self.db, visit_id)?;
        if step.status(&visit).is_completed() {
            return Ok(visit);
        }
        if !step.has_evidence(self.db, &visit.id)? {
            return Err(BillingError::MissingEvidence(format!(
                "visit {} has no {} on record",
                visit.id,
                step.name()
            )));
        }

        self.complete_step_locked(&mut visit, step)?;
        tx.commit()?;

        tracing::info!(
            visit_id = %visit.id,
            step = step.name(),
            overall_status = visit.overall_status.as_str(),
            "Marked step complete"
        );
        publish_committed(self.db, self.publisher, VisitEventType::Updated, visit.clone());
        Ok(visit)
    }

    fn attach_evidence<F>(
        &self,
        patient_id: &str,
        visit_id: Option<&str>,
        step: ClinicalStep,
        insert: F,
    ) -> BillingResult<Option<Visit>>
    where
        F: FnOnce(&Database) -> crate::db::DbResult<()>,
    {
        let tx = self.db.begin_immediate()?;
        if self.db.get_patient(patient_id)?.is_none() {
            return Err(BillingError::NotFound(format!("patient {}", patient_id)));
        }

        let mut visit = match visit_id {
            Some(id) => {
                let visit = load_visit(self.db, id)?;
                if visit.patient_id != patient_id {
                    return Err(BillingError::InvalidRequest(format!(
                        "visit {} belongs to another patient",
                        id
                    )));
                }
                Some(visit)
            }
            None => None,
        };

        insert(self.db)?;

        let changed = match visit.as_mut() {
            Some(v) if !step.status(v).is_completed() => {
                self.complete_step_locked(v, step)?;
                true
            }
            _ => false,
        };

        tx.commit()?;

        tracing::info!(
            patient_id = %patient_id,
            visit_id = ?visit_id,
            step = step.name(),
            "Recorded clinical evidence"
        );
        if let (true, Some(v)) = (changed, &visit) {
            publish_committed(self.db, self.publisher, VisitEventType::Updated, v.clone());
        }
        Ok(visit)
    }

    fn complete_step_locked(&self, visit: &mut Visit, step: ClinicalStep) -> BillingResult<()> {
        step.complete(visit);
        visit.refresh_statuses();
        visit.touch();
        self.verify(visit)?;
        self.db.update_visit(visit)?;
        self.db
            .append_audit(&visit.id, &format!("{}_completed", step.name()), None)?;
        Ok(())
    }

    fn verify(&self, visit: &Visit) -> BillingResult<()> {
        let payments_sum = self.db.sum_payments_for_visit(&visit.id)?;
        visit
            .check_invariants(payments_sum)
            .map_err(|reason| invariant_violation(&visit.id, reason))
    }
}
