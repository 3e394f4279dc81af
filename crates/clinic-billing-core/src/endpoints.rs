//! Named billing operations and the paths a host web layer serves them on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP verb for an operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Every operation the billing core exposes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    EstimateCost,
    RegisterVisit,
    RecordPayment,
    CompleteVisit,
    BulkCompleteVisits,
    DeleteVisit,
    MarkVisionTestComplete,
    MarkPrescriptionComplete,
    RecordVisionTest,
    RecordPrescription,
    ReopenVisit,
    DeletePatient,
    PaymentsForVisit,
    AuditLog,
    VouchersForReference,
}

impl Operation {
    pub const ALL: [Operation; 15] = [
        Operation::EstimateCost,
        Operation::RegisterVisit,
        Operation::RecordPayment,
        Operation::CompleteVisit,
        Operation::BulkCompleteVisits,
        Operation::DeleteVisit,
        Operation::MarkVisionTestComplete,
        Operation::MarkPrescriptionComplete,
        Operation::RecordVisionTest,
        Operation::RecordPrescription,
        Operation::ReopenVisit,
        Operation::DeletePatient,
        Operation::PaymentsForVisit,
        Operation::AuditLog,
        Operation::VouchersForReference,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::EstimateCost => "estimate_cost",
            Operation::RegisterVisit => "register_visit",
            Operation::RecordPayment => "record_payment",
            Operation::CompleteVisit => "complete_visit",
            Operation::BulkCompleteVisits => "bulk_complete_visits",
            Operation::DeleteVisit => "delete_visit",
            Operation::MarkVisionTestComplete => "mark_vision_test_complete",
            Operation::MarkPrescriptionComplete => "mark_prescription_complete",
            Operation::RecordVisionTest => "record_vision_test",
            Operation::RecordPrescription => "record_prescription",
            Operation::ReopenVisit => "reopen_visit",
            Operation::DeletePatient => "delete_patient",
            Operation::PaymentsForVisit => "payments_for_visit",
            Operation::AuditLog => "audit_log",
            Operation::VouchersForReference => "vouchers_for_reference",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Operation::EstimateCost
            | Operation::PaymentsForVisit
            | Operation::AuditLog
            | Operation::VouchersForReference => HttpMethod::Get,
            Operation::DeleteVisit | Operation::DeletePatient => HttpMethod::Delete,
            _ => HttpMethod::Post,
        }
    }

    /// Path below the API base. `{id}` is filled in by the resolver.
    pub fn path_template(&self) -> &'static str {
        match self {
            Operation::EstimateCost => "/visits/estimate",
            Operation::RegisterVisit => "/visits",
            Operation::RecordPayment => "/visits/{id}/payments",
            Operation::CompleteVisit => "/visits/{id}/complete",
            Operation::BulkCompleteVisits => "/visits/bulk-complete",
            Operation::DeleteVisit => "/visits/{id}",
            Operation::MarkVisionTestComplete => "/visits/{id}/vision-test/complete",
            Operation::MarkPrescriptionComplete => "/visits/{id}/prescription/complete",
            Operation::RecordVisionTest => "/patients/{id}/vision-tests",
            Operation::RecordPrescription => "/patients/{id}/prescriptions",
            Operation::ReopenVisit => "/visits/{id}/reopen",
            Operation::DeletePatient => "/patients/{id}",
            Operation::PaymentsForVisit => "/visits/{id}/payments",
            Operation::AuditLog => "/visits/{id}/audit",
            Operation::VouchersForReference => "/vouchers/{id}",
        }
    }

    pub fn requires_id(&self) -> bool {
        self.path_template().contains("{id}")
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Operation {0} needs an id")]
    MissingId(&'static str),

    #[error("Operation {0} takes no id")]
    UnexpectedId(&'static str),
}

/// A resolved operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: String,
}

/// Builds endpoint paths under a configured base.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    base: String,
}

impl EndpointResolver {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        let base = base.trim_end_matches('/');
        Self {
            base: if base.is_empty() || base.starts_with('/') {
                base.to_string()
            } else {
                format!("/{}", base)
            },
        }
    }

    pub fn resolve(&self, operation: Operation, id: Option<&str>) -> Result<Endpoint, EndpointError> {
        let template = operation.path_template();
        let path = match (operation.requires_id(), id) {
            (true, Some(id)) if !id.is_empty() => template.replace("{id}", id),
            (true, _) => return Err(EndpointError::MissingId(operation.name())),
            (false, Some(_)) => return Err(EndpointError::UnexpectedId(operation.name())),
            (false, None) => template.to_string(),
        };
        Ok(Endpoint {
            method: operation.method(),
            path: format!("{}{}", self.base, path),
        })
    }
}
