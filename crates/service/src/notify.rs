//! Approval notices and their dispatch seam.
//!
//! Side effects of an approval (receipt email to the holder, alert to the
//! owner) are not the ledger's business. The service hands a read-only
//! snapshot to an `ApprovalNotifier` and moves on; the queue-backed
//! implementation enqueues jobs and leaves delivery to the job handlers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use coffer_infra::{Job, JobKind, JobStore};
use coffer_ledger::WithdrawalRequest;

/// Read-only snapshot handed to the notification pipeline after an
/// approval commits.
///
/// The destination and contact fields arrive decrypted; nothing in a
/// notice can reach back into the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalNotice {
    pub request: WithdrawalRequest,
    pub display_name: Option<String>,
    /// Decrypted contact attribute, when the account carries one.
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("could not serialize approval notice: {0}")]
    Payload(String),

    #[error("could not enqueue {job}: {reason}")]
    Enqueue { job: String, reason: String },
}

/// Dispatch seam for approval side effects.
///
/// ## Implementation Requirements
///
/// - `notify` hands off and returns; it never blocks on delivery.
/// - Failures are reported to the caller, never panicked. The approval
///   has already committed by the time a notice exists, so the caller
///   logs and drops the error.
/// - Repeat notices for one request must be tolerated: the approval is
///   exactly-once, notice delivery is at-least-once.
pub trait ApprovalNotifier: Send + Sync {
    fn notify(&self, notice: &ApprovalNotice) -> Result<(), NotifyError>;
}

impl<N> ApprovalNotifier for std::sync::Arc<N>
where
    N: ApprovalNotifier + ?Sized,
{
    fn notify(&self, notice: &ApprovalNotice) -> Result<(), NotifyError> {
        (**self).notify(notice)
    }
}

/// Selected when no notification pipeline is configured. Callers keep a
/// single code path either way.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ApprovalNotifier for NoopNotifier {
    fn notify(&self, _notice: &ApprovalNotice) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Enqueues one invoice-email job for the holder and one owner-alert job
/// per notice. Delivery and its retries belong to the job handlers.
#[derive(Debug)]
pub struct QueueNotifier<Q: JobStore> {
    queue: Q,
}

impl<Q: JobStore> QueueNotifier<Q> {
    pub fn new(queue: Q) -> Self {
        Self { queue }
    }
}

impl<Q: JobStore> ApprovalNotifier for QueueNotifier<Q> {
    fn notify(&self, notice: &ApprovalNotice) -> Result<(), NotifyError> {
        let payload =
            serde_json::to_value(notice).map_err(|e| NotifyError::Payload(e.to_string()))?;

        for kind in [JobKind::InvoiceEmail, JobKind::OwnerNotice] {
            let name = kind.type_name().to_string();
            self.queue
                .enqueue(Job::new(kind, payload.clone()))
                .map_err(|e| NotifyError::Enqueue {
                    job: name,
                    reason: e.to_string(),
                })?;
        }

        tracing::debug!(request = %notice.request.id, "approval notices queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coffer_core::{AccountId, Money, RequestId};
    use coffer_infra::InMemoryJobStore;
    use coffer_ledger::{Destination, WithdrawalStatus};
    use rust_decimal::Decimal;

    fn approved_notice() -> ApprovalNotice {
        let now = Utc::now();
        ApprovalNotice {
            request: WithdrawalRequest {
                id: RequestId::new(),
                user_id: AccountId::new("7512345678"),
                amount: Money::from(100),
                fee: Money::from(8),
                fee_percentage: Decimal::from(8),
                net_amount: Money::from(92),
                destination: Destination::Bank {
                    bank_name: "Alinma".to_string(),
                    iban: "SA0380000000608010167519".to_string(),
                },
                status: WithdrawalStatus::Approved,
                created_at: now,
                approved_at: Some(now),
            },
            display_name: Some("Sam".to_string()),
            contact: Some("sam@example.com".to_string()),
        }
    }

    #[test]
    fn noop_notifier_accepts_every_notice() {
        NoopNotifier.notify(&approved_notice()).unwrap();
    }

    #[test]
    fn queue_notifier_enqueues_invoice_and_owner_jobs() {
        let queue = InMemoryJobStore::arc();
        let notifier = QueueNotifier::new(queue.clone());
        let notice = approved_notice();

        notifier.notify(&notice).unwrap();

        assert_eq!(queue.stats().unwrap().pending, 2);
        let mut kinds = Vec::new();
        while let Some(job) = queue.claim_next().unwrap() {
            kinds.push(job.kind.clone());
            let decoded: ApprovalNotice = serde_json::from_value(job.payload.clone()).unwrap();
            assert_eq!(decoded, notice);
        }
        kinds.sort_by_key(|k| k.type_name().to_string());
        assert_eq!(kinds, vec![JobKind::InvoiceEmail, JobKind::OwnerNotice]);
    }

    #[test]
    fn repeat_notices_enqueue_fresh_jobs() {
        let queue = InMemoryJobStore::arc();
        let notifier = QueueNotifier::new(queue.clone());
        let notice = approved_notice();

        notifier.notify(&notice).unwrap();
        notifier.notify(&notice).unwrap();

        assert_eq!(queue.stats().unwrap().pending, 4);
    }
}
