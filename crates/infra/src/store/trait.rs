//! Ledger store contract.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use coffer_core::{AccountId, LedgerResult, Money, RequestId};
use coffer_ledger::{AccountRecord, ChargeEvent, WithdrawalRequest};

/// Storage boundary for accounts, charge history, and withdrawal requests.
///
/// ## Implementation Requirements
///
/// - **One atomic operation per mutation.** `record_charge`,
///   `approve_withdrawal`, and `reject_withdrawal` each perform their
///   read-validate-write cycle as a single unit. No caller observes, or
///   interleaves with, a half-applied mutation.
/// - **Idempotency check and insert are one unit.** Concurrent
///   `record_charge` calls sharing an `(account, key)` pair resolve to
///   exactly one applied charge; the rest fail with `DuplicateCharge`.
/// - **Approval debits exactly once.** Concurrent approvals of one
///   request resolve to one success; the rest fail with
///   `InvalidStateTransition`. The funds check and the debit share a
///   critical section, so competing requests can never overdraw.
/// - **Reads never invent state.** `balance` of an unseen account is
///   zero; lookups of unknown ids report absence, they do not fabricate
///   records.
///
/// Backends that cannot take a process-wide lock (document stores, SQL)
/// realize the same guarantees with conditional writes keyed on
/// `AccountRecord::version` and a unique index over idempotency keys.
///
/// Implementations must be `Send + Sync`; callers share them behind
/// `Arc`.
pub trait LedgerStore: Send + Sync {
    /// Apply a charge: credit the account and append to its history.
    ///
    /// Returns the balance after the credit. Fails with `InvalidAmount`
    /// for zero or negative amounts and `DuplicateCharge` when the key
    /// was already applied for this account; neither failure changes any
    /// state. First sight of an account creates its record.
    fn record_charge(&self, charge: ChargeEvent) -> LedgerResult<Money>;

    /// Current balance; zero for accounts never seen.
    fn balance(&self, account_id: &AccountId) -> LedgerResult<Money>;

    /// Charge history for an account, oldest first.
    fn charge_history(&self, account_id: &AccountId) -> LedgerResult<Vec<ChargeEvent>>;

    /// Fetch an account record as stored.
    fn account(&self, account_id: &AccountId) -> LedgerResult<Option<AccountRecord>>;

    /// Insert or replace an account record.
    ///
    /// Provisioning and migration path. Routine balance movement goes
    /// through `record_charge` and `approve_withdrawal`, never here.
    fn put_account(&self, account: AccountRecord) -> LedgerResult<()>;

    /// Persist a new request in `Pending`. No funds move until approval.
    fn create_withdrawal_request(
        &self,
        request: WithdrawalRequest,
    ) -> LedgerResult<WithdrawalRequest>;

    /// Fetch a withdrawal request by id.
    fn withdrawal_request(&self, id: RequestId) -> LedgerResult<Option<WithdrawalRequest>>;

    /// All withdrawal requests for an account, newest first.
    fn withdrawal_requests_for(
        &self,
        account_id: &AccountId,
    ) -> LedgerResult<Vec<WithdrawalRequest>>;

    /// Atomically re-check funds, debit the account, and mark approved.
    ///
    /// An already-terminal request fails with `InvalidStateTransition`
    /// before any funds check. A pending request whose account balance is
    /// below `amount` fails with `InsufficientFunds` and stays pending,
    /// approvable again once funds arrive.
    fn approve_withdrawal(
        &self,
        id: RequestId,
        approved_at: DateTime<Utc>,
    ) -> LedgerResult<WithdrawalRequest>;

    /// Mark a pending request rejected. Never touches the balance.
    fn reject_withdrawal(&self, id: RequestId) -> LedgerResult<WithdrawalRequest>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn record_charge(&self, charge: ChargeEvent) -> LedgerResult<Money> {
        (**self).record_charge(charge)
    }

    fn balance(&self, account_id: &AccountId) -> LedgerResult<Money> {
        (**self).balance(account_id)
    }

    fn charge_history(&self, account_id: &AccountId) -> LedgerResult<Vec<ChargeEvent>> {
        (**self).charge_history(account_id)
    }

    fn account(&self, account_id: &AccountId) -> LedgerResult<Option<AccountRecord>> {
        (**self).account(account_id)
    }

    fn put_account(&self, account: AccountRecord) -> LedgerResult<()> {
        (**self).put_account(account)
    }

    fn create_withdrawal_request(
        &self,
        request: WithdrawalRequest,
    ) -> LedgerResult<WithdrawalRequest> {
        (**self).create_withdrawal_request(request)
    }

    fn withdrawal_request(&self, id: RequestId) -> LedgerResult<Option<WithdrawalRequest>> {
        (**self).withdrawal_request(id)
    }

    fn withdrawal_requests_for(
        &self,
        account_id: &AccountId,
    ) -> LedgerResult<Vec<WithdrawalRequest>> {
        (**self).withdrawal_requests_for(account_id)
    }

    fn approve_withdrawal(
        &self,
        id: RequestId,
        approved_at: DateTime<Utc>,
    ) -> LedgerResult<WithdrawalRequest> {
        (**self).approve_withdrawal(id, approved_at)
    }

    fn reject_withdrawal(&self, id: RequestId) -> LedgerResult<WithdrawalRequest> {
        (**self).reject_withdrawal(id)
    }
}
