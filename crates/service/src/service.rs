//! Withdrawal eligibility and lifecycle orchestration.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use coffer_core::{AccountId, LedgerError, LedgerResult, Money, RequestId};
use coffer_crypto::FieldCodec;
use coffer_infra::LedgerStore;
use coffer_ledger::{
    Destination, FreezeSnapshot, FreezeWindow, WithdrawalRequest, WithdrawalStatus, compute_freeze,
};

use crate::fees::{FeeSchedule, Quote, WithdrawalChannel};
use crate::notify::{ApprovalNotice, ApprovalNotifier};

/// Channel availability for one account at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub balance: Money,
    /// Balance minus currently frozen funds, floored at zero.
    pub available_standard: Money,
    /// The full balance; the instant channel waives the freeze window.
    pub available_instant: Money,
    pub freeze: FreezeSnapshot,
}

impl Availability {
    pub fn for_channel(&self, channel: WithdrawalChannel) -> Money {
        match channel {
            WithdrawalChannel::Standard => self.available_standard,
            WithdrawalChannel::Instant => self.available_instant,
        }
    }
}

/// Orchestrates withdrawal eligibility, submission, and the approval
/// lifecycle over a `LedgerStore`.
///
/// ## Architecture Role
///
/// The service sits between external surfaces (bot, admin console) and
/// the store. Reads compose balance, charge history, and the freeze
/// window into availability; writes validate against availability,
/// encrypt what must not rest in plaintext, and delegate to the store's
/// atomic operations.
///
/// ## Execution Guarantees
///
/// - Eligibility is a read: quoting and availability never mutate state.
/// - Submission stores the destination with its sensitive field already
///   encrypted; plaintext never reaches the store.
/// - Approval and rejection are single store calls; the store owns the
///   funds re-check and the debit.
/// - Approval notices are fire-and-forget: once an approval has
///   committed, no notification failure can surface as an approval
///   failure.
///
/// ## Generic Parameters
///
/// - `S`: ledger store implementation
/// - `N`: approval notifier (`NoopNotifier` when no pipeline is wired)
#[derive(Debug)]
pub struct WithdrawalService<S, N> {
    store: S,
    notifier: N,
    codec: FieldCodec,
    window: FreezeWindow,
    fees: FeeSchedule,
}

impl<S, N> WithdrawalService<S, N> {
    pub fn new(
        store: S,
        notifier: N,
        codec: FieldCodec,
        window: FreezeWindow,
        fees: FeeSchedule,
    ) -> Self {
        Self {
            store,
            notifier,
            codec,
            window,
            fees,
        }
    }

    /// Service with codec, freeze window, and fee schedule read from the
    /// environment (`ENCRYPTION_KEY`, `FREEZE_WINDOW_MINUTES`,
    /// `STANDARD_FEE_PCT` / `INSTANT_FEE_PCT`).
    pub fn from_env(store: S, notifier: N) -> Self {
        Self::new(
            store,
            notifier,
            FieldCodec::from_env(),
            FreezeWindow::from_env(),
            FeeSchedule::from_env(),
        )
    }

    pub fn into_parts(self) -> (S, N) {
        (self.store, self.notifier)
    }

    /// The codec this service encrypts and decrypts with. Hosts reuse it
    /// for profile fields they render themselves.
    pub fn codec(&self) -> &FieldCodec {
        &self.codec
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn freeze_window(&self) -> FreezeWindow {
        self.window
    }
}

impl<S, N> WithdrawalService<S, N>
where
    S: LedgerStore,
    N: ApprovalNotifier,
{
    /// Current balance; zero for accounts never seen.
    pub fn balance(&self, account: &AccountId) -> LedgerResult<Money> {
        self.store.balance(account)
    }

    /// Channel availability at an explicit instant. The wall-clock
    /// methods delegate here; tests pin `now`.
    pub fn availability_at(
        &self,
        account: &AccountId,
        now: DateTime<Utc>,
    ) -> LedgerResult<Availability> {
        let balance = self.store.balance(account)?;
        let history = self.store.charge_history(account)?;
        let freeze = compute_freeze(&history, now, self.window);
        Ok(Availability {
            balance,
            available_standard: balance.saturating_sub(freeze.frozen_total),
            available_instant: balance,
            freeze,
        })
    }

    pub fn availability(&self, account: &AccountId) -> LedgerResult<Availability> {
        self.availability_at(account, Utc::now())
    }

    /// Funds withdrawable on the standard channel right now.
    pub fn available_standard(&self, account: &AccountId) -> LedgerResult<Money> {
        Ok(self.availability(account)?.available_standard)
    }

    /// Funds withdrawable on the instant channel right now.
    pub fn available_instant(&self, account: &AccountId) -> LedgerResult<Money> {
        self.store.balance(account)
    }

    /// Fee quote for a prospective withdrawal at an explicit instant.
    ///
    /// Fails `InvalidAmount` for non-positive amounts and
    /// `AmountExceedsAvailable` when the amount is over the channel's
    /// availability. Never mutates state.
    pub fn quote_at(
        &self,
        account: &AccountId,
        amount: Money,
        channel: WithdrawalChannel,
        now: DateTime<Utc>,
    ) -> LedgerResult<Quote> {
        if !amount.is_positive() {
            return Err(LedgerError::invalid_amount(amount));
        }
        let availability = self.availability_at(account, now)?;
        let available = availability.for_channel(channel);
        if amount > available {
            return Err(LedgerError::exceeds_available(available, amount));
        }
        Ok(self.fees.quote(amount, channel))
    }

    pub fn quote(
        &self,
        account: &AccountId,
        amount: Money,
        channel: WithdrawalChannel,
    ) -> LedgerResult<Quote> {
        self.quote_at(account, amount, channel, Utc::now())
    }

    /// Validate, price, and persist a withdrawal request at an explicit
    /// instant.
    ///
    /// The destination's sensitive field is encrypted before it reaches
    /// the store; the returned request is the stored shape. No funds move
    /// until approval.
    pub fn submit_at(
        &self,
        account: &AccountId,
        amount: Money,
        channel: WithdrawalChannel,
        destination: Destination,
        now: DateTime<Utc>,
    ) -> LedgerResult<WithdrawalRequest> {
        let quote = self.quote_at(account, amount, channel, now)?;
        let request = WithdrawalRequest {
            id: RequestId::new(),
            user_id: account.clone(),
            amount: quote.amount,
            fee: quote.fee,
            fee_percentage: quote.fee_percentage,
            net_amount: quote.net_amount,
            destination: destination.encrypted(&self.codec),
            status: WithdrawalStatus::Pending,
            created_at: now,
            approved_at: None,
        };
        let stored = self.store.create_withdrawal_request(request)?;
        info!(
            request = %stored.id,
            account = %stored.user_id,
            amount = %stored.amount,
            channel = channel.as_str(),
            "withdrawal request submitted"
        );
        Ok(stored)
    }

    pub fn submit(
        &self,
        account: &AccountId,
        amount: Money,
        channel: WithdrawalChannel,
        destination: Destination,
    ) -> LedgerResult<WithdrawalRequest> {
        self.submit_at(account, amount, channel, destination, Utc::now())
    }

    /// Approve a pending request: the store re-checks funds and debits in
    /// one atomic operation, then the notifier is handed a decrypted
    /// notice.
    ///
    /// Notice dispatch failures are logged and dropped; the approval has
    /// already committed and its outcome never depends on delivery.
    pub fn approve(&self, id: RequestId) -> LedgerResult<WithdrawalRequest> {
        let approved = self.store.approve_withdrawal(id, Utc::now())?;
        info!(
            request = %approved.id,
            account = %approved.user_id,
            net = %approved.net_amount,
            "withdrawal request approved"
        );
        self.dispatch_notice(&approved);
        Ok(approved)
    }

    /// Reject a pending request. No balance effect, no notice.
    pub fn reject(&self, id: RequestId) -> LedgerResult<WithdrawalRequest> {
        let rejected = self.store.reject_withdrawal(id)?;
        info!(request = %rejected.id, account = %rejected.user_id, "withdrawal request rejected");
        Ok(rejected)
    }

    fn dispatch_notice(&self, approved: &WithdrawalRequest) {
        let (display_name, contact) = match self.store.account(&approved.user_id) {
            Ok(Some(record)) => {
                let profile = record.decrypt_attributes(&self.codec);
                let contact = profile.attribute_text("email").map(str::to_string);
                (profile.display_name, contact)
            }
            Ok(None) => (None, None),
            Err(e) => {
                // The approval has committed; a failed profile read only
                // degrades the notice.
                warn!(request = %approved.id, error = %e, "profile read failed, sending bare notice");
                (None, None)
            }
        };

        let mut request = approved.clone();
        request.destination = request.destination.decrypted(&self.codec);

        let notice = ApprovalNotice {
            request,
            display_name,
            contact,
        };
        if let Err(e) = self.notifier.notify(&notice) {
            error!(request = %approved.id, error = %e, "approval notice dispatch failed");
        }
    }
}
