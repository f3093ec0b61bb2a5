//! In-memory ledger store.
//!
//! Backs tests and single-process deployments. One `RwLock` over every
//! collection keeps each mutation atomic; a poisoned lock surfaces as
//! `LedgerError::Storage`, never a panic.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use coffer_core::{AccountId, IdempotencyKey, LedgerError, LedgerResult, Money, RequestId};
use coffer_ledger::{AccountRecord, ChargeEvent, WithdrawalRequest};

use super::r#trait::LedgerStore;

#[derive(Debug, Default)]
struct Collections {
    accounts: HashMap<AccountId, AccountRecord>,
    charge_history: Vec<ChargeEvent>,
    applied_keys: HashSet<(AccountId, IdempotencyKey)>,
    withdrawal_requests: HashMap<RequestId, WithdrawalRequest>,
}

/// In-memory `LedgerStore`.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<Collections>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, Collections>> {
        self.inner
            .read()
            .map_err(|_| LedgerError::storage("ledger store lock poisoned"))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, Collections>> {
        self.inner
            .write()
            .map_err(|_| LedgerError::storage("ledger store lock poisoned"))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn record_charge(&self, charge: ChargeEvent) -> LedgerResult<Money> {
        if !charge.amount.is_positive() {
            return Err(LedgerError::invalid_amount(charge.amount));
        }

        let mut guard = self.write()?;
        let inner = &mut *guard;

        let key = (charge.user_id.clone(), charge.idempotency_key.clone());
        if inner.applied_keys.contains(&key) {
            return Err(LedgerError::duplicate_charge(charge.idempotency_key));
        }

        let account = inner
            .accounts
            .entry(charge.user_id.clone())
            .or_insert_with(|| AccountRecord::new(charge.user_id.clone()));
        account.balance += charge.amount;
        account.version += 1;
        let balance = account.balance;

        inner.applied_keys.insert(key);
        inner.charge_history.push(charge);
        Ok(balance)
    }

    fn balance(&self, account_id: &AccountId) -> LedgerResult<Money> {
        Ok(self
            .read()?
            .accounts
            .get(account_id)
            .map(|account| account.balance)
            .unwrap_or(Money::ZERO))
    }

    fn charge_history(&self, account_id: &AccountId) -> LedgerResult<Vec<ChargeEvent>> {
        Ok(self
            .read()?
            .charge_history
            .iter()
            .filter(|charge| &charge.user_id == account_id)
            .cloned()
            .collect())
    }

    fn account(&self, account_id: &AccountId) -> LedgerResult<Option<AccountRecord>> {
        Ok(self.read()?.accounts.get(account_id).cloned())
    }

    fn put_account(&self, account: AccountRecord) -> LedgerResult<()> {
        self.write()?.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    fn create_withdrawal_request(
        &self,
        request: WithdrawalRequest,
    ) -> LedgerResult<WithdrawalRequest> {
        if !request.amount.is_positive() {
            return Err(LedgerError::invalid_amount(request.amount));
        }

        let mut guard = self.write()?;
        if guard.withdrawal_requests.contains_key(&request.id) {
            return Err(LedgerError::storage(format!(
                "withdrawal request id collision: {}",
                request.id
            )));
        }
        guard.withdrawal_requests.insert(request.id, request.clone());
        Ok(request)
    }

    fn withdrawal_request(&self, id: RequestId) -> LedgerResult<Option<WithdrawalRequest>> {
        Ok(self.read()?.withdrawal_requests.get(&id).cloned())
    }

    fn withdrawal_requests_for(
        &self,
        account_id: &AccountId,
    ) -> LedgerResult<Vec<WithdrawalRequest>> {
        let mut requests: Vec<WithdrawalRequest> = self
            .read()?
            .withdrawal_requests
            .values()
            .filter(|request| &request.user_id == account_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    fn approve_withdrawal(
        &self,
        id: RequestId,
        approved_at: DateTime<Utc>,
    ) -> LedgerResult<WithdrawalRequest> {
        let mut guard = self.write()?;
        let inner = &mut *guard;

        let request = inner
            .withdrawal_requests
            .get_mut(&id)
            .ok_or(LedgerError::RequestNotFound(id))?;
        if request.status.is_terminal() {
            return Err(LedgerError::invalid_transition(request.status.as_str()));
        }

        let Some(account) = inner.accounts.get_mut(&request.user_id) else {
            return Err(LedgerError::insufficient_funds(Money::ZERO, request.amount));
        };
        if account.balance < request.amount {
            return Err(LedgerError::insufficient_funds(
                account.balance,
                request.amount,
            ));
        }

        request.approve(approved_at)?;
        account.balance -= request.amount;
        account.version += 1;
        Ok(request.clone())
    }

    fn reject_withdrawal(&self, id: RequestId) -> LedgerResult<WithdrawalRequest> {
        let mut guard = self.write()?;
        let request = guard
            .withdrawal_requests
            .get_mut(&id)
            .ok_or(LedgerError::RequestNotFound(id))?;
        request.reject()?;
        Ok(request.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::Duration;
    use coffer_ledger::{ChargeMethod, Destination, WithdrawalStatus};
    use rust_decimal::Decimal;

    use super::*;

    fn charge(user: &str, amount: i64, key: &str) -> ChargeEvent {
        ChargeEvent::new(
            AccountId::new(user),
            Money::from(amount),
            ChargeMethod::Gateway,
            IdempotencyKey::new(key),
            Utc::now(),
        )
    }

    fn pending_request(user: &str, amount: i64) -> WithdrawalRequest {
        WithdrawalRequest {
            id: RequestId::new(),
            user_id: AccountId::new(user),
            amount: Money::from(amount),
            fee: Money::ZERO,
            fee_percentage: Decimal::ZERO,
            net_amount: Money::from(amount),
            destination: Destination::Bank {
                bank_name: "First National".to_string(),
                iban: "SA4420000001234567891234".to_string(),
            },
            status: WithdrawalStatus::Pending,
            created_at: Utc::now(),
            approved_at: None,
        }
    }

    fn store_with_balance(user: &str, balance: i64) -> InMemoryLedgerStore {
        let store = InMemoryLedgerStore::new();
        store
            .put_account(AccountRecord::with_balance(
                AccountId::new(user),
                Money::from(balance),
            ))
            .unwrap();
        store
    }

    #[test]
    fn charge_credits_and_returns_new_balance() {
        let store = InMemoryLedgerStore::new();
        let alice = AccountId::new("alice");

        let balance = store.record_charge(charge("alice", 200, "txn-1")).unwrap();

        assert_eq!(balance, Money::from(200));
        assert_eq!(store.balance(&alice).unwrap(), Money::from(200));
        assert_eq!(store.charge_history(&alice).unwrap().len(), 1);

        let account = store.account(&alice).unwrap().unwrap();
        assert_eq!(account.version, 1);
    }

    #[test]
    fn duplicate_key_is_rejected_without_balance_change() {
        let store = InMemoryLedgerStore::new();
        let alice = AccountId::new("alice");

        store.record_charge(charge("alice", 200, "txn-1")).unwrap();
        let err = store
            .record_charge(charge("alice", 200, "txn-1"))
            .unwrap_err();

        match err {
            LedgerError::DuplicateCharge(key) => assert_eq!(key.as_str(), "txn-1"),
            other => panic!("Expected DuplicateCharge, got {other:?}"),
        }
        assert_eq!(store.balance(&alice).unwrap(), Money::from(200));
        assert_eq!(store.charge_history(&alice).unwrap().len(), 1);

        // A fresh key is a fresh charge.
        store.record_charge(charge("alice", 50, "txn-2")).unwrap();
        assert_eq!(store.balance(&alice).unwrap(), Money::from(250));
    }

    #[test]
    fn same_key_on_different_accounts_both_apply() {
        let store = InMemoryLedgerStore::new();

        store.record_charge(charge("alice", 100, "txn-1")).unwrap();
        store.record_charge(charge("bob", 100, "txn-1")).unwrap();

        assert_eq!(
            store.balance(&AccountId::new("alice")).unwrap(),
            Money::from(100)
        );
        assert_eq!(
            store.balance(&AccountId::new("bob")).unwrap(),
            Money::from(100)
        );
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let store = InMemoryLedgerStore::new();
        let alice = AccountId::new("alice");

        for amount in [0, -5] {
            let err = store
                .record_charge(charge("alice", amount, "txn-neg"))
                .unwrap_err();
            match err {
                LedgerError::InvalidAmount(got) => assert_eq!(got, Money::from(amount)),
                other => panic!("Expected InvalidAmount, got {other:?}"),
            }
        }
        assert_eq!(store.balance(&alice).unwrap(), Money::ZERO);
        assert!(store.charge_history(&alice).unwrap().is_empty());
    }

    #[test]
    fn unknown_account_balance_is_zero() {
        let store = InMemoryLedgerStore::new();
        assert_eq!(
            store.balance(&AccountId::new("nobody")).unwrap(),
            Money::ZERO
        );
        assert!(store.account(&AccountId::new("nobody")).unwrap().is_none());
    }

    #[test]
    fn approval_debits_exactly_once() {
        let store = store_with_balance("alice", 500);
        let request = store
            .create_withdrawal_request(pending_request("alice", 200))
            .unwrap();
        let approved_at = Utc::now();

        let approved = store.approve_withdrawal(request.id, approved_at).unwrap();

        assert_eq!(approved.status, WithdrawalStatus::Approved);
        assert_eq!(approved.approved_at, Some(approved_at));
        assert_eq!(
            store.balance(&AccountId::new("alice")).unwrap(),
            Money::from(300)
        );

        let err = store
            .approve_withdrawal(request.id, Utc::now())
            .unwrap_err();
        match err {
            LedgerError::InvalidStateTransition { from } => assert_eq!(from, "approved"),
            other => panic!("Expected InvalidStateTransition, got {other:?}"),
        }
        assert_eq!(
            store.balance(&AccountId::new("alice")).unwrap(),
            Money::from(300)
        );
    }

    #[test]
    fn rejected_request_cannot_be_approved() {
        let store = store_with_balance("alice", 500);
        let request = store
            .create_withdrawal_request(pending_request("alice", 200))
            .unwrap();

        let rejected = store.reject_withdrawal(request.id).unwrap();
        assert_eq!(rejected.status, WithdrawalStatus::Rejected);
        assert_eq!(
            store.balance(&AccountId::new("alice")).unwrap(),
            Money::from(500)
        );

        let err = store
            .approve_withdrawal(request.id, Utc::now())
            .unwrap_err();
        match err {
            LedgerError::InvalidStateTransition { from } => assert_eq!(from, "rejected"),
            other => panic!("Expected InvalidStateTransition, got {other:?}"),
        }
    }

    #[test]
    fn insufficient_funds_leaves_request_pending() {
        let store = store_with_balance("alice", 100);
        let request = store
            .create_withdrawal_request(pending_request("alice", 200))
            .unwrap();

        let err = store
            .approve_withdrawal(request.id, Utc::now())
            .unwrap_err();
        match err {
            LedgerError::InsufficientFunds { balance, requested } => {
                assert_eq!(balance, Money::from(100));
                assert_eq!(requested, Money::from(200));
            }
            other => panic!("Expected InsufficientFunds, got {other:?}"),
        }

        let stored = store.withdrawal_request(request.id).unwrap().unwrap();
        assert_eq!(stored.status, WithdrawalStatus::Pending);

        // Funds arrive later; the same request is approvable.
        store.record_charge(charge("alice", 150, "txn-topup")).unwrap();
        store.approve_withdrawal(request.id, Utc::now()).unwrap();
        assert_eq!(
            store.balance(&AccountId::new("alice")).unwrap(),
            Money::from(50)
        );
    }

    #[test]
    fn unknown_request_is_not_found() {
        let store = InMemoryLedgerStore::new();
        let missing = RequestId::new();

        match store.approve_withdrawal(missing, Utc::now()) {
            Err(LedgerError::RequestNotFound(id)) => assert_eq!(id, missing),
            other => panic!("Expected RequestNotFound, got {other:?}"),
        }
        match store.reject_withdrawal(missing) {
            Err(LedgerError::RequestNotFound(id)) => assert_eq!(id, missing),
            other => panic!("Expected RequestNotFound, got {other:?}"),
        }
        assert!(store.withdrawal_request(missing).unwrap().is_none());
    }

    #[test]
    fn requests_are_listed_newest_first() {
        let store = InMemoryLedgerStore::new();
        let base = Utc::now();

        for minutes in [2, 0, 1] {
            let mut request = pending_request("alice", 10);
            request.created_at = base + Duration::minutes(minutes);
            store.create_withdrawal_request(request).unwrap();
        }

        let listed = store
            .withdrawal_requests_for(&AccountId::new("alice"))
            .unwrap();
        let minutes: Vec<i64> = listed
            .iter()
            .map(|r| (r.created_at - base).num_minutes())
            .collect();
        assert_eq!(minutes, vec![2, 1, 0]);
    }

    #[test]
    fn concurrent_duplicate_charges_apply_once() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store.record_charge(charge("alice", 200, "txn-race"))
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let applied = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::DuplicateCharge(_))))
            .count();

        assert_eq!(applied, 1);
        assert_eq!(duplicates, 7);
        assert_eq!(
            store.balance(&AccountId::new("alice")).unwrap(),
            Money::from(200)
        );
        assert_eq!(
            store.charge_history(&AccountId::new("alice")).unwrap().len(),
            1
        );
    }

    #[test]
    fn concurrent_approvals_of_one_request_debit_once() {
        let store = Arc::new(store_with_balance("alice", 500));
        let request = store
            .create_withdrawal_request(pending_request("alice", 200))
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let id = request.id;
            handles.push(thread::spawn(move || {
                store.approve_withdrawal(id, Utc::now())
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let approved = results.iter().filter(|r| r.is_ok()).count();
        let stale = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::InvalidStateTransition { .. })))
            .count();

        assert_eq!(approved, 1);
        assert_eq!(stale, 7);
        assert_eq!(
            store.balance(&AccountId::new("alice")).unwrap(),
            Money::from(300)
        );
    }

    #[test]
    fn competing_requests_cannot_overdraw() {
        let store = Arc::new(store_with_balance("alice", 100));
        let first = store
            .create_withdrawal_request(pending_request("alice", 60))
            .unwrap();
        let second = store
            .create_withdrawal_request(pending_request("alice", 60))
            .unwrap();

        let mut handles = Vec::new();
        for id in [first.id, second.id] {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store.approve_withdrawal(id, Utc::now())
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let approved = results.iter().filter(|r| r.is_ok()).count();

        assert_eq!(approved, 1);
        assert_eq!(
            store.balance(&AccountId::new("alice")).unwrap(),
            Money::from(40)
        );
    }

    mod properties {
        use proptest::prelude::*;
        use proptest::test_runner::TestCaseError;

        use super::*;

        #[derive(Debug, Clone)]
        enum Op {
            Charge(i64),
            Withdraw(i64),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1i64..=300).prop_map(Op::Charge),
                (1i64..=300).prop_map(Op::Withdraw),
            ]
        }

        fn storage_fail(err: LedgerError) -> TestCaseError {
            TestCaseError::fail(format!("unexpected ledger error: {err:?}"))
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Balance always equals credits minus approved debits, and an
            /// approval never succeeds against a balance below its amount.
            #[test]
            fn balance_equals_credits_minus_approved_debits(
                ops in prop::collection::vec(op_strategy(), 1..40)
            ) {
                let store = InMemoryLedgerStore::new();
                let alice = AccountId::new("alice");
                let mut expected = Money::ZERO;

                for (i, op) in ops.iter().enumerate() {
                    match *op {
                        Op::Charge(amount) => {
                            store
                                .record_charge(charge("alice", amount, &format!("txn-{i}")))
                                .map_err(storage_fail)?;
                            expected += Money::from(amount);
                        }
                        Op::Withdraw(amount) => {
                            let request = store
                                .create_withdrawal_request(pending_request("alice", amount))
                                .map_err(storage_fail)?;
                            match store.approve_withdrawal(request.id, Utc::now()) {
                                Ok(_) => {
                                    prop_assert!(expected >= Money::from(amount));
                                    expected -= Money::from(amount);
                                }
                                Err(LedgerError::InsufficientFunds { .. }) => {
                                    prop_assert!(expected < Money::from(amount));
                                }
                                Err(other) => return Err(storage_fail(other)),
                            }
                        }
                    }
                    prop_assert_eq!(store.balance(&alice).map_err(storage_fail)?, expected);
                }
            }
        }
    }
}
