//! Moves money between two accounts as one atomic double-entry transaction.
//!
//! A transfer writes five rows inside a single database transaction: the
//! transfer record, a debit entry on the source account, a credit entry on
//! the destination account and the two balance updates. Either all five are
//! committed or none are.
//!
//! The balance updates always run in ascending account ID order, whatever
//! the direction of the transfer. Two transfers touching the same pair of
//! accounts therefore lock the account rows in the same order and can never
//! wait on each other in a cycle.

use std::time::Instant;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error, Store,
    account::{Account, AddAccountBalanceParams, add_account_balance},
    database_id::AccountId,
    entry::{CreateEntryParams, Entry, create_entry},
    transfer::{CreateTransferParams, Transfer, create_transfer},
};

/// A request to move `amount` from one account to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    /// The account the money is taken from.
    pub from_account_id: AccountId,
    /// The account the money is given to.
    pub to_account_id: AccountId,
    /// The amount to move, must be positive.
    pub amount: i64,
}

/// Every row written by a committed transfer.
///
/// The accounts and entries are tagged by their role in the request, not by
/// the order in which they were updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferTxResult {
    /// The transfer record.
    pub transfer: Transfer,
    /// The source account after the debit.
    pub from_account: Account,
    /// The destination account after the credit.
    pub to_account: Account,
    /// The debit entry on the source account.
    pub from_entry: Entry,
    /// The credit entry on the destination account.
    pub to_entry: Entry,
}

impl TransferTxParams {
    /// Reject transfers that could never produce a valid ledger.
    ///
    /// # Errors
    /// - [Error::SameAccountTransfer] if both accounts are the same.
    /// - [Error::InvalidTransferAmount] if `amount` is zero or negative.
    pub fn validate(&self) -> Result<(), Error> {
        if self.from_account_id == self.to_account_id {
            return Err(Error::SameAccountTransfer);
        }

        if self.amount <= 0 {
            return Err(Error::InvalidTransferAmount(self.amount));
        }

        Ok(())
    }
}

impl Store {
    /// Move `params.amount` from `params.from_account_id` to
    /// `params.to_account_id`.
    ///
    /// Safe to call concurrently for any pair of accounts. Conflicts are not
    /// retried: callers that want to retry must do so themselves.
    ///
    /// # Errors
    /// - [Error::SameAccountTransfer] or [Error::InvalidTransferAmount] for
    ///   invalid requests, before anything is written.
    /// - [Error::InvalidForeignKey] if either account does not exist.
    /// - [Error::BalanceOutOfRange] if a balance would overflow.
    /// - Any other storage error. In every error case nothing is committed.
    pub fn transfer_tx(&self, params: TransferTxParams) -> Result<TransferTxResult, Error> {
        params.validate()?;

        let result = self.exec_tx(|conn| execute_transfer(params, conn));
        log_outcome(&params, &result);

        result
    }

    /// Like [Store::transfer_tx], but aborts with [Error::DeadlineExceeded]
    /// if the transfer cannot commit before `deadline`.
    ///
    /// # Errors
    /// See [Store::transfer_tx], plus [Error::DeadlineExceeded].
    pub fn transfer_tx_with_deadline(
        &self,
        params: TransferTxParams,
        deadline: Instant,
    ) -> Result<TransferTxResult, Error> {
        params.validate()?;

        let result = self.exec_tx_with_deadline(deadline, |conn| execute_transfer(params, conn));
        log_outcome(&params, &result);

        result
    }
}

fn log_outcome(params: &TransferTxParams, result: &Result<TransferTxResult, Error>) {
    match result {
        Ok(result) => tracing::info!(
            transfer_id = result.transfer.id,
            from_account_id = params.from_account_id,
            to_account_id = params.to_account_id,
            amount = params.amount,
            "committed transfer"
        ),
        Err(error) => tracing::warn!(
            from_account_id = params.from_account_id,
            to_account_id = params.to_account_id,
            amount = params.amount,
            "transfer aborted: {error}"
        ),
    }
}

/// The body of the transfer transaction. `connection` must be bound to an
/// open transaction.
fn execute_transfer(
    params: TransferTxParams,
    connection: &Connection,
) -> Result<TransferTxResult, Error> {
    let transfer = create_transfer(
        CreateTransferParams {
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
        },
        connection,
    )?;

    let from_entry = create_entry(
        CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        },
        connection,
    )?;

    let to_entry = create_entry(
        CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        },
        connection,
    )?;

    let debit = AddAccountBalanceParams {
        id: params.from_account_id,
        amount: -params.amount,
    };
    let credit = AddAccountBalanceParams {
        id: params.to_account_id,
        amount: params.amount,
    };

    let (from_account, to_account) = if params.from_account_id < params.to_account_id {
        let (first, second) = change_balances(debit, credit, connection)?;
        (first, second)
    } else {
        let (first, second) = change_balances(credit, debit, connection)?;
        (second, first)
    };

    Ok(TransferTxResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Apply `first` and then `second`, returning the updated accounts in the
/// same order.
///
/// The caller chooses the order. Every caller must pass the account with the
/// lower ID first.
fn change_balances(
    first: AddAccountBalanceParams,
    second: AddAccountBalanceParams,
    connection: &Connection,
) -> Result<(Account, Account), Error> {
    debug_assert!(first.id < second.id, "balances must be updated in ascending ID order");

    let first_account = add_account_balance(first, connection)?;
    let second_account = add_account_balance(second, connection)?;

    Ok((first_account, second_account))
}

#[cfg(test)]
mod transfer_tx_tests {
    use std::{
        collections::HashSet,
        sync::{Arc, Mutex, mpsc},
        thread,
        time::{Duration, Instant},
    };

    use crate::{
        Error, Store,
        account::{Account, UpdateAccountParams, get_account, update_account},
        entry::{get_entry, list_entries, list_entries_from_account},
        pagination::ListParams,
        test_utils::{create_account_with_balance, create_random_account, get_test_store},
        transfer::{get_transfer, list_transfers},
    };

    use rusqlite::hooks::Action;

    use super::{TransferTxParams, TransferTxResult};

    fn create_accounts(store: &Store, balances: [i64; 2]) -> (Account, Account) {
        store
            .exec(|conn| {
                Ok((
                    create_account_with_balance(conn, balances[0]),
                    create_account_with_balance(conn, balances[1]),
                ))
            })
            .unwrap()
    }

    fn count_rows(store: &Store) -> (usize, usize) {
        store
            .exec(|conn| {
                let everything = ListParams::new(u32::MAX, 0);
                Ok((
                    list_transfers(everything, conn)?.len(),
                    list_entries(everything, conn)?.len(),
                ))
            })
            .unwrap()
    }

    #[track_caller]
    fn assert_transfer_result(
        result: &TransferTxResult,
        from: &Account,
        to: &Account,
        amount: i64,
    ) {
        let transfer = &result.transfer;
        assert_eq!(transfer.from_account_id, from.id);
        assert_eq!(transfer.to_account_id, to.id);
        assert_eq!(transfer.amount, amount);

        assert_eq!(result.from_entry.account_id, from.id);
        assert_eq!(result.from_entry.amount, -amount);
        assert_eq!(result.to_entry.account_id, to.id);
        assert_eq!(result.to_entry.amount, amount);

        assert_eq!(result.from_account.id, from.id);
        assert_eq!(result.to_account.id, to.id);
    }

    #[test]
    fn moves_money_between_accounts() {
        let store = get_test_store();
        let (from, to) = create_accounts(&store, [100, 50]);

        let result = store
            .transfer_tx(TransferTxParams {
                from_account_id: from.id,
                to_account_id: to.id,
                amount: 30,
            })
            .unwrap();

        assert_transfer_result(&result, &from, &to, 30);
        assert_eq!(result.from_account.balance, 70);
        assert_eq!(result.to_account.balance, 80);
    }

    #[test]
    fn attributes_accounts_by_role_when_source_has_higher_id() {
        let store = get_test_store();
        let (lower, higher) = create_accounts(&store, [100, 50]);

        let result = store
            .transfer_tx(TransferTxParams {
                from_account_id: higher.id,
                to_account_id: lower.id,
                amount: 20,
            })
            .unwrap();

        assert_transfer_result(&result, &higher, &lower, 20);
        assert_eq!(result.from_account.balance, 30);
        assert_eq!(result.to_account.balance, 120);
    }

    #[test]
    fn committed_rows_can_be_read_back() {
        let store = get_test_store();
        let (from, to) = create_accounts(&store, [100, 50]);

        let result = store
            .transfer_tx(TransferTxParams {
                from_account_id: from.id,
                to_account_id: to.id,
                amount: 10,
            })
            .unwrap();

        store
            .exec(|conn| {
                assert_eq!(get_transfer(result.transfer.id, conn)?, result.transfer);
                assert_eq!(get_entry(result.from_entry.id, conn)?, result.from_entry);
                assert_eq!(get_entry(result.to_entry.id, conn)?, result.to_entry);
                assert_eq!(get_account(from.id, conn)?, result.from_account);
                assert_eq!(get_account(to.id, conn)?, result.to_account);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn balance_equals_opening_balance_plus_entries() {
        let store = get_test_store();
        let (a, b) = create_accounts(&store, [500, 500]);
        for (from, to, amount) in [(a.id, b.id, 7), (b.id, a.id, 3), (a.id, b.id, 11)] {
            store
                .transfer_tx(TransferTxParams {
                    from_account_id: from,
                    to_account_id: to,
                    amount,
                })
                .unwrap();
        }

        store
            .exec(|conn| {
                for account in [&a, &b] {
                    let entries =
                        list_entries_from_account(account.id, ListParams::new(100, 0), conn)?;
                    let sum: i64 = entries.iter().map(|entry| entry.amount).sum();
                    assert_eq!(get_account(account.id, conn)?.balance, account.balance + sum);
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn rejects_transfer_to_same_account() {
        let store = get_test_store();
        let account = store.exec(|conn| Ok(create_random_account(conn))).unwrap();

        let result = store.transfer_tx(TransferTxParams {
            from_account_id: account.id,
            to_account_id: account.id,
            amount: 10,
        });

        assert_eq!(result, Err(Error::SameAccountTransfer));
        assert_eq!(count_rows(&store), (0, 0));
        assert_eq!(
            store.exec(|conn| get_account(account.id, conn)).unwrap(),
            account
        );
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let store = get_test_store();
        let (from, to) = create_accounts(&store, [100, 50]);

        for amount in [0, -5] {
            let result = store.transfer_tx(TransferTxParams {
                from_account_id: from.id,
                to_account_id: to.id,
                amount,
            });

            assert_eq!(result, Err(Error::InvalidTransferAmount(amount)));
        }
        assert_eq!(count_rows(&store), (0, 0));
    }

    #[test]
    fn leaves_nothing_behind_for_unknown_account() {
        let store = get_test_store();
        let from = store.exec(|conn| Ok(create_random_account(conn))).unwrap();

        let result = store.transfer_tx(TransferTxParams {
            from_account_id: from.id,
            to_account_id: from.id + 1000,
            amount: 10,
        });

        assert_eq!(result, Err(Error::InvalidForeignKey));
        assert_eq!(count_rows(&store), (0, 0));
        assert_eq!(store.exec(|conn| get_account(from.id, conn)).unwrap(), from);
    }

    #[test]
    fn leaves_nothing_behind_when_balance_update_fails() {
        let store = get_test_store();
        let (from, to) = create_accounts(&store, [100, 0]);
        // The credit on `to` is the second update and overflows after the
        // debit on `from` has already been applied.
        let to = store
            .exec(|conn| {
                update_account(
                    UpdateAccountParams {
                        id: to.id,
                        balance: i64::MAX,
                    },
                    conn,
                )
            })
            .unwrap();

        let result = store.transfer_tx(TransferTxParams {
            from_account_id: from.id,
            to_account_id: to.id,
            amount: 5,
        });

        assert_eq!(result, Err(Error::BalanceOutOfRange));
        assert_eq!(count_rows(&store), (0, 0));
        assert_eq!(store.exec(|conn| get_account(from.id, conn)).unwrap(), from);
        assert_eq!(store.exec(|conn| get_account(to.id, conn)).unwrap(), to);
    }

    #[test]
    fn expired_deadline_writes_nothing() {
        let store = get_test_store();
        let (from, to) = create_accounts(&store, [100, 50]);

        let result = store.transfer_tx_with_deadline(
            TransferTxParams {
                from_account_id: from.id,
                to_account_id: to.id,
                amount: 10,
            },
            Instant::now(),
        );

        assert_eq!(result, Err(Error::DeadlineExceeded));
        assert_eq!(count_rows(&store), (0, 0));
    }

    #[test]
    fn commits_before_deadline() {
        let store = get_test_store();
        let (from, to) = create_accounts(&store, [100, 50]);

        let result = store
            .transfer_tx_with_deadline(
                TransferTxParams {
                    from_account_id: from.id,
                    to_account_id: to.id,
                    amount: 10,
                },
                Instant::now() + Duration::from_secs(10),
            )
            .unwrap();

        assert_eq!(result.from_account.balance, 90);
        assert_eq!(result.to_account.balance, 60);
    }

    #[test]
    fn concurrent_transfers_do_not_lose_updates() {
        let store = get_test_store();
        let (from, to) = create_accounts(&store, [100, 50]);
        let amount = 5;
        let n = 5;

        let (sender, receiver) = mpsc::channel();
        for _ in 0..n {
            let store = store.clone();
            let sender = sender.clone();
            thread::spawn(move || {
                let result = store.transfer_tx(TransferTxParams {
                    from_account_id: from.id,
                    to_account_id: to.id,
                    amount,
                });
                sender.send(result).unwrap();
            });
        }
        drop(sender);

        let mut seen = HashSet::new();
        for result in receiver.iter().take(n) {
            let result = result.unwrap();
            assert_transfer_result(&result, &from, &to, amount);

            let diff_from = from.balance - result.from_account.balance;
            let diff_to = result.to_account.balance - to.balance;
            assert_eq!(diff_from, diff_to);
            assert!(diff_from > 0);
            assert_eq!(diff_from % amount, 0);

            let k = diff_from / amount;
            assert!((1..=n as i64).contains(&k), "got k = {k}");
            assert!(seen.insert(k), "k = {k} seen twice, an update was lost");
        }
        assert_eq!(seen.len(), n);

        let (from_after, to_after) = store
            .exec(|conn| Ok((get_account(from.id, conn)?, get_account(to.id, conn)?)))
            .unwrap();
        assert_eq!(from_after.balance, 75);
        assert_eq!(to_after.balance, 75);

        let (transfers, entries) = store
            .exec(|conn| {
                let everything = ListParams::new(100, 0);
                Ok((list_transfers(everything, conn)?, list_entries(everything, conn)?))
            })
            .unwrap();
        assert_eq!(transfers.len(), n);
        assert_eq!(entries.len(), 2 * n);
        assert_eq!(entries.iter().filter(|e| e.amount == -amount).count(), n);
        assert_eq!(entries.iter().filter(|e| e.amount == amount).count(), n);
    }

    // The store runs one transaction at a time, so this only checks that the
    // balances net out. `balance_updates_run_in_ascending_id_order` covers the
    // update order.
    #[test]
    fn concurrent_transfers_in_both_directions_do_not_deadlock() {
        let store = get_test_store();
        let (account1, account2) = create_accounts(&store, [1000, 1000]);
        let amount = 10;
        let n = 10;

        let handles: Vec<_> = (0..n)
            .map(|i| {
                let store = store.clone();
                let (from_account_id, to_account_id) = if i % 2 == 1 {
                    (account2.id, account1.id)
                } else {
                    (account1.id, account2.id)
                };

                thread::spawn(move || {
                    store.transfer_tx(TransferTxParams {
                        from_account_id,
                        to_account_id,
                        amount,
                    })
                })
            })
            .collect();

        for handle in handles {
            let result = handle.join().expect("transfer thread panicked");
            assert!(result.is_ok(), "transfer failed: {result:?}");
        }

        let (after1, after2) = store
            .exec(|conn| {
                Ok((
                    get_account(account1.id, conn)?,
                    get_account(account2.id, conn)?,
                ))
            })
            .unwrap();
        assert_eq!(after1.balance, account1.balance);
        assert_eq!(after2.balance, account2.balance);
    }

    #[test]
    fn balance_updates_run_in_ascending_id_order() {
        let store = get_test_store();
        let (account1, account2) = create_accounts(&store, [100, 100]);
        let updated_ids = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&updated_ids);
        store
            .exec(|conn| {
                conn.update_hook(Some(
                    move |action: Action, _db: &str, table: &str, row_id: i64| {
                        if matches!(action, Action::SQLITE_UPDATE) && table == "accounts" {
                            recorder.lock().unwrap().push(row_id);
                        }
                    },
                ))?;
                Ok(())
            })
            .unwrap();

        store
            .transfer_tx(TransferTxParams {
                from_account_id: account2.id,
                to_account_id: account1.id,
                amount: 10,
            })
            .unwrap();
        store
            .transfer_tx(TransferTxParams {
                from_account_id: account1.id,
                to_account_id: account2.id,
                amount: 10,
            })
            .unwrap();

        assert_eq!(
            *updated_ids.lock().unwrap(),
            vec![account1.id, account2.id, account1.id, account2.id]
        );
    }
}
