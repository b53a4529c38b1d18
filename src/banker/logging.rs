//! Banker that logs operations and tallies committed spend per account.
//!
//! Suitable for replay runs and diagnostics where no real ledger is wired
//! up: every operation is visible in the logs, and committed totals can be
//! inspected after a run.

use super::Banker;
use crate::domain::{AccountKey, Amount, BidId, LineItems};
use crate::telemetry::Telemetry;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct SpendBook {
    committed: BTreeMap<AccountKey, Amount>,
    operations: u64,
}

/// Ledger-less banker: logs each operation via `tracing` and accumulates
/// per-account committed spend.
#[derive(Debug, Default)]
pub struct LoggingBanker {
    book: Mutex<SpendBook>,
}

impl LoggingBanker {
    pub fn new() -> Self {
        LoggingBanker::default()
    }

    /// Total committed spend for one account.
    pub fn committed(&self, account: &AccountKey) -> Amount {
        self.book
            .lock()
            .expect("spend book lock poisoned")
            .committed
            .get(account)
            .cloned()
            .unwrap_or_else(Amount::zero)
    }

    fn commit(&self, account: &AccountKey, price: &Amount) {
        let mut book = self.book.lock().expect("spend book lock poisoned");
        book.operations += 1;
        let total = book
            .committed
            .entry(account.clone())
            .or_insert_with(Amount::zero);
        match total.checked_add(price) {
            Ok(sum) => *total = sum,
            Err(err) => {
                tracing::warn!(account = %account, price = %price, error = %err,
                    "dropping commit from spend book");
            }
        }
    }
}

impl Banker for LoggingBanker {
    fn attach_bid(&self, account: &AccountKey, bid_id: &BidId, max_price: &Amount) {
        self.book.lock().expect("spend book lock poisoned").operations += 1;
        tracing::info!(account = %account, bid = %bid_id, max_price = %max_price, "attach bid");
    }

    fn win_bid(
        &self,
        account: &AccountKey,
        bid_id: &BidId,
        actual_price: &Amount,
        _line_items: &LineItems,
    ) {
        tracing::info!(account = %account, bid = %bid_id, price = %actual_price, "win bid");
        self.commit(account, actual_price);
    }

    fn force_win_bid(&self, account: &AccountKey, win_price: &Amount, _line_items: &LineItems) {
        tracing::info!(account = %account, price = %win_price, "force win bid");
        self.commit(account, win_price);
    }

    fn cancel_bid(&self, account: &AccountKey, bid_id: &BidId) {
        self.book.lock().expect("spend book lock poisoned").operations += 1;
        tracing::info!(account = %account, bid = %bid_id, "cancel bid");
    }

    fn log_bid_events(&self, telemetry: &dyn Telemetry) {
        let book = self.book.lock().expect("spend book lock poisoned");
        telemetry.record_outcome(book.operations as f64, "banker.operations");
        for (account, total) in &book.committed {
            tracing::debug!(account = %account, committed = %total, "banker spend");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AdSpotId, AuctionId, Decimal};
    use crate::telemetry::StatsRegistry;

    fn usd(v: i64) -> Amount {
        Amount::usd(Decimal::from(v))
    }

    #[test]
    fn commits_accumulate_per_account() {
        let banker = LoggingBanker::new();
        let account = AccountKey::parse("net:camp");
        let bid_id = BidId::new(&AuctionId::new("a1"), &AdSpotId::new("s1"), "agent");

        banker.win_bid(&account, &bid_id, &usd(80), &LineItems::default());
        banker.force_win_bid(&account, &usd(20), &LineItems::default());

        assert_eq!(banker.committed(&account), usd(100));
    }

    #[test]
    fn cancel_commits_nothing() {
        let banker = LoggingBanker::new();
        let account = AccountKey::parse("net");
        let bid_id = BidId::new(&AuctionId::new("a"), &AdSpotId::new("s"), "agent");

        banker.attach_bid(&account, &bid_id, &usd(50));
        banker.cancel_bid(&account, &bid_id);

        assert!(banker.committed(&account).is_zero());
    }

    #[test]
    fn flush_reports_operation_count() {
        let banker = LoggingBanker::new();
        let account = AccountKey::parse("net");
        let bid_id = BidId::new(&AuctionId::new("a"), &AdSpotId::new("s"), "agent");
        banker.attach_bid(&account, &bid_id, &usd(50));

        let stats = StatsRegistry::new();
        banker.log_bid_events(&stats);
        assert_eq!(stats.outcome_values("banker.operations"), vec![1.0]);
    }
}
