//! Mock banker for testing without a ledger.

use super::Banker;
use crate::domain::{AccountKey, Amount, BidId, LineItems};
use crate::telemetry::Telemetry;
use std::sync::Mutex;

/// One recorded banker operation.
#[derive(Debug, Clone, PartialEq)]
pub enum BankerCall {
    Attach {
        account: AccountKey,
        bid_id: BidId,
        max_price: Amount,
    },
    Win {
        account: AccountKey,
        bid_id: BidId,
        actual_price: Amount,
    },
    ForceWin {
        account: AccountKey,
        win_price: Amount,
    },
    Cancel {
        account: AccountKey,
        bid_id: BidId,
    },
}

/// Banker that records every call for assertion.
#[derive(Debug, Default)]
pub struct MockBanker {
    calls: Mutex<Vec<BankerCall>>,
    flushes: Mutex<u64>,
}

impl MockBanker {
    pub fn new() -> Self {
        MockBanker::default()
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<BankerCall> {
        self.calls.lock().expect("mock banker lock poisoned").clone()
    }

    /// Calls recorded for one account, in order.
    pub fn calls_for(&self, account: &AccountKey) -> Vec<BankerCall> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                BankerCall::Attach { account: a, .. }
                | BankerCall::Win { account: a, .. }
                | BankerCall::ForceWin { account: a, .. }
                | BankerCall::Cancel { account: a, .. } => a == account,
            })
            .collect()
    }

    /// How many times `log_bid_events` ran.
    pub fn flush_count(&self) -> u64 {
        *self.flushes.lock().expect("mock banker lock poisoned")
    }

    fn push(&self, call: BankerCall) {
        self.calls.lock().expect("mock banker lock poisoned").push(call);
    }
}

impl Banker for MockBanker {
    fn attach_bid(&self, account: &AccountKey, bid_id: &BidId, max_price: &Amount) {
        self.push(BankerCall::Attach {
            account: account.clone(),
            bid_id: bid_id.clone(),
            max_price: max_price.clone(),
        });
    }

    fn win_bid(
        &self,
        account: &AccountKey,
        bid_id: &BidId,
        actual_price: &Amount,
        _line_items: &LineItems,
    ) {
        self.push(BankerCall::Win {
            account: account.clone(),
            bid_id: bid_id.clone(),
            actual_price: actual_price.clone(),
        });
    }

    fn force_win_bid(&self, account: &AccountKey, win_price: &Amount, _line_items: &LineItems) {
        self.push(BankerCall::ForceWin {
            account: account.clone(),
            win_price: win_price.clone(),
        });
    }

    fn cancel_bid(&self, account: &AccountKey, bid_id: &BidId) {
        self.push(BankerCall::Cancel {
            account: account.clone(),
            bid_id: bid_id.clone(),
        });
    }

    fn log_bid_events(&self, _telemetry: &dyn Telemetry) {
        *self.flushes.lock().expect("mock banker lock poisoned") += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AdSpotId, AuctionId, Decimal};
    use crate::telemetry::NullTelemetry;

    #[test]
    fn records_calls_in_order() {
        let banker = MockBanker::new();
        let account = AccountKey::parse("net:camp");
        let bid_id = BidId::new(&AuctionId::new("a1"), &AdSpotId::new("s1"), "agent");

        banker.attach_bid(&account, &bid_id, &Amount::usd(Decimal::from(100)));
        banker.cancel_bid(&account, &bid_id);

        let calls = banker.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], BankerCall::Attach { .. }));
        assert!(matches!(calls[1], BankerCall::Cancel { .. }));
    }

    #[test]
    fn filters_calls_by_account() {
        let banker = MockBanker::new();
        let a = AccountKey::parse("a");
        let b = AccountKey::parse("b");

        banker.force_win_bid(&a, &Amount::usd(Decimal::from(1)), &LineItems::default());
        banker.force_win_bid(&b, &Amount::usd(Decimal::from(2)), &LineItems::default());

        assert_eq!(banker.calls_for(&a).len(), 1);
        assert_eq!(banker.calls_for(&b).len(), 1);
    }

    #[test]
    fn counts_flushes() {
        let banker = MockBanker::new();
        banker.log_bid_events(&NullTelemetry);
        banker.log_bid_events(&NullTelemetry);
        assert_eq!(banker.flush_count(), 2);
    }
}
