//! Banker capability: the external bookkeeping authority that reserves,
//! commits, and releases funds per bid.

use crate::domain::{AccountKey, Amount, BidId, LineItems};
use crate::telemetry::Telemetry;
use std::fmt;

pub mod logging;
pub mod mock;

pub use logging::LoggingBanker;
pub use mock::{BankerCall, MockBanker};

/// Financial operations the matcher drives.
///
/// Calls are synchronous from the matcher's view and must return promptly;
/// buffering and ledger consistency are the implementation's concern, as is
/// internal synchronisation (the matcher shares the handle).
pub trait Banker: Send + Sync + fmt::Debug {
    /// Reserve funds for a just-submitted bid.
    fn attach_bid(&self, account: &AccountKey, bid_id: &BidId, max_price: &Amount);

    /// Commit a won bid at its actual price, consuming the reservation.
    fn win_bid(&self, account: &AccountKey, bid_id: &BidId, actual_price: &Amount, line_items: &LineItems);

    /// Commit a win with no live reservation (late or orphaned wins).
    fn force_win_bid(&self, account: &AccountKey, win_price: &Amount, line_items: &LineItems);

    /// Release the reservation of a lost bid.
    fn cancel_bid(&self, account: &AccountKey, bid_id: &BidId);

    /// Flush the internally accumulated bid events; invoked after each
    /// expiry sweep.
    fn log_bid_events(&self, telemetry: &dyn Telemetry);
}
