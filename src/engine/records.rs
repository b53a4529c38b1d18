//! Entries of the submitted and finished maps.

use crate::domain::{
    AdSpotId, Amount, AuctionId, Bid, BidRequest, BidStatus, CampaignEvents, PostAuctionEvent,
    TimeMs, UserIds,
};
use serde_json::Value;

/// A bid awaiting its outcome.
///
/// `bid_request` absent means a win notification raced ahead of the auction
/// submission; such an entry holds at least one buffered early event and
/// never drives a banker commit until the submission arrives.
#[derive(Debug, Clone, Default)]
pub struct SubmissionInfo {
    pub bid_request: Option<BidRequest>,
    pub bid_request_str: String,
    pub bid_request_format: String,
    pub augmentations: Value,
    pub bid: Option<Bid>,
    /// Win/loss notifications that arrived before the auction submission,
    /// replayed in arrival order once it lands.
    pub early_win_events: Vec<PostAuctionEvent>,
    /// Delivery events that arrived before the outcome, replayed in arrival
    /// order after the win/loss settles.
    pub early_campaign_events: Vec<PostAuctionEvent>,
}

impl SubmissionInfo {
    pub fn has_bid_request(&self) -> bool {
        self.bid_request.is_some()
    }
}

/// A settled auction: the authoritative outcome for one (auction, ad-spot).
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedInfo {
    pub auction_id: AuctionId,
    pub ad_spot_id: AdSpotId,
    /// Position of the spot within the bid request; −1 when resolution
    /// failed (the failure is recorded separately).
    pub spot_index: i32,
    pub bid_request: BidRequest,
    pub bid_request_str: String,
    pub bid_request_format: String,
    pub bid: Bid,
    pub reported_status: BidStatus,
    /// When the outcome was recorded; present on every settled entry.
    pub win_time: Option<TimeMs>,
    /// Price actually charged (post win-cost-model); zero on losses.
    pub price: Amount,
    /// Clearing price the exchange reported; zero on losses.
    pub win_price: Amount,
    pub win_meta: Value,
    pub campaign_events: CampaignEvents,
    pub uids: UserIds,
    pub visit_channels: Vec<String>,
}

impl FinishedInfo {
    /// Whether an outcome has been recorded. True for every entry produced
    /// by the win/loss path, including inferred losses.
    pub fn has_win(&self) -> bool {
        self.win_time.is_some()
    }

    /// Record the reported outcome.
    pub fn set_win(
        &mut self,
        timestamp: TimeMs,
        status: BidStatus,
        price: Amount,
        win_price: Amount,
        win_meta: Value,
    ) {
        self.reported_status = status;
        self.win_time = Some(timestamp);
        self.price = price;
        self.win_price = win_price;
        self.win_meta = win_meta;
    }

    /// Overlay a late WIN onto an already-inferred loss. The exchange's
    /// clearing price becomes the charged price; there is no reservation
    /// left to evaluate a cost model against.
    pub fn force_win(&mut self, timestamp: TimeMs, win_price: Amount, win_meta: Value) {
        self.reported_status = BidStatus::Win;
        self.win_time = Some(timestamp);
        self.price = win_price.clone();
        self.win_price = win_price;
        self.win_meta = win_meta;
    }

    /// Union newly-seen user identifiers into the stored set.
    pub fn add_uids(&mut self, uids: &UserIds) {
        self.uids.merge(uids);
    }
}
