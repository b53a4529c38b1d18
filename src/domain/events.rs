//! Inbound event types: auction submissions and post-auction notifications.

use crate::domain::{AccountKey, AdSpotId, Amount, AuctionId, Bid, BidRequest, MatchKey, TimeMs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Set of opaque user identifiers seen on an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserIds(pub BTreeSet<String>);

impl UserIds {
    pub fn new() -> Self {
        UserIds::default()
    }

    pub fn insert(&mut self, uid: impl Into<String>) {
        self.0.insert(uid.into());
    }

    /// Union `other` into this set.
    pub fn merge(&mut self, other: &UserIds) {
        for uid in &other.0 {
            self.0.insert(uid.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Kind tag of a post-auction notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostAuctionEventType {
    Win,
    Loss,
    CampaignEvent,
}

impl fmt::Display for PostAuctionEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostAuctionEventType::Win => write!(f, "WIN"),
            PostAuctionEventType::Loss => write!(f, "LOSS"),
            PostAuctionEventType::CampaignEvent => write!(f, "CAMPAIGN_EVENT"),
        }
    }
}

/// Exchange-delivered notification about a bid: its outcome, or a delivery
/// event attributed to the won impression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostAuctionEvent {
    pub kind: PostAuctionEventType,
    pub auction_id: AuctionId,
    /// May be empty; campaign-event correlation then completes it by prefix.
    #[serde(default)]
    pub ad_spot_id: AdSpotId,
    /// Delivery-event label (`"IMPRESSION"`, `"CLICK"`, ...); empty for
    /// win/loss notifications.
    #[serde(default)]
    pub label: String,
    /// Clearing price on WIN; zero otherwise.
    #[serde(default)]
    pub win_price: Amount,
    /// When the exchange emitted the event.
    pub timestamp: TimeMs,
    /// When the bid was originally submitted; drives the late-event gap.
    #[serde(default)]
    pub bid_timestamp: TimeMs,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub uids: UserIds,
    /// Account hint for orphaned wins; usually empty.
    #[serde(default)]
    pub account: AccountKey,
}

impl PostAuctionEvent {
    pub fn key(&self) -> MatchKey {
        MatchKey::new(self.auction_id.clone(), self.ad_spot_id.clone())
    }
}

/// The auctioneer's notification that a bid was placed and now awaits its
/// outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedAuctionEvent {
    pub auction_id: AuctionId,
    pub ad_spot_id: AdSpotId,
    /// Absolute deadline after which, with no exchange notification, the
    /// submission is settled as an inferred loss.
    pub loss_timeout: TimeMs,
    pub bid_request: BidRequest,
    /// Verbatim request payload for replay and diagnostics.
    #[serde(default)]
    pub bid_request_str: String,
    #[serde(default)]
    pub bid_request_format: String,
    #[serde(default)]
    pub augmentations: serde_json::Value,
    pub bid_response: Bid,
}

impl SubmittedAuctionEvent {
    pub fn key(&self) -> MatchKey {
        MatchKey::new(self.auction_id.clone(), self.ad_spot_id.clone())
    }
}
