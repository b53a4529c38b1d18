//! Domain types for post-auction matching.
//!
//! This module provides:
//! - Lossless price handling via a Decimal wrapper
//! - Identifiers: AuctionId, AdSpotId, MatchKey, TimeMs
//! - Money and accounts: Amount, AccountKey, BidId, LineItems
//! - Bid request/response types and the win-cost model
//! - Inbound event and outbound outcome records

pub mod bid;
pub mod decimal;
pub mod events;
pub mod money;
pub mod outcome;
pub mod primitives;

pub use bid::{AdSpot, Bid, BidRequest, SpotBid, WinCostKind, WinCostModel};
pub use decimal::Decimal;
pub use events::{PostAuctionEvent, PostAuctionEventType, SubmittedAuctionEvent, UserIds};
pub use money::{AccountKey, Amount, BidId, CurrencyCode, LineItem, LineItems, MoneyError};
pub use outcome::{
    BidStatus, CampaignEventRecord, CampaignEvents, Confidence, MatchKind, MatchedCampaignEvent,
    MatchedWinLoss, UnmatchedEvent, UnmatchedReason,
};
pub use primitives::{AdSpotId, AuctionId, MatchKey, TimeMs};
