pub mod banker;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod service;
pub mod telemetry;

pub use banker::{Banker, BankerCall, LoggingBanker, MockBanker};
pub use config::{Config, ConfigError};
pub use domain::{
    AccountKey, AdSpotId, Amount, AuctionId, BidStatus, Confidence, MatchKey, MatchKind,
    MatchedCampaignEvent, MatchedWinLoss, PostAuctionEvent, PostAuctionEventType,
    SubmittedAuctionEvent, TimeMs, UnmatchedEvent, UnmatchedReason,
};
pub use engine::{EventMatcher, FinishedInfo, OutcomeSinks, PendingTable, SubmissionInfo};
pub use error::MatchError;
pub use service::{MatcherHandle, MatcherService};
pub use telemetry::{NullTelemetry, StatsRegistry, Telemetry};
