//! Outcome records delivered to sink subscribers.

use crate::domain::{PostAuctionEvent, TimeMs, UserIds};
use crate::engine::FinishedInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reported outcome of a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStatus {
    Win,
    Loss,
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BidStatus::Win => write!(f, "WIN"),
            BidStatus::Loss => write!(f, "LOSS"),
        }
    }
}

/// What kind of win/loss match was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Win,
    Loss,
    /// A WIN that superseded an already-inferred loss.
    LateWin,
}

/// How certain the matcher is about the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// The exchange said so.
    Guaranteed,
    /// Synthesized from a timeout.
    Inferred,
}

/// One recorded delivery event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignEventRecord {
    pub timestamp: TimeMs,
    pub metadata: serde_json::Value,
}

/// Delivery events recorded on a finished auction, at most one per label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CampaignEvents(pub BTreeMap<String, CampaignEventRecord>);

impl CampaignEvents {
    pub fn has_event(&self, label: &str) -> bool {
        self.0.contains_key(label)
    }

    /// Record the first event for `label`; later ones are duplicates and are
    /// ignored (returns false).
    pub fn set_event(
        &mut self,
        label: impl Into<String>,
        timestamp: TimeMs,
        metadata: serde_json::Value,
    ) -> bool {
        let label = label.into();
        if self.0.contains_key(&label) {
            return false;
        }
        self.0.insert(
            label,
            CampaignEventRecord {
                timestamp,
                metadata,
            },
        );
        true
    }

    pub fn get(&self, label: &str) -> Option<&CampaignEventRecord> {
        self.0.get(label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A reconciled win/loss outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedWinLoss {
    pub kind: MatchKind,
    pub confidence: Confidence,
    pub info: FinishedInfo,
    pub timestamp: TimeMs,
    pub uids: UserIds,
}

/// A delivery event correlated to a finished auction.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedCampaignEvent {
    pub label: String,
    pub info: FinishedInfo,
}

/// Why an event could not be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnmatchedReason {
    /// The auction is still awaiting its win/loss; the event was buffered.
    InFlight,
    /// A record for this (key, label) already exists.
    Duplicate,
    /// No submitted or finished entry for the auction.
    AuctionNotFound,
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchedReason::InFlight => write!(f, "inFlight"),
            UnmatchedReason::Duplicate => write!(f, "duplicate"),
            UnmatchedReason::AuctionNotFound => write!(f, "auctionNotFound"),
        }
    }
}

/// An event the matcher could not correlate, exposed for downstream audit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedEvent {
    pub reason: UnmatchedReason,
    pub event: PostAuctionEvent,
}
