//! Domain primitives: AuctionId, AdSpotId, MatchKey, TimeMs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time in milliseconds since Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time in milliseconds since Unix epoch.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// A deadline later than any event the matcher will ever see.
    ///
    /// Sweeping with this value drains every pending entry.
    pub fn far_future() -> Self {
        TimeMs(i64::MAX)
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// This time shifted forward by `ms` milliseconds, saturating.
    pub fn plus_ms(&self, ms: i64) -> Self {
        TimeMs(self.0.saturating_add(ms))
    }

    /// Milliseconds elapsed from `earlier` to `self` (negative if `earlier`
    /// is in the future).
    pub fn ms_since(&self, earlier: TimeMs) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Exchange-assigned auction identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct AuctionId(pub String);

impl AuctionId {
    pub fn new(id: impl Into<String>) -> Self {
        AuctionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AuctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AuctionId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AuctionId::new(s))
    }
}

/// Placement identifier, unique within one auction.
///
/// May be empty in lookup contexts; an empty spot id asks the pending table
/// to complete the key by prefix search over the auction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct AdSpotId(pub String);

impl AdSpotId {
    pub fn new(id: impl Into<String>) -> Self {
        AdSpotId(id.into())
    }

    /// The empty spot id used for prefix lookups.
    pub fn none() -> Self {
        AdSpotId(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AdSpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary key of both pending maps: (auction, ad-spot).
///
/// Ordered lexicographically on (auction_id, ad_spot_id) so that all spots of
/// one auction are contiguous and the smallest spot id sorts first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub auction_id: AuctionId,
    pub ad_spot_id: AdSpotId,
}

impl MatchKey {
    pub fn new(auction_id: AuctionId, ad_spot_id: AdSpotId) -> Self {
        MatchKey {
            auction_id,
            ad_spot_id,
        }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.auction_id, self.ad_spot_id)
    }
}
