use crate::domain::{AdSpotId, AuctionId, PostAuctionEventType};
use thiserror::Error;

/// Per-event failures raised inside the matcher.
///
/// These never escape the ingestion entry points: the dispatcher records
/// them and moves on to the next event.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("unknown event type {0}")]
    UnknownEventType(PostAuctionEventType),

    #[error("updating empty ad-spot entry in finished map for auction {0}")]
    EmptyAdSpot(AuctionId),

    #[error("bid result for auction {0} spot {1} has no bid request")]
    MissingBidRequest(AuctionId, AdSpotId),

    #[error("bid result for auction {0} spot {1} has no bid response")]
    MissingBidResponse(AuctionId, AdSpotId),

    #[error("bid response for auction {0} spot {1} carries an empty account key")]
    EmptyAccount(AuctionId, AdSpotId),

    #[error("bid response for auction {0} spot {1} had no bid price")]
    NoBidPrice(AuctionId, AdSpotId),

    #[error("submitted non win/loss status to bid result")]
    NotWinLoss,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_key() {
        let err = MatchError::EmptyAdSpot(AuctionId::new("a9"));
        assert!(err.to_string().contains("a9"));

        let err = MatchError::NoBidPrice(AuctionId::new("a1"), AdSpotId::new("s1"));
        assert!(err.to_string().contains("no bid price"));
    }
}
