//! Bid request/response types and the win-cost model.

use crate::domain::{AccountKey, AdSpotId, Amount, Decimal};
use serde::{Deserialize, Serialize};

/// One placement offered inside a bid request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdSpot {
    pub id: AdSpotId,
}

impl AdSpot {
    pub fn new(id: AdSpotId) -> Self {
        AdSpot { id }
    }
}

/// The verbatim request the bidder answered, kept for spot resolution and
/// replay diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BidRequest {
    pub exchange: String,
    pub ad_spots: Vec<AdSpot>,
}

impl BidRequest {
    pub fn new(exchange: impl Into<String>, ad_spots: Vec<AdSpot>) -> Self {
        BidRequest {
            exchange: exchange.into(),
            ad_spots,
        }
    }

    /// Position of the given spot within the request.
    pub fn find_ad_spot_index(&self, ad_spot_id: &AdSpotId) -> Option<usize> {
        self.ad_spots.iter().position(|spot| &spot.id == ad_spot_id)
    }
}

/// The price the agent offered for one spot of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SpotBid {
    pub price: Amount,
}

impl SpotBid {
    pub fn new(price: Amount) -> Self {
        SpotBid { price }
    }
}

/// Frozen bid response: everything the matcher needs to settle the bid once
/// the exchange reports an outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Bid {
    /// Bidding agent that produced the response; part of the bid id.
    pub agent: String,
    /// Account charged for this bid. Empty only on malformed responses.
    pub account: AccountKey,
    /// Highest price the agent authorised.
    pub max_price: Amount,
    /// Agent priority; a zero max price with zero priority is a no-bid.
    pub priority: u32,
    /// Per-spot bids, indexed by the request's spot order.
    pub spot_bids: Vec<SpotBid>,
    /// Model that converts a clearing price into the charged price.
    pub wcm: WinCostModel,
    /// Channels whose visit events should be routed back for this bid.
    pub visit_channels: Vec<String>,
}

impl Bid {
    /// The bid placed on the spot at `index` in the request, if any.
    pub fn bid_for_spot(&self, index: usize) -> Option<&SpotBid> {
        self.spot_bids.get(index)
    }

    /// A response that never bid: zero price, zero priority.
    pub fn is_no_bid(&self) -> bool {
        self.max_price.is_zero() && self.priority == 0
    }
}

/// How the charged price is derived from the clearing price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WinCostKind {
    /// Second-price style: pay what the exchange reports.
    #[default]
    PayWinPrice,
    /// First-price style: pay the price bid on the winning spot.
    PayBidPrice,
    /// Clearing price marked up by a fixed percentage (exchange fees).
    MarkupPct,
}

/// Response-embedded model mapping (spot bid, clearing price) to the price
/// the banker actually commits.
///
/// The win notification's metadata is folded into `data` under the `"win"`
/// key before evaluation, so models can consult exchange-supplied hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WinCostModel {
    pub kind: WinCostKind,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl WinCostModel {
    pub fn new(kind: WinCostKind) -> Self {
        WinCostModel {
            kind,
            data: serde_json::Map::new(),
        }
    }

    /// Record the win notification's metadata as auxiliary model input.
    pub fn set_win_meta(&mut self, meta: serde_json::Value) {
        self.data.insert("win".to_string(), meta);
    }

    /// Charged price for a win at `win_price` on `spot_bid`.
    ///
    /// Falls back to the clearing price when the model's inputs are missing
    /// (no bid stored for the spot, malformed markup), so the banker is
    /// always told a defined amount.
    pub fn evaluate(&self, spot_bid: Option<&SpotBid>, win_price: &Amount) -> Amount {
        match self.kind {
            WinCostKind::PayWinPrice => win_price.clone(),
            WinCostKind::PayBidPrice => spot_bid
                .map(|bid| bid.price.clone())
                .unwrap_or_else(|| win_price.clone()),
            WinCostKind::MarkupPct => {
                let pct = self
                    .data
                    .get("markup_pct")
                    .and_then(|v| v.as_str())
                    .and_then(|s| Decimal::from_str_canonical(s).ok())
                    .unwrap_or_else(Decimal::zero);
                let factor = Decimal::from(1) + pct.percent();
                Amount::new(win_price.value * factor, win_price.currency.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AuctionId;
    use crate::domain::BidId;

    fn usd(v: i64) -> Amount {
        Amount::usd(Decimal::from(v))
    }

    fn request_with_spots(ids: &[&str]) -> BidRequest {
        BidRequest::new(
            "exch",
            ids.iter().map(|id| AdSpot::new(AdSpotId::new(*id))).collect(),
        )
    }

    #[test]
    fn find_ad_spot_index_resolves_position() {
        let req = request_with_spots(&["s0", "s1", "s2"]);
        assert_eq!(req.find_ad_spot_index(&AdSpotId::new("s1")), Some(1));
        assert_eq!(req.find_ad_spot_index(&AdSpotId::new("nope")), None);
    }

    #[test]
    fn no_bid_requires_zero_price_and_priority() {
        let mut bid = Bid::default();
        assert!(bid.is_no_bid());
        bid.priority = 1;
        assert!(!bid.is_no_bid());
        bid.priority = 0;
        bid.max_price = usd(10);
        assert!(!bid.is_no_bid());
    }

    #[test]
    fn pay_win_price_returns_clearing_price() {
        let wcm = WinCostModel::new(WinCostKind::PayWinPrice);
        let spot = SpotBid::new(usd(100));
        assert_eq!(wcm.evaluate(Some(&spot), &usd(80)), usd(80));
    }

    #[test]
    fn pay_bid_price_returns_spot_bid() {
        let wcm = WinCostModel::new(WinCostKind::PayBidPrice);
        let spot = SpotBid::new(usd(100));
        assert_eq!(wcm.evaluate(Some(&spot), &usd(80)), usd(100));
        // Missing spot bid falls back to the clearing price.
        assert_eq!(wcm.evaluate(None, &usd(80)), usd(80));
    }

    #[test]
    fn markup_pct_scales_clearing_price() {
        let mut wcm = WinCostModel::new(WinCostKind::MarkupPct);
        wcm.data
            .insert("markup_pct".to_string(), serde_json::json!("10"));
        let charged = wcm.evaluate(None, &usd(100));
        assert_eq!(charged.value.to_canonical_string(), "110");
    }

    #[test]
    fn win_meta_is_folded_into_model_data() {
        let mut wcm = WinCostModel::default();
        wcm.set_win_meta(serde_json::json!({"deal": "pmp-7"}));
        assert_eq!(wcm.data["win"]["deal"], "pmp-7");
    }

    #[test]
    fn bid_id_uses_agent() {
        let id = BidId::new(&AuctionId::new("a"), &AdSpotId::new("s"), "router.agent");
        assert_eq!(id.as_str(), "a-s-router.agent");
    }
}
