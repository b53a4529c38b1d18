//! Arrival-order laws: legal reorderings within the loss window converge to
//! the same settled state, and early buffers replay in FIFO order.

use postmatch::domain::{
    AdSpot, Bid, BidRequest, Decimal, SpotBid, UserIds, WinCostKind, WinCostModel,
};
use postmatch::{
    AccountKey, AdSpotId, Amount, AuctionId, Config, EventMatcher, FinishedInfo, MatchKey,
    MockBanker, NullTelemetry, OutcomeSinks, PostAuctionEvent, PostAuctionEventType,
    SubmittedAuctionEvent, TimeMs,
};
use std::sync::{Arc, Mutex};

fn usd(v: i64) -> Amount {
    Amount::usd(Decimal::from(v))
}

fn submission(auction: &str, spots: &[&str], now: TimeMs) -> SubmittedAuctionEvent {
    SubmittedAuctionEvent {
        auction_id: AuctionId::new(auction),
        ad_spot_id: AdSpotId::new(spots[0]),
        loss_timeout: now.plus_ms(15_000),
        bid_request: BidRequest::new(
            "exch",
            spots.iter().map(|s| AdSpot::new(AdSpotId::new(*s))).collect(),
        ),
        bid_request_str: String::new(),
        bid_request_format: "canonical".to_string(),
        augmentations: serde_json::Value::Null,
        bid_response: Bid {
            agent: "agent".to_string(),
            account: AccountKey::parse("net:camp"),
            max_price: usd(100),
            priority: 1,
            spot_bids: vec![SpotBid::new(usd(100))],
            wcm: WinCostModel::new(WinCostKind::PayWinPrice),
            visit_channels: Vec::new(),
        },
    }
}

fn win(auction: &str, spot: &str, price: i64, at: TimeMs, bid_at: TimeMs) -> PostAuctionEvent {
    PostAuctionEvent {
        kind: PostAuctionEventType::Win,
        auction_id: AuctionId::new(auction),
        ad_spot_id: AdSpotId::new(spot),
        label: String::new(),
        win_price: usd(price),
        timestamp: at,
        bid_timestamp: bid_at,
        metadata: serde_json::Value::Null,
        uids: UserIds::new(),
        account: AccountKey::default(),
    }
}

fn campaign(auction: &str, spot: &str, label: &str, at: TimeMs) -> PostAuctionEvent {
    PostAuctionEvent {
        kind: PostAuctionEventType::CampaignEvent,
        auction_id: AuctionId::new(auction),
        ad_spot_id: AdSpotId::new(spot),
        label: label.to_string(),
        win_price: Amount::zero(),
        timestamp: at,
        bid_timestamp: TimeMs::new(0),
        metadata: serde_json::Value::Null,
        uids: UserIds::new(),
        account: AccountKey::default(),
    }
}

fn quiet_matcher() -> EventMatcher {
    EventMatcher::new(
        Config::default(),
        Arc::new(MockBanker::new()),
        Arc::new(NullTelemetry),
        OutcomeSinks::new(),
    )
}

fn settled(matcher: &EventMatcher, auction: &str, spot: &str) -> FinishedInfo {
    matcher
        .finished_entry(&MatchKey::new(AuctionId::new(auction), AdSpotId::new(spot)))
        .expect("finished entry")
        .clone()
}

#[test]
fn submit_then_win_equals_win_then_submit() {
    let t0 = TimeMs::new(1_000_000);
    let t_win = t0.plus_ms(5_000);

    // Submission first.
    let mut forward = quiet_matcher();
    forward.do_auction_at(submission("a1", &["s1"], t0), t0);
    forward.do_event_at(win("a1", "s1", 80, t_win, t0), t_win);

    // Win first, submission afterwards but within the loss window.
    let mut reordered = quiet_matcher();
    reordered.do_event_at(win("a1", "s1", 80, t_win, t0), t_win);
    reordered.do_auction_at(submission("a1", &["s1"], t0), t_win.plus_ms(1_000));

    assert_eq!(
        settled(&forward, "a1", "s1"),
        settled(&reordered, "a1", "s1")
    );
    assert_eq!(forward.submitted_count(), 0);
    assert_eq!(reordered.submitted_count(), 0);
}

#[test]
fn early_campaign_buffer_replays_in_fifo_order() {
    let t0 = TimeMs::new(1_000_000);
    let t_win = t0.plus_ms(5_000);

    let labels = ["IMPRESSION", "CLICK", "CONVERSION"];

    // Events buffered before the win.
    let order_buffered: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink_order = Arc::clone(&order_buffered);
    let mut buffered = EventMatcher::new(
        Config::default(),
        Arc::new(MockBanker::new()),
        Arc::new(NullTelemetry),
        OutcomeSinks::new()
            .on_matched_campaign_event(move |o| sink_order.lock().unwrap().push(o.label)),
    );
    buffered.do_auction_at(submission("a1", &["s1"], t0), t0);
    for (i, label) in labels.iter().enumerate() {
        buffered.do_event_at(
            campaign("a1", "s1", label, t0.plus_ms(100 + i as i64)),
            t0.plus_ms(100 + i as i64),
        );
    }
    buffered.do_event_at(win("a1", "s1", 80, t_win, t0), t_win);

    // Same events arriving after the win instead.
    let mut direct = quiet_matcher();
    direct.do_auction_at(submission("a1", &["s1"], t0), t0);
    direct.do_event_at(win("a1", "s1", 80, t_win, t0), t_win);
    for (i, label) in labels.iter().enumerate() {
        direct.do_event_at(
            campaign("a1", "s1", label, t0.plus_ms(100 + i as i64)),
            t_win.plus_ms(100 + i as i64),
        );
    }

    assert_eq!(
        *order_buffered.lock().unwrap(),
        labels.iter().map(|s| s.to_string()).collect::<Vec<_>>()
    );
    assert_eq!(
        settled(&buffered, "a1", "s1").campaign_events,
        settled(&direct, "a1", "s1").campaign_events
    );
}

#[test]
fn campaign_event_with_empty_spot_completes_by_prefix() {
    let t0 = TimeMs::new(1_000_000);
    let mut matcher = quiet_matcher();

    matcher.do_auction_at(submission("a1", &["s1", "s2"], t0), t0);
    matcher.do_event_at(win("a1", "s1", 80, t0.plus_ms(10), t0), t0.plus_ms(10));

    // The exchange omitted the spot; the finished entry is found anyway.
    matcher.do_event_at(campaign("a1", "", "CLICK", t0.plus_ms(50)), t0.plus_ms(50));

    let info = settled(&matcher, "a1", "s1");
    assert!(info.campaign_events.has_event("CLICK"));
}

#[test]
fn prefix_completion_prefers_smallest_spot() {
    let t0 = TimeMs::new(1_000_000);
    let mut matcher = quiet_matcher();

    // Two spots of one auction, both settled.
    let mut event = submission("a1", &["s1", "s2"], t0);
    event.ad_spot_id = AdSpotId::new("s2");
    matcher.do_auction_at(event, t0);
    matcher.do_auction_at(submission("a1", &["s1", "s2"], t0), t0);
    matcher.do_event_at(win("a1", "s1", 80, t0.plus_ms(10), t0), t0.plus_ms(10));
    matcher.do_event_at(win("a1", "s2", 70, t0.plus_ms(10), t0), t0.plus_ms(10));

    matcher.do_event_at(campaign("a1", "", "CLICK", t0.plus_ms(50)), t0.plus_ms(50));

    assert!(settled(&matcher, "a1", "s1").campaign_events.has_event("CLICK"));
    assert!(settled(&matcher, "a1", "s2").campaign_events.is_empty());
}

#[test]
fn win_uids_accumulate_across_campaign_events() {
    let t0 = TimeMs::new(1_000_000);
    let mut matcher = quiet_matcher();

    matcher.do_auction_at(submission("a1", &["s1"], t0), t0);

    let mut win_event = win("a1", "s1", 80, t0.plus_ms(10), t0);
    win_event.uids.insert("prov-1");
    matcher.do_event_at(win_event, t0.plus_ms(10));

    let mut click = campaign("a1", "s1", "CLICK", t0.plus_ms(50));
    click.uids.insert("prov-2");
    matcher.do_event_at(click, t0.plus_ms(50));

    let info = settled(&matcher, "a1", "s1");
    assert_eq!(info.uids.len(), 2);
}
