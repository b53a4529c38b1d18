//! The event matcher: reconciles win/loss notifications and delivery events
//! against submitted auctions, and drives the banker.

use crate::banker::Banker;
use crate::config::Config;
use crate::domain::{
    AccountKey, AdSpotId, Amount, AuctionId, BidId, BidStatus, Confidence, LineItems, MatchKey,
    MatchKind, MatchedCampaignEvent, MatchedWinLoss, PostAuctionEvent, PostAuctionEventType,
    SubmittedAuctionEvent, TimeMs, UnmatchedEvent, UnmatchedReason, UserIds,
};
use crate::engine::pending::PendingTable;
use crate::engine::records::{FinishedInfo, SubmissionInfo};
use crate::error::MatchError;
use crate::telemetry::Telemetry;
use serde_json::Value;
use std::sync::Arc;

/// Optional outcome subscribers, injected at construction.
///
/// An absent sink drops its outcomes silently. Callbacks run on the matcher
/// thread and must not block.
#[derive(Default)]
pub struct OutcomeSinks {
    on_matched_win_loss: Option<Box<dyn FnMut(MatchedWinLoss) + Send>>,
    on_matched_campaign_event: Option<Box<dyn FnMut(MatchedCampaignEvent) + Send>>,
    on_unmatched_event: Option<Box<dyn FnMut(UnmatchedEvent) + Send>>,
}

impl OutcomeSinks {
    pub fn new() -> Self {
        OutcomeSinks::default()
    }

    pub fn on_matched_win_loss(mut self, f: impl FnMut(MatchedWinLoss) + Send + 'static) -> Self {
        self.on_matched_win_loss = Some(Box::new(f));
        self
    }

    pub fn on_matched_campaign_event(
        mut self,
        f: impl FnMut(MatchedCampaignEvent) + Send + 'static,
    ) -> Self {
        self.on_matched_campaign_event = Some(Box::new(f));
        self
    }

    pub fn on_unmatched_event(mut self, f: impl FnMut(UnmatchedEvent) + Send + 'static) -> Self {
        self.on_unmatched_event = Some(Box::new(f));
        self
    }
}

/// Running totals kept by the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatcherStats {
    pub num_wins: u64,
    pub num_losses: u64,
    pub num_campaign_events: u64,
}

/// Releases a bid reservation on drop unless the commit path disarmed it.
///
/// Exactly one of `win_bid` / `cancel_bid` reaches the banker per settled
/// submission, on every exit path including early error returns.
struct BidReleaseGuard {
    banker: Arc<dyn Banker>,
    account: AccountKey,
    bid_id: BidId,
    armed: bool,
}

impl BidReleaseGuard {
    fn new(banker: Arc<dyn Banker>, account: AccountKey, bid_id: BidId) -> Self {
        BidReleaseGuard {
            banker,
            account,
            bid_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for BidReleaseGuard {
    fn drop(&mut self) {
        if self.armed {
            self.banker.cancel_bid(&self.account, &self.bid_id);
        }
    }
}

/// Resolve a lookup key against a pending table, completing an empty spot id
/// by prefix search over the auction.
fn find_auction<V>(
    table: &PendingTable<V>,
    auction_id: &AuctionId,
    ad_spot_id: &AdSpotId,
) -> Option<MatchKey> {
    if ad_spot_id.is_empty() {
        table.complete_prefix(auction_id)
    } else {
        let key = MatchKey::new(auction_id.clone(), ad_spot_id.clone());
        table.contains(&key).then_some(key)
    }
}

/// Correlates auction submissions, win/loss notifications, and campaign
/// delivery events into one authoritative outcome per (auction, ad-spot).
///
/// Single-threaded cooperative: the host feeds `do_auction`, `do_event`, and
/// `check_expired_auctions` serially. The `_at` variants take an explicit
/// clock for replay and tests.
pub struct EventMatcher {
    config: Config,
    submitted: PendingTable<SubmissionInfo>,
    finished: PendingTable<FinishedInfo>,
    banker: Arc<dyn Banker>,
    telemetry: Arc<dyn Telemetry>,
    sinks: OutcomeSinks,
    stats: MatcherStats,
}

impl std::fmt::Debug for EventMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventMatcher")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl EventMatcher {
    pub fn new(
        config: Config,
        banker: Arc<dyn Banker>,
        telemetry: Arc<dyn Telemetry>,
        sinks: OutcomeSinks,
    ) -> Self {
        EventMatcher {
            config,
            submitted: PendingTable::new(),
            finished: PendingTable::new(),
            banker,
            telemetry,
            sinks,
            stats: MatcherStats::default(),
        }
    }

    pub fn stats(&self) -> MatcherStats {
        self.stats
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.len()
    }

    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    /// The settled outcome for a key, if any.
    pub fn finished_entry(&self, key: &MatchKey) -> Option<&FinishedInfo> {
        self.finished.get(key)
    }

    /// Ingest the auctioneer's notification that a bid was placed.
    pub fn do_auction(&mut self, event: SubmittedAuctionEvent) {
        self.do_auction_at(event, TimeMs::now());
    }

    /// `do_auction` with an explicit clock.
    pub fn do_auction_at(&mut self, event: SubmittedAuctionEvent, now: TimeMs) {
        let auction_id = event.auction_id.clone();
        if let Err(err) = self.handle_auction(event, now) {
            tracing::error!(auction = %auction_id, error = %err, "error handling auction");
            self.telemetry.record_error("doAuction", &err.to_string());
        }
    }

    /// Sole entry point for post-auction events. Routes by kind; a failing
    /// event is recorded and dropped so one bad event cannot poison the
    /// stream.
    pub fn do_event(&mut self, event: PostAuctionEvent) {
        self.do_event_at(event, TimeMs::now());
    }

    /// `do_event` with an explicit clock.
    pub fn do_event_at(&mut self, event: PostAuctionEvent, now: TimeMs) {
        let kind = event.kind;
        let result = match kind {
            PostAuctionEventType::Win | PostAuctionEventType::Loss => {
                self.do_win_loss(event, now, false)
            }
            PostAuctionEventType::CampaignEvent => self.do_campaign_event(event),
        };
        if let Err(err) = result {
            tracing::error!(kind = %kind, error = %err, "error handling post-auction event");
            self.telemetry.record_error("doEvent", &err.to_string());
        }
    }

    /// Drain entries past their deadline, settling timed-out submissions as
    /// inferred losses.
    pub fn check_expired_auctions(&mut self) {
        self.check_expired_auctions_at(TimeMs::now());
    }

    /// `check_expired_auctions` with an explicit clock. Sweeping with
    /// `TimeMs::far_future()` drains everything.
    pub fn check_expired_auctions_at(&mut self, now: TimeMs) {
        tracing::debug!(
            submitted = self.submitted.len(),
            "checking submitted auctions for inferred loss"
        );

        let mut inferred: Vec<(MatchKey, SubmissionInfo)> = Vec::new();
        let telemetry = Arc::clone(&self.telemetry);
        self.submitted.expire(now, |key, info| {
            telemetry.record_hit("submittedAuctionExpiry");
            if !info.has_bid_request() {
                telemetry.record_hit("submittedAuctionExpiryWithoutBid");
                return None;
            }
            inferred.push((key.clone(), info.clone()));
            None
        });

        for (key, info) in inferred {
            if let Err(err) = self.do_bid_result(
                &key.auction_id,
                &key.ad_spot_id,
                info,
                Amount::zero(),
                now,
                BidStatus::Loss,
                Confidence::Inferred,
                Value::Null,
                UserIds::new(),
                now,
            ) {
                tracing::error!(key = %key, error = %err, "error handling expired loss auction");
                self.telemetry
                    .record_error("checkExpiredAuctions.loss", &err.to_string());
            }
        }

        tracing::debug!(
            finished = self.finished.len(),
            "checking finished auctions for expiry"
        );
        let telemetry = Arc::clone(&self.telemetry);
        self.finished.expire(now, |_, _| {
            telemetry.record_hit("finishedAuctionExpiry");
            None
        });

        self.banker.log_bid_events(self.telemetry.as_ref());
    }

    fn handle_auction(
        &mut self,
        event: SubmittedAuctionEvent,
        now: TimeMs,
    ) -> Result<(), MatchError> {
        self.telemetry.record_hit("processedAuction");

        let key = event.key();

        // A win may already have raced in and parked an empty entry here;
        // fold its buffered events into the fresh submission.
        let mut submission = SubmissionInfo::default();
        let mut early_win_events = Vec::new();
        if let Some(prior) = self.submitted.pop(&key) {
            submission = prior;
            early_win_events = std::mem::take(&mut submission.early_win_events);
            self.telemetry.record_hit("auctionAlreadySubmitted");
        }

        submission.bid_request = Some(event.bid_request);
        submission.bid_request_str = event.bid_request_str;
        submission.bid_request_format = event.bid_request_format;
        submission.augmentations = event.augmentations;
        submission.bid = Some(event.bid_response.clone());

        self.submitted.insert(key, submission, event.loss_timeout);

        let bid_id = BidId::new(&event.auction_id, &event.ad_spot_id, &event.bid_response.agent);
        self.banker.attach_bid(
            &event.bid_response.account,
            &bid_id,
            &event.bid_response.max_price,
        );

        for early in early_win_events {
            self.telemetry.record_hit("replayedEarlyWinEvent");
            self.do_win_loss(early, now, true)?;
        }

        Ok(())
    }

    fn do_win_loss(
        &mut self,
        event: PostAuctionEvent,
        now: TimeMs,
        is_replay: bool,
    ) -> Result<(), MatchError> {
        let status = match event.kind {
            PostAuctionEventType::Win => {
                self.stats.num_wins += 1;
                self.telemetry.record_hit("processedWin");
                BidStatus::Win
            }
            PostAuctionEventType::Loss => {
                self.stats.num_losses += 1;
                self.telemetry.record_hit("processedLoss");
                BidStatus::Loss
            }
            PostAuctionEventType::CampaignEvent => return Err(MatchError::NotWinLoss),
        };

        let kind = event.kind;
        if is_replay {
            self.telemetry
                .record_hit(&format!("bidResult.{}.messagesReplayed", kind));
        } else {
            self.telemetry
                .record_hit(&format!("bidResult.{}.messagesReceived", kind));
        }

        let gap_ms = now.ms_since(event.bid_timestamp) as f64;
        let key = event.key();

        // The auction may already be finished: either a prior notification
        // landed (this one is a duplicate), or no notification came and a
        // loss was inferred at timeout.
        if let Some(entry) = self.finished.get(&key) {
            let mut info = entry.clone();

            if info.has_win() && status == info.reported_status {
                if event.win_price == info.win_price {
                    self.telemetry
                        .record_hit(&format!("bidResult.{}.duplicate", kind));
                } else {
                    self.telemetry
                        .record_hit(&format!("bidResult.{}.duplicateWithDifferentPrice", kind));
                }
                return Ok(());
            }

            self.telemetry
                .record_hit(&format!("bidResult.{}.auctionAlreadyFinished", kind));
            self.telemetry.record_outcome(
                gap_ms,
                &format!("bidResult.{}.alreadyFinishedTimeSinceBidSubmittedMs", kind),
            );

            if event.kind == PostAuctionEventType::Win {
                // Late win superseding an inferred loss; there is no
                // reservation left, so the banker commits without one.
                self.banker.force_win_bid(
                    &info.bid.account,
                    &event.win_price,
                    &LineItems::default(),
                );

                info.force_win(event.timestamp, event.win_price.clone(), event.metadata.clone());
                self.finished.update(&key, info.clone());

                self.emit_win_loss(MatchedWinLoss {
                    kind: MatchKind::LateWin,
                    confidence: Confidence::Guaranteed,
                    info,
                    timestamp: event.timestamp,
                    uids: event.uids.clone(),
                });

                self.telemetry
                    .record_hit(&format!("bidResult.{}.winAfterLossAssumed", kind));
                self.telemetry.record_outcome(
                    event.win_price.value.to_f64(),
                    &format!(
                        "bidResult.{}.winAfterLossAssumedAmount.{}",
                        kind, event.win_price.currency
                    ),
                );
            }

            return Ok(());
        }

        let loss_timeout_ms = self.config.loss_timeout_ms;

        let mut info = match self.submitted.pop(&key) {
            Some(info) => info,
            None => {
                // Not submitted. Either the win raced ahead of the auction
                // notification, or it is so late the auction is gone.
                if gap_ms < loss_timeout_ms as f64 {
                    self.telemetry
                        .record_hit(&format!("bidResult.{}.noBidSubmitted", kind));

                    let mut info = SubmissionInfo::default();
                    info.early_win_events.push(event);
                    self.submitted.insert(key, info, now.plus_ms(loss_timeout_ms));
                    return Ok(());
                }

                tracing::warn!(
                    key = %key,
                    gap_ms,
                    account = %event.account,
                    "very late win/loss for unknown auction"
                );
                self.telemetry
                    .record_hit(&format!("bidResult.{}.notInSubmitted", kind));
                self.telemetry.record_outcome(
                    gap_ms,
                    &format!("bidResult.{}.notInSubmittedTimeSinceBidSubmittedMs", kind),
                );

                // Reconcile the funds anyway when we know whose they are.
                if !event.account.is_empty() {
                    self.banker.force_win_bid(
                        &event.account,
                        &event.win_price,
                        &LineItems::default(),
                    );
                }
                return Ok(());
            }
        };

        if !info.has_bid_request() {
            // Doubled up on a win without the auction having arrived yet.
            info.early_win_events.push(event);
            self.submitted.insert(key, info, now.plus_ms(loss_timeout_ms));
            return Ok(());
        }

        self.telemetry
            .record_hit(&format!("bidResult.{}.delivered", kind));

        let confidence = match status {
            BidStatus::Win => Confidence::Guaranteed,
            BidStatus::Loss => Confidence::Inferred,
        };

        let early_campaign_events = std::mem::take(&mut info.early_campaign_events);

        self.do_bid_result(
            &key.auction_id,
            &key.ad_spot_id,
            info,
            event.win_price,
            event.timestamp,
            status,
            confidence,
            event.metadata,
            event.uids,
            now,
        )?;

        for early in early_campaign_events {
            self.do_campaign_event(early)?;
        }

        Ok(())
    }

    fn do_campaign_event(&mut self, event: PostAuctionEvent) -> Result<(), MatchError> {
        if event.kind != PostAuctionEventType::CampaignEvent {
            return Err(MatchError::UnknownEventType(event.kind));
        }

        let label = event.label.clone();
        self.telemetry
            .record_hit(&format!("delivery.EVENT.{}.messagesReceived", label));

        // Still awaiting the win/loss: park the event on the submission and
        // let the outcome path replay it.
        if let Some(key) = find_auction(&self.submitted, &event.auction_id, &event.ad_spot_id) {
            self.telemetry
                .record_hit(&format!("delivery.{}.stillInFlight", label));
            self.telemetry.record_error(
                &format!("doCampaignEvent.auctionNotWon{}", label),
                "message for auction that's not won",
            );
            self.emit_unmatched(UnmatchedEvent {
                reason: UnmatchedReason::InFlight,
                event: event.clone(),
            });

            if let Some(entry) = self.submitted.get(&key) {
                let mut info = entry.clone();
                info.early_campaign_events.push(event);
                self.submitted.update(&key, info);
            }
            return Ok(());
        }

        if let Some(key) = find_auction(&self.finished, &event.auction_id, &event.ad_spot_id) {
            let Some(entry) = self.finished.get(&key) else {
                return Ok(());
            };

            if entry.campaign_events.has_event(&label) {
                self.telemetry
                    .record_hit(&format!("delivery.{}.duplicate", label));
                self.telemetry.record_error(
                    &format!("doCampaignEvent.duplicate{}", label),
                    "message duplicated",
                );
                self.emit_unmatched(UnmatchedEvent {
                    reason: UnmatchedReason::Duplicate,
                    event,
                });
                return Ok(());
            }

            let mut info = entry.clone();
            info.campaign_events
                .set_event(label.clone(), event.timestamp, event.metadata.clone());
            self.stats.num_campaign_events += 1;

            self.telemetry.record_hit(&format!(
                "delivery.{}.account.{}.matched",
                label,
                info.bid.account.join('.')
            ));

            if key.ad_spot_id.is_empty() {
                return Err(MatchError::EmptyAdSpot(key.auction_id.clone()));
            }

            // Keep the user-id index current so visits can be routed.
            info.add_uids(&event.uids);

            self.finished.update(&key, info.clone());
            self.emit_campaign_event(MatchedCampaignEvent { label, info });
            return Ok(());
        }

        // A delivery event before any notion of the auction. Rare outside
        // transport replays; surfaced for downstream audit.
        self.telemetry
            .record_hit(&format!("delivery.{}.auctionNotFound", label));
        self.telemetry.record_error(
            &format!("doCampaignEvent.auctionNotFound{}", label),
            "auction not found for delivery message",
        );
        self.emit_unmatched(UnmatchedEvent {
            reason: UnmatchedReason::AuctionNotFound,
            event,
        });
        Ok(())
    }

    /// Settle one submission: tell the banker, move the entry to `finished`,
    /// and emit the outcome.
    #[allow(clippy::too_many_arguments)]
    fn do_bid_result(
        &mut self,
        auction_id: &AuctionId,
        ad_spot_id: &AdSpotId,
        submission: SubmissionInfo,
        win_price: Amount,
        timestamp: TimeMs,
        status: BidStatus,
        confidence: Confidence,
        win_meta: Value,
        uids: UserIds,
        now: TimeMs,
    ) -> Result<(), MatchError> {
        if ad_spot_id.is_empty() {
            return Err(MatchError::EmptyAdSpot(auction_id.clone()));
        }

        let Some(bid_request) = submission.bid_request else {
            return Err(MatchError::MissingBidRequest(
                auction_id.clone(),
                ad_spot_id.clone(),
            ));
        };
        let Some(bid) = submission.bid else {
            return Err(MatchError::MissingBidResponse(
                auction_id.clone(),
                ad_spot_id.clone(),
            ));
        };

        let spot_index = match bid_request.find_ad_spot_index(ad_spot_id) {
            Some(index) => index as i32,
            None => {
                self.telemetry.record_error(
                    "doBidResult.adSpotIdNotFound",
                    &format!(
                        "adspot {} not found in auction {}",
                        ad_spot_id, submission.bid_request_str
                    ),
                );
                -1
            }
        };

        let account = bid.account.clone();
        if account.is_empty() {
            return Err(MatchError::EmptyAccount(
                auction_id.clone(),
                ad_spot_id.clone(),
            ));
        }

        if win_price.exceeds(&bid.max_price) {
            self.telemetry.record_error(
                "doBidResult.winPriceExceedsBidPrice",
                &format!(
                    "win price {} exceeds bid price {}",
                    win_price, bid.max_price
                ),
            );
        }

        let bid_id = BidId::new(auction_id, ad_spot_id, &bid.agent);

        // Make sure we account for the bid no matter what: unless a win
        // commits below, the reservation is released when the guard drops.
        let mut release = BidReleaseGuard::new(
            Arc::clone(&self.banker),
            account.clone(),
            bid_id.clone(),
        );

        if bid.is_no_bid() {
            return Err(MatchError::NoBidPrice(
                auction_id.clone(),
                ad_spot_id.clone(),
            ));
        }

        let price = match status {
            BidStatus::Win => {
                let mut wcm = bid.wcm.clone();
                wcm.set_win_meta(win_meta.clone());
                let spot_bid = usize::try_from(spot_index)
                    .ok()
                    .and_then(|index| bid.bid_for_spot(index));
                let price = wcm.evaluate(spot_bid, &win_price);

                self.telemetry.record_outcome(
                    win_price.value.to_f64(),
                    &format!(
                        "accounts.{}.winPrice.{}",
                        account.join('.'),
                        win_price.currency
                    ),
                );
                self.telemetry.record_outcome(
                    price.value.to_f64(),
                    &format!(
                        "accounts.{}.winCostPrice.{}",
                        account.join('.'),
                        price.currency
                    ),
                );

                release.disarm();
                self.banker
                    .win_bid(&account, &bid_id, &price, &LineItems::default());
                price
            }
            BidStatus::Loss => win_price.clone(),
        };

        let mut info = FinishedInfo {
            auction_id: auction_id.clone(),
            ad_spot_id: ad_spot_id.clone(),
            spot_index,
            bid_request,
            bid_request_str: submission.bid_request_str,
            bid_request_format: submission.bid_request_format,
            visit_channels: bid.visit_channels.clone(),
            bid,
            reported_status: status,
            win_time: None,
            price: Amount::zero(),
            win_price: Amount::zero(),
            win_meta: Value::Null,
            campaign_events: Default::default(),
            uids: UserIds::new(),
        };
        info.set_win(timestamp, status, price, win_price, win_meta);
        info.add_uids(&uids);

        self.emit_win_loss(MatchedWinLoss {
            kind: match status {
                BidStatus::Win => MatchKind::Win,
                BidStatus::Loss => MatchKind::Loss,
            },
            confidence,
            info: info.clone(),
            timestamp,
            uids,
        });

        let expiry_ms = match status {
            BidStatus::Win => self.config.win_timeout_ms,
            BidStatus::Loss => self.config.auction_timeout_ms,
        };
        self.finished.insert(
            MatchKey::new(auction_id.clone(), ad_spot_id.clone()),
            info,
            now.plus_ms(expiry_ms),
        );

        Ok(())
    }

    fn emit_win_loss(&mut self, outcome: MatchedWinLoss) {
        if let Some(sink) = self.sinks.on_matched_win_loss.as_mut() {
            sink(outcome);
        }
    }

    fn emit_campaign_event(&mut self, outcome: MatchedCampaignEvent) {
        if let Some(sink) = self.sinks.on_matched_campaign_event.as_mut() {
            sink(outcome);
        }
    }

    fn emit_unmatched(&mut self, outcome: UnmatchedEvent) {
        if let Some(sink) = self.sinks.on_unmatched_event.as_mut() {
            sink(outcome);
        }
    }
}
