//! Yes/no confirmation exchanges for destructive commands.
//!
//! A gated command is parked with [`ConfirmationBroker::request`] together
//! with the action it would perform. The dispatcher offers every inbound
//! message to [`ConfirmationBroker::offer`] first; a "yes" or "no" from the
//! same author in the same channel hands the parked action back, so it runs
//! in arrival order like any other command. A timer drops the action if no
//! answer comes in time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use loopcast_core::{ChannelId, Gateway, InboundMessage, UserId};
use tracing::{debug, info};

use crate::reply::send_reply;

/// How long a confirmation waits when nothing else is configured.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

const CONFIRM_HINT: &str = "Reply with 'yes' to confirm or 'no' to cancel.";
const TIMED_OUT: &str = "Confirmation timed out";
const ALREADY_PENDING: &str = "A confirmation is already pending here, answer it with 'yes' or 'no' first";

type PendingKey = (UserId, ChannelId);

struct Pending<A> {
    id: u64,
    action: A,
}

/// A parked action together with the author's answer.
#[derive(Debug)]
pub struct Answered<A> {
    pub action: A,
    pub confirmed: bool,
}

/// Holds at most one parked action per (author, channel) pair.
pub struct ConfirmationBroker<A> {
    pending: Mutex<HashMap<PendingKey, Pending<A>>>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl<A> Default for ConfirmationBroker<A> {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRM_TIMEOUT)
    }
}

/// Parse a confirmation answer.
fn parse_answer(content: &str) -> Option<bool> {
    match content.trim().to_lowercase().as_str() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

impl<A> ConfirmationBroker<A> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            timeout,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PendingKey, Pending<A>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.lock().len()
    }

    /// Take the action `msg` answers, if any.
    ///
    /// A `Some` result means the message was consumed and must not be
    /// dispatched as a command.
    pub fn offer(&self, msg: &InboundMessage) -> Option<Answered<A>> {
        let confirmed = parse_answer(&msg.content)?;
        let pending = self.lock().remove(&(msg.author_id, msg.channel_id))?;
        debug!(author = %msg.author_id, channel = %msg.channel_id, confirmed, "Confirmation answered");
        Some(Answered {
            action: pending.action,
            confirmed,
        })
    }

    fn register(&self, key: PendingKey, action: A) -> Option<u64> {
        let mut pending = self.lock();
        if pending.contains_key(&key) {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        pending.insert(key, Pending { id, action });
        Some(id)
    }

    /// Remove the entry for `key` if it is still the exchange `id`.
    fn expire(&self, key: PendingKey, id: u64) -> Option<A> {
        let mut pending = self.lock();
        if pending.get(&key).is_some_and(|p| p.id == id) {
            pending.remove(&key).map(|p| p.action)
        } else {
            None
        }
    }
}

impl<A: Send + 'static> ConfirmationBroker<A> {
    /// Park `action` and ask the author of `msg` to confirm `prompt`.
    ///
    /// The entry is registered before anything is sent, so an answer that
    /// arrives next is always matched. On timeout the author is told and
    /// `canceled` is sent. Returns `false` if the pair already has a
    /// pending exchange; `action` is dropped in that case.
    pub async fn request(
        self: &Arc<Self>,
        gateway: &Arc<dyn Gateway>,
        msg: &InboundMessage,
        prompt: &str,
        canceled: &'static str,
        action: A,
    ) -> bool {
        let key = (msg.author_id, msg.channel_id);
        let Some(id) = self.register(key, action) else {
            info!(author = %msg.author_id, channel = %msg.channel_id, "Confirmation already pending");
            send_reply(&**gateway, msg.channel_id, ALREADY_PENDING).await;
            return false;
        };

        let broker = Arc::clone(self);
        let timer_gateway = Arc::clone(gateway);
        tokio::spawn(async move {
            tokio::time::sleep(broker.timeout).await;
            if broker.expire(key, id).is_some() {
                info!(author = %key.0, channel = %key.1, "Confirmation timed out");
                send_reply(&*timer_gateway, key.1, TIMED_OUT).await;
                send_reply(&*timer_gateway, key.1, canceled).await;
            }
        });

        send_reply(&**gateway, msg.channel_id, prompt).await;
        send_reply(&**gateway, msg.channel_id, CONFIRM_HINT).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{HOME, MockGateway, dm, settle};

    fn setup() -> (Arc<ConfirmationBroker<&'static str>>, Arc<MockGateway>, Arc<dyn Gateway>) {
        let broker = Arc::new(ConfirmationBroker::default());
        let gw = Arc::new(MockGateway::new());
        let dyn_gw: Arc<dyn Gateway> = gw.clone();
        (broker, gw, dyn_gw)
    }

    #[test]
    fn answers_are_case_insensitive() {
        assert_eq!(parse_answer("YES"), Some(true));
        assert_eq!(parse_answer(" No "), Some(false));
        assert_eq!(parse_answer("yep"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn yes_returns_the_parked_action() {
        let (broker, gw, dyn_gw) = setup();
        assert!(
            broker
                .request(&dyn_gw, &dm("!clearmsgs"), "Clear all messages?", "Clear canceled", "clear")
                .await
        );

        assert_eq!(
            gw.sent_to(HOME),
            vec!["Clear all messages?".to_string(), CONFIRM_HINT.to_string()]
        );
        let answered = broker.offer(&dm("Yes")).unwrap();
        assert_eq!(answered.action, "clear");
        assert!(answered.confirmed);
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_declines() {
        let (broker, _gw, dyn_gw) = setup();
        broker
            .request(&dyn_gw, &dm("!clearmsgs"), "Clear?", "Clear canceled", "clear")
            .await;

        let answered = broker.offer(&dm("no")).unwrap();
        assert!(!answered.confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn silence_times_out() {
        let (broker, gw, dyn_gw) = setup();
        broker
            .request(&dyn_gw, &dm("!clearrole"), "Remove?", "Removal canceled", "clear")
            .await;

        tokio::time::sleep(DEFAULT_CONFIRM_TIMEOUT + Duration::from_secs(1)).await;
        settle().await;

        let replies = gw.sent_to(HOME);
        assert_eq!(replies[replies.len() - 2..], [TIMED_OUT, "Removal canceled"]);
        assert_eq!(broker.pending_count(), 0);
        // A late answer is ordinary text again.
        assert!(broker.offer(&dm("yes")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn answered_exchange_does_not_time_out() {
        let (broker, gw, dyn_gw) = setup();
        broker
            .request(&dyn_gw, &dm("!clearmsgs"), "Clear?", "Clear canceled", "clear")
            .await;
        assert!(broker.offer(&dm("yes")).is_some());

        tokio::time::sleep(DEFAULT_CONFIRM_TIMEOUT * 2).await;
        settle().await;
        assert!(!gw.sent_to(HOME).contains(&TIMED_OUT.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_messages_are_not_consumed() {
        let (broker, _gw, dyn_gw) = setup();
        broker
            .request(&dyn_gw, &dm("!clearmsgs"), "Clear?", "Clear canceled", "clear")
            .await;

        // Other text from the same author passes through.
        assert!(broker.offer(&dm("!status")).is_none());
        // "yes" from someone else, or elsewhere, does not resolve it.
        let mut other_user = dm("yes");
        other_user.author_id = UserId(2);
        assert!(broker.offer(&other_user).is_none());
        let mut other_channel = dm("yes");
        other_channel.channel_id = ChannelId(5);
        assert!(broker.offer(&other_channel).is_none());

        assert_eq!(broker.pending_count(), 1);
        assert!(broker.offer(&dm("yes")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn second_request_for_same_pair_is_refused() {
        let (broker, gw, dyn_gw) = setup();
        assert!(
            broker
                .request(&dyn_gw, &dm("!clearmsgs"), "Clear?", "Clear canceled", "clear")
                .await
        );
        assert!(
            !broker
                .request(&dyn_gw, &dm("!clearrole"), "Remove?", "Removal canceled", "role")
                .await
        );
        assert_eq!(gw.last_to(HOME).as_deref(), Some(ALREADY_PENDING));

        assert_eq!(broker.offer(&dm("yes")).unwrap().action, "clear");
    }

    #[tokio::test(start_paused = true)]
    async fn different_pairs_are_independent() {
        let (broker, _gw, dyn_gw) = setup();
        let mut bob = dm("!clearrole");
        bob.author_id = UserId(2);
        broker
            .request(&dyn_gw, &dm("!clearmsgs"), "Clear?", "Clear canceled", "alice")
            .await;
        broker
            .request(&dyn_gw, &bob, "Remove?", "Removal canceled", "bob")
            .await;

        bob.content = "no".into();
        let answered = broker.offer(&bob).unwrap();
        assert_eq!((answered.action, answered.confirmed), ("bob", false));
        assert_eq!(broker.offer(&dm("yes")).unwrap().action, "alice");
    }
}
