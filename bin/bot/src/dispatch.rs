//! Routing of polled messages into the conversation engine.
//!
//! A poll returns a batch of messages from any number of users. Each user's
//! messages are handled in the order they arrived, one turn at a time, even
//! across batches; different users are handled concurrently and the polling
//! loop never waits for a turn.

use crate::error::TelegramError;
use crate::telegram::{Incoming, TelegramClient};
use async_trait::async_trait;
use futures::future::join_all;
use gatehouse_conversation::{ConversationEngine, Input, SessionStore};
use gatehouse_core::ChatUserId;
use gatehouse_notify::ArrivalNotifier;
use gatehouse_registry::DriverRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Sent when a turn does not finish within the turn timeout.
///
/// If the arrival was already recorded the session is gone, so the user is
/// pointed at the guard rather than told to resend.
pub const TIMEOUT_REPLY: &str = "Sorry, that took too long. Please check with the guard \
                                 whether your arrival was registered before sending your \
                                 answer again.";

/// Where replies are delivered.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;
}

#[async_trait]
impl ReplySink for TelegramClient {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.send_message(chat_id, text).await
    }
}

/// Splits a batch into per-user queues, keeping arrival order.
///
/// Queues are ordered by each user's first message in the batch. Slash
/// commands other than the entry command are dropped here.
#[must_use]
pub fn group_by_user(batch: Vec<Incoming>) -> Vec<Vec<Incoming>> {
    let mut queues: Vec<Vec<Incoming>> = Vec::new();
    for message in batch {
        if let Input::Command { name } = Input::parse(&message.text) {
            debug!(user = %message.user, command = %name, "ignoring unsupported command");
            continue;
        }
        match queues.iter_mut().find(|queue| queue[0].user == message.user) {
            Some(queue) => queue.push(message),
            None => queues.push(vec![message]),
        }
    }
    queues
}

/// Runs conversation turns off the polling loop.
///
/// Each user's queue runs in its own task. A new queue for a user waits for
/// that user's previous task, so one user's messages never overlap while
/// slow users do not hold up anyone else or the next poll.
pub struct Dispatcher<R, N, S, K> {
    engine: Arc<ConversationEngine<R, N, S>>,
    sink: Arc<K>,
    turn_timeout: Duration,
    in_flight: HashMap<ChatUserId, JoinHandle<()>>,
}

impl<R, N, S, K> Dispatcher<R, N, S, K>
where
    R: DriverRegistry + 'static,
    N: ArrivalNotifier + 'static,
    S: SessionStore + 'static,
    K: ReplySink + 'static,
{
    pub fn new(
        engine: Arc<ConversationEngine<R, N, S>>,
        sink: Arc<K>,
        turn_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            sink,
            turn_timeout,
            in_flight: HashMap::new(),
        }
    }

    /// Number of users with turns still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.values().filter(|h| !h.is_finished()).count()
    }

    /// Schedules one polled batch without waiting for it.
    pub fn dispatch(&mut self, batch: Vec<Incoming>) {
        self.in_flight.retain(|_, handle| !handle.is_finished());

        for queue in group_by_user(batch) {
            let Some(user) = queue.first().map(|m| m.user) else {
                continue;
            };
            let previous = self.in_flight.remove(&user);
            let engine = Arc::clone(&self.engine);
            let sink = Arc::clone(&self.sink);
            let turn_timeout = self.turn_timeout;

            let handle = tokio::spawn(async move {
                if let Some(previous) = previous {
                    if let Err(e) = previous.await {
                        error!(user = %user, error = %e, "previous turns for user aborted");
                    }
                }
                run_queue(&engine, sink.as_ref(), queue, turn_timeout).await;
            });
            self.in_flight.insert(user, handle);
        }
    }

    /// Waits for every scheduled turn to finish.
    pub async fn drain(&mut self) {
        join_all(self.in_flight.drain().map(|(user, handle)| async move {
            if let Err(e) = handle.await {
                error!(user = %user, error = %e, "turns for user aborted");
            }
        }))
        .await;
    }
}

async fn run_queue<R, N, S, K>(
    engine: &ConversationEngine<R, N, S>,
    sink: &K,
    queue: Vec<Incoming>,
    turn_timeout: Duration,
) where
    R: DriverRegistry,
    N: ArrivalNotifier,
    S: SessionStore,
    K: ReplySink,
{
    for message in queue {
        let turn = engine.handle_message(message.user, &message.text);
        let text = match tokio::time::timeout(turn_timeout, turn).await {
            Ok(reply) => reply.text(),
            Err(_) => {
                warn!(
                    user = %message.user,
                    timeout_seconds = turn_timeout.as_secs(),
                    "turn timed out"
                );
                TIMEOUT_REPLY.to_string()
            }
        };

        if let Err(e) = sink.send(message.chat_id, &text).await {
            warn!(user = %message.user, error = %e, "failed to deliver reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_conversation::{InMemorySessionStore, Reply};
    use gatehouse_core::Dni;
    use gatehouse_notify::{ArrivalNotice, NotifyError, RecordingNotifier};
    use gatehouse_registry::{InMemoryDriverRegistry, NewDriver};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(i64, String)>>,
    }

    impl RecordingSink {
        fn sent_to(&self, chat_id: i64) -> Vec<String> {
            self.sent
                .lock()
                .expect("lock")
                .iter()
                .filter(|(id, _)| *id == chat_id)
                .map(|(_, text)| text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn send(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
            self.sent
                .lock()
                .expect("lock")
                .push((chat_id, text.to_string()));
            Ok(())
        }
    }

    /// Hangs on the first notice, succeeds afterwards.
    #[derive(Default)]
    struct StallingOnceNotifier {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ArrivalNotifier for StallingOnceNotifier {
        async fn notify(&self, _notice: &ArrivalNotice) -> Result<(), NotifyError> {
            let first = {
                let mut calls = self.calls.lock().expect("lock");
                *calls += 1;
                *calls == 1
            };
            if first {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    fn message(user: i64, text: &str) -> Incoming {
        Incoming {
            user: ChatUserId::new(user),
            chat_id: user,
            text: text.to_string(),
        }
    }

    fn registry() -> InMemoryDriverRegistry {
        InMemoryDriverRegistry::with_drivers([NewDriver::new(
            "Juan",
            Dni::parse("12345678").expect("valid dni"),
            "ABC123",
        )])
    }

    fn setup<N: ArrivalNotifier + 'static>(
        notifier: N,
        turn_timeout: Duration,
    ) -> (
        Dispatcher<InMemoryDriverRegistry, N, InMemorySessionStore, RecordingSink>,
        Arc<ConversationEngine<InMemoryDriverRegistry, N, InMemorySessionStore>>,
        Arc<RecordingSink>,
    ) {
        let engine = Arc::new(ConversationEngine::new(
            registry(),
            notifier,
            InMemorySessionStore::new(),
        ));
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(Arc::clone(&engine), Arc::clone(&sink), turn_timeout);
        (dispatcher, engine, sink)
    }

    #[test]
    fn grouping_keeps_per_user_order_and_drops_commands() {
        let queues = group_by_user(vec![
            message(1, "/start"),
            message(2, "/start"),
            message(1, "/help"),
            message(1, "1"),
            message(2, "2"),
        ]);

        let texts: Vec<Vec<&str>> = queues
            .iter()
            .map(|queue| queue.iter().map(|m| m.text.as_str()).collect())
            .collect();
        assert_eq!(texts, vec![vec!["/start", "1"], vec!["/start", "2"]]);
    }

    #[tokio::test]
    async fn batch_runs_each_users_messages_in_order() {
        let (mut dispatcher, engine, sink) =
            setup(RecordingNotifier::succeeding(), Duration::from_secs(5));

        dispatcher.dispatch(vec![
            message(1, "/start"),
            message(2, "/start"),
            message(1, "1"),
            message(2, "2"),
            message(1, "12345678"),
        ]);
        dispatcher.drain().await;

        assert_eq!(
            sink.sent_to(1),
            vec![
                Reply::Welcome.text(),
                Reply::AskDni.text(),
                Reply::CheckedIn {
                    name: "Juan".to_string()
                }
                .text(),
            ]
        );
        assert_eq!(
            sink.sent_to(2),
            vec![Reply::Welcome.text(), Reply::Farewell.text()]
        );
        assert_eq!(engine.registry().arrivals().len(), 1);
        assert_eq!(engine.sessions().active_sessions(), 0);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn later_batches_wait_for_the_same_users_earlier_turns() {
        let (mut dispatcher, engine, sink) =
            setup(RecordingNotifier::succeeding(), Duration::from_secs(5));

        dispatcher.dispatch(vec![message(1, "/start"), message(1, "1")]);
        dispatcher.dispatch(vec![message(1, "12345678")]);
        dispatcher.drain().await;

        assert_eq!(
            sink.sent_to(1),
            vec![
                Reply::Welcome.text(),
                Reply::AskDni.text(),
                Reply::CheckedIn {
                    name: "Juan".to_string()
                }
                .text(),
            ]
        );
        assert_eq!(engine.registry().arrivals().len(), 1);
    }

    #[tokio::test]
    async fn timed_out_check_in_is_not_recorded_twice() {
        let (mut dispatcher, engine, sink) =
            setup(StallingOnceNotifier::default(), Duration::from_millis(20));

        dispatcher.dispatch(vec![
            message(1, "/start"),
            message(1, "1"),
            message(1, "12345678"),
            message(2, "/start"),
            message(2, "2"),
        ]);
        dispatcher.drain().await;
        dispatcher.dispatch(vec![message(1, "12345678")]);
        dispatcher.drain().await;

        assert_eq!(
            sink.sent_to(1),
            vec![
                Reply::Welcome.text(),
                Reply::AskDni.text(),
                TIMEOUT_REPLY.to_string(),
                Reply::InvalidInput.text(),
            ]
        );
        assert_eq!(
            sink.sent_to(2),
            vec![Reply::Welcome.text(), Reply::Farewell.text()]
        );
        assert_eq!(engine.registry().arrivals().len(), 1);
    }
}
