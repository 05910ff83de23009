//! The check-in state machine.
//!
//! Each inbound message is one turn: the engine looks at the sender's
//! session and the normalised input, talks to the registry and notifier as
//! needed, and produces a reply plus what to do with the session. The
//! session is written back once the turn has finished, so dropping a turn
//! half-way (for example on a transport timeout) leaves the previous session
//! untouched. The one exception is a recorded arrival: the session is
//! cleared as soon as the arrival is committed, before security is notified,
//! so an abandoned turn can never be replayed into a second arrival.

use crate::error::{CheckInError, ErrorKind};
use crate::input::Input;
use crate::reply::Reply;
use crate::session::{ConversationState, Session, SessionStore};
use gatehouse_core::{ChatUserId, Dni};
use gatehouse_notify::{ArrivalNotice, ArrivalNotifier};
use gatehouse_registry::{Driver, DriverRegistry, Location, NewDriver};
use tracing::{debug, error, info, instrument, warn};

/// What happens to the user's session at the end of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Leave the stored session as it was.
    Keep,
    /// Store this session instead.
    Replace(Session),
    /// Drop the session; the user is idle again.
    Clear,
}

/// The outcome of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub reply: Reply,
    pub update: SessionUpdate,
}

impl Turn {
    fn keep(reply: Reply) -> Self {
        Self {
            reply,
            update: SessionUpdate::Keep,
        }
    }

    fn replace(reply: Reply, session: Session) -> Self {
        Self {
            reply,
            update: SessionUpdate::Replace(session),
        }
    }

    fn clear(reply: Reply) -> Self {
        Self {
            reply,
            update: SessionUpdate::Clear,
        }
    }
}

/// Drives check-in conversations.
pub struct ConversationEngine<R, N, S> {
    registry: R,
    notifier: N,
    sessions: S,
}

impl<R, N, S> ConversationEngine<R, N, S>
where
    R: DriverRegistry,
    N: ArrivalNotifier,
    S: SessionStore,
{
    /// Creates an engine over the given collaborators.
    pub fn new(registry: R, notifier: N, sessions: S) -> Self {
        Self {
            registry,
            notifier,
            sessions,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    /// Handles one inbound message from `user` and returns the reply.
    ///
    /// Messages from the same user must not be handled concurrently.
    #[instrument(skip_all, fields(user = %user))]
    pub async fn handle_message(&self, user: ChatUserId, text: &str) -> Reply {
        let session = self.sessions.get_or_create(user);
        let input = Input::parse(text);
        let turn = self.run(Some(user), &session, &input).await;

        match turn.update {
            SessionUpdate::Keep => {}
            SessionUpdate::Replace(next) if next.is_idle() => {
                debug!(from = %session.state, "session back to idle");
                self.sessions.clear(user);
            }
            SessionUpdate::Replace(next) => {
                debug!(from = %session.state, to = %next.state, "session transition");
                self.sessions.save(user, next);
            }
            SessionUpdate::Clear => {
                debug!(from = %session.state, "session cleared");
                self.sessions.clear(user);
            }
        }

        turn.reply
    }

    /// Evaluates `input` against `session` without touching the session store.
    pub async fn evaluate(&self, session: &Session, input: &Input) -> Turn {
        self.run(None, session, input).await
    }

    async fn run(&self, user: Option<ChatUserId>, session: &Session, input: &Input) -> Turn {
        match self.step(user, session, input).await {
            Ok(turn) => turn,
            Err(err) => Self::failure(session, err),
        }
    }

    async fn step(
        &self,
        user: Option<ChatUserId>,
        session: &Session,
        input: &Input,
    ) -> Result<Turn, CheckInError> {
        use ConversationState::{AwaitingConfirmation, AwaitingDni, AwaitingName, AwaitingPlate};

        if matches!(input, Input::Start) {
            return Ok(Turn::replace(Reply::Welcome, Session::started()));
        }

        let turn = match session.state {
            AwaitingConfirmation => match input.folded() {
                Some("1") => Turn::replace(Reply::AskDni, session.clone().awaiting(AwaitingDni)),
                Some("2") => Turn::clear(Reply::Farewell),
                _ => Turn::keep(Reply::ConfirmationHint),
            },
            AwaitingDni => match input.folded().map(Dni::parse) {
                Some(Ok(dni)) => self.identify(user, session, dni).await?,
                _ => Turn::keep(Reply::InvalidDni),
            },
            AwaitingName => match input.non_empty_raw() {
                Some(name) => Turn::replace(
                    Reply::AskPlate,
                    session.clone().with_name(name).awaiting(AwaitingPlate),
                ),
                None => Turn::keep(Reply::InvalidInput),
            },
            AwaitingPlate => match input.non_empty_raw() {
                Some(plate) => {
                    self.register(user, &session.clone().with_plate(plate))
                        .await?
                }
                None => Turn::keep(Reply::InvalidInput),
            },
            ConversationState::Idle => Turn::keep(Reply::InvalidInput),
        };
        Ok(turn)
    }

    /// Looks the driver up; known drivers check in straight away.
    async fn identify(
        &self,
        user: Option<ChatUserId>,
        session: &Session,
        dni: Dni,
    ) -> Result<Turn, CheckInError> {
        let found = self
            .registry
            .lookup(&dni)
            .await
            .map_err(CheckInError::registry)?;

        match found {
            Some(driver) => {
                let reply = self.complete_check_in(user, &driver, false).await?;
                Ok(Turn::clear(reply))
            }
            None => Ok(Turn::replace(
                Reply::AskName,
                session
                    .clone()
                    .with_dni(dni)
                    .awaiting(ConversationState::AwaitingName),
            )),
        }
    }

    /// Registers a new driver from the collected answers, then checks them in.
    async fn register(
        &self,
        user: Option<ChatUserId>,
        session: &Session,
    ) -> Result<Turn, CheckInError> {
        let state = session.state.as_str();
        let missing = |field: &'static str| CheckInError::InconsistentSession {
            state,
            missing: field,
        };
        let dni = session.dni.clone().ok_or_else(|| missing("dni"))?;
        let name = session.name.clone().ok_or_else(|| missing("name"))?;
        let plate = session.plate.clone().ok_or_else(|| missing("plate"))?;

        // A previous turn may have created the driver before failing.
        let existing = self
            .registry
            .lookup(&dni)
            .await
            .map_err(CheckInError::registry)?;

        let (driver, created) = match existing {
            Some(driver) => {
                info!(driver_id = %driver.id, "driver already registered, reusing record");
                (driver, false)
            }
            None => {
                let driver = self
                    .registry
                    .create(NewDriver::new(name, dni, plate))
                    .await
                    .map_err(CheckInError::registry)?;
                info!(driver_id = %driver.id, "driver registered");
                (driver, true)
            }
        };

        let reply = self.complete_check_in(user, &driver, created).await?;
        Ok(Turn::clear(reply))
    }

    /// Records the arrival, notifies security, and builds the success reply.
    ///
    /// Shared by returning and newly registered drivers.
    async fn complete_check_in(
        &self,
        user: Option<ChatUserId>,
        driver: &Driver,
        after_write: bool,
    ) -> Result<Reply, CheckInError> {
        let record = self
            .registry
            .record_arrival(driver.id, Location::Checkpoint)
            .await
            .map_err(|e| {
                if after_write {
                    CheckInError::registry_after_write(e)
                } else {
                    CheckInError::registry(e)
                }
            })?;
        info!(driver_id = %driver.id, arrival_id = %record.id, "arrival recorded");

        // The check-in is committed; the session must not survive a dropped turn.
        if let Some(user) = user {
            self.sessions.clear(user);
        }

        let notice = ArrivalNotice::new(driver.name.clone(), driver.dni.clone());
        self.notifier
            .notify(&notice)
            .await
            .map_err(|source| CheckInError::Notification {
                name: driver.name.clone(),
                dni: driver.dni.clone(),
                source,
            })?;

        Ok(Reply::CheckedIn {
            name: driver.name.clone(),
        })
    }

    /// Turns a failure into its reply, logging it once.
    fn failure(session: &Session, err: CheckInError) -> Turn {
        let reply = match err.kind() {
            ErrorKind::StoreUnavailable => {
                warn!(state = %session.state, error = %err, "driver store unavailable");
                Reply::StoreUnavailable
            }
            ErrorKind::StoreOperationFailed => {
                error!(state = %session.state, error = %err, "driver store operation failed");
                Reply::StoreFailed
            }
            ErrorKind::NotificationFailed => {
                error!(
                    state = %session.state,
                    error = %err,
                    "arrival recorded but notification failed, needs manual follow-up"
                );
                Reply::NotificationFailed {
                    name: err.driver_name().unwrap_or_default().to_string(),
                }
            }
            ErrorKind::Unexpected => {
                error!(state = %session.state, error = %err, "unexpected failure");
                Reply::Unexpected
            }
        };

        if err.clears_session() {
            Turn::clear(reply)
        } else {
            Turn::keep(reply)
        }
    }
}
