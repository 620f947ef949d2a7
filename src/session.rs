//! Per-user conversation state.
//!
//! A chat turn is split at the network boundary: [`Session::begin_turn`]
//! applies the guards and pre-dispatch effects and hands back a
//! [`PendingTurn`] ticket; [`Session::complete_turn`] applies the result.
//! Every scenario switch or reset bumps the session epoch, so a reply that
//! arrives for an older epoch is dropped instead of landing in the wrong
//! conversation.

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::{FALLBACK_ASSISTANT_MESSAGE, GENERATION_ERROR_PREFIX};
use crate::gateway::{Gateway, GatewayError};
use crate::models::{Message, ResourceBundle, Scenario};

/// Snapshot of everything the presentation layer renders for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub active_scenario: Option<&'static Scenario>,
    pub transcript: Vec<Message>,
    pub latest_bundle: Option<ResourceBundle>,
    pub loading: bool,
    pub last_error: Option<String>,
}

/// A dispatched chat turn, tied to the session epoch it was issued in.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    epoch: u64,
    pub scenario: &'static Scenario,
    pub transcript: Vec<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Guard rejected the send (no scenario, blank text, or already loading).
    Ignored,
    Replied,
    Failed,
    /// The session was reset or switched scenarios while the call was in flight.
    Discarded,
}

#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    epoch: u64,
}

pub fn welcome_message(scenario: &Scenario) -> Message {
    Message::assistant(format!(
        "You've selected the \"{}\" scenario. How can I assist you with {}? Please describe the situation you need help with.",
        scenario.title,
        scenario.description.to_lowercase()
    ))
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.loading
    }

    /// Equivalent to a reset followed by selecting `scenario`.
    pub fn select_scenario(&mut self, scenario: &'static Scenario) {
        self.reset();
        info!(scenario = scenario.id, "Scenario selected");
        self.state.active_scenario = Some(scenario);
        self.state.transcript.push(welcome_message(scenario));
    }

    pub fn reset(&mut self) {
        if self.state.loading {
            debug!(epoch = self.epoch, "Reset while a chat turn is in flight");
        }
        self.epoch += 1;
        self.state = SessionState::default();
    }

    pub fn begin_turn(&mut self, text: &str) -> Option<PendingTurn> {
        let Some(scenario) = self.state.active_scenario else {
            debug!("Ignoring message: no scenario selected");
            return None;
        };
        if self.state.loading {
            warn!("Ignoring message: a chat turn is already in flight");
            return None;
        }
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.state.transcript.push(Message::user(text));
        self.state.loading = true;
        self.state.last_error = None;
        self.state.latest_bundle = None;

        Some(PendingTurn {
            epoch: self.epoch,
            scenario,
            transcript: self.state.transcript.clone(),
        })
    }

    pub fn complete_turn(
        &mut self,
        pending: PendingTurn,
        result: Result<ResourceBundle, GatewayError>,
    ) -> TurnOutcome {
        if pending.epoch != self.epoch {
            warn!(
                dispatched = pending.epoch,
                current = self.epoch,
                "Discarding chat turn result for a superseded session"
            );
            return TurnOutcome::Discarded;
        }

        self.state.loading = false;
        match result {
            Ok(bundle) => {
                self.state
                    .transcript
                    .push(Message::assistant(bundle.response_text.clone()));
                self.state.latest_bundle = Some(bundle);
                TurnOutcome::Replied
            }
            Err(e) => {
                self.state.last_error = Some(format!("{} {}", GENERATION_ERROR_PREFIX, e));
                self.state
                    .transcript
                    .push(Message::assistant(FALLBACK_ASSISTANT_MESSAGE));
                TurnOutcome::Failed
            }
        }
    }
}

/// Runs one chat turn end to end. The lock is released while the model call
/// is outstanding so snapshots and resets stay responsive.
pub async fn send_message(session: &Mutex<Session>, gateway: &Gateway, text: &str) -> TurnOutcome {
    let pending = session.lock().await.begin_turn(text);
    let Some(pending) = pending else {
        return TurnOutcome::Ignored;
    };

    let result = gateway
        .request_chat_turn(pending.scenario, &pending.transcript)
        .await;

    session.lock().await.complete_turn(pending, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Quote, Role, Scripture};
    use crate::scenarios;

    fn crisis() -> &'static Scenario {
        scenarios::find("crisis_intervention").unwrap()
    }

    fn bundle(text: &str) -> ResourceBundle {
        ResourceBundle {
            response_text: text.to_string(),
            scripture: vec![
                Scripture {
                    reference: "Psalm 34:18".to_string(),
                    text: "The Lord is nigh".to_string(),
                },
                Scripture {
                    reference: "Matthew 5:4".to_string(),
                    text: "Blessed are they that mourn".to_string(),
                },
            ],
            quotes: vec![Quote {
                source: "The Desire of Ages, p. 83".to_string(),
                text: "Comfort".to_string(),
            }],
            practical_steps: vec!["Listen".into(), "Pray".into(), "Follow up".into()],
            additional_resources: vec![],
        }
    }

    #[test]
    fn test_select_scenario_seeds_welcome() {
        let mut session = Session::new();
        for scenario in scenarios::all() {
            session.select_scenario(scenario);
            let state = session.state();
            assert_eq!(state.transcript.len(), 1);
            assert_eq!(state.transcript[0].role, Role::Assistant);
            assert!(state.transcript[0].content.contains(scenario.title));
            assert!(state.transcript[0]
                .content
                .contains(&scenario.description.to_lowercase()));
            assert!(state.latest_bundle.is_none());
            assert!(state.last_error.is_none());
        }
    }

    #[test]
    fn test_blank_message_is_noop() {
        let mut session = Session::new();
        session.select_scenario(crisis());
        let before = session.snapshot();
        assert!(session.begin_turn("   \n\t").is_none());
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_message_without_scenario_is_noop() {
        let mut session = Session::new();
        assert!(session.begin_turn("hello").is_none());
        assert_eq!(session.snapshot(), SessionState::default());
    }

    #[test]
    fn test_send_while_loading_is_noop() {
        let mut session = Session::new();
        session.select_scenario(crisis());
        let _pending = session.begin_turn("first").unwrap();
        let before = session.snapshot();
        assert!(session.begin_turn("second").is_none());
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_begin_turn_clears_previous_results() {
        let mut session = Session::new();
        session.select_scenario(crisis());
        let pending = session.begin_turn("first").unwrap();
        session.complete_turn(pending, Ok(bundle("reply")));
        assert!(session.state().latest_bundle.is_some());

        let pending = session.begin_turn("  second  ").unwrap();
        let state = session.state();
        assert!(state.loading);
        assert!(state.latest_bundle.is_none());
        assert!(state.last_error.is_none());
        assert_eq!(state.transcript.last().unwrap().content, "second");
        assert_eq!(pending.transcript.len(), 4);
    }

    #[test]
    fn test_success_appends_response_text() {
        let mut session = Session::new();
        session.select_scenario(crisis());
        let pending = session.begin_turn("My patient just lost her husband").unwrap();
        let outcome = session.complete_turn(pending, Ok(bundle("I'm so sorry for her loss.")));

        assert_eq!(outcome, TurnOutcome::Replied);
        let state = session.state();
        assert_eq!(state.transcript.len(), 3);
        assert_eq!(state.transcript[2].content, "I'm so sorry for her loss.");
        assert_eq!(state.latest_bundle.as_ref().unwrap().scripture.len(), 2);
        assert!(!state.loading);
    }

    #[test]
    fn test_failure_appends_fallback() {
        let mut session = Session::new();
        session.select_scenario(crisis());
        let pending = session.begin_turn("help").unwrap();
        let outcome = session.complete_turn(
            pending,
            Err(GatewayError::Generation("network unreachable".to_string())),
        );

        assert_eq!(outcome, TurnOutcome::Failed);
        let state = session.state();
        assert_eq!(state.transcript.len(), 3);
        assert_eq!(
            state.transcript.last().unwrap().content,
            FALLBACK_ASSISTANT_MESSAGE
        );
        let error = state.last_error.as_deref().unwrap();
        assert!(error.starts_with(GENERATION_ERROR_PREFIX));
        assert!(error.contains("network unreachable"));
        assert!(state.latest_bundle.is_none());
        assert!(!state.loading);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut session = Session::new();
        session.reset();
        assert_eq!(session.snapshot(), SessionState::default());

        session.select_scenario(crisis());
        let _pending = session.begin_turn("hello").unwrap();
        session.reset();
        session.reset();
        assert_eq!(session.snapshot(), SessionState::default());
    }

    #[test]
    fn test_stale_result_after_reset_is_discarded() {
        let mut session = Session::new();
        session.select_scenario(crisis());
        let pending = session.begin_turn("hello").unwrap();
        session.reset();

        let outcome = session.complete_turn(pending, Ok(bundle("late")));
        assert_eq!(outcome, TurnOutcome::Discarded);
        assert_eq!(session.snapshot(), SessionState::default());
    }

    #[test]
    fn test_stale_result_after_scenario_switch_is_discarded() {
        let mut session = Session::new();
        session.select_scenario(crisis());
        let pending = session.begin_turn("hello").unwrap();

        let family = scenarios::find("family_conflict").unwrap();
        session.select_scenario(family);
        let outcome = session.complete_turn(pending, Err(GatewayError::Generation("x".into())));

        assert_eq!(outcome, TurnOutcome::Discarded);
        let state = session.state();
        assert_eq!(state.active_scenario, Some(family));
        assert_eq!(state.transcript.len(), 1);
        assert!(state.last_error.is_none());
    }
}
