//! Turn execution
//!
//! Decides what conversation history is sent to the model for each new user
//! utterance and reconciles the outcome back into the session transcript.

use crate::llm::ChatModel;
use crate::transcript::{SeedContext, Speaker, Transcript, Turn};
use std::time::Duration;
use thiserror::Error;

/// Submitting this text (any letter case) ends the session without a model call.
pub const EXIT_KEYWORD: &str = "exit";

/// Fixed farewell appended when the exit keyword is submitted.
pub const FAREWELL: &str = "Sampai jumpa! Semoga perjalanan Anda menyenangkan.";

/// Reply text used when the model returns an empty or absent answer.
pub const FALLBACK_REPLY: &str = "Maaf, saya tidak bisa memberikan balasan.";

/// Bounded wait for one model invocation.
pub const TURN_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Ready for the next user submission
    #[default]
    AwaitingInput,
    /// A submission is being processed
    Processing,
    /// Exit keyword received; no further turns are accepted (absorbing)
    Terminated,
}

/// One browser session: its transcript and where it is in the state machine.
#[derive(Debug)]
pub struct Session {
    pub transcript: Transcript,
    pub state: SessionState,
}

impl Session {
    /// Create a session whose first visible entry is the seed greeting.
    pub fn new(seed: &SeedContext) -> Self {
        let mut transcript = Transcript::new();
        transcript.append(seed.greeting.clone());
        Self {
            transcript,
            state: SessionState::AwaitingInput,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }
}

/// Outcome of one processed submission.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Model replied (or the fallback was substituted); two turns appended.
    Reply { turns: Vec<Turn> },
    /// Exit keyword: user turn plus farewell appended, session terminated.
    Farewell { turns: Vec<Turn> },
    /// Model invocation failed; only the user turn was appended.
    Failed { turns: Vec<Turn>, warning: String },
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Session has ended; no further messages are accepted")]
    SessionTerminated,
}

/// Process one user submission against the session transcript.
///
/// Every model failure is converted to a [`TurnOutcome::Failed`] warning here;
/// nothing propagates further or ends the session.
pub async fn handle_turn(
    session: &mut Session,
    seed: &SeedContext,
    model: &dyn ChatModel,
    user_text: &str,
) -> Result<TurnOutcome, TurnError> {
    if session.is_terminated() {
        return Err(TurnError::SessionTerminated);
    }
    session.state = SessionState::Processing;

    // Exit keyword short-circuits: shown in the transcript, never sent.
    if user_text.eq_ignore_ascii_case(EXIT_KEYWORD) {
        let turns = vec![Turn::user(user_text), Turn::assistant(FAREWELL)];
        for turn in &turns {
            session.transcript.append(turn.clone());
        }
        session.state = SessionState::Terminated;
        tracing::info!("exit keyword received, session terminated");
        return Ok(TurnOutcome::Farewell { turns });
    }

    session.transcript.append(Turn::user(user_text));

    let history = build_request_history(seed, &session.transcript);
    // The just-appended user turn is always the final history entry; everything
    // before it is the conversation context.
    let (context, message) = history.split_at(history.len() - 1);

    let outcome = match model
        .send_message(context, &message[0].text, TURN_TIMEOUT)
        .await
    {
        Ok(reply) => {
            let text = reply.text.unwrap_or_else(|| FALLBACK_REPLY.to_string());
            let assistant = Turn::assistant(text);
            session.transcript.append(assistant.clone());
            TurnOutcome::Reply {
                turns: vec![Turn::user(user_text), assistant],
            }
        }
        Err(e) => {
            // The failed turn is not persisted; the user may resubmit.
            let warning =
                format!("Maaf, terjadi kesalahan saat berkomunikasi dengan Gemini: {e}");
            tracing::warn!(kind = e.kind.label(), error = %e.message, "turn failed");
            TurnOutcome::Failed {
                turns: vec![Turn::user(user_text)],
                warning,
            }
        }
    };

    session.state = SessionState::AwaitingInput;
    Ok(outcome)
}

/// Construct the exact sequence sent to the model: the fixed seed pair
/// followed by every stored turn except assistant turns whose text equals the
/// seed greeting (the greeting is stored for display and must not ride twice).
///
/// The guard compares exact text only; a model reply that coincidentally
/// matches the greeting string would also be stripped. Known accepted
/// limitation.
pub fn build_request_history(seed: &SeedContext, transcript: &Transcript) -> Vec<Turn> {
    let mut history = vec![seed.instruction.clone(), seed.greeting.clone()];
    history.extend(
        transcript
            .all()
            .iter()
            .filter(|t| !(t.speaker == Speaker::Assistant && t.text == seed.greeting.text))
            .cloned(),
    );
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, ModelReply, Usage};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::Mutex;

    /// Model double that pops scripted results and records what it was sent.
    struct ScriptedModel {
        results: Mutex<Vec<Result<ModelReply, LlmError>>>,
        seen: Mutex<Vec<(Vec<Turn>, String)>>,
    }

    impl ScriptedModel {
        fn new(results: Vec<Result<ModelReply, LlmError>>) -> Self {
            Self {
                results: Mutex::new(results),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn replying(text: &str) -> Self {
            Self::new(vec![Ok(ModelReply {
                text: Some(text.to_string()),
                usage: Usage::default(),
            })])
        }

        fn empty_reply() -> Self {
            Self::new(vec![Ok(ModelReply {
                text: None,
                usage: Usage::default(),
            })])
        }

        fn failing(error: LlmError) -> Self {
            Self::new(vec![Err(error)])
        }

        fn sent(&self) -> Vec<(Vec<Turn>, String)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn send_message(
            &self,
            context: &[Turn],
            text: &str,
            _timeout: Duration,
        ) -> Result<ModelReply, LlmError> {
            self.seen
                .lock()
                .unwrap()
                .push((context.to_vec(), text.to_string()));
            self.results.lock().unwrap().remove(0)
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn seed() -> SeedContext {
        SeedContext::tour_guide()
    }

    #[test]
    fn test_new_session_opens_with_greeting() {
        let session = Session::new(&seed());
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.transcript.all()[0], seed().greeting);
        assert!(!session.is_terminated());
    }

    #[tokio::test]
    async fn test_successful_turn_appends_two_turns_in_order() {
        let seed = seed();
        let mut session = Session::new(&seed);
        let model =
            ScriptedModel::replying("Coba Kebun Raya Bogor dan Taman Nasional Gunung Halimun.");
        let before = session.transcript.len();

        let outcome = handle_turn(&mut session, &seed, &model, "Jakarta")
            .await
            .unwrap();

        assert_eq!(session.transcript.len(), before + 2);
        let turns = session.transcript.all();
        assert_eq!(turns[turns.len() - 2], Turn::user("Jakarta"));
        assert_eq!(
            turns[turns.len() - 1],
            Turn::assistant("Coba Kebun Raya Bogor dan Taman Nasional Gunung Halimun.")
        );
        assert!(matches!(outcome, TurnOutcome::Reply { .. }));
        assert_eq!(session.state, SessionState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_failed_turn_appends_only_user_turn_with_warning() {
        let seed = seed();
        let mut session = Session::new(&seed);
        let model = ScriptedModel::failing(LlmError::network("Request timeout"));
        let before = session.transcript.len();

        let outcome = handle_turn(&mut session, &seed, &model, "Bandung")
            .await
            .unwrap();

        assert_eq!(session.transcript.len(), before + 1);
        assert_eq!(
            session.transcript.all().last().unwrap(),
            &Turn::user("Bandung")
        );
        match outcome {
            TurnOutcome::Failed { warning, .. } => {
                assert!(warning.contains("Request timeout"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        // Session stays usable for a resubmission.
        assert_eq!(session.state, SessionState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_exit_keyword_terminates_without_model_call() {
        let seed = seed();
        let mut session = Session::new(&seed);
        let model = ScriptedModel::new(vec![]);

        let outcome = handle_turn(&mut session, &seed, &model, "EXIT")
            .await
            .unwrap();

        assert!(matches!(outcome, TurnOutcome::Farewell { .. }));
        assert!(session.is_terminated());
        assert!(model.sent().is_empty(), "exit must never reach the model");
        let turns = session.transcript.all();
        assert_eq!(turns[turns.len() - 2], Turn::user("EXIT"));
        assert_eq!(turns[turns.len() - 1], Turn::assistant(FAREWELL));
    }

    #[tokio::test]
    async fn test_terminated_session_rejects_further_turns() {
        let seed = seed();
        let mut session = Session::new(&seed);
        let model = ScriptedModel::new(vec![]);

        handle_turn(&mut session, &seed, &model, "exit").await.unwrap();
        let len_after_exit = session.transcript.len();

        let result = handle_turn(&mut session, &seed, &model, "Bandung").await;
        assert!(matches!(result, Err(TurnError::SessionTerminated)));
        assert_eq!(session.transcript.len(), len_after_exit);
    }

    #[tokio::test]
    async fn test_empty_reply_substitutes_fallback() {
        let seed = seed();
        let mut session = Session::new(&seed);
        let model = ScriptedModel::empty_reply();

        let outcome = handle_turn(&mut session, &seed, &model, "Surabaya")
            .await
            .unwrap();

        assert!(matches!(outcome, TurnOutcome::Reply { .. }));
        assert_eq!(
            session.transcript.all().last().unwrap(),
            &Turn::assistant(FALLBACK_REPLY)
        );
    }

    #[tokio::test]
    async fn test_request_history_excludes_stored_greeting() {
        // Stored transcript: [(assistant, greeting), (user, "Bandung")].
        // The model must receive exactly [instruction, greeting, "Bandung"].
        let seed = seed();
        let mut session = Session::new(&seed);
        let model = ScriptedModel::replying("Coba Tangkuban Perahu.");

        handle_turn(&mut session, &seed, &model, "Bandung")
            .await
            .unwrap();

        let sent = model.sent();
        assert_eq!(sent.len(), 1);
        let (context, message) = &sent[0];
        assert_eq!(
            context.as_slice(),
            &[seed.instruction.clone(), seed.greeting.clone()]
        );
        assert_eq!(message, "Bandung");
    }

    #[tokio::test]
    async fn test_multi_turn_context_accumulates() {
        let seed = seed();
        let mut session = Session::new(&seed);
        let first = ScriptedModel::replying("Coba Tangkuban Perahu.");
        handle_turn(&mut session, &seed, &first, "Bandung")
            .await
            .unwrap();

        let second = ScriptedModel::replying("Coba Kepulauan Seribu.");
        handle_turn(&mut session, &seed, &second, "Jakarta")
            .await
            .unwrap();

        let (context, message) = &second.sent()[0];
        assert_eq!(
            context.as_slice(),
            &[
                seed.instruction.clone(),
                seed.greeting.clone(),
                Turn::user("Bandung"),
                Turn::assistant("Coba Tangkuban Perahu."),
            ]
        );
        assert_eq!(message, "Jakarta");
    }

    #[test]
    fn test_non_seed_assistant_turns_survive_dedup() {
        let seed = seed();
        let mut transcript = Transcript::new();
        transcript.append(seed.greeting.clone());
        transcript.append(Turn::user("Bandung"));
        // Unrelated assistant turns are always included. A user turn carrying
        // the greeting text is also included: the guard checks speaker too.
        transcript.append(Turn::assistant("Coba Tangkuban Perahu."));
        transcript.append(Turn::user(seed.greeting.text.clone()));

        let history = build_request_history(&seed, &transcript);
        assert_eq!(history.len(), 5);
        assert_eq!(history[4], Turn::user(seed.greeting.text.clone()));
    }

    proptest! {
        /// The constructed request history never carries the seed greeting as
        /// an assistant turn more than once, whatever has accumulated.
        #[test]
        fn prop_greeting_appears_at_most_once(
            turns in proptest::collection::vec(
                (any::<bool>(), prop_oneof![
                    Just(crate::transcript::SEED_GREETING.to_string()),
                    "[a-zA-Z ]{0,20}",
                ]),
                0..12,
            )
        ) {
            let seed = SeedContext::tour_guide();
            let mut transcript = Transcript::new();
            for (is_user, text) in turns {
                let turn = if is_user { Turn::user(text) } else { Turn::assistant(text) };
                transcript.append(turn);
            }

            let history = build_request_history(&seed, &transcript);
            let greeting_count = history
                .iter()
                .filter(|t| t.speaker == Speaker::Assistant && t.text == seed.greeting.text)
                .count();
            prop_assert_eq!(greeting_count, 1);
            prop_assert_eq!(&history[0], &seed.instruction);
            prop_assert_eq!(&history[1], &seed.greeting);
        }
    }
}
