//! The interview orchestrator: per-turn execution, checkpointing, and
//! session lifecycle.
//!
//! Turns on one thread are strictly serialized by a per-thread lock; a
//! second turn arriving mid-flight is rejected with 409 semantics rather
//! than queued. Every node run commits a checkpoint, so a crash or a
//! cancelled turn leaves the last committed snapshot authoritative and the
//! session resumable from it.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::audio::SpeechSynthesizer;
use crate::blob::{tts_key, ObjectStore};
use crate::control::CancelSignal;
use crate::error::{CoreError, Result};
use crate::model::ModelGateway;
use crate::store::{CheckpointStore, RecordStore, SessionRegistry, SessionStats};
use crate::types::{Difficulty, RecordStatus};

use super::nodes::InterviewNodes;
use super::state::{Evaluation, InterviewState, NextAction};

/// Result of one interview turn.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    pub thread_id: String,
    pub next_question: String,
    /// Evaluation of the answer just given, if one was analyzed.
    pub analysis: Option<Evaluation>,
    pub is_finished: bool,
    pub state: InterviewState,
}

/// Result of an audio turn: the text outcome plus the stored question audio.
#[derive(Clone, Debug)]
pub struct AudioTurnOutcome {
    pub turn: TurnOutcome,
    /// Blob key of the rendered next question, when one was produced.
    pub audio_key: Option<String>,
}

/// Checkpointed per-thread state machine driving the interview.
#[derive(Clone)]
pub struct InterviewOrchestrator {
    records: RecordStore,
    sessions: SessionRegistry,
    checkpoints: CheckpointStore,
    nodes: InterviewNodes,
    gateway: ModelGateway,
    blobs: Arc<dyn ObjectStore>,
    speech: Arc<dyn SpeechSynthesizer>,
    total_time_s: u32,
    turn_locks: Arc<Mutex<FxHashMap<String, Arc<Mutex<()>>>>>,
}

impl InterviewOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        records: RecordStore,
        sessions: SessionRegistry,
        checkpoints: CheckpointStore,
        nodes: InterviewNodes,
        gateway: ModelGateway,
        blobs: Arc<dyn ObjectStore>,
        speech: Arc<dyn SpeechSynthesizer>,
        total_time_s: u32,
    ) -> Self {
        Self {
            records,
            sessions,
            checkpoints,
            nodes,
            gateway,
            blobs,
            speech,
            total_time_s,
            turn_locks: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    /// Open a session and process the fixed opening question's answer.
    ///
    /// Returns the generated thread id along with the second question.
    #[instrument(skip(self, first_answer))]
    pub async fn initialize(
        &self,
        record_id: i64,
        user_id: i64,
        difficulty: Difficulty,
        first_answer: &str,
        response_time_s: u32,
    ) -> Result<TurnOutcome> {
        if first_answer.trim().is_empty() {
            return Err(CoreError::InvalidRequest("first answer is empty".into()));
        }
        let record = self.records.get(record_id).await?;
        if record.status != RecordStatus::Ready {
            return Err(CoreError::RecordNotReady {
                record_id,
                status: record.status.to_string(),
            });
        }

        let thread_id = format!(
            "interview_{record_id}_{}",
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let session_id = self
            .sessions
            .create(&thread_id, user_id, record_id, difficulty)
            .await?;
        info!(%thread_id, session_id, "interview session opened");

        // Node: initialize_interview — seed the state with the opening
        // question and commit the first checkpoint.
        let state = InterviewState::new(record_id, session_id, difficulty, self.total_time_s);
        self.checkpoints.save(&thread_id, &state).await?;

        // The opening answer then flows through the normal turn pipeline.
        self.chat_turn(&thread_id, first_answer, response_time_s)
            .await
    }

    /// Process one candidate answer and produce the next question.
    pub async fn chat_turn(
        &self,
        thread_id: &str,
        answer: &str,
        response_time_s: u32,
    ) -> Result<TurnOutcome> {
        self.chat_turn_with_cancel(thread_id, answer, response_time_s, CancelSignal::never())
            .await
    }

    /// [`chat_turn`](Self::chat_turn) with a cooperative cancellation signal
    /// observed at node boundaries. A cancelled turn commits nothing past
    /// the last completed node.
    #[instrument(skip(self, answer, cancel))]
    pub async fn chat_turn_with_cancel(
        &self,
        thread_id: &str,
        answer: &str,
        response_time_s: u32,
        cancel: CancelSignal,
    ) -> Result<TurnOutcome> {
        if answer.trim().is_empty() {
            return Err(CoreError::InvalidRequest("answer is empty".into()));
        }

        // Per-thread serialization: reject, not queue, concurrent turns.
        let lock = self.turn_lock(thread_id).await;
        let _guard = lock
            .clone()
            .try_lock_owned()
            .map_err(|_| CoreError::TurnInFlight {
                thread_id: thread_id.to_string(),
            })?;

        let checkpoint = self.checkpoints.load_latest(thread_id).await?;
        let state = checkpoint
            .state
            .with_candidate_answer(answer, response_time_s);

        self.run_turn(thread_id, state, response_time_s, &cancel).await
    }

    /// Audio variant: pre-transcribe the answer, run the identical turn,
    /// post-render the produced question to `tts/{thread_id}/{turn}.mp3`.
    #[instrument(skip(self, audio))]
    pub async fn chat_turn_audio(
        &self,
        thread_id: &str,
        audio: &[u8],
        mime_type: &str,
        response_time_s: u32,
    ) -> Result<AudioTurnOutcome> {
        let transcript = self.gateway.transcribe(audio, mime_type).await?;
        if transcript.trim().is_empty() {
            return Err(CoreError::InvalidRequest(
                "audio could not be transcribed".into(),
            ));
        }

        let turn = self
            .chat_turn(thread_id, &transcript, response_time_s)
            .await?;

        let audio_key = if turn.next_question.is_empty() {
            None
        } else {
            let key = tts_key(thread_id, turn.state.candidate_turns());
            let bytes = self.speech.synthesize(&turn.next_question, "ko-KR").await?;
            self.blobs.put_blob(&key, bytes).await?;
            Some(key)
        };

        Ok(AudioTurnOutcome { turn, audio_key })
    }

    /// Latest committed state for a thread, for reconnecting clients.
    pub async fn latest_state(&self, thread_id: &str) -> Result<InterviewState> {
        Ok(self.checkpoints.load_latest(thread_id).await?.state)
    }

    async fn run_turn(
        &self,
        thread_id: &str,
        state: InterviewState,
        response_time_s: u32,
        cancel: &CancelSignal,
    ) -> Result<TurnOutcome> {
        // Node: analyzer.
        let state = self.nodes.analyzer(state, response_time_s).await?;
        self.checkpoints.save(thread_id, &state).await?;
        ensure_live(cancel)?;

        let (state, is_finished) = match state.next_action {
            NextAction::FollowUp => {
                let state = self.nodes.follow_up_generator(state).await?;
                self.checkpoints.save(thread_id, &state).await?;
                (state, false)
            }
            NextAction::NewTopic => {
                let state = self.nodes.retrieve_new_topic(state).await?;
                self.checkpoints.save(thread_id, &state).await?;
                ensure_live(cancel)?;
                if state.next_action == NextAction::WrapUp {
                    // Topic pool ran dry mid-route.
                    let state = self.finish(thread_id, state).await?;
                    (state, true)
                } else {
                    let state = self.nodes.new_question_generator(state).await?;
                    self.checkpoints.save(thread_id, &state).await?;
                    (state, false)
                }
            }
            NextAction::WrapUp => {
                let state = self.finish(thread_id, state).await?;
                (state, true)
            }
        };

        Ok(TurnOutcome {
            thread_id: thread_id.to_string(),
            next_question: state.last_question().unwrap_or_default().to_string(),
            analysis: state.answer_metadata.last().map(|r| r.evaluation.clone()),
            is_finished,
            state,
        })
    }

    /// Node: wrap_up — closing remark, final report, session completion.
    async fn finish(&self, thread_id: &str, state: InterviewState) -> Result<InterviewState> {
        let (state, report, _closing) = self.nodes.wrap_up(state, self.total_time_s).await?;
        self.checkpoints.save(thread_id, &state).await?;

        let total_questions = state.answer_metadata.len() as i64;
        let avg_response_time = if state.answer_metadata.is_empty() {
            0.0
        } else {
            state
                .answer_metadata
                .iter()
                .map(|r| r.response_time_s as f64)
                .sum::<f64>()
                / state.answer_metadata.len() as f64
        };
        self.sessions
            .complete(
                state.session_id,
                SessionStats {
                    total_questions,
                    avg_response_time,
                },
                &serde_json::to_value(&report)?,
            )
            .await?;
        info!(%thread_id, total_questions, "interview completed");
        Ok(state)
    }

    async fn turn_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn ensure_live(cancel: &CancelSignal) -> Result<()> {
    if cancel.is_cancelled() {
        Err(CoreError::Cancelled)
    } else {
        Ok(())
    }
}
