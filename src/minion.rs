use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::client::{ChatClient, ChatMessage, Usage};
use crate::extract;
use crate::progress::{self, Event};
use crate::protocol;
use crate::transcript::{self, TranscriptEntry};

/// Fallback text substituted for a model turn that could not be completed.
const APOLOGY: &str =
    "I apologize, but I could not reach the model for this turn. Let's continue with what we have so far.";

const NO_ANSWER: &str = "No answer found.";

const DECIDE_PROMPT: &str = "Now reply with ONLY your JSON decision object. Use \"ask_followup_question\" or \"request_additional_info\" with the next question in \"message\" to continue, or \"provide_final_answer\" / \"end_conversation\" with the complete answer in \"answer\" to finish.";

const FINAL_DECIDE_PROMPT: &str = "This is the final round: you may NOT request more information. Reply with ONLY a JSON decision object using \"provide_final_answer\" and put the complete final answer in the \"answer\" field.";

const FOLLOWUP_ASK_PROMPT: &str = "Do you have a follow-up question for the Supervisor that would help you with the task? If not, reply exactly: No questions at this time.";

const SYNTHESIZE_PROMPT: &str = "The conversation has ended. Using everything discussed above, give your single best final answer to the original task. Reply with the answer only.";

fn supervisor_system_prompt() -> String {
    "You are the Supervisor in a two-agent conversation. A Worker model that holds the task context \
     and can search the web will answer your questions. Ask focused questions, one at a time, and \
     decide when enough has been gathered.\n\n\
     Every reply must contain a JSON object of this form:\n\
     {\"decision\": \"ask_followup_question\" | \"request_additional_info\" | \"provide_final_answer\" | \"end_conversation\", \
     \"message\": \"<your question for the Worker>\", \"answer\": \"<the final answer when terminating>\"}\n\n\
     Begin every question to the Worker with \"@Worker: \"."
        .to_string()
}

fn supervisor_initial_prompt(task: &str) -> String {
    format!(
        "Task: {}\n\nAsk the Worker your first question about this task. Reply with your JSON decision and put the question in the \"message\" field.",
        task
    )
}

fn worker_system_prompt(task: &str, context: &str) -> String {
    format!(
        "You are the Worker. Answer the Supervisor's questions about the task below as concretely as you can.\n\n\
         Task: {}\n\nContext:\n{}\n\n\
         If you need current information from the web, embed the literal string \
         {{\"request\":\"web_search\",\"data\":\"<your query>\"}} in your reply and the results will be \
         provided to you.\n\n\
         If at any point you are certain of the complete final answer, reply with \
         {{\"status\":\"complete\",\"answer\":\"<the answer>\"}}.\n\n\
         Begin every reply with \"@Supervisor: \".",
        task, context
    )
}

fn think_prompt(answer: &str) -> String {
    format!(
        "The Worker replied:\n\n{}\n\nThink step by step: what does this establish, what is still missing, and is there enough to answer the task? Reply with your reasoning only; do not emit a decision yet.",
        answer
    )
}

fn followup_reply_prompt(question: &str) -> String {
    format!(
        "The Worker asks:\n\n{}\n\nAnswer the Worker's question. Reply with your JSON decision and put your reply in the \"message\" field.",
        question
    )
}

fn uniqueness_prompt(answer: &str) -> String {
    format!(
        "Your answer repeated an earlier one:\n\n{}\n\nGive a more unique answer: add new information or take a different angle rather than restating what was already said.",
        answer
    )
}

fn privacy_prompt(task: &str, context: &str) -> String {
    format!(
        "Before the conversation starts, rewrite the task below so it contains no personal identifying information (names, addresses, phone numbers, emails, account numbers) while keeping its meaning intact. Use the context only to understand the task. Reply with the rewritten task only.\n\nTask: {}\n\nContext:\n{}",
        task, context
    )
}

/// First 100 characters of the trimmed text. Deliberately crude: answers
/// diverging only after character 100 collide, and answers sharing a long
/// prefix are treated as duplicates. Kept for behavioral compatibility.
fn fingerprint(text: &str) -> String {
    text.trim().chars().take(100).collect()
}

#[derive(Debug, Clone)]
pub struct MinionConfig {
    pub max_rounds: usize,
    pub enable_followups: bool,
    pub privacy_shield: bool,
    pub log_dir: Option<PathBuf>,
    pub logging_id: Option<String>,
}

impl Default for MinionConfig {
    fn default() -> Self {
        MinionConfig {
            max_rounds: 5,
            enable_followups: true,
            privacy_shield: false,
            log_dir: None,
            logging_id: None,
        }
    }
}

#[derive(Debug)]
pub struct MinionOutput {
    pub final_answer: String,
    pub supervisor_messages: Vec<ChatMessage>,
    pub worker_messages: Vec<ChatMessage>,
    pub local_usage: Usage,
    pub remote_usage: Usage,
    pub log_path: Option<PathBuf>,
}

/// Per-run conversation state, owned exclusively by one `run` invocation.
struct RunState {
    supervisor_messages: Vec<ChatMessage>,
    worker_messages: Vec<ChatMessage>,
    used_questions: HashSet<String>,
    used_answers: HashSet<String>,
    local_usage: Usage,
    remote_usage: Usage,
    transcript: Vec<TranscriptEntry>,
}

impl RunState {
    fn new() -> Self {
        RunState {
            supervisor_messages: Vec::new(),
            worker_messages: Vec::new(),
            used_questions: HashSet::new(),
            used_answers: HashSet::new(),
            local_usage: Usage::default(),
            remote_usage: Usage::default(),
            transcript: Vec::new(),
        }
    }

    /// Append a user turn, merging with a trailing user turn (a follow-up
    /// reply already queued for the worker) to keep roles alternating.
    fn push_user_turn(messages: &mut Vec<ChatMessage>, content: &str) {
        if let Some(last) = messages.last_mut() {
            if last.role == crate::client::Role::User {
                last.content.push_str("\n\n");
                last.content.push_str(content);
                return;
            }
        }
        messages.push(ChatMessage::user(content));
    }
}

/// Round-based Worker/Supervisor dialogue orchestrator. Drives alternating
/// turns between the two clients for up to `max_rounds`, extracts structured
/// decisions from supervisor output, and always terminates with a result.
pub struct Minion {
    worker: Arc<dyn ChatClient>,
    supervisor: Arc<dyn ChatClient>,
    config: MinionConfig,
    progress_tx: Option<mpsc::UnboundedSender<Event>>,
}

impl Minion {
    pub fn new(worker: Arc<dyn ChatClient>, supervisor: Arc<dyn ChatClient>, config: MinionConfig) -> Self {
        Minion {
            worker,
            supervisor,
            config,
            progress_tx: None,
        }
    }

    pub fn set_progress_channel(&mut self, tx: mpsc::UnboundedSender<Event>) {
        self.progress_tx = Some(tx);
    }

    fn send_progress(&self, event: Event) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(event);
        }
    }

    /// One model call with failure substitution: a client error becomes an
    /// apologetic placeholder with zero usage so the round can complete.
    async fn call(&self, client: &Arc<dyn ChatClient>, messages: &[ChatMessage], structured: bool) -> (String, Usage) {
        let result = if structured && client.supports_structured_output() {
            client.chat_json(messages).await
        } else {
            client.chat(messages).await
        };
        match result {
            Ok(outcome) => (outcome.first_response().to_string(), outcome.usage),
            Err(e) => {
                progress::log(format!("model call failed: {}", e));
                (APOLOGY.to_string(), Usage::default())
            }
        }
    }

    /// Worker call over the persisted worker history.
    async fn call_worker(&self, state: &mut RunState) -> String {
        let messages = state.worker_messages.clone();
        self.call_worker_with(state, messages).await
    }

    /// Worker call over an ephemeral message list (re-prompts, pre-passes).
    async fn call_worker_with(&self, state: &mut RunState, messages: Vec<ChatMessage>) -> String {
        let (text, usage) = self.call(&self.worker, &messages, false).await;
        state.local_usage.add(usage);
        self.send_progress(Event::TurnCompleted { role: "worker".to_string() });
        text
    }

    async fn call_supervisor(&self, state: &mut RunState, structured: bool) -> String {
        let messages = state.supervisor_messages.clone();
        let (text, usage) = self.call(&self.supervisor, &messages, structured).await;
        state.remote_usage.add(usage);
        self.send_progress(Event::TurnCompleted { role: "supervisor".to_string() });
        text
    }

    /// Run one conversation to completion. Never fails: degraded paths
    /// produce a placeholder answer instead of an error.
    pub async fn run(&self, task: &str, context: &str) -> MinionOutput {
        self.send_progress(Event::ConversationStarted);
        let mut state = RunState::new();

        let task = if self.config.privacy_shield {
            self.sanitize_task(&mut state, task, context).await
        } else {
            task.to_string()
        };

        state.supervisor_messages.push(ChatMessage::system(supervisor_system_prompt()));
        let initial = supervisor_initial_prompt(&task);
        state.supervisor_messages.push(ChatMessage::user(&initial));
        state.worker_messages.push(ChatMessage::system(worker_system_prompt(&task, context)));

        // SupervisorAsk: the conversation's first question to the worker.
        let first_text = self.call_supervisor(&mut state, true).await;
        state.supervisor_messages.push(ChatMessage::assistant(&first_text));
        state.transcript.push(TranscriptEntry::remote(&initial, &first_text));

        let first_decision = extract::extract_decision(&first_text);
        let mut question = first_decision
            .message
            .clone()
            .unwrap_or_else(|| first_text.clone());
        state.used_questions.insert(fingerprint(&question));

        let mut final_answer: Option<String> = None;

        for round in 0..self.config.max_rounds {
            let last_round = round + 1 == self.config.max_rounds;
            progress::log_with(progress::Kind::Info, format!("round {}/{}", round + 1, self.config.max_rounds));

            // WorkerAnswer
            let question_text = protocol::ensure_prefix(&question, protocol::SUPERVISOR_PREFIX);
            RunState::push_user_turn(&mut state.worker_messages, &question_text);
            let mut answer = self.call_worker(&mut state).await;

            // A worker already certain of the answer short-circuits the loop.
            if let protocol::Utterance::StatusComplete(direct) = protocol::decode(&answer) {
                state.worker_messages.push(ChatMessage::assistant(&answer));
                state.transcript.push(TranscriptEntry::local(&question_text, &answer));
                progress::log_with(progress::Kind::Worker, "worker signaled completion");
                final_answer = Some(direct);
                break;
            }

            // Dedup by fingerprint: one re-prompt for a more unique answer.
            // The trigger prompt stays out of the persisted history.
            if state.used_answers.contains(&fingerprint(&answer)) {
                progress::log_with(progress::Kind::Worker, "duplicate answer, re-prompting for uniqueness");
                let mut retry_messages = state.worker_messages.clone();
                retry_messages.push(ChatMessage::user(uniqueness_prompt(&answer)));
                answer = self.call_worker_with(&mut state, retry_messages).await;
            }
            state.used_answers.insert(fingerprint(&answer));

            let outbound = protocol::ensure_prefix(&protocol::emphasize_opinions(&answer), protocol::WORKER_PREFIX);
            state.worker_messages.push(ChatMessage::assistant(&outbound));
            state.transcript.push(TranscriptEntry::local(&question_text, &outbound));

            // WorkerFollowUp: optional sub-exchange before the supervisor
            // decides.
            if self.config.enable_followups && !last_round {
                self.follow_up_exchange(&mut state).await;
            }

            // SupervisorDecide, step one: free-text reasoning.
            let think = think_prompt(&outbound);
            state.supervisor_messages.push(ChatMessage::user(&think));
            let thoughts = self.call_supervisor(&mut state, false).await;
            state.supervisor_messages.push(ChatMessage::assistant(&thoughts));
            state.transcript.push(TranscriptEntry::remote(&think, &thoughts));

            // Step two: the constrained decision.
            let decide = if last_round { FINAL_DECIDE_PROMPT } else { DECIDE_PROMPT };
            state.supervisor_messages.push(ChatMessage::user(decide));
            let decision_text = self.call_supervisor(&mut state, true).await;
            state.supervisor_messages.push(ChatMessage::assistant(&decision_text));
            state.transcript.push(TranscriptEntry::remote(decide, &decision_text));

            let decision = extract::extract_decision(&decision_text);
            progress::log_with(progress::Kind::Decision, format!("supervisor decision: {}", decision.decision));

            if decision.is_terminal() {
                final_answer = Some(
                    decision
                        .answer
                        .or(decision.message)
                        .unwrap_or_else(|| NO_ANSWER.to_string()),
                );
                break;
            }

            question = decision
                .message
                .or(decision.answer)
                .unwrap_or_else(|| "Please elaborate on your previous answer.".to_string());
            state.used_questions.insert(fingerprint(&question));
            self.send_progress(Event::RoundCompleted(round));
        }

        // Done: no explicit final answer within max_rounds means the worker
        // synthesizes one from the transcript.
        let final_answer = match final_answer {
            Some(answer) => answer,
            None => {
                let mut messages = state.worker_messages.clone();
                messages.push(ChatMessage::user(SYNTHESIZE_PROMPT));
                let synthesized = self.call_worker_with(&mut state, messages).await;
                state.worker_messages.push(ChatMessage::user(SYNTHESIZE_PROMPT));
                state.worker_messages.push(ChatMessage::assistant(&synthesized));
                state.transcript.push(TranscriptEntry::local(SYNTHESIZE_PROMPT, &synthesized));
                if synthesized.trim().is_empty() {
                    NO_ANSWER.to_string()
                } else {
                    synthesized
                }
            }
        };

        self.send_progress(Event::FinalAnswer);

        let log_path = match &self.config.log_dir {
            Some(dir) => {
                match transcript::write(
                    dir,
                    self.config.logging_id.as_deref(),
                    &task,
                    context,
                    &state.transcript,
                    &final_answer,
                ) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        progress::log(format!("failed to write conversation log: {}", e));
                        None
                    }
                }
            }
            None => None,
        };

        MinionOutput {
            final_answer,
            supervisor_messages: state.supervisor_messages,
            worker_messages: state.worker_messages,
            local_usage: state.local_usage,
            remote_usage: state.remote_usage,
            log_path,
        }
    }

    /// Privacy-shield pre-pass: the worker rewrites the task without PII
    /// before any prompt is built. Failure keeps the original task.
    async fn sanitize_task(&self, state: &mut RunState, task: &str, context: &str) -> String {
        let prompt = privacy_prompt(task, context);
        let messages = vec![ChatMessage::user(&prompt)];
        let rewritten = self.call_worker_with(state, messages).await;
        state.transcript.push(TranscriptEntry::local(&prompt, &rewritten));

        let trimmed = rewritten.trim();
        if trimmed.is_empty() || trimmed == APOLOGY {
            task.to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Ask the worker for a follow-up question; if it has one that has not
    /// been seen this run, route it to the supervisor and queue the reply as
    /// the worker's next user turn.
    async fn follow_up_exchange(&self, state: &mut RunState) {
        let mut messages = state.worker_messages.clone();
        messages.push(ChatMessage::user(FOLLOWUP_ASK_PROMPT));
        let reply = self.call_worker_with(state, messages).await;

        let trimmed = reply.trim();
        if trimmed == protocol::NO_QUESTIONS || trimmed.is_empty() || trimmed == APOLOGY {
            return;
        }
        let fp = fingerprint(trimmed);
        if state.used_questions.contains(&fp) {
            return;
        }
        state.used_questions.insert(fp);

        let routed = protocol::ensure_prefix(trimmed, protocol::WORKER_PREFIX);
        state.worker_messages.push(ChatMessage::user(FOLLOWUP_ASK_PROMPT));
        state.worker_messages.push(ChatMessage::assistant(&routed));

        let reply_prompt = followup_reply_prompt(&routed);
        state.supervisor_messages.push(ChatMessage::user(&reply_prompt));
        let supervisor_text = self.call_supervisor(state, true).await;
        state.supervisor_messages.push(ChatMessage::assistant(&supervisor_text));
        state.transcript.push(TranscriptEntry::local(FOLLOWUP_ASK_PROMPT, &routed));
        state.transcript.push(TranscriptEntry::remote(&reply_prompt, &supervisor_text));

        let decision = extract::extract_decision(&supervisor_text);
        if let Some(message) = decision.message {
            let prefixed = protocol::ensure_prefix(&message, protocol::SUPERVISOR_PREFIX);
            state.worker_messages.push(ChatMessage::user(&prefixed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatOutcome, Role};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Worker stub returning scripted responses in order, repeating the last
    /// one when the script runs out. Records every prompt batch it saw.
    struct ScriptedClient {
        script: Vec<String>,
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<&str>) -> Arc<Self> {
            Arc::new(ScriptedClient {
                script: script.into_iter().map(String::from).collect(),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Batches whose newest (last) message contains the needle.
        fn prompts_containing(&self, needle: &str) -> usize {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .filter(|batch| batch.last().map(|m| m.content.contains(needle)).unwrap_or(false))
                .count()
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatOutcome> {
            self.seen.lock().unwrap().push(messages.to_vec());
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self
                .script
                .get(index)
                .or_else(|| self.script.last())
                .cloned()
                .unwrap_or_default();
            Ok(ChatOutcome {
                responses: vec![response],
                usage: Usage { prompt_tokens: 10, completion_tokens: 5 },
                done_reasons: vec!["stop".to_string()],
            })
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ChatClient for FailingClient {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<ChatOutcome> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    fn asking_supervisor() -> Arc<ScriptedClient> {
        // Never terminates on its own: always asks for more.
        ScriptedClient::new(vec![
            r#"{"decision":"ask_followup_question","message":"What do you know about this?"}"#,
        ])
    }

    fn config(max_rounds: usize) -> MinionConfig {
        MinionConfig {
            max_rounds,
            enable_followups: false,
            privacy_shield: false,
            log_dir: None,
            logging_id: None,
        }
    }

    #[tokio::test]
    async fn terminates_within_max_rounds_and_synthesizes() {
        let worker = ScriptedClient::new(vec![
            "@Supervisor: partial answer one.",
            "@Supervisor: partial answer two.",
            "@Supervisor: partial answer three.",
            "synthesized final answer",
        ]);
        let supervisor = asking_supervisor();
        let minion = Minion::new(worker.clone(), supervisor.clone(), config(3));

        let output = minion.run("some task", "some context").await;

        assert_eq!(output.final_answer, "synthesized final answer");
        // 3 worker answers + 1 forced synthesis call.
        assert_eq!(worker.call_count(), 4);
        // Per round: think + decide, plus the initial ask.
        assert_eq!(supervisor.call_count(), 1 + 3 * 2);
        assert!(output.local_usage.prompt_tokens > 0);
        assert!(output.remote_usage.prompt_tokens > 0);
    }

    #[tokio::test]
    async fn supervisor_final_answer_ends_the_run() {
        let worker = ScriptedClient::new(vec!["@Supervisor: Paris is the capital."]);
        let supervisor = ScriptedClient::new(vec![
            r#"{"decision":"ask_followup_question","message":"What is the capital of France?"}"#,
            "It knows the capital. That is sufficient.",
            r#"{"decision":"provide_final_answer","answer":"Paris"}"#,
        ]);
        let minion = Minion::new(worker.clone(), supervisor.clone(), config(5));

        let output = minion.run("capital of France?", "").await;

        assert_eq!(output.final_answer, "Paris");
        assert_eq!(worker.call_count(), 1);
    }

    #[tokio::test]
    async fn worker_completion_signal_short_circuits() {
        let worker = ScriptedClient::new(vec![r#"{"status":"complete","answer":"4"}"#]);
        let supervisor = asking_supervisor();
        let minion = Minion::new(worker.clone(), supervisor.clone(), config(5));

        let output = minion.run("What is 2+2?", "").await;

        assert_eq!(output.final_answer, "4");
        assert_eq!(worker.call_count(), 1);
        // Only the initial supervisor ask happened; no decide steps.
        assert_eq!(supervisor.call_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_answer_triggers_exactly_one_reprompt() {
        let worker = ScriptedClient::new(vec![
            "@Supervisor: the same exact answer.",
            "@Supervisor: the same exact answer.",
            "@Supervisor: a genuinely different answer this time.",
            "synth",
        ]);
        let supervisor = asking_supervisor();
        let minion = Minion::new(worker.clone(), supervisor.clone(), config(2));

        let output = minion.run("task", "").await;

        // Round 1 accepts the first answer; round 2 sees the duplicate and
        // re-prompts exactly once.
        assert_eq!(worker.prompts_containing("Give a more unique answer"), 1);

        let duplicates = output
            .worker_messages
            .iter()
            .filter(|m| m.role == Role::Assistant && m.content.contains("the same exact answer"))
            .count();
        assert_eq!(duplicates, 1, "raw duplicate must not be persisted twice");
        assert!(output
            .worker_messages
            .iter()
            .any(|m| m.content.contains("a genuinely different answer")));
    }

    #[tokio::test]
    async fn failing_clients_still_produce_a_result() {
        let worker: Arc<dyn ChatClient> = Arc::new(FailingClient);
        let supervisor: Arc<dyn ChatClient> = Arc::new(FailingClient);
        let minion = Minion::new(worker, supervisor, config(2));

        let output = minion.run("task", "context").await;

        // Every call failed, usage stays zero, and a degraded answer comes
        // back instead of an error.
        assert_eq!(output.local_usage, Usage::default());
        assert_eq!(output.remote_usage, Usage::default());
        assert!(!output.final_answer.is_empty());
    }

    #[tokio::test]
    async fn worker_messages_carry_role_prefixes() {
        let worker = ScriptedClient::new(vec!["no prefix answer", "synth"]);
        let supervisor = asking_supervisor();
        let minion = Minion::new(worker, supervisor, config(1));

        let output = minion.run("task", "").await;

        let answer_turn = output
            .worker_messages
            .iter()
            .find(|m| m.role == Role::Assistant && m.content.contains("no prefix answer"))
            .expect("worker answer persisted");
        assert!(answer_turn.content.starts_with(protocol::WORKER_PREFIX));

        let question_turn = output
            .worker_messages
            .iter()
            .find(|m| m.role == Role::User)
            .expect("question persisted");
        assert!(question_turn.content.starts_with(protocol::SUPERVISOR_PREFIX));
    }

    #[tokio::test]
    async fn followup_routes_question_to_supervisor() {
        let worker = ScriptedClient::new(vec![
            "@Supervisor: here is my answer.",
            "Is there a deadline for this task?",
            "@Supervisor: second answer.",
            "synth",
        ]);
        let supervisor = ScriptedClient::new(vec![
            r#"{"decision":"ask_followup_question","message":"First question?"}"#,
            r#"{"decision":"ask_followup_question","message":"No deadline, take your time."}"#,
            "reasoning text",
            r#"{"decision":"ask_followup_question","message":"Next question?"}"#,
        ]);
        let mut cfg = config(2);
        cfg.enable_followups = true;
        let minion = Minion::new(worker.clone(), supervisor.clone(), cfg);

        let output = minion.run("task", "").await;

        assert_eq!(supervisor.prompts_containing("Is there a deadline for this task?"), 1);
        // The supervisor's follow-up reply reached the worker history.
        assert!(output
            .worker_messages
            .iter()
            .any(|m| m.role == Role::User && m.content.contains("No deadline, take your time.")));
        assert!(!output.final_answer.is_empty());
    }

    #[tokio::test]
    async fn log_file_written_when_dir_configured() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ScriptedClient::new(vec![r#"{"status":"complete","answer":"42"}"#]);
        let supervisor = asking_supervisor();
        let mut cfg = config(2);
        cfg.log_dir = Some(dir.path().to_path_buf());
        let minion = Minion::new(worker, supervisor, cfg);

        let output = minion.run("meaning of life", "").await;

        let path = output.log_path.expect("log path");
        let raw = std::fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["generatedFinalAnswer"], "42");
        assert_eq!(value["task"], "meaning of life");
        assert!(value["conversation"].as_array().unwrap().len() >= 2);
    }

    #[tokio::test]
    async fn privacy_shield_rewrites_task() {
        let worker = ScriptedClient::new(vec![
            "Summarize the customer's complaint about billing.",
            r#"{"status":"complete","answer":"done"}"#,
        ]);
        let supervisor = asking_supervisor();
        let mut cfg = config(2);
        cfg.privacy_shield = true;
        let minion = Minion::new(worker, supervisor.clone(), cfg);

        let output = minion.run("Summarize John Smith's complaint about billing.", "ctx").await;

        // The sanitized task is what the supervisor was seeded with.
        assert!(output
            .supervisor_messages
            .iter()
            .any(|m| m.content.contains("Summarize the customer's complaint about billing.")));
        assert!(!output.final_answer.is_empty());
    }
}
