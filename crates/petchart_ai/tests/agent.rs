mod common;

use petchart_ai::agent::{Confidence, Orchestrator};
use petchart_ai::config::AgentConfig;
use petchart_ai::llm::{ChatMessage, Role};
use petchart_ai::retrieve::{ChunkRecord, MemoryStore, Retriever};
use petchart_ai::tools::SqliteExecutor;
use pretty_assertions::assert_eq;

use common::{seeded_executor, KeywordEmbedder, ScriptedLlm};

const DAISY_CBC: &str = "```sql\nSELECT * FROM v_results WHERE pet_name = 'Daisy' AND test_name = 'CBC' ORDER BY visit_datetime DESC LIMIT 50;\n```";

fn steps(trace: &[petchart_ai::agent::TraceEntry]) -> Vec<&str> {
    trace.iter().map(|t| t.step.as_str()).collect()
}

fn tool_invocations(trace: &[petchart_ai::agent::TraceEntry]) -> usize {
    trace.iter().filter(|t| t.step.starts_with("iteration_")).count()
}

fn transcripts() -> MemoryStore {
    MemoryStore::with_chunks(vec![
        ChunkRecord {
            text: "Owner reports Daisy is drinking more water than usual.".to_string(),
            source: "intake.md".to_string(),
            embedding: vec![0.0, 1.0, 0.0, 0.0],
        },
        ChunkRecord {
            text: "Plan: recheck kidney values in two weeks, kidney-friendly diet.".to_string(),
            source: "plan.md".to_string(),
            embedding: vec![2.0, 0.0, 1.0, 0.0],
        },
    ])
}

struct Harness {
    config: AgentConfig,
    store: MemoryStore,
    embedder: KeywordEmbedder,
    exec: SqliteExecutor,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(store: MemoryStore) -> Self {
        let (dir, _path, exec) = seeded_executor();
        Self {
            config: AgentConfig::default(),
            store,
            embedder: KeywordEmbedder::default(),
            exec,
            _dir: dir,
        }
    }

    fn orchestrator<'a>(&'a self, llm: &'a ScriptedLlm) -> Orchestrator<'a> {
        let retriever = Retriever::new(&self.store, &self.embedder, &self.config.embed_model);
        Orchestrator::new(llm, retriever, &self.exec, &self.config)
    }
}

#[test]
fn latest_cbc_with_empty_store_is_medium_confidence() {
    let h = Harness::new(MemoryStore::new());
    let llm = ScriptedLlm::new(&[
        "PROCEED: the pet and the test are named",
        "BOTH",
        DAISY_CBC,
        "Daisy's most recent CBC shows a high white cell count.",
    ]);

    let resp = h
        .orchestrator(&llm)
        .answer("What were Daisy's latest CBC results?", &[])
        .expect("answer");

    assert_eq!(resp.confidence, Confidence::Medium);
    assert_eq!(resp.confidence_reason, "Answer grounded in diagnostic data");
    assert_eq!(
        resp.final_answer,
        "Daisy's most recent CBC shows a high white cell count."
    );
    assert!(resp.evidence.retrieved_chunks.is_empty());
    assert_eq!(resp.evidence.sql_results.len(), 1);
    assert!(resp.evidence.sql_results[0].row_count > 0);
    assert!(resp.evidence.sql_results[0].preview.len() <= 10);
    assert_eq!(
        resp.evidence.sql_queries,
        vec!["SELECT * FROM v_results WHERE pet_name = 'Daisy' AND test_name = 'CBC' ORDER BY visit_datetime DESC LIMIT 50".to_string()]
    );
    assert_eq!(h.embedder.calls.get(), 0);
    assert_eq!(llm.call_count(), 4);

    assert_eq!(
        steps(&resp.trace),
        vec![
            "clarification_check",
            "tool_selection",
            "iteration_0_sql_generation",
            "iteration_0_transcript_search",
            "evidence_sufficient",
            "final_answer",
        ]
    );
    let sql_step = &resp.trace[2];
    assert_eq!(
        sql_step.field("executed_sql").and_then(|v| v.as_str()),
        Some("SELECT * FROM v_results WHERE pet_name = 'Daisy' AND test_name = 'CBC' ORDER BY visit_datetime DESC LIMIT 50")
    );

    let compose = llm.calls.borrow()[3].clone();
    assert_eq!(compose.messages[0].role, Role::System);
    let user = &compose.messages.last().expect("user message").content;
    assert!(user.contains("Lab Results:"), "{user}");
    assert!(user.contains("No relevant transcript excerpts found."), "{user}");
    assert!(user.contains("User question: What were Daisy's latest CBC results?"));
}

#[test]
fn transcripts_and_rows_give_high_confidence() {
    let h = Harness::new(transcripts());
    let llm = ScriptedLlm::new(&[
        "PROCEED",
        "BOTH",
        "SELECT analyte_code, value_num, flag FROM v_results WHERE analyte_code IN ('BUN', 'CREA')",
        "Kidney values are above range; discuss the recheck plan with your veterinarian.",
    ]);

    let resp = h
        .orchestrator(&llm)
        .answer("Should I worry about Daisy's kidney values?", &[])
        .expect("answer");

    assert_eq!(resp.confidence, Confidence::High);
    assert_eq!(
        resp.confidence_reason,
        "Answer grounded in both transcript and diagnostic data"
    );
    assert_eq!(resp.evidence.retrieved_chunks.len(), 2);
    assert_eq!(resp.evidence.retrieved_chunks[0].chunk_id, 1);
    assert_eq!(resp.evidence.retrieved_chunks[0].source_doc, "plan.md");
    assert_eq!(resp.evidence.sql_results[0].row_count, 2);
    assert_eq!(h.embedder.calls.get(), 1);

    let user = llm.prompt(3);
    let lab = user.find("Lab Results:").expect("lab block");
    let docs = user.find("Visit Transcript Excerpts:").expect("transcript block");
    assert!(lab < docs, "evidence blocks keep acquisition order");
    assert!(user.contains("[1] From plan.md (score: "));
}

#[test]
fn clarification_short_circuits_without_tools() {
    let h = Harness::new(transcripts());
    let llm = ScriptedLlm::new(&["NEEDS_CLARIFICATION: Which pet are you asking about?"]);

    let resp = h
        .orchestrator(&llm)
        .answer("Are the results bad?", &[])
        .expect("answer");

    assert_eq!(
        resp.final_answer,
        "I need a bit more information to help you: Which pet are you asking about?"
    );
    assert_eq!(resp.confidence, Confidence::Low);
    assert_eq!(resp.confidence_reason, "Clarification needed before proceeding");
    assert!(resp.evidence.is_empty());
    assert!(resp.evidence.sql_queries.is_empty());
    assert_eq!(steps(&resp.trace), vec!["clarification_check"]);
    assert_eq!(
        resp.trace[0].field("outcome").and_then(|v| v.as_str()),
        Some("needs_clarification")
    );
    assert_eq!(llm.call_count(), 1);
    assert_eq!(h.embedder.calls.get(), 0);
}

#[test]
fn empty_structured_result_triggers_one_refined_query() {
    let h = Harness::new(MemoryStore::new());
    let llm = ScriptedLlm::new(&[
        "PROCEED: lab question",
        "SQL_ONLY",
        "SELECT * FROM v_results WHERE pet_name = 'daisy'",
        "SELECT * FROM v_results WHERE pet_name = 'Daisy' LIMIT 5",
        "Here are Daisy's results.",
    ]);

    let resp = h
        .orchestrator(&llm)
        .answer("Show me Daisy's labs", &[])
        .expect("answer");

    assert_eq!(resp.confidence, Confidence::Medium);
    assert_eq!(resp.evidence.sql_queries.len(), 2);
    assert_eq!(resp.evidence.sql_results.len(), 1);
    assert_eq!(resp.evidence.sql_results[0].row_count, 5);
    assert_eq!(
        steps(&resp.trace),
        vec![
            "clarification_check",
            "tool_selection",
            "iteration_0_sql_generation",
            "iteration_1_sql_retry",
            "evidence_sufficient",
            "final_answer",
        ]
    );

    let calls = llm.calls.borrow();
    assert_eq!(calls[3].options.temperature, 0.3);
    assert!(calls[3].messages[0]
        .content
        .contains("SELECT * FROM v_results WHERE pet_name = 'daisy'"));
    drop(calls);

    let user = llm.prompt(4);
    assert!(user.contains("SQL query returned no results."), "{user}");
    assert!(user.contains("Lab Results (refined query):"), "{user}");
}

#[test]
fn tool_calls_never_exceed_the_budget() {
    for max_tool_calls in 0..=4u32 {
        let mut h = Harness::new(MemoryStore::new());
        h.config.max_tool_calls = max_tool_calls;
        // Every generated statement is refused so the loop never finds evidence.
        let llm = ScriptedLlm::new(&[
            "PROCEED",
            "BOTH",
            "DROP TABLE pets",
            "DELETE FROM pets",
            "UPDATE pets SET name = 'x'",
            "INSERT INTO pets VALUES (1)",
            "I could not find any evidence for that.",
        ]);

        let resp = h
            .orchestrator(&llm)
            .answer("What is Daisy's WBC?", &[])
            .expect("answer");

        assert!(
            tool_invocations(&resp.trace) <= max_tool_calls as usize,
            "budget {max_tool_calls}: {:?}",
            steps(&resp.trace)
        );
        assert_eq!(resp.confidence, Confidence::Low);
        assert_eq!(resp.confidence_reason, "Limited evidence available");
        assert_eq!(
            resp.trace.last().map(|t| t.step.as_str()),
            Some("final_answer")
        );
    }
}

#[test]
fn budget_of_one_runs_only_the_structured_query() {
    let mut h = Harness::new(transcripts());
    h.config.max_tool_calls = 1;
    let llm = ScriptedLlm::new(&["PROCEED", "BOTH", "DROP TABLE pets", "No evidence."]);

    let resp = h
        .orchestrator(&llm)
        .answer("What is Daisy's WBC?", &[])
        .expect("answer");

    assert_eq!(
        steps(&resp.trace),
        vec![
            "clarification_check",
            "tool_selection",
            "iteration_0_sql_generation",
            "tool_budget_exhausted",
            "final_answer",
        ]
    );
    assert_eq!(
        resp.trace[2].field("error").and_then(|v| v.as_str()),
        Some("forbidden keyword: DROP")
    );
    assert_eq!(h.embedder.calls.get(), 0);
    assert!(llm.prompt(3).contains("SQL Error: forbidden keyword: DROP"));
}

#[test]
fn zero_budget_composes_from_no_evidence() {
    let mut h = Harness::new(transcripts());
    h.config.max_tool_calls = 0;
    let llm = ScriptedLlm::new(&["PROCEED", "DOCS_ONLY", "I don't have enough information."]);

    let resp = h
        .orchestrator(&llm)
        .answer("What did the vet say about diet?", &[])
        .expect("answer");

    assert_eq!(resp.confidence, Confidence::Low);
    assert_eq!(llm.call_count(), 3);
    assert!(llm.prompt(2).contains("Evidence gathered:\n\nNo evidence found."));
}

#[test]
fn unexpected_replies_fall_back_to_both_sources() {
    let h = Harness::new(transcripts());
    let llm = ScriptedLlm::new(&[
        "Sure, happy to help with that.",
        "I would look everywhere.",
        DAISY_CBC,
        "Answer.",
    ]);

    let resp = h
        .orchestrator(&llm)
        .answer("Tell me about Daisy's water intake and CBC", &[])
        .expect("answer");

    assert_eq!(
        resp.trace[0].field("outcome").and_then(|v| v.as_str()),
        Some("unrecognized")
    );
    assert_eq!(
        resp.trace[1].field("selection").and_then(|v| v.as_str()),
        Some("BOTH")
    );
    assert_eq!(
        resp.trace[1].field("recognized").and_then(|v| v.as_bool()),
        Some(false)
    );
    assert_eq!(resp.confidence, Confidence::High);
}

#[test]
fn composing_call_sees_only_recent_history() {
    let h = Harness::new(MemoryStore::new());
    let llm = ScriptedLlm::new(&["PROCEED", "SQL_ONLY", DAISY_CBC, "Answer."]);
    let history = vec![
        ChatMessage::user("first question"),
        ChatMessage::assistant("first answer"),
        ChatMessage::user("second question"),
        ChatMessage::assistant("second answer"),
        ChatMessage::user("third question"),
    ];

    h.orchestrator(&llm)
        .answer("And the CBC?", &history)
        .expect("answer");

    let calls = llm.calls.borrow();
    let compose = &calls[3];
    assert_eq!(compose.messages.len(), 5);
    assert_eq!(&compose.messages[1..4], &history[2..]);
    assert_eq!(compose.options.max_tokens, None);
}

#[test]
fn unreachable_model_fails_the_turn() {
    let h = Harness::new(MemoryStore::new());
    let llm = ScriptedLlm::new(&["PROCEED"]);

    let err = h
        .orchestrator(&llm)
        .answer("What is Daisy's WBC?", &[])
        .unwrap_err();
    assert_eq!(err.code, "AI_COMPLETION_FAILED");
}

#[test]
fn response_serializes_with_flat_trace_fields() {
    let h = Harness::new(MemoryStore::new());
    let llm = ScriptedLlm::new(&["PROCEED", "SQL_ONLY", DAISY_CBC, "Answer."]);

    let resp = h
        .orchestrator(&llm)
        .answer("What were Daisy's latest CBC results?", &[])
        .expect("answer");
    let v = serde_json::to_value(&resp).expect("json");

    assert_eq!(v["confidence"], "Medium");
    assert_eq!(v["trace"][1]["step"], "tool_selection");
    assert_eq!(v["trace"][1]["selection"], "SQL_ONLY");
    assert!(v["evidence"]["sql_results"][0]["preview"].is_array());
}
