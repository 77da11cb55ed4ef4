use petchart_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::confidence::{derive_confidence, Confidence};
use super::decision::{extract_query_text, ClarifyDecision, ToolChoice, ToolSelection};
use super::evidence::{
    sql_context_block, sql_placeholder, transcript_context_block, EvidenceBundle, SqlEvidence,
};
use super::prompts;
use super::trace::TraceEntry;
use crate::config::AgentConfig;
use crate::llm::{ChatMessage, GenerationOptions, Llm};
use crate::retrieve::Retriever;
use crate::tools::{query_structured, search_transcripts, QueryExecutor};

const HISTORY_TURNS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgenticResponse {
    pub final_answer: String,
    pub evidence: EvidenceBundle,
    pub trace: Vec<TraceEntry>,
    pub confidence: Confidence,
    pub confidence_reason: String,
}

enum Phase {
    Clarify,
    SelectTools,
    Gather {
        iteration: u32,
        calls_made: u32,
        selection: ToolSelection,
    },
    Compose,
    Done(Box<AgenticResponse>),
}

#[derive(Clone, Copy)]
enum QueryAttempt {
    Initial,
    Retry,
}

struct Turn<'q> {
    question: &'q str,
    history: &'q [ChatMessage],
    evidence: EvidenceBundle,
    trace: Vec<TraceEntry>,
    // Context blocks for the composing call, in acquisition order.
    context: Vec<String>,
}

/// Drives one question through clarify -> select tools -> gather -> compose.
///
/// Capabilities are called one at a time; an unreachable capability aborts the turn with
/// its error, while rejected or failing queries only show up in the evidence.
pub struct Orchestrator<'a> {
    llm: &'a dyn Llm,
    retriever: Retriever<'a>,
    executor: &'a dyn QueryExecutor,
    config: &'a AgentConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        llm: &'a dyn Llm,
        retriever: Retriever<'a>,
        executor: &'a dyn QueryExecutor,
        config: &'a AgentConfig,
    ) -> Self {
        Self {
            llm,
            retriever,
            executor,
            config,
        }
    }

    pub fn answer(
        &self,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<AgenticResponse, AppError> {
        let mut turn = Turn {
            question,
            history,
            evidence: EvidenceBundle::default(),
            trace: Vec::new(),
            context: Vec::new(),
        };

        let mut phase = Phase::Clarify;
        loop {
            phase = match phase {
                Phase::Clarify => self.clarify(&mut turn)?,
                Phase::SelectTools => self.select_tools(&mut turn)?,
                Phase::Gather {
                    iteration,
                    calls_made,
                    selection,
                } => self.gather(&mut turn, iteration, calls_made, selection)?,
                Phase::Compose => self.compose(&mut turn)?,
                Phase::Done(response) => return Ok(*response),
            };
        }
    }

    fn clarify(&self, turn: &mut Turn<'_>) -> Result<Phase, AppError> {
        let raw = self.llm.complete_prompt(
            &self.config.model,
            &prompts::clarification_prompt(turn.question),
            GenerationOptions::new(0.2, Some(150)),
        )?;
        let decision = ClarifyDecision::parse(&raw);
        tracing::debug!(outcome = decision.outcome(), "clarification check");
        turn.trace.push(
            TraceEntry::new("clarification_check")
                .with("decision", raw.trim())
                .with("outcome", decision.outcome()),
        );

        match decision {
            ClarifyDecision::NeedsClarification(ask) => {
                let final_answer = if ask.is_empty() {
                    "I need a bit more information to help you.".to_string()
                } else {
                    format!("I need a bit more information to help you: {ask}")
                };
                Ok(Phase::Done(Box::new(AgenticResponse {
                    final_answer,
                    evidence: std::mem::take(&mut turn.evidence),
                    trace: std::mem::take(&mut turn.trace),
                    confidence: Confidence::Low,
                    confidence_reason: "Clarification needed before proceeding".to_string(),
                })))
            }
            ClarifyDecision::Proceed(_) | ClarifyDecision::Unrecognized(_) => Ok(Phase::SelectTools),
        }
    }

    fn select_tools(&self, turn: &mut Turn<'_>) -> Result<Phase, AppError> {
        let raw = self.llm.complete_prompt(
            &self.config.model,
            &prompts::tool_selection_prompt(turn.question),
            GenerationOptions::new(0.2, Some(50)),
        )?;
        let choice = ToolChoice::parse(&raw);
        let selection = choice.resolve();
        tracing::debug!(selection = selection.label(), "tool selection");
        turn.trace.push(
            TraceEntry::new("tool_selection")
                .with("choice", raw.trim())
                .with("selection", selection.label())
                .with("recognized", matches!(choice, ToolChoice::Selected(_))),
        );
        Ok(Phase::Gather {
            iteration: 0,
            calls_made: 0,
            selection,
        })
    }

    fn gather(
        &self,
        turn: &mut Turn<'_>,
        iteration: u32,
        calls_made: u32,
        selection: ToolSelection,
    ) -> Result<Phase, AppError> {
        let budget = self.config.max_tool_calls;
        if iteration >= budget || calls_made >= budget {
            tracing::debug!(iteration, calls_made, budget, "tool budget exhausted");
            turn.trace.push(
                TraceEntry::new("tool_budget_exhausted")
                    .with("iterations", iteration)
                    .with("tool_calls_made", calls_made),
            );
            return Ok(Phase::Compose);
        }

        if iteration == 0 {
            let mut calls = calls_made;
            if selection.uses_structured() && calls < budget {
                self.run_generated_query(turn, iteration, QueryAttempt::Initial)?;
                calls += 1;
            }
            if selection.uses_transcripts() && calls < budget {
                self.run_transcript_search(turn, iteration)?;
                calls += 1;
            }
            return Ok(Phase::Gather {
                iteration: 1,
                calls_made: calls,
                selection,
            });
        }

        if !turn.evidence.is_empty() {
            tracing::debug!(iteration, calls_made, "evidence gathered; composing");
            turn.trace.push(
                TraceEntry::new("evidence_sufficient")
                    .with("iteration", iteration)
                    .with("tool_calls_made", calls_made),
            );
            return Ok(Phase::Compose);
        }

        // Only the structured path is retried; transcript search is not repeated.
        self.run_generated_query(turn, iteration, QueryAttempt::Retry)?;
        Ok(Phase::Gather {
            iteration: iteration + 1,
            calls_made: calls_made + 1,
            selection,
        })
    }

    fn run_generated_query(
        &self,
        turn: &mut Turn<'_>,
        iteration: u32,
        attempt: QueryAttempt,
    ) -> Result<(), AppError> {
        let max_rows = self.config.sql_max_rows;
        let (prompt, temperature, step, refined) = match attempt {
            QueryAttempt::Initial => (
                prompts::sql_generation_prompt(turn.question, max_rows),
                0.2,
                format!("iteration_{iteration}_sql_generation"),
                false,
            ),
            QueryAttempt::Retry => (
                prompts::sql_retry_prompt(turn.question, &turn.evidence.sql_queries, max_rows),
                0.3,
                format!("iteration_{iteration}_sql_retry"),
                true,
            ),
        };

        let raw = self.llm.complete_prompt(
            &self.config.model,
            &prompt,
            GenerationOptions::new(temperature, Some(200)),
        )?;
        let sql = extract_query_text(&raw);
        let result = query_structured(self.executor, &sql, max_rows);
        tracing::info!(
            iteration,
            sql = %sql,
            rows = result.row_count,
            failed = result.error.is_some(),
            "structured query attempt"
        );

        turn.trace.push(
            TraceEntry::new(step)
                .with("sql", sql.as_str())
                .with("executed_sql", result.executed_sql.clone())
                .with("row_count", result.row_count)
                .with("error", result.error.clone()),
        );
        turn.evidence.sql_queries.push(sql.clone());

        if result.has_rows() {
            let ev = SqlEvidence::from_result(&sql, &result);
            turn.context.push(sql_context_block(&ev, refined));
            turn.evidence.sql_results.push(ev);
        } else {
            turn.context.push(sql_placeholder(&result, refined));
        }
        Ok(())
    }

    fn run_transcript_search(&self, turn: &mut Turn<'_>, iteration: u32) -> Result<(), AppError> {
        let top_k = self.config.top_k;
        let found = search_transcripts(&self.retriever, turn.question, top_k)?;
        tracing::info!(iteration, hits = found.count, "transcript search");

        turn.trace.push(
            TraceEntry::new(format!("iteration_{iteration}_transcript_search"))
                .with("query", turn.question)
                .with("top_k", top_k)
                .with("hits", found.count),
        );
        turn.context.push(transcript_context_block(&found.chunks));
        turn.evidence.retrieved_chunks.extend(found.chunks);
        Ok(())
    }

    fn compose(&self, turn: &mut Turn<'_>) -> Result<Phase, AppError> {
        let context = if turn.context.is_empty() {
            "No evidence found.".to_string()
        } else {
            turn.context.join("\n\n")
        };

        // Prior turns sit before the evidence so the question being answered comes last.
        let mut messages = vec![ChatMessage::system(prompts::COMPOSE_SYSTEM_PROMPT)];
        let skip = turn.history.len().saturating_sub(HISTORY_TURNS);
        messages.extend(turn.history[skip..].iter().cloned());
        messages.push(ChatMessage::user(prompts::compose_user_message(
            &context,
            turn.question,
        )));

        let final_answer = self.llm.complete(
            &self.config.model,
            &messages,
            GenerationOptions::new(0.2, None),
        )?;

        let (confidence, confidence_reason) = derive_confidence(&turn.evidence);
        tracing::info!(confidence = confidence.as_str(), "composed answer");
        turn.trace.push(
            TraceEntry::new("final_answer")
                .with("confidence", confidence.as_str())
                .with("has_docs", turn.evidence.has_transcripts())
                .with("has_sql", turn.evidence.has_structured_rows()),
        );

        Ok(Phase::Done(Box::new(AgenticResponse {
            final_answer,
            evidence: std::mem::take(&mut turn.evidence),
            trace: std::mem::take(&mut turn.trace),
            confidence,
            confidence_reason,
        })))
    }
}
