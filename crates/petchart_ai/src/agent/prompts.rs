const ROLE_PREAMBLE: &str = "You are a veterinary clinic assistant for demo purposes only.";

const SCHEMA: &str = r#"Available tables/views:
- v_results: view with visit_id, visit_datetime, pet_id, pet_name, species, test_id, test_name, specimen_type, analyte_code, analyte_name, value_num, value_text, unit, flag, ref_low, ref_high
- visits: visit_id, pet_id, clinic_name, visit_datetime, chief_complaint, notes
- pets: pet_id, owner_id, name, species, breed, sex, date_of_birth, weight_kg
- tests: test_id, visit_id, test_name, specimen_type, ordered_datetime, result_datetime, status"#;

pub const COMPOSE_SYSTEM_PROMPT: &str = r#"You are a veterinary clinic assistant for demo purposes only.

You must ground answers in:
- transcript excerpts (when available)
- diagnostic data (when available)

If you cannot find evidence, say so explicitly.
Keep medical guidance cautious and phrased as "next steps to discuss with your veterinarian."
Do not invent lab values or test results.
"#;

pub fn clarification_prompt(question: &str) -> String {
    format!(
        r#"{ROLE_PREAMBLE}

The user asked: "{question}"

Do you need clarification to answer this question?
- If the question mentions a pet name (like "Daisy") and asks about test results, lab values, or visits, you can PROCEED - you can query the database.
- If the question says "most recent", "latest", "last visit", etc., you can PROCEED - you can use SQL ORDER BY to find the most recent.
- Only ask for clarification if the question is completely unclear or missing critical information that cannot be inferred from the database.

Respond with ONLY one of:
- "NEEDS_CLARIFICATION: [your clarifying question]" (only if truly necessary)
- "PROCEED: [brief reason why you can proceed]"
"#
    )
}

pub fn tool_selection_prompt(question: &str) -> String {
    format!(
        r#"{ROLE_PREAMBLE}

The user asked: "{question}"

You have two tools available:
1. search_transcripts - Search visit transcripts/conversations
2. query_diagnostics - Query lab test results and diagnostic data

Based on the question, which tool(s) should you use FIRST?
- If question mentions "lab values / test results / abnormal / ALT / WBC / last visit results" -> use SQL (query_diagnostics) first
- If question mentions "what did the vet say / symptoms / advice / discharge instructions" -> use docs (search_transcripts) first
- If question is "what does this lab mean?" or needs both -> use both

Respond with ONLY one of:
- "SQL_ONLY"
- "DOCS_ONLY"
- "BOTH"
"#
    )
}

pub fn sql_generation_prompt(question: &str, max_rows: u64) -> String {
    format!(
        r#"You are a veterinary clinic assistant. Generate a SQL query to answer: "{question}"

{SCHEMA}

Important:
- For "most recent", "latest", "last visit" queries, use ORDER BY visit_datetime DESC
- Filter by pet_name using WHERE pet_name = 'Daisy' (or other pet name from the question)
- Filter by test_name using WHERE test_name = 'CBC' (or other test name)
- Use v_results view when querying test results - it has all the data you need
- Always include LIMIT {max_rows} (or smaller if appropriate)

Examples:
- "most recent CBC for Daisy" -> SELECT * FROM v_results WHERE pet_name = 'Daisy' AND test_name = 'CBC' ORDER BY visit_datetime DESC LIMIT {max_rows}
- "CBC results for Daisy on 2026-01-09" -> SELECT * FROM v_results WHERE pet_name = 'Daisy' AND test_name = 'CBC' AND visit_datetime LIKE '2026-01-09%' LIMIT {max_rows}

Generate ONLY a single valid SQL SELECT statement. Do not include explanations, just the SQL query.
"#
    )
}

pub fn sql_retry_prompt(question: &str, previous: &[String], max_rows: u64) -> String {
    let tried = if previous.is_empty() {
        "(none)".to_string()
    } else {
        previous
            .iter()
            .map(|q| format!("- {q}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        r#"The user asked: "{question}"

Previous SQL queries returned no results:
{tried}

Try a different approach (for example a looser filter or a different table).
{SCHEMA}

Generate a single SQL SELECT statement. Always include LIMIT {max_rows}. Just the SQL, no explanations.
"#
    )
}

pub fn compose_user_message(context: &str, question: &str) -> String {
    format!(
        "Evidence gathered:\n\n{context}\n\nUser question: {question}\n\nProvide a helpful answer grounded in the evidence above."
    )
}
