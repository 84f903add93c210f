//! Prompt text for every generation step.

use taxwise_core::FINANCIAL_YEAR;

pub fn plan_system() -> String {
    format!(
        "You are an Indian income-tax planning assistant for {FINANCIAL_YEAR}. \
         Given a taxpayer's known details, list every deduction they could be \
         eligible for. For each deduction give a short eligibility summary, the \
         facts needed to compute it and a search query for the governing law.\n\n\
         Rules:\n\
         - Use the deduction keys exactly as listed in the catalog.\n\
         - Include a deduction even when the facts needed for it are unknown.\n\
         - required_fields may only contain field paths from the field catalog.\n\
         - Respond only with valid JSON."
    )
}

pub fn plan_user(facts: &str, deduction_keys: &[&str], field_paths: &[&str]) -> String {
    format!(
        "Deduction catalog:\n{}\n\nField catalog:\n{}\n\nTaxpayer details:\n{facts}\n\n\
         Return an object mapping each deduction key to \
         {{\"eligibility_criteria\": string, \"required_fields\": [string], \"query\": string}}.",
        deduction_keys.join("\n"),
        field_paths.join("\n"),
    )
}

pub const QUESTION_SYSTEM: &str = "You help an Indian taxpayer complete their tax profile. \
Turn the listed missing fields into short, friendly questions, one per line, \
in the same order as the fields. Do not number the lines or add any other text.";

pub fn question_user(fields: &[String]) -> String {
    format!("Missing fields:\n{}", fields.join("\n"))
}

/// Introduction placed before the questions of a fact request.
pub const QUESTION_INTRO: &str =
    "To give you the most accurate tax advice, I need a few more details:";

/// Notice attached to a re-ask when the reply could not be turned into facts.
pub const REPLY_NOT_UNDERSTOOD: &str =
    "Sorry, I couldn't understand that reply. Please answer the questions again.";

pub const REPLY_HAD_NO_FACTS: &str =
    "I couldn't find any of the requested details in your reply.";

pub const EXTRACTION_SYSTEM: &str = "You extract structured tax facts from a taxpayer's reply. \
Only fill a field when the reply states it. Use null for anything not mentioned or ambiguous; \
never guess a value and never use 0 for a missing amount. When the reply explicitly says an \
amount is zero (\"no donations\", \"nil\"), use 0. Amounts are whole rupees. \
Convert lakh and crore into rupees (1 lakh = 100000).";

pub fn extraction_user(questions: &[String], reply: &str) -> String {
    if questions.is_empty() {
        return format!("Reply:\n{reply}");
    }
    format!("Questions asked:\n{}\n\nReply:\n{reply}", questions.join("\n"))
}

pub fn reason_system() -> String {
    format!(
        "You are an Indian income-tax expert for {FINANCIAL_YEAR}. Using only the legal \
         passages provided, determine the deduction the taxpayer can claim. Give the amount \
         in rupees (or a range when the law leaves it open), a short explanation and the \
         sections or rules relied on. Respond only with valid JSON."
    )
}

pub fn reason_user(deduction: &str, eligibility: &str, facts: &str, context: &str) -> String {
    format!(
        "Deduction: {deduction}\nEligibility: {eligibility}\n\nTaxpayer facts:\n{facts}\n\n\
         Legal passages:\n{context}\n\n\
         Return {{\"amount\": string, \"summary\": string, \"citations\": [string]}}."
    )
}

pub const CHAT_SYSTEM: &str = "You are a friendly Indian income-tax assistant. The first \
message holds the taxpayer's deduction report. Answer follow-up questions about it plainly \
and briefly. Say so when a question needs professional advice.";

pub fn chat_context(report: &str) -> String {
    format!("Here is my tax deduction report:\n\n{report}")
}
