//! Prompt for e-mail classification.
//!
//! Kept apart from the client so tests can inspect it and so the taxonomy can
//! change without touching the call or parsing logic in
//! [`crate::pipeline::llm`].

/// Category for messages that need an action or answer from the team.
pub const CATEGORY_PRODUCTIVE: &str = "produtivo";

/// Category for messages that need no action (greetings, thanks, noise).
pub const CATEGORY_UNPRODUCTIVE: &str = "improdutivo";

/// Instruction prepended to every document sent for classification.
///
/// The document text is appended after the final line.
pub const CLASSIFICATION_PROMPT: &str = r#"You are an assistant that triages e-mails received by the customer support team of a financial services company.

Classify the e-mail below into exactly one category:

- "produtivo": the e-mail requires an action or a reply (support requests, questions about a case or order status, system problems, document submissions that must be handled).
- "improdutivo": the e-mail requires no action (congratulations, thanks, holiday greetings, personal messages, spam).

Confidence:
- "confidence" is a number between 0.0 and 1.0 expressing how sure you are of the category.
- Use values above 0.9 only when the intent is unambiguous; use values near 0.5 when the e-mail could fit either category.

Reply:
- "suggested_reply" is a short, polite and professional reply in Brazilian Portuguese that the team could send as-is.
- For "produtivo" e-mails, acknowledge the request and state the next step; for "improdutivo" e-mails, thank the sender briefly.

Answer with a single JSON object and nothing else, using exactly this schema:

{
  "category": "produtivo" | "improdutivo",
  "confidence": <number between 0.0 and 1.0>,
  "suggested_reply": "<reply text>",
  "reasoning": "<one sentence explaining the decision>"
}

E-mail:
"#;

/// Full prompt for `content`.
pub fn classification_prompt(content: &str) -> String {
    let mut prompt = String::with_capacity(CLASSIFICATION_PROMPT.len() + content.len());
    prompt.push_str(CLASSIFICATION_PROMPT);
    prompt.push_str(content);
    prompt
}
