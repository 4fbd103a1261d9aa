use std::sync::Arc;

use quill_core::{ChatMessage, ChatOptions, ChatRequest, CompletionRequest};
use tokio_util::sync::CancellationToken;

use crate::{providers::ChatClient, AiError};

/// Marker the model opens a confident prediction with.
const PREDICTION_PREFIX: &str = "OK:[";
/// Marker terminating every reply; doubles as a generation stop sequence.
const END_MARKER: &str = "END_INSERTION";
/// Placeholder the model substitutes for a factual detail it cannot know.
const NEEDS_INFO_MARKER: &str = "NEED_INFO";
/// Sentinel splitting the user text into before/after-caret halves.
const CURSOR_MARKER: &str = "^^^";

const SYSTEM_PREAMBLE: &str = "\
Predict what text the user in the given ROLE would insert at the cursor position indicated by ^^^.
Only give predictions for which you have an EXTREMELY high confidence that the user would insert that EXACT text.
Do not make up new information. If you're not sure, just reply with NO_PREDICTION.

RULES:
1. Reply with OK:, then in square brackets the predicted text, then END_INSERTION, and no other output.
2. When a specific value or quantity cannot be inferred and would need to be provided, use the word NEED_INFO.
3. If there isn't enough information to predict any words that the user would type next, just reply with the word NO_PREDICTION.
4. NEVER invent new information. If you can't be sure what the user is about to type, ALWAYS stop the prediction with END_INSERTION.";

/// Fixed few-shot turns teaching the reply grammar. Identical for every
/// request; they demonstrate the grammar, not any particular query.
const EXEMPLARS: &[(&str, &str)] = &[
    (
        "ROLE: Family member sending a text\nUSER_TEXT: Hey, it's a nice day - the weather is ^^^",
        "OK:[great!]END_INSERTION",
    ),
    (
        "ROLE: Customer service assistant\nUSER_TEXT: You can find more information on^^^\n\nAlternatively, phone us.",
        "OK:[ our website at NEED_INFO]END_INSERTION",
    ),
    (
        "ROLE: Casual\nUSER_TEXT: Oh I see!\n\nWell sure thing, we can",
        "OK:[ help you out with that!]END_INSERTION",
    ),
    (
        "ROLE: Storyteller\nUSER_TEXT: Sir Digby Chicken Caesar, also know^^^",
        "OK:[n as NEED_INFO]END_INSERTION",
    ),
    (
        "ROLE: Customer support agent\nUSER_TEXT: Goodbye for now.^^^",
        "NO_PREDICTION END_INSERTION",
    ),
    (
        "ROLE: Pirate\nUSER_TEXT: Have you found^^^",
        "OK:[ the treasure, me hearties?]END_INSERTION",
    ),
];

/// Produces inline insertion suggestions for free-text fields.
///
/// Each call is independent: build the prompt scaffold, make exactly one
/// chat call, sanitize the reply. Nothing is cached or retried here.
pub struct CompletionEngine {
    client: Arc<dyn ChatClient>,
}

impl CompletionEngine {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }

    /// Build the full prompt for one insertion-suggestion request.
    ///
    /// Pure: the exemplar turns and generation options are fixed, only the
    /// final user turn carries request data. The caller's text is embedded
    /// with the cursor marker between its before/after halves so the model
    /// predicts text consistent with both sides of the caret.
    pub fn build_prompt(request: &CompletionRequest) -> ChatRequest {
        let mut system = String::from(SYSTEM_PREAMBLE);
        if !request.phrase_hints.is_empty() {
            system.push_str(
                "\nAlways try to use variations on the following phrases as part of the predictions:\n",
            );
            for phrase in &request.phrase_hints {
                system.push_str("- ");
                system.push_str(phrase);
                system.push('\n');
            }
        }

        let mut messages = Vec::with_capacity(EXEMPLARS.len() * 2 + 2);
        messages.push(ChatMessage::system(system));
        for (user, assistant) in EXEMPLARS {
            messages.push(ChatMessage::user(*user));
            messages.push(ChatMessage::assistant(*assistant));
        }
        messages.push(ChatMessage::user(format!(
            "ROLE: {}\nUSER_TEXT: {}{CURSOR_MARKER}{}",
            request.role_description, request.text_before, request.text_after
        )));

        ChatRequest {
            messages,
            options: ChatOptions {
                temperature: Some(0.0),
                max_output_tokens: Some(400),
                stop_sequences: vec![END_MARKER.to_string(), NEEDS_INFO_MARKER.to_string()],
                frequency_penalty: Some(0.0),
                presence_penalty: Some(0.0),
            },
        }
    }

    /// Suggest the text a user would type at the cursor.
    ///
    /// Capability failures surface as errors. A reply that does not follow
    /// the prediction grammar is not an error: it degrades to an empty
    /// suggestion.
    pub async fn suggest(
        &self,
        request: &CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String, AiError> {
        let prompt = Self::build_prompt(request);
        let raw = self.client.chat(prompt, cancel).await?;

        let suggestion = sanitize_response(&raw, &request.text_before);
        if suggestion.is_empty() {
            tracing::debug!(target: "quill.ai", "model declined or reply did not match the prediction grammar");
        }
        Ok(suggestion)
    }
}

/// Reduce a raw model reply to its insertion text, or `""` when the reply
/// does not follow the prediction grammar.
pub(crate) fn sanitize_response(raw: &str, text_before: &str) -> String {
    // Stop sequences normally halt generation before the end marker is
    // emitted; strip it if a backend sent it anyway.
    let raw = raw.strip_suffix(END_MARKER).unwrap_or(raw);

    if !raw.starts_with(PREDICTION_PREFIX) || raw.len() <= PREDICTION_PREFIX.len() + 1 {
        return String::new();
    }

    // Multi-sentence replies tend to drift into invented material, so keep
    // only the first sentence. Truncation fires only when the terminal
    // punctuation is followed by a space; punctuation at end-of-input is
    // left as-is.
    let raw = match raw.bytes().position(|b| matches!(b, b'.' | b'?' | b'!')) {
        Some(p) if p > 0 && raw.as_bytes().get(p + 1) == Some(&b' ') => &raw[..=p],
        _ => raw,
    };

    let trimmed = raw[PREDICTION_PREFIX.len()..].trim_end_matches([']', ' ']);

    // The model is usually right about continuing a word vs. starting a new
    // one, but sometimes adds an unnecessary extra space after a space the
    // user already typed.
    if text_before.ends_with(' ') {
        trimmed.trim_start_matches(' ').to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use quill_core::ChatRole;

    use super::*;

    #[test]
    fn prompt_is_identical_for_identical_requests() {
        let request = CompletionRequest::new("Pirate", "Have you found", "")
            .with_phrase_hints(["walk the plank"]);
        assert_eq!(
            CompletionEngine::build_prompt(&request),
            CompletionEngine::build_prompt(&request)
        );
    }

    #[test]
    fn prompt_ends_with_the_cursor_marked_user_turn() {
        let request = CompletionRequest::new("Casual", "Hello ", "world");
        let prompt = CompletionEngine::build_prompt(&request);

        // One system turn, six exemplar pairs, one live turn.
        assert_eq!(prompt.messages.len(), EXEMPLARS.len() * 2 + 2);

        let last = prompt.messages.last().unwrap();
        assert_eq!(last.role, ChatRole::User);
        assert_eq!(last.content, "ROLE: Casual\nUSER_TEXT: Hello ^^^world");
    }

    #[test]
    fn prompt_options_pin_generation_at_the_grammar_boundaries() {
        let prompt = CompletionEngine::build_prompt(&CompletionRequest::default());
        assert_eq!(prompt.options.temperature, Some(0.0));
        assert_eq!(prompt.options.max_output_tokens, Some(400));
        assert_eq!(
            prompt.options.stop_sequences,
            vec!["END_INSERTION".to_string(), "NEED_INFO".to_string()]
        );
        assert_eq!(prompt.options.frequency_penalty, Some(0.0));
        assert_eq!(prompt.options.presence_penalty, Some(0.0));
    }

    #[test]
    fn phrase_hints_extend_the_system_turn_only_when_present() {
        let bare = CompletionEngine::build_prompt(&CompletionRequest::new("Casual", "", ""));
        assert!(!bare.messages[0].content.contains("variations"));

        let hinted = CompletionEngine::build_prompt(
            &CompletionRequest::new("Casual", "", "")
                .with_phrase_hints(["right away", "best regards"]),
        );
        let system = &hinted.messages[0].content;
        assert!(system.contains(
            "Always try to use variations on the following phrases as part of the predictions:"
        ));
        assert!(system.contains("- right away\n"));
        assert!(system.contains("- best regards\n"));
    }

    #[test]
    fn truncates_to_the_first_sentence_when_punctuation_precedes_a_space() {
        assert_eq!(
            sanitize_response("OK:[great! Thanks.]END_INSERTION", ""),
            "great!"
        );
    }

    #[test]
    fn keeps_the_reply_whole_when_no_sentence_break_is_found() {
        assert_eq!(
            sanitize_response("OK:[ our website at NEED_INFO]END_INSERTION", ""),
            " our website at NEED_INFO"
        );
    }

    #[test]
    fn punctuation_at_end_of_reply_does_not_truncate() {
        assert_eq!(
            sanitize_response("OK:[ the treasure, me hearties?]", "Have you found"),
            " the treasure, me hearties?"
        );
        assert_eq!(sanitize_response("OK:[Goodbye.]", ""), "Goodbye.");
    }

    #[test]
    fn leading_space_is_stripped_only_after_a_trailing_space() {
        assert_eq!(sanitize_response("OK:[ world]", "Hello "), "world");
        assert_eq!(sanitize_response("OK:[ world]", "Hello"), " world");
    }

    #[test]
    fn refusals_and_malformed_replies_become_empty_suggestions() {
        assert_eq!(sanitize_response("NO_PREDICTION END_INSERTION", ""), "");
        assert_eq!(sanitize_response("NO_PREDICTION", ""), "");
        assert_eq!(sanitize_response("", ""), "");
        assert_eq!(sanitize_response("OK:[", ""), "");
        assert_eq!(sanitize_response("nonsense output", ""), "");
    }

    struct CannedClient(String);

    #[async_trait]
    impl ChatClient for CannedClient {
        async fn chat(
            &self,
            _request: ChatRequest,
            _cancel: CancellationToken,
        ) -> Result<String, AiError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn suggest_sanitizes_the_model_reply() {
        let engine = CompletionEngine::new(Arc::new(CannedClient(
            "OK:[ the treasure, me hearties?]".to_string(),
        )));
        let suggestion = engine
            .suggest(
                &CompletionRequest::new("Pirate", "Have you found", ""),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(suggestion, " the treasure, me hearties?");
    }

    #[tokio::test]
    async fn suggest_turns_refusals_into_empty_suggestions() {
        let engine = CompletionEngine::new(Arc::new(CannedClient("NO_PREDICTION".to_string())));
        let suggestion = engine
            .suggest(
                &CompletionRequest::new("Support agent", "Goodbye for now.", ""),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(suggestion, "");
    }
}
