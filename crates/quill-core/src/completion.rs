/// Inputs of a single inline-completion request.
///
/// Constructed fresh per suggestion request; the engine holds no state
/// across requests. Empty strings are valid and mean "nothing typed yet"
/// (or nothing after the cursor).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Who the user is writing as, e.g. "Customer support agent".
    pub role_description: String,
    /// Text between the start of the field and the cursor.
    pub text_before: String,
    /// Text between the cursor and the end of the field.
    pub text_after: String,
    /// Domain phrases the model should prefer variations of. May be empty.
    pub phrase_hints: Vec<String>,
}

impl CompletionRequest {
    pub fn new(
        role_description: impl Into<String>,
        text_before: impl Into<String>,
        text_after: impl Into<String>,
    ) -> Self {
        Self {
            role_description: role_description.into(),
            text_before: text_before.into(),
            text_after: text_after.into(),
            phrase_hints: Vec::new(),
        }
    }

    pub fn with_phrase_hints(mut self, hints: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.phrase_hints = hints.into_iter().map(Into::into).collect();
        self
    }
}
