//! The instructional prompt wrapped around a transcript.

const IDENTITY: &str = "You are an assistant that reads Slack conversations and writes short, \
high-value recaps. Keep answers impersonal and never repeat sensitive information verbatim.";

const INSTRUCTIONS: &str = r#"Extract the most important information from the transcript below and present it clearly.
1. Transcript format:
   * Messages look like `<@USERID> (DisplayName): message content`.
   * Thread replies are indented with an arrow, e.g. `  ↳ <@USERID> (DisplayName): reply content`.
     Treat a message and its replies as one conversational unit.
2. Focus only on:
   * Significant topics discussed.
   * Decisions made or proposed.
   * Action items and who owns them.
   * Important links or files shared.
3. Ignore:
   * Join/leave notices.
   * Greetings, thanks and other acknowledgements.
   * Chit-chat that adds no substance.
   * Emoji and reactions unless they change the meaning.
4. Output format:
   * Exactly 4–6 concise bullet points.
   * Start each bullet point with "• ".
   * When referring to a user, write only the mention syntax from the transcript (`<@USERID>`), never the name in parentheses and never '@name'.
   * If a person has no clear user id, use the name the conversation uses for them, without an @.
5. Be concise:
   * Merge related points into one bullet.
   * State outcomes, not how the conversation went.
   * Do not introduce names, actions or facts that are not in the transcript."#;

const DATE_TOKENS: &str = "   * Slack date tokens (`<!date^…^…|…>`) in the transcript may be copied into bullets \
unchanged. Only include dates when they matter to a decision or action.";

#[derive(Clone, Copy, Debug, Default)]
pub struct PromptOptions {
    /// The transcript carries date tokens.
    pub timestamps: bool,
}

/// Wrap a transcript in the recap instructions.
pub fn build_prompt(transcript: &str, opts: PromptOptions) -> String {
    let mut instructions = INSTRUCTIONS.to_string();
    if opts.timestamps {
        instructions.push('\n');
        instructions.push_str(DATE_TOKENS);
    }

    format!(
        "<identity>\n{IDENTITY}\n</identity>\n<instructions>\n{instructions}\n</instructions>\nHere is the conversation transcript:\n{}",
        transcript.trim_end()
    )
}
