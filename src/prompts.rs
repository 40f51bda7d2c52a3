//! Fixed prompts for the anonymization request.
//!
//! The wording is part of the product's behaviour and is not configurable:
//! every request sends exactly these instructions.

use serde::Serialize;

/// System-role instruction establishing the assistant's task.
pub const SYSTEM_PROMPT: &str =
    "You are an expert at anonymizing documents while preserving their professional context.";

/// Enumerated categories of personal data to remove or replace.
pub const CATEGORY_PREAMBLE: &str = "Please anonymize the following text by removing or replacing:
1. Names
2. Phone numbers
3. Email addresses
4. Physical addresses
5. Dates of birth
6. Social security numbers and other government ID numbers
7. Any other personally identifiable information";

/// Line introducing the document text.
pub const TEXT_LEAD_IN: &str = "Here's the text to anonymize:";

/// Role tag of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// The payload sent to the inference gateway: one system and one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymizationRequest {
    pub system: Message,
    pub user: Message,
}

impl AnonymizationRequest {
    /// Wrap extracted document text in the fixed instructions.
    pub fn new(text: &str) -> Self {
        Self {
            system: Message {
                role: Role::System,
                content: SYSTEM_PROMPT.to_string(),
            },
            user: Message {
                role: Role::User,
                content: build_user_prompt(text),
            },
        }
    }

    /// Messages in the order the API expects them.
    pub fn messages(&self) -> [&Message; 2] {
        [&self.system, &self.user]
    }
}

/// User message: category preamble, lead-in line, then the text verbatim.
pub fn build_user_prompt(text: &str) -> String {
    format!("{CATEGORY_PREAMBLE}\n\n{TEXT_LEAD_IN}\n{text}")
}
