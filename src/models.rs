use serde::{Deserialize, Serialize};

/// A selectable ministry focus. Catalog entries are `'static` and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// Opaque key the presentation layer maps to artwork.
    pub icon: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scripture {
    pub reference: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalResource {
    pub title: String,
    pub description: String,
}

/// Pastoral resources generated for one chat turn.
///
/// Field names follow the structured-output schema sent to the model. None of
/// the fields carry `#[serde(default)]`: a missing list is a schema mismatch,
/// an empty one is a legal answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBundle {
    #[serde(rename = "response")]
    pub response_text: String,
    pub scripture: Vec<Scripture>,
    #[serde(rename = "ellenGWhiteQuote")]
    pub quotes: Vec<Quote>,
    #[serde(rename = "practicalSteps")]
    pub practical_steps: Vec<String>,
    #[serde(rename = "additionalResources")]
    pub additional_resources: Vec<AdditionalResource>,
}
