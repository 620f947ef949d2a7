//! Prompt construction and response parsing for the two AI calls: a chat turn
//! that yields a [`ResourceBundle`] and a quote search that yields [`Quote`]s.
//!
//! Both calls are constrained to a JSON schema and parsed strictly; any
//! failure surfaces immediately, there is no retry here.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::constants::{
    CHAT_TEMPERATURE, CHAT_TOP_K, CHAT_TOP_P, CONTEXT_WINDOW_MESSAGES, MAX_SEARCH_RESULTS,
    SEARCH_TEMPERATURE,
};
use crate::gemini::{GenerationRequest, GenerativeClient, SamplingParams};
use crate::models::{Message, Quote, ResourceBundle, Scenario};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("The AI model failed to generate a valid response: {0}")]
    Generation(String),
    #[error("The AI model failed to generate a valid response for the search: {0}")]
    Search(String),
}

#[derive(Clone)]
pub struct Gateway {
    client: Arc<dyn GenerativeClient>,
}

impl Gateway {
    pub fn new(client: Arc<dyn GenerativeClient>) -> Self {
        Self { client }
    }

    #[instrument(skip(self, scenario, transcript), fields(scenario_id = scenario.id, messages = transcript.len()))]
    pub async fn request_chat_turn(
        &self,
        scenario: &Scenario,
        transcript: &[Message],
    ) -> Result<ResourceBundle, GatewayError> {
        if transcript.is_empty() {
            return Err(GatewayError::Generation(
                "conversation transcript is empty".to_string(),
            ));
        }

        let request = GenerationRequest {
            system_instruction: chat_system_instruction(scenario),
            user_content: chat_user_prompt(scenario, transcript),
            response_schema: chat_response_schema(),
            sampling: SamplingParams {
                temperature: CHAT_TEMPERATURE,
                top_p: Some(CHAT_TOP_P),
                top_k: Some(CHAT_TOP_K),
            },
        };

        let text = self.client.generate(request).await.map_err(|e| {
            error!("Error calling the AI model for a chat turn: {}", e);
            GatewayError::Generation(e.to_string())
        })?;

        let bundle = parse_resource_bundle(&text)?;
        info!(
            scripture = bundle.scripture.len(),
            quotes = bundle.quotes.len(),
            steps = bundle.practical_steps.len(),
            "Chat turn completed"
        );
        Ok(bundle)
    }

    #[instrument(skip(self))]
    pub async fn search_quotes(&self, query: &str) -> Result<Vec<Quote>, GatewayError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GatewayError::Search("search query is empty".to_string()));
        }

        let request = GenerationRequest {
            system_instruction: search_system_instruction(),
            user_content: search_user_prompt(query),
            response_schema: quote_search_schema(),
            sampling: SamplingParams {
                temperature: SEARCH_TEMPERATURE,
                top_p: None,
                top_k: None,
            },
        };

        let text = self.client.generate(request).await.map_err(|e| {
            error!("Error calling the AI model for quote search: {}", e);
            GatewayError::Search(e.to_string())
        })?;

        let quotes = parse_quotes(&text)?;
        info!(results = quotes.len(), "Quote search completed");
        Ok(quotes)
    }
}

/// The trailing slice of the transcript that is sent as context.
pub fn context_window(transcript: &[Message]) -> &[Message] {
    let start = transcript.len().saturating_sub(CONTEXT_WINDOW_MESSAGES);
    &transcript[start..]
}

pub fn chat_system_instruction(scenario: &Scenario) -> String {
    format!(
        r#"You are a highly knowledgeable and compassionate AI assistant for Seventh-Day Adventist (SDA) chaplains. Your purpose is to provide resources and preliminary guidance based on a robust SDA theological and pastoral framework.

**Core Principles:**
1.  **SDA Theology:** Your guidance must be firmly rooted in SDA beliefs, including the Sabbath, the Sanctuary Doctrine, the State of the Dead, and the Health Message.
2.  **Biblical Foundation:** All counsel must be Scripture-based. Always prioritize the Bible.
3.  **Spirit of Prophecy:** Integrate principles and quotes from Ellen G. White's writings, treating them as an inspired commentary on the Bible.
4.  **Holistic Ministry (SDA Framework):** Address the whole person:
    - **Spiritual:** Prayer, Bible study, connection with God.
    - **Physical:** Principles of healthful living (plant-based diet, exercise, rest).
    - **Mental:** Support for anxiety/depression with a focus on faith and trust in God.
    - **Social:** Community, healthy relationships, reconciliation.
5.  **Compassionate Tone:** Maintain a warm, empathetic, and non-judgmental tone.
6.  **Ethical Boundaries:** Always clarify that you are an AI assistant and not a substitute for a human chaplain, pastor, or licensed therapist. Encourage users to seek human connection and professional help. Never perform sacramental duties.

**Current Scenario:** The user has selected the "{title}" scenario, which focuses on: "{description}". Tailor your response specifically to this context.

Analyze the user's query and provide a structured response in JSON format."#,
        title = scenario.title,
        description = scenario.description,
    )
}

pub fn chat_user_prompt(scenario: &Scenario, transcript: &[Message]) -> String {
    let history = context_window(transcript)
        .iter()
        .map(|msg| format!("{}: {}", msg.role.as_str(), msg.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Conversation History:\n{}\n---\nBased on the latest user message, provide a structured response for the \"{}\" scenario.",
        history, scenario.title
    )
}

pub fn search_system_instruction() -> String {
    format!(
        r#"You are an expert search assistant specializing in the complete published writings of Ellen G. White. Your sole purpose is to locate and return highly relevant quotes based on a user's search query.

**Instructions:**
1.  **Analyze the Query:** Deeply understand the user's query to identify key themes, concepts, and keywords.
2.  **Search Writings:** Search the entire corpus of Ellen G. White's writings for passages that directly address the query.
3.  **Prioritize Relevance:** Select the most relevant and insightful quotes. Return at most {max} results, ordered from most to least relevant.
4.  **Format Output:** Return the results STRICTLY in the specified JSON format. Do not include any conversational text, introductions, or apologies. The output must be a valid JSON array, and an empty array if nothing relevant exists."#,
        max = MAX_SEARCH_RESULTS
    )
}

pub fn search_user_prompt(query: &str) -> String {
    format!("Search query: \"{}\"", query)
}

fn quote_item_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "source": { "type": "STRING", "description": "The source of the quote (e.g., Steps to Christ, p. 48)." },
            "text": { "type": "STRING", "description": "The full text of the quote." }
        },
        "required": ["source", "text"]
    })
}

pub fn chat_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "response": {
                "type": "STRING",
                "description": "A compassionate, conversational response to the user's query, acting as an SDA Chaplaincy assistant. This should directly address their situation and offer pastoral support."
            },
            "scripture": {
                "type": "ARRAY",
                "description": "A list of 2-3 relevant Bible verses that apply to the user's situation.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "reference": { "type": "STRING", "description": "The Bible book, chapter, and verse (e.g., John 3:16)." },
                        "text": { "type": "STRING", "description": "The full text of the Bible verse." }
                    },
                    "required": ["reference", "text"]
                }
            },
            "ellenGWhiteQuote": {
                "type": "ARRAY",
                "description": "A list of 1-2 relevant quotes from Ellen G. White's writings.",
                "items": quote_item_schema()
            },
            "practicalSteps": {
                "type": "ARRAY",
                "description": "A short, bulleted list of 2-4 practical, actionable steps the user can take.",
                "items": { "type": "STRING" }
            },
            "additionalResources": {
                "type": "ARRAY",
                "description": "A list of 1-2 additional resources, such as relevant articles, books, or ministries within the SDA church.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING", "description": "The title of the resource." },
                        "description": { "type": "STRING", "description": "A brief description of what the resource offers." }
                    },
                    "required": ["title", "description"]
                }
            }
        },
        "required": ["response", "scripture", "ellenGWhiteQuote", "practicalSteps", "additionalResources"]
    })
}

pub fn quote_search_schema() -> Value {
    json!({
        "type": "ARRAY",
        "description": format!(
            "A list of up to {} relevant quotes from Ellen G. White's writings based on the search query.",
            MAX_SEARCH_RESULTS
        ),
        "items": quote_item_schema()
    })
}

pub fn parse_resource_bundle(text: &str) -> Result<ResourceBundle, GatewayError> {
    let bundle: ResourceBundle = serde_json::from_str(text.trim()).map_err(|e| {
        debug!(raw = %text, "Chat turn output did not match the response schema");
        GatewayError::Generation(format!("response did not match the expected schema: {}", e))
    })?;

    if bundle.response_text.trim().is_empty() {
        return Err(GatewayError::Generation(
            "response text is empty".to_string(),
        ));
    }
    Ok(bundle)
}

pub fn parse_quotes(text: &str) -> Result<Vec<Quote>, GatewayError> {
    let mut quotes: Vec<Quote> = serde_json::from_str(text.trim()).map_err(|e| {
        debug!(raw = %text, "Quote search output did not match the response schema");
        GatewayError::Search(format!("response did not match the expected schema: {}", e))
    })?;

    if quotes.len() > MAX_SEARCH_RESULTS {
        warn!(
            returned = quotes.len(),
            "Quote search returned more results than requested; truncating"
        );
        quotes.truncate(MAX_SEARCH_RESULTS);
    }
    Ok(quotes)
}
