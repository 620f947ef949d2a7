#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chaplaincy::gateway::Gateway;
use chaplaincy::gemini::{ClientError, GenerationRequest, GenerativeClient};
use tokio::sync::Notify;

pub const CRISIS_BUNDLE: &str = r#"{
    "response": "I'm so sorry. Grief like this needs gentle presence.",
    "scripture": [
        {"reference": "Psalm 34:18", "text": "The LORD is nigh unto them that are of a broken heart"},
        {"reference": "1 Thessalonians 4:13", "text": "Sorrow not, even as others which have no hope"}
    ],
    "ellenGWhiteQuote": [
        {"source": "The Ministry of Healing, p. 249", "text": "Nothing tends more to promote health of body and of soul than does a spirit of gratitude and praise."}
    ],
    "practicalSteps": ["Offer a ministry of presence", "Pray with her if she wishes", "Connect her with a grief support group"],
    "additionalResources": []
}"#;

/// Replies with queued responses in order, recording every request.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, ClientError>>>,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(self: &Arc<Self>, text: &str) -> Arc<Self> {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self.clone()
    }

    pub fn fail(self: &Arc<Self>, error: ClientError) -> Arc<Self> {
        self.replies.lock().unwrap().push_back(Err(error));
        self.clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeClient for ScriptedClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ClientError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ClientError::EmptyResponse))
    }
}

/// Blocks inside `generate` until released, so a call can be held in flight.
pub struct GatedClient {
    pub started: Notify,
    pub release: Notify,
    reply: String,
}

impl GatedClient {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            release: Notify::new(),
            reply: reply.to_string(),
        })
    }
}

#[async_trait]
impl GenerativeClient for GatedClient {
    async fn generate(&self, _request: GenerationRequest) -> Result<String, ClientError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.reply.clone())
    }
}

pub fn gateway(client: Arc<dyn GenerativeClient>) -> Gateway {
    Gateway::new(client)
}
