use hookbot::{ChatBackend, ChatError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Chat backend talking to an Ollama-style `POST /api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaBackend {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            model: model.to_string(),
        }
    }
}

impl ChatBackend for OllamaBackend {
    async fn request(&self, prompt: String) -> Result<String, ChatError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|err| ChatError::Transport(err.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|err| ChatError::Transport(err.to_string()))?;
        let reply: GenerateResponse =
            serde_json::from_str(&body).map_err(|err| ChatError::Parse(err.to_string()))?;

        Ok(reply.response.trim().to_string())
    }
}
