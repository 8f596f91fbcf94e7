use async_trait::async_trait;
use serde_json::Value;

pub type InferenceError = Box<dyn std::error::Error + Send + Sync>;

/// Inference collaborator seam. The core only depends on this trait; the
/// concrete backend (OpenAI-compatible server, local Ollama, test stub) is
/// injected by the caller.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn generate(&self, prompt: &str, config: &Value) -> Result<String, InferenceError>;
}

/// Client for any OpenAI-compatible chat completions endpoint. Ollama serves
/// the same API, so one client covers both hosted and local deployments.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model,
        }
    }
}

#[async_trait]
impl InferenceProvider for OpenAiClient {
    async fn generate(&self, prompt: &str, config: &Value) -> Result<String, InferenceError> {
        let temperature = config["temperature"].as_f64().unwrap_or(0.1);
        let max_tokens = config["max_tokens"].as_u64().unwrap_or(512);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": temperature,
                "max_tokens": max_tokens
            }))
            .send()
            .await?
            .error_for_status()?;

        let result: Value = response.json().await?;
        let content = result["choices"][0]["message"]["content"]
            .as_str()
            .ok_or("inference response missing message content")?;

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_parses_chat_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"{\"ok\":true}"}}]}"#,
            )
            .create_async()
            .await;

        let client = OpenAiClient::new(
            "test-key".to_string(),
            Some(server.url()),
            "mistral".to_string(),
        );
        let out = client
            .generate("classify this", &serde_json::json!({}))
            .await
            .expect("generate");

        assert_eq!(out, "{\"ok\":true}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn generate_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .create_async()
            .await;

        let client = OpenAiClient::new(
            "test-key".to_string(),
            Some(server.url()),
            "mistral".to_string(),
        );
        let out = client.generate("classify this", &serde_json::json!({})).await;
        assert!(out.is_err());
    }
}
