use crate::http::{network_error, new_client, parse_json_response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use trouve_core::{TrouveError, TrouveResult};

const DETECT_PROMPT: &str = "You are cataloging tools and hardware from a photo of a storage \
box. List every distinct item you can identify. Respond with only a JSON array, where each \
element is an object with keys \"item\" (short name), \"brand\" (string or null) and \"type\" \
(category string or null). Do not include any text outside the JSON array.";

/// OpenAI-compatible chat completions client, pointed at OpenRouter by
/// default. Holds no credential; the key is passed per call so it can
/// live alongside the backend credential in the state store.
pub struct ChatApi {
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// An answer plus any follow-up questions the model offered. Follow-ups
/// arrive as trailing lines prefixed with `? ` and are split out so the
/// caller can present them separately.
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub answer: String,
    pub follow_ups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedItem {
    pub item: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

impl ChatApi {
    pub fn new(base_url: &str, model: &str) -> TrouveResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: new_client()?,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn first_content(completion: ChatCompletion) -> TrouveResult<String> {
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| TrouveError::remote("chat response contained no choices"))
    }

    pub fn ask(&self, api_key: &str, messages: &[ChatMessage]) -> TrouveResult<ChatAnswer> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
            }))
            .send()
            .map_err(network_error)?;

        let content = Self::first_content(parse_json_response(response)?)?;
        Ok(split_follow_ups(&content))
    }

    pub fn detect_items(
        &self,
        api_key: &str,
        image_jpeg: &[u8],
        hint: Option<&str>,
    ) -> TrouveResult<Vec<DetectedItem>> {
        let mut prompt = DETECT_PROMPT.to_string();
        if let Some(hint) = hint {
            prompt.push_str(&format!(" The photo is expected to contain {hint}."));
        }
        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(image_jpeg));

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": prompt},
                        {"type": "image_url", "image_url": {"url": data_url}},
                    ],
                }],
            }))
            .send()
            .map_err(network_error)?;

        let content = Self::first_content(parse_json_response(response)?)?;
        parse_detected_items(&content)
    }
}

/// Models wrap JSON in prose or code fences often enough that the array
/// is cut out by bracket position instead of parsing the whole reply.
fn parse_detected_items(raw: &str) -> TrouveResult<Vec<DetectedItem>> {
    let start = raw.find('[');
    let end = raw.rfind(']');

    let array = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            return Err(TrouveError::parse(format!(
                "detection reply contained no JSON array: {}",
                raw.trim()
            )));
        }
    };

    serde_json::from_str(array)
        .map_err(|err| TrouveError::parse(format!("failed to parse detection reply: {err}")))
}

fn split_follow_ups(raw: &str) -> ChatAnswer {
    let mut answer_lines = Vec::new();
    let mut follow_ups = Vec::new();

    for line in raw.lines() {
        if let Some(question) = line.trim_start().strip_prefix("? ") {
            follow_ups.push(question.trim().to_string());
        } else {
            answer_lines.push(line);
        }
    }

    ChatAnswer {
        answer: answer_lines.join("\n").trim().to_string(),
        follow_ups,
    }
}
