//! question answering over a note and its neighbourhood.
//!
//! the shipped backend talks to any openai-compatible
//! `/chat/completions` endpoint with `stream: true` and relays the content
//! deltas as they arrive.

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::BoxStream;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::zettel::NoteSummary;

/// errors from a chat backend.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// the endpoint answered with an error status
    #[error("chat endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// text chunks of one answer.
pub type ChatStream = BoxStream<'static, Result<String, ChatError>>;

/// what the model is asked about.
#[derive(Debug, Clone)]
pub struct ChatPrompt {
    pub question: String,
    pub title: String,
    pub body: String,
    pub links: Vec<NoteSummary>,
    pub backlinks: Vec<NoteSummary>,
}

impl ChatPrompt {
    fn context(&self) -> String {
        let titles = |notes: &[NoteSummary]| {
            if notes.is_empty() {
                "(none)".to_string()
            } else {
                notes
                    .iter()
                    .map(|n| format!("- {}", n.title))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };
        format!(
            "Note: {}\n\n{}\n\nLinks to:\n{}\n\nLinked from:\n{}",
            self.title,
            self.body,
            titles(&self.links),
            titles(&self.backlinks),
        )
    }
}

/// produces streamed answers.
pub trait ChatBackend: Send + Sync {
    fn stream(&self, prompt: ChatPrompt) -> BoxFuture<'_, Result<ChatStream, ChatError>>;
}

const SYSTEM_PROMPT: &str = "You answer questions about a note from a personal zettelkasten. \
     Use the note, the titles of the notes it links to and the notes linking to it. \
     Say so when the notes do not contain the answer.";

/// one `data:` line of a streamed completion.
#[derive(Debug, PartialEq, Eq)]
enum StreamLine {
    Delta(String),
    Done,
    Skip,
}

#[derive(Deserialize)]
struct Chunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

fn parse_stream_line(line: &str) -> StreamLine {
    let Some(data) = line.strip_prefix("data:") else {
        return StreamLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return StreamLine::Done;
    }
    match serde_json::from_str::<Chunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .filter_map(|c| c.delta.content)
            .reduce(|mut a, b| {
                a.push_str(&b);
                a
            })
            .filter(|text| !text.is_empty())
            .map_or(StreamLine::Skip, StreamLine::Delta),
        Err(e) => {
            debug!(error = %e, "ignoring unparseable stream chunk");
            StreamLine::Skip
        }
    }
}

/// openai-compatible chat completions backend.
pub struct OpenAiChatBackend {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

impl OpenAiChatBackend {
    /// `endpoint` is the api base, e.g. `https://api.openai.com/v1`.
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            model: model.into(),
            api_key,
        })
    }

    async fn open(&self, prompt: ChatPrompt) -> Result<ChatStream, ChatError> {
        let body = json!({
            "model": self.model,
            "stream": true,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt.context() },
                { "role": "user", "content": prompt.question },
            ],
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status { status, body });
        }

        let (tx, rx) = mpsc::channel(32);
        let mut bytes = response.bytes_stream();
        tokio::spawn(async move {
            let mut buffer = String::new();
            while let Some(next) = bytes.next().await {
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(error = %e, "chat stream interrupted");
                        let _ = tx.send(Err(ChatError::Http(e))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(end) = buffer.find('\n') {
                    let line: String = buffer.drain(..=end).collect();
                    match parse_stream_line(line.trim_end()) {
                        StreamLine::Delta(text) => {
                            if tx.send(Ok(text)).await.is_err() {
                                // client went away
                                return;
                            }
                        }
                        StreamLine::Done => return,
                        StreamLine::Skip => {}
                    }
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

impl ChatBackend for OpenAiChatBackend {
    fn stream(&self, prompt: ChatPrompt) -> BoxFuture<'_, Result<ChatStream, ChatError>> {
        self.open(prompt).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

    fn prompt() -> ChatPrompt {
        ChatPrompt {
            question: "what antenna?".to_string(),
            title: "Antenna notes".to_string(),
            body: "a dipole for 20m".to_string(),
            links: vec![],
            backlinks: vec![],
        }
    }

    #[test]
    fn test_parse_stream_line() {
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#),
            StreamLine::Delta("Hi".to_string())
        );
        assert_eq!(parse_stream_line("data: [DONE]"), StreamLine::Done);
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            StreamLine::Skip
        );
        assert_eq!(parse_stream_line(": keepalive"), StreamLine::Skip);
        assert_eq!(parse_stream_line("data: {not json"), StreamLine::Skip);
    }

    #[test]
    fn test_context_lists_neighbours() {
        let mut p = prompt();
        p.backlinks.push(NoteSummary {
            id: "x".to_string(),
            title: "Field day".to_string(),
            access: groundwave_org::Access::Private,
            date: None,
        });
        let context = p.context();
        assert!(context.contains("Note: Antenna notes"));
        assert!(context.contains("Links to:\n(none)"));
        assert!(context.contains("- Field day"));
    }

    #[tokio::test]
    async fn test_streams_deltas_until_done() {
        let server = MockServer::start().await;
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"A \"}}]}\n\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"dipole.\"}}]}\n\n\
                    data: [DONE]\n\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n";
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/chat/completions"))
            .and(matchers::header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let backend = OpenAiChatBackend::new(
            &format!("{}/v1/", server.uri()),
            "test-model",
            Some(SecretString::from("sk-test".to_string())),
            Duration::from_secs(5),
        )
        .unwrap();
        let chunks: Vec<String> = backend
            .stream(prompt())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["A ", "dipole."]);
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let backend =
            OpenAiChatBackend::new(&server.uri(), "m", None, Duration::from_secs(5)).unwrap();
        let err = backend.stream(prompt()).await.err().unwrap();
        assert!(matches!(err, ChatError::Status { status: 401, .. }));
    }
}
