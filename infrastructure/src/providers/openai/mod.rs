//! OpenAI-compatible provider
//!
//! Chat completions (plain and SSE) and embeddings over HTTP. Endpoints that
//! only look like OpenAI on the surface are handled through two knobs: the
//! [`MessageDialect`] used to encode prompts and the [`StreamMode`] used to
//! read streamed payloads.

pub mod chat;
pub mod dialect;
pub mod embeddings;
pub mod error;
pub mod settings;
pub mod sse;
pub mod types;

pub use chat::{OpenAiChatModel, OpenAiModelProvider};
pub use dialect::MessageDialect;
pub use embeddings::{OpenAiEmbedder, OpenAiEmbeddingProvider};
pub use settings::{ChatEndpoint, ChatEndpoints, EmbeddingEndpoint, EmbeddingEndpoints};
pub use sse::StreamMode;

/// One-connection-per-response HTTP stub for adapter tests.
#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    pub struct CapturedRequest {
        pub head: String,
        pub body: String,
    }

    pub struct CannedResponse {
        status: u16,
        content_type: &'static str,
        body: String,
    }

    impl CannedResponse {
        pub fn json(status: u16, body: &str) -> Self {
            Self {
                status,
                content_type: "application/json",
                body: body.to_string(),
            }
        }

        pub fn event_stream(body: &str) -> Self {
            Self {
                status: 200,
                content_type: "text/event-stream",
                body: body.to_string(),
            }
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    async fn answer(listener: &TcpListener, response: CannedResponse) -> CapturedRequest {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos + 4;
            }
            if n == 0 {
                break buf.len();
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let length = head
            .lines()
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                if key.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = String::from_utf8_lossy(&buf[header_end..]).into_owned();

        let reply = format!(
            "HTTP/1.1 {} Canned\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            response.status,
            response.content_type,
            response.body.len(),
            response.body
        );
        socket.write_all(reply.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;

        CapturedRequest { head, body }
    }

    /// Serve `responses` in order, one connection each.
    pub async fn serve(
        responses: Vec<CannedResponse>,
    ) -> (String, JoinHandle<Vec<CapturedRequest>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut captured = Vec::new();
            for response in responses {
                captured.push(answer(&listener, response).await);
            }
            captured
        });
        (base_url, handle)
    }

    pub async fn serve_once(response: CannedResponse) -> (String, JoinHandle<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move { answer(&listener, response).await });
        (base_url, handle)
    }
}
