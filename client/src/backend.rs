//! Transport to the vote server.
//!
//! [`Backend`] is the seam the polling client talks through; [`HttpBackend`]
//! is the JSON-over-HTTP implementation used by the binary.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{ClientError, ClientResult};
use crate::metrics;
use crate::types::{
    ClearRefreshPayload, StopRequestPayload, StopRequestResponse, StopStateResponse,
    SubmissionPayload, SubmitResponse,
};

pub const SUBMIT_PATH: &str = "/submit";
pub const REQUEST_STOP_PATH: &str = "/requeststop";
pub const STOP_DATA_PATH: &str = "/stopdata";
pub const CLEAR_REFRESH_PATH: &str = "/clear_refresh";

/// Requests the panel makes against the vote server.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Send free text to `/submit`.
    async fn submit(&self, payload: &SubmissionPayload) -> ClientResult<SubmitResponse>;

    /// Cast this player's skip vote.
    async fn request_stop(
        &self,
        payload: &StopRequestPayload,
    ) -> ClientResult<StopRequestResponse>;

    /// Fetch the current vote threshold, votes and refresh flags.
    async fn stop_data(&self) -> ClientResult<StopStateResponse>;

    /// Clear the refresh flag for one card. The reply body is ignored.
    async fn clear_refresh(&self, payload: &ClearRefreshPayload) -> ClientResult<()>;
}

/// [`Backend`] over reqwest with a cookie store, so the session the server
/// assigns when a card is claimed rides along on every request.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base: String,
}

impl HttpBackend {
    pub fn new(host_url: &str, timeout: Option<Duration>) -> ClientResult<Self> {
        let url = Url::parse(host_url).map_err(|e| ClientError::InvalidUrl(format!("{host_url}: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(host_url.to_string()));
        }

        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            base: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Handle to the underlying client. Clones share the cookie store.
    pub fn http(&self) -> Client {
        self.http.clone()
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post<T, R>(&self, path: &'static str, body: &T) -> ClientResult<R>
    where
        T: Serialize + Sync,
        R: DeserializeOwned,
    {
        let result = self.post_raw(path, body).await.and_then(|bytes| {
            serde_json::from_slice::<R>(&bytes).map_err(ClientError::from)
        });
        metrics::record_request(path, &result);
        result
    }

    async fn post_raw<T>(&self, path: &'static str, body: &T) -> ClientResult<Vec<u8>>
    where
        T: Serialize + Sync,
    {
        let url = self.endpoint(path);
        trace!(%url, "POST");

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(%url, status = status.as_u16(), "Server rejected request");
            return Err(ClientError::Http {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn submit(&self, payload: &SubmissionPayload) -> ClientResult<SubmitResponse> {
        self.post(SUBMIT_PATH, payload).await
    }

    async fn request_stop(
        &self,
        payload: &StopRequestPayload,
    ) -> ClientResult<StopRequestResponse> {
        self.post(REQUEST_STOP_PATH, payload).await
    }

    async fn stop_data(&self) -> ClientResult<StopStateResponse> {
        self.post(STOP_DATA_PATH, &StopRequestPayload::default())
            .await
    }

    async fn clear_refresh(&self, payload: &ClearRefreshPayload) -> ClientResult<()> {
        let result = self.post_raw(CLEAR_REFRESH_PATH, payload).await.map(|_| ());
        metrics::record_request(CLEAR_REFRESH_PATH, &result);
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{
        http::{header, HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    /// Requests seen by a fake server: (path, body).
    pub(crate) type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    /// Serve `router` on an ephemeral local port and return its base URL.
    pub(crate) async fn spawn_server(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// A base URL nothing is listening on.
    pub(crate) async fn dead_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    fn recording(seen: &Seen, path: &'static str, reply: Value) -> axum::routing::MethodRouter {
        let seen = Arc::clone(seen);
        post(move |Json(body): Json<Value>| {
            let seen = Arc::clone(&seen);
            let reply = reply.clone();
            async move {
                seen.lock().unwrap().push((path.to_string(), body));
                Json(reply)
            }
        })
    }

    fn vote_server(seen: &Seen) -> Router {
        Router::new()
            .route(
                "/stopdata",
                recording(
                    seen,
                    "/stopdata",
                    json!({"stoprequests": [2], "votes_required": 3, "refresh_screen": [false, true]}),
                ),
            )
            .route(
                "/submit",
                recording(seen, "/submit", json!({"message": "Text received: hi"})),
            )
            .route(
                "/clear_refresh",
                recording(seen, "/clear_refresh", json!({"status": "success"})),
            )
    }

    #[tokio::test]
    async fn stop_data_posts_empty_text_and_decodes_state() {
        let seen = Seen::default();
        let base = spawn_server(vote_server(&seen)).await;
        let backend = HttpBackend::new(&base, None).unwrap();

        let state = backend.stop_data().await.unwrap();

        assert_eq!(state.votes_required(), 3);
        assert_eq!(state.votes_received(), 1);
        assert!(state.refresh_screen.is_set(1));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[("/stopdata".to_string(), json!({"text": ""}))]);
    }

    #[tokio::test]
    async fn submit_sends_input_text() {
        let seen = Seen::default();
        let base = spawn_server(vote_server(&seen)).await;
        let backend = HttpBackend::new(&format!("{base}/"), None).unwrap();

        let reply = backend
            .submit(&SubmissionPayload { text: "hi".into() })
            .await
            .unwrap();

        assert_eq!(reply.message.as_deref(), Some("Text received: hi"));
        assert_eq!(seen.lock().unwrap()[0], ("/submit".to_string(), json!({"text": "hi"})));
    }

    #[tokio::test]
    async fn clear_refresh_sends_player_nbr() {
        let seen = Seen::default();
        let base = spawn_server(vote_server(&seen)).await;
        let backend = HttpBackend::new(&base, None).unwrap();

        backend
            .clear_refresh(&ClearRefreshPayload { player_nbr: 1 })
            .await
            .unwrap();

        assert_eq!(
            seen.lock().unwrap()[0],
            ("/clear_refresh".to_string(), json!({"player_nbr": 1}))
        );
    }

    #[tokio::test]
    async fn non_success_status_is_http_error() {
        let router = Router::new().route(
            "/submit",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_server(router).await;
        let backend = HttpBackend::new(&base, None).unwrap();

        let err = backend
            .submit(&SubmissionPayload { text: "x".into() })
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Http { status: 500 }));
    }

    #[tokio::test]
    async fn non_json_body_is_decode_error() {
        let router = Router::new().route("/stopdata", post(|| async { "<html>oops</html>" }));
        let base = spawn_server(router).await;
        let backend = HttpBackend::new(&base, None).unwrap();

        let err = backend.stop_data().await.unwrap_err();

        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let backend = HttpBackend::new(&dead_url().await, None).unwrap();

        let err = backend
            .request_stop(&StopRequestPayload::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[tokio::test]
    async fn slow_server_hits_request_timeout() {
        let router = Router::new().route(
            "/stopdata",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({}))
            }),
        );
        let base = spawn_server(router).await;
        let backend = HttpBackend::new(&base, Some(Duration::from_millis(50))).unwrap();

        let err = backend.stop_data().await.unwrap_err();

        assert!(matches!(err, ClientError::Transport(ref e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn session_cookie_from_claim_is_sent_with_votes() {
        let cookies = Arc::new(Mutex::new(Vec::<String>::new()));
        let seen_cookies = Arc::clone(&cookies);
        let router = Router::new()
            .route(
                "/3",
                get(|| async { ([(header::SET_COOKIE, "session=card3; Path=/")], "card") }),
            )
            .route(
                "/requeststop",
                post(move |headers: HeaderMap| {
                    let cookies = Arc::clone(&seen_cookies);
                    async move {
                        if let Some(cookie) = headers.get(header::COOKIE) {
                            cookies
                                .lock()
                                .unwrap()
                                .push(cookie.to_str().unwrap().to_string());
                        }
                        Json(json!({"stoprequests": [3]}))
                    }
                }),
            );
        let base = spawn_server(router).await;
        let backend = HttpBackend::new(&base, None).unwrap();

        backend.http().get(backend.endpoint("/3")).send().await.unwrap();
        let reply = backend
            .request_stop(&StopRequestPayload::default())
            .await
            .unwrap();

        assert_eq!(cookies.lock().unwrap().as_slice(), &["session=card3".to_string()]);
        assert_eq!(reply.stoprequests.unwrap().len(), 1);
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let err = HttpBackend::new("not a url", None).unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl(_)));
    }
}
