//! HTTP surface.
//!
//! API endpoints:
//! - GET  /            - plaintext greeting
//! - POST /echo        - form `text` -> `{status, text}`
//! - POST /add_voice   - form `speaker_name`, file `voice` -> `{status}`
//! - POST /synthesize  - form `text`, `speaker_name` -> `{status, file_name}`
//! - GET  /get_file    - query `file_name` -> audio/wav attachment
//!
//! Every failure is answered with `{status: "failure", error: <kind>}`.
//! Details are logged, never returned.

use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Form, FromRequest, Multipart, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use voxclone_tts::{ErrorKind, TtsError};

use crate::app::AppContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Success,
    Failure,
}

/// Uniform JSON response body.
#[derive(Debug, Serialize)]
struct Reply {
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorKind>,
}

impl Reply {
    fn success() -> Self {
        Self {
            status: Status::Success,
            file_name: None,
            text: None,
            error: None,
        }
    }

    fn failure(kind: ErrorKind) -> Self {
        Self {
            status: Status::Failure,
            file_name: None,
            text: None,
            error: Some(kind),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// A request failure. Rendered as a failure [`Reply`]; the message only
/// goes to the log.
#[derive(Debug)]
struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            message: message.into(),
        }
    }
}

impl From<TtsError> for ApiError {
    fn from(e: TtsError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.kind {
            ErrorKind::SynthesisFailed | ErrorKind::Internal => {
                error!(kind = %self.kind, error = %self.message, "server: request failed")
            }
            _ => warn!(kind = %self.kind, error = %self.message, "server: request rejected"),
        }
        Reply::failure(self.kind).into_response()
    }
}

/// Form fields from either a multipart or an urlencoded body.
struct FormFields {
    parts: HashMap<String, Bytes>,
}

impl FormFields {
    fn bytes(&self, name: &str) -> Result<&Bytes, ApiError> {
        self.parts
            .get(name)
            .ok_or_else(|| ApiError::invalid_input(format!("missing field {name:?}")))
    }

    fn text(&self, name: &str) -> Result<&str, ApiError> {
        std::str::from_utf8(self.bytes(name)?)
            .map_err(|_| ApiError::invalid_input(format!("field {name:?} is not utf-8")))
    }
}

impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        let mut parts = HashMap::new();
        if is_multipart {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::invalid_input(e.body_text()))?;
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| ApiError::invalid_input(format!("invalid multipart: {e}")))?
            {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::invalid_input(format!("{name} read error: {e}")))?;
                parts.insert(name, data);
            }
        } else {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::invalid_input(e.body_text()))?;
            parts.extend(fields.into_iter().map(|(k, v)| (k, Bytes::from(v))));
        }
        Ok(Self { parts })
    }
}

#[derive(Debug, Deserialize)]
struct GetFileQuery {
    file_name: Option<String>,
}

/// Build the router over a shared application context.
pub fn router(ctx: Arc<AppContext>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/echo", post(echo))
        .route("/add_voice", post(add_voice))
        .route("/synthesize", post(synthesize))
        .route("/get_file", get(get_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CatchPanicLayer::custom(panic_reply))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Serve `app` on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "server: listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "server: failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("server: shutting down");
}

fn panic_reply(_: Box<dyn Any + Send + 'static>) -> Response {
    error!("server: handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Reply::failure(ErrorKind::Internal),
    )
        .into_response()
}

async fn hello() -> &'static str {
    "Hello, World!"
}

async fn echo(fields: FormFields) -> Result<Reply, ApiError> {
    let text = fields.text("text")?;
    Ok(Reply {
        text: Some(text.to_string()),
        ..Reply::success()
    })
}

async fn add_voice(
    State(ctx): State<Arc<AppContext>>,
    fields: FormFields,
) -> Result<Reply, ApiError> {
    let speaker_name = fields.text("speaker_name")?;
    let voice = fields.bytes("voice")?;

    ctx.registry.register(speaker_name, voice)?;
    if ctx.warm_on_register {
        ctx.registry.warm(speaker_name).await;
    }
    Ok(Reply::success())
}

async fn synthesize(
    State(ctx): State<Arc<AppContext>>,
    fields: FormFields,
) -> Result<Reply, ApiError> {
    let text = fields.text("text")?;
    let speaker_name = fields.text("speaker_name")?;

    let artifact = ctx.synthesis.synthesize(speaker_name, text).await?;
    Ok(Reply {
        file_name: Some(artifact.file_name),
        ..Reply::success()
    })
}

async fn get_file(
    State(ctx): State<Arc<AppContext>>,
    query: Result<Query<GetFileQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::invalid_input(e.body_text()))?;
    let file_name = query
        .file_name
        .ok_or_else(|| ApiError::invalid_input("missing query parameter \"file_name\""))?;
    let audio = ctx
        .store
        .read_synthesis(&file_name)
        .map_err(TtsError::from)?;

    // Only names that parse as synthesis keys get here, so the value is a
    // plain token.
    let disposition = format!("attachment; filename=\"{file_name}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        audio,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use reqwest::multipart::{Form as MultipartForm, Part};
    use serde_json::{json, Value};
    use voxclone_store::FsStore;
    use voxclone_tts::{
        BaseSynthesizer, BaseVoice, Fingerprint, FingerprintExtractor, ModelError, ToneConverter,
    };

    use crate::app::Models;
    use crate::config::Config;

    #[derive(Default)]
    struct FakeModels {
        synth_calls: AtomicUsize,
    }

    #[async_trait]
    impl FingerprintExtractor for FakeModels {
        async fn extract(&self, reference: &[u8]) -> Result<Fingerprint, ModelError> {
            Fingerprint::new("target", vec![reference.len() as f32])
        }
    }

    #[async_trait]
    impl BaseSynthesizer for FakeModels {
        async fn synthesize(&self, text: &str, _voice: &BaseVoice) -> Result<Vec<u8>, ModelError> {
            self.synth_calls.fetch_add(1, Ordering::SeqCst);
            if text == "panic" {
                panic!("model crashed");
            }
            if text == "fail" {
                return Err(ModelError::Api("secret internal detail".into()));
            }
            Ok(format!("RIFF:{text}").into_bytes())
        }
    }

    #[async_trait]
    impl ToneConverter for FakeModels {
        async fn convert(
            &self,
            audio: &[u8],
            _source: &Fingerprint,
            target: &Fingerprint,
        ) -> Result<Vec<u8>, ModelError> {
            let mut out = audio.to_vec();
            out.extend_from_slice(format!("@{}", target.id).as_bytes());
            Ok(out)
        }
    }

    struct TestServer {
        base_url: String,
        client: reqwest::Client,
        models: Arc<FakeModels>,
        _dir: tempfile::TempDir,
    }

    impl TestServer {
        async fn start() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = Arc::new(FsStore::open(dir.path()).unwrap());
            let models = Arc::new(FakeModels::default());
            let ctx = AppContext::new(
                &Config::default(),
                store,
                Models {
                    extractor: models.clone(),
                    synthesizer: models.clone(),
                    converter: models.clone(),
                },
                Fingerprint::new("base", vec![0.0]).unwrap(),
            );
            let app = router(Arc::new(ctx), 1024 * 1024);

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            Self {
                base_url: format!("http://{addr}"),
                client: reqwest::Client::new(),
                models,
                _dir: dir,
            }
        }

        fn url(&self, path: &str) -> String {
            format!("{}{path}", self.base_url)
        }

        async fn add_voice(&self, name: &str, audio: &[u8]) -> Value {
            let form = MultipartForm::new()
                .text("speaker_name", name.to_string())
                .part(
                    "voice",
                    Part::bytes(audio.to_vec()).file_name(format!("{name}.mp3")),
                );
            self.client
                .post(self.url("/add_voice"))
                .multipart(form)
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap()
        }

        async fn synthesize(&self, name: &str, text: &str) -> Value {
            self.client
                .post(self.url("/synthesize"))
                .form(&[("text", text), ("speaker_name", name)])
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap()
        }

        async fn get_file(&self, file_name: &str) -> reqwest::Response {
            self.client
                .get(self.url("/get_file"))
                .query(&[("file_name", file_name)])
                .send()
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_hello_and_echo() {
        let server = TestServer::start().await;

        let body = reqwest::get(server.url("/")).await.unwrap().text().await.unwrap();
        assert_eq!(body, "Hello, World!");

        let reply: Value = server
            .client
            .post(server.url("/echo"))
            .form(&[("text", "ping")])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reply, json!({"status": "success", "text": "ping"}));

        let reply: Value = server
            .client
            .post(server.url("/echo"))
            .form(&[("other", "ping")])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reply, json!({"status": "failure", "error": "invalid_input"}));
    }

    #[tokio::test]
    async fn test_add_voice_create_only() {
        let server = TestServer::start().await;

        let reply = server.add_voice("alice", b"reference").await;
        assert_eq!(reply, json!({"status": "success"}));

        let reply = server.add_voice("alice", b"impostor").await;
        assert_eq!(reply, json!({"status": "failure", "error": "already_exists"}));

        let reply = server.add_voice("../etc", b"x").await;
        assert_eq!(reply, json!({"status": "failure", "error": "invalid_input"}));

        let form = MultipartForm::new().text("speaker_name", "bob");
        let reply: Value = server
            .client
            .post(server.url("/add_voice"))
            .multipart(form)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reply, json!({"status": "failure", "error": "invalid_input"}));
    }

    #[tokio::test]
    async fn test_synthesize_and_download() {
        let server = TestServer::start().await;
        server.add_voice("alice", b"reference").await;

        let reply = server.synthesize("alice", "hello world").await;
        let expected = "alice-b94d27b9934d3e08a52e52d7da7dabfac484efe37a7380ee9088f7ace2efcde9.wav";
        assert_eq!(reply, json!({"status": "success", "file_name": expected}));

        // Multipart bodies work too and hit the cache.
        let form = MultipartForm::new()
            .text("text", "hello world")
            .text("speaker_name", "alice");
        let reply: Value = server
            .client
            .post(server.url("/synthesize"))
            .multipart(form)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reply["file_name"], expected);
        assert_eq!(server.models.synth_calls.load(Ordering::SeqCst), 1);

        let resp = server.get_file(expected).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE.as_str()], "audio/wav");
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION.as_str()],
            format!("attachment; filename=\"{expected}\"").as_str()
        );
        assert_eq!(resp.bytes().await.unwrap().as_ref(), b"RIFF:hello world@target");
    }

    #[tokio::test]
    async fn test_synthesize_failures() {
        let server = TestServer::start().await;
        server.add_voice("alice", b"reference").await;

        let reply = server.synthesize("ghost", "hello").await;
        assert_eq!(reply, json!({"status": "failure", "error": "not_found"}));

        let reply = server.synthesize("alice", "").await;
        assert_eq!(reply, json!({"status": "failure", "error": "invalid_input"}));

        let reply = server.synthesize("alice", "fail").await;
        assert_eq!(reply, json!({"status": "failure", "error": "synthesis_failed"}));
        assert!(!reply.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn test_get_file_unknown_is_failure() {
        let server = TestServer::start().await;
        server.add_voice("alice", b"reference").await;

        let missing = "alice-0000000000000000000000000000000000000000000000000000000000000000.wav";
        let reply: Value = server.get_file(missing).await.json().await.unwrap();
        assert_eq!(reply, json!({"status": "failure", "error": "not_found"}));

        let reply: Value = server.get_file("../alice.mp3").await.json().await.unwrap();
        assert_eq!(reply, json!({"status": "failure", "error": "invalid_input"}));

        let reply: Value = server
            .client
            .get(server.url("/get_file"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reply, json!({"status": "failure", "error": "invalid_input"}));

        let resp = server
            .client
            .get(server.url("/get_file?file_name=a&file_name=b"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.text().await.unwrap();
        assert!(!body.contains("deserialize"), "{body}");
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply, json!({"status": "failure", "error": "invalid_input"}));

        let resp = reqwest::get(server.url("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_panicking_model_does_not_take_server_down() {
        let server = TestServer::start().await;
        server.add_voice("alice", b"reference").await;

        let resp = server
            .client
            .post(server.url("/synthesize"))
            .form(&[("text", "panic"), ("speaker_name", "alice")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let reply: Value = resp.json().await.unwrap();
        assert_eq!(reply, json!({"status": "failure", "error": "internal"}));

        let reply = server.synthesize("alice", "after the panic").await;
        assert_eq!(reply["status"], "success");
    }
}
