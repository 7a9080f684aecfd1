//! Validating admission webhook for Config objects
//!
//! The API server posts an `AdmissionReview` for every CREATE and UPDATE of a
//! `Config`. The object is decoded with the same union rules the CRD types
//! enforce, then validated; any failure denies the request with every field
//! error joined by `"; "`. Warnings ride along on the response.
//!
//! Endpoints:
//! - `POST /validate` - admission review
//! - `GET /healthz`, `GET /readyz` - liveness and readiness
//! - `GET /metrics` - Prometheus text exposition

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::crd::Config;
use crate::manifest;
use crate::error::{Error, Result};

/// Largest admission review body accepted (the API server caps objects at 3MiB)
const MAX_REVIEW_BYTES: usize = 3 * 1024 * 1024;

// =============================================================================
// Configuration
// =============================================================================

/// Admission server settings
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Address to listen on
    pub addr: SocketAddr,
    /// PEM certificate chain; TLS is enabled when both paths are set
    pub tls_cert: Option<PathBuf>,
    /// PEM private key
    pub tls_key: Option<PathBuf>,
}

impl WebhookConfig {
    /// Plain HTTP server on the given address
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            tls_cert: None,
            tls_key: None,
        }
    }

    /// Certificate and key paths, or `None` when TLS is disabled
    pub fn tls_paths(&self) -> Result<Option<(&Path, &Path)>> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Ok(Some((cert.as_path(), key.as_path()))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(Error::Tls(
                "a certificate was given without a private key".to_string(),
            )),
            (None, Some(_)) => Err(Error::Tls(
                "a private key was given without a certificate".to_string(),
            )),
        }
    }
}

/// Load a rustls server configuration from PEM files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<rustls::ServerConfig> {
    let cert_pem = tokio::fs::read(cert_path).await?;
    let key_pem = tokio::fs::read(key_path).await?;

    let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(Error::Tls(format!(
            "no certificates found in {}",
            cert_path.display()
        )));
    }

    let key = rustls_pemfile::private_key(&mut key_pem.as_slice())?.ok_or_else(|| {
        Error::Tls(format!("no private key found in {}", key_path.display()))
    })?;

    let mut config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| Error::Tls(e.to_string()))?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .map_err(|e| Error::Tls(e.to_string()))?;

    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    info!(
        cert = %cert_path.display(),
        key = %key_path.display(),
        "TLS certificates loaded"
    );
    Ok(config)
}

// =============================================================================
// Metrics
// =============================================================================

/// How a review was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Allowed,
    Denied,
    /// The review itself could not be decoded
    Invalid,
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewOutcome::Allowed => "allowed",
            ReviewOutcome::Denied => "denied",
            ReviewOutcome::Invalid => "invalid",
        }
    }
}

/// Prometheus metrics for the admission server
pub struct AdmissionMetrics {
    registry: Registry,
    reviews: IntCounterVec,
}

impl AdmissionMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let reviews = IntCounterVec::new(
            Opts::new("admission_reviews_total", "Total number of admission reviews answered")
                .namespace("imageregistry"),
            &["result"],
        )?;
        registry.register(Box::new(reviews.clone()))?;
        Ok(Self { registry, reviews })
    }

    pub fn record(&self, outcome: ReviewOutcome) {
        self.reviews.with_label_values(&[outcome.as_str()]).inc();
    }

    /// Reviews answered with the given outcome so far
    pub fn count(&self, outcome: ReviewOutcome) -> u64 {
        self.reviews.with_label_values(&[outcome.as_str()]).get()
    }

    /// Encode all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

// =============================================================================
// Admission
// =============================================================================

/// Answer a raw admission review body.
///
/// Always produces a review; a body that cannot be decoded yields an
/// "invalid" response without a UID.
pub fn review(body: &[u8]) -> (AdmissionReview<DynamicObject>, ReviewOutcome) {
    let review: AdmissionReview<DynamicObject> = match serde_json::from_slice(body) {
        Ok(review) => review,
        Err(e) => {
            warn!(error = %e, "Failed to parse AdmissionReview");
            return (
                AdmissionResponse::invalid(format!("malformed AdmissionReview: {}", e))
                    .into_review(),
                ReviewOutcome::Invalid,
            );
        }
    };

    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "AdmissionReview carries no request");
            return (
                AdmissionResponse::invalid(e.to_string()).into_review(),
                ReviewOutcome::Invalid,
            );
        }
    };

    let response = admit(&request);
    let outcome = if response.allowed {
        ReviewOutcome::Allowed
    } else {
        ReviewOutcome::Denied
    };
    (response.into_review(), outcome)
}

/// Decide a single admission request.
pub fn admit(request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);

    if matches!(request.operation, Operation::Delete | Operation::Connect) {
        return response;
    }

    let Some(object) = &request.object else {
        warn!(uid = %request.uid, "Admission request carries no object");
        return response.deny("request carries no object");
    };

    let config = match decode_config(object) {
        Ok(config) => config,
        Err(e) => {
            info!(uid = %request.uid, name = %request.name, error = %e, "Denied undecodable Config");
            return response.deny(format!("invalid Config: {}", e));
        }
    };

    let report = config.validate();
    let warnings = report.warnings.clone();
    let mut response = match report.into_result() {
        Ok(_) => {
            debug!(uid = %request.uid, name = %config.name(), "Allowed Config");
            response
        }
        Err(errors) => {
            info!(
                uid = %request.uid,
                name = %config.name(),
                errors = errors.len(),
                "Denied invalid Config"
            );
            response.deny(errors.to_string())
        }
    };
    if !warnings.is_empty() {
        response.warnings = Some(warnings);
    }
    response
}

fn decode_config(object: &DynamicObject) -> Result<Config> {
    manifest::decode_config(serde_json::to_value(object)?)
}

// =============================================================================
// Server
// =============================================================================

/// Run the admission server until `shutdown` resolves.
pub async fn serve(config: WebhookConfig, shutdown: impl Future<Output = ()>) -> Result<()> {
    let acceptor = match config.tls_paths()? {
        Some((cert, key)) => Some(TlsAcceptor::from(Arc::new(
            load_tls_config(cert, key).await?,
        ))),
        None => {
            warn!("TLS disabled; the API server only calls webhooks over HTTPS");
            None
        }
    };

    let listener = TcpListener::bind(config.addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind admission server: {}", e)))?;

    serve_listener(listener, acceptor, Arc::new(AdmissionMetrics::new()?), shutdown).await
}

/// Accept connections on an already bound listener.
pub async fn serve_listener(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    metrics: Arc<AdmissionMetrics>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(addr = %addr, tls = acceptor.is_some(), "Admission server listening");

    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted
                .map_err(|e| Error::Internal(format!("Admission server accept error: {}", e)))?,
            _ = &mut shutdown => {
                info!("Admission server shutting down");
                return Ok(());
            }
        };

        let metrics = metrics.clone();
        match acceptor.clone() {
            Some(acceptor) => {
                tokio::spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => serve_connection(tls_stream, metrics).await,
                        Err(e) => warn!(peer = %peer, error = %e, "TLS handshake failed"),
                    }
                });
            }
            None => {
                tokio::spawn(serve_connection(stream, metrics));
            }
        }
    }
}

async fn serve_connection<S>(stream: S, metrics: Arc<AdmissionMetrics>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| handle(req, metrics.clone()));
    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
        error!(error = %e, "Admission server connection error");
    }
}

async fn handle(
    req: Request<Incoming>,
    metrics: Arc<AdmissionMetrics>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::POST, "/validate") => validate(req, &metrics).await,
        (&Method::GET, "/healthz") => build_response(StatusCode::OK, "ok"),
        (&Method::GET, "/readyz") => build_response(StatusCode::OK, "ok"),
        (&Method::GET, "/metrics") => match metrics.encode() {
            Ok(buffer) => json_or_text(StatusCode::OK, TextEncoder::new().format_type(), buffer),
            Err(e) => {
                error!(error = %e, "Failed to encode metrics");
                build_response(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable")
            }
        },
        _ => build_response(StatusCode::NOT_FOUND, "not found"),
    };
    Ok(response)
}

async fn validate(req: Request<Incoming>, metrics: &AdmissionMetrics) -> Response<Full<Bytes>> {
    let body = match Limited::new(req.into_body(), MAX_REVIEW_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "Failed to read admission review body");
            metrics.record(ReviewOutcome::Invalid);
            return build_response(StatusCode::BAD_REQUEST, "failed to read request body");
        }
    };

    let (reply, outcome) = review(&body);
    metrics.record(outcome);

    match serde_json::to_vec(&reply) {
        Ok(json) => json_or_text(StatusCode::OK, "application/json", json),
        Err(e) => {
            error!(error = %e, "Failed to serialize admission review");
            build_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to serialize response")
        }
    }
}

fn json_or_text(status: StatusCode, content_type: &str, body: Vec<u8>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to build response");
            Response::new(Full::new(Bytes::from("Internal Error")))
        })
}

fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to build response");
            Response::new(Full::new(Bytes::from("Internal Error")))
        })
}
