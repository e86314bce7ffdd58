//! The network egress guard.

use crate::error::{EgressError, EgressResult};
use crate::validate::{check_url, redirect_hop_allowed};
use futures::{Stream, StreamExt};
use palisade_audit::{AuditEntry, AuditLog};
use palisade_core::{Decision, NetworkRequest, RequestId};
use palisade_policy::{GatewayPolicy, NetworkPolicy};
use palisade_ratelimit::RateLimiter;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// A completed, size-capped response.
#[derive(Debug, Clone)]
pub struct EgressResponse {
    /// HTTP status code.
    pub status: u16,
    /// Full response body. Never larger than the policy's
    /// `max_size_bytes`.
    pub body: Vec<u8>,
    /// Wall-clock time from admission to last byte.
    pub elapsed: Duration,
}

impl EgressResponse {
    /// Body size in bytes.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        u64::try_from(self.body.len()).unwrap_or(u64::MAX)
    }
}

/// Mediates every outbound HTTP request an agent makes.
///
/// `evaluate` is synchronous and I/O-free; `execute` is the only
/// operation in the gateway that touches the network. Dropping the
/// `execute` future cancels the in-flight transfer and releases the
/// connection.
pub struct NetworkEgressGuard {
    policy: Arc<GatewayPolicy>,
    limiter: Arc<RateLimiter>,
    audit: Arc<AuditLog>,
    client: reqwest::Client,
}

impl NetworkEgressGuard {
    /// Create a guard over a validated policy.
    ///
    /// The underlying client keeps a connection pool and DNS cache and
    /// caps redirects at the policy's `max_redirects`; every redirect
    /// hop is re-checked so a server cannot bounce an admitted request
    /// toward loopback, a metadata service, or a private address.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(
        policy: Arc<GatewayPolicy>,
        limiter: Arc<RateLimiter>,
        audit: Arc<AuditLog>,
    ) -> EgressResult<Self> {
        let max_redirects = policy.network.max_redirects;
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() > max_redirects {
                    return attempt.error("too many redirects");
                }
                if !redirect_hop_allowed(attempt.url()) {
                    return attempt.error("redirect to a disallowed host");
                }
                attempt.follow()
            }))
            .build()?;
        Ok(Self {
            policy,
            limiter,
            audit,
            client,
        })
    }

    /// Build a per-caller rate limiter from the policy's settings.
    #[must_use]
    pub fn limiter_for(network: &NetworkPolicy) -> RateLimiter {
        RateLimiter::new(network.rate_limit.burst, network.rate_limit.rps)
    }

    /// Decide whether a request may go out, consuming one rate-limit
    /// token on the way. Never blocks on I/O. Denials are audited.
    ///
    /// This is the sole admission point: the returned [`Url`] is the
    /// ticket [`execute`](Self::execute) accepts, so the
    /// evaluate-then-execute sequence spends exactly one token.
    pub fn evaluate(&self, request: &NetworkRequest) -> EgressResult<Url> {
        let started = Instant::now();
        let url = check_url(&self.policy.network, &request.url).map_err(|err| {
            self.record_failure(request, &err, started, None);
            err
        })?;
        if !self.limiter.allow(request.caller_id.as_str()) {
            tracing::debug!(caller = %request.caller_id, "egress rate limit exhausted");
            let err = EgressError::RateLimited {
                caller: request.caller_id.clone(),
            };
            self.record_failure(request, &err, started, None);
            return Err(err);
        }
        Ok(url)
    }

    /// Perform a request already admitted by [`evaluate`](Self::evaluate).
    ///
    /// `url` must be the value `evaluate` returned for this request;
    /// admission is not re-run here, so no second rate-limit token is
    /// spent. The response body is capped at the policy's
    /// `max_size_bytes`, checked against `Content-Length` before the
    /// transfer and again on every streamed chunk; the transfer is
    /// aborted the moment the cap is crossed.
    ///
    /// # Errors
    ///
    /// [`EgressError::Transport`] or [`EgressError::BodyTooLarge`] from
    /// the transfer itself.
    pub async fn execute(
        &self,
        request: &NetworkRequest,
        url: Url,
    ) -> EgressResult<EgressResponse> {
        let started = Instant::now();
        match self.transfer(request, url, started).await {
            Ok(response) => {
                let entry = AuditEntry::new(
                    RequestId::new(),
                    request.caller_id.clone(),
                    Decision::Allowed,
                )
                .with_latency_ms(elapsed_ms(started))
                .with_bytes(response.bytes());
                self.audit.record(entry);
                tracing::debug!(
                    caller = %request.caller_id,
                    status = response.status,
                    bytes = response.bytes(),
                    "egress request completed"
                );
                Ok(response)
            }
            Err(err) => {
                self.record_failure(request, &err, started, None);
                Err(err)
            }
        }
    }

    async fn transfer(
        &self,
        request: &NetworkRequest,
        url: Url,
        started: Instant,
    ) -> EgressResult<EgressResponse> {
        let method =
            reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
                EgressError::Denied {
                    reason: format!("unsupported HTTP method '{}'", request.method),
                }
            })?;

        let mut builder = self
            .client
            .request(method, url)
            .timeout(effective_timeout(request, &self.policy.network));
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let limit = self.policy.network.max_size_bytes;

        // Pre-flight: trust Content-Length when present, but only to
        // reject early; the streamed cap below is the real enforcement.
        if let Some(len) = response.content_length()
            && len > limit
        {
            return Err(EgressError::BodyTooLarge { limit });
        }

        let status = response.status().as_u16();
        let body = read_capped(response.bytes_stream(), limit)
            .await
            .map_err(|err| match err {
                CapError::TooLarge => EgressError::BodyTooLarge { limit },
                CapError::Source(source) => EgressError::Transport(source),
            })?;

        Ok(EgressResponse {
            status,
            body,
            elapsed: started.elapsed(),
        })
    }

    fn record_failure(
        &self,
        request: &NetworkRequest,
        err: &EgressError,
        started: Instant,
        bytes: Option<u64>,
    ) {
        let decision = match err {
            EgressError::RateLimited { .. } => Decision::RateLimited,
            _ => Decision::Rejected,
        };
        if decision == Decision::Rejected {
            tracing::warn!(caller = %request.caller_id, error = %err, "egress request refused");
        }
        let mut entry = AuditEntry::new(RequestId::new(), request.caller_id.clone(), decision)
            .with_reason(err.to_string())
            .with_latency_ms(elapsed_ms(started));
        if let Some(bytes) = bytes {
            entry = entry.with_bytes(bytes);
        }
        self.audit.record(entry);
    }
}

impl std::fmt::Debug for NetworkEgressGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkEgressGuard")
            .field("allowed_schemes", &self.policy.network.allowed_schemes)
            .finish_non_exhaustive()
    }
}

/// Caller-requested timeout clamped to the policy ceiling; ceiling
/// applies when the caller supplies none.
fn effective_timeout(request: &NetworkRequest, network: &NetworkPolicy) -> Duration {
    let ceiling = Duration::from_secs(network.max_timeout_secs);
    request.timeout.map_or(ceiling, |t| t.min(ceiling))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

enum CapError<E> {
    TooLarge,
    Source(E),
}

/// Collect a byte stream, aborting as soon as the accumulated size
/// crosses `limit`. The remainder of the stream is never polled.
async fn read_capped<S, C, E>(mut stream: S, limit: u64) -> Result<Vec<u8>, CapError<E>>
where
    S: Stream<Item = Result<C, E>> + Unpin,
    C: AsRef<[u8]>,
{
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(CapError::Source)?;
        buf.extend_from_slice(chunk.as_ref());
        if u64::try_from(buf.len()).unwrap_or(u64::MAX) > limit {
            return Err(CapError::TooLarge);
        }
    }
    Ok(buf)
}
