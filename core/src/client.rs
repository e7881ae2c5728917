//! Dispatcher: orchestrates building, caching, network dispatch,
//! classification and decoding.
//!
//! # Design
//! `Client` holds an explicit `ClientConfig` passed at construction — there
//! are no process-wide mutable defaults. Collaborators (cache store, log
//! sink, body decoder, transport) are injected capabilities with working
//! defaults; the transport seam is what lets tests count network round trips
//! with a fake.
//!
//! `call` returns the issued `Request` alongside the `Response`, and
//! `retry` takes that request back as an explicit argument — there is no
//! hidden "last request" state. Classified HTTP errors come back as
//! responses, never as `Err`; only connection-level failures are errors.

use crate::cache::{fingerprint, unix_now, CacheEntry, CacheStore, NoopCache};
use crate::classify::{classify, downgrade_not_found, Class};
use crate::decode::{classify_content_type, BodyDecoder, JsonDecoder};
use crate::error::Error;
use crate::http::{Auth, Endpoint, Method, Request, Response};
use crate::log::{LogSink, NullLog, Severity};
use crate::multiplex::{Completion, MioTransport, Transport};
use crate::request::build_message;
use crate::response::ParseOptions;

/// Everything configurable about a client, fixed at construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub user_agent: String,
    /// Headers added to every request, ahead of per-call headers.
    pub default_headers: Vec<(String, String)>,
    /// Client-wide timeout in seconds, overridable per call.
    pub timeout_secs: u64,
    /// Master switch; when off, per-call cache flags are ignored.
    pub cache_enabled: bool,
    /// Whether calls cache by default when no per-call flag is given.
    pub cache_by_default: bool,
    /// Current entry lifetime in seconds (per-request TTL overrides win).
    pub expiration_secs: u64,
    /// Prune expired entries before each cache lookup.
    pub auto_prune: bool,
    /// See [`ParseOptions::trim_to_content_length`].
    pub trim_to_content_length: bool,
}

impl ClientConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            user_agent: "restmux/0.1".to_string(),
            default_headers: Vec::new(),
            timeout_secs: 30,
            cache_enabled: true,
            cache_by_default: false,
            expiration_secs: crate::cache::DEFAULT_EXPIRATION_SECS,
            auto_prune: false,
            trim_to_content_length: true,
        }
    }
}

/// Per-call knobs. Everything defaults to "inherit from the client".
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub headers: Vec<(String, String)>,
    /// Ordered form fields: query string for GET, urlencoded body otherwise.
    pub data: Vec<(String, String)>,
    pub timeout_secs: Option<u64>,
    /// Explicit per-call caching flag; `None` takes the client default.
    pub cache: Option<bool>,
    /// Per-request TTL override in seconds.
    pub cache_ttl: Option<u64>,
    pub auth: Option<Auth>,
    /// Send as GET plus `X-HTTP-Method-Override`.
    pub method_override: bool,
}

/// The client engine: builds requests, consults the cache gateway, drives
/// the multiplexer on misses, classifies and decodes results, and commits
/// cacheable ones back.
pub struct Client {
    config: ClientConfig,
    /// Slot for `set_expiration`/`revert_expiration`: remembers the value in
    /// force before the first un-reverted override.
    remembered_expiration: Option<u64>,
    cache: Box<dyn CacheStore>,
    log: Box<dyn LogSink>,
    decoder: Box<dyn BodyDecoder>,
    transport: Box<dyn Transport>,
}

impl Client {
    /// Client with default collaborators: no cache, silent log, JSON
    /// decoder, mio transport.
    pub fn new(config: ClientConfig) -> Self {
        let options = ParseOptions {
            trim_to_content_length: config.trim_to_content_length,
        };
        Self {
            remembered_expiration: None,
            cache: Box::new(NoopCache),
            log: Box::new(NullLog),
            decoder: Box::new(JsonDecoder),
            transport: Box::new(MioTransport::new(options)),
            config,
        }
    }

    pub fn with_cache(mut self, cache: Box<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_log(mut self, log: Box<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    pub fn with_decoder(mut self, decoder: Box<dyn BodyDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Direct access to the cache store, for pruning or planting entries.
    pub fn cache_mut(&mut self) -> &mut dyn CacheStore {
        self.cache.as_mut()
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.config.cache_enabled = enabled;
    }

    /// Temporarily override the client-wide expiration. The prior value is
    /// remembered so one [`Self::revert_expiration`] restores it.
    pub fn set_expiration(&mut self, secs: u64) {
        if self.remembered_expiration.is_none() {
            self.remembered_expiration = Some(self.config.expiration_secs);
        }
        self.config.expiration_secs = secs;
    }

    /// Restore the expiration in force before the last override. Does
    /// nothing when no override is outstanding.
    pub fn revert_expiration(&mut self) {
        if let Some(prior) = self.remembered_expiration.take() {
            self.config.expiration_secs = prior;
        }
    }

    /// Issue one request. Returns the built `Request` with its classified
    /// `Response`; pass the request to [`Self::retry`] to re-issue it.
    pub fn call(
        &mut self,
        action: &str,
        method: Method,
        options: CallOptions,
    ) -> Result<(Request, Response), Error> {
        let use_cache = self.effective_caching(options.cache);
        let request = self.build_request(action, method, options);
        self.dispatch(vec![(request, use_cache)])
            .pop()
            .unwrap_or_else(|| {
                Err(Error::ConnectFailure(
                    "dispatch produced no completion".to_string(),
                ))
            })
    }

    /// Issue many requests concurrently over one multiplexer run. Results
    /// align with the input order; each carries its own request, so nothing
    /// about completion timing leaks into the association.
    pub fn call_many(
        &mut self,
        calls: Vec<(String, Method, CallOptions)>,
    ) -> Vec<Result<(Request, Response), Error>> {
        let prepared = calls
            .into_iter()
            .map(|(action, method, options)| {
                let use_cache = self.effective_caching(options.cache);
                (self.build_request(&action, method, options), use_cache)
            })
            .collect();
        self.dispatch(prepared)
    }

    /// Re-issue a previously built request wholesale. Nothing is retried
    /// automatically; this is the explicit path after a failure.
    pub fn retry(&mut self, request: &Request) -> Result<(Request, Response), Error> {
        let use_cache = self.effective_caching(None);
        self.dispatch(vec![(request.clone(), use_cache)])
            .pop()
            .unwrap_or_else(|| {
                Err(Error::ConnectFailure(
                    "dispatch produced no completion".to_string(),
                ))
            })
    }

    /// The cache-gateway query: an unexpired entry for this request, if
    /// caching applies. `force_cache` overrides the client default.
    pub fn cached_response(
        &mut self,
        request: &Request,
        force_cache: Option<bool>,
    ) -> Option<Response> {
        if !self.effective_caching(force_cache) {
            return None;
        }
        if self.config.auto_prune {
            self.cache.prune();
        }
        let fp = fingerprint(request);
        let entry = self.cache.query(&fp)?;
        let ttl = self.resolve_expiration(request);
        if unix_now().saturating_sub(entry.timestamp) < ttl {
            self.log
                .log(&format!("cache hit: {fp}"), Severity::Info, None);
            Some(entry.response)
        } else {
            self.cache.remove(&fp);
            None
        }
    }

    fn effective_caching(&self, explicit: Option<bool>) -> bool {
        self.config.cache_enabled && explicit.unwrap_or(self.config.cache_by_default)
    }

    /// TTL resolution: per-request override, else the client's current
    /// setting (which itself defaults from the global constant).
    fn resolve_expiration(&self, request: &Request) -> u64 {
        request.cache_ttl.unwrap_or(self.config.expiration_secs)
    }

    fn build_request(&self, action: &str, method: Method, options: CallOptions) -> Request {
        let mut headers = self.config.default_headers.clone();
        headers.extend(options.headers);
        Request {
            endpoint: self.config.endpoint.clone(),
            action: action.to_string(),
            method,
            headers,
            body: options.data,
            timeout_secs: options.timeout_secs.unwrap_or(self.config.timeout_secs),
            cache_ttl: options.cache_ttl,
            auth: options.auth,
            method_override: options.method_override,
        }
    }

    /// Core flow: serve what the cache can, send the rest through the
    /// transport in one batch, classify and commit on the way back.
    fn dispatch(
        &mut self,
        prepared: Vec<(Request, bool)>,
    ) -> Vec<Result<(Request, Response), Error>> {
        let mut results: Vec<Option<Result<(Request, Response), Error>>> =
            (0..prepared.len()).map(|_| None).collect();

        let mut pending: Vec<(usize, Request, bool)> = Vec::new();
        for (i, (request, use_cache)) in prepared.into_iter().enumerate() {
            match self.cached_response(&request, Some(use_cache)) {
                Some(response) => results[i] = Some(Ok((request, response))),
                None => pending.push((i, request, use_cache)),
            }
        }

        let batch: Vec<(Request, Vec<u8>)> = pending
            .iter()
            .map(|(_, request, _)| {
                (
                    request.clone(),
                    build_message(request, &self.config.user_agent),
                )
            })
            .collect();
        let completions = self.transport.execute(batch);

        for ((i, _, use_cache), completion) in pending.into_iter().zip(completions) {
            results[i] = Some(self.settle(completion, use_cache));
        }

        results
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(Error::ConnectFailure(
                        "transport returned fewer completions than requests".to_string(),
                    ))
                })
            })
            .collect()
    }

    /// Turn one transport completion into the caller-facing result:
    /// classify, downgrade 404, decode, commit when cacheable.
    fn settle(
        &mut self,
        completion: Completion,
        use_cache: bool,
    ) -> Result<(Request, Response), Error> {
        let request = completion.request;
        let raw = match completion.result {
            Ok(raw) => raw,
            Err(e) => {
                self.log.log(
                    &format!(
                        "{} {} failed",
                        request.method.as_str(),
                        request.action
                    ),
                    Severity::Error,
                    Some(&e.to_string()),
                );
                return Err(e);
            }
        };

        let classification = classify(raw.status);
        let mut response = Response {
            version: raw.version,
            status: classification.status,
            status_text: raw.status_text,
            headers: raw.headers,
            body: raw.body,
            decoded: None,
            request: request.clone(),
        };

        if let Some(severity) = classification.severity {
            self.log.log(
                &format!(
                    "HTTP {} for {} {}",
                    response.status,
                    request.method.as_str(),
                    request.action
                ),
                severity,
                None,
            );
        }

        if classification.class == Class::NotFound {
            downgrade_not_found(&mut response);
        }

        if matches!(classification.class, Class::Success | Class::NotFound) {
            let kind = classify_content_type(response.header("content-type"));
            match self.decoder.decode(&response.body, kind) {
                Ok(decoded) => response.decoded = decoded,
                Err(trace) => {
                    // Degrade gracefully: the raw bytes stay exposed.
                    self.log.log(
                        "body decode failed; raw bytes retained",
                        Severity::Warn,
                        Some(&trace),
                    );
                }
            }
        }

        if use_cache && classification.cacheable {
            let ttl = self.resolve_expiration(&request);
            self.cache.commit(
                &fingerprint(&request),
                CacheEntry::new(unix_now(), ttl, response.clone()),
            );
        }

        Ok((request, response))
    }
}
