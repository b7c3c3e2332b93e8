//! ---
//! oprov_section: "05-networking-external-interfaces"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "RPC gateway towards the Odoo object API."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
//! HTTP transport speaking the platform's JSON-RPC dialect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{trace, warn};
use url::Url;

use crate::error::{RemoteFault, RpcError};
use crate::transport::{RpcTransport, Service};

const ENDPOINT_PATH: &str = "jsonrpc";
const BODY_EXCERPT: usize = 512;

/// Client-level settings for [`JsonRpcTransport`].
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Per-request timeout, covering connect and read.
    pub timeout: Duration,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            accept_invalid_certs: false,
        }
    }
}

/// [`RpcTransport`] over HTTP(S) POSTs to `{base_url}/jsonrpc`.
#[derive(Debug)]
pub struct JsonRpcTransport {
    endpoint: Url,
    client: Client,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    /// Build a transport for the given server base URL.
    pub fn new(base_url: &Url, options: &TransportOptions) -> Result<Self, RpcError> {
        let endpoint = endpoint_for(base_url)?;
        if options.accept_invalid_certs {
            warn!(
                endpoint = %endpoint,
                "TLS certificate verification disabled for platform endpoint"
            );
        }
        let client = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .user_agent(concat!("oprov/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| RpcError::Unexpected(format!("unable to build HTTP client: {err}")))?;
        Ok(Self {
            endpoint,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RpcTransport for JsonRpcTransport {
    async fn call(
        &self,
        service: Service,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = encode_request(id, service, method, args);
        trace!(%service, method, id, "json-rpc request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RpcError::Protocol {
                status: status.as_u16(),
                message: excerpt(&text),
            });
        }
        let bytes = response.bytes().await.map_err(|err| {
            if err.is_timeout() {
                RpcError::Timeout(err.to_string())
            } else {
                RpcError::Connection(format!("failed reading response body: {err}"))
            }
        })?;
        let payload: Value = serde_json::from_slice(&bytes).map_err(|err| {
            RpcError::Malformed(format!(
                "{err}: {}",
                excerpt(&String::from_utf8_lossy(&bytes))
            ))
        })?;
        decode_response(payload)
    }
}

fn endpoint_for(base_url: &Url) -> Result<Url, RpcError> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(ENDPOINT_PATH)
        .map_err(|err| RpcError::Unexpected(format!("invalid endpoint for {base_url}: {err}")))
}

pub(crate) fn encode_request(id: u64, service: Service, method: &str, args: Vec<Value>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "call",
        "params": {
            "service": service.as_str(),
            "method": method,
            "args": args,
        },
        "id": id,
    })
}

pub(crate) fn decode_response(mut payload: Value) -> Result<Value, RpcError> {
    let Some(object) = payload.as_object_mut() else {
        return Err(RpcError::Malformed(format!(
            "expected a JSON object, got {}",
            excerpt(&payload.to_string())
        )));
    };
    if let Some(error) = object.remove("error") {
        if !error.is_null() {
            return Err(RpcError::Fault(fault_from_error(&error)));
        }
    }
    match object.remove("result") {
        Some(result) => Ok(result),
        None => Err(RpcError::Malformed(
            "response carries neither result nor error".to_owned(),
        )),
    }
}

fn fault_from_error(error: &Value) -> RemoteFault {
    let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
    let data = error.get("data");
    let message = data
        .and_then(|data| data.get("message"))
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .or_else(|| error.get("message").and_then(Value::as_str))
        .unwrap_or("unknown remote error")
        .to_owned();
    let exception = data
        .and_then(|data| data.get("name"))
        .and_then(Value::as_str)
        .map(str::to_owned);
    RemoteFault {
        code,
        message,
        exception,
    }
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(BODY_EXCERPT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}
