//! Request-level hook dispatch.
//!
//! The HTTP glue itself lives outside the engine; this module provides the
//! capability it wraps: run `request.pre` hooks, short-circuit with a 403
//! when the chain aborts, invoke the handler, then run `request.post` hooks
//! and return the handler's response unchanged.

use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use serde_json::json;

use super::models::{HookChainResult, HookContext, HookEventType};
use super::registry::HookRegistry;

/// An inbound request as seen by the hook layer.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: String,
    /// Resolved tenant.
    pub tenant_id: String,
}

/// The response produced by [`dispatch_request`].
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    /// Response status code.
    pub status_code: u16,
    /// Response body.
    pub body: String,
    /// Summary of the `request.pre` chain.
    pub pre_chain: HookChainResult,
    /// Summary of the `request.post` chain; absent when the pre chain
    /// aborted.
    pub post_chain: Option<HookChainResult>,
}

/// Run a handler inside the `request.pre` / `request.post` hook envelope.
///
/// When a pre-hook sets the abort flag the handler never runs and the
/// outcome is a 403 carrying the abort reason; post-hooks do not run either.
pub async fn dispatch_request<F, Fut>(
    registry: &HookRegistry,
    request: RequestInfo,
    handler: F,
) -> RequestOutcome
where
    F: FnOnce(RequestInfo) -> Fut,
    Fut: Future<Output = (u16, String)> + Send,
{
    let started = Instant::now();

    let pre_ctx = HookContext::new(HookEventType::RequestPre, request.tenant_id.clone())
        .with_field("method", request.method.clone())
        .with_field("path", request.path.clone())
        .with_field("headers", json!(request.headers))
        .with_field("body", request.body.clone());

    let pre_ctx = registry
        .chain_runner(HookEventType::RequestPre, &request.tenant_id)
        .run(pre_ctx)
        .await;
    let pre_chain = HookChainResult::from_context(&pre_ctx);

    if pre_ctx.abort {
        return RequestOutcome {
            status_code: 403,
            body: pre_ctx.abort_reason.clone(),
            pre_chain,
            post_chain: None,
        };
    }

    let tenant = request.tenant_id.clone();
    let method = request.method.clone();
    let path = request.path.clone();
    let (status_code, body) = handler(request).await;

    let post_ctx = HookContext::new(HookEventType::RequestPost, tenant.clone())
        .with_field("method", method)
        .with_field("path", path)
        .with_field("status_code", i64::from(status_code))
        .with_field("response_headers", json!({}))
        .with_field(
            "duration_ms",
            started.elapsed().as_secs_f64() * 1000.0,
        );

    let post_ctx = registry
        .chain_runner(HookEventType::RequestPost, &tenant)
        .run(post_ctx)
        .await;

    RequestOutcome {
        status_code,
        body,
        pre_chain,
        post_chain: Some(HookChainResult::from_context(&post_ctx)),
    }
}
