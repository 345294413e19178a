// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only HTTP status endpoint.
//!
//! `GET /status` returns every published record keyed by repository path.
//! The server only ever reads [`StatusStore::snapshot`]. Requests are served
//! by `tiny_http` on a dedicated thread.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::time::Duration;

use ax_core::{StatusRecord, StatusStore};
use serde::Serialize;
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const STATUS_PATH: &str = "/status";

/// How long the serving thread blocks before re-checking cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

type Reply = Response<Cursor<Vec<u8>>>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind status server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to encode status: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Body of `GET /status`
#[derive(Debug, Serialize)]
pub struct StatusDocument<'a> {
    pub manager_pid: u32,
    pub api_url: &'a str,
    pub services: BTreeMap<String, &'a StatusRecord>,
}

struct ServerCtx {
    store: StatusStore,
    manager_pid: u32,
    api_url: String,
}

pub struct StatusServer {
    server: Server,
    local_addr: Option<SocketAddr>,
    ctx: ServerCtx,
}

impl StatusServer {
    /// Bind `host:port`. Port 0 picks a free port; the advertised url uses
    /// the port actually bound.
    pub fn bind(
        host: &str,
        port: u16,
        store: StatusStore,
        manager_pid: u32,
    ) -> Result<Self, ServerError> {
        let addr = format!("{host}:{port}");
        let server = Server::http(addr.as_str())
            .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
        let local_addr = server.server_addr().to_ip();
        let bound_port = local_addr.map_or(port, |bound| bound.port());
        let api_url = format!("http://{host}:{bound_port}{STATUS_PATH}");
        Ok(Self { server, local_addr, ctx: ServerCtx { store, manager_pid, api_url } })
    }

    pub fn api_url(&self) -> &str {
        &self.ctx.api_url
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Serve requests until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(url = %self.ctx.api_url, "status server listening");
        let (done_tx, done_rx) = oneshot::channel();
        let spawned = std::thread::Builder::new().name("status-server".to_string()).spawn(
            move || {
                self.serve(&cancel);
                let _ = done_tx.send(());
            },
        );
        if let Err(e) = spawned {
            error!(error = %e, "failed to start status server thread");
            return;
        }
        let _ = done_rx.await;
        info!("status server stopped");
    }

    fn serve(&self, cancel: &CancellationToken) {
        while !cancel.is_cancelled() {
            match self.server.recv_timeout(POLL_INTERVAL) {
                Ok(Some(request)) => self.respond(request),
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "status server receive error");
                    break;
                }
            }
        }
    }

    fn respond(&self, request: Request) {
        debug!(method = %request.method(), url = %request.url(), "status request");
        let response = route(request.method(), request.url(), &self.ctx);
        if let Err(e) = request.respond(response) {
            debug!(error = %e, "failed to write status response");
        }
    }
}

fn route(method: &Method, url: &str, ctx: &ServerCtx) -> Reply {
    if *method != Method::Get {
        let mut response = reply(405, "text/plain", "Method Not Allowed");
        add_header(&mut response, "Allow", "GET");
        return response;
    }
    let path = url.split_once('?').map_or(url, |(path, _)| path);
    if path != STATUS_PATH {
        return reply(404, "text/plain", "Not Found");
    }
    match status_json(&ctx.store, ctx.manager_pid, &ctx.api_url) {
        Ok(body) => reply(200, "application/json", body),
        Err(e) => {
            error!(error = %e, "failed to encode status");
            reply(500, "text/plain", "Internal Server Error")
        }
    }
}

fn reply(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Reply {
    let mut response = Response::from_data(body).with_status_code(status);
    add_header(&mut response, "Content-Type", content_type);
    response
}

fn add_header(response: &mut Reply, name: &str, value: &str) {
    if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        response.add_header(header);
    }
}

/// Pretty-printed status document for the current snapshot.
pub fn status_json(
    store: &StatusStore,
    manager_pid: u32,
    api_url: &str,
) -> Result<String, ServerError> {
    let snapshot = store.snapshot();
    let services = snapshot
        .iter()
        .map(|(path, record)| (path.display().to_string(), record.as_ref()))
        .collect();
    let document = StatusDocument { manager_pid, api_url, services };
    Ok(serde_json::to_string_pretty(&document)?)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
