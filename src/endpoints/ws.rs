use std::sync::Arc;

use hyper::header::{HeaderValue, CONNECTION, UPGRADE};
use hyper::{Body, Request, Response, StatusCode};
use tracing::{debug, info, warn};

use hyper_websocket::ws::handshake::*;
use hyper_websocket::ws::transport::split;
use hyper_websocket::ws::{ClosingInfo, Connection, ConnectionInfo, Handler, Message, Role};
use hyper_websocket::{Result, WebSocketConfig};

/// Sends every message straight back.
struct Echo;

impl Handler for Echo {
    fn on_open(&self, connection: &Connection) {
        info!(id = %connection.info().id, "echo connection open");
    }

    fn on_message(&self, connection: &Connection, message: Message) {
        let sent = match message.as_text() {
            Ok(text) => connection.send_text(text),
            Err(err) => {
                warn!(error = %err, "text message is not utf-8");
                return;
            }
        };
        if let Err(err) = sent {
            warn!(error = %err, "echo failed");
        }
    }

    fn on_binary(&self, connection: &Connection, message: Message) {
        if let Err(err) = connection.send_binary(&message.payload) {
            warn!(error = %err, "echo failed");
        }
    }

    fn on_error(&self, connection: &Connection, error: &str) {
        warn!(id = %connection.info().id, error, "echo connection error");
    }

    fn on_close(&self, connection: &Connection, info: &ClosingInfo) {
        info!(id = %connection.info().id, code = info.code, reason = %info.reason, "echo connection closed");
    }
}

fn header<'a>(req: &'a Request<Body>, name: &str) -> &'a str {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

fn bad_request(reason: String) -> Response<Body> {
    let mut response = Response::new(Body::from(reason));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
}

async fn handle_upgraded_connection(
    upgraded: hyper::upgrade::Upgraded,
    config: WebSocketConfig,
    info: ConnectionInfo,
) -> Result<()> {
    let (transport, tasks) = split(upgraded)?;
    let connection = Arc::new(Connection::new(
        Role::Server,
        config,
        info,
        Arc::new(transport),
        Arc::new(Echo),
    ));
    // open first, the reader drops frames while connecting
    connection.open();
    let running = tasks.spawn(connection.clone());
    if let Err(err) = running.await {
        warn!(error = %err, "connection task failed");
    }
    debug!(id = %connection.info().id, state = ?connection.state(), "connection finished");
    Ok(())
}

pub fn handle_ws(mut req: Request<Body>, config: WebSocketConfig) -> Response<Body> {
    debug!("ws incoming connection");
    let accept = match accept_upgrade(
        header(&req, SEC_WEBSOCKET_VERSION),
        header(&req, SEC_WEBSOCKET_KEY),
    ) {
        Ok(accept) => accept,
        Err(err) => {
            warn!(error = %err, "websocket handshake refused");
            return bad_request(err.to_string());
        }
    };

    let mut info = ConnectionInfo::new(&req.uri().to_string()).with_query_parameters();
    info.key = accept;
    info.protocols = header(&req, SEC_WEBSOCKET_PROTOCOL).to_string();
    info.extensions = header(&req, SEC_WEBSOCKET_EXTENSIONS).to_string();
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            info.add_header(name.as_str(), value);
        }
    }

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
    for (name, value) in [
        (SEC_WEBSOCKET_ACCEPT, &info.key),
        (SEC_WEBSOCKET_PROTOCOL, &info.protocols),
        (SEC_WEBSOCKET_EXTENSIONS, &info.extensions),
    ] {
        if value.is_empty() {
            continue;
        }
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(name, value);
        }
    }

    let on_upgrade = hyper::upgrade::on(&mut req);
    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                debug!("upgraded");
                if let Err(e) = handle_upgraded_connection(upgraded, config, info).await {
                    warn!(error = %e, "error handling upgraded connection");
                }
            }
            Err(e) => warn!(error = %e, "upgrade error"),
        }
    });

    response
}
