use std::convert::Infallible;
use std::net::SocketAddr;

use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use tracing::info;

use hyper_websocket::WebSocketConfig;

mod endpoints;

use endpoints::*;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8081";

async fn request_router(
    req: Request<Body>,
    config: WebSocketConfig,
) -> std::result::Result<Response<Body>, Infallible> {
    info!(uri = %req.uri(), "request");
    let response = match req.uri().path() {
        "/ws" => handle_ws(req, config),
        _ => not_found(),
    };
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let addr: SocketAddr = std::env::var("WS_BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()?;
    let config = WebSocketConfig::from_env();

    let service = make_service_fn(move |_addr| {
        let config = config.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| request_router(req, config.clone())))
        }
    });
    let server = Server::bind(&addr).serve(service);

    info!("Listening at http://{}", addr);

    server.await?;

    Ok(())
}
