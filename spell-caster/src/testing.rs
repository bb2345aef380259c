//! Local HTTP server standing in for Tenderly and the simulation RPC.

use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{
    body::Incoming, header::HeaderMap, service::service_fn, Method, Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;

/// A request as seen by the server.
#[derive(Debug, Clone)]
pub struct Received {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Serves every request with `handler` and returns the server URL.
pub async fn serve<F>(handler: F) -> Url
where
    F: Fn(Received) -> (StatusCode, Value) + Send + Sync + 'static,
{
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            let (tcp, _) = listener.accept().await.unwrap();
            let handler = handler.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| respond(req, handler.clone()));
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(tcp), service)
                    .await;
            });
        }
    });

    format!("http://{addr}").parse().unwrap()
}

async fn respond<F>(
    req: Request<Incoming>,
    handler: Arc<F>,
) -> Result<Response<Full<Bytes>>, hyper::Error>
where
    F: Fn(Received) -> (StatusCode, Value) + Send + Sync + 'static,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let headers = req.headers().clone();
    let bytes = req.collect().await?.to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    let (status, reply) = (*handler)(Received {
        method,
        path,
        headers,
        body,
    });

    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(reply.to_string())))
        .unwrap())
}

/// JSON-RPC success answering `request`.
pub fn rpc_result(request: &Value, result: Value) -> (StatusCode, Value) {
    let reply = json!({ "jsonrpc": "2.0", "id": request["id"], "result": result });
    (StatusCode::OK, reply)
}

/// JSON-RPC error answering `request`.
pub fn rpc_error(request: &Value, message: &str) -> (StatusCode, Value) {
    let reply = json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "error": { "code": 3, "message": message },
    });
    (StatusCode::OK, reply)
}
