use crate::ClientSet;
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use kube::client::Body;
use tower_test::mock::{self, Handle, SendResponse};

pub(crate) type ApiServer = Handle<Request<Body>, Response<Body>>;

/// Returns a client set whose requests are served by the returned handle.
pub(crate) fn mock_client_set() -> (ClientSet, ApiServer) {
    let (service, handle) = mock::pair::<Request<Body>, Response<Body>>();
    let client = kube::Client::new(service, "default");
    (ClientSet::new(client), handle)
}

/// Waits for the next request and checks its method and path.
pub(crate) async fn expect_request(
    server: &mut ApiServer,
    method: Method,
    path: &str,
) -> (Request<Body>, SendResponse<Response<Body>>) {
    let (request, send) = server.next_request().await.expect("service not called");
    assert_eq!(request.method(), method, "unexpected method for {}", request.uri());
    assert_eq!(request.uri().path(), path);
    (request, send)
}

pub(crate) async fn request_json(request: Request<Body>) -> serde_json::Value {
    let body = request
        .into_body()
        .collect()
        .await
        .expect("request body must be readable")
        .to_bytes();
    serde_json::from_slice(&body).expect("request body must be JSON")
}

pub(crate) fn respond(
    send: SendResponse<Response<Body>>,
    status: StatusCode,
    body: serde_json::Value,
) {
    let body = serde_json::to_vec(&body).expect("response must serialize");
    send.send_response(
        Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("response must build"),
    );
}

pub(crate) fn respond_ok<T: serde::Serialize>(send: SendResponse<Response<Body>>, obj: &T) {
    respond(
        send,
        StatusCode::OK,
        serde_json::to_value(obj).expect("object must serialize"),
    );
}

pub(crate) fn respond_not_found(send: SendResponse<Response<Body>>, what: &str) {
    respond(
        send,
        StatusCode::NOT_FOUND,
        serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": format!("{what} not found"),
            "reason": "NotFound",
            "code": 404,
        }),
    );
}

pub(crate) fn respond_internal_error(send: SendResponse<Response<Body>>) {
    respond(
        send,
        StatusCode::INTERNAL_SERVER_ERROR,
        serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": "etcdserver: request timed out",
            "reason": "InternalError",
            "code": 500,
        }),
    );
}
