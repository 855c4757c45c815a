use crate::{
	route::{normalize, route, HandlerResult, Request, Response},
	Router,
};
use anyhow::Error;
use hyper::{
	body::Body,
	header::{HeaderValue, ACCESS_CONTROL_REQUEST_METHOD, ALLOW, CONTENT_TYPE},
	http::Method,
	service::Service,
	StatusCode,
};
use std::{
	convert::Infallible,
	future::{ready, Future, Ready},
	path::PathBuf,
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
};
use tracing::{debug, trace, warn};

pub use hyper;

/// Page served when no route matches, relative to the working directory.
pub const NOT_FOUND_PAGE: &str = "views/404.html";

/// Body written when the matched node has no handler for the request method.
pub const INVALID_ROUTE: &str = "Invalid route";

fn default_error_handler(e: Error) -> hyper::Response<Body> {
	let mut res = hyper::Response::new(Body::from(e.to_string()));
	*res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
	res
}

/// A function that can convert an error into a response.
pub type ErrorHandler = fn(e: Error) -> hyper::Response<Body>;

/// Handles unroutable requests and creates a response.
pub type NotFoundHandler = crate::Route;

async fn serve_page(page: Arc<PathBuf>) -> HandlerResult {
	let mut res = match tokio::fs::read(page.as_path()).await {
		Ok(contents) => {
			let mut res = hyper::Response::new(Body::from(contents));
			res.headers_mut()
				.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
			res
		}
		Err(e) => {
			warn!(page = %page.display(), error = %e, "cannot read not-found page");
			hyper::Response::new(Body::empty())
		}
	};
	*res.status_mut() = StatusCode::NOT_FOUND;
	Ok(res)
}

fn respond(res: hyper::Response<Body>) -> Response {
	let res: HandlerResult = Ok(res);
	Box::pin(ready(res))
}

fn not_found_page(page: PathBuf) -> NotFoundHandler {
	let page = Arc::new(page);
	route(move |_req| serve_page(Arc::clone(&page)))
}

/// The requested method of a CORS preflight, if the request is one.
fn preflight_method(req: &Request) -> Option<Method> {
	if *req.method() != Method::OPTIONS {
		return None;
	}

	let requested = req.headers().get(ACCESS_CONTROL_REQUEST_METHOD)?;
	Method::from_bytes(requested.as_bytes()).ok()
}

/// Serves a [`Router`] through hyper.
///
/// Pass it to `hyper::Server::serve`; every connection gets a [`RouteHandler`]
/// sharing the same trie.
#[derive(Clone)]
pub struct HttpRouter {
	router: Arc<Router>,
	internal_error: ErrorHandler,
	not_found: NotFoundHandler,
	unmatched_method: StatusCode,
}

impl From<Router> for HttpRouter {
	fn from(router: Router) -> Self {
		Self {
			router: Arc::new(router),
			internal_error: default_error_handler,
			not_found: not_found_page(PathBuf::from(NOT_FOUND_PAGE)),
			unmatched_method: StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl HttpRouter {
	/// Converts errors returned from handlers into responses.
	pub fn internal_error_handler(mut self, handler: ErrorHandler) -> Self {
		self.internal_error = handler;
		self
	}

	/// Replaces the not-found page with an arbitrary handler.
	pub fn not_found_handler<F, Fut>(mut self, handler: F) -> Self
	where
		F: Fn(Request) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = HandlerResult> + Send + 'static,
	{
		self.not_found = route(handler);
		self
	}

	/// Serves the file at `page` with a 404 status when no route matches.
	pub fn not_found_page(mut self, page: impl Into<PathBuf>) -> Self {
		self.not_found = not_found_page(page.into());
		self
	}

	/// Status for requests whose path matched but whose method did not.
	/// Defaults to 500; 405 is the usual alternative.
	pub fn unmatched_method_status(mut self, status: StatusCode) -> Self {
		self.unmatched_method = status;
		self
	}

	/// A request handler sharing this router's trie.
	pub fn handler(&self) -> RouteHandler {
		RouteHandler {
			router: Arc::clone(&self.router),
			internal_error: self.internal_error,
			not_found: Arc::clone(&self.not_found),
			unmatched_method: self.unmatched_method,
		}
	}
}

impl<T> Service<T> for HttpRouter {
	type Response = RouteHandler;
	type Error = Infallible;
	type Future = Ready<Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, _: &mut Context) -> Poll<Result<(), Self::Error>> {
		Poll::Ready(Ok(()))
	}

	fn call(&mut self, _: T) -> Self::Future {
		ready(Ok(self.handler()))
	}
}

/// Responsible for handling the actual HTTP requests from hyper.
pub struct RouteHandler {
	router: Arc<Router>,
	internal_error: ErrorHandler,
	not_found: NotFoundHandler,
	unmatched_method: StatusCode,
}

impl RouteHandler {
	fn dispatch(&self, mut req: Request) -> Response {
		let uri = req.uri().clone();
		let path = uri.path();
		debug!(method = %req.method(), path = normalize(path), "routing request");

		let (node, params) = match self.router.resolve(path) {
			Some(found) => found,
			None => {
				trace!(path, "no route matched");
				return (self.not_found)(req);
			}
		};

		if !params.is_empty() {
			req.extensions_mut().insert(params);
		}

		if let Some(requested) = preflight_method(&req) {
			return match node.route(&requested) {
				Some(route) => route(req),
				None => respond(hyper::Response::new(Body::empty())),
			};
		}

		if let Some(route) = node.route(req.method()) {
			return route(req);
		}

		trace!(method = %req.method(), path, "no handler for method");
		let allow = node
			.methods()
			.iter()
			.map(|method| method.as_str())
			.collect::<Vec<_>>()
			.join(", ");

		let mut res = hyper::Response::new(Body::empty());
		*res.status_mut() = self.unmatched_method;
		if let Ok(allow) = HeaderValue::from_str(&allow) {
			res.headers_mut().insert(ALLOW, allow);
		}
		*res.body_mut() = Body::from(INVALID_ROUTE);
		respond(res)
	}
}

impl Service<Request> for RouteHandler {
	type Response = hyper::Response<Body>;
	type Error = Infallible;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

	fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		Poll::Ready(Ok(()))
	}

	fn call(&mut self, req: Request) -> Self::Future {
		let fut = self.dispatch(req);
		let err = self.internal_error;
		Box::pin(async move { Ok(fut.await.unwrap_or_else(err)) })
	}
}

#[cfg(test)]
mod test {
	use super::{HttpRouter, INVALID_ROUTE, NOT_FOUND_PAGE};
	use crate::{Body, HandlerResult, Request, RequestExt, RouteError, Router};
	use anyhow::anyhow;
	use hyper::{
		header::{HeaderMap, ACCESS_CONTROL_REQUEST_METHOD, ALLOW},
		service::Service,
		Method, StatusCode,
	};

	fn tagged(tag: &str, req: &Request) -> HandlerResult {
		let body = format!("{} {}", tag, req.method());
		Ok(hyper::Response::new(Body::from(body)))
	}

	async fn get_root(req: Request) -> HandlerResult {
		tagged("root", &req)
	}

	async fn post_root(req: Request) -> HandlerResult {
		tagged("post-root", &req)
	}

	async fn show_user(req: Request) -> HandlerResult {
		let id = req.param("id").unwrap_or("<none>");
		Ok(hyper::Response::new(Body::from(format!("user {}", id))))
	}

	async fn list_users(req: Request) -> HandlerResult {
		let body = if req.params().is_none() { "no params" } else { "params" };
		Ok(hyper::Response::new(Body::from(body)))
	}

	async fn show_post(req: Request) -> HandlerResult {
		let mut bindings = Vec::new();
		if let Some(params) = req.params() {
			for (name, value) in params {
				bindings.push(format!("{}={}", name, value));
			}
		}
		bindings.sort();
		Ok(hyper::Response::new(Body::from(bindings.join("&"))))
	}

	async fn update_user(req: Request) -> HandlerResult {
		tagged("update", &req)
	}

	async fn failing(_req: Request) -> HandlerResult {
		Err(anyhow!("database unavailable"))
	}

	async fn custom_not_found(_req: Request) -> HandlerResult {
		let mut res = hyper::Response::new(Body::from("missing"));
		*res.status_mut() = StatusCode::NOT_FOUND;
		Ok(res)
	}

	fn routes() -> Result<Router, RouteError> {
		let mut builder = Router::builder();
		builder
			.get("/", get_root)?
			.post("/", post_root)?
			.get("/users", list_users)?
			.get("/users/:id", show_user)?
			.put("/users/:id", update_user)?
			.get("/users/:id/posts/:post", show_post)?
			.get("/broken", failing)?;
		Ok(builder.build())
	}

	fn router() -> HttpRouter {
		HttpRouter::from(routes().unwrap()).not_found_handler(custom_not_found)
	}

	fn request(method: Method, uri: &str) -> Request {
		hyper::Request::builder()
			.method(method)
			.uri(uri)
			.body(Body::empty())
			.unwrap()
	}

	async fn send(router: &HttpRouter, req: Request) -> (StatusCode, HeaderMap, String) {
		let res = router.handler().call(req).await.unwrap();
		let (parts, body) = res.into_parts();
		let body = hyper::body::to_bytes(body).await.unwrap();
		(parts.status, parts.headers, String::from_utf8(body.to_vec()).unwrap())
	}

	#[tokio::test]
	async fn dispatches_root_by_method() {
		let router = router();
		let (status, _, body) = send(&router, request(Method::POST, "/")).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, "post-root POST");

		let (_, _, body) = send(&router, request(Method::GET, "/")).await;
		assert_eq!(body, "root GET");
	}

	#[tokio::test]
	async fn attaches_params() {
		let router = router();
		let (status, _, body) = send(&router, request(Method::GET, "/users/77")).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, "user 77");

		let (_, _, body) = send(&router, request(Method::GET, "/users")).await;
		assert_eq!(body, "no params");
	}

	#[tokio::test]
	async fn normalizes_trailing_slash() {
		let router = router();
		let (_, _, with_slash) = send(&router, request(Method::GET, "/users/")).await;
		let (_, _, without_slash) = send(&router, request(Method::GET, "/users")).await;
		assert_eq!(with_slash, without_slash);

		let (_, _, body) = send(&router, request(Method::GET, "/users/5/")).await;
		assert_eq!(body, "user 5");
	}

	#[tokio::test]
	async fn strips_only_one_trailing_slash() {
		let router = router();
		let (status, _, body) = send(&router, request(Method::GET, "/users//")).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, "user ");
	}

	#[tokio::test]
	async fn exposes_all_bindings() {
		let router = router();
		let (_, _, body) = send(&router, request(Method::GET, "/users/7/posts/12")).await;
		assert_eq!(body, "id=7&post=12");
	}

	#[tokio::test]
	async fn unmatched_method_is_server_error() {
		let router = router();
		let (status, headers, body) = send(&router, request(Method::DELETE, "/users/1")).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body, INVALID_ROUTE);
		assert_eq!(headers[ALLOW], "GET, PUT");

		let (status, _, body) = send(&router, request(Method::GET, "/posts/1")).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body, "missing");
	}

	#[tokio::test]
	async fn unmatched_method_status_is_configurable() {
		let router = router().unmatched_method_status(StatusCode::METHOD_NOT_ALLOWED);
		let (status, _, body) = send(&router, request(Method::POST, "/users")).await;
		assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
		assert_eq!(body, INVALID_ROUTE);
	}

	#[tokio::test]
	async fn intermediate_node_is_not_found() {
		let mut builder = Router::builder();
		builder.get("/a/b/c", get_root).unwrap();
		let router = HttpRouter::from(builder.build()).not_found_handler(custom_not_found);

		let (status, _, _) = send(&router, request(Method::GET, "/a/b")).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn preflight_runs_requested_method() {
		let router = router();
		let mut req = request(Method::OPTIONS, "/users/9");
		req.headers_mut()
			.insert(ACCESS_CONTROL_REQUEST_METHOD, "PUT".parse().unwrap());
		let (status, _, body) = send(&router, req).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, "update OPTIONS");

		let mut req = request(Method::OPTIONS, "/users/9");
		req.headers_mut()
			.insert(ACCESS_CONTROL_REQUEST_METHOD, "DELETE".parse().unwrap());
		let (status, _, body) = send(&router, req).await;
		assert_eq!(status, StatusCode::OK);
		assert!(body.is_empty());
	}

	#[tokio::test]
	async fn options_without_requested_method_falls_through() {
		let router = router();
		let (status, _, body) = send(&router, request(Method::OPTIONS, "/users/9")).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body, INVALID_ROUTE);
	}

	#[tokio::test]
	async fn handler_errors_become_responses() {
		let router = router();
		let (status, _, body) = send(&router, request(Method::GET, "/broken")).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body, "database unavailable");
	}

	#[tokio::test]
	async fn serves_not_found_page() {
		let mut builder = Router::builder();
		builder.get("/", get_root).unwrap();
		let router = HttpRouter::from(builder.build());

		let (status, _, body) = send(&router, request(Method::GET, "/nowhere")).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body, std::fs::read_to_string(NOT_FOUND_PAGE).unwrap());

		let router = router.not_found_page("views/missing.html");
		let (status, _, body) = send(&router, request(Method::GET, "/nowhere")).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert!(body.is_empty());
	}
}
