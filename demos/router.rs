use grove::{Body, HandlerResult, HttpRouter, Request, RequestExt, Router, Server, StatusCode};
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn index(_req: Request) -> HandlerResult {
	Ok(hyper::Response::new(Body::from("hello")))
}

async fn show_user(req: Request) -> HandlerResult {
	let id = req.param("id").unwrap_or_default();
	Ok(hyper::Response::new(Body::from(format!("user {}", id))))
}

async fn create_user(_req: Request) -> HandlerResult {
	let mut res = hyper::Response::new(Body::empty());
	*res.status_mut() = StatusCode::CREATED;
	Ok(res)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "grove=debug".into()))
		.init();

	let addr = ([127, 0, 0, 1], 3000).into();

	let mut builder = Router::builder();
	builder
		.get("/", index)?
		.post("/users", create_user)?
		.get("/users/:id", show_user)?
		.delete("/users/:id", show_user)?;

	let router = HttpRouter::from(builder.build()).unmatched_method_status(StatusCode::METHOD_NOT_ALLOWED);

	let server = Server::bind(&addr).serve(router);
	info!(%addr, "listening");

	server.await?;
	Ok(())
}
