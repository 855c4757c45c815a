//! A method-aware trie HTTP router built on hyper.
//!
//! ```no_run
//! use grove::{Body, HandlerResult, HttpRouter, Request, RequestExt, Router, Server};
//!
//! async fn show_user(req: Request) -> HandlerResult {
//! 	let id = req.param("id").unwrap_or_default().to_owned();
//! 	Ok(hyper::Response::new(Body::from(id)))
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//! 	let mut builder = Router::builder();
//! 	builder.get("/users/:id", show_user)?;
//! 	let router = HttpRouter::from(builder.build());
//!
//! 	let addr = ([127, 0, 0, 1], 3000).into();
//! 	Server::bind(&addr).serve(router).await?;
//! 	Ok(())
//! }
//! ```
//!
//! Path segments starting with `:` are matched dynamically if no static segment matches, and
//! are bound under the name following the `:`. A node has at most one dynamic child. Bound
//! values are attached to the request and read back through [`RequestExt`].
//!
//! Routes are registered on a [`RouterBuilder`] and frozen by [`RouterBuilder::build`], so the
//! trie cannot change once it is serving. [`HttpRouter`] exposes the not-found page, the
//! unmatched-method status and the handler error conversion.

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub use http::*;
#[cfg(feature = "http")]
pub use ::hyper::Server;

/// Request and handler types, path segmentation and bound parameters.
pub mod route;

/// The route trie: registration and lookup.
pub mod router;

pub use route::*;
pub use router::*;
