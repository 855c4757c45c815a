use anyhow::Result;
pub use hyper::{header, http::response::Builder as ResponseBuilder, Body, Method, StatusCode};
use std::{
	collections::{hash_map, HashMap},
	future::Future,
	pin::Pin,
	sync::Arc,
};

pub type Request = hyper::Request<Body>;

/// What a route handler resolves to.
pub type HandlerResult = Result<hyper::Response<Body>>;

/// The boxed future every route handler returns.
pub type Response = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A type-erased route handler.
pub type Route = Arc<dyn Fn(Request) -> Response + Send + Sync>;

/// Prefix marking a registered path segment as a named parameter.
pub const PARAM_MARKER: char = ':';

/// Boxes any async function of a request into a [`Route`].
pub fn route<F, Fut>(handler: F) -> Route
where
	F: Fn(Request) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = HandlerResult> + Send + 'static,
{
	Arc::new(move |req| -> Response { Box::pin(handler(req)) })
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PathSegment<'a> {
	/// Matches any single segment and binds it under the given name.
	Dynamic(&'a str),
	Static(&'a str),
}

impl<'a> PathSegment<'a> {
	pub fn parse(token: &'a str) -> Self {
		match token.strip_prefix(PARAM_MARKER) {
			Some(name) => PathSegment::Dynamic(name),
			None => PathSegment::Static(token),
		}
	}
}

/// Strips one trailing `/`, keeping `/` itself intact.
pub fn normalize(path: &str) -> &str {
	match path.strip_suffix('/') {
		Some("") | None => path,
		Some(trimmed) => trimmed,
	}
}

/// Splits a path on `/`, dropping the empty element before the leading slash.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
	path.split('/').skip(1)
}

/// Path parameters bound while matching a request.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Params(HashMap<String, String>);

impl Params {
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(name).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> hash_map::Iter<'_, String, String> {
		self.0.iter()
	}

	pub(crate) fn insert(&mut self, name: &str, value: &str) {
		self.0.insert(name.to_owned(), value.to_owned());
	}
}

impl<'a> IntoIterator for &'a Params {
	type Item = (&'a String, &'a String);
	type IntoIter = hash_map::Iter<'a, String, String>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

/// Access to the parameters the router attached to a request.
///
/// Parameters are only attached when the matched route has at least one
/// dynamic segment; otherwise both accessors return `None`.
pub trait RequestExt {
	fn params(&self) -> Option<&Params>;

	fn param(&self, name: &str) -> Option<&str> {
		self.params().and_then(|params| params.get(name))
	}
}

impl<B> RequestExt for hyper::Request<B> {
	fn params(&self) -> Option<&Params> {
		self.extensions().get::<Params>()
	}
}

/// Free-function form of [`RequestExt::params`].
pub fn params<B>(req: &hyper::Request<B>) -> Option<&Params> {
	req.params()
}
