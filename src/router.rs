use crate::route::{normalize, route, segments, HandlerResult, Params, PathSegment, Request, Route};
use hyper::Method;
use std::{
	collections::HashMap,
	fmt::{self, Debug, Formatter},
	future::Future,
};
use thiserror::Error;
use tracing::debug;

/// A route path that cannot be added to the trie.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RouteError {
	#[error("route path `{0}` must begin with `/`")]
	MissingLeadingSlash(String),

	#[error("route path `{0}` contains a parameter without a name")]
	EmptyParameter(String),

	#[error("route path `{path}` binds `:{name}` where `:{existing}` is already registered")]
	ConflictingParameter {
		path: String,
		existing: String,
		name: String,
	},
}

/// A vertex of the route trie.
#[derive(Default)]
pub struct RouteNode {
	routes: HashMap<Method, Route>,
	statics: HashMap<String, RouteNode>,
	dynamic: Option<Box<DynamicNode>>,
}

struct DynamicNode {
	name: String,
	node: RouteNode,
}

impl RouteNode {
	/// The handler registered on this node for `method`.
	pub fn route(&self, method: &Method) -> Option<&Route> {
		self.routes.get(method)
	}

	/// Methods with a handler on this node, sorted for stable output.
	pub fn methods(&self) -> Vec<&Method> {
		let mut methods: Vec<_> = self.routes.keys().collect();
		methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
		methods
	}

	fn is_leaf(&self) -> bool {
		self.statics.is_empty() && self.dynamic.is_none()
	}

	fn child_mut(&mut self, segment: PathSegment<'_>) -> &mut RouteNode {
		match segment {
			PathSegment::Static(literal) => self.statics.entry(literal.to_owned()).or_default(),
			PathSegment::Dynamic(name) => {
				let dynamic = self.dynamic.get_or_insert_with(|| {
					Box::new(DynamicNode {
						name: name.to_owned(),
						node: RouteNode::default(),
					})
				});
				&mut dynamic.node
			}
		}
	}
}

/// Checks `segments` against the existing trie without touching it.
fn validate(root: &RouteNode, path: &str, segments: &[PathSegment<'_>]) -> Result<(), RouteError> {
	let mut node = Some(root);
	for segment in segments {
		node = match *segment {
			PathSegment::Dynamic("") => return Err(RouteError::EmptyParameter(path.to_owned())),
			PathSegment::Dynamic(name) => {
				let dynamic = node.and_then(|node| node.dynamic.as_deref());
				if let Some(dynamic) = dynamic {
					if dynamic.name != name {
						return Err(RouteError::ConflictingParameter {
							path: path.to_owned(),
							existing: dynamic.name.clone(),
							name: name.to_owned(),
						});
					}
				}
				dynamic.map(|dynamic| &dynamic.node)
			}
			PathSegment::Static(literal) => node.and_then(|node| node.statics.get(literal)),
		};
	}
	Ok(())
}

impl Debug for RouteNode {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut s = f.debug_struct("RouteNode");
		s.field("methods", &self.methods()).field("statics", &self.statics);
		match &self.dynamic {
			Some(dynamic) => s.field("dynamic", &(&dynamic.name, &dynamic.node)),
			None => s.field("dynamic", &None::<()>),
		};
		s.finish()
	}
}

/// Collects routes before the router starts serving.
///
/// ```
/// use grove::{Body, HandlerResult, Request, Router};
///
/// async fn handler(_req: Request) -> HandlerResult {
/// 	Ok(hyper::Response::new(Body::empty()))
/// }
///
/// let mut builder = Router::builder();
/// builder.get("/", handler)?.post("/users/:id", handler)?;
/// let router = builder.build();
/// assert!(router.resolve("/users/7/").is_some());
/// # Ok::<(), grove::RouteError>(())
/// ```
#[derive(Debug, Default)]
pub struct RouterBuilder {
	root: RouteNode,
}

impl RouterBuilder {
	/// Adds `handler` for `method` at `path`. A later registration for the same
	/// method and path replaces the earlier one.
	pub fn register<F, Fut>(&mut self, method: Method, path: &str, handler: F) -> Result<&mut Self, RouteError>
	where
		F: Fn(Request) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = HandlerResult> + Send + 'static,
	{
		if !path.starts_with('/') {
			return Err(RouteError::MissingLeadingSlash(path.to_owned()));
		}

		let normalized = normalize(path);
		let parsed: Vec<_> = match normalized {
			"/" => Vec::new(),
			_ => segments(normalized).map(PathSegment::parse).collect(),
		};
		validate(&self.root, path, &parsed)?;

		let mut node = &mut self.root;
		for segment in parsed {
			node = node.child_mut(segment);
		}

		debug!(%method, path = normalized, "registered route");
		node.routes.insert(method, route(handler));
		Ok(self)
	}

	pub fn get<F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
	where
		F: Fn(Request) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = HandlerResult> + Send + 'static,
	{
		self.register(Method::GET, path, handler)
	}

	pub fn post<F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
	where
		F: Fn(Request) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = HandlerResult> + Send + 'static,
	{
		self.register(Method::POST, path, handler)
	}

	pub fn put<F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
	where
		F: Fn(Request) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = HandlerResult> + Send + 'static,
	{
		self.register(Method::PUT, path, handler)
	}

	pub fn delete<F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
	where
		F: Fn(Request) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = HandlerResult> + Send + 'static,
	{
		self.register(Method::DELETE, path, handler)
	}

	/// Freezes the trie. Nothing can be registered on the result.
	pub fn build(self) -> Router {
		Router { root: self.root }
	}
}

/// An immutable route trie, safe to share between concurrent requests.
#[derive(Debug, Default)]
pub struct Router {
	root: RouteNode,
}

impl Router {
	pub fn builder() -> RouterBuilder {
		RouterBuilder::default()
	}

	pub fn root(&self) -> &RouteNode {
		&self.root
	}

	/// Resolves a request path, trailing slash included, to its node.
	pub fn resolve(&self, path: &str) -> Option<(&RouteNode, Params)> {
		match normalize(path) {
			"/" => Some((&self.root, Params::default())),
			normalized => self.find(normalized),
		}
	}

	/// Walks the trie segment by segment. Literal children win over the dynamic
	/// child; the walk fails on the first segment neither can satisfy, and a
	/// node without handlers is not a match.
	pub fn find(&self, path: &str) -> Option<(&RouteNode, Params)> {
		let mut node = &self.root;
		let mut params = Params::default();

		for segment in segments(path) {
			if node.is_leaf() {
				return None;
			}

			node = match (node.statics.get(segment), &node.dynamic) {
				(Some(child), _) => child,
				(None, Some(dynamic)) => {
					params.insert(&dynamic.name, segment);
					&dynamic.node
				}
				(None, None) => return None,
			};
		}

		if node.routes.is_empty() {
			return None;
		}

		Some((node, params))
	}
}
