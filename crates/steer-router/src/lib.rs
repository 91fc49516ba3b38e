//! steer-router: zero-dependency segment trie router
//!
//! Maps `(method, path)` pairs to numeric handler IDs. The services keep
//! the actual handlers in their own tables and only ask the router which
//! ID a request resolves to.
//!
//! ## Path Syntax
//! - `:name` - Named parameter (captures one segment)
//! - `*` or `*name` - Wildcard (captures the remaining path, may contain `/`)
//!
//! Empty segments are ignored on both sides, so `/a//b/` and `/a/b` are
//! the same route. A wildcard capture keeps a trailing slash: `/k/*rest`
//! captures `a/` from `/k/a/` and `a` from `/k/a`.
//!
//! ## Priority
//! 1. Exact static match (highest)
//! 2. Parameter match
//! 3. Wildcard match (lowest)
//!
//! ## Example
//! ```
//! use steer_router::Router;
//!
//! let mut router = Router::new();
//! router.insert("GET", "/backend/fetchallkeys", 0).unwrap();
//! router.insert("GET", "/backend/fetchkey/*uri", 1).unwrap();
//!
//! let m = router.find("GET", "/backend/fetchkey/api/v1/echo").unwrap();
//! assert_eq!(m.handler_id, 1);
//! assert_eq!(m.param("uri"), Some("api/v1/echo"));
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Route match result
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// The matched handler ID
    pub handler_id: u32,
    /// Captured path parameters as (name, value) pairs, in path order
    pub params: Vec<(String, String)>,
}

impl Match {
    /// Look up a captured parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get params as HashMap for convenient access
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params.iter().cloned().collect()
    }
}

/// Route registration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The same method and path shape was registered twice
    Duplicate { method: String, path: String },
    /// Two parameters with different names at the same position
    ParamConflict { existing: String, new: String },
    /// Wildcard not in last position
    WildcardNotLast { path: String },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::Duplicate { method, path } => {
                write!(f, "route already registered: {} {}", method, path)
            }
            RouteError::ParamConflict { existing, new } => {
                write!(f, "parameter :{} conflicts with existing :{}", new, existing)
            }
            RouteError::WildcardNotLast { path } => {
                write!(f, "wildcard must be the last segment: {}", path)
            }
        }
    }
}

impl std::error::Error for RouteError {}

/// Trie node for path segment matching
#[derive(Debug, Default)]
struct Node {
    children: HashMap<String, Node>,
    param_child: Option<Box<ParamNode>>,
    wildcard_child: Option<WildcardNode>,
    handler_id: Option<u32>,
}

#[derive(Debug)]
struct ParamNode {
    name: String,
    node: Node,
}

#[derive(Debug)]
struct WildcardNode {
    name: String,
    handler_id: u32,
}

/// Segment trie router, one tree per HTTP method
#[derive(Debug, Default)]
pub struct Router {
    trees: HashMap<String, Node>,
    len: usize,
}

impl Router {
    /// Create a new router
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route
    ///
    /// Fails if the exact route shape is already taken for this method.
    pub fn insert(&mut self, method: &str, path: &str, handler_id: u32) -> Result<(), RouteError> {
        let method = method.to_uppercase();
        let segments = split_path(path);

        if let Some(pos) = segments.iter().position(|s| s.starts_with('*')) {
            if pos != segments.len() - 1 {
                return Err(RouteError::WildcardNotLast { path: path.to_string() });
            }
        }

        let tree = self.trees.entry(method.clone()).or_default();
        Self::insert_node(tree, &segments, handler_id).map_err(|e| match e {
            InsertError::Duplicate => RouteError::Duplicate {
                method,
                path: path.to_string(),
            },
            InsertError::Param(existing, new) => RouteError::ParamConflict { existing, new },
        })?;
        self.len += 1;
        Ok(())
    }

    fn insert_node(node: &mut Node, segments: &[&str], handler_id: u32) -> Result<(), InsertError> {
        let Some((segment, rest)) = segments.split_first() else {
            if node.handler_id.is_some() {
                return Err(InsertError::Duplicate);
            }
            node.handler_id = Some(handler_id);
            return Ok(());
        };

        if let Some(name) = segment.strip_prefix(':') {
            let param = node.param_child.get_or_insert_with(|| {
                Box::new(ParamNode {
                    name: name.to_string(),
                    node: Node::default(),
                })
            });
            if param.name != name {
                return Err(InsertError::Param(param.name.clone(), name.to_string()));
            }
            Self::insert_node(&mut param.node, rest, handler_id)
        } else if let Some(name) = segment.strip_prefix('*') {
            if node.wildcard_child.is_some() {
                return Err(InsertError::Duplicate);
            }
            let name = if name.is_empty() { "*" } else { name };
            node.wildcard_child = Some(WildcardNode {
                name: name.to_string(),
                handler_id,
            });
            Ok(())
        } else {
            let child = node.children.entry(segment.to_string()).or_default();
            Self::insert_node(child, rest, handler_id)
        }
    }

    /// Find a matching route
    ///
    /// Returns `None` when the method has no route for this path. Use
    /// [`Router::allowed_methods`] to tell a 404 from a 405.
    pub fn find(&self, method: &str, path: &str) -> Option<Match> {
        let tree = self.trees.get(&method.to_uppercase())?;
        let segments = split_path(path);
        let mut params = Vec::new();
        Self::find_node(tree, &segments, path.ends_with('/'), &mut params)
    }

    fn find_node(
        node: &Node,
        segments: &[&str],
        trailing_slash: bool,
        params: &mut Vec<(String, String)>,
    ) -> Option<Match> {
        let Some((segment, rest)) = segments.split_first() else {
            return node.handler_id.map(|id| Match {
                handler_id: id,
                params: params.clone(),
            });
        };

        if let Some(child) = node.children.get(*segment) {
            if let Some(m) = Self::find_node(child, rest, trailing_slash, params) {
                return Some(m);
            }
        }

        if let Some(ref param) = node.param_child {
            params.push((param.name.clone(), segment.to_string()));
            if let Some(m) = Self::find_node(&param.node, rest, trailing_slash, params) {
                return Some(m);
            }
            params.pop();
        }

        if let Some(ref wildcard) = node.wildcard_child {
            let mut rest = segments.join("/");
            if trailing_slash {
                rest.push('/');
            }
            let mut captured = params.clone();
            captured.push((wildcard.name.clone(), rest));
            return Some(Match {
                handler_id: wildcard.handler_id,
                params: captured,
            });
        }

        None
    }

    /// Methods that have a route matching `path`, sorted
    pub fn allowed_methods(&self, path: &str) -> Vec<String> {
        let segments = split_path(path);
        let found: BTreeSet<&String> = self
            .trees
            .iter()
            .filter(|(_, tree)| Self::find_node(tree, &segments, false, &mut Vec::new()).is_some())
            .map(|(method, _)| method)
            .collect();
        found.into_iter().cloned().collect()
    }

    /// Check if a method has any routes registered
    pub fn has_method(&self, method: &str) -> bool {
        self.trees.contains_key(&method.to_uppercase())
    }

    /// Number of registered routes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

enum InsertError {
    Duplicate,
    Param(String, String),
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
