//! Directory of named bindings that the registry searches for connection sources.
//!
//! A namespace is a tree: each binding is a nested context, a connection provider, or some
//! unrelated object that discovery ignores.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::driver::ConnectionProvider;
use crate::error::SqlHandleError;

pub mod file;

/// What a name is bound to.
#[derive(Clone)]
pub enum Binding {
    Context(Arc<dyn Namespace>),
    Provider(Arc<dyn ConnectionProvider>),
    /// Anything else; `type_name` is only used in log messages.
    Other { type_name: String },
}

impl Binding {
    #[must_use]
    pub fn kind_name(&self) -> &str {
        match self {
            Binding::Context(_) => "context",
            Binding::Provider(provider) => provider.driver_name(),
            Binding::Other { type_name } => type_name,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Context(ctx) => f.debug_tuple("Context").field(ctx).finish(),
            Binding::Provider(p) => f.debug_tuple("Provider").field(p).finish(),
            Binding::Other { type_name } => f
                .debug_struct("Other")
                .field("type_name", type_name)
                .finish(),
        }
    }
}

/// The two operations discovery needs from a directory.
pub trait Namespace: Send + Sync + fmt::Debug {
    /// Direct children of this context, in a stable order.
    ///
    /// # Errors
    /// Returns `NamespaceError` if the directory cannot be read.
    fn list_bindings(&self) -> Result<Vec<(String, Binding)>, SqlHandleError>;

    /// Look up one direct child.
    ///
    /// # Errors
    /// Returns `NamespaceError` if the directory cannot be read.
    fn lookup(&self, name: &str) -> Result<Option<Binding>, SqlHandleError>;
}

/// Resolve a slash-separated path below `ns`. The empty path resolves to `ns` itself.
///
/// # Errors
/// Returns `NamespaceError` if an intermediate segment is not a context, or the directory
/// fails.
pub fn lookup_path(ns: &Arc<dyn Namespace>, path: &str) -> Result<Option<Binding>, SqlHandleError> {
    let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
    let mut current = Arc::clone(ns);
    let Some(mut segment) = segments.next() else {
        return Ok(Some(Binding::Context(current)));
    };
    loop {
        let found = current.lookup(segment)?;
        match (found, segments.next()) {
            (found, None) => return Ok(found),
            (None, Some(_)) => return Ok(None),
            (Some(Binding::Context(child)), Some(next)) => {
                current = child;
                segment = next;
            }
            (Some(other), Some(_)) => {
                return Err(SqlHandleError::NamespaceError(format!(
                    "\"{segment}\" in path \"{path}\" is bound to {}, not a context",
                    other.kind_name()
                )));
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Context(InMemoryNamespace),
    Bound(Binding),
}

impl Entry {
    fn to_binding(&self) -> Binding {
        match self {
            Entry::Context(ctx) => Binding::Context(Arc::new(ctx.clone())),
            Entry::Bound(binding) => binding.clone(),
        }
    }
}

/// Namespace held in memory; bindings keep their insertion order.
///
/// ```rust
/// use sql_handles::prelude::*;
///
/// let ns = InMemoryNamespace::new()
///     .with_other("env/sql/readme", "text")
///     .with_context("env/sql/reporting", InMemoryNamespace::new());
/// assert_eq!(ns.list_bindings().unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryNamespace {
    entries: IndexMap<String, Entry>,
}

impl InMemoryNamespace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_provider(mut self, path: &str, provider: Arc<dyn ConnectionProvider>) -> Self {
        self.bind_path(path, Binding::Provider(provider));
        self
    }

    #[must_use]
    pub fn with_context(mut self, path: &str, context: InMemoryNamespace) -> Self {
        self.insert_entry(path, Entry::Context(context));
        self
    }

    #[must_use]
    pub fn with_other(mut self, path: &str, type_name: &str) -> Self {
        self.bind_path(
            path,
            Binding::Other {
                type_name: type_name.to_string(),
            },
        );
        self
    }

    /// Bind `binding` at a slash-separated path, creating intermediate contexts.
    /// An existing binding at the same path is replaced.
    pub fn bind_path(&mut self, path: &str, binding: Binding) {
        self.insert_entry(path, Entry::Bound(binding));
    }

    fn insert_entry(&mut self, path: &str, entry: Entry) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut ctx = self;
        for parent in parents {
            let slot = ctx
                .entries
                .entry((*parent).to_string())
                .or_insert_with(|| Entry::Context(InMemoryNamespace::new()));
            if !matches!(slot, Entry::Context(_)) {
                *slot = Entry::Context(InMemoryNamespace::new());
            }
            let Entry::Context(next) = slot else {
                return;
            };
            ctx = next;
        }
        ctx.entries.insert((*last).to_string(), entry);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Namespace for InMemoryNamespace {
    fn list_bindings(&self) -> Result<Vec<(String, Binding)>, SqlHandleError> {
        Ok(self
            .entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.to_binding()))
            .collect())
    }

    fn lookup(&self, name: &str) -> Result<Option<Binding>, SqlHandleError> {
        Ok(self.entries.get(name).map(Entry::to_binding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_path_creates_contexts() {
        let ns = InMemoryNamespace::new()
            .with_other("a/b/c", "thing")
            .with_other("a/d", "other");
        let root: Arc<dyn Namespace> = Arc::new(ns);

        let names: Vec<String> = match lookup_path(&root, "a").unwrap() {
            Some(Binding::Context(ctx)) => ctx
                .list_bindings()
                .unwrap()
                .into_iter()
                .map(|(n, _)| n)
                .collect(),
            other => panic!("expected context, got {other:?}"),
        };
        assert_eq!(names, vec!["b", "d"]);

        assert!(matches!(
            lookup_path(&root, "/a/b/c").unwrap(),
            Some(Binding::Other { .. })
        ));
        assert!(lookup_path(&root, "a/x/c").unwrap().is_none());
        assert!(matches!(
            lookup_path(&root, "").unwrap(),
            Some(Binding::Context(_))
        ));
    }

    #[test]
    fn path_through_a_leaf_is_an_error() {
        let root: Arc<dyn Namespace> = Arc::new(InMemoryNamespace::new().with_other("a", "leaf"));
        let err = lookup_path(&root, "a/b").unwrap_err();
        assert!(matches!(err, SqlHandleError::NamespaceError(_)));
    }
}
