use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::ConnectionSource;
use super::config::RegistryConfig;
use crate::error::SqlHandleError;
use crate::namespace::{Binding, Namespace, lookup_path};

/// Sources found under the root, in discovery order.
#[derive(Debug, Default)]
pub(super) struct Discovered {
    pub(super) sources: IndexMap<String, ConnectionSource>,
    /// First source of an explicit list; unset for the recursive search.
    pub(super) first_listed: Option<String>,
}

pub(super) fn discover(
    ns: &Arc<dyn Namespace>,
    config: &RegistryConfig,
) -> Result<Discovered, SqlHandleError> {
    let root = match lookup_path(ns, &config.root_namespace)? {
        Some(Binding::Context(ctx)) => ctx,
        Some(other) => {
            return Err(SqlHandleError::NamespaceError(format!(
                "root namespace \"{}\" is bound to {}, not a context",
                config.root_namespace,
                other.kind_name()
            )));
        }
        None => {
            return Err(SqlHandleError::NamespaceError(format!(
                "root namespace \"{}\" was not found",
                config.root_namespace
            )));
        }
    };
    debug!(root = %config.root_namespace, "connection sources must be bound under this root");

    let mut discovered = Discovered::default();
    match config.source_names() {
        Some(names) => {
            for name in names {
                resolve_listed(&root, &name, &mut discovered);
            }
        }
        None => search_context(&root, "", &mut discovered.sources)?,
    }
    Ok(discovered)
}

fn resolve_listed(root: &Arc<dyn Namespace>, name: &str, discovered: &mut Discovered) {
    match lookup_path(root, name) {
        Ok(Some(Binding::Provider(provider))) => {
            debug!(source = name, driver = provider.driver_name(), "adding listed source");
            discovered
                .sources
                .insert(name.to_string(), ConnectionSource::new(name, provider));
            if discovered.first_listed.is_none() {
                discovered.first_listed = Some(name.to_string());
            }
        }
        Ok(Some(other)) => warn!(
            source = name,
            bound = other.kind_name(),
            "dataSourceNames entry is not a connection provider; skipping"
        ),
        Ok(None) => warn!(
            source = name,
            "dataSourceNames entry does not refer to a known source; skipping"
        ),
        Err(err) => warn!(
            source = name,
            error = %err,
            "dataSourceNames entry could not be resolved; skipping"
        ),
    }
}

fn search_context(
    ctx: &Arc<dyn Namespace>,
    prefix: &str,
    sources: &mut IndexMap<String, ConnectionSource>,
) -> Result<(), SqlHandleError> {
    for (name, binding) in ctx.list_bindings()? {
        let full_name = format!("{prefix}{name}");
        match binding {
            Binding::Context(child) => {
                debug!(context = %format!("{full_name}/"), "searching sub-context for sources");
                search_context(&child, &format!("{full_name}/"), sources)?;
            }
            Binding::Provider(provider) => {
                debug!(
                    source = %full_name,
                    driver = provider.driver_name(),
                    "adding discovered source"
                );
                let source = ConnectionSource::new(&full_name, provider);
                sources.insert(full_name, source);
            }
            Binding::Other { type_name } => {
                warn!(binding = %full_name, bound = %type_name, "skipping non-provider binding");
            }
        }
    }
    Ok(())
}

/// Pick the default source name: the configured override, then the first listed source, then
/// the first map entry.
pub(super) fn elect_default(discovered: &Discovered, config: &RegistryConfig) -> Option<String> {
    if discovered.sources.is_empty() {
        return None;
    }
    if let Some(configured) = config.default_source_name() {
        if discovered.sources.contains_key(configured) {
            return Some(configured.to_string());
        }
        warn!(
            default = configured,
            "defaultDataSourceName does not refer to a known source"
        );
    }
    if let Some(first) = &discovered.first_listed {
        return Some(first.clone());
    }
    let (first, _) = discovered.sources.first()?;
    if discovered.sources.len() > 1 {
        warn!(
            default = %first,
            "multiple sources found without a clear default; set defaultDataSourceName to avoid ambiguity"
        );
    }
    Some(first.clone())
}
