use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::datasource::{Datasource, DatasourcePlugin, Parameters, RasterPlugin};
use crate::error::{Error, ResultExt};

#[derive(Default)]
struct RegistryState {
    /// Plugins compiled into the binary or handed over by the application.
    catalog: BTreeMap<String, Arc<dyn DatasourcePlugin>>,
    /// Plugins that can be used to create datasources.
    active: BTreeMap<String, Arc<dyn DatasourcePlugin>>,
}

/// Registry of datasource plugins.
///
/// Plugins are taken from a catalog of known implementations and become usable once registered:
/// either directly with [`DatasourceRegistry::register_plugin`], or by
/// [`DatasourceRegistry::register_datasources`], which activates every plugin whose module file
/// (`<name>.input`) is found in a directory.
///
/// All lookups and mutations go through a single lock, held only for the duration of the map
/// operation. Plugin factories run outside of it.
pub struct DatasourceRegistry {
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for DatasourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasourceRegistry")
            .field("plugins", &self.plugin_names())
            .finish()
    }
}

impl Default for DatasourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasourceRegistry {
    /// Creates a registry that knows the built-in plugins but has none of them registered.
    pub fn new() -> Self {
        let mut state = RegistryState::default();
        for plugin in builtin_plugins() {
            state.catalog.insert(plugin.name().to_string(), plugin);
        }

        Self {
            state: Mutex::new(state),
        }
    }

    /// Creates a registry with every built-in plugin registered.
    pub fn with_builtin_plugins() -> Self {
        let registry = Self::new();
        {
            let mut state = registry.state.lock();
            state.active = state.catalog.clone();
        }
        registry
    }

    /// Registers a plugin, adding it to the catalog. Returns false if a plugin with this name was
    /// already registered; the registered one is kept.
    pub fn register_plugin(&self, plugin: Arc<dyn DatasourcePlugin>) -> bool {
        let name = plugin.name().to_string();
        let mut state = self.state.lock();
        if state.active.contains_key(&name) {
            log::debug!("Datasource plugin '{name}' is already registered");
            return false;
        }

        state.catalog.insert(name.clone(), plugin.clone());
        state.active.insert(name.clone(), plugin);
        log::debug!("Registered datasource plugin '{name}'");
        true
    }

    /// Registers the plugins whose module files are present in the directory.
    ///
    /// Every `<name>.input` file activates the catalog plugin with that name. Plugins that are
    /// already registered are skipped, so calling this repeatedly is harmless. Returns the number
    /// of newly registered plugins.
    pub fn register_datasources(&self, dir: impl AsRef<Path>) -> Result<usize, Error> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("while reading plugin directory '{}'", dir.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("input") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();

        let mut registered = 0;
        let mut state = self.state.lock();
        for name in names {
            if state.active.contains_key(&name) {
                log::trace!("Datasource plugin '{name}' is already registered, skipping");
                continue;
            }

            match state.catalog.get(&name).cloned() {
                Some(plugin) => {
                    state.active.insert(name.clone(), plugin);
                    registered += 1;
                    log::debug!("Registered datasource plugin '{name}' from '{}'", dir.display());
                }
                None => log::warn!(
                    "Module '{name}.input' in '{}' doesn't match any known datasource plugin",
                    dir.display()
                ),
            }
        }

        Ok(registered)
    }

    /// Names of the registered plugins.
    pub fn plugin_names(&self) -> Vec<String> {
        self.state.lock().active.keys().cloned().collect()
    }

    /// Creates a datasource with the plugin named by the `type` parameter.
    ///
    /// Fails with a configuration error if there is no `type` parameter or no plugin with that name
    /// is registered, and with the plugin's error if it can't create the datasource.
    pub fn create(&self, params: &Parameters) -> Result<Box<dyn Datasource>, Error> {
        let type_name = params
            .get("type")
            .ok_or_else(|| Error::config("could not create datasource: missing 'type' parameter"))?;

        let plugin = {
            let state = self.state.lock();
            state.active.get(type_name).cloned().ok_or_else(|| {
                let available: Vec<&str> = state.active.keys().map(String::as_str).collect();
                Error::config(format!(
                    "could not create datasource: no datasource plugin named '{type_name}' is registered (registered: {})",
                    if available.is_empty() { "none".to_string() } else { available.join(", ") }
                ))
            })?
        };

        log::trace!("Creating datasource of type '{type_name}'");
        plugin.create(params)
    }
}

fn builtin_plugins() -> Vec<Arc<dyn DatasourcePlugin>> {
    let mut plugins: Vec<Arc<dyn DatasourcePlugin>> = vec![Arc::new(RasterPlugin)];
    #[cfg(feature = "geojson")]
    plugins.push(Arc::new(crate::datasource::GeoJsonPlugin));
    plugins
}
