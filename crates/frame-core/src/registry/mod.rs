//! Plugin type registries
//!
//! A [`TypeRegistry`] resolves a type name (or a settings mapping naming a
//! type) into a constructed plugin instance plus its fully merged settings.
//! There is one registry per plugin category; [`Plugins`] owns all of them
//! together with the shared [`DefaultsTable`].
//!
//! ## Resolution
//!
//! A requested type may be a *reference*: a named alias for another type
//! with override settings. References are followed transitively until a
//! concrete factory name is reached. For a chain `A -> B -> C` the merged
//! settings are layered, lowest priority first:
//!
//! ```text
//! registry defaults
//!   < defaults[C] < defaults[B] < ref B < defaults[A] < ref A
//!   < explicit settings
//! ```
//!
//! Revisiting a name while following the chain fails with
//! [`Error::CircularReference`], so resolution always terminates.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use frame_core::registry::Plugins;
//!
//! let plugins = Plugins::new();
//! plugins.parsers.register("json", json_parser_factory);
//! plugins.parsers.register_ref("loadavg", Settings::of_type("regex").with("pattern", r"load average: (\S+)"));
//!
//! let (parser, settings) = plugins.parsers.make("loadavg")?;
//! ```

mod plugins;

pub use plugins::{
    ACTIONS, DefaultsTable, PARSERS, Plugins, RENDERERS, SharedDefaults, TARGETS, VALUES,
};

use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::state::SnapshotStore;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Factory taking only the resolved settings
pub type PlainFactory<T> = dyn Fn(&Settings) -> Result<Box<T>> + Send + Sync;

/// Factory that additionally receives the engine context
pub type ContextualFactory<T> = dyn Fn(&Settings, &FactoryContext<'_>) -> Result<Box<T>> + Send + Sync;

/// A registered constructor
///
/// The variant is chosen at registration time: most plugins only need their
/// settings, a few need access to the owning engine (other registries for
/// nested plugins, or the snapshot store for subscriptions).
pub enum Factory<T: ?Sized> {
    /// `(Settings) -> Instance`
    Plain(Arc<PlainFactory<T>>),
    /// `(Settings, Context) -> Instance`
    Contextual(Arc<ContextualFactory<T>>),
}

impl<T: ?Sized> Clone for Factory<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(f) => Self::Plain(Arc::clone(f)),
            Self::Contextual(f) => Self::Contextual(Arc::clone(f)),
        }
    }
}

impl<T: ?Sized> Factory<T> {
    /// Whether this factory needs a [`FactoryContext`]
    pub fn needs_context(&self) -> bool {
        matches!(self, Self::Contextual(_))
    }
}

/// Back-reference handed to contextual factories
#[derive(Clone, Copy)]
pub struct FactoryContext<'a> {
    plugins: &'a Plugins,
    store: Option<&'a Arc<SnapshotStore>>,
}

impl<'a> FactoryContext<'a> {
    /// Context with registry access only
    pub fn new(plugins: &'a Plugins) -> Self {
        Self {
            plugins,
            store: None,
        }
    }

    /// Context that also exposes the engine's snapshot store
    pub fn with_store(plugins: &'a Plugins, store: &'a Arc<SnapshotStore>) -> Self {
        Self {
            plugins,
            store: Some(store),
        }
    }

    pub fn plugins(&self) -> &'a Plugins {
        self.plugins
    }

    pub fn store(&self) -> Option<&'a Arc<SnapshotStore>> {
        self.store
    }
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of factories and references for one plugin category
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes. Factories are cloned out of the lock before
/// they run, so a factory may resolve nested plugins from the same registry.
pub struct TypeRegistry<T: ?Sized> {
    /// Registry name, also the first key into the defaults table
    name: String,

    /// Concrete factories by type name
    types: RwLock<HashMap<String, Factory<T>>>,

    /// Reference settings by reference name
    refs: RwLock<HashMap<String, Settings>>,

    /// Registry-level defaults, beneath everything else
    injected: Settings,

    /// Process-wide defaults table shared by all registries of a `Plugins`
    defaults: SharedDefaults,
}

impl<T: ?Sized + 'static> TypeRegistry<T> {
    /// Create an empty registry with its own defaults table
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_defaults(name, Settings::new(), SharedDefaults::default())
    }

    /// Create a registry with injected registry-level defaults and a shared
    /// defaults table
    pub fn with_defaults(name: impl Into<String>, injected: Settings, defaults: SharedDefaults) -> Self {
        Self {
            name: name.into(),
            types: RwLock::new(HashMap::new()),
            refs: RwLock::new(HashMap::new()),
            injected,
            defaults,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a factory that only needs settings
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Settings) -> Result<Box<T>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering {} type '{}'", self.name, name);
        write(&self.types).insert(name, Factory::Plain(Arc::new(factory)));
    }

    /// Register a factory that needs the engine context
    pub fn register_contextual<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Settings, &FactoryContext<'_>) -> Result<Box<T>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering contextual {} type '{}'", self.name, name);
        write(&self.types).insert(name, Factory::Contextual(Arc::new(factory)));
    }

    /// Register a named reference to another type
    ///
    /// The reference settings must carry a `type` naming the aliased type
    /// (which may itself be a reference).
    pub fn register_ref(&self, name: impl Into<String>, settings: Settings) -> Result<()> {
        settings.type_name()?;
        let name = name.into();
        debug!("Registering {} reference '{}'", self.name, name);
        write(&self.refs).insert(name, settings);
        Ok(())
    }

    pub fn has_type(&self, name: &str) -> bool {
        read(&self.types).contains_key(name)
    }

    pub fn has_ref(&self, name: &str) -> bool {
        read(&self.refs).contains_key(name)
    }

    /// List all registered concrete type names
    pub fn list_types(&self) -> Vec<String> {
        read(&self.types).keys().cloned().collect()
    }

    /// Resolve settings into the factory to call and the final settings
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidSettings`]: a mapping without a string `type`
    /// - [`Error::CircularReference`]: the reference chain loops
    /// - [`Error::UnknownType`]: the chain ends at an unregistered name
    pub fn resolve(&self, settings: impl Into<Settings>) -> Result<(Factory<T>, Settings)> {
        let explicit: Settings = settings.into();
        let requested = explicit.type_name()?.to_string();

        // Follow the reference chain, remembering each hop
        let mut visited = HashSet::from([requested.clone()]);
        let mut path = vec![requested.clone()];
        let mut chain: Vec<(String, Settings)> = Vec::new();
        let mut current = requested;
        {
            let refs = read(&self.refs);
            while let Some(reference) = refs.get(&current) {
                let target = reference.type_name()?.to_string();
                chain.push((current, reference.clone()));
                path.push(target.clone());

                if !visited.insert(target.clone()) {
                    return Err(Error::CircularReference {
                        registry: self.name.clone(),
                        chain: path,
                    });
                }
                current = target;
            }
        }

        let factory = read(&self.types)
            .get(&current)
            .cloned()
            .ok_or_else(|| Error::unknown_type(&self.name, &current))?;

        let mut merged = self.injected.clone();
        {
            let defaults = read(&self.defaults);
            let table = defaults.get(&self.name);
            let type_defaults = |name: &str| table.and_then(|t| t.get(name));

            if let Some(layer) = type_defaults(&current) {
                merged.overlay(layer);
            }
            for (name, reference) in chain.iter().rev() {
                if let Some(layer) = type_defaults(name) {
                    merged.overlay(layer);
                }
                merged.overlay(reference);
            }
        }
        merged.overlay(&explicit);
        merged.set_type(current.as_str());

        if !chain.is_empty() {
            debug!("Resolved {} reference chain {}", self.name, path.join(" -> "));
        }

        Ok((factory, merged))
    }

    /// Construct an instance without an engine context
    ///
    /// Types registered with [`TypeRegistry::register_contextual`] fail with
    /// [`Error::MissingContext`].
    pub fn make(&self, settings: impl Into<Settings>) -> Result<(Box<T>, Settings)> {
        let (factory, settings) = self.resolve(settings)?;
        match factory {
            Factory::Plain(create) => Ok((create(&settings)?, settings)),
            Factory::Contextual(_) => Err(Error::MissingContext(settings.type_name()?.to_string())),
        }
    }

    /// Construct an instance, handing the context to factories that declared it
    pub fn make_with(
        &self,
        settings: impl Into<Settings>,
        ctx: &FactoryContext<'_>,
    ) -> Result<(Box<T>, Settings)> {
        let (factory, settings) = self.resolve(settings)?;
        let instance = match factory {
            Factory::Plain(create) => create(&settings)?,
            Factory::Contextual(create) => create(&settings, ctx)?,
        };
        Ok((instance, settings))
    }
}
