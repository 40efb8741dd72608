use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    fmt::Display,
    rc::Rc,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::constants::NEW_MODEL_PLACEHOLDER;

use super::{GraphvizOptions, ModelArtifact, ModelError, ProcessModelView, QualityMetrics};

/// Value stored under a registry name: a model view, or `None` for the placeholder entry
pub type RegistryEntry = Option<Rc<ProcessModelView>>;

/// Per-name results of a batch operation (in registry or request order)
pub type BatchResult<T> = Vec<(String, Option<T>)>;

///
/// Errors of the [`ProcessModelRegistry`]
///
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Names must not be empty
    EmptyName,
    /// The name is already registered (and `overwrite` was not set)
    DuplicateName(String),
    /// The name is not registered
    MissingName(String),
    /// A placeholder cannot be assigned directly
    PlaceholderAssignment(String),
    /// A placeholder can only be the first entry of an empty registry
    PlaceholderNotAllowed(String),
    /// A batch mixes placeholders with other entries, or targets a non-empty registry
    InvalidPlaceholderBatch,
    /// A batch operation reached a placeholder entry
    PlaceholderEntry(String),
    /// A model of a batch operation failed
    Model {
        /// Name of the failing entry
        name: String,
        /// Cause
        source: ModelError,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::EmptyName => write!(f, "Registry names must not be empty"),
            RegistryError::DuplicateName(name) => write!(f, "'{name}' is already registered"),
            RegistryError::MissingName(name) => write!(f, "'{name}' is not registered"),
            RegistryError::PlaceholderAssignment(name) => write!(
                f,
                "Cannot assign an empty entry to '{name}'; only the first `add` may create a placeholder"
            ),
            RegistryError::PlaceholderNotAllowed(name) => write!(
                f,
                "Cannot add '{name}' without a view: placeholders are only allowed as the first entry of an empty registry"
            ),
            RegistryError::InvalidPlaceholderBatch => write!(
                f,
                "A placeholder must be the only entry of a batch added to an empty registry"
            ),
            RegistryError::PlaceholderEntry(name) => {
                write!(f, "Entry '{name}' has no associated view (placeholder)")
            }
            RegistryError::Model { name, source } => write!(f, "Entry '{name}' failed: {source}"),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Model { source, .. } => Some(source),
            _ => None,
        }
    }
}

///
/// How [`ProcessModelRegistry::get_many`] handles names that are not registered
///
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Fail on the first missing name
    #[default]
    Error,
    /// Leave missing names out of the result
    Skip,
    /// Return `None` for missing names
    #[serde(rename = "none")]
    Null,
}

impl FromStr for MissingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "skip" => Ok(Self::Skip),
            "none" => Ok(Self::Null),
            other => Err(format!("missing policy must be 'error', 'skip' or 'none', got '{other}'")),
        }
    }
}

///
/// How batch operations ([`ProcessModelRegistry::compute_map`] and friends) handle failing
/// entries and placeholders
///
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Fail on the first failing entry
    #[default]
    Raise,
    /// Leave failing entries out of the result
    Skip,
    /// Record `None` for failing entries
    #[serde(rename = "none")]
    Null,
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raise" => Ok(Self::Raise),
            "skip" => Ok(Self::Skip),
            "none" => Ok(Self::Null),
            other => Err(format!("error policy must be 'raise', 'skip' or 'none', got '{other}'")),
        }
    }
}

/// Insertion-ordered name -> entry storage with hashed lookup
#[derive(Debug, Clone, Default)]
struct OrderedEntries {
    entries: Vec<(String, RegistryEntry)>,
    index: HashMap<String, usize>,
}

impl OrderedEntries {
    fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.index.get(name).map(|&pos| &self.entries[pos].1)
    }

    fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Replace the entry in place, or append it
    fn insert(&mut self, name: String, entry: RegistryEntry) {
        match self.index.get(&name) {
            Some(&pos) => self.entries[pos].1 = entry,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, entry));
            }
        }
    }

    fn remove(&mut self, name: &str) -> Option<RegistryEntry> {
        let pos = self.index.remove(name)?;
        let (_, entry) = self.entries.remove(pos);
        for (i, (n, _)) in self.entries.iter().enumerate().skip(pos) {
            if let Some(p) = self.index.get_mut(n) {
                *p = i;
            }
        }
        Some(entry)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::EmptyName);
    }
    Ok(())
}

///
/// Ordered catalog of named [`ProcessModelView`]s
///
/// Names are unique and non-empty; iteration follows insertion order. A single placeholder
/// entry (a name without view, e.g. a "create new model" slot) can only be created by
/// [`ProcessModelRegistry::add`] on an empty registry and is later replaced by a view.
///
/// ```rust
/// use std::rc::Rc;
/// use chatflow_miner::{
///     event_log::EventLogView,
///     event_table,
///     process_models::{DFGModel, ProcessModelRegistry, ProcessModelView, RegistryError},
/// };
///
/// let view = Rc::new(ProcessModelView::new(
///     EventLogView::new(event_table!(
///         ["CASE_ID", "ACTIVITY", "START_TIMESTAMP"];
///         ["c1", "greet", "2024-01-01 10:00:00"],
///     )),
///     DFGModel,
/// ));
/// let mut registry = ProcessModelRegistry::new();
/// registry.add("new", None, false).unwrap();
/// assert!(registry.has_placeholder());
/// assert!(matches!(
///     registry.add("other", None, false),
///     Err(RegistryError::PlaceholderNotAllowed(_))
/// ));
/// registry.set("new", Some(view)).unwrap();
/// assert!(!registry.has_placeholder());
/// ```
#[derive(Debug, Default)]
pub struct ProcessModelRegistry {
    entries: OrderedEntries,
    cache_snapshots: bool,
    names_cache: RefCell<Option<Rc<[String]>>>,
    values_cache: RefCell<Option<Rc<[RegistryEntry]>>>,
}

impl ProcessModelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry caching [`Self::names_snapshot`] and [`Self::values_snapshot`]
    /// until the next mutation
    pub fn with_snapshot_cache() -> Self {
        Self {
            cache_snapshots: true,
            ..Default::default()
        }
    }

    /// Create a registry holding only the "create new model" placeholder entry
    pub fn with_placeholder() -> Self {
        let mut registry = Self::new();
        registry
            .entries
            .insert(NEW_MODEL_PLACEHOLDER.to_string(), None);
        registry
    }

    fn invalidate_cache(&self) {
        self.names_cache.borrow_mut().take();
        self.values_cache.borrow_mut().take();
    }

    /// Number of entries (including a placeholder)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains(name)
    }

    /// The entry registered under `name` (`Some(None)` for the placeholder)
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    /// The view registered under `name`, failing for missing names and the placeholder
    pub fn view(&self, name: &str) -> Result<&Rc<ProcessModelView>, RegistryError> {
        match self.entries.get(name) {
            Some(Some(view)) => Ok(view),
            Some(None) => Err(RegistryError::PlaceholderEntry(name.to_string())),
            None => Err(RegistryError::MissingName(name.to_string())),
        }
    }

    ///
    /// Assign a view to `name`
    ///
    /// Existing names keep their position, new names are appended. Assigning `None` always
    /// fails; use [`Self::add`] to create the placeholder.
    pub fn set(&mut self, name: &str, view: RegistryEntry) -> Result<(), RegistryError> {
        validate_name(name)?;
        let view = view.ok_or_else(|| RegistryError::PlaceholderAssignment(name.to_string()))?;
        self.entries.insert(name.to_string(), Some(view));
        self.invalidate_cache();
        tracing::debug!(name, "Registered process model");
        Ok(())
    }

    ///
    /// Add an entry
    ///
    /// Fails with [`RegistryError::DuplicateName`] if `name` exists and `overwrite` is not set.
    /// `None` (placeholder) is only accepted on an empty registry, or when overwriting the
    /// only entry of the registry.
    pub fn add(
        &mut self,
        name: &str,
        view: RegistryEntry,
        overwrite: bool,
    ) -> Result<(), RegistryError> {
        validate_name(name)?;
        let exists = self.entries.contains(name);
        if exists && !overwrite {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        if view.is_none() && !(self.is_empty() || (exists && self.len() == 1)) {
            return Err(RegistryError::PlaceholderNotAllowed(name.to_string()));
        }
        self.entries.insert(name.to_string(), view);
        self.invalidate_cache();
        tracing::debug!(name, overwrite, "Added registry entry");
        Ok(())
    }

    ///
    /// Add several entries at once
    ///
    /// The whole batch is validated before the registry is modified: a placeholder is only
    /// accepted as the single entry of a batch added to an empty registry, names must be
    /// non-empty, and (without `overwrite`) neither registered nor repeated in the batch.
    pub fn add_many<S: Into<String>>(
        &mut self,
        entries: impl IntoIterator<Item = (S, RegistryEntry)>,
        overwrite: bool,
    ) -> Result<(), RegistryError> {
        let entries: Vec<(String, RegistryEntry)> =
            entries.into_iter().map(|(n, e)| (n.into(), e)).collect();

        let has_placeholder = entries.iter().any(|(_, e)| e.is_none());
        if has_placeholder && !(self.is_empty() && entries.len() == 1) {
            return Err(RegistryError::InvalidPlaceholderBatch);
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for (name, _) in &entries {
            validate_name(name)?;
            let repeated = !seen.insert(name.as_str());
            if !overwrite && (repeated || self.entries.contains(name)) {
                return Err(RegistryError::DuplicateName(name.clone()));
            }
        }

        let count = entries.len();
        for (name, entry) in entries {
            self.entries.insert(name, entry);
        }
        self.invalidate_cache();
        tracing::debug!(count, overwrite, "Added registry entries");
        Ok(())
    }

    /// Remove `name`, returning its entry
    pub fn remove(&mut self, name: &str) -> Result<RegistryEntry, RegistryError> {
        let entry = self
            .entries
            .remove(name)
            .ok_or_else(|| RegistryError::MissingName(name.to_string()))?;
        self.invalidate_cache();
        tracing::debug!(name, "Removed registry entry");
        Ok(entry)
    }

    ///
    /// Rename `old` to `new`
    ///
    /// The renamed entry moves to the end of the iteration order. Renaming a name to itself
    /// does nothing. With `overwrite`, an existing `new` entry is replaced.
    pub fn rename(&mut self, old: &str, new: &str, overwrite: bool) -> Result<(), RegistryError> {
        if old == new {
            return Ok(());
        }
        validate_name(new)?;
        if !overwrite && self.entries.contains(new) {
            return Err(RegistryError::DuplicateName(new.to_string()));
        }
        let entry = self
            .entries
            .remove(old)
            .ok_or_else(|| RegistryError::MissingName(old.to_string()))?;
        self.entries.remove(new);
        self.entries.insert(new.to_string(), entry);
        self.invalidate_cache();
        tracing::debug!(old, new, "Renamed registry entry");
        Ok(())
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.entries.clear();
        self.invalidate_cache();
    }

    /// Whether any entry is a placeholder
    pub fn has_placeholder(&self) -> bool {
        self.entries.iter().any(|(_, e)| e.is_none())
    }

    /// Registered names (in order)
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n)
    }

    /// Registered entries (in order)
    pub fn values(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter().map(|(_, e)| e)
    }

    /// Registered `(name, entry)` pairs (in order)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter()
    }

    /// Copy of the registered names
    pub fn names_list(&self) -> Vec<String> {
        self.names().map(str::to_string).collect()
    }

    /// Copy of the registered entries
    pub fn values_list(&self) -> Vec<RegistryEntry> {
        self.values().cloned().collect()
    }

    ///
    /// Shared snapshot of the registered names
    ///
    /// With [`Self::with_snapshot_cache`], the snapshot is reused until the registry changes.
    pub fn names_snapshot(&self) -> Rc<[String]> {
        snapshot(self.cache_snapshots, &self.names_cache, || {
            self.names().map(str::to_string).collect()
        })
    }

    ///
    /// Shared snapshot of the registered entries
    ///
    /// With [`Self::with_snapshot_cache`], the snapshot is reused until the registry changes.
    pub fn values_snapshot(&self) -> Rc<[RegistryEntry]> {
        snapshot(self.cache_snapshots, &self.values_cache, || {
            self.values().cloned().collect()
        })
    }

    ///
    /// Look up several names at once
    ///
    /// Placeholders are returned as `None`; missing names are handled according to `missing`.
    pub fn get_many<S: AsRef<str>>(
        &self,
        names: impl IntoIterator<Item = S>,
        missing: MissingPolicy,
    ) -> Result<Vec<RegistryEntry>, RegistryError> {
        let mut out = Vec::new();
        for name in names {
            let name = name.as_ref();
            match (self.entries.get(name), missing) {
                (Some(entry), _) => out.push(entry.clone()),
                (None, MissingPolicy::Error) => {
                    return Err(RegistryError::MissingName(name.to_string()))
                }
                (None, MissingPolicy::Skip) => {}
                (None, MissingPolicy::Null) => out.push(None),
            }
        }
        Ok(out)
    }

    fn map_entries<'a, T>(
        &'a self,
        names: Option<&[&str]>,
        on_error: ErrorPolicy,
        f: impl Fn(&'a ProcessModelView) -> Result<T, ModelError>,
    ) -> Result<BatchResult<T>, RegistryError> {
        let selected: Vec<(&str, &'a RegistryEntry)> = match names {
            None => self.entries.iter().collect(),
            Some(names) => names
                .iter()
                .map(|&n| {
                    self.entries
                        .get(n)
                        .map(|e| (n, e))
                        .ok_or_else(|| RegistryError::MissingName(n.to_string()))
                })
                .collect::<Result<_, _>>()?,
        };

        let mut out = Vec::with_capacity(selected.len());
        for (name, entry) in selected {
            let result = match entry {
                Some(view) => f(&**view).map_err(|source| RegistryError::Model {
                    name: name.to_string(),
                    source,
                }),
                None => Err(RegistryError::PlaceholderEntry(name.to_string())),
            };
            match (result, on_error) {
                (Ok(value), _) => out.push((name.to_string(), Some(value))),
                (Err(e), ErrorPolicy::Raise) => return Err(e),
                (Err(e), ErrorPolicy::Skip) => {
                    tracing::debug!(name, error = %e, "Skipping registry entry");
                }
                (Err(e), ErrorPolicy::Null) => {
                    tracing::debug!(name, error = %e, "Recording empty result for registry entry");
                    out.push((name.to_string(), None));
                }
            }
        }
        Ok(out)
    }

    ///
    /// Discover the artifacts of several entries (all entries if `names` is `None`)
    ///
    /// Placeholders and failing models are handled according to `on_error`. Explicitly
    /// requested names that are not registered always fail.
    pub fn compute_map(
        &self,
        names: Option<&[&str]>,
        on_error: ErrorPolicy,
    ) -> Result<BatchResult<&ModelArtifact>, RegistryError> {
        self.map_entries(names, on_error, |view| view.compute())
    }

    /// Render several entries as DOT source; see [`Self::compute_map`] for the error handling
    pub fn to_graphviz_map(
        &self,
        names: Option<&[&str]>,
        on_error: ErrorPolicy,
        options: &GraphvizOptions,
    ) -> Result<BatchResult<String>, RegistryError> {
        self.map_entries(names, on_error, |view| view.to_graphviz(options))
    }

    /// Evaluate several entries; see [`Self::compute_map`] for the error handling
    pub fn quality_map(
        &self,
        names: Option<&[&str]>,
        on_error: ErrorPolicy,
    ) -> Result<BatchResult<QualityMetrics>, RegistryError> {
        self.map_entries(names, on_error, |view| view.quality_metrics())
    }

    /// Read-only access to the registry
    pub fn freeze(&self) -> FrozenRegistry<'_> {
        FrozenRegistry { registry: self }
    }
}

fn snapshot<T: ?Sized>(
    enabled: bool,
    cache: &RefCell<Option<Rc<T>>>,
    build: impl FnOnce() -> Rc<T>,
) -> Rc<T> {
    if !enabled {
        return build();
    }
    let mut cached = cache.borrow_mut();
    Rc::clone(cached.get_or_insert_with(build))
}

///
/// Read-only view of a [`ProcessModelRegistry`]
///
#[derive(Debug, Clone, Copy)]
pub struct FrozenRegistry<'a> {
    registry: &'a ProcessModelRegistry,
}

impl<'a> FrozenRegistry<'a> {
    /// Number of entries
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether the registry has no entries
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// The entry registered under `name`
    pub fn get(&self, name: &str) -> Option<&'a RegistryEntry> {
        self.registry.get(name)
    }

    /// Registered `(name, entry)` pairs (in order)
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a RegistryEntry)> {
        self.registry.iter()
    }

    /// Registered names (in order)
    pub fn names(&self) -> impl Iterator<Item = &'a str> {
        self.registry.names()
    }

    /// Whether any entry is a placeholder
    pub fn has_placeholder(&self) -> bool {
        self.registry.has_placeholder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event_log::EventLogView, event_table, process_models::DFGModel};

    fn view() -> Rc<ProcessModelView> {
        Rc::new(ProcessModelView::new(
            EventLogView::new(event_table!(
                ["CASE_ID", "ACTIVITY", "START_TIMESTAMP"];
                ["c1", "greet", "2024-01-01 10:00:00"],
                ["c1", "answer", "2024-01-01 10:01:00"],
            )),
            DFGModel,
        ))
    }

    fn broken_view() -> Rc<ProcessModelView> {
        Rc::new(ProcessModelView::new(
            EventLogView::new(event_table!(["CASE_ID"]; ["c1"])),
            DFGModel,
        ))
    }

    fn registry_with(names: &[&str]) -> ProcessModelRegistry {
        let mut registry = ProcessModelRegistry::new();
        for name in names {
            registry.add(name, Some(view()), false).unwrap();
        }
        registry
    }

    #[test]
    fn single_placeholder_on_first_insert() {
        let mut registry = ProcessModelRegistry::new();
        registry.add("p", None, false).unwrap();
        assert!(registry.has_placeholder());
        assert_eq!(
            registry.add("q", None, false),
            Err(RegistryError::PlaceholderNotAllowed("q".to_string()))
        );
        // Re-adding the only entry as placeholder is fine
        registry.add("p", None, true).unwrap();
        registry.set("p", Some(view())).unwrap();
        assert!(!registry.has_placeholder());
        registry.add("q", Some(view()), false).unwrap();
        assert_eq!(
            registry.add("p", None, true),
            Err(RegistryError::PlaceholderNotAllowed("p".to_string()))
        );
    }

    #[test]
    fn direct_assignment_of_placeholder_is_rejected() {
        let mut registry = ProcessModelRegistry::new();
        assert_eq!(
            registry.set("p", None),
            Err(RegistryError::PlaceholderAssignment("p".to_string()))
        );
        assert_eq!(registry.set("", Some(view())), Err(RegistryError::EmptyName));
        assert!(registry.is_empty());
    }

    #[test]
    fn add_rejects_duplicates_unless_overwriting() {
        let mut registry = registry_with(&["a", "b"]);
        assert_eq!(
            registry.add("a", Some(view()), false),
            Err(RegistryError::DuplicateName("a".to_string()))
        );
        let replacement = view();
        registry.add("a", Some(replacement.clone()), true).unwrap();
        assert_eq!(registry.names_list(), vec!["a", "b"]);
        assert!(Rc::ptr_eq(registry.view("a").unwrap(), &replacement));
    }

    #[test]
    fn add_many_validates_whole_batch() {
        let mut registry = ProcessModelRegistry::new();
        assert_eq!(
            registry.add_many([("a", None), ("b", Some(view()))], false),
            Err(RegistryError::InvalidPlaceholderBatch)
        );
        assert!(registry.is_empty());

        registry
            .add_many([("a", Some(view())), ("b", Some(view()))], false)
            .unwrap();
        assert_eq!(
            registry.add_many([("c", Some(view())), ("a", Some(view()))], false),
            Err(RegistryError::DuplicateName("a".to_string()))
        );
        assert_eq!(
            registry.add_many([("c", Some(view())), ("c", Some(view()))], false),
            Err(RegistryError::DuplicateName("c".to_string()))
        );
        assert_eq!(
            registry.add_many([("d", None)], false),
            Err(RegistryError::InvalidPlaceholderBatch)
        );
        assert_eq!(registry.names_list(), vec!["a", "b"]);

        let mut empty = ProcessModelRegistry::new();
        empty.add_many([("new", None)], false).unwrap();
        assert!(empty.has_placeholder());
    }

    #[test]
    fn rename_moves_entry_to_end() {
        let mut registry = registry_with(&["a", "b", "d"]);
        registry.rename("a", "c", false).unwrap();
        assert_eq!(registry.names_list(), vec!["b", "d", "c"]);
        registry.rename("c", "c", false).unwrap();
        assert_eq!(registry.names_list(), vec!["b", "d", "c"]);

        assert_eq!(
            registry.rename("b", "d", false),
            Err(RegistryError::DuplicateName("d".to_string()))
        );
        assert_eq!(
            registry.rename("x", "y", false),
            Err(RegistryError::MissingName("x".to_string()))
        );
        registry.rename("b", "d", true).unwrap();
        assert_eq!(registry.names_list(), vec!["c", "d"]);
        assert_eq!(registry.rename("c", "", false), Err(RegistryError::EmptyName));
    }

    #[test]
    fn remove_and_clear() {
        let mut registry = registry_with(&["a", "b", "c"]);
        assert!(registry.remove("b").unwrap().is_some());
        assert_eq!(
            registry.remove("b").unwrap_err(),
            RegistryError::MissingName("b".to_string())
        );
        assert_eq!(registry.names_list(), vec!["a", "c"]);
        assert!(registry.view("c").is_ok());
        registry.clear();
        assert!(registry.is_empty());
        // Placeholders are allowed again once the registry is empty
        registry.add("p", None, false).unwrap();
    }

    #[test]
    fn get_many_missing_policies() {
        let registry = registry_with(&["a", "b"]);
        assert_eq!(
            registry.get_many(["a", "x"], MissingPolicy::Error).unwrap_err(),
            RegistryError::MissingName("x".to_string())
        );
        assert_eq!(registry.get_many(["a", "x", "b"], MissingPolicy::Skip).unwrap().len(), 2);
        let filled = registry.get_many(["x", "b"], MissingPolicy::Null).unwrap();
        assert!(filled[0].is_none());
        assert!(filled[1].is_some());
        assert_eq!("none".parse::<MissingPolicy>(), Ok(MissingPolicy::Null));
        assert!("drop".parse::<MissingPolicy>().is_err());
    }

    #[test]
    fn batch_operations_honor_error_policy() {
        let mut registry = ProcessModelRegistry::new();
        registry.add("new", None, false).unwrap();
        registry.set("ok", Some(view())).unwrap();
        registry.set("broken", Some(broken_view())).unwrap();

        assert_eq!(
            registry.compute_map(None, ErrorPolicy::Raise).unwrap_err(),
            RegistryError::PlaceholderEntry("new".to_string())
        );
        assert!(matches!(
            registry.compute_map(Some(&["ok", "broken"]), ErrorPolicy::Raise),
            Err(RegistryError::Model { ref name, .. }) if name == "broken"
        ));

        let skipped = registry.compute_map(None, ErrorPolicy::Skip).unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, "ok");

        let nulled = registry
            .to_graphviz_map(None, ErrorPolicy::Null, &GraphvizOptions::default())
            .unwrap();
        let names: Vec<&str> = nulled.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["new", "ok", "broken"]);
        assert!(nulled[0].1.is_none());
        assert!(nulled[1].1.as_ref().unwrap().contains("greet: 1"));
        assert!(nulled[2].1.is_none());

        let quality = registry.quality_map(Some(&["ok"]), ErrorPolicy::Raise).unwrap();
        assert_eq!(quality[0].1.unwrap().fitness, Some(1.0));

        // Unknown names always fail
        assert_eq!(
            registry.compute_map(Some(&["x"]), ErrorPolicy::Skip).unwrap_err(),
            RegistryError::MissingName("x".to_string())
        );
        assert_eq!("Skip".parse::<ErrorPolicy>(), Ok(ErrorPolicy::Skip));
    }

    #[test]
    fn snapshots_are_cached_until_mutation() {
        let mut registry = ProcessModelRegistry::with_snapshot_cache();
        registry.add("a", Some(view()), false).unwrap();
        let first = registry.names_snapshot();
        assert!(Rc::ptr_eq(&first, &registry.names_snapshot()));
        let values = registry.values_snapshot();
        assert!(Rc::ptr_eq(&values, &registry.values_snapshot()));

        registry.add("b", Some(view()), false).unwrap();
        let second = registry.names_snapshot();
        assert!(!Rc::ptr_eq(&first, &second));
        assert_eq!(&*first, &["a".to_string()]);
        assert_eq!(&*second, &["a".to_string(), "b".to_string()]);

        let uncached = registry_with(&["a"]);
        assert!(!Rc::ptr_eq(&uncached.names_snapshot(), &uncached.names_snapshot()));
    }

    #[test]
    fn frozen_registry_reads_live_entries() {
        let mut registry = ProcessModelRegistry::with_placeholder();
        assert_eq!(registry.freeze().names().collect::<Vec<_>>(), vec![NEW_MODEL_PLACEHOLDER]);
        assert!(registry.freeze().has_placeholder());
        registry.set(NEW_MODEL_PLACEHOLDER, Some(view())).unwrap();
        let frozen = registry.freeze();
        assert!(!frozen.has_placeholder());
        assert_eq!(frozen.len(), 1);
        assert!(frozen.get(NEW_MODEL_PLACEHOLDER).unwrap().is_some());
        assert_eq!(frozen.iter().count(), 1);
    }
}
