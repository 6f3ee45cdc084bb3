//! Recursive module discovery.
//!
//! A [`Detector`] walks a byte container with an explicit stack of frames. At every
//! offset of a frame it first tries the archive plugins (their entries become new
//! frames, scanned before the current one continues), then the player and multitrack
//! plugins. Each module found is reported to a [`DetectCallback`] as a
//! [`ModuleRecord`].

mod walk;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::binary::Binary;
use crate::config::DetectConfig;
use crate::data_path::DataPath;
use crate::error::{BoxError, Result};
use crate::identifier::Identifier;
use crate::plugins::{Capabilities, ModuleHolder, PluginCatalog};
use crate::properties::Properties;

use walk::Walk;

/// One module found by a walk.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Location inside the scanned data.
    pub path: DataPath,
    /// Id of the plugin that recognized the module.
    pub plugin_id: &'static str,
    /// Handle to the module.
    pub holder: Arc<dyn ModuleHolder>,
    /// Merged properties, innermost values first.
    pub properties: Properties,
}

impl ModuleRecord {
    /// Path inside the scanned data as text.
    pub fn subpath(&self) -> String {
        self.path.as_string()
    }
}

/// Hooks called during a walk.
pub trait DetectCallback {
    /// Whether the plugin should not be tried.
    fn skip_plugin(&self, _id: &str, _capabilities: Capabilities) -> bool {
        false
    }

    /// Polled between plugin attempts and frames; `true` stops the walk.
    fn is_cancelled(&self) -> bool {
        false
    }

    /// Coarse progress, one message per frame.
    fn log(&mut self, _message: &str) {}

    /// A module was found. An error aborts the walk.
    fn on_module(&mut self, record: ModuleRecord) -> std::result::Result<(), BoxError>;
}

/// Callback that keeps every record, optionally stopping after `limit` of them.
#[derive(Debug, Default)]
pub struct ModuleCollector {
    records: Vec<ModuleRecord>,
    limit: Option<usize>,
}

impl ModuleCollector {
    /// Collect everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the walk once `limit` records were collected.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            limit: Some(limit),
        }
    }

    /// Records collected so far.
    pub fn records(&self) -> &[ModuleRecord] {
        &self.records
    }

    /// Take the collected records.
    pub fn into_records(self) -> Vec<ModuleRecord> {
        self.records
    }
}

impl DetectCallback for ModuleCollector {
    fn is_cancelled(&self) -> bool {
        self.limit.is_some_and(|limit| self.records.len() >= limit)
    }

    fn on_module(&mut self, record: ModuleRecord) -> std::result::Result<(), BoxError> {
        self.records.push(record);
        Ok(())
    }
}

/// Outcome of a completed walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Records passed to the callback.
    pub modules: usize,
    /// Frames scanned, including the top-level one.
    pub frames: usize,
    /// The callback stopped the walk early.
    pub cancelled: bool,
}

/// Plugin catalog plus settings. Immutable; one detector serves any number of
/// concurrent walks.
#[derive(Debug)]
pub struct Detector {
    catalog: PluginCatalog,
    config: DetectConfig,
}

impl Detector {
    /// Apply `config.plugin_order` to `catalog`.
    pub fn new(catalog: PluginCatalog, config: DetectConfig) -> Result<Self> {
        let catalog = catalog.reordered(&config.plugin_order)?;
        tracing::debug!(plugins = ?catalog.ids(), "detector ready");
        Ok(Self { catalog, config })
    }

    /// Built-in plugins with default settings.
    pub fn with_defaults() -> Result<Self> {
        Self::new(PluginCatalog::builtin()?, DetectConfig::default())
    }

    /// Plugins in effective priority order.
    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Settings.
    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Report every module in `data`.
    ///
    /// `location` names the data (`file` or `file?subpath`); it only feeds the path
    /// related properties. A subpath becomes the prefix of every record path.
    pub fn detect<C>(&self, location: &str, data: Binary, callback: &mut C) -> Result<WalkSummary>
    where
        C: DetectCallback + ?Sized,
    {
        let identifier = Identifier::parse(location);
        let root = DataPath::parse(identifier.subpath(), self.config.path_separator);
        Walk::new(&self.catalog, &self.config, identifier, None, callback).run(data, root)
    }

    /// Read `path` and report every module in it.
    pub fn detect_file<C>(&self, path: &Path, callback: &mut C) -> Result<WalkSummary>
    where
        C: DetectCallback + ?Sized,
    {
        let data = fs::read(path)?;
        self.detect(&path.display().to_string(), Binary::new(data), callback)
    }

    /// Find the module at `location`'s subpath.
    ///
    /// Only archive entries on the way to the subpath are opened. An empty subpath
    /// opens the first module at the start of `data`.
    pub fn open(&self, location: &str, data: Binary) -> Result<Option<ModuleRecord>> {
        let identifier = Identifier::parse(location);
        let target = DataPath::parse(identifier.subpath(), self.config.path_separator);
        let root = DataPath::empty(self.config.path_separator);
        let mut collector = ModuleCollector::with_limit(1);
        Walk::new(
            &self.catalog,
            &self.config,
            identifier.with_subpath(""),
            Some(target),
            &mut collector,
        )
        .run(data, root)?;
        Ok(collector.into_records().into_iter().next())
    }
}
