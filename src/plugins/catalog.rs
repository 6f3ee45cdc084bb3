//! Ordered plugin registry.

use crate::error::{DetectError, Result};

use super::archives::{HobetaArchive, IceArchive, SclArchive};
use super::players::{AyMultitrack, SndhMultitrack, YmPlayer};
use super::{Capabilities, PluginDescriptor};

/// Immutable, ordered set of plugins. Earlier plugins win when several match.
#[derive(Debug, Default)]
pub struct PluginCatalog {
    plugins: Vec<PluginDescriptor>,
}

impl PluginCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `plugin`; ids must be unique.
    pub fn with_plugin(mut self, plugin: PluginDescriptor) -> Result<Self> {
        if self.get(plugin.id).is_some() {
            return Err(DetectError::Config(format!(
                "duplicate plugin id '{}'",
                plugin.id
            )));
        }
        self.plugins.push(plugin);
        Ok(self)
    }

    /// Every built-in plugin in default priority order: archives first, then players.
    pub fn builtin() -> Result<Self> {
        let catalog = Self::new()
            .with_plugin(PluginDescriptor::archive(
                "HOBETA",
                Capabilities::empty(),
                HobetaArchive::new()?,
            ))?
            .with_plugin(PluginDescriptor::archive(
                "SCL",
                Capabilities::empty(),
                SclArchive::new()?,
            ))?
            .with_plugin(PluginDescriptor::archive(
                "ICE",
                Capabilities::PACKED,
                IceArchive::new()?,
            ))?;

        #[cfg(feature = "lha")]
        let catalog = catalog.with_plugin(PluginDescriptor::archive(
            "LHA",
            Capabilities::PACKED,
            super::archives::LhaArchive::new()?,
        ))?;

        catalog
            .with_plugin(PluginDescriptor::multitrack(
                "AY",
                Capabilities::DEVICE_AY | Capabilities::CPU_Z80,
                AyMultitrack::new()?,
            ))?
            .with_plugin(PluginDescriptor::multitrack(
                "SNDH",
                Capabilities::DEVICE_AY | Capabilities::CPU_M68K,
                SndhMultitrack::new()?,
            ))?
            .with_plugin(PluginDescriptor::player(
                "YM",
                Capabilities::DEVICE_AY,
                YmPlayer::new()?,
            ))
    }

    /// Move the listed ids to the front, in the listed order. Unlisted plugins keep
    /// their relative order.
    ///
    /// ```
    /// use chipscan::PluginCatalog;
    ///
    /// let catalog = PluginCatalog::builtin().unwrap().reordered(&["YM", "SCL"]).unwrap();
    /// assert_eq!(&catalog.ids()[..3], &["YM", "SCL", "HOBETA"]);
    /// assert!(PluginCatalog::builtin().unwrap().reordered(&["MOD"]).is_err());
    /// ```
    pub fn reordered<S: AsRef<str>>(mut self, order: &[S]) -> Result<Self> {
        let mut front = Vec::with_capacity(order.len());
        for id in order {
            let id = id.as_ref();
            let idx = self
                .plugins
                .iter()
                .position(|plugin| plugin.id == id)
                .ok_or_else(|| DetectError::UnknownPlugin(id.to_string()))?;
            front.push(self.plugins.remove(idx));
        }
        front.append(&mut self.plugins);
        Ok(Self { plugins: front })
    }

    /// Effective order of plugin ids.
    pub fn ids(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|plugin| plugin.id).collect()
    }

    /// Plugins in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.plugins.iter()
    }

    /// Plugin with `id`.
    pub fn get(&self, id: &str) -> Option<&PluginDescriptor> {
        self.plugins.iter().find(|plugin| plugin.id == id)
    }

    /// Number of plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the catalog has no plugins.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_order() {
        let catalog = PluginCatalog::builtin().unwrap();
        let ids = catalog.ids();
        assert_eq!(&ids[..3], &["HOBETA", "SCL", "ICE"]);
        assert_eq!(&ids[ids.len() - 3..], &["AY", "SNDH", "YM"]);
        assert!(catalog.get("AY").unwrap().capabilities.contains(Capabilities::MULTITRACK));
    }

    #[test]
    fn reorder_keeps_unlisted_relative_order() {
        let catalog = PluginCatalog::builtin().unwrap();
        let count = catalog.len();
        let catalog = catalog.reordered(&["SNDH", "HOBETA"]).unwrap();
        let ids = catalog.ids();
        assert_eq!(ids.len(), count);
        assert_eq!(&ids[..4], &["SNDH", "HOBETA", "SCL", "ICE"]);
        assert_eq!(&ids[ids.len() - 2..], &["AY", "YM"]);
    }

    #[test]
    fn reorder_rejects_unknown_and_repeated_ids() {
        let err = PluginCatalog::builtin().unwrap().reordered(&["XM"]).unwrap_err();
        assert!(matches!(err, DetectError::UnknownPlugin(id) if id == "XM"));
        assert!(PluginCatalog::builtin().unwrap().reordered(&["AY", "AY"]).is_err());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let catalog = PluginCatalog::builtin().unwrap();
        let again = HobetaArchive::new().unwrap();
        assert!(catalog
            .with_plugin(PluginDescriptor::archive("HOBETA", Capabilities::empty(), again))
            .is_err());
    }
}
