use std::ops::Range;

use crate::binary::Binary;
use crate::config::DetectConfig;
use crate::data_path::DataPath;
use crate::error::{DetectError, Result};
use crate::identifier::Identifier;
use crate::plugins::{
    CreatedModule, DecodedTracks, Extracted, PluginCatalog, PluginDescriptor, PluginKind,
    TrackModule,
};
use crate::properties::{keys, Properties};
use crate::range_checker::RangeChecker;

use super::{DetectCallback, ModuleRecord, WalkSummary};

/// What a frame tries next at its current offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Archives,
    Players { archive_claim: usize },
}

/// One container being scanned.
struct Frame {
    data: Binary,
    path: DataPath,
    properties: Properties,
    depth: usize,
    offset: usize,
    phase: Phase,
    archive_ranges: RangeChecker,
    module_ranges: RangeChecker,
    // per catalog plugin: next absolute offset it could match at, `None` once it cannot
    candidates: Vec<Option<usize>>,
}

impl Frame {
    fn new(
        data: Binary,
        path: DataPath,
        properties: Properties,
        depth: usize,
        plugins: usize,
    ) -> Self {
        let size = data.size();
        Self {
            data,
            path,
            properties,
            depth,
            offset: 0,
            phase: Phase::Archives,
            archive_ranges: RangeChecker::strict(size),
            module_ranges: RangeChecker::strict(size),
            candidates: vec![Some(0); plugins],
        }
    }

    /// Path of whatever starts at the current offset.
    fn located_path(&self) -> DataPath {
        if self.offset == 0 {
            self.path.clone()
        } else {
            self.path.append(&format!("+{}", self.offset))
        }
    }
}

/// Player and multitrack results in one shape.
struct Found {
    consumed: usize,
    fixed: Range<usize>,
    properties: Properties,
    tracks: Vec<TrackModule>,
}

impl From<CreatedModule> for Found {
    fn from(created: CreatedModule) -> Self {
        Self {
            consumed: created.consumed,
            fixed: created.fixed,
            properties: created.properties,
            tracks: vec![TrackModule {
                holder: created.holder,
                properties: Properties::new(),
            }],
        }
    }
}

impl From<DecodedTracks> for Found {
    fn from(decoded: DecodedTracks) -> Self {
        Self {
            consumed: decoded.consumed,
            fixed: decoded.fixed,
            properties: decoded.properties,
            tracks: decoded.tracks,
        }
    }
}

pub(super) struct Walk<'a, C: ?Sized> {
    catalog: &'a PluginCatalog,
    config: &'a DetectConfig,
    identifier: Identifier,
    // set when opening a single module
    target: Option<DataPath>,
    callback: &'a mut C,
    summary: WalkSummary,
}

impl<'a, C: DetectCallback + ?Sized> Walk<'a, C> {
    pub(super) fn new(
        catalog: &'a PluginCatalog,
        config: &'a DetectConfig,
        identifier: Identifier,
        target: Option<DataPath>,
        callback: &'a mut C,
    ) -> Self {
        Self {
            catalog,
            config,
            identifier,
            target,
            callback,
            summary: WalkSummary::default(),
        }
    }

    pub(super) fn run(mut self, data: Binary, root: DataPath) -> Result<WalkSummary> {
        tracing::debug!(location = %self.identifier, size = data.size(), "walk started");
        let plugins = self.catalog.len();
        let mut stack = vec![Frame::new(data, root, Properties::new(), 0, plugins)];
        self.summary.frames = 1;

        while let Some(frame) = stack.last_mut() {
            if self.callback.is_cancelled() {
                tracing::debug!(path = %frame.path, "walk cancelled");
                self.summary.cancelled = true;
                break;
            }
            if frame.offset >= frame.data.size() {
                self.callback.log(&format!(
                    "done '{}' ({} bytes)",
                    frame.path,
                    frame.data.size()
                ));
                stack.pop();
                continue;
            }

            match frame.phase {
                Phase::Archives => {
                    frame.phase = Phase::Players { archive_claim: 0 };
                    if frame.depth >= self.config.max_depth {
                        continue;
                    }
                    if let Some((claim, children)) = self.open_archive(frame) {
                        frame.phase = Phase::Players {
                            archive_claim: claim,
                        };
                        stack.extend(children.into_iter().rev());
                    }
                }
                Phase::Players { archive_claim } => {
                    let module_claim = self.find_modules(frame)?;
                    let claim = archive_claim.max(module_claim);
                    let step = if claim > 0 {
                        claim
                    } else {
                        self.lookahead(frame)
                    };
                    frame.offset = if self.config.scan_raw {
                        frame.offset + step
                    } else {
                        frame.data.size()
                    };
                    frame.phase = Phase::Archives;
                }
            }
        }

        tracing::debug!(
            location = %self.identifier,
            modules = self.summary.modules,
            frames = self.summary.frames,
            "walk finished"
        );
        Ok(self.summary)
    }

    fn skipped(&self, plugin: &PluginDescriptor) -> bool {
        self.callback.skip_plugin(plugin.id, plugin.capabilities)
    }

    /// Try every archive plugin at the frame's offset. Returns the claimed size and
    /// the frames for the extracted entries.
    fn open_archive(&mut self, frame: &mut Frame) -> Option<(usize, Vec<Frame>)> {
        let window = frame.data.tail(frame.offset)?;
        let catalog = self.catalog;
        for plugin in catalog.iter() {
            let PluginKind::Archive(decoder) = &plugin.kind else {
                continue;
            };
            if self.callback.is_cancelled() {
                return None;
            }
            if self.skipped(plugin) || !decoder.check(&window) {
                continue;
            }
            let extracted = match decoder.extract(self.config, &window) {
                Ok(extracted) => extracted,
                Err(err) => {
                    tracing::trace!(plugin = plugin.id, offset = frame.offset, %err, "archive rejected");
                    continue;
                }
            };
            let consumed = extracted.consumed.min(window.size());
            if !frame.archive_ranges.add_range(frame.offset, consumed) {
                tracing::warn!(
                    plugin = plugin.id,
                    offset = frame.offset,
                    size = consumed,
                    "archive claim rejected"
                );
                continue;
            }
            let children = self.children(frame, plugin.id, &window, extracted);
            return Some((consumed, children));
        }
        None
    }

    fn children(
        &mut self,
        frame: &Frame,
        id: &str,
        window: &Binary,
        extracted: Extracted,
    ) -> Vec<Frame> {
        let base = frame.located_path();
        let mut properties = frame.properties.clone();
        properties.overlay(&extracted.properties);
        properties.push_container(id);

        let total = extracted.entries.len();
        let mut origins = RangeChecker::shared(window.size());
        let mut children = Vec::with_capacity(total);
        for entry in extracted.entries {
            if entry.data.is_empty() {
                continue;
            }
            let path = match &entry.name {
                Some(name) => {
                    if let Some((offset, size)) = entry.origin {
                        if !origins.add_range(offset, size) {
                            tracing::warn!(plugin = id, entry = %name, offset, size, "inconsistent archive entry dropped");
                            continue;
                        }
                    }
                    base.append(name)
                }
                None => base.clone(),
            };
            if self
                .target
                .as_ref()
                .is_some_and(|target| !target.starts_with(&path))
            {
                continue;
            }
            children.push(Frame::new(
                entry.data,
                path,
                properties.clone(),
                frame.depth + 1,
                self.catalog.len(),
            ));
        }

        tracing::debug!(plugin = id, path = %base, entries = total, opened = children.len(), "archive opened");
        self.callback.log(&format!(
            "{id} at '{base}': {} of {total} entries",
            children.len()
        ));
        self.summary.frames += children.len();
        children
    }

    /// Try every player plugin at the frame's offset. Returns the claimed size.
    fn find_modules(&mut self, frame: &mut Frame) -> Result<usize> {
        let Some(window) = frame.data.tail(frame.offset) else {
            return Ok(0);
        };
        let catalog = self.catalog;
        for plugin in catalog.iter() {
            if matches!(plugin.kind, PluginKind::Archive(_)) {
                continue;
            }
            if self.callback.is_cancelled() {
                return Ok(0);
            }
            if self.skipped(plugin) {
                continue;
            }
            let Some(start) = plugin.kind.locate(&window) else {
                continue;
            };
            let Some(body) = window.tail(start) else {
                continue;
            };
            let found = match &plugin.kind {
                PluginKind::Player(decoder) => decoder.create(&body).map(Found::from),
                PluginKind::Multitrack(decoder) => decoder.decode(&body).map(Found::from),
                PluginKind::Archive(_) => continue,
            };
            let found = match found {
                Ok(found) if !found.tracks.is_empty() => found,
                Ok(_) => {
                    tracing::trace!(plugin = plugin.id, offset = frame.offset, "no tracks");
                    continue;
                }
                Err(err) => {
                    tracing::trace!(plugin = plugin.id, offset = frame.offset, %err, "module rejected");
                    continue;
                }
            };

            let consumed = (start + found.consumed).min(window.size());
            if !frame.module_ranges.add_range(frame.offset, consumed) {
                tracing::warn!(
                    plugin = plugin.id,
                    offset = frame.offset,
                    size = consumed,
                    "module overlaps an earlier claim"
                );
                continue;
            }
            self.emit(frame, plugin.id, &body, found)?;
            return Ok(consumed);
        }
        Ok(0)
    }

    fn emit(&mut self, frame: &Frame, id: &'static str, body: &Binary, found: Found) -> Result<()> {
        let module = &body[..found.consumed.min(body.size())];
        let fixed_end = found.fixed.end.min(module.len());
        let fixed = &module[found.fixed.start.min(fixed_end)..fixed_end];
        let crc = crc32fast::hash(module);
        let fixed_crc = crc32fast::hash(fixed);

        let base = frame.located_path();
        let multitrack = found.tracks.len() > 1;
        for (idx, track) in found.tracks.into_iter().enumerate() {
            if self.callback.is_cancelled() {
                break;
            }
            let path = if multitrack {
                base.append(&format!("#{}", idx + 1))
            } else {
                base.clone()
            };
            if self.target.as_ref().is_some_and(|target| *target != path) {
                continue;
            }

            let subpath = path.as_string();
            let location = self.identifier.with_subpath(&subpath);
            let mut properties = Properties::new();
            properties.set_non_empty(keys::PATH, location.path());
            properties.set_non_empty(keys::FILENAME, location.filename());
            properties.set_non_empty(keys::EXTENSION, location.extension());
            properties.set_non_empty(keys::SUBPATH, &subpath);
            properties.set_non_empty(keys::FULLPATH, &location.full());
            properties.overlay(&frame.properties);
            properties.overlay(&found.properties);
            properties.overlay(&track.properties);
            if multitrack {
                properties.push_container(id);
            }
            properties.set(keys::TYPE, id);
            properties.set(keys::SIZE, module.len());
            properties.set(keys::CRC, crc);
            properties.set(keys::FIXED_CRC, fixed_crc);

            tracing::debug!(plugin = id, path = %path, offset = frame.offset, size = module.len(), "module found");
            let record = ModuleRecord {
                path,
                plugin_id: id,
                holder: track.holder,
                properties,
            };
            self.callback
                .on_module(record)
                .map_err(|source| DetectError::CallbackFailed {
                    offset: frame.offset,
                    container: self
                        .identifier
                        .with_subpath(&frame.path.as_string())
                        .full(),
                    source,
                })?;
            self.summary.modules += 1;
        }
        Ok(())
    }

    /// Distance to the next offset where any plugin could match, at least 1.
    ///
    /// Candidates are cached per frame. A plugin is searched again only once the
    /// frame has moved past its cached candidate, and dropped for good when nothing
    /// is left for it in the frame.
    fn lookahead(&self, frame: &mut Frame) -> usize {
        let size = frame.data.size();
        let Some(window) = frame.data.tail(frame.offset) else {
            return 1;
        };
        let archives = frame.depth < self.config.max_depth;
        let mut next = size;
        for (plugin, slot) in self.catalog.iter().zip(frame.candidates.iter_mut()) {
            let Some(cached) = *slot else {
                continue;
            };
            if (!archives && matches!(plugin.kind, PluginKind::Archive(_))) || self.skipped(plugin)
            {
                continue;
            }
            let candidate = if cached > frame.offset {
                cached
            } else {
                let ahead = plugin.kind.lookahead(&window);
                if ahead >= window.size() {
                    *slot = None;
                    continue;
                }
                frame.offset + ahead
            };
            *slot = Some(candidate);
            next = next.min(candidate);
        }
        (next - frame.offset).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ModuleCollector;

    fn frame(catalog: &PluginCatalog, data: Vec<u8>, depth: usize) -> Frame {
        Frame::new(
            Binary::new(data),
            DataPath::empty('/'),
            Properties::new(),
            depth,
            catalog.len(),
        )
    }

    #[test]
    fn lookahead_drops_exhausted_plugins() {
        let catalog = PluginCatalog::builtin().unwrap();
        let config = DetectConfig::default();
        let mut collector = ModuleCollector::new();
        let walk = Walk::new(&catalog, &config, Identifier::parse("junk.bin"), None, &mut collector);

        let mut data = vec![0u8; 4096];
        data[1000..1004].copy_from_slice(b"YM6!");
        let mut frame = frame(&catalog, data, 0);

        assert_eq!(walk.lookahead(&mut frame), 1000);
        let live: Vec<_> = frame.candidates.iter().flatten().copied().collect();
        assert_eq!(live, [1000]);

        // cached candidate ahead of the offset is reused
        frame.offset = 400;
        assert_eq!(walk.lookahead(&mut frame), 600);

        frame.offset = 1000;
        assert_eq!(walk.lookahead(&mut frame), 3096);
        assert!(frame.candidates.iter().all(Option::is_none));
    }

    #[test]
    fn lookahead_without_archives_past_max_depth() {
        let catalog = PluginCatalog::builtin().unwrap();
        let config = DetectConfig {
            max_depth: 1,
            ..DetectConfig::default()
        };
        let mut collector = ModuleCollector::new();
        let walk = Walk::new(&catalog, &config, Identifier::parse("x"), None, &mut collector);

        let mut data = vec![0u8; 1024];
        data[50..58].copy_from_slice(b"SINCLAIR");
        data[58] = 1;
        data[200..204].copy_from_slice(b"YM5!");
        let mut top = frame(&catalog, data.clone(), 0);
        assert_eq!(walk.lookahead(&mut top), 50);

        let mut nested = frame(&catalog, data, 1);
        assert_eq!(walk.lookahead(&mut nested), 200);
    }
}
