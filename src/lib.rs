//! Chiptune format detection and nested archive resolution
//!
//! `chipscan` finds playable chiptune modules inside arbitrary data: plain module
//! files, modules wrapped in TR-DOS containers or packers, and modules buried at some
//! offset of a memory dump. Archives are opened recursively and every module found is
//! reported with a hierarchical path and merged metadata.
//!
//! # Features
//! - Byte signature DSL compiled to fixed-length matchers
//! - Ordered, configurable plugin catalog (archives, players, multitrack modules)
//! - Explicit-stack walk with depth limit and cancellation
//! - Built-in plugins: Hobeta, SCL, ICE!, LHA, AY, SNDH, YM
//!
//! # Crate feature flags
//! - `lha` (default): LHA/LZH archive plugin (enables optional `delharc` dep)
//! - `cli` (default): `chipscan` command-line scanner
//!
//! # Quick start
//! ```no_run
//! use chipscan::{Binary, Detector, ModuleCollector};
//!
//! let detector = Detector::with_defaults().unwrap();
//! let data = std::fs::read("disk.scl").unwrap();
//! let mut collector = ModuleCollector::new();
//! detector.detect("disk.scl", Binary::new(data), &mut collector).unwrap();
//! for record in collector.records() {
//!     println!("{} {:?}", record.subpath(), record.properties.get_str("Title"));
//! }
//! ```
//!
//! ## Opening one module
//! ```no_run
//! use chipscan::{Binary, Detector};
//!
//! let detector = Detector::with_defaults().unwrap();
//! let data = std::fs::read("disk.scl").unwrap();
//! if let Some(record) = detector.open("disk.scl?SONG.C/#2", Binary::new(data)).unwrap() {
//!     println!("{}", record.holder.metadata().title());
//! }
//! ```

#![warn(missing_docs)]

pub mod binary; // Shared byte views
pub mod config; // Walk settings
pub mod data_path; // Paths inside containers
pub mod detect; // Walk orchestration
pub mod error;
pub mod format; // Signatures with size limits
pub mod identifier; // `file?subpath` locations
pub mod metadata;
pub mod pattern; // Signature DSL
pub mod plugins; // Format recognizers
pub mod properties;
pub mod range_checker; // Claimed byte regions

// Public API exports
pub use binary::Binary;
pub use config::DetectConfig;
pub use data_path::DataPath;
pub use detect::{DetectCallback, Detector, ModuleCollector, ModuleRecord, WalkSummary};
pub use error::{BoxError, DetectError, FormatError, FormatResult, Result};
pub use format::{BinaryFormat, DetectionResult};
pub use identifier::Identifier;
pub use metadata::{BasicMetadata, MetadataFields};
pub use pattern::{compile, Pattern, PatternSyntaxError};
pub use plugins::{Capabilities, ModuleHolder, PluginCatalog, PluginDescriptor, PluginKind};
pub use properties::{PropertyValue, Properties};
pub use range_checker::{RangeChecker, RangeMode};
