#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!(
        "The chipscan CLI requires the \"cli\" feature. Rebuild with `--features cli` to enable it."
    );
}

#[cfg(feature = "cli")]
mod cli {
    use std::io::{self, Write};
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use clap::{Parser, ValueEnum};
    use parking_lot::Mutex;
    use rayon::prelude::*;
    use serde::Serialize;
    use tracing::{debug, info, warn};
    use tracing_subscriber::EnvFilter;
    use walkdir::WalkDir;

    use chipscan::properties::keys;
    use chipscan::{
        BoxError, Capabilities, DetectCallback, DetectConfig, Detector, ModuleRecord,
        PluginCatalog, PluginKind, Properties,
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
    enum OutputFormat {
        Text,
        Json,
        Csv,
    }

    #[derive(Parser)]
    #[command(name = "chipscan")]
    #[command(about = "Find chiptune modules in files, archives and memory dumps")]
    struct Args {
        /// Files or directories to scan
        #[arg(required_unless_present = "list_plugins")]
        paths: Vec<PathBuf>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the maximum container nesting
        #[arg(long)]
        max_depth: Option<usize>,

        /// Only look for modules at the start of each container
        #[arg(long)]
        no_raw_scan: bool,

        /// Plugin ids to try first, comma separated
        #[arg(long, value_delimiter = ',')]
        order: Vec<String>,

        /// Plugin ids to skip, comma separated
        #[arg(long, value_delimiter = ',')]
        skip: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Print the plugin catalog and exit
        #[arg(long)]
        list_plugins: bool,
    }

    #[derive(Serialize)]
    struct ModuleReport {
        file: String,
        subpath: String,
        plugin: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<f32>,
        properties: Properties,
    }

    #[derive(Serialize)]
    struct CsvRow<'a> {
        file: &'a str,
        subpath: &'a str,
        #[serde(rename = "type")]
        plugin: &'a str,
        container: &'a str,
        title: &'a str,
        author: &'a str,
        size: i64,
        crc: String,
        duration: String,
    }

    impl ModuleReport {
        fn text(&self, key: &str) -> &str {
            self.properties.get_str(key).unwrap_or_default()
        }

        fn csv_row(&self) -> CsvRow<'_> {
            CsvRow {
                file: &self.file,
                subpath: &self.subpath,
                plugin: self.plugin,
                container: self.text(keys::CONTAINER),
                title: self.text(keys::TITLE),
                author: self.text(keys::AUTHOR),
                size: self.properties.get_integer(keys::SIZE).unwrap_or_default(),
                crc: self
                    .properties
                    .get_integer(keys::CRC)
                    .map(|crc| format!("{crc:08x}"))
                    .unwrap_or_default(),
                duration: self.duration.map(format_duration).unwrap_or_default(),
            }
        }
    }

    /// `m:ss`, rounded to the nearest second.
    fn format_duration(seconds: f32) -> String {
        let total = seconds.round() as u64;
        format!("{}:{:02}", total / 60, total % 60)
    }

    /// Collects records of one file, honouring `--skip`.
    struct ScanCallback<'a> {
        file: String,
        skip: &'a [String],
        reports: Vec<ModuleReport>,
    }

    impl DetectCallback for ScanCallback<'_> {
        fn skip_plugin(&self, id: &str, _capabilities: Capabilities) -> bool {
            self.skip.iter().any(|skipped| skipped.eq_ignore_ascii_case(id))
        }

        fn log(&mut self, message: &str) {
            tracing::trace!(file = %self.file, "{message}");
        }

        fn on_module(&mut self, record: ModuleRecord) -> Result<(), BoxError> {
            self.reports.push(ModuleReport {
                file: self.file.clone(),
                subpath: record.subpath(),
                plugin: record.plugin_id,
                duration: record.holder.metadata().duration_seconds(),
                properties: record.properties,
            });
            Ok(())
        }
    }

    fn load_config(args: &Args) -> Result<DetectConfig> {
        let mut config = match &args.config {
            Some(path) => DetectConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => DetectConfig::default(),
        };
        if let Some(depth) = args.max_depth {
            config.max_depth = depth.max(1);
        }
        if args.no_raw_scan {
            config.scan_raw = false;
        }
        if !args.order.is_empty() {
            config.plugin_order = args.order.clone();
        }
        Ok(config)
    }

    fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                files.extend(
                    WalkDir::new(path)
                        .follow_links(true)
                        .sort_by_file_name()
                        .into_iter()
                        .filter_map(|e| e.ok())
                        .filter(|e| e.file_type().is_file())
                        .map(|e| e.into_path()),
                );
            } else {
                files.push(path.clone());
            }
        }
        files
    }

    fn scan_file(detector: &Detector, path: &Path, skip: &[String]) -> Result<Vec<ModuleReport>> {
        let mut callback = ScanCallback {
            file: path.display().to_string(),
            skip,
            reports: Vec::new(),
        };
        let summary = detector
            .detect_file(path, &mut callback)
            .with_context(|| format!("scanning {}", path.display()))?;
        debug!(
            file = %path.display(),
            modules = summary.modules,
            frames = summary.frames,
            "scanned"
        );
        Ok(callback.reports)
    }

    fn list_plugins(catalog: &PluginCatalog) -> Result<()> {
        let mut out = io::stdout().lock();
        for plugin in catalog.iter() {
            let kind = match plugin.kind {
                PluginKind::Archive(_) => "archive",
                PluginKind::Player(_) => "player",
                PluginKind::Multitrack(_) => "multitrack",
            };
            writeln!(
                out,
                "{:<8} {kind:<12} {}",
                plugin.id,
                plugin.kind.description()
            )?;
        }
        Ok(())
    }

    fn write_reports(format: OutputFormat, reports: &[ModuleReport]) -> Result<()> {
        let stdout = io::stdout();
        match format {
            OutputFormat::Text => {
                let mut out = stdout.lock();
                for report in reports {
                    let location = if report.subpath.is_empty() {
                        report.file.clone()
                    } else {
                        format!("{}?{}", report.file, report.subpath)
                    };
                    writeln!(
                        out,
                        "{location}\t{}\t{}\t{}\t{}",
                        report.plugin,
                        report.text(keys::TITLE),
                        report.text(keys::AUTHOR),
                        report.duration.map(format_duration).unwrap_or_default()
                    )?;
                }
            }
            OutputFormat::Json => {
                serde_json::to_writer_pretty(stdout.lock(), reports)?;
                println!();
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(stdout.lock());
                for report in reports {
                    writer.serialize(report.csv_row())?;
                }
                writer.flush()?;
            }
        }
        Ok(())
    }

    pub fn run() -> Result<()> {
        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(EnvFilter::from_default_env().add_directive("chipscan=warn".parse()?))
            .init();

        let args = Args::parse();
        let config = load_config(&args)?;
        let detector = Detector::new(PluginCatalog::builtin()?, config)?;

        if args.list_plugins {
            return list_plugins(detector.catalog());
        }

        let files = collect_files(&args.paths);
        info!("Scanning {} files", files.len());

        let reports: Mutex<Vec<ModuleReport>> = Mutex::new(Vec::new());
        let failures: Mutex<usize> = Mutex::new(0);

        files.par_iter().for_each(|path| match scan_file(&detector, path, &args.skip) {
            Ok(found) => reports.lock().extend(found),
            Err(e) => {
                warn!("{e:#}");
                *failures.lock() += 1;
            }
        });

        let mut reports = reports.into_inner();
        reports.sort_by(|a, b| a.file.cmp(&b.file));
        write_reports(args.format, &reports)?;

        let failures = failures.into_inner();
        info!("Found {} modules, {} files failed", reports.len(), failures);
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn report(duration: Option<f32>) -> ModuleReport {
            let mut properties = Properties::new();
            properties.set(keys::TITLE, "Tune");
            properties.set(keys::CRC, 0xdead_beef_u32);
            ModuleReport {
                file: "a.ym".to_string(),
                subpath: String::new(),
                plugin: "YM",
                duration,
                properties,
            }
        }

        #[test]
        fn durations_are_minutes_and_seconds() {
            assert_eq!(format_duration(59.6), "1:00");
            assert_eq!(format_duration(125.0), "2:05");
        }

        #[test]
        fn csv_row_carries_duration_and_crc() {
            let with = report(Some(90.0));
            let row = with.csv_row();
            assert_eq!(row.duration, "1:30");
            assert_eq!(row.crc, "deadbeef");
            assert_eq!(row.title, "Tune");

            let without = report(None);
            assert_eq!(without.csv_row().duration, "");
        }

        #[test]
        fn json_omits_unknown_duration() {
            let json = serde_json::to_string(&report(None)).unwrap();
            assert!(!json.contains("duration"));
            let json = serde_json::to_string(&report(Some(2.0))).unwrap();
            assert!(json.contains(r#""duration":2.0"#));
        }
    }
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::run()
}
