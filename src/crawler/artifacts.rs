//! On-disk artifacts of a run
//!
//! Layout under the output root:
//!
//! ```text
//! <source>/last_run.json                     completion marker
//! <source>/run_<YYYYmmdd_HHMMSS>/product_<id prefix>_<digest>.json
//! <source>/run_<YYYYmmdd_HHMMSS>/summary.json
//! ```

use crate::crawler::result::{CacheMode, RunSummary};
use crate::product::ProductRecord;
use crate::sources::Source;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SUMMARY_FILE: &str = "summary.json";
const MARKER_FILE: &str = "last_run.json";
const ID_PREFIX_LEN: usize = 80;

/// Contents of a source's completion marker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub timestamp: DateTime<Utc>,
    pub summary: RunSummary,
}

/// Artifact directory of one run
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    source_dir: PathBuf,
    run_dir: PathBuf,
}

impl RunArtifacts {
    /// Creates a fresh run directory for `source`
    pub fn create(output_root: &Path, source: &Source) -> Result<Self> {
        let source_dir = output_root.join(source.slug());
        fs::create_dir_all(&source_dir)?;

        let stamp = Utc::now().format("run_%Y%m%d_%H%M%S").to_string();
        let mut run_dir = source_dir.join(&stamp);
        let mut suffix = 2;
        while run_dir.exists() {
            run_dir = source_dir.join(format!("{}_{}", stamp, suffix));
            suffix += 1;
        }
        fs::create_dir_all(&run_dir)?;

        debug!("Created run directory {}", run_dir.display());
        Ok(Self {
            source_dir,
            run_dir,
        })
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn marker_path(&self) -> PathBuf {
        self.source_dir.join(MARKER_FILE)
    }

    /// A source is crawled incrementally once any earlier run has completed
    pub fn cache_mode(&self) -> CacheMode {
        if self.marker_path().exists() {
            CacheMode::Incremental
        } else {
            CacheMode::Fresh
        }
    }

    /// Artifact path for a record identity
    ///
    /// The name keeps a readable prefix of the id and ends in a digest of the
    /// whole id, so distinct identities never share a file.
    pub fn product_path(&self, id: &str) -> PathBuf {
        self.run_dir.join(format!("product_{}.json", artifact_name(id)))
    }

    /// Writes one extracted record, named by its identity
    pub fn write_product(&self, record: &ProductRecord) -> Result<PathBuf> {
        let path = self.product_path(&record.resolve_id());
        fs::write(&path, serde_json::to_vec_pretty(record)?)?;
        Ok(path)
    }

    pub fn write_summary(&self, summary: &RunSummary) -> Result<()> {
        fs::write(
            self.run_dir.join(SUMMARY_FILE),
            serde_json::to_vec_pretty(summary)?,
        )?;
        Ok(())
    }

    pub fn write_completion_marker(&self, summary: &RunSummary) -> Result<()> {
        let marker = CompletionMarker {
            timestamp: Utc::now(),
            summary: summary.clone(),
        };
        fs::write(self.marker_path(), serde_json::to_vec_pretty(&marker)?)?;
        Ok(())
    }

    /// Reads back every product artifact of this run
    ///
    /// Files that don't parse are skipped with a warning. Records without a
    /// source get `source_name`.
    pub fn load_products(&self, source_name: &str) -> Result<Vec<ProductRecord>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.run_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && path.file_name().is_some_and(|name| name != SUMMARY_FILE)
            })
            .collect();
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let parsed = fs::read(&path)
                .map_err(crate::HarvestError::from)
                .and_then(|bytes| Ok(serde_json::from_slice::<ProductRecord>(&bytes)?));
            match parsed {
                Ok(mut record) => {
                    if record.source.is_empty() {
                        record.source = source_name.to_string();
                    }
                    records.push(record);
                }
                Err(e) => warn!("Skipping unreadable artifact {}: {}", path.display(), e),
            }
        }
        Ok(records)
    }
}

/// Reads the completion marker of a source directory, if present
pub fn read_completion_marker(source_dir: &Path) -> Option<CompletionMarker> {
    let bytes = fs::read(source_dir.join(MARKER_FILE)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn artifact_name(id: &str) -> String {
    let prefix: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(ID_PREFIX_LEN)
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    let digest = hasher.finalize();
    format!("{}_{}", prefix, hex::encode(&digest[..8]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::result::CrawlBatchResult;
    use crate::sources::RateProfile;
    use crate::url::UrlFilter;
    use std::time::Duration;

    fn create_test_source() -> Source {
        Source {
            name: "Price Check".to_string(),
            sitemap_url: "https://shop.example.com/sitemap.xml".to_string(),
            filter: UrlFilter::allow_all(),
            concurrency: 2,
            rate: RateProfile::default(),
            max_urls: 10,
            interval: Duration::from_secs(3600),
            enabled: true,
            currency: "ZAR".to_string(),
        }
    }

    fn create_test_summary(run: &RunArtifacts) -> RunSummary {
        let result = CrawlBatchResult {
            source: "Price Check".to_string(),
            attempted: 1,
            succeeded: 1,
            failed: 0,
            rate_limited: 0,
            extraction_misses: 0,
            artifact_failures: 0,
            total_attempts: 1,
            retry_rounds: 0,
            duration: Duration::from_secs(1),
            run_dir: run.run_dir().to_path_buf(),
            cache_mode: CacheMode::Fresh,
        };
        RunSummary::from_batch(&result, Utc::now(), Utc::now(), 1)
    }

    #[test]
    fn test_layout_and_collision_suffix() {
        let root = tempfile::tempdir().unwrap();
        let source = create_test_source();

        let first = RunArtifacts::create(root.path(), &source).unwrap();
        let second = RunArtifacts::create(root.path(), &source).unwrap();

        assert_eq!(first.source_dir(), root.path().join("price_check"));
        assert_ne!(first.run_dir(), second.run_dir());
        assert!(first.run_dir().is_dir() && second.run_dir().is_dir());
    }

    #[test]
    fn test_cache_mode_follows_marker() {
        let root = tempfile::tempdir().unwrap();
        let run = RunArtifacts::create(root.path(), &create_test_source()).unwrap();
        assert_eq!(run.cache_mode(), CacheMode::Fresh);

        run.write_completion_marker(&create_test_summary(&run)).unwrap();
        assert_eq!(run.cache_mode(), CacheMode::Incremental);

        let marker = read_completion_marker(run.source_dir()).unwrap();
        assert_eq!(marker.summary.source, "Price Check");
    }

    #[test]
    fn test_load_products_skips_summary_and_fills_source() {
        let root = tempfile::tempdir().unwrap();
        let run = RunArtifacts::create(root.path(), &create_test_source()).unwrap();

        run.write_product(&ProductRecord::new("https://shop.example.com/p/1", "One"))
            .unwrap();
        let mut tagged = ProductRecord::new("https://shop.example.com/p/2", "Two");
        tagged.source = "Elsewhere".to_string();
        run.write_product(&tagged).unwrap();
        run.write_summary(&create_test_summary(&run)).unwrap();
        fs::write(run.run_dir().join("product_broken.json"), b"{not json").unwrap();

        let records = run.load_products("Price Check").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source, "Price Check");
        assert_eq!(records[1].source, "Elsewhere");
    }

    #[test]
    fn test_same_identity_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let run = RunArtifacts::create(root.path(), &create_test_source()).unwrap();

        let a = run
            .write_product(&ProductRecord::new("https://shop.example.com/p/1", "Old"))
            .unwrap();
        let b = run
            .write_product(&ProductRecord::new("https://other.example.com/x/1", "New"))
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(run.load_products("Price Check").unwrap()[0].title, "New");
    }

    #[test]
    fn test_artifact_name_keeps_readable_prefix() {
        let name = artifact_name("Samsung Galaxy+S24");
        assert!(name.starts_with("Samsung_Galaxy_S24_"));
        assert_eq!(name.len(), "Samsung_Galaxy_S24_".len() + 16);
        assert_eq!(name, artifact_name("Samsung Galaxy+S24"));
        assert!(artifact_name(&"x".repeat(500)).len() <= ID_PREFIX_LEN + 17);
    }

    #[test]
    fn test_distinct_ids_never_share_a_file() {
        let root = tempfile::tempdir().unwrap();
        let run = RunArtifacts::create(root.path(), &create_test_source()).unwrap();
        let long = "x".repeat(130);
        let urls = [
            "https://shop.example.com/p/usb-c+hdmi".to_string(),
            "https://shop.example.com/p/usb-c_hdmi".to_string(),
            format!("https://shop.example.com/p/{}-black", long),
            format!("https://shop.example.com/p/{}-white", long),
        ];

        let mut paths: Vec<PathBuf> = urls
            .iter()
            .map(|url| run.write_product(&ProductRecord::new(url.as_str(), "Cable")).unwrap())
            .collect();
        paths.sort();
        paths.dedup();

        assert_eq!(paths.len(), 4);
        assert_eq!(run.load_products("Price Check").unwrap().len(), 4);
    }
}
