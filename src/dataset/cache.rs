//! Process-wide dataset cache.
//!
//! Holds at most one parsed table per period. Readers take an `Arc`
//! snapshot, so a reload never disturbs a query already iterating a table.
//! Loads of the same period are serialized on a per-period lock.

use crate::dataset::fetcher::DatasetSource;
use crate::dataset::parser::{parse_bytes, ParseOptions, SourceFormat};
use crate::error::LcaError;
use crate::models::{DisclosureTable, Period};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Extensions a cached source file may carry.
const CACHED_EXTENSIONS: &[&str] = &["xlsx", "csv", "tsv"];

/// Where a table came from on a load call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOrigin {
    /// Already resident in memory.
    Memory,
    /// Parsed from a previously downloaded file.
    Disk,
    /// Freshly downloaded.
    Remote,
}

/// A resident table with its parse diagnostics.
#[derive(Debug, Clone)]
struct CacheEntry {
    table: Arc<DisclosureTable>,
    mapped_fields: Vec<String>,
    skipped_rows: usize,
}

/// Result of a load call.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub table: Arc<DisclosureTable>,
    pub origin: LoadOrigin,
    pub mapped_fields: Vec<String>,
    pub skipped_rows: usize,
}

/// Owned cache of loaded disclosure tables, keyed by period.
pub struct DatasetCache {
    cache_dir: PathBuf,
    parse_options: ParseOptions,
    source: Arc<dyn DatasetSource>,
    entries: RwLock<HashMap<Period, CacheEntry>>,
    current: RwLock<Option<Period>>,
    load_locks: Mutex<HashMap<Period, Arc<tokio::sync::Mutex<()>>>>,
}

impl DatasetCache {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        source: Arc<dyn DatasetSource>,
        parse_options: ParseOptions,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            parse_options,
            source,
            entries: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            load_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The most recently loaded period.
    pub fn current_period(&self) -> Option<Period> {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the table for `period`, if resident.
    pub fn get(&self, period: Period) -> Option<Arc<DisclosureTable>> {
        self.entry(period).map(|e| e.table)
    }

    /// Table for `period`, or for the current period when `None`.
    pub fn table_for(&self, period: Option<Period>) -> Result<Arc<DisclosureTable>, LcaError> {
        let wanted = period.or_else(|| self.current_period());
        wanted
            .and_then(|p| self.get(p))
            .ok_or(LcaError::NoDataLoaded { period: wanted })
    }

    /// Periods currently resident in memory.
    pub fn loaded_periods(&self) -> Vec<Period> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut periods: Vec<Period> = entries.keys().copied().collect();
        periods.sort();
        periods
    }

    /// Path of the downloaded source file for `period`, if one exists.
    pub fn cached_file(&self, period: Period) -> Option<PathBuf> {
        CACHED_EXTENSIONS
            .iter()
            .map(|ext| {
                self.cache_dir
                    .join(format!("{}.{}", period.file_stem(), ext))
            })
            .find(|p| p.is_file())
    }

    /// Install a table directly, replacing any resident table for its period.
    pub fn insert(&self, table: DisclosureTable) -> Arc<DisclosureTable> {
        let entry = CacheEntry {
            table: Arc::new(table),
            mapped_fields: Vec::new(),
            skipped_rows: 0,
        };
        self.install(entry.clone());
        entry.table
    }

    /// Return the table for `period`, loading it from disk or the remote
    /// source as needed. `force_download` always refetches and replaces.
    pub async fn load(&self, period: Period, force_download: bool) -> Result<LoadReport, LcaError> {
        if !force_download {
            if let Some(entry) = self.entry(period) {
                debug!("Cache hit for {}", period);
                self.set_current(period);
                return Ok(report(entry, LoadOrigin::Memory));
            }
        }

        let lock = self.load_lock(period);
        let _guard = lock.lock().await;

        // Another caller may have finished the same load while we waited.
        if !force_download {
            if let Some(entry) = self.entry(period) {
                self.set_current(period);
                return Ok(report(entry, LoadOrigin::Memory));
            }
        }

        if !force_download {
            if let Some(path) = self.cached_file(period) {
                match self.load_from_disk(period, &path).await {
                    Ok(entry) => {
                        self.install(entry.clone());
                        return Ok(report(entry, LoadOrigin::Disk));
                    }
                    Err(LcaError::Parse { reason }) => {
                        warn!(
                            "Cached file {} is unreadable ({}); downloading again",
                            path.display(),
                            reason
                        );
                        if let Err(e) = std::fs::remove_file(&path) {
                            warn!("Failed to remove {}: {}", path.display(), e);
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let entry = self.load_from_source(period).await?;
        self.install(entry.clone());
        Ok(report(entry, LoadOrigin::Remote))
    }

    async fn load_from_disk(&self, period: Period, path: &Path) -> Result<CacheEntry, LcaError> {
        info!("Loading cached data for {} from {}", period, path.display());
        let bytes = std::fs::read(path).map_err(|e| LcaError::io(path, e))?;
        self.parse(period, bytes, path.to_path_buf()).await
    }

    async fn load_from_source(&self, period: Period) -> Result<CacheEntry, LcaError> {
        info!(
            "Fetching data for {} from {}",
            period,
            self.source.location(period)
        );
        let bytes = self.source.fetch(period).await?;
        let path = self.persist(period, &bytes)?;
        self.parse(period, bytes, path).await
    }

    /// Write downloaded bytes into the cache directory atomically.
    fn persist(&self, period: Period, bytes: &[u8]) -> Result<PathBuf, LcaError> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|e| LcaError::io(&self.cache_dir, e))?;

        let extension = SourceFormat::detect(bytes).extension();
        let path = self
            .cache_dir
            .join(format!("{}.{}", period.file_stem(), extension));

        let mut tmp = tempfile::NamedTempFile::new_in(&self.cache_dir)
            .map_err(|e| LcaError::io(&self.cache_dir, e))?;
        tmp.write_all(bytes).map_err(|e| LcaError::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| LcaError::io(&path, e.error))?;

        // Drop stale copies saved under a different extension.
        for ext in CACHED_EXTENSIONS.iter().filter(|e| **e != extension) {
            let stale = self
                .cache_dir
                .join(format!("{}.{}", period.file_stem(), ext));
            if stale.is_file() {
                if let Err(e) = std::fs::remove_file(&stale) {
                    warn!("Failed to remove stale {}: {}", stale.display(), e);
                }
            }
        }

        debug!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }

    async fn parse(
        &self,
        period: Period,
        bytes: Vec<u8>,
        path: PathBuf,
    ) -> Result<CacheEntry, LcaError> {
        let options = self.parse_options.clone();
        let parsed = tokio::task::spawn_blocking(move || parse_bytes(&bytes, period, &options))
            .await
            .map_err(|e| LcaError::parse(format!("parser task failed: {}", e)))??;

        info!(
            "Loaded {} records for {} ({} skipped)",
            parsed.records.len(),
            period,
            parsed.skipped_rows
        );

        let table = DisclosureTable {
            period,
            records: parsed.records,
            source_file: Some(path),
            loaded_at: Utc::now(),
        };

        Ok(CacheEntry {
            table: Arc::new(table),
            mapped_fields: parsed.mapped_fields,
            skipped_rows: parsed.skipped_rows,
        })
    }

    fn entry(&self, period: Period) -> Option<CacheEntry> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&period).cloned()
    }

    fn install(&self, entry: CacheEntry) {
        let period = entry.table.period;
        {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            entries.insert(period, entry);
        }
        self.set_current(period);
    }

    fn set_current(&self, period: Period) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(period);
    }

    fn load_lock(&self, period: Period) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.load_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(period).or_default().clone()
    }
}

fn report(entry: CacheEntry, origin: LoadOrigin) -> LoadReport {
    LoadReport {
        table: entry.table,
        origin,
        mapped_fields: entry.mapped_fields,
        skipped_rows: entry.skipped_rows,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    pub(crate) const SAMPLE_CSV: &str = "CASE_STATUS,EMPLOYER_NAME,JOB_TITLE,WORKSITE_CITY,WORKSITE_STATE,WAGE_RATE_OF_PAY_FROM,WAGE_UNIT_OF_PAY\n\
Certified,Google LLC,Software Engineer II,Mountain View,CA,150000,Year\n\
Certified,Infosys Limited,Software Engineer,Plano,TX,85000,Year\n\
Denied,Acme Corp,Data Analyst,Austin,TX,40,Hour\n";

    /// Serves fixed bytes and counts fetches.
    pub(crate) struct FakeSource {
        pub body: Option<Vec<u8>>,
        pub fetches: AtomicUsize,
    }

    impl FakeSource {
        pub(crate) fn serving(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: Some(body.as_bytes().to_vec()),
                fetches: AtomicUsize::new(0),
            })
        }

        pub(crate) fn missing() -> Arc<Self> {
            Arc::new(Self {
                body: None,
                fetches: AtomicUsize::new(0),
            })
        }

        pub(crate) fn count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DatasetSource for FakeSource {
        fn location(&self, period: Period) -> String {
            format!("fake://{}", period.file_stem())
        }

        async fn fetch(&self, period: Period) -> Result<Vec<u8>, LcaError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.body.clone().ok_or(LcaError::DataUnavailable {
                period,
                reason: "404".to_string(),
            })
        }
    }

    fn period() -> Period {
        Period::new(2024, 1).unwrap()
    }

    #[test]
    fn test_reload_hits_memory_cache() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::serving(SAMPLE_CSV);
        let cache = DatasetCache::new(dir.path(), source.clone(), ParseOptions::default());

        let first = tokio_test::block_on(cache.load(period(), false)).unwrap();
        assert_eq!(first.origin, LoadOrigin::Remote);
        assert_eq!(first.table.len(), 3);

        let second = tokio_test::block_on(cache.load(period(), false)).unwrap();
        assert_eq!(second.origin, LoadOrigin::Memory);
        assert_eq!(second.table.len(), 3);
        assert_eq!(source.count(), 1);
        assert_eq!(cache.current_period(), Some(period()));
    }

    #[test]
    fn test_disk_cache_survives_new_process() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::serving(SAMPLE_CSV);

        let cache = DatasetCache::new(dir.path(), source.clone(), ParseOptions::default());
        tokio_test::block_on(cache.load(period(), false)).unwrap();
        assert!(dir.path().join("LCA_2024Q1.csv").is_file());

        let fresh = DatasetCache::new(dir.path(), source.clone(), ParseOptions::default());
        let report = tokio_test::block_on(fresh.load(period(), false)).unwrap();
        assert_eq!(report.origin, LoadOrigin::Disk);
        assert_eq!(report.table.len(), 3);
        assert_eq!(source.count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_loads_fetch_once() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::serving(SAMPLE_CSV);
        let cache = Arc::new(DatasetCache::new(
            dir.path(),
            source.clone(),
            ParseOptions::default(),
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.load(period(), false).await })
            })
            .collect();

        let mut tables = Vec::new();
        for handle in handles {
            tables.push(handle.await.unwrap().unwrap().table);
        }

        assert_eq!(source.count(), 1);
        assert!(tables.iter().all(|t| Arc::ptr_eq(t, &tables[0])));
    }

    #[test]
    fn test_refetch_in_new_format_removes_stale_copy() {
        let dir = TempDir::new().unwrap();
        let csv = DatasetCache::new(
            dir.path(),
            FakeSource::serving(SAMPLE_CSV),
            ParseOptions::default(),
        );
        tokio_test::block_on(csv.load(period(), false)).unwrap();
        assert!(dir.path().join("LCA_2024Q1.csv").is_file());

        let tsv_body = SAMPLE_CSV.replace(',', "\t");
        let tsv = DatasetCache::new(
            dir.path(),
            FakeSource::serving(&tsv_body),
            ParseOptions::default(),
        );
        let report = tokio_test::block_on(tsv.load(period(), true)).unwrap();

        assert_eq!(report.table.len(), 3);
        assert!(dir.path().join("LCA_2024Q1.tsv").is_file());
        assert!(!dir.path().join("LCA_2024Q1.csv").exists());
        assert_eq!(
            tsv.cached_file(period()),
            Some(dir.path().join("LCA_2024Q1.tsv"))
        );
    }

    #[test]
    fn test_force_download_replaces_table() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::serving(SAMPLE_CSV);
        let cache = DatasetCache::new(dir.path(), source.clone(), ParseOptions::default());

        let first = tokio_test::block_on(cache.load(period(), false)).unwrap();
        let forced = tokio_test::block_on(cache.load(period(), true)).unwrap();

        assert_eq!(forced.origin, LoadOrigin::Remote);
        assert_eq!(source.count(), 2);
        assert!(!Arc::ptr_eq(&first.table, &forced.table));
        // The old snapshot stays valid for readers that still hold it.
        assert_eq!(first.table.len(), 3);
    }

    #[test]
    fn test_missing_period_is_data_unavailable() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path(), FakeSource::missing(), ParseOptions::default());

        let err = tokio_test::block_on(cache.load(period(), false)).unwrap_err();
        assert!(matches!(err, LcaError::DataUnavailable { .. }));
        assert!(cache.get(period()).is_none());
        assert!(cache.current_period().is_none());
    }

    #[test]
    fn test_unrecognized_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(
            dir.path(),
            FakeSource::serving("FOO,BAR\n1,2\n"),
            ParseOptions::default(),
        );

        let err = tokio_test::block_on(cache.load(period(), false)).unwrap_err();
        assert!(matches!(err, LcaError::Parse { .. }));
    }

    #[test]
    fn test_table_for_without_load() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path(), FakeSource::missing(), ParseOptions::default());

        let err = cache.table_for(None).unwrap_err();
        assert!(matches!(err, LcaError::NoDataLoaded { period: None }));

        let err = cache.table_for(Some(period())).unwrap_err();
        assert!(matches!(err, LcaError::NoDataLoaded { period: Some(_) }));
    }

    #[test]
    fn test_insert_sets_current() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path(), FakeSource::missing(), ParseOptions::default());

        cache.insert(DisclosureTable::new(period(), Vec::new()));
        assert_eq!(cache.loaded_periods(), vec![period()]);
        assert!(cache.table_for(None).is_ok());
    }
}
