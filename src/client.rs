//! Top-level client composing the runner, parsers, concurrency controller
//! and metrics collector.
//!
//! Every operation validates nothing itself about the upstream store: it
//! invokes the external tool, bounds the invocation, and turns text output
//! into structured data. Operations are wrapped by the metrics collector;
//! the recorded memory delta is the captured output length, the closest
//! observable allocation proxy without an allocator hook.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::concurrency::{AdaptiveConcurrency, DownloadStats};
use crate::config::{self, Config};
use crate::contract::Invoke;
use crate::error::Error;
use crate::listing::{parse_line, FileRecord};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::quota::{parse_quota_output, QuotaSnapshot};
use crate::runner::ProcessRunner;
use crate::stream;

/// Output ceiling for fully-buffered listings.
pub const LISTING_OUTPUT_LIMIT: usize = 10 * 1024 * 1024;
/// Output ceiling for quota queries.
pub const QUOTA_OUTPUT_LIMIT: usize = 1024 * 1024;

const DEFAULT_CONCURRENCY: usize = 3;

/// Estimate used for controller feedback when the tool does not report the
/// transferred byte count.
const ESTIMATED_DOWNLOAD_BYTES: u64 = 50 * 1024 * 1024;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Client for the external cloud-storage tool. Generic over the invocation
/// contract so captured-output operations are mockable in tests; production
/// code uses the [`ProcessRunner`]-backed alias.
pub struct Client<I = ProcessRunner> {
    invoker: I,
    debug_mode: bool,
    downloader: Arc<AdaptiveConcurrency>,
    metrics: Metrics,
}

impl Client<ProcessRunner> {
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self::with_invoker(ProcessRunner::new(tool))
    }

    /// Build against the binary named by `CLOUDPULL_BIN` (or the default).
    pub fn from_env() -> Self {
        Self::new(config::tool_path())
    }
}

impl<I: Invoke> Client<I> {
    pub fn with_invoker(invoker: I) -> Self {
        Client {
            invoker,
            debug_mode: false,
            downloader: Arc::new(AdaptiveConcurrency::new(DEFAULT_CONCURRENCY)),
            metrics: Metrics::new(),
        }
    }

    /// Pass `--debug` through to every tool invocation.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug_mode = debug;
    }

    fn ls_args(&self, path: &str, long_format: bool, human: bool) -> Vec<String> {
        let mut args = vec!["ls".to_string(), "--path".to_string(), path.to_string()];
        if long_format {
            args.push("--long".to_string());
        }
        if human {
            args.push("--human".to_string());
        }
        if self.debug_mode {
            args.push("--debug".to_string());
        }
        args
    }

    fn quota_args(&self) -> Vec<String> {
        let mut args = vec!["quota".to_string()];
        if self.debug_mode {
            args.push("--debug".to_string());
        }
        args
    }

    /// Wrap one operation with the metrics collector. The inner future
    /// reports its memory delta alongside the value.
    async fn with_metrics<T, F>(&self, operation: &str, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<(T, i64), Error>>,
    {
        let started = Instant::now();
        let outcome = fut.await;
        match &outcome {
            Ok((_, delta)) => self.metrics.record(operation, started.elapsed(), *delta, false),
            Err(_) => self.metrics.record(operation, started.elapsed(), 0, true),
        }
        outcome.map(|(value, _)| value)
    }

    /// Validate credentials, materialize the external tool's config file,
    /// and probe the tool with a cheap quota query.
    pub async fn check_config(&self, config: &Config) -> Result<(), Error> {
        config.validate()?;
        config.write_tool_config(&config::tool_config_dir())?;

        self.with_metrics("check_config", async {
            let output = self
                .invoker
                .run_capture(self.quota_args(), QUOTA_OUTPUT_LIMIT)
                .await?;
            Ok(((), output.len() as i64))
        })
        .await
    }

    /// Fully-buffered listing. Suited to small and medium directories; very
    /// large listings should go through the streaming variants.
    pub async fn list_files(
        &self,
        path: &str,
        long_format: bool,
        human: bool,
    ) -> Result<Vec<FileRecord>, Error> {
        self.with_metrics("list_files", async {
            let output = self
                .invoker
                .run_capture(self.ls_args(path, long_format, human), LISTING_OUTPUT_LIMIT)
                .await?;
            let delta = output.len() as i64;

            let mut files = Vec::with_capacity(100);
            for line in output.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with("total") {
                    continue;
                }
                if let Some(record) = parse_line(line, long_format) {
                    files.push(record);
                }
            }
            debug!(path, count = files.len(), "parsed listing");
            Ok((files, delta))
        })
        .await
    }

    /// Stream records through `callback` as the tool emits them, without
    /// materializing the listing in memory.
    pub async fn list_files_stream(
        &self,
        path: &str,
        long_format: bool,
        human: bool,
        callback: impl FnMut(FileRecord) -> anyhow::Result<()> + Send,
    ) -> Result<(), Error> {
        self.with_metrics("list_files_stream", async {
            let tool_stream = self
                .invoker
                .spawn_streaming(self.ls_args(path, long_format, human))
                .await?;
            stream::stream_records(tool_stream, long_format, callback).await?;
            Ok(((), 0))
        })
        .await
    }

    /// Stream records batched into fixed-size pages.
    pub async fn list_files_paginated(
        &self,
        path: &str,
        long_format: bool,
        human: bool,
        page_size: usize,
        page_callback: impl FnMut(Vec<FileRecord>, usize) -> anyhow::Result<()> + Send,
    ) -> Result<(), Error> {
        self.with_metrics("list_files_paginated", async {
            let tool_stream = self
                .invoker
                .spawn_streaming(self.ls_args(path, long_format, human))
                .await?;
            stream::stream_pages(tool_stream, long_format, page_size, page_callback).await?;
            Ok(((), 0))
        })
        .await
    }

    pub async fn quota(&self) -> Result<QuotaSnapshot, Error> {
        self.with_metrics("quota", async {
            let output = self
                .invoker
                .run_capture(self.quota_args(), QUOTA_OUTPUT_LIMIT)
                .await?;
            let delta = output.len() as i64;
            Ok((parse_quota_output(&output), delta))
        })
        .await
    }

    /// Download a file or folder. Acquires one logical slot from the
    /// admission semaphore, sizes the tool's own parallelism from the
    /// current concurrency level, and feeds the observed duration back into
    /// the controller so the next download reads an adjusted level.
    ///
    /// Downloads run with inherited stdio and no deadline; transfers are
    /// long-lived and the tool reports its own progress.
    pub async fn download(
        &self,
        path: &str,
        output_dir: &Path,
        count: usize,
        show_progress: bool,
    ) -> Result<(), Error> {
        std::fs::create_dir_all(output_dir)?;
        self.downloader.set_level(count);

        self.with_metrics("download", async {
            let slot = Arc::clone(&self.downloader).acquire().await;
            let level = self.downloader.current();

            let mut args = vec![
                "download".to_string(),
                "--path".to_string(),
                path.to_string(),
                "--output".to_string(),
                output_dir.display().to_string(),
                "--count".to_string(),
                level.to_string(),
            ];
            if show_progress {
                args.push("--progress".to_string());
            }
            if self.debug_mode {
                args.push("--debug".to_string());
            }

            let monitor = show_progress.then(|| {
                let downloader = Arc::clone(&self.downloader);
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        let stats = downloader.stats();
                        if stats.active > 0 || stats.completed > 0 {
                            info!(
                                active = stats.active,
                                completed = stats.completed,
                                average_mbps = stats.average_mbps,
                                concurrency = stats.concurrency,
                                "download progress"
                            );
                        }
                    }
                })
            });

            info!(path, output = %output_dir.display(), concurrency = level, "starting download");
            let started = Instant::now();
            let result = self.invoker.run_passthrough(args).await;
            let elapsed = started.elapsed();

            if let Some(task) = monitor {
                task.abort();
            }

            let status = result?;
            if !status.success() {
                return Err(Error::ProcessFailure {
                    status,
                    stderr: String::new(),
                });
            }

            slot.complete(ESTIMATED_DOWNLOAD_BYTES);
            self.downloader.adjust(ESTIMATED_DOWNLOAD_BYTES, elapsed);
            Ok(((), 0))
        })
        .await
    }

    pub fn download_stats(&self) -> DownloadStats {
        self.downloader.stats()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
