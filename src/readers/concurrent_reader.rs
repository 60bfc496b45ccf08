use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;
use crate::models::{Source, SourceStream};
use crate::readers::LogReader;

/// The three input log paths for one merge invocation.
#[derive(Debug, Clone)]
pub struct LogPaths {
    pub state: PathBuf,
    pub pmc: PathBuf,
    pub rapl: PathBuf,
}

impl LogPaths {
    pub fn new(state: &Path, pmc: &Path, rapl: &Path) -> Self {
        Self {
            state: state.to_path_buf(),
            pmc: pmc.to_path_buf(),
            rapl: rapl.to_path_buf(),
        }
    }
}

/// Container for the three parsed streams.
#[derive(Debug)]
pub struct TelemetryData {
    pub state: SourceStream,
    pub pmc: SourceStream,
    pub rapl: SourceStream,
}

impl TelemetryData {
    pub fn stream(&self, source: Source) -> &SourceStream {
        match source {
            Source::State => &self.state,
            Source::Pmc => &self.pmc,
            Source::Rapl => &self.rapl,
        }
    }
}

/// Reads the three logs concurrently. The streams are independent and
/// read-only, so this is purely a throughput optimization; the merge that
/// follows is sequential.
pub struct ConcurrentReader {
    use_mmap: bool,
}

impl ConcurrentReader {
    pub fn new() -> Self {
        Self { use_mmap: false }
    }

    pub fn with_mmap(use_mmap: bool) -> Self {
        Self { use_mmap }
    }

    pub async fn read_all(&self, paths: &LogPaths) -> Result<TelemetryData> {
        let state_handle = self.spawn_read(paths.state.clone(), Source::State);
        let pmc_handle = self.spawn_read(paths.pmc.clone(), Source::Pmc);
        let rapl_handle = self.spawn_read(paths.rapl.clone(), Source::Rapl);

        let (state, pmc, rapl) = tokio::try_join!(state_handle, pmc_handle, rapl_handle)?;

        Ok(TelemetryData {
            state: state?,
            pmc: pmc?,
            rapl: rapl?,
        })
    }

    fn spawn_read(&self, path: PathBuf, source: Source) -> JoinHandle<Result<SourceStream>> {
        let use_mmap = self.use_mmap;
        tokio::task::spawn_blocking(move || {
            let reader = LogReader::with_mmap(use_mmap);
            let stream = reader.read_samples(&path, source)?;
            debug!(
                source = %source,
                samples = stream.len(),
                fields = stream.schema.len(),
                "read log {}",
                path.display()
            );
            Ok(stream)
        })
    }
}

impl Default for ConcurrentReader {
    fn default() -> Self {
        Self::new()
    }
}
