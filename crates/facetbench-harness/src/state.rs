use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;

use facetbench_core::config::DataConfig;
use facetbench_core::Strategy;

/// Final on-disk locations of the two indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexPaths {
    pub embedded: PathBuf,
    pub columnar: PathBuf,
}

impl IndexPaths {
    pub fn new(embedded: impl Into<PathBuf>, columnar: impl Into<PathBuf>) -> Self {
        Self { embedded: embedded.into(), columnar: columnar.into() }
    }

    pub fn from_config(data: &DataConfig) -> Self {
        Self::new(&data.embedded_index_dir, &data.columnar_index_dir)
    }

    pub fn for_strategy(&self, strategy: Strategy) -> &Path {
        match strategy {
            Strategy::EmbeddedCategory => &self.embedded,
            Strategy::ColumnarOrdinal => &self.columnar,
        }
    }

    /// Where `strategy` is written before the build is promoted.
    pub fn staging(&self, strategy: Strategy) -> PathBuf {
        staging_path(self.for_strategy(strategy))
    }
}

/// `<path>.partial`
pub fn staging_path(path: &Path) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_os_string();
    raw.push(".partial");
    PathBuf::from(raw)
}

/// Lifecycle of the index pair. Only the presence of both final directories
/// counts; contents are not inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildState {
    NeedsBuild,
    Ready,
}

impl BuildState {
    pub fn detect(paths: &IndexPaths) -> Self {
        if paths.embedded.exists() && paths.columnar.exists() {
            BuildState::Ready
        } else {
            BuildState::NeedsBuild
        }
    }
}
