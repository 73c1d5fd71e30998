use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::mapping::{BookMapper, DEFAULT_AUTHOR_DIMENSION};
use crate::types::{DimensionSpec, FacetRequest, IndexLayout};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Loads configuration relative to the current directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Merges, lowest precedence first: built-in defaults, `config.toml`,
    /// `config.<env>.toml` and `APP_*` environment variables (`__` separates
    /// nested keys, e.g. `APP_INDEXING__BATCH_SIZE`).
    pub fn load_from(base_dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(BenchConfig::default()))
            .merge(Toml::file(base_dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, base_dir: base_dir.to_path_buf() })
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Configuration(format!("Failed to get '{}': {}", key, e)))
    }

    /// The typed benchmark configuration with paths resolved against the base
    /// directory. Fails on invalid values.
    pub fn bench(&self) -> Result<BenchConfig> {
        let mut config: BenchConfig = self
            .figment
            .extract()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        config.data.records = resolve_with_base(&self.base_dir, &config.data.records).display().to_string();
        config.data.embedded_index_dir =
            resolve_with_base(&self.base_dir, &config.data.embedded_index_dir).display().to_string();
        config.data.columnar_index_dir =
            resolve_with_base(&self.base_dir, &config.data.columnar_index_dir).display().to_string();
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    pub data: DataConfig,
    pub indexing: IndexingConfig,
    pub facets: FacetsConfig,
    pub harness: HarnessConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub records: String,
    pub embedded_index_dir: String,
    pub columnar_index_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitPolicy {
    PerDocument,
    #[default]
    PerBatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub batch_size: usize,
    #[serde(default)]
    pub commit_policy: CommitPolicy,
    pub writer_memory_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetsConfig {
    /// Dimension that receives each book's author names.
    #[serde(default = "default_author_dimension")]
    pub author_dimension: String,
    pub dimensions: Vec<DimensionSpec>,
    pub request: FacetRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub warmup_iterations: usize,
    pub measurement_iterations: usize,
    pub threads: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            data: DataConfig {
                records: "data/books".to_string(),
                embedded_index_dir: "data/indexes/embedded-category".to_string(),
                columnar_index_dir: "data/indexes/columnar-ordinal".to_string(),
            },
            indexing: IndexingConfig {
                batch_size: 25,
                commit_policy: CommitPolicy::PerBatch,
                writer_memory_bytes: 50_000_000,
            },
            facets: FacetsConfig {
                author_dimension: default_author_dimension(),
                dimensions: vec![DimensionSpec { name: DEFAULT_AUTHOR_DIMENSION.to_string(), multi_valued: true }],
                request: FacetRequest::new(DEFAULT_AUTHOR_DIMENSION, 10),
            },
            harness: HarnessConfig { warmup_iterations: 1, measurement_iterations: 20, threads: 1 },
        }
    }
}

fn default_author_dimension() -> String {
    DEFAULT_AUTHOR_DIMENSION.to_string()
}

impl BenchConfig {
    pub fn mapper(&self) -> BookMapper {
        BookMapper::new(self.facets.author_dimension.as_str())
    }

    pub fn layout(&self) -> IndexLayout {
        self.mapper().layout(self.facets.dimensions.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.indexing.batch_size == 0 {
            return Err(Error::Configuration("indexing.batch_size must be greater than zero".into()));
        }
        // tantivy refuses writer budgets below 15MB per indexing thread
        if self.indexing.writer_memory_bytes < 15_000_000 {
            return Err(Error::Configuration("indexing.writer_memory_bytes must be at least 15000000".into()));
        }
        if self.harness.measurement_iterations == 0 || self.harness.threads == 0 {
            return Err(Error::Configuration("harness iterations and threads must be greater than zero".into()));
        }
        if Path::new(&self.data.embedded_index_dir) == Path::new(&self.data.columnar_index_dir) {
            return Err(Error::Configuration("the two strategies need distinct index directories".into()));
        }
        let mapper = self.mapper();
        let layout = mapper.layout(self.facets.dimensions.clone());
        layout.validate()?;
        if !layout.dimension(mapper.author_dimension()).is_some_and(|d| d.multi_valued) {
            return Err(Error::Configuration(format!(
                "author dimension '{}' must be declared in facets.dimensions as multi_valued",
                mapper.author_dimension()
            )));
        }
        self.facets.request.validate(&layout)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BenchConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.indexing.batch_size, 25);
        assert_eq!(config.facets.request.top_k, 10);
        assert!(config.layout().dimension("authors").is_some_and(|d| d.multi_valued));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = BenchConfig::default();
        config.indexing.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.data.columnar_index_dir = config.data.embedded_index_dir.clone();
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.facets.request.dimension = "publishers".into();
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.facets.author_dimension = "writers".into();
        assert!(config.validate().is_err(), "author dimension must be declared");
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let base = Path::new("/srv/bench");
        assert_eq!(resolve_with_base(base, "/tmp/idx"), PathBuf::from("/tmp/idx"));
        assert_eq!(resolve_with_base(base, "idx"), PathBuf::from("/srv/bench/idx"));
    }
}
