use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub experiment: ExperimentConfig,
    pub embeddings: EmbeddingsConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub graph: GraphConfig,
    pub fusion: FusionConfig,
}

/// Experiment inputs and outputs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Directory of .md/.txt files or a JSON file of documents.
    /// None = built-in cybersecurity sample corpus.
    pub corpus: Option<PathBuf>,
    /// JSON file of `{query, ground_truth}` records. None = built-in queries.
    pub queries: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub log_level: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            corpus: None,
            queries: None,
            output_dir: PathBuf::from("results"),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAI,
    /// Offline feature-hashing embedder, no API key needed
    Hashing,
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub api_key_env: String,
    pub batch_size: usize,
    /// None = provider default (1536 for openai, 384 for hashing)
    pub dimensions: Option<usize>,
    /// 0 disables the query embedding cache
    pub cache_capacity: usize,
    /// Optional SQLite file persisting document embeddings between runs.
    pub store_path: Option<PathBuf>,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            batch_size: 100,
            dimensions: None,
            cache_capacity: default_cache_capacity(),
            store_path: None,
        }
    }
}

fn default_cache_capacity() -> usize {
    1000
}

impl EmbeddingsConfig {
    pub fn dimensions(&self) -> usize {
        self.dimensions.unwrap_or(match self.provider {
            EmbeddingProvider::OpenAI => 1536,
            EmbeddingProvider::Hashing => 384,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    OpenAI,
    Anthropic,
    /// Offline templated answers (demo mode)
    Template,
}

impl GenerationProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            GenerationProvider::OpenAI => "gpt-3.5-turbo",
            GenerationProvider::Anthropic => "claude-3-haiku-20240307",
            GenerationProvider::Template => "template",
        }
    }

    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            GenerationProvider::OpenAI => "OPENAI_API_KEY",
            GenerationProvider::Anthropic => "ANTHROPIC_API_KEY",
            GenerationProvider::Template => "",
        }
    }
}

/// LLM generation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: GenerationProvider,
    /// None = provider default
    pub model: Option<String>,
    /// None = provider default (OPENAI_API_KEY / ANTHROPIC_API_KEY)
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::Template,
            model: None,
            api_key_env: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl GenerationConfig {
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    pub fn api_key_env(&self) -> String {
        self.api_key_env
            .clone()
            .unwrap_or_else(|| self.provider.default_api_key_env().to_string())
    }
}

/// Vector retrieval configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Knowledge graph configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// JSON/YAML graph specification. None = built-in CSKG.
    pub spec_path: Option<PathBuf>,
    pub max_entities: usize,
    pub related_depth: usize,
    pub mitigation_max_depth: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            spec_path: None,
            max_entities: 5,
            related_depth: 1,
            mitigation_max_depth: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreAggregation {
    /// Mean of all passage scores
    Mean,
    /// Score of the best passage
    Top1,
}

/// Retrieval-quality scoring policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub aggregation: ScoreAggregation,
    /// Share of the remaining headroom (1 - base) a fully grounded query gains.
    pub graph_weight: f32,
    /// Expanded-entity count at which the graph bonus saturates.
    pub entity_saturation: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            aggregation: ScoreAggregation::Mean,
            graph_weight: 0.3,
            entity_saturation: 5,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in KGRAG_CONFIG environment variable (must exist)
    /// 2. ./config.toml in current directory (defaults if absent)
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config = match std::env::var("KGRAG_CONFIG") {
            Ok(path) => Self::from_path(Path::new(&path))?,
            Err(_) => {
                let default_path = PathBuf::from("config.toml");
                if default_path.exists() {
                    Self::from_path(&default_path)?
                } else {
                    log::debug!("No config.toml found, using defaults");
                    Config::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without touching the environment.
    pub fn from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be greater than 0");
        }

        if self.graph.max_entities == 0 {
            anyhow::bail!("graph.max_entities must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.fusion.graph_weight) {
            anyhow::bail!("fusion.graph_weight must be between 0.0 and 1.0");
        }

        if self.fusion.entity_saturation == 0 {
            anyhow::bail!("fusion.entity_saturation must be at least 1");
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            anyhow::bail!("generation.temperature must be between 0.0 and 2.0");
        }

        if self.embeddings.dimensions == Some(0) {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if let Some(ref spec) = self.graph.spec_path {
            if !spec.is_file() {
                anyhow::bail!("graph.spec_path does not exist: {}", spec.display());
            }
        }

        Ok(())
    }

    /// Switch every collaborator to its offline implementation.
    pub fn into_demo(mut self) -> Self {
        if self.embeddings.provider != EmbeddingProvider::Hashing {
            self.embeddings.provider = EmbeddingProvider::Hashing;
            self.embeddings.dimensions = None;
        }
        self.generation.provider = GenerationProvider::Template;
        self.generation.model = None;
        self
    }
}

/// Read a required API key from the environment, naming the variable on failure.
pub fn require_api_key(var: &str) -> crate::error::Result<String> {
    std::env::var(var).map_err(|_| {
        crate::error::KgragError::Config(format!(
            "Environment variable {} not set. Set it in your .env file or as an environment variable.",
            var
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const FULL_CONFIG: &str = r#"
[experiment]
output_dir = "out"
log_level = "debug"

[embeddings]
provider = "openai"
model = "text-embedding-3-small"
api_key_env = "OPENAI_API_KEY"
batch_size = 100

[generation]
provider = "anthropic"
temperature = 0.2
max_tokens = 300

[retrieval]
top_k = 4

[graph]
max_entities = 3
mitigation_max_depth = 2

[fusion]
aggregation = "top1"
graph_weight = 0.5
entity_saturation = 3
"#;

    fn with_config_env(config_path: &Path, f: impl FnOnce()) {
        let original = std::env::var("KGRAG_CONFIG").ok();
        std::env::set_var("KGRAG_CONFIG", config_path);
        f();
        std::env::remove_var("KGRAG_CONFIG");
        if let Some(val) = original {
            std::env::set_var("KGRAG_CONFIG", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, FULL_CONFIG).unwrap();
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.experiment.log_level, "debug");
            assert_eq!(config.embeddings.provider, EmbeddingProvider::OpenAI);
            assert_eq!(config.embeddings.dimensions(), 1536);
            assert_eq!(config.generation.provider, GenerationProvider::Anthropic);
            assert_eq!(config.generation.model(), "claude-3-haiku-20240307");
            assert_eq!(config.generation.api_key_env(), "ANTHROPIC_API_KEY");
            assert_eq!(config.retrieval.top_k, 4);
            assert_eq!(config.graph.max_entities, 3);
            assert_eq!(config.graph.related_depth, 1);
            assert_eq!(config.fusion.aggregation, ScoreAggregation::Top1);
        });
    }

    #[test]
    fn test_config_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.graph.max_entities, 5);
        assert_eq!(config.embeddings.provider, EmbeddingProvider::Hashing);
        assert_eq!(config.generation.provider, GenerationProvider::Template);
        assert_eq!(config.experiment.output_dir, PathBuf::from("results"));
    }

    #[test]
    fn test_example_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.toml");
        let config = Config::from_path(&path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.fusion.aggregation, ScoreAggregation::Mean);
        assert_eq!(config.embeddings.dimensions(), 384);
    }

    #[test]
    fn test_config_rejects_out_of_range() {
        let config: Config = toml::from_str("[fusion]\ngraph_weight = 1.5\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("graph_weight"));

        let config: Config = toml::from_str("[retrieval]\ntop_k = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[fusion]\nentity_saturation = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_unknown_provider_fails_parse() {
        let result: std::result::Result<Config, _> =
            toml::from_str("[generation]\nprovider = \"cohere\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        with_config_env(Path::new("nonexistent.toml"), || {
            assert!(Config::load().is_err());
        });
    }

    #[test]
    fn test_into_demo_is_offline() {
        let config: Config = toml::from_str(FULL_CONFIG).unwrap();
        let demo = config.into_demo();
        assert_eq!(demo.embeddings.provider, EmbeddingProvider::Hashing);
        assert_eq!(demo.embeddings.dimensions(), 384);
        assert_eq!(demo.generation.provider, GenerationProvider::Template);
    }

    #[test]
    fn test_require_api_key_names_variable() {
        let err = require_api_key("KGRAG_TEST_DEFINITELY_UNSET_KEY").unwrap_err();
        assert!(err.to_string().contains("KGRAG_TEST_DEFINITELY_UNSET_KEY"));
    }
}
