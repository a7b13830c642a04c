use crate::providers::{AnthropicProvider, GoogleProvider, OllamaProvider, OpenAICompatibleProvider};
use crate::{ChatProvider, Error, ProviderConfig};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;

/// Built-in providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Ollama,
    OpenAI,
    Anthropic,
    Google,
    DeepSeek,
}

impl ProviderKind {
    /// Every built-in provider, in registration order.
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Ollama,
        ProviderKind::OpenAI,
        ProviderKind::Anthropic,
        ProviderKind::Google,
        ProviderKind::DeepSeek,
    ];

    /// Registry name.
    pub const fn name(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::DeepSeek => "deepseek",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "Ollama (Local)",
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::Anthropic => "Anthropic Claude",
            ProviderKind::Google => "Google Gemini",
            ProviderKind::DeepSeek => "DeepSeek",
        }
    }

    pub const fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "llama3.2:latest",
            ProviderKind::OpenAI => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-sonnet-20241022",
            ProviderKind::Google => "gemini-2.0-flash-exp",
            ProviderKind::DeepSeek => "deepseek-chat",
        }
    }

    pub const fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "http://localhost:11434",
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    pub const fn requires_api_key(self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }

    /// Models reported when no live listing is available.
    pub const fn static_models(self) -> &'static [&'static str] {
        match self {
            ProviderKind::Ollama | ProviderKind::OpenAI => &[],
            ProviderKind::Anthropic => &[
                "claude-3-5-sonnet-20241022",
                "claude-3-5-haiku-20241022",
                "claude-3-opus-20240229",
                "claude-3-sonnet-20240229",
                "claude-3-haiku-20240307",
            ],
            ProviderKind::Google => &[
                "gemini-2.0-flash-exp",
                "gemini-1.5-pro",
                "gemini-1.5-flash",
                "gemini-1.5-flash-8b",
            ],
            ProviderKind::DeepSeek => &["deepseek-chat", "deepseek-coder"],
        }
    }

    /// Look up a built-in provider by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Construct this provider.
    pub fn create(self, config: &ProviderConfig) -> Result<Box<dyn ChatProvider>, Error> {
        let provider: Box<dyn ChatProvider> = match self {
            ProviderKind::Ollama => Box::new(OllamaProvider::new(config)?),
            ProviderKind::OpenAI => Box::new(OpenAICompatibleProvider::openai(config)?),
            ProviderKind::Anthropic => Box::new(AnthropicProvider::new(config)?),
            ProviderKind::Google => Box::new(GoogleProvider::new(config)?),
            ProviderKind::DeepSeek => Box::new(OpenAICompatibleProvider::deepseek(config)?),
        };
        Ok(provider)
    }
}

/// Builds a provider from its configuration.
pub type ProviderConstructor = fn(&ProviderConfig) -> Result<Box<dyn ChatProvider>, Error>;

/// Static description of a registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub display_name: String,
    pub requires_api_key: bool,
    pub supports_streaming: bool,
    /// `None` when the provider could not be constructed for inspection.
    pub default_model: Option<String>,
}

impl ProviderInfo {
    fn from_provider(name: &str, provider: &dyn ChatProvider) -> Self {
        Self {
            name: name.to_string(),
            display_name: provider.display_name().to_string(),
            requires_api_key: provider.requires_api_key(),
            supports_streaming: provider.supports_streaming(),
            default_model: Some(provider.model().to_string()),
        }
    }

    /// Description derived from the name alone.
    fn fallback(name: &str) -> Self {
        let mut chars = name.chars();
        let display_name = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Self {
            name: name.to_string(),
            display_name,
            requires_api_key: true,
            supports_streaming: true,
            default_model: None,
        }
    }
}

#[derive(Clone)]
struct Registration {
    name: String,
    constructor: ProviderConstructor,
}

/// Name to constructor table.
///
/// Names are matched case-insensitively and kept in registration order.
#[derive(Clone)]
pub struct ProviderRegistry {
    entries: Vec<Registration>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    /// A registry with no providers.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A registry holding the five built-in providers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("ollama", |c| ProviderKind::Ollama.create(c));
        registry.register("openai", |c| ProviderKind::OpenAI.create(c));
        registry.register("anthropic", |c| ProviderKind::Anthropic.create(c));
        registry.register("google", |c| ProviderKind::Google.create(c));
        registry.register("deepseek", |c| ProviderKind::DeepSeek.create(c));
        registry
    }

    /// Register a provider, replacing any registration with the same name.
    pub fn register(&mut self, name: &str, constructor: ProviderConstructor) {
        let name = name.trim().to_lowercase();
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.constructor = constructor,
            None => self.entries.push(Registration { name, constructor }),
        }
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    fn lookup(&self, name: &str) -> Result<ProviderConstructor, Error> {
        let wanted = name.trim().to_lowercase();
        self.entries
            .iter()
            .find(|entry| entry.name == wanted)
            .map(|entry| entry.constructor)
            .ok_or_else(|| Error::UnknownProvider {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// Construct the named provider.
    pub fn create(&self, name: &str, config: &ProviderConfig) -> Result<Box<dyn ChatProvider>, Error> {
        let constructor = self.lookup(name)?;
        constructor(config)
    }

    /// Construct the named provider without any I/O and describe it.
    pub fn validate(&self, name: &str, config: &ProviderConfig) -> Result<ProviderInfo, Error> {
        let provider = self.create(name, config)?;
        Ok(ProviderInfo::from_provider(&name.trim().to_lowercase(), provider.as_ref()))
    }

    /// Describe every registered provider without network access.
    ///
    /// Each provider is built once with placeholder credentials and thrown
    /// away; one that still fails to build is described from its name.
    pub fn describe_all(&self) -> Vec<ProviderInfo> {
        let placeholder = ProviderConfig::new("").with_api_key("placeholder");
        self.entries
            .iter()
            .map(|entry| match (entry.constructor)(&placeholder) {
                Ok(provider) => ProviderInfo::from_provider(&entry.name, provider.as_ref()),
                Err(error) => {
                    tracing::debug!(provider = %entry.name, error = %error, "describing provider from its name");
                    ProviderInfo::fallback(&entry.name)
                }
            })
            .collect()
    }
}

static REGISTRY: Lazy<RwLock<ProviderRegistry>> =
    Lazy::new(|| RwLock::new(ProviderRegistry::with_builtins()));

/// Process-wide provider registry.
///
/// Registration is meant for startup; lookups take a read lock only long
/// enough to copy a constructor out.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider by name.
    pub fn create(name: &str, config: &ProviderConfig) -> Result<Box<dyn ChatProvider>, Error> {
        let constructor = REGISTRY.read().lookup(name)?;
        constructor(config)
    }

    /// Create a provider from environment variables.
    pub fn from_env() -> Result<Box<dyn ChatProvider>, Error> {
        let (name, config) = ProviderConfig::from_env()?;
        Self::create(&name, &config)
    }

    /// Register a provider type, replacing any with the same name.
    pub fn register(name: &str, constructor: ProviderConstructor) {
        REGISTRY.write().register(name, constructor);
    }

    pub fn provider_names() -> Vec<String> {
        REGISTRY.read().names()
    }

    pub fn validate(name: &str, config: &ProviderConfig) -> Result<ProviderInfo, Error> {
        let constructor = REGISTRY.read().lookup(name)?;
        let provider = constructor(config)?;
        Ok(ProviderInfo::from_provider(&name.trim().to_lowercase(), provider.as_ref()))
    }

    pub fn describe_all() -> Vec<ProviderInfo> {
        let registry = REGISTRY.read().clone();
        registry.describe_all()
    }
}
