use std::collections::HashMap;
use std::sync::Arc;

use triage_core::{LLMError, LLMProvider};

/// Named LLM providers. Grading and reflection can each be routed to their own alias
/// and fall back to the default alias when unset.
#[derive(Clone)]
pub struct LLMRegistry {
    providers: HashMap<String, Arc<dyn LLMProvider>>,
    default_alias: String,
    grader_alias: Option<String>,
    reflection_alias: Option<String>,
}

impl std::fmt::Debug for LLMRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut aliases = self.aliases();
        aliases.sort();
        f.debug_struct("LLMRegistry")
            .field("providers", &aliases)
            .field("default_alias", &self.default_alias)
            .field("grader_alias", &self.grader_alias)
            .field("reflection_alias", &self.reflection_alias)
            .finish()
    }
}

impl LLMRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default_alias: "default".to_string(),
            grader_alias: None,
            reflection_alias: None,
        }
    }

    /// Registry holding one provider under the default alias.
    pub fn single(provider: Arc<dyn LLMProvider>) -> Self {
        let mut registry = Self::new();
        registry.register("default", provider);
        registry
    }

    pub fn register(&mut self, alias: impl Into<String>, provider: Arc<dyn LLMProvider>) {
        self.providers.insert(alias.into(), provider);
    }

    pub fn set_default(&mut self, alias: impl Into<String>) {
        self.default_alias = alias.into();
    }

    pub fn set_grader(&mut self, alias: impl Into<String>) {
        self.grader_alias = Some(alias.into());
    }

    pub fn set_reflection(&mut self, alias: impl Into<String>) {
        self.reflection_alias = Some(alias.into());
    }

    pub fn get(&self, alias: &str) -> Result<Arc<dyn LLMProvider>, LLMError> {
        self.providers
            .get(alias)
            .cloned()
            .ok_or_else(|| LLMError::Config(format!("LLM alias not found: {}", alias)))
    }

    pub fn default_provider(&self) -> Result<Arc<dyn LLMProvider>, LLMError> {
        self.get(&self.default_alias)
    }

    /// Provider used to grade memories.
    pub fn grader(&self) -> Result<Arc<dyn LLMProvider>, LLMError> {
        match &self.grader_alias {
            Some(alias) => self.get(alias),
            None => self.default_provider(),
        }
    }

    /// Provider used to reflect on finished tasks.
    pub fn reflection(&self) -> Result<Arc<dyn LLMProvider>, LLMError> {
        match &self.reflection_alias {
            Some(alias) => self.get(alias),
            None => self.default_provider(),
        }
    }

    pub fn has(&self, alias: &str) -> bool {
        self.providers.contains_key(alias)
    }

    pub fn aliases(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for LLMRegistry {
    fn default() -> Self {
        Self::new()
    }
}
