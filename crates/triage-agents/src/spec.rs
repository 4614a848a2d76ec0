//! YAML wiring for a memory service

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use triage_core::{Embedder, LLMConfig, LLMProvider, Result};
use triage_llm::{LLMFeedbackGrader, LLMReflectionGenerator, LLMRegistry};
use triage_memory::{MemoryConfig, MemoryService};
use triage_storage::{StorageConfig, create_repository};

/// ```yaml
/// memory:
///   embedding_dimension: 256
///   selection:
///     top_k: 5
/// storage:
///   type: file
///   path: ./memories
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySpec {
    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Model settings for grading and reflection calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LLMConfig>,

    /// Registry alias for grading calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grader_llm: Option<String>,

    /// Registry alias for reflection calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection_llm: Option<String>,
}

impl MemorySpec {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let spec: MemorySpec = serde_yaml::from_str(yaml)?;
        spec.memory.validate()?;
        Ok(spec)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }
}

/// Builds a service whose grader and reflection generator both call `llm`.
///
/// `grader_llm` and `reflection_llm` are ignored; use
/// [`create_memory_service_with_registry`] to route them.
pub async fn create_memory_service(
    spec: &MemorySpec,
    llm: Arc<dyn LLMProvider>,
    embedder: Option<Arc<dyn Embedder>>,
) -> Result<MemoryService> {
    build_service(spec, Arc::clone(&llm), llm, embedder).await
}

/// Builds a service whose grader and reflection generator call the providers named by
/// `grader_llm` and `reflection_llm`, or the registry default.
pub async fn create_memory_service_with_registry(
    spec: &MemorySpec,
    registry: &LLMRegistry,
    embedder: Option<Arc<dyn Embedder>>,
) -> Result<MemoryService> {
    let mut registry = registry.clone();
    if let Some(alias) = &spec.grader_llm {
        registry.set_grader(alias.clone());
    }
    if let Some(alias) = &spec.reflection_llm {
        registry.set_reflection(alias.clone());
    }
    build_service(spec, registry.grader()?, registry.reflection()?, embedder).await
}

async fn build_service(
    spec: &MemorySpec,
    grader_llm: Arc<dyn LLMProvider>,
    reflection_llm: Arc<dyn LLMProvider>,
    embedder: Option<Arc<dyn Embedder>>,
) -> Result<MemoryService> {
    let repository = create_repository(&spec.storage, spec.memory.embedding_dimension).await?;

    let grader_name = grader_llm.provider_name().to_string();
    let reflection_name = reflection_llm.provider_name().to_string();
    let mut grader = LLMFeedbackGrader::new(grader_llm);
    let mut reflector = LLMReflectionGenerator::new(reflection_llm);
    if let Some(config) = &spec.llm {
        grader = grader.with_llm_config(config.clone());
        reflector = reflector.with_llm_config(config.clone());
    }

    let mut builder = MemoryService::builder(spec.memory.clone(), repository, Arc::new(grader))
        .with_reflection_generator(Arc::new(reflector));
    if let Some(embedder) = embedder {
        builder = builder.with_embedder(embedder);
    }
    let service = builder.build()?;

    info!(
        grader = %grader_name,
        reflection = %reflection_name,
        storage = ?spec.storage,
        "Memory service created"
    );
    Ok(service)
}
