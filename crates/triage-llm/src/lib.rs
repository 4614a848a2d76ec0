//! LLM-backed graders and reflection generators for the SOC triage agent memory

mod grader;
mod json;
mod mock;
mod prompts;
mod reflection;
mod registry;

pub use grader::LLMFeedbackGrader;
pub use json::extract_json;
pub use mock::{MockCall, MockLLMProvider};
pub use prompts::{FEEDBACK_GRADING_TEMPLATE, REFLECTION_TEMPLATE};
pub use reflection::LLMReflectionGenerator;
pub use registry::LLMRegistry;
