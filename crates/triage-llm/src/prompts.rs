use minijinja::{Environment, Value};

use triage_core::{AgentError, Result};

/// Grading template. Context: `query`, `claim`, `transcript`, `result`, `error`.
pub const FEEDBACK_GRADING_TEMPLATE: &str = r#"You are reviewing how a remembered insight influenced a security investigation task.

Task: {{ query }}

Remembered insight:
{{ claim }}

{% if transcript -%}
Execution transcript:
{{ transcript }}

{% endif -%}
{% if error -%}
The task failed with: {{ error }}
{%- else -%}
Task result:
{% if result %}{{ result }}{% else %}(no result){% endif %}
{%- endif %}

Grade the insight on three scales:
- relevance (0-3): how related it was to the task
- support (0-4): how much it helped reach the result
- impact (0-3): how much it changed the outcome

Respond in JSON format:
{"relevance": 0, "support": 0, "impact": 0}

IMPORTANT: Output ONLY valid JSON, no other text."#;

/// Reflection template. Context: `query`, `transcript`, `result`, `error`, `memories`.
pub const REFLECTION_TEMPLATE: &str = r#"You are summarizing lessons from a finished security investigation task.

Task: {{ query }}

{% if memories | length > 0 -%}
Insights that were provided to the task:
{% for m in memories -%}
- [{{ m.id }}] {{ m.claim }}
{% endfor %}
{% endif -%}
{% if transcript -%}
Execution transcript:
{{ transcript }}

{% endif -%}
{% if error -%}
The task failed with: {{ error }}
{%- else -%}
Task result:
{% if result %}{{ result }}{% else %}(no result){% endif %}
{%- endif %}

List new reusable insights for similar future tasks, and classify the provided insights
by their IDs as helpful or harmful. An ID may appear in at most one list.

Respond in JSON format:
{"claims": ["..."], "helpful_memories": ["id"], "harmful_memories": ["id"]}

IMPORTANT: Output ONLY valid JSON, no other text."#;

pub(crate) fn render(template: &str, ctx: Value) -> Result<String> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
    env.render_str(template, ctx)
        .map_err(|e| AgentError::Other(format!("Template rendering error: {}", e)))
}
