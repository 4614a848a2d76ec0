use triage_core::AgentMemory;

/// Formats selected memories for inclusion in a task prompt.
///
/// One `- [id] claim` bullet per memory, followed by indented Keep/Problem/Try notes
/// when the memory carries them. Empty input renders as an empty string.
pub fn render_memories(memories: &[AgentMemory]) -> String {
    let mut out = String::new();
    for memory in memories {
        out.push_str(&format!("- [{}] {}\n", memory.id, memory.claim.trim()));

        let notes = [
            ("Keep", &memory.successes),
            ("Problem", &memory.problems),
            ("Try", &memory.improvements),
        ];
        for (label, note) in notes {
            if let Some(text) = note.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                out.push_str(&format!("  {}: {}\n", label, text));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_claims() {
        let memories = vec![
            AgentMemory::new("slack", "q", "Search #sec-alerts first").with_id("m1"),
            AgentMemory::new("slack", "q", "  DMs are not indexed \n").with_id("m2"),
        ];
        assert_eq!(
            render_memories(&memories),
            "- [m1] Search #sec-alerts first\n- [m2] DMs are not indexed\n"
        );
    }

    #[test]
    fn test_render_kpt_notes() {
        let memory = AgentMemory::new("bigquery", "q", "auth_logs lags").with_id("m").with_kpt(
            Some("partition filter".into()),
            Some("   ".into()),
            Some("query the raw table".into()),
        );
        let rendered = render_memories(&[memory]);
        assert!(rendered.contains("  Keep: partition filter\n"));
        assert!(!rendered.contains("Problem"));
        assert!(rendered.contains("  Try: query the raw table\n"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_memories(&[]), "");
    }
}
