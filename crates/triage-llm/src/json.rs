/// Extract the JSON object from an LLM response that may wrap it in markdown or prose.
pub fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed;
    }

    if let Some(start) = trimmed.find("```json") {
        let body = &trimmed[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_ticks = &trimmed[start + 3..];
        if let Some(end) = after_ticks.find("```") {
            let block = &after_ticks[..end];
            return match block.find('\n') {
                Some(newline) => block[newline..].trim(),
                None => block.trim(),
            };
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return &trimmed[start..=end];
        }
    }

    trimmed
}
