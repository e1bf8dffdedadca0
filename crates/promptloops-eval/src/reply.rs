/// Locate the JSON object in a model reply.
///
/// Markdown code fences are skipped; the span runs from the first `{` to the
/// last `}` so surrounding chatter is ignored.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let body = strip_code_fence(reply);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}

fn strip_code_fence(reply: &str) -> &str {
    let Some(open) = reply.find("```") else {
        return reply;
    };
    let after_open = &reply[open + 3..];
    // skip the language tag
    let body_start = after_open.find('\n').map(|p| p + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        assert_eq!(extract_json_object(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_object_inside_chatter() {
        let reply = "Sure! Here it is: {\"name\": \"Ada\", \"nested\": {\"x\": 1}} Hope that helps.";
        assert_eq!(
            extract_json_object(reply),
            Some("{\"name\": \"Ada\", \"nested\": {\"x\": 1}}")
        );
    }

    #[test]
    fn test_fenced_object() {
        let reply = "Result:\n```json\n{\"email\": \"a@b.c\"}\n```\nThe {braces} after the fence are ignored.";
        assert_eq!(extract_json_object(reply), Some("{\"email\": \"a@b.c\"}"));
    }

    #[test]
    fn test_no_object() {
        assert_eq!(extract_json_object("nothing here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
