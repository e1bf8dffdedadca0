use promptloops_eval::extract_json_object;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// A revised prompt proposed by the mentor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptProposal {
    /// Complete prompt for the next iteration
    pub prompt: String,
    /// Mentor's explanation of the change
    #[serde(default)]
    pub reasoning: String,
    /// Per-field guidance layered onto the field list the agent sees
    #[serde(default)]
    pub field_descriptions: BTreeMap<String, String>,
}

#[derive(Error, Debug)]
pub enum ProposalParseError {
    #[error("No proposal found in mentor output")]
    NoProposalFound,

    #[error("Mentor proposed an empty prompt")]
    EmptyPrompt,

    #[error("Failed to parse proposal JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Invalid proposal format: {0}")]
    InvalidFormat(String),
}

impl PromptProposal {
    /// Parse a proposal from the mentor's reply
    ///
    /// Expected format:
    /// ```text
    /// <proposal>
    /// {"prompt": "...", "reasoning": "...", "field_descriptions": {"email": "..."}}
    /// </proposal>
    /// ```
    /// A bare JSON object with a `prompt` key is also accepted, and as a last
    /// resort the text between `<prompt>` and `</prompt>`.
    pub fn parse(mentor_output: &str) -> Result<Self, ProposalParseError> {
        debug!(output_len = mentor_output.len(), "Parsing mentor proposal");

        let proposal = match Self::parse_proposal_block(mentor_output)? {
            Some(proposal) => proposal,
            None => Self::parse_bare_json(mentor_output)
                .or_else(|| Self::parse_prompt_tags(mentor_output))
                .ok_or(ProposalParseError::NoProposalFound)?,
        };

        if proposal.prompt.trim().is_empty() {
            return Err(ProposalParseError::EmptyPrompt);
        }
        Ok(proposal)
    }

    fn parse_proposal_block(output: &str) -> Result<Option<Self>, ProposalParseError> {
        let start = output.find("<proposal>");
        let end = output.rfind("</proposal>");

        match (start, end) {
            (Some(start), Some(end)) if start < end => {
                let block = &output[start + "<proposal>".len()..end];
                let json_str = extract_json_object(block).ok_or_else(|| {
                    ProposalParseError::InvalidFormat("Proposal block holds no JSON object".into())
                })?;
                debug!(json = json_str, "Found proposal block");
                Ok(Some(serde_json::from_str(json_str)?))
            }
            (Some(_), Some(_)) => Err(ProposalParseError::InvalidFormat(
                "Malformed proposal block".to_string(),
            )),
            _ => Ok(None),
        }
    }

    fn parse_bare_json(output: &str) -> Option<Self> {
        let json_str = extract_json_object(output)?;
        let proposal = serde_json::from_str::<Self>(json_str).ok()?;
        debug!("Parsed proposal from bare JSON");
        Some(proposal)
    }

    fn parse_prompt_tags(output: &str) -> Option<Self> {
        let start = output.find("<prompt>")? + "<prompt>".len();
        let end = output.rfind("</prompt>")?;
        if start > end {
            return None;
        }
        debug!("Parsed proposal from prompt tags");
        Some(Self {
            prompt: output[start..end].trim().to_string(),
            reasoning: String::new(),
            field_descriptions: BTreeMap::new(),
        })
    }

    /// Short description for logging
    pub fn short_description(&self) -> String {
        if self.field_descriptions.is_empty() {
            format!("{} chars", self.prompt.chars().count())
        } else {
            format!(
                "{} chars, {} field notes",
                self.prompt.chars().count(),
                self.field_descriptions.len()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proposal_block() {
        let output = r#"
The agent keeps missing emails written with " at " instead of "@".

<proposal>
{"prompt": "Extract contact details. Emails may be obfuscated.", "reasoning": "Obfuscated emails were missed", "field_descriptions": {"email": "Normalize 'at' to '@'"}}
</proposal>
"#;

        let proposal = PromptProposal::parse(output).unwrap();
        assert_eq!(proposal.prompt, "Extract contact details. Emails may be obfuscated.");
        assert_eq!(proposal.reasoning, "Obfuscated emails were missed");
        assert_eq!(
            proposal.field_descriptions.get("email").map(String::as_str),
            Some("Normalize 'at' to '@'")
        );
    }

    #[test]
    fn test_parse_fenced_proposal_block() {
        let output = "<proposal>\n```json\n{\"prompt\": \"P2\"}\n```\n</proposal>";
        let proposal = PromptProposal::parse(output).unwrap();
        assert_eq!(proposal.prompt, "P2");
        assert!(proposal.reasoning.is_empty());
        assert!(proposal.field_descriptions.is_empty());
    }

    #[test]
    fn test_parse_bare_json() {
        let output = r#"Here you go: {"prompt": "Better prompt", "reasoning": "why"}"#;
        let proposal = PromptProposal::parse(output).unwrap();
        assert_eq!(proposal.prompt, "Better prompt");
    }

    #[test]
    fn test_parse_prompt_tags() {
        let output = "Analysis...\n<prompt>\nExtract every field carefully.\n</prompt>";
        let proposal = PromptProposal::parse(output).unwrap();
        assert_eq!(proposal.prompt, "Extract every field carefully.");
    }

    #[test]
    fn test_malformed_block_json_is_an_error() {
        let output = "<proposal>{\"prompt\": }</proposal>";
        assert!(matches!(
            PromptProposal::parse(output),
            Err(ProposalParseError::JsonParseError(_))
        ));
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let output = r#"<proposal>{"prompt": "   ", "reasoning": "nothing to change"}</proposal>"#;
        assert!(matches!(
            PromptProposal::parse(output),
            Err(ProposalParseError::EmptyPrompt)
        ));
    }

    #[test]
    fn test_parse_no_proposal() {
        let output = "I think the prompt is fine as it is.";
        assert!(matches!(
            PromptProposal::parse(output),
            Err(ProposalParseError::NoProposalFound)
        ));
    }
}
