//! Prompt and sentinel detection (§4.B).

/// Characters a NOS prompt ends with, outside of config mode and inside it respectively.
const PROMPT_CHARS: [char; 2] = ['#', '>'];

/// Returns `true` iff `chunk`, once trimmed of trailing whitespace, ends with a prompt character.
pub fn ends_with_prompt(chunk: &str) -> bool {
    chunk
        .trim_end()
        .chars()
        .next_back()
        .is_some_and(|c| PROMPT_CHARS.contains(&c))
}

/// Returns `true` iff `chunk` contains the XML collection sentinel.
pub fn contains_xml_sentinel(chunk: &str) -> bool {
    chunk.contains(device_api::constants::XML_CLOSING_TAG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_operational_and_config_prompts() {
        assert!(ends_with_prompt("LEAF-A# "));
        assert!(ends_with_prompt("LEAF-A(config)# "));
        assert!(ends_with_prompt("some-device> "));
        assert!(!ends_with_prompt("show lldp neighbors"));
    }

    #[test]
    fn detects_xml_sentinel() {
        assert!(contains_xml_sentinel("<config><a/></config>\nLEAF-A# "));
        assert!(!contains_xml_sentinel("<config><a/>"));
    }
}
