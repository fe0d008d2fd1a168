//! Scene prompt extraction from a creative brief.
//!
//! The model is asked for a bracketed JSON list; its free-text answer goes
//! through a strict parse-then-fallback chain so scene extraction never fails
//! the storyboard step outright.

use std::sync::LazyLock;

use regex::Regex;

/// Deterministic placeholder set used when nothing can be parsed out of the
/// model's response.
pub const PLACEHOLDER_SCENES: [&str; 3] = [
    "Cinematic establishing shot with dramatic lighting, 16:9 aspect ratio, professional cinematography",
    "Medium shot with compelling composition, cinematic depth of field, 16:9 aspect ratio",
    "Close-up shot with emotional impact, professional lighting, 16:9 aspect ratio",
];

/// Most scenes we will accept from a free-text fallback parse.
const MAX_SCENES: usize = 5;

static BRACKETED_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[(.*?)\]").expect("valid scene list regex"));

/// Prompt asking the text adapter to extract 3-5 scene prompts from a brief.
pub fn extraction_prompt(brief: &str) -> String {
    format!(
        "Extract 3-5 key scenes from this creative brief and format them as detailed image \
         generation prompts for cinematic storyboard frames.\n\n\
         Creative Brief:\n{}\n\n\
         Return ONLY a JSON array of scene prompts, each optimized for image generation with \
         cinematic, 16:9 aspect ratio specifications. Each prompt should be detailed and vivid \
         for high-quality storyboard visualization.\n\n\
         Format: [\"detailed scene 1 prompt with cinematic style, 16:9 aspect ratio\", \
         \"detailed scene 2 prompt...\", ...]",
        brief
    )
}

/// Parse a bracketed JSON array of strings out of a free-text response.
fn parse_bracketed_list(response: &str) -> Option<Vec<String>> {
    let captures = BRACKETED_LIST.captures(response)?;
    let inner = captures.get(1)?.as_str();
    let scenes: Vec<String> = serde_json::from_str(&format!("[{}]", inner)).ok()?;
    if scenes.iter().all(|s| !s.trim().is_empty()) && !scenes.is_empty() {
        Some(scenes)
    } else {
        None
    }
}

/// Line-split fallback: non-empty, non-heading lines, at most five.
fn split_lines(response: &str) -> Vec<String> {
    response
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .take(MAX_SCENES)
        .map(|line| line.to_string())
        .collect()
}

/// Turn a model response into scene prompts. Never returns an empty list.
pub fn scenes_from_response(response: &str) -> Vec<String> {
    if let Some(scenes) = parse_bracketed_list(response) {
        return scenes;
    }
    let lines = split_lines(response);
    if !lines.is_empty() {
        return lines;
    }
    PLACEHOLDER_SCENES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_array() {
        let response = r#"["wide ocean shot, 16:9", "diver close-up, 16:9", "coral reef, 16:9"]"#;
        let scenes = scenes_from_response(response);
        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[0], "wide ocean shot, 16:9");
    }

    #[test]
    fn parses_array_embedded_in_prose() {
        let response = "Here are your scenes:\n[\"scene one\", \"scene two\"]\nEnjoy!";
        let scenes = scenes_from_response(response);
        assert_eq!(scenes, vec!["scene one", "scene two"]);
    }

    #[test]
    fn falls_back_to_line_split_when_json_is_broken() {
        let response = "# Scenes\nA sweeping aerial of the coastline\nA fisherman mending nets\n";
        let scenes = scenes_from_response(response);
        assert_eq!(
            scenes,
            vec![
                "A sweeping aerial of the coastline",
                "A fisherman mending nets"
            ]
        );
    }

    #[test]
    fn line_fallback_caps_at_five() {
        let response = (1..=8)
            .map(|i| format!("scene {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(scenes_from_response(&response).len(), 5);
    }

    #[test]
    fn empty_response_yields_placeholder_set() {
        let scenes = scenes_from_response("   \n# only a heading\n");
        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[0], PLACEHOLDER_SCENES[0]);
    }

    #[test]
    fn array_of_non_strings_falls_through() {
        // `[1, 2, 3]` matches the bracket regex but is not a string list.
        let response = "ratios: [1, 2, 3]\nA harbor at dawn";
        let scenes = scenes_from_response(response);
        assert!(scenes.iter().any(|s| s.contains("harbor")));
    }

    #[test]
    fn extraction_prompt_embeds_brief() {
        let prompt = extraction_prompt("Save the oceans");
        assert!(prompt.contains("Save the oceans"));
        assert!(prompt.contains("JSON array"));
    }
}
