use serde::{Deserialize, Serialize};

use super::{parse_with, ParseOptions, Scene};

const SCRIPT_MARKER: &str = "SCRIPT";
const VISUAL_SCENES_MARKER: &str = "VISUAL SCENES";
const MUSIC_MARKER: &str = "MUSIC RECOMMENDATIONS";
const THUMBNAIL_MARKER: &str = "THUMBNAIL CONCEPT";

/// Long-form generated text split into its four marked sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub script: String,
    pub visual_scenes: String,
    pub music_recommendations: String,
    pub thumbnail_concept: String,
}

impl GeneratedContent {
    pub fn scenes(&self, options: ParseOptions) -> Vec<Scene> {
        parse_with(&self.script, &self.visual_scenes, options)
    }
}

/// Locate the section markers by exact substring search.
///
/// A section starts on the line after its marker and runs up to the start of
/// the line holding the next marker. Missing markers give empty sections.
pub fn split_sections(text: &str) -> GeneratedContent {
    let script = text.find(SCRIPT_MARKER);
    let visual = text.find(VISUAL_SCENES_MARKER);
    let music = text.find(MUSIC_MARKER);
    let thumbnail = text.find(THUMBNAIL_MARKER);

    let mut markers: Vec<usize> = [script, visual, music, thumbnail]
        .into_iter()
        .flatten()
        .collect();
    markers.sort_unstable();

    let section = |found: Option<usize>| -> String {
        let Some(start) = found else {
            return String::new();
        };
        let body_start = match text[start..].find('\n') {
            Some(offset) => start + offset + 1,
            None => text.len(),
        };
        let end = markers
            .iter()
            .copied()
            .find(|at| *at > start)
            .map(|at| line_start(text, at))
            .unwrap_or(text.len())
            .max(body_start);
        text[body_start..end].trim().to_string()
    };

    GeneratedContent {
        script: section(script),
        visual_scenes: section(visual),
        music_recommendations: section(music),
        thumbnail_concept: section(thumbnail),
    }
}

fn line_start(text: &str, at: usize) -> usize {
    text[..at].rfind('\n').map(|nl| nl + 1).unwrap_or(0)
}
