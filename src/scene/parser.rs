use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::Scene;

/// Used when fewer visual descriptions were extracted than narration segments.
pub const DEFAULT_VISUAL_DESCRIPTION: &str = "a professional video scene";

/// Cleaned bullet lines shorter than this are treated as noise.
const MIN_CANDIDATE_CHARS: usize = 20;

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d{1,2}):(\d{2})\]").expect("valid timestamp regex"));

static TIMESTAMP_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\[(]?\d{1,2}:\d{2}\s*[-–—]\s*\d{1,2}:\d{2}[\])]?:?$")
        .expect("valid timestamp range regex")
});

static VISUAL_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(visuals|b-roll)\s*:\s*(.*)$").expect("valid visual label regex")
});

/// What to do with narration still buffered when the script ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingScene {
    /// Always emit it, falling back to the default description.
    #[default]
    Keep,
    /// Only emit it when a visual description exists at its index.
    RequireVisual,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub trailing: TrailingScene,
}

/// Split a script and its visual-scenes block into ordered scenes.
pub fn parse(script: &str, visual_scenes: &str) -> Vec<Scene> {
    parse_with(script, visual_scenes, ParseOptions::default())
}

pub fn parse_with(script: &str, visual_scenes: &str, options: ParseOptions) -> Vec<Scene> {
    let candidates = visual_candidates(visual_scenes);
    let segments = narration_segments(script, candidates.len(), options.trailing);

    let scenes: Vec<Scene> = segments
        .into_iter()
        .enumerate()
        .map(|(index, (timestamp, text))| {
            let visual = candidates
                .get(index)
                .cloned()
                .unwrap_or_else(|| DEFAULT_VISUAL_DESCRIPTION.to_string());
            Scene::new(index, timestamp, text, visual)
        })
        .collect();

    debug!(
        "Parsed {} scenes from {} visual candidates",
        scenes.len(),
        candidates.len()
    );
    scenes
}

/// Extract `Visuals:` / `B-roll:` bullet descriptions, in order.
pub(crate) fn visual_candidates(block: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    for raw in block.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let cleaned = strip_markup(line);
        if TIMESTAMP_RANGE.is_match(&cleaned) {
            continue;
        }
        if cleaned.chars().count() < MIN_CANDIDATE_CHARS {
            continue;
        }

        let Some(caps) = VISUAL_LABEL.captures(&cleaned) else {
            continue;
        };
        let description = caps[2].trim();
        if !description.is_empty() {
            candidates.push(description.to_string());
        }
    }

    candidates
}

/// Group narration lines by their opening `[MM:SS]` token.
fn narration_segments(
    script: &str,
    visual_count: usize,
    trailing: TrailingScene,
) -> Vec<(String, String)> {
    let mut segments = Vec::new();
    let mut current: Option<String> = None;
    let mut buffer = String::new();

    for raw in script.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(caps) = TIMESTAMP.captures(line) {
            if let Some(stamp) = current.take() {
                if !buffer.is_empty() {
                    segments.push((stamp, std::mem::take(&mut buffer)));
                }
            }
            buffer.clear();
            current = Some(format!("{:0>2}:{}", &caps[1], &caps[2]));

            let rest = TIMESTAMP.replace_all(line, "");
            append_narration(&mut buffer, &strip_markup(&rest));
        } else if current.is_some() {
            append_narration(&mut buffer, &strip_markup(line));
        } else {
            debug!("Skipping script preamble line: {}", line);
        }
    }

    if let Some(stamp) = current {
        if !buffer.is_empty() {
            let has_visual = segments.len() < visual_count;
            match trailing {
                TrailingScene::Keep => segments.push((stamp, buffer)),
                TrailingScene::RequireVisual if has_visual => segments.push((stamp, buffer)),
                TrailingScene::RequireVisual => {
                    debug!("Dropping trailing scene at {} without a visual", stamp);
                }
            }
        }
    }

    segments
}

fn append_narration(buffer: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if !buffer.is_empty() {
        buffer.push(' ');
    }
    buffer.push_str(text);
}

/// Remove bullet markers and bold markup around a line.
fn strip_markup(line: &str) -> String {
    line.trim()
        .trim_start_matches(['*', '-', '•'])
        .replace("**", "")
        .trim()
        .to_string()
}
