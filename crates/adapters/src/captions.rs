// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caption writers for the six formats the HTTP surface exposes. Segments
//! come from the engine's `whisper_result` tree; this module only renders,
//! it never calls the engine.

use serde::Deserialize;
use std::fmt::Write as _;

/// Maximum characters per rendered line.
const MAX_LINE_WIDTH: usize = 55;
/// Maximum lines per cue before a segment is split into more than one cue.
const MAX_LINE_COUNT: usize = 2;
/// Per-word highlighting (karaoke-style `<u>` spans) is not supported.
const HIGHLIGHT_WORDS: bool = false;

#[derive(Debug, Clone, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionFormat {
    Vtt,
    Srt,
    Txt,
    Csv,
    Tsv,
    Json,
}

impl CaptionFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vtt" => Some(Self::Vtt),
            "srt" => Some(Self::Srt),
            "txt" => Some(Self::Txt),
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("result tree is not a list of segments: {0}")]
    InvalidResult(#[from] serde_json::Error),
}

/// Parse the engine's opaque `whisper_result` value into segments.
pub fn parse_segments(result: &serde_json::Value) -> Result<Vec<Segment>, CaptionError> {
    #[derive(Deserialize)]
    struct Wrapper {
        segments: Vec<Segment>,
    }
    if let Some(segments) = result.get("segments") {
        Ok(serde_json::from_value(segments.clone())?)
    } else if result.is_array() {
        Ok(serde_json::from_value(result.clone())?)
    } else {
        let wrapper: Wrapper = serde_json::from_value(result.clone())?;
        Ok(wrapper.segments)
    }
}

/// Greedy word-wrap into lines no longer than [`MAX_LINE_WIDTH`], never
/// splitting a word.
fn wrap_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate_len = if current.is_empty() {
            word.len()
        } else {
            current.len() + 1 + word.len()
        };
        if candidate_len > MAX_LINE_WIDTH && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// One renderable cue: a time range plus up to [`MAX_LINE_COUNT`] lines.
struct Cue {
    start: f64,
    end: f64,
    lines: Vec<String>,
}

/// Split a segment's wrapped lines into cues of at most [`MAX_LINE_COUNT`]
/// lines each, distributing the segment's time range proportionally to the
/// character count each cue carries.
fn segment_to_cues(segment: &Segment) -> Vec<Cue> {
    let lines = wrap_lines(&segment.text);
    let groups: Vec<&[String]> = lines.chunks(MAX_LINE_COUNT).collect();
    let total_chars: usize = lines.iter().map(|l| l.len().max(1)).sum();
    let duration = (segment.end - segment.start).max(0.0);

    let mut cursor = segment.start;
    let mut cues = Vec::with_capacity(groups.len());
    for group in &groups {
        let group_chars: usize = group.iter().map(|l| l.len().max(1)).sum();
        let share = if total_chars == 0 {
            1.0 / groups.len() as f64
        } else {
            group_chars as f64 / total_chars as f64
        };
        let span = duration * share;
        let end = (cursor + span).min(segment.end);
        cues.push(Cue {
            start: cursor,
            end,
            lines: group.to_vec(),
        });
        cursor = end;
    }
    if let Some(last) = cues.last_mut() {
        last.end = segment.end;
    }
    cues
}

fn format_vtt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as i64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let s = total_secs % 60;
    let m = (total_secs / 60) % 60;
    let h = total_secs / 3600;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

fn format_srt_timestamp(seconds: f64) -> String {
    format_vtt_timestamp(seconds).replace('.', ",")
}

fn render_vtt(segments: &[Segment]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for segment in segments {
        for cue in segment_to_cues(segment) {
            let _ = writeln!(
                out,
                "{} --> {}",
                format_vtt_timestamp(cue.start),
                format_vtt_timestamp(cue.end)
            );
            out.push_str(&cue.lines.join("\n"));
            out.push_str("\n\n");
        }
    }
    out
}

fn render_srt(segments: &[Segment]) -> String {
    let mut out = String::new();
    let mut index = 1;
    for segment in segments {
        for cue in segment_to_cues(segment) {
            let _ = writeln!(out, "{index}");
            let _ = writeln!(
                out,
                "{} --> {}",
                format_srt_timestamp(cue.start),
                format_srt_timestamp(cue.end)
            );
            out.push_str(&cue.lines.join("\n"));
            out.push_str("\n\n");
            index += 1;
        }
    }
    out
}

fn render_txt(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_separated(segments: &[Segment], sep: char) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "start{sep}end{sep}text");
    for segment in segments {
        let text = segment.text.replace(sep, " ").replace('\n', " ");
        let _ = writeln!(
            out,
            "{}{sep}{}{sep}{}",
            (segment.start * 1000.0).round() as i64,
            (segment.end * 1000.0).round() as i64,
            text.trim()
        );
    }
    out
}

fn render_json(segments: &[Segment]) -> Result<String, CaptionError> {
    Ok(serde_json::to_string(&serde_json::json!({ "segments": segments }))?)
}

impl From<serde_json::Error> for CaptionError {
    fn from(e: serde_json::Error) -> Self {
        CaptionError::InvalidResult(e)
    }
}

/// Render `segments` in `format`. `highlight_words` is always off — no
/// writer here supports per-word emphasis.
pub fn render(format: CaptionFormat, segments: &[Segment]) -> Result<String, CaptionError> {
    debug_assert!(!HIGHLIGHT_WORDS);
    match format {
        CaptionFormat::Vtt => Ok(render_vtt(segments)),
        CaptionFormat::Srt => Ok(render_srt(segments)),
        CaptionFormat::Txt => Ok(render_txt(segments)),
        CaptionFormat::Csv => Ok(render_separated(segments, ',')),
        CaptionFormat::Tsv => Ok(render_separated(segments, '\t')),
        CaptionFormat::Json => render_json(segments),
    }
}

impl serde::Serialize for Segment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Segment", 3)?;
        state.serialize_field("start", &self.start)?;
        state.serialize_field("end", &self.end)?;
        state.serialize_field("text", &self.text)?;
        state.end()
    }
}

#[cfg(test)]
#[path = "captions_tests.rs"]
mod tests;
