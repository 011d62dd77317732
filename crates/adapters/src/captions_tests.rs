// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn segments() -> Vec<Segment> {
    vec![
        Segment {
            start: 0.0,
            end: 2.5,
            text: "hello world".to_string(),
        },
        Segment {
            start: 2.5,
            end: 5.0,
            text: "this is a much longer line that should wrap across more than one cue because it exceeds the line width".to_string(),
        },
    ]
}

#[test]
fn parse_recognizes_all_six_formats() {
    assert_eq!(CaptionFormat::parse("vtt"), Some(CaptionFormat::Vtt));
    assert_eq!(CaptionFormat::parse("srt"), Some(CaptionFormat::Srt));
    assert_eq!(CaptionFormat::parse("txt"), Some(CaptionFormat::Txt));
    assert_eq!(CaptionFormat::parse("csv"), Some(CaptionFormat::Csv));
    assert_eq!(CaptionFormat::parse("tsv"), Some(CaptionFormat::Tsv));
    assert_eq!(CaptionFormat::parse("json"), Some(CaptionFormat::Json));
    assert_eq!(CaptionFormat::parse("mp4"), None);
}

#[test]
fn vtt_starts_with_webvtt_header_and_arrow_timestamps() {
    let out = render(CaptionFormat::Vtt, &segments()).unwrap();
    assert!(out.starts_with("WEBVTT\n\n"));
    assert!(out.contains("00:00:00.000 --> 00:00:02.500"));
}

#[test]
fn srt_uses_comma_decimal_and_numbered_cues() {
    let out = render(CaptionFormat::Srt, &segments()).unwrap();
    assert!(out.starts_with("1\n"));
    assert!(out.contains("00:00:00,000 --> 00:00:02,500"));
}

#[test]
fn txt_is_one_line_per_segment_no_timestamps() {
    let out = render(CaptionFormat::Txt, &segments()).unwrap();
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "hello world");
    assert!(!out.contains("-->"));
}

#[test]
fn csv_and_tsv_use_distinct_separators() {
    let csv = render(CaptionFormat::Csv, &segments()).unwrap();
    let tsv = render(CaptionFormat::Tsv, &segments()).unwrap();
    assert!(csv.lines().next().unwrap().contains(','));
    assert!(tsv.lines().next().unwrap().contains('\t'));
    assert_ne!(csv, tsv);
}

#[test]
fn json_round_trips_segment_count() {
    let out = render(CaptionFormat::Json, &segments()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["segments"].as_array().unwrap().len(), 2);
}

#[test]
fn long_segment_splits_into_multiple_cues_under_max_line_width() {
    let long = Segment {
        start: 0.0,
        end: 10.0,
        text: segments()[1].text.clone(),
    };
    let cues = segment_to_cues(&long);
    assert!(cues.len() > 1);
    for cue in &cues {
        for line in &cue.lines {
            assert!(line.len() <= MAX_LINE_WIDTH);
        }
        assert!(cue.lines.len() <= MAX_LINE_COUNT);
    }
    assert_eq!(cues.first().unwrap().start, 0.0);
    assert_eq!(cues.last().unwrap().end, 10.0);
}

#[test]
fn parse_segments_accepts_bare_array_and_wrapped_object() {
    let bare = serde_json::json!([{"start": 0.0, "end": 1.0, "text": "hi"}]);
    assert_eq!(parse_segments(&bare).unwrap().len(), 1);

    let wrapped = serde_json::json!({"segments": [{"start": 0.0, "end": 1.0, "text": "hi"}]});
    assert_eq!(parse_segments(&wrapped).unwrap().len(), 1);
}
