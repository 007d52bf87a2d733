// src/transcript.rs
// Transcript segments and the nearest-start locator

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One line of the remote transcript. The service emits capitalized field
/// names (`Start`, `End`, `Text`); timestamps are `H:MM:SS` or `M:SS`
/// strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "Start")]
    pub start: String,
    #[serde(rename = "End")]
    pub end: String,
    #[serde(rename = "Text")]
    pub text: String,
}

#[derive(Debug, Error)]
#[error("Invalid timestamp '{0}'")]
pub struct TimestampError(String);

/// Parse `H:MM:SS` or `M:SS` into whole seconds.
pub fn parse_timestamp(raw: &str) -> Result<u64, TimestampError> {
    let fields = raw
        .trim()
        .split(':')
        .map(|field| field.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| TimestampError(raw.to_string()))?;

    match fields.as_slice() {
        [hours, minutes, seconds] => Ok(hours * 3600 + minutes * 60 + seconds),
        [minutes, seconds] => Ok(minutes * 60 + seconds),
        _ => Err(TimestampError(raw.to_string())),
    }
}

/// Ordered transcript for one video, immutable after construction. Start
/// timestamps are parsed once here so `locate` compares whole seconds.
#[derive(Debug, Clone)]
pub struct TranscriptIndex {
    segments: Vec<Segment>,
    starts: Vec<u64>,
}

impl TranscriptIndex {
    pub fn new(segments: Vec<Segment>) -> Result<Self, TimestampError> {
        let starts = segments
            .iter()
            .map(|segment| parse_timestamp(&segment.start))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments, starts })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Index of the segment whose start is nearest to `t`, ties going to
    /// the earlier segment. Only starts are compared; a position deep
    /// inside a long segment can still map to the next segment when its
    /// start is numerically closer. Returns `None` only on an empty index;
    /// a caller holding a non-empty index always gets a valid position,
    /// even for `t` before the first or after the last segment.
    pub fn locate(&self, t: u64) -> Option<usize> {
        let mut closest: Option<(usize, u64)> = None;
        for (index, &start) in self.starts.iter().enumerate() {
            let diff = start.abs_diff(t);
            match closest {
                Some((_, min)) if diff >= min => {}
                _ => closest = Some((index, diff)),
            }
        }
        closest.map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: &str) -> Segment {
        Segment {
            start: start.to_string(),
            end: start.to_string(),
            text: format!("line at {}", start),
        }
    }

    fn index(starts: &[&str]) -> TranscriptIndex {
        TranscriptIndex::new(starts.iter().map(|s| segment(s)).collect()).unwrap()
    }

    #[test]
    fn parses_minutes_and_seconds() {
        assert_eq!(parse_timestamp("0:00").unwrap(), 0);
        assert_eq!(parse_timestamp("2:05").unwrap(), 125);
        assert_eq!(parse_timestamp("1:02:03").unwrap(), 3723);
    }

    #[test]
    fn rejects_malformed_timestamps() {
        assert!(parse_timestamp("abc").is_err());
        assert!(parse_timestamp("1:2:3:4").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn locates_nearest_start() {
        let transcript = index(&["0:00", "0:10", "0:30"]);
        // distances 7 / 3 / 23
        assert_eq!(transcript.locate(7), Some(1));
    }

    #[test]
    fn tie_goes_to_the_earlier_segment() {
        let transcript = index(&["0:00", "0:10", "0:30"]);
        // t=20 is exactly midway between 10 and 30
        assert_eq!(transcript.locate(20), Some(1));
    }

    #[test]
    fn out_of_span_positions_still_locate() {
        let transcript = index(&["0:10", "0:30"]);
        assert_eq!(transcript.locate(0), Some(0));
        assert_eq!(transcript.locate(500), Some(1));
    }

    #[test]
    fn empty_index_locates_nothing() {
        let transcript = TranscriptIndex::new(Vec::new()).unwrap();
        assert_eq!(transcript.locate(5), None);
    }

    #[test]
    fn gap_bias_prefers_numerically_closer_start() {
        // Second segment spans 10..300; t=250 is inside it but closer to
        // the third segment's start.
        let transcript = index(&["0:00", "0:10", "5:00"]);
        assert_eq!(transcript.locate(250), Some(2));
    }
}
