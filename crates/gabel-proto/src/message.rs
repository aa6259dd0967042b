//! Protocol messages exchanged between a worker and its coordinator.
//!
//! Every protocol line starts with the `@@` marker. A physical line may
//! carry arbitrary text before the marker (interleaved writes from the
//! worker's stdio); that prefix is discarded. Lines without a marker are
//! ordinary solver output.

use std::fmt;

use tracing::trace;

/// Marker introducing a protocol message on a physical line.
pub const MARKER: &str = "@@";

/// A parsed protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Worker has begun solving.
    Solving,
    /// Worker completed normally.
    Finished,
    /// Worker stopped early (e.g. solution cap).
    Partial,
    /// Start of one solution's text lines.
    SolutionStart,
    /// End of one solution's text lines.
    SolutionEnd,
    /// One rendered output line.
    Text(String),
    /// Elapsed solving time in seconds.
    Time(f64),
    /// Periodic liveness, seconds since start.
    Heartbeat(u64),
    /// Depth progress marker: depth `m+k`, running position count.
    Progress {
        /// Major depth component.
        m: u32,
        /// Minor depth component.
        k: u32,
        /// Positions examined at this depth.
        positions: u64,
    },
    /// Label of the combo currently being solved.
    Combo(String),
    /// Start of output for the 1-based problem index.
    ProblemStart(u32),
    /// End of output for the 1-based problem index.
    ProblemEnd(u32),
    /// Diagnostic text; dropped in production.
    Debug(String),
}

/// Classification of one physical line from a worker pipe.
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind<'a> {
    /// No protocol marker; ordinary solver output.
    Plain(&'a str),
    /// A protocol message. Any text before the marker is discarded.
    Protocol(Message),
    /// A marker with an unknown tag or malformed payload; to be dropped.
    Unrecognized,
}

/// Classify one framed line, locating the `@@` marker anywhere on it.
pub fn parse_line(line: &str) -> LineKind<'_> {
    let Some(pos) = line.find(MARKER) else {
        return LineKind::Plain(line);
    };
    match parse_tagged(&line[pos + MARKER.len()..]) {
        Some(message) => LineKind::Protocol(message),
        None => {
            trace!(line, "dropping unrecognized protocol line");
            LineKind::Unrecognized
        }
    }
}

fn parse_tagged(rest: &str) -> Option<Message> {
    match rest {
        "SOLVING" => return Some(Message::Solving),
        "FINISHED" => return Some(Message::Finished),
        "PARTIAL" => return Some(Message::Partial),
        "SOLUTION_START" => return Some(Message::SolutionStart),
        "SOLUTION_END" => return Some(Message::SolutionEnd),
        _ => {}
    }

    if let Some(text) = rest.strip_prefix("TEXT:") {
        Some(Message::Text(text.to_string()))
    } else if let Some(payload) = rest.strip_prefix("TIME:") {
        payload.parse().ok().map(Message::Time)
    } else if let Some(payload) = rest.strip_prefix("HEARTBEAT:") {
        payload.parse().ok().map(Message::Heartbeat)
    } else if let Some(payload) = rest.strip_prefix("PROGRESS:") {
        parse_progress(payload)
    } else if let Some(label) = rest.strip_prefix("COMBO:") {
        Some(Message::Combo(label.to_string()))
    } else if let Some(payload) = rest.strip_prefix("PROBLEM_START:") {
        payload.parse().ok().map(Message::ProblemStart)
    } else if let Some(payload) = rest.strip_prefix("PROBLEM_END:") {
        payload.parse().ok().map(Message::ProblemEnd)
    } else if let Some(text) = rest.strip_prefix("DEBUG:") {
        Some(Message::Debug(text.to_string()))
    } else {
        None
    }
}

/// Parse a `<m>+<k>:<positions>` progress payload.
fn parse_progress(payload: &str) -> Option<Message> {
    let (depth, positions) = payload.split_once(':')?;
    let (m, k) = depth.split_once('+')?;
    Some(Message::Progress {
        m: m.parse().ok()?,
        k: k.parse().ok()?,
        positions: positions.parse().ok()?,
    })
}

impl fmt::Display for Message {
    /// Exact wire rendering, without the trailing newline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Solving => write!(f, "@@SOLVING"),
            Message::Finished => write!(f, "@@FINISHED"),
            Message::Partial => write!(f, "@@PARTIAL"),
            Message::SolutionStart => write!(f, "@@SOLUTION_START"),
            Message::SolutionEnd => write!(f, "@@SOLUTION_END"),
            Message::Text(text) => write!(f, "@@TEXT:{text}"),
            Message::Time(seconds) => write!(f, "@@TIME:{seconds:.3}"),
            Message::Heartbeat(seconds) => write!(f, "@@HEARTBEAT:{seconds}"),
            Message::Progress { m, k, positions } => {
                write!(f, "@@PROGRESS:{m}+{k}:{positions}")
            }
            Message::Combo(label) => write!(f, "@@COMBO:{label}"),
            Message::ProblemStart(index) => write!(f, "@@PROBLEM_START:{index}"),
            Message::ProblemEnd(index) => write!(f, "@@PROBLEM_END:{index}"),
            Message::Debug(text) => write!(f, "@@DEBUG:{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_tags_render_exactly() {
        assert_eq!(Message::Solving.to_string(), "@@SOLVING");
        assert_eq!(Message::Finished.to_string(), "@@FINISHED");
        assert_eq!(Message::Partial.to_string(), "@@PARTIAL");
        assert_eq!(Message::SolutionStart.to_string(), "@@SOLUTION_START");
        assert_eq!(Message::SolutionEnd.to_string(), "@@SOLUTION_END");
    }

    #[test]
    fn payload_tags_render_exactly() {
        assert_eq!(Message::Text("  1.Kc2".into()).to_string(), "@@TEXT:  1.Kc2");
        assert_eq!(Message::Time(1.5).to_string(), "@@TIME:1.500");
        assert_eq!(Message::Heartbeat(30).to_string(), "@@HEARTBEAT:30");
        assert_eq!(
            Message::Progress { m: 2, k: 1, positions: 900 }.to_string(),
            "@@PROGRESS:2+1:900"
        );
        assert_eq!(
            Message::Combo("42 king=c8".into()).to_string(),
            "@@COMBO:42 king=c8"
        );
        assert_eq!(Message::ProblemStart(3).to_string(), "@@PROBLEM_START:3");
    }

    #[test]
    fn wire_round_trip() {
        let messages = [
            Message::Solving,
            Message::Finished,
            Message::Partial,
            Message::SolutionStart,
            Message::SolutionEnd,
            Message::Text("hello".into()),
            Message::Time(0.25),
            Message::Heartbeat(10),
            Message::Progress { m: 1, k: 2, positions: 12_345 },
            Message::Combo("23802 king=c8 checker=Pd6 checksq=d7".into()),
            Message::ProblemStart(1),
            Message::ProblemEnd(1),
            Message::Debug("trace".into()),
        ];
        for message in messages {
            let wire = message.to_string();
            assert_eq!(
                parse_line(&wire),
                LineKind::Protocol(message),
                "wire form {wire} should parse back"
            );
        }
    }

    #[test]
    fn marker_mid_line_discards_prefix() {
        assert_eq!(
            parse_line("garbage@@TEXT:hello"),
            LineKind::Protocol(Message::Text("hello".into()))
        );
    }

    #[test]
    fn line_without_marker_is_plain() {
        assert_eq!(parse_line("  1.Kc2 Rd8"), LineKind::Plain("  1.Kc2 Rd8"));
    }

    #[test]
    fn unknown_tag_is_unrecognized() {
        assert_eq!(parse_line("@@BOGUS:1"), LineKind::Unrecognized);
        assert_eq!(parse_line("@@"), LineKind::Unrecognized);
    }

    #[test]
    fn bare_tag_with_trailing_text_is_unrecognized() {
        assert_eq!(parse_line("@@FINISHED?"), LineKind::Unrecognized);
    }

    #[test]
    fn malformed_progress_is_unrecognized() {
        assert_eq!(parse_line("@@PROGRESS:1+2"), LineKind::Unrecognized);
        assert_eq!(parse_line("@@PROGRESS:abc"), LineKind::Unrecognized);
        assert_eq!(parse_line("@@PROGRESS:1:2+3"), LineKind::Unrecognized);
    }

    #[test]
    fn empty_text_payload_parses() {
        assert_eq!(
            parse_line("@@TEXT:"),
            LineKind::Protocol(Message::Text(String::new()))
        );
    }
}
