use crate::core::signal::TextSignal;
use once_cell::sync::Lazy;
use regex::Regex;

// A whole number token: not preceded by a digit or a decimal point.
static PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d.])(\d{1,3}(?:\.\d+)?)%").expect("percent pattern"));

const DESTINATION: &str = "Destination:";
const POSTPROCESS_MARKERS: [&str; 2] = ["Merging formats into", "ExtractAudio"];

/// Last-resort parser for the engine's free-text status lines.
pub fn parse_line(line: &str) -> Option<TextSignal> {
    if POSTPROCESS_MARKERS.iter().any(|m| line.contains(m)) {
        return Some(TextSignal::PostProcess);
    }

    if let Some((_, rest)) = line.split_once(DESTINATION) {
        let filename = rest.trim().trim_matches('"').trim();
        if !filename.is_empty() {
            return Some(TextSignal::Destination { filename: filename.to_string() });
        }
        return None;
    }

    let caps = PERCENT.captures(line)?;
    let pct: f64 = caps.get(1)?.as_str().parse().ok()?;
    if pct > 100.0 {
        return None;
    }
    Some(TextSignal::Percent(pct.floor() as u8))
}
