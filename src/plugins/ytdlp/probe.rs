use crate::plugins::registry::ProbeResult;
use serde::Deserialize;

#[derive(Deserialize)]
struct FlatInfo {
    title: Option<String>,
    fulltitle: Option<String>,
    entries: Option<Vec<Option<FlatEntry>>>,
}

#[derive(Deserialize)]
struct FlatEntry {
    title: Option<String>,
    fulltitle: Option<String>,
}

/// Parses `--flat-playlist --dump-single-json` output.
pub fn parse_flat_info(json: &str) -> Result<ProbeResult, serde_json::Error> {
    let info: FlatInfo = serde_json::from_str(json)?;

    let Some(entries) = info.entries else {
        return Ok(ProbeResult {
            total_items: None,
            first_title: info.title.or(info.fulltitle),
        });
    };

    let present: Vec<FlatEntry> = entries.into_iter().flatten().collect();
    let first_title = present
        .first()
        .and_then(|e| e.title.clone().or_else(|| e.fulltitle.clone()));
    let total = u32::try_from(present.len()).ok().filter(|n| *n > 0);

    Ok(ProbeResult { total_items: total, first_title })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_non_null_entries() {
        let r = parse_flat_info(
            r#"{"title":"Mix","entries":[{"title":"one"},null,{"fulltitle":"three"},{"title":null}]}"#,
        )
        .unwrap();
        assert_eq!(r.total_items, Some(3));
        assert_eq!(r.first_title.as_deref(), Some("one"));
    }

    #[test]
    fn single_video_has_no_total() {
        let r = parse_flat_info(r#"{"title":null,"fulltitle":"Clip","duration":12.5}"#).unwrap();
        assert_eq!(r, ProbeResult { total_items: None, first_title: Some("Clip".into()) });
    }

    #[test]
    fn empty_playlist_stays_unknown() {
        let r = parse_flat_info(r#"{"title":"Empty","entries":[]}"#).unwrap();
        assert_eq!(r.total_items, None);
        assert_eq!(r.first_title, None);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_flat_info("not json").is_err());
    }
}
