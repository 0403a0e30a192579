//! Query forwarding rules.

/// Parameters consumed by this service and never sent upstream.
///
/// `feed` selects the related collection; the rest are cache-busting tokens
/// that would otherwise fragment the cache.
pub const CONTROL_PARAMS: &[&str] = &["feed", "_", "_t", "cb"];

pub fn is_control_param(name: &str) -> bool {
    CONTROL_PARAMS.contains(&name)
}

/// Query pairs to forward upstream, in their original order.
pub fn forwardable(params: &[(String, String)]) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(name, _)| !is_control_param(name))
        .cloned()
        .collect()
}

/// True when `feed=true` is present.
pub fn wants_feed(params: &[(String, String)]) -> bool {
    params
        .iter()
        .any(|(name, value)| name == "feed" && value.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_forwardable_strips_control_params() {
        let params = pairs(&[
            ("feed", "true"),
            ("limit", "20"),
            ("_", "1712"),
            ("translatedLanguage[]", "en"),
            ("translatedLanguage[]", "fr"),
        ]);
        assert_eq!(
            forwardable(&params),
            pairs(&[
                ("limit", "20"),
                ("translatedLanguage[]", "en"),
                ("translatedLanguage[]", "fr"),
            ])
        );
    }

    #[test]
    fn test_wants_feed() {
        assert!(wants_feed(&pairs(&[("feed", "true")])));
        assert!(!wants_feed(&pairs(&[("feed", "false")])));
        assert!(!wants_feed(&pairs(&[("limit", "20")])));
    }
}
