//! Correlation identifier extraction.
//!
//! Probing tools embed a fixed-length alphanumeric identifier into the
//! subdomain labels of their payloads. These pure functions locate that
//! identifier in an incoming query and report it together with the label
//! path enclosing it. They hold no state so they can be unit tested (and
//! fuzzed) in isolation; validation policy lives in
//! [`Config::is_correlation_id`][crate::config::Config::is_correlation_id].

use crate::config::Config;
use crate::dns::records::split_subdomain_parts;

/// Delimiters used to chunk the raw request dump in scan-everywhere mode.
const SCAN_DELIMITERS: [char; 5] = ['.', '\n', '\t', '"', '\''];

/// An extracted identifier: the lowercased correlation token plus the
/// original-cased context it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Extraction {
    pub unique_id: String,
    pub full_id: String,
}

/// Strict label mode. Walk the query name label by label, splitting each
/// on `-`/`_`; the deepest matching label wins and `full_id` is the label
/// path from the left edge down to it.
pub(crate) fn extract_from_name(config: &Config, name: &str) -> Option<Extraction> {
    let labels: Vec<&str> = name.split('.').collect();
    let mut found = None;
    for (i, label) in labels.iter().enumerate() {
        for sub in split_subdomain_parts(label) {
            let lowered = sub.to_lowercase();
            if config.is_correlation_id(&lowered) {
                found = Some(Extraction {
                    unique_id: lowered,
                    full_id: labels[..=i].join("."),
                });
            }
        }
    }
    found
}

/// Scan-everywhere mode. Chunk the textual request dump on
/// [`SCAN_DELIMITERS`], slide a window of the full identifier length over
/// each chunk, and keep the last window that passes the identifier test.
pub(crate) fn extract_from_message(config: &Config, raw: &str) -> Option<Extraction> {
    let window = config.full_id_length();
    if window == 0 {
        return None;
    }
    let mut found = None;
    for chunk in raw.split(SCAN_DELIMITERS) {
        for part in chunk
            .as_bytes()
            .windows(window)
            .filter_map(|w| std::str::from_utf8(w).ok())
        {
            let lowered = part.to_lowercase();
            if config.is_correlation_id(&lowered) {
                found = Some(Extraction {
                    unique_id: lowered,
                    full_id: part.to_string(),
                });
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn strict_mode_finds_identifier_label() {
        let config = test_config();
        let got = extract_from_name(&config, "c4ca4238a0b923820dcc.oob.example.").unwrap();
        assert_eq!(got.unique_id, "c4ca4238a0b923820dcc");
        assert_eq!(got.full_id, "c4ca4238a0b923820dcc");
    }

    #[test]
    fn strict_mode_deepest_label_wins() {
        let config = test_config();
        let got = extract_from_name(&config, "foo.bar.c4ca4238a0b923820dcc.oob.example.").unwrap();
        assert_eq!(got.unique_id, "c4ca4238a0b923820dcc");
        assert_eq!(got.full_id, "foo.bar.c4ca4238a0b923820dcc");

        let got = extract_from_name(
            &config,
            "aaaa4238a0b923820dcc.bbbb4238a0b923820dcc.oob.example.",
        )
        .unwrap();
        assert_eq!(got.unique_id, "bbbb4238a0b923820dcc");
        assert_eq!(got.full_id, "aaaa4238a0b923820dcc.bbbb4238a0b923820dcc");
    }

    #[test]
    fn strict_mode_sees_through_hyphenated_labels() {
        let config = test_config();
        let got = extract_from_name(&config, "probe-c4ca4238a0b923820dcc.oob.example.").unwrap();
        assert_eq!(got.unique_id, "c4ca4238a0b923820dcc");
        assert_eq!(got.full_id, "probe-c4ca4238a0b923820dcc");
    }

    #[test]
    fn strict_mode_folds_case_in_key_only() {
        let config = test_config();
        let got = extract_from_name(&config, "C4CA4238A0B923820DCC.oob.example.").unwrap();
        assert_eq!(got.unique_id, "c4ca4238a0b923820dcc");
        assert_eq!(got.full_id, "C4CA4238A0B923820DCC");
    }

    #[test]
    fn strict_mode_none_without_identifier() {
        let config = test_config();
        assert_eq!(extract_from_name(&config, "aws.oob.example."), None);
        assert_eq!(extract_from_name(&config, ""), None);
    }

    #[test]
    fn scan_mode_last_match_wins() {
        let config = test_config();
        let raw = ";; QUESTION SECTION:\n;aaaa4238a0b923820dcc.oob.example.\tIN\tA\n\
                   ;; extra \"BBBB4238A0B923820DCC\" trailer\n";
        let got = extract_from_message(&config, raw).unwrap();
        assert_eq!(got.unique_id, "bbbb4238a0b923820dcc");
        assert_eq!(got.full_id, "BBBB4238A0B923820DCC");
    }

    #[test]
    fn scan_mode_slides_inside_chunks() {
        let config = test_config();
        // The identifier is embedded mid-chunk with no delimiter on either
        // side, so only the sliding window can find it.
        let raw = "xxc4ca4238a0b923820dcc";
        let got = extract_from_message(&config, raw).unwrap();
        assert_eq!(got.unique_id, "c4ca4238a0b923820dcc");
    }

    #[test]
    fn scan_mode_none_on_short_chunks() {
        let config = test_config();
        assert_eq!(extract_from_message(&config, "short.chunks.only"), None);
    }
}
