//! PGN movetext parsing — lightweight regex-based extraction.
//!
//! Only the mainline SAN tokens are needed for graph splicing, so headers,
//! comments, variations, NAGs and result markers are stripped rather than
//! fully parsed.

use regex::Regex;

/// Extract SAN moves from PGN text (after removing headers, comments,
/// variations).
pub fn extract_moves(pgn: &str) -> Vec<String> {
    // Remove headers
    let header_re = Regex::new(r"\[[^\]]*\]").unwrap();
    let no_headers = header_re.replace_all(pgn, "");

    // Remove comments
    let comment_re = Regex::new(r"\{[^}]*\}").unwrap();
    let no_comments = comment_re.replace_all(&no_headers, "");

    // Remove variations
    let variation_re = Regex::new(r"\([^)]*\)").unwrap();
    let no_variations = variation_re.replace_all(&no_comments, "");

    // Extract moves
    let move_re =
        Regex::new(r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O|O-O").unwrap();

    move_re
        .find_iter(&no_variations)
        .map(|m| m.as_str().to_string())
        .collect()
}
