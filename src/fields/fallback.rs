//! Geometric fallback for finding an unlabeled name.
//!
//! Identity cards often print the holder's name in large type with no label
//! next to it. When the pattern catalog finds no name, we look for the
//! tallest name-shaped token on the page instead.

use std::sync::LazyLock;

use regex::Regex;

use crate::ocr::Token;

/// Matches token text shaped like a personal name: one or more capitalized
/// words.
static NAME_SHAPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][a-z]+(?:\s[A-Z][a-z]+)*$").expect("failed to compile regex")
});

/// Pick the most name-like token by geometry.
///
/// A token qualifies when its text is name-shaped and its bounding box is
/// strictly taller than `min_height`. Among qualifying tokens we take the
/// tallest, breaking ties by the smallest top-edge y coordinate. Tokens with
/// malformed geometry are skipped. Returns `None` when nothing qualifies.
pub fn name_from_geometry(tokens: &[Token], min_height: i64) -> Option<String> {
    let mut best: Option<(i64, i64, &str)> = None;
    for token in tokens {
        if !NAME_SHAPED.is_match(&token.text) {
            continue;
        }
        let (Some(height), Some(top)) = (token.height(), token.top()) else {
            continue;
        };
        if height <= min_height {
            continue;
        }
        let candidate = (height, top, token.text.as_str());
        best = match best {
            Some((best_height, best_top, _))
                if height < best_height || (height == best_height && top >= best_top) =>
            {
                best
            }
            _ => Some(candidate),
        };
    }
    best.map(|(_, _, text)| text.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Point;

    fn token(text: &str, top: i64, height: i64) -> Token {
        Token {
            text: text.to_owned(),
            bounding_box: vec![
                Point { x: 0, y: top },
                Point { x: 100, y: top },
                Point { x: 100, y: top + height },
                Point { x: 0, y: top + height },
            ],
        }
    }

    #[test]
    fn taller_token_wins_regardless_of_position() {
        let tokens = vec![token("Asha Verma", 10, 25), token("Ravi Kumar", 200, 40)];
        assert_eq!(
            name_from_geometry(&tokens, 20).as_deref(),
            Some("Ravi Kumar")
        );
    }

    #[test]
    fn equal_heights_break_ties_by_topmost() {
        let tokens = vec![token("Lower Name", 300, 30), token("Upper Name", 50, 30)];
        assert_eq!(
            name_from_geometry(&tokens, 20).as_deref(),
            Some("Upper Name")
        );
    }

    #[test]
    fn height_must_exceed_the_threshold() {
        // Exactly at the threshold does not qualify.
        let tokens = vec![token("Asha Verma", 10, 20)];
        assert_eq!(name_from_geometry(&tokens, 20), None);

        let tokens = vec![token("Asha Verma", 10, 21)];
        assert_eq!(name_from_geometry(&tokens, 20).as_deref(), Some("Asha Verma"));
    }

    #[test]
    fn non_name_shaped_text_is_ignored() {
        let tokens = vec![
            token("GOVERNMENT", 10, 50),
            token("1234", 10, 50),
            token("lowercase", 10, 50),
            token("Asha", 80, 30),
        ];
        assert_eq!(name_from_geometry(&tokens, 20).as_deref(), Some("Asha"));
    }

    #[test]
    fn malformed_geometry_is_skipped() {
        let truncated = Token {
            text: "Asha Verma".to_owned(),
            bounding_box: vec![Point { x: 0, y: 0 }],
        };
        let tokens = vec![truncated, token("Ravi Kumar", 10, 30)];
        assert_eq!(
            name_from_geometry(&tokens, 20).as_deref(),
            Some("Ravi Kumar")
        );
    }

    #[test]
    fn no_tokens_means_no_name() {
        assert_eq!(name_from_geometry(&[], 20), None);
    }
}
