//! The pattern catalog: one regular expression per field.
//!
//! Label-bearing patterns (name, date of birth, license) match their labels
//! case-insensitively. Strict-format patterns (passport, Aadhar-style grouped
//! digits) are case-sensitive, since the letter case is part of the format.

use std::sync::LazyLock;

use regex::Regex;

/// The fields we know how to extract.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Field {
    Name,
    Sex,
    DateOfBirth,
    LicenseNumber,
    AadharNumber,
    PassportNumber,
}

/// A compiled matcher for one field.
pub struct FieldPattern {
    /// The field this pattern extracts.
    pub field: Field,

    /// The compiled expression.
    regex: Regex,
}

impl FieldPattern {
    fn new(field: Field, pattern: &str) -> FieldPattern {
        FieldPattern {
            field,
            regex: Regex::new(pattern).expect("failed to compile field pattern"),
        }
    }

    /// Return the first match in `text`, trimmed of surrounding whitespace, or
    /// `None` when the field is absent.
    pub fn first_match(&self, text: &str) -> Option<String> {
        let captures = self.regex.captures(text)?;
        let matched = captures.get(1)?;
        let value = matched.as_str().trim();
        (!value.is_empty()).then(|| value.to_owned())
    }
}

/// The ordered catalog of field patterns. Each is tried once, independently;
/// the first match wins for its field.
pub static CATALOG: LazyLock<Vec<FieldPattern>> = LazyLock::new(|| {
    vec![
        // A name label, a separator, then one or two word tokens. The second
        // word may not cross a line break, or we would swallow the next label.
        FieldPattern::new(
            Field::Name,
            r"(?i:first name|last name|surname|name)[\s:]+((?:[A-Za-z]+\.?)(?:[ \t]+[A-Za-z]+\.?)?)",
        ),
        // A standalone, word-bounded sex marker.
        FieldPattern::new(Field::Sex, r"(?i)\b(M|F|Male|Female)\b"),
        // A date-of-birth label, optional colon/whitespace/newline, then a
        // DD/MM/YYYY date.
        FieldPattern::new(
            Field::DateOfBirth,
            r"(?i:DOB|Date of Birth)\s*:?\s*(\d{2}/\d{2}/\d{4})",
        ),
        // A driving-license label with optional period and colon, then up to
        // 13 alphanumerics.
        FieldPattern::new(
            Field::LicenseNumber,
            r"(?i:DL\s*NO\.?\s*:?)\s*([A-Za-z0-9]{1,13})",
        ),
        // Aadhar numbers carry no label: three groups of four digits,
        // separated by single spaces.
        FieldPattern::new(Field::AadharNumber, r"\b(\d{4} \d{4} \d{4})\b"),
        // A passport label, then one uppercase letter and seven digits.
        FieldPattern::new(
            Field::PassportNumber,
            r"Passport No\.?\s*([A-Z][0-9]{7})",
        ),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    fn first_match(field: Field, text: &str) -> Option<String> {
        CATALOG
            .iter()
            .find(|pattern| pattern.field == field)
            .expect("no pattern for field")
            .first_match(text)
    }

    #[test]
    fn name_labels() {
        let cases = [
            ("Name: John Smith", Some("John Smith")),
            ("Name John Smith", Some("John Smith")),
            ("Surname: Smith", Some("Smith")),
            ("first name : Anita", Some("Anita")),
            ("Last Name:\nKumar", Some("Kumar")),
            ("Name: A. Kumar", Some("A. Kumar")),
            ("no label here", None),
        ];
        for (text, expected) in cases {
            assert_eq!(
                first_match(Field::Name, text).as_deref(),
                expected,
                "text: {text:?}"
            );
        }
    }

    #[test]
    fn name_stops_at_line_break() {
        // The second word must not swallow the label on the next line.
        let text = "Name: Madonna\nDOB: 15/06/1990";
        assert_eq!(first_match(Field::Name, text).as_deref(), Some("Madonna"));
    }

    #[test]
    fn sex_is_word_bounded() {
        assert_eq!(first_match(Field::Sex, "Sex: M").as_deref(), Some("M"));
        assert_eq!(
            first_match(Field::Sex, "Sex: Female").as_deref(),
            Some("Female")
        );
        assert_eq!(first_match(Field::Sex, "sex: male").as_deref(), Some("male"));
        // No standalone marker anywhere in this text.
        assert_eq!(first_match(Field::Sex, "Mr. Smith of Fulham"), None);
    }

    #[test]
    fn date_of_birth_labels() {
        assert_eq!(
            first_match(Field::DateOfBirth, "DOB: 15/06/1990").as_deref(),
            Some("15/06/1990")
        );
        assert_eq!(
            first_match(Field::DateOfBirth, "Date of Birth\n15/06/1990").as_deref(),
            Some("15/06/1990")
        );
        // Wrong date shape.
        assert_eq!(first_match(Field::DateOfBirth, "DOB: 15-06-1990"), None);
    }

    #[test]
    fn license_number() {
        assert_eq!(
            first_match(Field::LicenseNumber, "DL NO: MH14201100628").as_deref(),
            Some("MH14201100628")
        );
        assert_eq!(
            first_match(Field::LicenseNumber, "dl no. KA01X99").as_deref(),
            Some("KA01X99")
        );
        // Longer values are truncated at 13 characters.
        assert_eq!(
            first_match(Field::LicenseNumber, "DL NO: MH142011006280001").as_deref(),
            Some("MH14201100628")
        );
    }

    #[test]
    fn aadhar_number() {
        assert_eq!(
            first_match(Field::AadharNumber, "1234 5678 9012").as_deref(),
            Some("1234 5678 9012")
        );
        // First occurrence wins.
        assert_eq!(
            first_match(Field::AadharNumber, "1111 2222 3333 and 4444 5555 6666")
                .as_deref(),
            Some("1111 2222 3333")
        );
        // Wrong grouping.
        assert_eq!(first_match(Field::AadharNumber, "123 456 789"), None);
        assert_eq!(first_match(Field::AadharNumber, "123456789012"), None);
    }

    #[test]
    fn passport_number_is_case_sensitive() {
        assert_eq!(
            first_match(Field::PassportNumber, "Passport No. A1234567").as_deref(),
            Some("A1234567")
        );
        assert_eq!(
            first_match(Field::PassportNumber, "Passport No Z7654321").as_deref(),
            Some("Z7654321")
        );
        assert_eq!(first_match(Field::PassportNumber, "passport no. a1234567"), None);
        assert_eq!(first_match(Field::PassportNumber, "Passport No. 12345678"), None);
    }
}
