//! Pulling structured identity fields out of recognized text.
//!
//! The parser is deliberately simple: each field has one pattern, tried once
//! against the full text, first match wins. The only second chance is the
//! geometric name fallback in [`fallback`], which runs when no name label was
//! found and the OCR service gave us token geometry.

pub mod fallback;
pub mod patterns;

use clap::Args;
use schemars::JsonSchema;

use crate::{ocr::Token, prelude::*};

use self::patterns::Field;

/// Options controlling the field parser.
#[derive(Args, Clone, Debug)]
pub struct ParserOpts {
    /// Minimum bounding-box height, in the OCR service's pixel units, for a
    /// token to be considered a name candidate by the geometric fallback.
    /// Calibrate per document layout and scan resolution.
    #[clap(long, default_value = "20")]
    pub min_name_height: i64,
}

impl Default for ParserOpts {
    fn default() -> Self {
        Self {
            min_name_height: 20,
        }
    }
}

/// The fields we extract from one identity document.
///
/// Every key is always present in serialized output; a field we could not
/// find is `null`, never omitted. Consumers can rely on the full key set.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct FieldRecord {
    /// The document holder's name.
    pub name: Option<String>,

    /// The holder's sex, as printed (M, F, Male or Female).
    pub sex: Option<String>,

    /// Date of birth, as printed (DD/MM/YYYY).
    pub date_of_birth: Option<String>,

    /// Driving-license number.
    pub license_number: Option<String>,

    /// Aadhar number, as three space-separated groups of four digits.
    pub aadhar_number: Option<String>,

    /// Passport number: one uppercase letter and seven digits.
    pub passport_number: Option<String>,
}

impl FieldRecord {
    /// Extract all known fields from recognized text.
    ///
    /// `tokens` carries per-token geometry when the OCR service supplied it;
    /// pass an empty slice otherwise, which disables the geometric fallback.
    pub fn parse(text: &str, tokens: &[Token], opts: &ParserOpts) -> FieldRecord {
        let mut record = FieldRecord::default();
        for pattern in patterns::CATALOG.iter() {
            *record.slot_mut(pattern.field) = pattern.first_match(text);
        }
        if record.name.is_none() {
            record.name = fallback::name_from_geometry(tokens, opts.min_name_height);
        }
        record
    }

    /// The slot holding one field's value.
    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Name => &mut self.name,
            Field::Sex => &mut self.sex,
            Field::DateOfBirth => &mut self.date_of_birth,
            Field::LicenseNumber => &mut self.license_number,
            Field::AadharNumber => &mut self.aadhar_number,
            Field::PassportNumber => &mut self.passport_number,
        }
    }
}
