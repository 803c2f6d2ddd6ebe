//! Sender locale derived from the international calling code.

use isocountry::CountryCode;

/// Maps a sender identifier to a coarse locale name.
///
/// Lookups are best-effort: an empty string means the locale is unknown.
pub trait LocaleLookup: Send + Sync {
    fn locale(&self, sender_id: &str) -> String;
}

/// Shortest sender id treated as an international number.
const MIN_DIGITS: usize = 7;

/// Country name of a phone-number sender id, resolved with the libphonenumber
/// metadata so shared calling codes (+1, +7, +262 ...) map to the right region.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallingCodeLookup;

impl CallingCodeLookup {
    pub fn new() -> Self {
        Self
    }

    fn region(digits: &str) -> Option<phonenumber::country::Id> {
        let number = phonenumber::parse(None, format!("+{}", digits)).ok()?;
        number.country().id()
    }
}

impl LocaleLookup for CallingCodeLookup {
    fn locale(&self, sender_id: &str) -> String {
        // Sender ids may carry a leading '+' or a "@domain" suffix.
        let number = sender_id
            .trim()
            .trim_start_matches('+')
            .split(['@', ':'])
            .next()
            .unwrap_or_default();
        if number.len() < MIN_DIGITS || !number.bytes().all(|b| b.is_ascii_digit()) {
            return String::new();
        }

        let Some(region) = Self::region(number) else {
            return String::new();
        };
        let code: &str = region.as_ref();
        match CountryCode::for_alpha2(code) {
            Ok(country) => country.name().to_string(),
            // Regions without an ISO 3166 entry keep their region code.
            Err(_) => code.to_string(),
        }
    }
}
