use phonenumber::{country, Mode, PhoneNumber};
use tracing::trace;

use super::TagContext;
use crate::constants::PHONE_TAGS;
use crate::error::{CompositorError, Result};

/// Parses `contact:phone` / `phone` tags against a default region and
/// renders the accepted number in that region's national format.
#[derive(Debug, Clone, Copy)]
pub struct PhoneClassifier {
    region: country::Id,
}

impl PhoneClassifier {
    pub fn new(region: country::Id) -> Self {
        Self { region }
    }

    /// Build from an ISO 3166-1 alpha-2 region code such as `"US"`
    pub fn for_region(code: &str) -> Result<Self> {
        parse_region(code).map(Self::new)
    }

    pub fn region(&self) -> country::Id {
        self.region
    }

    /// `contact:phone` wins over `phone` when both are valid. Unparseable or
    /// invalid values count as missing.
    pub fn classify(&self, ctx: &TagContext<'_>) -> Option<String> {
        PHONE_TAGS.iter().find_map(|key| {
            let raw = ctx.tag(key)?;
            let accepted = self.accept(raw);
            if accepted.is_none() {
                trace!(tag = *key, value = raw, "Discarding phone value");
            }
            accepted.map(|number| number.format().mode(Mode::National).to_string())
        })
    }

    /// Parse first, then check the parsed number. The raw tag text may carry
    /// padding or a `tel:` prefix that the parser strips.
    fn accept(&self, raw: &str) -> Option<PhoneNumber> {
        let number = phonenumber::parse(Some(self.region), raw).ok()?;
        let e164 = number.format().mode(Mode::E164).to_string();
        let possible = phonenumber::is_viable(&e164);
        let in_region = number.country().id() == Some(self.region);
        (possible && in_region && phonenumber::is_valid(&number)).then_some(number)
    }
}

impl Default for PhoneClassifier {
    fn default() -> Self {
        Self::new(country::Id::US)
    }
}

/// Resolve a region code, case-insensitively
pub fn parse_region(code: &str) -> Result<country::Id> {
    code.trim()
        .to_ascii_uppercase()
        .parse::<country::Id>()
        .map_err(|_| CompositorError::Config(format!("Unknown phone region '{code}'")))
}
