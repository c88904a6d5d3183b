use super::TagContext;
use crate::constants::WEBSITE_TAGS;

/// First non-empty of `contact:website`, `website`, `url`. Not validated.
pub fn classify(ctx: &TagContext<'_>) -> Option<String> {
    WEBSITE_TAGS
        .iter()
        .find_map(|key| ctx.tag(key))
        .map(str::to_string)
}
