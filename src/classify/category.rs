use super::TagContext;
use crate::domain::DisplayClass;

/// One row of the display-class table: a mapping key, the subclasses it
/// covers, and the class they map to.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    pub mapping_key: &'static str,
    pub subclasses: &'static [&'static str],
    pub class: DisplayClass,
}

impl CategoryRule {
    pub fn matches(&self, mapping_key: &str, subclass: &str) -> bool {
        self.mapping_key == mapping_key && self.subclasses.contains(&subclass)
    }
}

/// Evaluated top to bottom; the first matching rule wins.
///
/// `amenity=restaurant` appears under both `PreparedFood` and `FullBar`.
/// Table order resolves it to `PreparedFood`.
pub const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        mapping_key: "amenity",
        subclasses: &["fast_food", "food_court", "restaurant", "cafe"],
        class: DisplayClass::PreparedFood,
    },
    CategoryRule {
        mapping_key: "amenity",
        subclasses: &["pub", "biergarten"],
        class: DisplayClass::LightBar,
    },
    CategoryRule {
        mapping_key: "amenity",
        subclasses: &["bar", "restaurant"],
        class: DisplayClass::FullBar,
    },
    CategoryRule {
        mapping_key: "shop",
        subclasses: &[
            "greengrocer",
            "wholesale",
            "supermarket",
            "butcher",
            "convenience",
            "alcohol",
            "wine",
        ],
        class: DisplayClass::Grocery,
    },
];

/// Map `(mapping_key, subclass)` to a display class. Tags are not consulted.
pub fn classify(ctx: &TagContext<'_>) -> Option<DisplayClass> {
    classify_with(CATEGORY_RULES, ctx)
}

pub fn classify_with(rules: &[CategoryRule], ctx: &TagContext<'_>) -> Option<DisplayClass> {
    rules
        .iter()
        .find(|rule| rule.matches(ctx.mapping_key, ctx.subclass))
        .map(|rule| rule.class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawTagSet;

    fn class_of(mapping_key: &str, subclass: &str) -> Option<DisplayClass> {
        let tags = RawTagSet::new();
        classify(&TagContext::new(mapping_key, subclass, &tags))
    }

    #[test]
    fn test_prepared_food_subclasses() {
        for subclass in ["fast_food", "food_court", "cafe"] {
            assert_eq!(class_of("amenity", subclass), Some(DisplayClass::PreparedFood));
        }
    }

    #[test]
    fn test_bars() {
        assert_eq!(class_of("amenity", "pub"), Some(DisplayClass::LightBar));
        assert_eq!(class_of("amenity", "biergarten"), Some(DisplayClass::LightBar));
        assert_eq!(class_of("amenity", "bar"), Some(DisplayClass::FullBar));
    }

    #[test]
    fn test_grocery_requires_shop_key() {
        assert_eq!(class_of("shop", "supermarket"), Some(DisplayClass::Grocery));
        assert_eq!(class_of("shop", "wine"), Some(DisplayClass::Grocery));
        assert_eq!(class_of("amenity", "supermarket"), None);
    }

    #[test]
    fn test_restaurant_resolves_to_first_rule() {
        assert_eq!(class_of("amenity", "restaurant"), Some(DisplayClass::PreparedFood));

        // Reversing the table flips the tie-break
        let reversed: Vec<CategoryRule> = CATEGORY_RULES.iter().rev().copied().collect();
        let tags = RawTagSet::new();
        let ctx = TagContext::new("amenity", "restaurant", &tags);
        assert_eq!(classify_with(&reversed, &ctx), Some(DisplayClass::FullBar));
    }

    #[test]
    fn test_unmatched_is_absent() {
        assert_eq!(class_of("amenity", "bank"), None);
        assert_eq!(class_of("tourism", "cafe"), None);
        assert_eq!(class_of("", ""), None);
    }
}
