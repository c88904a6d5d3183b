use super::TagContext;
use crate::constants::{
    TAG_ADDR_CITY, TAG_ADDR_COUNTRY, TAG_ADDR_HOUSENUMBER, TAG_ADDR_POSTCODE, TAG_ADDR_STATE,
    TAG_ADDR_STREET, TAG_ADDR_UNIT,
};
use crate::domain::{Address, AddressParts};

/// Build an address from the `addr:*` tags. Returns `None` when none of them
/// carry a value. `neighborhood` has no source tag and is always absent.
pub fn classify(ctx: &TagContext<'_>) -> Option<Address> {
    let field = |key: &str| ctx.tag(key).map(str::to_string);

    Address::new(AddressParts {
        street_number: field(TAG_ADDR_HOUSENUMBER),
        street_name: field(TAG_ADDR_STREET),
        unit_number: field(TAG_ADDR_UNIT),
        neighborhood: None,
        city: field(TAG_ADDR_CITY),
        state: field(TAG_ADDR_STATE),
        country: field(TAG_ADDR_COUNTRY),
        postal_code: field(TAG_ADDR_POSTCODE),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawTagSet;

    fn tags(pairs: &[(&str, &str)]) -> RawTagSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn address_of(tags: &RawTagSet) -> Option<Address> {
        classify(&TagContext::new("amenity", "cafe", tags))
    }

    #[test]
    fn test_no_address_tags_is_absent() {
        let tags = tags(&[("name", "Joe's"), ("opening_hours", "Mo-Fr 08:00-17:00")]);
        assert!(address_of(&tags).is_none());
    }

    #[test]
    fn test_empty_address_values_are_absent() {
        let tags = tags(&[("addr:street", ""), ("addr:city", "")]);
        assert!(address_of(&tags).is_none());
    }

    #[test]
    fn test_every_mapped_key() {
        let tags = tags(&[
            ("addr:housenumber", "350"),
            ("addr:street", "5th Avenue"),
            ("addr:unit", "101"),
            ("addr:city", "New York"),
            ("addr:state", "NY"),
            ("addr:country", "US"),
            ("addr:postcode", "10118"),
        ]);

        let address = address_of(&tags).expect("address should be present");
        assert_eq!(
            address.parts(),
            &AddressParts {
                street_number: Some("350".to_string()),
                street_name: Some("5th Avenue".to_string()),
                unit_number: Some("101".to_string()),
                neighborhood: None,
                city: Some("New York".to_string()),
                state: Some("NY".to_string()),
                country: Some("US".to_string()),
                postal_code: Some("10118".to_string()),
            }
        );
    }

    #[test]
    fn test_partial_address_leaves_others_absent() {
        let tags = tags(&[("addr:postcode", "98101"), ("addr:suburb", "Belltown")]);

        let address = address_of(&tags).expect("address should be present");
        assert_eq!(address.parts().postal_code.as_deref(), Some("98101"));
        assert!(address.parts().neighborhood.is_none());
        assert!(address.parts().street_name.is_none());
    }
}
