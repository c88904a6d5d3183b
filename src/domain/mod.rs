use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw OSM tags for an element. Values are untyped text.
pub type RawTagSet = BTreeMap<String, String>;

/// OSM element identifier, unique within the place store
pub type ExternalId = i64;

/// Store-assigned primary key of a persisted place
pub type PlaceId = i64;

/// Geometry shape of the upstream relation a row was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    #[default]
    Point,
    Polygon,
}

impl Shape {
    /// Read order of the upstream relations: every point row before any polygon row
    pub const READ_ORDER: [Shape; 2] = [Shape::Point, Shape::Polygon];

    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Point => "point",
            Shape::Polygon => "polygon",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row from one of the upstream POI relations. The geometry stays in the
/// origin relation and is joined back in at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRow {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "osm_id")]
    pub external_id: ExternalId,
    pub mapping_key: String,
    pub subclass: String,
    #[serde(default)]
    pub tags: RawTagSet,
}

/// Canonical business category of a place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayClass {
    PreparedFood,
    LightBar,
    FullBar,
    Grocery,
}

impl DisplayClass {
    /// Label persisted in the place store
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayClass::PreparedFood => "prepared_food",
            DisplayClass::LightBar => "light_bar",
            DisplayClass::FullBar => "full_bar",
            DisplayClass::Grocery => "grocery",
        }
    }
}

impl fmt::Display for DisplayClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The individual components of a postal address, each optional.
///
/// This is the column-level view used by stores. Classifiers never hand
/// out an `AddressParts` directly; they produce an [`Address`], which cannot
/// be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressParts {
    pub street_number: Option<String>,
    pub street_name: Option<String>,
    pub unit_number: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

impl AddressParts {
    /// True when no component carries a non-empty value
    pub fn is_empty(&self) -> bool {
        self.components()
            .iter()
            .all(|c| c.map_or(true, str::is_empty))
    }

    /// Components in column order
    pub fn components(&self) -> [Option<&str>; 8] {
        [
            self.street_number.as_deref(),
            self.street_name.as_deref(),
            self.unit_number.as_deref(),
            self.neighborhood.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.country.as_deref(),
            self.postal_code.as_deref(),
        ]
    }
}

/// A postal address with at least one non-empty component.
///
/// Absence of an address is expressed as `Option<Address>::None`, never as an
/// `Address` whose components are all empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Address(AddressParts);

impl Address {
    /// Returns `None` when every component is absent or empty
    pub fn new(parts: AddressParts) -> Option<Self> {
        if parts.is_empty() {
            None
        } else {
            Some(Self(parts))
        }
    }

    pub fn parts(&self) -> &AddressParts {
        &self.0
    }

    pub fn into_parts(self) -> AddressParts {
        self.0
    }
}

/// A source row after tag classification. Built once per row and consumed
/// by the merge; never persisted as its own entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedRecord {
    pub external_id: ExternalId,
    pub display_name: String,
    pub display_class: Option<DisplayClass>,
    pub status: Option<String>,
    pub address: Option<Address>,
    pub website: Option<String>,
    pub phone: Option<String>,
}

impl ClassifiedRecord {
    /// Address columns to write; all `None` when the record has no address
    pub fn address_columns(&self) -> AddressParts {
        self.address
            .as_ref()
            .map(|a| a.parts().clone())
            .unwrap_or_default()
    }
}

/// A row of the target place store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedPlace {
    pub place_id: PlaceId,
    pub external_id: ExternalId,
    pub display_name: String,
    pub display_class: Option<String>,
    pub status: Option<String>,
    /// Geometry copied from the origin relation (opaque to the pipeline)
    pub geometry: String,
    pub address: AddressParts,
    pub website: Option<String>,
    pub phone: Option<String>,
}
