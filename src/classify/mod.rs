//! Tag classifiers: pure functions turning a raw OSM tag set into the typed
//! fields of a place record.
//!
//! Every classifier takes the same [`TagContext`] so they can be composed
//! freely, even where a classifier only looks at part of it.

pub mod address;
pub mod category;
pub mod phone;
pub mod website;

use crate::domain::{ClassifiedRecord, RawTagSet, SourceRow};

pub use phone::PhoneClassifier;

/// Inputs shared by all classifiers
#[derive(Debug, Clone, Copy)]
pub struct TagContext<'a> {
    pub mapping_key: &'a str,
    pub subclass: &'a str,
    pub tags: &'a RawTagSet,
}

impl<'a> TagContext<'a> {
    pub fn new(mapping_key: &'a str, subclass: &'a str, tags: &'a RawTagSet) -> Self {
        Self {
            mapping_key,
            subclass,
            tags,
        }
    }

    pub fn from_row(row: &'a SourceRow) -> Self {
        Self::new(&row.mapping_key, &row.subclass, &row.tags)
    }

    /// Tag value, treating an empty string as missing
    pub fn tag(&self, key: &str) -> Option<&'a str> {
        self.tags
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Trait for turning a source row into a classified place record
pub trait RecordClassifier: Send + Sync {
    fn classify(&self, row: &SourceRow) -> ClassifiedRecord;
}

/// Runs the category, address, website and phone classifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier {
    phone: PhoneClassifier,
}

impl DefaultClassifier {
    pub fn new(phone: PhoneClassifier) -> Self {
        Self { phone }
    }
}

impl RecordClassifier for DefaultClassifier {
    fn classify(&self, row: &SourceRow) -> ClassifiedRecord {
        let ctx = TagContext::from_row(row);

        ClassifiedRecord {
            external_id: row.external_id,
            display_name: row.name.clone(),
            display_class: category::classify(&ctx),
            // No upstream tag maps to a status yet
            status: None,
            address: address::classify(&ctx),
            website: website::classify(&ctx),
            phone: self.phone.classify(&ctx),
        }
    }
}
