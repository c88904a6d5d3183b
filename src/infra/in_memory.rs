use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::app::ports::{PlaceSink, PlaceStore, RowSource, UnitOfWork};
use crate::domain::{
    ClassifiedRecord, ExternalId, PersistedPlace, PlaceId, RawTagSet, Shape, SourceRow,
};
use crate::error::Result;

/// A row of one of the upstream POI relations
#[derive(Debug, Clone)]
pub struct OriginRow {
    pub row: SourceRow,
    /// Opaque geometry, e.g. WKT
    pub geometry: String,
    pub normalized_relevance: bool,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    points: Vec<OriginRow>,
    polygons: Vec<OriginRow>,
    places: BTreeMap<ExternalId, PersistedPlace>,
    last_place_id: PlaceId,
}

impl StoreState {
    fn relation(&self, shape: Shape) -> &[OriginRow] {
        match shape {
            Shape::Point => &self.points,
            Shape::Polygon => &self.polygons,
        }
    }

    fn relation_mut(&mut self, shape: Shape) -> &mut Vec<OriginRow> {
        match shape {
            Shape::Point => &mut self.points,
            Shape::Polygon => &mut self.polygons,
        }
    }
}

/// In-memory stand-in for the PostGIS database, for development and tests.
///
/// A unit of work operates on a private copy of the state; commit publishes
/// the copy's places table, rollback discards it.
#[derive(Clone, Default)]
pub struct InMemoryPlaceStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryPlaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_origin(&self, shape: Shape, row: SourceRow, geometry: &str, relevant: bool) {
        let mut state = self.state.lock().await;
        state.relation_mut(shape).push(OriginRow {
            row,
            geometry: geometry.to_string(),
            normalized_relevance: relevant,
        });
    }

    /// Replace the tags of an origin row, as a fresh upstream import would
    pub async fn update_origin_tags(
        &self,
        shape: Shape,
        external_id: ExternalId,
        tags: RawTagSet,
    ) -> bool {
        let mut state = self.state.lock().await;
        match state
            .relation_mut(shape)
            .iter_mut()
            .find(|o| o.row.external_id == external_id)
        {
            Some(origin) => {
                origin.row.tags = tags;
                true
            }
            None => false,
        }
    }

    pub async fn remove_origin(&self, shape: Shape, external_id: ExternalId) -> bool {
        let mut state = self.state.lock().await;
        let relation = state.relation_mut(shape);
        let before = relation.len();
        relation.retain(|o| o.row.external_id != external_id);
        relation.len() != before
    }

    pub async fn place(&self, external_id: ExternalId) -> Option<PersistedPlace> {
        self.state.lock().await.places.get(&external_id).cloned()
    }

    /// All persisted places ordered by external id
    pub async fn places(&self) -> Vec<PersistedPlace> {
        self.state.lock().await.places.values().cloned().collect()
    }
}

#[async_trait]
impl PlaceStore for InMemoryPlaceStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let staged = self.state.lock().await.clone();
        Ok(Box::new(InMemoryUnitOfWork {
            shared: Arc::clone(&self.state),
            staged,
            cursor: ReadCursor::default(),
        }))
    }
}

#[derive(Debug, Default)]
struct ReadCursor {
    shape_idx: usize,
    position: usize,
}

pub struct InMemoryUnitOfWork {
    shared: Arc<Mutex<StoreState>>,
    staged: StoreState,
    cursor: ReadCursor,
}

#[async_trait]
impl RowSource for InMemoryUnitOfWork {
    async fn next_row(&mut self) -> Result<Option<(Shape, SourceRow)>> {
        while let Some(&shape) = Shape::READ_ORDER.get(self.cursor.shape_idx) {
            let relation = self.staged.relation(shape);
            while let Some(origin) = relation.get(self.cursor.position) {
                self.cursor.position += 1;
                if origin.normalized_relevance {
                    return Ok(Some((shape, origin.row.clone())));
                }
            }
            self.cursor.shape_idx += 1;
            self.cursor.position = 0;
        }
        Ok(None)
    }
}

#[async_trait]
impl PlaceSink for InMemoryUnitOfWork {
    async fn upsert_place(
        &mut self,
        shape: Shape,
        record: &ClassifiedRecord,
    ) -> Result<Option<PlaceId>> {
        // INSERT ... SELECT FROM origin: no origin row, nothing written
        let Some(geometry) = self
            .staged
            .relation(shape)
            .iter()
            .find(|o| o.row.external_id == record.external_id)
            .map(|o| o.geometry.clone())
        else {
            return Ok(None);
        };

        let place_id = match self.staged.places.get(&record.external_id) {
            Some(existing) => existing.place_id,
            None => {
                self.staged.last_place_id += 1;
                self.staged.last_place_id
            }
        };

        let place = PersistedPlace {
            place_id,
            external_id: record.external_id,
            display_name: record.display_name.clone(),
            display_class: record.display_class.map(|c| c.as_str().to_string()),
            status: record.status.clone(),
            geometry,
            address: record.address_columns(),
            website: record.website.clone(),
            phone: record.phone.clone(),
        };
        self.staged.places.insert(record.external_id, place);
        Ok(Some(place_id))
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { shared, staged, .. } = *self;
        let mut shared = shared.lock().await;
        shared.places = staged.places;
        shared.last_place_id = staged.last_place_id;
        debug!(places = shared.places.len(), "Committed in-memory unit of work");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        debug!("Rolled back in-memory unit of work");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, AddressParts, DisplayClass};

    fn source_row(external_id: ExternalId) -> SourceRow {
        SourceRow {
            name: format!("Place {external_id}"),
            external_id,
            mapping_key: "amenity".to_string(),
            subclass: "cafe".to_string(),
            tags: Default::default(),
        }
    }

    fn record(external_id: ExternalId, phone: Option<&str>) -> ClassifiedRecord {
        ClassifiedRecord {
            external_id,
            display_name: format!("Place {external_id}"),
            display_class: Some(DisplayClass::PreparedFood),
            status: None,
            address: Address::new(AddressParts {
                city: Some("Seattle".to_string()),
                ..Default::default()
            }),
            website: None,
            phone: phone.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_rows_filtered_and_points_first() {
        let store = InMemoryPlaceStore::new();
        store.insert_origin(Shape::Polygon, source_row(3), "POLYGON EMPTY", true).await;
        store.insert_origin(Shape::Point, source_row(1), "POINT (0 0)", true).await;
        store.insert_origin(Shape::Point, source_row(2), "POINT (1 1)", false).await;
        store.insert_origin(Shape::Point, source_row(4), "POINT (2 2)", true).await;

        let mut uow = store.begin().await.unwrap();
        let mut seen = Vec::new();
        while let Some((shape, row)) = uow.next_row().await.unwrap() {
            seen.push((shape, row.external_id));
        }

        assert_eq!(
            seen,
            vec![(Shape::Point, 1), (Shape::Point, 4), (Shape::Polygon, 3)]
        );
        assert!(uow.next_row().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_place_id_and_overwrites_fields() {
        let store = InMemoryPlaceStore::new();
        store.insert_origin(Shape::Point, source_row(10), "POINT (0 0)", true).await;

        let mut uow = store.begin().await.unwrap();
        let first = uow.upsert_place(Shape::Point, &record(10, Some("(212) 555-0100"))).await.unwrap();
        let second = uow.upsert_place(Shape::Point, &record(10, None)).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(first, second);
        let place = store.place(10).await.unwrap();
        assert_eq!(place.phone, None);
        assert_eq!(place.geometry, "POINT (0 0)");
        assert_eq!(place.display_class.as_deref(), Some("prepared_food"));
    }

    #[tokio::test]
    async fn test_upsert_without_origin_is_noop() {
        let store = InMemoryPlaceStore::new();
        store.insert_origin(Shape::Point, source_row(10), "POINT (0 0)", true).await;

        let mut uow = store.begin().await.unwrap();
        // Same id, wrong relation
        let result = uow.upsert_place(Shape::Polygon, &record(10, None)).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(result, None);
        assert!(store.places().await.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = InMemoryPlaceStore::new();
        store.insert_origin(Shape::Point, source_row(10), "POINT (0 0)", true).await;

        let mut uow = store.begin().await.unwrap();
        uow.upsert_place(Shape::Point, &record(10, None)).await.unwrap();
        uow.rollback().await.unwrap();

        assert!(store.place(10).await.is_none());
    }
}
