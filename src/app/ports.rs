use async_trait::async_trait;

use crate::domain::{ClassifiedRecord, PlaceId, Shape, SourceRow};
use crate::error::Result;

/// Lazy, finite, non-restartable sequence of upstream rows tagged with the
/// shape of the relation they came from.
#[async_trait]
pub trait RowSource: Send {
    async fn next_row(&mut self) -> Result<Option<(Shape, SourceRow)>>;
}

/// Insert-or-update of classified records keyed by external id
#[async_trait]
pub trait PlaceSink: Send {
    /// Upsert `record`, taking the geometry from the `shape` relation row with
    /// the same external id. Returns the place id, or `None` when that origin
    /// row no longer exists and nothing was written.
    async fn upsert_place(
        &mut self,
        shape: Shape,
        record: &ClassifiedRecord,
    ) -> Result<Option<PlaceId>>;
}

/// One all-or-nothing run: reads and writes share the same transaction
#[async_trait]
pub trait UnitOfWork: RowSource + PlaceSink {
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait PlaceStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}
