use tracing::debug;

use crate::app::ports::PlaceSink;
use crate::domain::{ClassifiedRecord, PlaceId, Shape};
use crate::error::Result;
use crate::observability::metrics;

/// Result of merging one classified record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Written { place_id: PlaceId },
    /// The origin row disappeared, so there was no geometry to join and
    /// nothing was written
    OriginMissing,
}

/// Reconciles classified records against the place store.
///
/// Every column of an existing place is overwritten by the new record: a tag
/// removed upstream clears the stored value on the next run.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeEngine;

impl MergeEngine {
    pub fn new() -> Self {
        Self
    }

    pub async fn merge<S>(
        &self,
        sink: &mut S,
        shape: Shape,
        record: &ClassifiedRecord,
    ) -> Result<MergeOutcome>
    where
        S: PlaceSink + ?Sized,
    {
        match sink.upsert_place(shape, record).await? {
            Some(place_id) => {
                debug!(osm_id = record.external_id, place_id, origin = %shape, "Merged place");
                metrics::merge::record_written();
                Ok(MergeOutcome::Written { place_id })
            }
            None => {
                debug!(
                    osm_id = record.external_id,
                    origin = %shape,
                    "Origin row missing, skipping write"
                );
                metrics::merge::origin_missing();
                Ok(MergeOutcome::OriginMissing)
            }
        }
    }
}
