use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::app::merge::{MergeEngine, MergeOutcome};
use crate::app::ports::{PlaceStore, RowSource, UnitOfWork};
use crate::classify::RecordClassifier;
use crate::domain::{ClassifiedRecord, Shape};
use crate::error::{CompositorError, Result};
use crate::observability::metrics;

/// Counters for one compositor run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub point_rows: usize,
    pub polygon_rows: usize,
    pub written: usize,
    pub origin_missing: usize,
    pub with_display_class: usize,
    pub with_address: usize,
    pub with_website: usize,
    pub with_phone: usize,
}

impl RunSummary {
    fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            point_rows: 0,
            polygon_rows: 0,
            written: 0,
            origin_missing: 0,
            with_display_class: 0,
            with_address: 0,
            with_website: 0,
            with_phone: 0,
        }
    }

    pub fn rows_read(&self) -> usize {
        self.point_rows + self.polygon_rows
    }

    fn record_row(&mut self, shape: Shape, record: &ClassifiedRecord) {
        match shape {
            Shape::Point => self.point_rows += 1,
            Shape::Polygon => self.polygon_rows += 1,
        }
        self.with_display_class += record.display_class.is_some() as usize;
        self.with_address += record.address.is_some() as usize;
        self.with_website += record.website.is_some() as usize;
        self.with_phone += record.phone.is_some() as usize;
    }

    fn record_outcome(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Written { .. } => self.written += 1,
            MergeOutcome::OriginMissing => self.origin_missing += 1,
        }
    }
}

/// Drives rows from the store through the classifiers and back into the
/// place store, one row at a time, inside a single unit of work.
pub struct CompositorUseCase {
    classifier: Box<dyn RecordClassifier>,
    merge: MergeEngine,
}

impl CompositorUseCase {
    pub fn new(classifier: Box<dyn RecordClassifier>) -> Self {
        Self {
            classifier,
            merge: MergeEngine::new(),
        }
    }

    /// Classify and merge every relevant row. Commits at the end; any error
    /// rolls back every write made during the run. A dry run classifies and
    /// merges as usual, then rolls back.
    pub async fn run(&self, store: &dyn PlaceStore, dry_run: bool) -> Result<RunSummary> {
        let mut summary = RunSummary::new(dry_run);
        let span = info_span!("compositor_run", run_id = %summary.run_id, dry_run);

        async {
            info!("Starting compositor run");
            let mut uow = store.begin().await?;

            match self.drain(uow.as_mut(), &mut summary).await {
                Ok(()) if dry_run => {
                    uow.rollback().await?;
                    info!("Dry run finished, changes rolled back");
                    metrics::run::finished("dry_run");
                }
                Ok(()) => {
                    uow.commit().await?;
                    metrics::run::finished("committed");
                }
                Err(e) => {
                    error!("Compositor run failed, rolling back: {}", e);
                    metrics::run::finished("rolled_back");
                    if let Err(rollback_err) = uow.rollback().await {
                        error!("Rollback failed: {}", rollback_err);
                    }
                    return Err(e);
                }
            }

            summary.finished_at = Some(Utc::now());
            info!(
                point_rows = summary.point_rows,
                polygon_rows = summary.polygon_rows,
                written = summary.written,
                origin_missing = summary.origin_missing,
                "Compositor run finished"
            );
            Ok::<_, CompositorError>(summary)
        }
        .instrument(span)
        .await
    }

    async fn drain(&self, uow: &mut dyn UnitOfWork, summary: &mut RunSummary) -> Result<()> {
        while let Some((shape, row)) = uow.next_row().await? {
            metrics::source::row_read(shape);
            let record = self.classifier.classify(&row);
            metrics::classify::record_classified(&record);
            debug!(osm_id = record.external_id, origin = %shape, "Classified row");
            summary.record_row(shape, &record);

            let outcome = self.merge.merge(&mut *uow, shape, &record).await?;
            summary.record_outcome(outcome);
        }
        Ok(())
    }

    /// Classify every row of `source` without touching a store
    pub async fn classify_rows<S>(&self, source: &mut S) -> Result<Vec<(Shape, ClassifiedRecord)>>
    where
        S: RowSource + ?Sized,
    {
        let mut records = Vec::new();
        while let Some((shape, row)) = source.next_row().await? {
            metrics::source::row_read(shape);
            let record = self.classifier.classify(&row);
            metrics::classify::record_classified(&record);
            records.push((shape, record));
        }
        Ok(records)
    }
}
