use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use crate::app::ports::RowSource;
use crate::domain::{Shape, SourceRow};
use crate::error::{CompositorError, Result};

#[derive(Debug, Deserialize)]
struct NdjsonRow {
    #[serde(default)]
    shape: Shape,
    #[serde(flatten)]
    row: SourceRow,
}

/// Reads one JSON source row per line, e.g.
/// `{"shape":"point","osm_id":1,"name":"Cafe","mapping_key":"amenity","subclass":"cafe","tags":{}}`.
/// Blank lines are skipped and `shape` defaults to `point`.
pub struct NdjsonRowSource {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl NdjsonRowSource {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

#[async_trait]
impl RowSource for NdjsonRowSource {
    async fn next_row(&mut self) -> Result<Option<(Shape, SourceRow)>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: NdjsonRow =
                serde_json::from_str(&line).map_err(|e| CompositorError::InvalidRow {
                    line: self.line_no,
                    message: e.to_string(),
                })?;
            return Ok(Some((parsed.shape, parsed.row)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_rows_in_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"osm_id":1,"name":"Cafe","mapping_key":"amenity","subclass":"cafe","tags":{{"phone":"+1 212 555 0100"}}}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"shape":"polygon","osm_id":-2,"name":"Market","mapping_key":"shop","subclass":"supermarket"}}"#
        )
        .unwrap();

        let mut source = NdjsonRowSource::open(file.path()).await.unwrap();

        let (shape, row) = source.next_row().await.unwrap().unwrap();
        assert_eq!(shape, Shape::Point);
        assert_eq!(row.external_id, 1);
        assert_eq!(row.tags.get("phone").map(String::as_str), Some("+1 212 555 0100"));

        let (shape, row) = source.next_row().await.unwrap().unwrap();
        assert_eq!(shape, Shape::Polygon);
        assert_eq!(row.external_id, -2);

        assert!(source.next_row().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_line_reports_line_number() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"osm_id":1,"mapping_key":"amenity","subclass":"cafe"}}"#
        )
        .unwrap();
        writeln!(file, "{{not json").unwrap();

        let mut source = NdjsonRowSource::open(file.path()).await.unwrap();
        assert!(source.next_row().await.unwrap().is_some());

        match source.next_row().await {
            Err(CompositorError::InvalidRow { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected InvalidRow, got {:?}", other),
        }
    }
}
