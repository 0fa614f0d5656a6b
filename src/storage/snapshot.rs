//! Table codecs: the Arrow IPC snapshot format used for every write, and the
//! delimited-text format kept as a legacy read path.

use super::StorageError;
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use std::io::{Cursor, Read, Seek, Write};
use std::sync::Arc;

/// Extension of every key written by a backend.
pub const SNAPSHOT_EXTENSION: &str = "arrow";

/// Records sampled when inferring a CSV schema.
const CSV_INFER_RECORDS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Snapshot,
    Csv,
}

impl TableFormat {
    /// Pick the decoder for a key by its suffix.
    pub fn from_key(key: &str) -> Result<Self, StorageError> {
        match key.rsplit_once('.').map(|(_, ext)| ext) {
            Some(SNAPSHOT_EXTENSION) => Ok(TableFormat::Snapshot),
            Some("csv") => Ok(TableFormat::Csv),
            _ => Err(StorageError::InvalidInput(format!(
                "unsupported object format: {}",
                key
            ))),
        }
    }
}

/// Serialize `table` as an Arrow IPC file into `writer`.
pub fn write_snapshot<W: Write>(table: &RecordBatch, writer: W) -> Result<W, StorageError> {
    let encode_err = |e: arrow::error::ArrowError| {
        StorageError::InvalidInput(format!("snapshot encode error: {}", e))
    };

    let mut writer = FileWriter::try_new(writer, &table.schema()).map_err(encode_err)?;
    writer.write(table).map_err(encode_err)?;
    writer.finish().map_err(encode_err)?;
    writer.into_inner().map_err(encode_err)
}

pub fn encode_snapshot(table: &RecordBatch) -> Result<Vec<u8>, StorageError> {
    write_snapshot(table, Vec::new())
}

/// Read an Arrow IPC file, concatenating all of its batches into one table.
pub fn read_snapshot<R: Read + Seek>(reader: R) -> Result<RecordBatch, StorageError> {
    let reader = FileReader::try_new(reader, None).map_err(corrupt)?;
    let schema = reader.schema();
    let batches = reader.collect::<Result<Vec<_>, _>>().map_err(corrupt)?;
    concat_batches(&schema, &batches).map_err(corrupt)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<RecordBatch, StorageError> {
    read_snapshot(Cursor::new(bytes))
}

/// Read delimited text with a header row, inferring column types.
pub fn read_csv<R: Read + Seek>(mut reader: R) -> Result<RecordBatch, StorageError> {
    let format = Format::default().with_header(true);
    let (schema, _) = format
        .infer_schema(&mut reader, Some(CSV_INFER_RECORDS))
        .map_err(corrupt)?;
    reader.rewind()?;

    let schema = Arc::new(schema);
    let batches = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .build(reader)
        .map_err(corrupt)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(corrupt)?;

    concat_batches(&schema, &batches).map_err(corrupt)
}

pub fn read_table<R: Read + Seek>(reader: R, format: TableFormat) -> Result<RecordBatch, StorageError> {
    match format {
        TableFormat::Snapshot => read_snapshot(reader),
        TableFormat::Csv => read_csv(reader),
    }
}

fn corrupt(err: arrow::error::ArrowError) -> StorageError {
    StorageError::CorruptData(err.to_string())
}
