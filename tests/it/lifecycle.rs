//! Lifecycle contracts: closed readers, orphaned result sets, unsupported
//! orders, registration conflicts and time-window pruning.

use std::sync::Arc;

use tsfile2::compression::Compression;
use tsfile2::data::Value;
use tsfile2::encoding::Encoding;
use tsfile2::error::{Result, TsFileError};
use tsfile2::read::{Filter, Query, ResultOrder, TimeRange};
use tsfile2::schema::{DeviceId, MeasurementSchema, TsDataType};
use tsfile2::write::TsFileWriter;

use super::{open, write_single_series};

#[test]
fn closed_reader_rejects_scans() -> Result<()> {
    let bytes = write_single_series(&[(1, 10), (2, 20)])?;
    let reader = open(bytes)?;
    let device = DeviceId::from_name("d1");
    let mut rows = reader.query_device(&device, &["s1"], None)?;

    reader.close();
    assert!(matches!(
        rows.next_block(),
        Err(TsFileError::InvalidState(_))
    ));
    Ok(())
}

#[test]
fn result_set_outliving_its_reader_is_invalid() -> Result<()> {
    let bytes = write_single_series(&[(1, 10), (2, 20)])?;
    let reader = open(bytes)?;
    let device = DeviceId::from_name("d1");
    let mut rows = reader.query_device(&device, &["s1"], None)?;

    drop(reader);
    assert!(matches!(
        rows.next_block(),
        Err(TsFileError::InvalidState(_))
    ));
    Ok(())
}

#[test]
fn time_major_order_is_a_typed_error() -> Result<()> {
    let bytes = write_single_series(&[(1, 10)])?;
    let reader = open(bytes)?;
    let result = reader.query(
        Query::new("d1", vec!["s1".to_string()]).with_order(ResultOrder::TimeMajor),
    );
    assert!(matches!(result, Err(TsFileError::UnsupportedOrder(_))));
    Ok(())
}

#[test]
fn unknown_column_is_a_typed_error() -> Result<()> {
    let bytes = write_single_series(&[(1, 10)])?;
    let reader = open(bytes)?;
    let result = reader.query(Query::new("d1", vec!["nope".to_string()]));
    assert!(matches!(result, Err(TsFileError::ColumnNotExist(_))));
    Ok(())
}

#[test]
fn aligned_device_cannot_be_rewritten_as_unaligned() -> Result<()> {
    let mut writer = TsFileWriter::new(vec![])?;
    let device = DeviceId::from_name("d1");
    writer.register_aligned_timeseries(
        device.clone(),
        vec![MeasurementSchema::new(
            "s1",
            TsDataType::Int32,
            Encoding::Plain,
            Compression::Uncompressed,
        )],
    )?;
    assert!(matches!(
        writer.register_timeseries(
            device,
            MeasurementSchema::new(
                "s2",
                TsDataType::Int32,
                Encoding::Plain,
                Compression::Uncompressed,
            ),
        ),
        Err(TsFileError::InvalidArg(_))
    ));
    Ok(())
}

#[test]
fn time_window_filters_rows_and_prunes_chunks() -> Result<()> {
    let points: Vec<(i64, i32)> = (0..100).map(|i| (i, i as i32 * 3)).collect();
    let bytes = write_single_series(&points)?;
    let reader = open(bytes)?;
    let device = DeviceId::from_name("d1");

    let filter: Arc<dyn Filter> = Arc::new(TimeRange::new(10, 19));
    let mut rows = reader.query_device(&device, &["s1"], Some(filter))?;
    let block = rows.next_block()?.expect("one block");
    assert_eq!(block.times(), (10..20).collect::<Vec<i64>>().as_slice());
    assert_eq!(block.value(0, "s1"), Some(Value::Int32(30)));
    assert!(rows.next_block()?.is_none());

    // a window entirely outside the data yields nothing
    let filter: Arc<dyn Filter> = Arc::new(TimeRange::new(1000, 2000));
    let mut rows = reader.query_device(&device, &["s1"], Some(filter))?;
    assert!(rows.next_block()?.is_none());
    Ok(())
}
