//! The memory-threshold flush: long streams must spill mid-write and still
//! read back complete and ordered.

use tsfile2::compression::Compression;
use tsfile2::config::TsFileConfig;
use tsfile2::data::{RowRecord, Value};
use tsfile2::encoding::Encoding;
use tsfile2::error::Result;
use tsfile2::read::SeriesIndexLookup;
use tsfile2::schema::{DeviceId, MeasurementSchema, TsDataType};
use tsfile2::write::TsFileWriter;

use super::open;

#[test]
fn threshold_forces_mid_stream_flushes() -> Result<()> {
    let config = TsFileConfig {
        chunk_group_size_threshold: 64 * 1024,
        ..TsFileConfig::default()
    };
    let mut writer = TsFileWriter::with_config(vec![], config)?;
    let device = DeviceId::from_name("d1");
    writer.register_timeseries(
        device.clone(),
        MeasurementSchema::new(
            "s1",
            TsDataType::Int64,
            Encoding::Plain,
            Compression::Uncompressed,
        ),
    )?;

    const ROWS: i64 = 100_000;
    let mut last_pos = writer.pos();
    let mut grew_mid_stream = false;
    for t in 0..ROWS {
        writer.write_record(
            &RowRecord::new(device.clone(), t).with("s1", Value::Int64(t)),
        )?;
        let pos = writer.pos();
        // the file only grows, and it must grow before close
        assert!(pos >= last_pos);
        if pos > last_pos {
            grew_mid_stream = true;
        }
        last_pos = pos;
    }
    assert!(grew_mid_stream, "no flush happened during the stream");
    writer.close()?;

    let reader = open(writer.into_inner()?)?;
    let index = match reader.timeseries_index(&device, "s1")? {
        SeriesIndexLookup::Unaligned(index) => index,
        _ => panic!("series is unaligned"),
    };
    // at least two chunk groups were written for the device
    assert!(
        index.chunk_metadata.len() >= 2,
        "expected multiple chunks, found {}",
        index.chunk_metadata.len()
    );
    assert!(index.is_multi_chunk());
    // chunks are listed in append (offset) order with disjoint time ranges
    for pair in index.chunk_metadata.windows(2) {
        assert!(pair[0].offset_of_chunk_header < pair[1].offset_of_chunk_header);
        assert!(pair[0].statistics.end_time() < pair[1].statistics.start_time());
    }
    assert_eq!(index.statistics.count(), ROWS as u64);

    // and all rows come back, in order
    let mut rows = reader.query_device(&device, &["s1"], None)?;
    let mut expected = 0i64;
    while let Some(block) = rows.next_block()? {
        for (row, time) in block.times().iter().enumerate() {
            assert_eq!(*time, expected);
            assert_eq!(block.value(row, "s1"), Some(Value::Int64(expected)));
            expected += 1;
        }
    }
    assert_eq!(expected, ROWS);
    Ok(())
}

#[test]
fn explicit_flush_creates_a_new_chunk_group() -> Result<()> {
    let mut writer = TsFileWriter::new(vec![])?;
    let device = DeviceId::from_name("d1");
    writer.register_timeseries(
        device.clone(),
        MeasurementSchema::new(
            "s1",
            TsDataType::Int32,
            Encoding::Plain,
            Compression::Uncompressed,
        ),
    )?;
    writer.write_record(&RowRecord::new(device.clone(), 1).with("s1", Value::Int32(1)))?;
    writer.flush()?;
    writer.write_record(&RowRecord::new(device.clone(), 2).with("s1", Value::Int32(2)))?;
    writer.close()?;

    let reader = open(writer.into_inner()?)?;
    let index = match reader.timeseries_index(&device, "s1")? {
        SeriesIndexLookup::Unaligned(index) => index,
        _ => panic!("series is unaligned"),
    };
    assert_eq!(index.chunk_metadata.len(), 2);
    assert!(index.is_multi_chunk());
    Ok(())
}
