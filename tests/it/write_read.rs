//! End-to-end round-trips: unaligned series, aligned groups with nulls and
//! table tablets spanning devices.

use std::io::Cursor;

use tsfile2::compression::Compression;
use tsfile2::config::TsFileConfig;
use tsfile2::data::{ColumnValues, Tablet, Value};
use tsfile2::encoding::Encoding;
use tsfile2::error::Result;
use tsfile2::read::{Query, SeriesIndexLookup, TsFileReader};
use tsfile2::schema::{ColumnSchema, DeviceId, MeasurementSchema, TableSchema, TsDataType};
use tsfile2::statistics::Summary;
use tsfile2::write::TsFileWriter;

use super::{open, write_single_series};

#[test]
fn single_unaligned_series_roundtrip() -> Result<()> {
    let bytes = write_single_series(&[(1, 10), (2, 20), (3, 30)])?;
    let reader = open(bytes)?;
    let device = DeviceId::from_name("d1");

    let mut rows = reader.query_device(&device, &["s1"], None)?;
    let block = rows.next_block()?.expect("one block");
    assert_eq!(block.times(), &[1, 2, 3]);
    assert_eq!(block.value(0, "s1"), Some(Value::Int32(10)));
    assert_eq!(block.value(1, "s1"), Some(Value::Int32(20)));
    assert_eq!(block.value(2, "s1"), Some(Value::Int32(30)));
    assert!(rows.next_block()?.is_none());

    // chunk statistics as recorded in the timeseries index
    let lookup = reader.timeseries_index(&device, "s1")?;
    let index = match lookup {
        SeriesIndexLookup::Unaligned(index) => index,
        _ => panic!("series is unaligned"),
    };
    assert_eq!(index.chunk_metadata.len(), 1);
    assert!(!index.is_multi_chunk());
    let statistics = &index.chunk_metadata[0].statistics;
    assert_eq!(statistics.count(), 3);
    assert_eq!(statistics.start_time(), 1);
    assert_eq!(statistics.end_time(), 3);
    match statistics.summary() {
        Summary::Int32(s) => {
            assert_eq!(s.min_value, 10);
            assert_eq!(s.max_value, 30);
            assert_eq!(s.first_value, 10);
            assert_eq!(s.last_value, 30);
            assert_eq!(s.sum_value, 60);
        }
        _ => panic!("expected int32 statistics"),
    }
    Ok(())
}

#[test]
fn aligned_group_with_nulls() -> Result<()> {
    let mut writer = TsFileWriter::new(vec![])?;
    let device = DeviceId::from_name("d2");
    writer.register_aligned_timeseries(
        device.clone(),
        vec![
            MeasurementSchema::new(
                "s1",
                TsDataType::Int64,
                Encoding::Plain,
                Compression::Uncompressed,
            ),
            MeasurementSchema::new(
                "s2",
                TsDataType::Double,
                Encoding::Gorilla,
                Compression::Uncompressed,
            ),
        ],
    )?;

    let mut tablet = Tablet::new(
        "d2",
        vec![
            ColumnSchema::field(
                "s1",
                TsDataType::Int64,
                Encoding::Plain,
                Compression::Uncompressed,
            ),
            ColumnSchema::field(
                "s2",
                TsDataType::Double,
                Encoding::Gorilla,
                Compression::Uncompressed,
            ),
        ],
    );
    tablet.add_row(100, vec![Some(Value::Int64(1)), Some(Value::Double(1.5))])?;
    tablet.add_row(101, vec![None, Some(Value::Double(2.5))])?;
    tablet.add_row(102, vec![Some(Value::Int64(3)), None])?;
    writer.write_tablet(&tablet)?;
    writer.close()?;

    let reader = open(writer.into_inner()?)?;
    let mut rows = reader.query_device(&device, &["s1", "s2"], None)?;
    let block = rows.next_block()?.expect("one block");
    assert_eq!(block.times(), &[100, 101, 102]);
    assert_eq!(block.value(0, "s1"), Some(Value::Int64(1)));
    assert_eq!(block.value(0, "s2"), Some(Value::Double(1.5)));
    assert_eq!(block.value(1, "s1"), None);
    assert_eq!(block.value(1, "s2"), Some(Value::Double(2.5)));
    assert_eq!(block.value(2, "s1"), Some(Value::Int64(3)));
    assert_eq!(block.value(2, "s2"), None);
    assert!(block.has_null_value("s1"));
    assert!(block.has_null_value("s2"));
    // the time column never holds nulls
    assert_eq!(block.times().len(), block.row_count());

    // both series resolve through the shared time index
    match reader.timeseries_index(&device, "s1")? {
        SeriesIndexLookup::Aligned { time, value } => {
            assert!(time.is_aligned_time());
            assert!(value.is_aligned_value());
            assert_eq!(time.statistics.count(), 3);
            assert_eq!(value.statistics.count(), 2);
        }
        _ => panic!("series is aligned"),
    }
    Ok(())
}

#[test]
fn table_tablet_splits_into_device_runs() -> Result<()> {
    let mut writer = TsFileWriter::new(vec![])?;
    let columns = vec![
        ColumnSchema::tag("id1"),
        ColumnSchema::tag("id2"),
        ColumnSchema::field(
            "s1",
            TsDataType::Int32,
            Encoding::Plain,
            Compression::Uncompressed,
        ),
    ];
    writer.register_table(TableSchema::new("t1", columns.clone())?)?;

    let mut tablet = Tablet::new("t1", columns);
    let tag = |s: &str| Some(Value::String(s.to_string()));
    tablet.add_row(1, vec![tag("a"), tag("x"), Some(Value::Int32(10))])?;
    tablet.add_row(2, vec![tag("a"), tag("x"), Some(Value::Int32(11))])?;
    tablet.add_row(3, vec![tag("b"), tag("y"), Some(Value::Int32(20))])?;
    writer.write_table(&tablet)?;
    writer.close()?;

    let reader = open(writer.into_inner()?)?;
    let mut blocks = reader.query(Query::new(
        "t1",
        vec!["id1".to_string(), "id2".to_string(), "s1".to_string()],
    ))?;

    let block1 = blocks.next_block()?.expect("first device block");
    assert_eq!(block1.device().tag_values(), &["a", "x"]);
    assert_eq!(block1.times(), &[1, 2]);
    assert_eq!(block1.value(0, "id1"), Some(Value::String("a".to_string())));
    assert_eq!(block1.value(0, "id2"), Some(Value::String("x".to_string())));
    assert_eq!(block1.value(0, "s1"), Some(Value::Int32(10)));
    assert_eq!(block1.value(1, "s1"), Some(Value::Int32(11)));

    let block2 = blocks.next_block()?.expect("second device block");
    assert_eq!(block2.device().tag_values(), &["b", "y"]);
    assert_eq!(block2.times(), &[3]);
    assert_eq!(block2.value(0, "s1"), Some(Value::Int32(20)));

    assert!(blocks.next_block()?.is_none());

    // two devices, two chunk groups, one single-page chunk each
    let mut devices = reader.devices("t1", None)?;
    let first = devices.next_task()?.expect("first device");
    let second = devices.next_task()?.expect("second device");
    assert!(first.device < second.device);
    assert!(devices.next_task()?.is_none());

    match reader.timeseries_index(&first.device, "s1")? {
        SeriesIndexLookup::Unaligned(index) => {
            assert_eq!(index.chunk_metadata.len(), 1);
        }
        _ => panic!("table writes are unaligned"),
    }
    Ok(())
}

#[test]
fn every_codec_pair_roundtrips() -> Result<()> {
    let cases: Vec<(TsDataType, Encoding, Compression, Vec<Value>)> = vec![
        (
            TsDataType::Int64,
            Encoding::Ts2Diff,
            Compression::Snappy,
            (0..2000).map(|i| Value::Int64(i * 7 - 300)).collect(),
        ),
        (
            TsDataType::Int32,
            Encoding::Rle,
            Compression::Gzip,
            (0..2000).map(|i| Value::Int32(i % 5)).collect(),
        ),
        (
            TsDataType::Double,
            Encoding::Gorilla,
            Compression::Lz4,
            (0..2000).map(|i| Value::Double(20.0 + (i as f64) * 0.25)).collect(),
        ),
        (
            TsDataType::Float,
            Encoding::Gorilla,
            Compression::Zstd,
            (0..500).map(|i| Value::Float(i as f32 / 3.0)).collect(),
        ),
        (
            TsDataType::Boolean,
            Encoding::Rle,
            Compression::Snappy,
            (0..2000).map(|i| Value::Boolean(i % 7 == 0)).collect(),
        ),
        (
            TsDataType::Text,
            Encoding::Plain,
            Compression::Gzip,
            (0..300)
                .map(|i| Value::Text(format!("value-{}", i % 11).into_bytes()))
                .collect(),
        ),
        (
            TsDataType::String,
            Encoding::Dictionary,
            Compression::Uncompressed,
            (0..300)
                .map(|i| Value::String(format!("state-{}", i % 3)))
                .collect(),
        ),
        (
            TsDataType::Int64,
            Encoding::Zigzag,
            Compression::Uncompressed,
            (0..500).map(|i| Value::Int64(-i * 13)).collect(),
        ),
    ];

    for (data_type, encoding, compression, values) in cases {
        let mut writer = TsFileWriter::new(vec![])?;
        let device = DeviceId::from_name("dev");
        writer.register_timeseries(
            device.clone(),
            MeasurementSchema::new("s", data_type, encoding, compression),
        )?;
        for (i, value) in values.iter().enumerate() {
            writer.write_record(
                &tsfile2::data::RowRecord::new(device.clone(), i as i64).with("s", value.clone()),
            )?;
        }
        writer.close()?;

        let reader = open(writer.into_inner()?)?;
        let mut rows = reader.query_device(&device, &["s"], None)?;
        let mut decoded: Vec<Value> = vec![];
        while let Some(block) = rows.next_block()? {
            for row in 0..block.row_count() {
                decoded.push(block.value(row, "s").expect("no nulls written"));
            }
        }
        // TEXT and BLOB read back through the shared binary container
        let expected: Vec<Value> = values
            .iter()
            .map(|v| match v {
                Value::Blob(b) => Value::Text(b.clone()),
                other => other.clone(),
            })
            .collect();
        assert_eq!(
            decoded, expected,
            "mismatch for {:?}/{:?}/{:?}",
            data_type, encoding, compression
        );
    }
    Ok(())
}

#[test]
fn multi_page_chunks_roundtrip_with_page_statistics() -> Result<()> {
    let config = TsFileConfig {
        page_max_point_count: 100,
        ..TsFileConfig::default()
    };
    let mut writer = TsFileWriter::with_config(vec![], config)?;
    let device = DeviceId::from_name("d1");
    writer.register_timeseries(
        device.clone(),
        MeasurementSchema::new(
            "s1",
            TsDataType::Int64,
            Encoding::Ts2Diff,
            Compression::Snappy,
        ),
    )?;
    for t in 0..1000i64 {
        writer.write_record(
            &tsfile2::data::RowRecord::new(device.clone(), t).with("s1", Value::Int64(t * 2)),
        )?;
    }
    writer.close()?;

    let reader = TsFileReader::open_with(
        Cursor::new(writer.into_inner()?),
        config,
        None,
    )?;
    let mut rows = reader.query_device(&device, &["s1"], None)?;
    let mut total = 0usize;
    let mut last_time = i64::MIN;
    while let Some(block) = rows.next_block()? {
        match block.column("s1").expect("column present") {
            ColumnValues::Int64(values) => {
                for (time, value) in block.times().iter().zip(values) {
                    assert!(*time > last_time);
                    last_time = *time;
                    assert_eq!(value.unwrap(), time * 2);
                }
            }
            _ => panic!("expected int64 column"),
        }
        total += block.row_count();
    }
    assert_eq!(total, 1000);
    Ok(())
}
