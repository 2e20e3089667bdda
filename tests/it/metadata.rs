//! File-level invariants: the magic framing, footer discovery with a large
//! footer, empty files, marker bytes and deterministic re-emission.

use tsfile2::compression::Compression;
use tsfile2::data::{RowRecord, Value};
use tsfile2::encoding::Encoding;
use tsfile2::error::{Result, TsFileError};
use tsfile2::read::SeriesIndexLookup;
use tsfile2::schema::{DeviceId, MeasurementSchema, TsDataType};
use tsfile2::write::TsFileWriter;
use tsfile2::{ONLY_ONE_PAGE_CHUNK_HEADER_MARKER, TSFILE_MAGIC};

use super::{open, write_single_series};

#[test]
fn tail_framing_invariant() -> Result<()> {
    let bytes = write_single_series(&[(1, 10)])?;
    let len = bytes.len();
    assert_eq!(&bytes[..6], &TSFILE_MAGIC);
    assert_eq!(&bytes[len - 6..], &TSFILE_MAGIC);
    let footer_size =
        u32::from_le_bytes(bytes[len - 10..len - 6].try_into().unwrap()) as usize;
    assert!(footer_size > 0);
    assert!(footer_size + 10 + 7 <= len);
    Ok(())
}

#[test]
fn empty_file_is_a_valid_tsfile_with_zero_series() -> Result<()> {
    let mut writer = TsFileWriter::new(vec![])?;
    writer.close()?;
    let reader = open(writer.into_inner()?)?;
    assert!(reader.metadata().bloom_filter.is_none());
    assert!(reader.metadata().table_index_roots.is_empty());

    let device = DeviceId::from_name("d1");
    assert!(matches!(
        reader.timeseries_index(&device, "s1"),
        Err(TsFileError::TableNotExist(_))
    ));
    Ok(())
}

#[test]
fn missing_series_surface_as_not_exist() -> Result<()> {
    let bytes = write_single_series(&[(1, 10)])?;
    let reader = open(bytes)?;

    // an unknown measurement of a known device
    let device = DeviceId::from_name("d1");
    assert!(matches!(
        reader.timeseries_index(&device, "nope"),
        Err(TsFileError::MeasurementNotExist(_))
    ));
    // an unknown table
    let ghost = DeviceId::from_name("ghost");
    assert!(matches!(
        reader.timeseries_index(&ghost, "s1"),
        Err(
            TsFileError::TableNotExist(_)
                | TsFileError::DeviceNotExist(_)
                | TsFileError::MeasurementNotExist(_)
        )
    ));
    Ok(())
}

#[test]
fn single_page_chunk_uses_marker_five_and_elides_page_statistics() -> Result<()> {
    let bytes = write_single_series(&[(1, 10), (2, 20), (3, 30)])?;
    let reader = open(bytes.clone())?;
    let device = DeviceId::from_name("d1");
    let index = match reader.timeseries_index(&device, "s1")? {
        SeriesIndexLookup::Unaligned(index) => index,
        _ => panic!("series is unaligned"),
    };
    let offset = index.chunk_metadata[0].offset_of_chunk_header as usize;
    assert_eq!(bytes[offset], ONLY_ONE_PAGE_CHUNK_HEADER_MARKER);
    Ok(())
}

#[test]
fn identical_input_reemits_identical_bytes() -> Result<()> {
    let first = write_single_series(&[(1, 10), (2, 20), (3, 30)])?;
    let second = write_single_series(&[(1, 10), (2, 20), (3, 30)])?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn large_footer_needs_a_second_tail_read() -> Result<()> {
    let mut writer = TsFileWriter::new(vec![])?;
    let device = DeviceId::from_name("d1");
    // enough wide-named measurements to push the footer past the first
    // 1 KiB tail read
    let names: Vec<String> = (0..64)
        .map(|i| format!("measurement_with_a_rather_long_name_{:04}", i))
        .collect();
    for name in &names {
        writer.register_timeseries(
            device.clone(),
            MeasurementSchema::new(
                name.clone(),
                TsDataType::Int32,
                Encoding::Plain,
                Compression::Uncompressed,
            ),
        )?;
    }
    let mut record = RowRecord::new(device.clone(), 7);
    for name in &names {
        record = record.with(name.clone(), Value::Int32(1));
    }
    writer.write_record(&record)?;
    writer.close()?;

    let bytes = writer.into_inner()?;
    let len = bytes.len();
    let footer_size =
        u32::from_le_bytes(bytes[len - 10..len - 6].try_into().unwrap()) as usize;
    assert!(
        footer_size + 10 > 1024,
        "footer of {} bytes does not exercise the second read",
        footer_size
    );

    let reader = open(bytes)?;
    let mut rows = reader.query_device(&device, &[names[63].as_str()], None)?;
    let block = rows.next_block()?.expect("one block");
    assert_eq!(block.times(), &[7]);
    Ok(())
}

#[test]
fn truncated_tail_is_corrupted() -> Result<()> {
    let mut bytes = write_single_series(&[(1, 10)])?;
    bytes.truncate(bytes.len() - 3);
    assert!(matches!(
        open(bytes),
        Err(TsFileError::Corrupted(_))
    ));
    Ok(())
}
