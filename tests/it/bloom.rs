//! The footer bloom filter: no false negatives, bounded false positives.

use tsfile2::bloom_filter::BloomFilter;
use tsfile2::compression::Compression;
use tsfile2::data::{RowRecord, Value};
use tsfile2::encoding::Encoding;
use tsfile2::error::Result;
use tsfile2::schema::{DeviceId, MeasurementSchema, TsDataType};
use tsfile2::write::TsFileWriter;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::open;

#[test]
fn registered_series_are_always_positive() -> Result<()> {
    let mut writer = TsFileWriter::new(vec![])?;
    let device = DeviceId::from_name("d1");
    for i in 0..100 {
        let name = format!("s{}", i);
        writer.register_timeseries(
            device.clone(),
            MeasurementSchema::new(
                name.clone(),
                TsDataType::Int32,
                Encoding::Plain,
                Compression::Uncompressed,
            ),
        )?;
        writer.write_record(&RowRecord::new(device.clone(), 1).with(name, Value::Int32(1)))?;
    }
    writer.close()?;

    let reader = open(writer.into_inner()?)?;
    let filter = reader.metadata().bloom_filter.as_ref().expect("filter");
    for i in 0..100 {
        let entry = BloomFilter::entry("d1", &device, &format!("s{}", i));
        assert!(filter.contains(&entry));
    }
    Ok(())
}

#[test]
fn unregistered_series_stay_below_twice_the_configured_rate() -> Result<()> {
    let mut writer = TsFileWriter::new(vec![])?;
    let device = DeviceId::from_name("d1");
    let mut rng = StdRng::seed_from_u64(0x7ef1);
    for i in 0..1000 {
        let name = format!("series_{}_{}", i, rng.gen::<u32>());
        writer.register_timeseries(
            device.clone(),
            MeasurementSchema::new(
                name.clone(),
                TsDataType::Int64,
                Encoding::Ts2Diff,
                Compression::Uncompressed,
            ),
        )?;
        writer.write_record(&RowRecord::new(device.clone(), 1).with(name, Value::Int64(1)))?;
    }
    writer.close()?;

    let reader = open(writer.into_inner()?)?;
    let filter = reader.metadata().bloom_filter.as_ref().expect("filter");

    let false_positives = (0..1000)
        .filter(|i| {
            let entry =
                BloomFilter::entry("d1", &device, &format!("absent_{}_{}", i, rng.gen::<u32>()));
            filter.contains(&entry)
        })
        .count();
    // configured rate 0.05, allow twice that probabilistically
    assert!(
        false_positives <= 100,
        "false positive rate too high: {}/1000",
        false_positives
    );
    Ok(())
}
