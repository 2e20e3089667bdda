use std::io::Cursor;

use tsfile2::compression::Compression;
use tsfile2::data::{RowRecord, Value};
use tsfile2::encoding::Encoding;
use tsfile2::error::Result;
use tsfile2::read::TsFileReader;
use tsfile2::schema::{DeviceId, MeasurementSchema, TsDataType};
use tsfile2::write::TsFileWriter;

mod bloom;
mod flush;
mod lifecycle;
mod metadata;
mod write_read;

/// Writes one unaligned int32 series `d1.s1` with the given points and
/// returns the file bytes.
fn write_single_series(points: &[(i64, i32)]) -> Result<Vec<u8>> {
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
    for (time, value) in points {
        writer.write_record(
            &RowRecord::new(device.clone(), *time).with("s1", Value::Int32(*value)),
        )?;
    }
    writer.close()?;
    writer.into_inner()
}

fn open(bytes: Vec<u8>) -> Result<TsFileReader<Cursor<Vec<u8>>>> {
    TsFileReader::open(Cursor::new(bytes))
}
