//! Per-device chunk group writers: one open chunk per measurement, flushed
//! together as a marked chunk group.

use std::collections::BTreeMap;

use log::warn;

use crate::config::TsFileConfig;
use crate::data::Value;
use crate::error::{Result, TsFileError};
use crate::io::{write_u8, PositionedWrite};
use crate::metadata::ChunkGroupMetadata;
use crate::schema::{DeviceId, MeasurementSchema};
use crate::CHUNK_GROUP_HEADER_MARKER;

use super::chunk::{ChunkWriter, TimeChunkWriter, ValueChunkWriter};

/// The writer of one unaligned device.
pub(crate) struct UnalignedGroupWriter {
    device: DeviceId,
    chunk_writers: BTreeMap<String, ChunkWriter>,
    config: TsFileConfig,
}

impl UnalignedGroupWriter {
    pub fn new(device: DeviceId, config: TsFileConfig) -> Self {
        Self {
            device,
            chunk_writers: BTreeMap::new(),
            config,
        }
    }

    pub fn register(&mut self, schema: MeasurementSchema) -> Result<()> {
        if self.chunk_writers.contains_key(&schema.name) {
            return Err(TsFileError::AlreadyExists(format!(
                "measurement \"{}\" of device {}",
                schema.name, self.device
            )));
        }
        let writer = ChunkWriter::new(
            schema.clone(),
            self.config.time_encoding,
            self.config.page_max_point_count,
            self.config.page_max_memory_bytes,
        )?;
        self.chunk_writers.insert(schema.name, writer);
        Ok(())
    }

    pub fn has_measurement(&self, measurement: &str) -> bool {
        self.chunk_writers.contains_key(measurement)
    }

    /// Writes one point. A type-mismatched value is dropped and logged, per
    /// the recoverable-error contract of the writer.
    pub fn write(&mut self, measurement: &str, time: i64, value: &Value) -> Result<()> {
        let writer = self.chunk_writers.get_mut(measurement).ok_or_else(|| {
            TsFileError::MeasurementNotExist(format!(
                "measurement \"{}\" of device {}",
                measurement, self.device
            ))
        })?;
        match writer.write(time, value) {
            Err(TsFileError::InvalidDataPoint(message)) => {
                warn!(
                    "dropping point at t={} of {}.{}: {}",
                    time, self.device, measurement, message
                );
                Ok(())
            }
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_writers.values().all(|writer| writer.is_empty())
    }

    pub fn estimate_size(&self) -> usize {
        self.chunk_writers
            .values()
            .map(|writer| writer.estimate_size())
            .sum()
    }

    /// Emits the chunk group: header marker, device id, then every
    /// non-empty chunk in measurement-name order.
    pub fn flush<W: PositionedWrite>(
        &mut self,
        writer: &mut W,
    ) -> Result<Option<ChunkGroupMetadata>> {
        if self.is_empty() {
            return Ok(None);
        }
        write_u8(writer, CHUNK_GROUP_HEADER_MARKER)?;
        self.device.serialize(writer)?;

        let mut metadata = ChunkGroupMetadata::new(self.device.clone());
        for chunk_writer in self.chunk_writers.values_mut() {
            if let Some(chunk) = chunk_writer.seal(writer)? {
                metadata.chunks.push(chunk);
            }
        }
        Ok(Some(metadata))
    }
}

/// The writer of one aligned device: a shared time chunk plus one value
/// chunk per measurement, sealed in lock-step so every value page covers
/// exactly the rows of its time page slice.
pub(crate) struct AlignedGroupWriter {
    device: DeviceId,
    time_writer: TimeChunkWriter,
    value_writers: BTreeMap<String, ValueChunkWriter>,
    config: TsFileConfig,
}

impl AlignedGroupWriter {
    pub fn new(device: DeviceId, config: TsFileConfig) -> Result<Self> {
        Ok(Self {
            device,
            time_writer: TimeChunkWriter::new(config.time_encoding, config.time_compression)?,
            value_writers: BTreeMap::new(),
            config,
        })
    }

    pub fn register(&mut self, schema: MeasurementSchema) -> Result<()> {
        if schema.name.is_empty() {
            return Err(TsFileError::InvalidArg(
                "the empty measurement name is reserved for the time chunk".to_string(),
            ));
        }
        if self.value_writers.contains_key(&schema.name) {
            return Err(TsFileError::AlreadyExists(format!(
                "measurement \"{}\" of device {}",
                schema.name, self.device
            )));
        }
        self.value_writers
            .insert(schema.name.clone(), ValueChunkWriter::new(schema)?);
        Ok(())
    }

    pub fn has_measurement(&self, measurement: &str) -> bool {
        self.value_writers.contains_key(measurement)
    }

    /// Writes one full row: the timestamp plus one optional value per
    /// registered measurement. Absent and mismatched values become nulls so
    /// row alignment is never broken.
    pub fn write_row(&mut self, time: i64, values: &BTreeMap<&str, &Value>) -> Result<()> {
        for unknown in values.keys() {
            if !self.value_writers.contains_key(*unknown) {
                return Err(TsFileError::MeasurementNotExist(format!(
                    "measurement \"{}\" of device {}",
                    unknown, self.device
                )));
            }
        }
        self.time_writer.write(time)?;
        for (name, writer) in self.value_writers.iter_mut() {
            let value = values.get(name.as_str()).copied();
            match writer.write(time, value) {
                Err(TsFileError::InvalidDataPoint(message)) => {
                    warn!(
                        "nulling point at t={} of {}.{}: {}",
                        time, self.device, name, message
                    );
                    writer.write(time, None)?;
                }
                other => other?,
            }
        }
        if self.time_writer.page_point_count() >= self.config.page_max_point_count
            || self.time_writer.page_size() >= self.config.page_max_memory_bytes
        {
            self.seal_pages()?;
        }
        Ok(())
    }

    fn seal_pages(&mut self) -> Result<()> {
        self.time_writer.seal_page()?;
        for writer in self.value_writers.values_mut() {
            writer.seal_page()?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.time_writer.is_empty()
    }

    pub fn estimate_size(&self) -> usize {
        self.time_writer.estimate_size()
            + self
                .value_writers
                .values()
                .map(|writer| writer.estimate_size())
                .sum::<usize>()
    }

    /// Emits the chunk group: the time chunk first, then value chunks in
    /// measurement-name order.
    pub fn flush<W: PositionedWrite>(
        &mut self,
        writer: &mut W,
    ) -> Result<Option<ChunkGroupMetadata>> {
        if self.is_empty() {
            return Ok(None);
        }
        write_u8(writer, CHUNK_GROUP_HEADER_MARKER)?;
        self.device.serialize(writer)?;

        let mut metadata = ChunkGroupMetadata::new(self.device.clone());
        if let Some(chunk) = self.time_writer.seal(writer)? {
            metadata.chunks.push(chunk);
        }
        for value_writer in self.value_writers.values_mut() {
            if let Some(chunk) = value_writer.seal(writer)? {
                metadata.chunks.push(chunk);
            }
        }
        Ok(Some(metadata))
    }
}

/// A registered device is either aligned or unaligned; the flavor is fixed
/// at first registration.
pub(crate) enum DeviceGroupWriter {
    Unaligned(UnalignedGroupWriter),
    Aligned(AlignedGroupWriter),
}

impl DeviceGroupWriter {
    pub fn is_aligned(&self) -> bool {
        matches!(self, DeviceGroupWriter::Aligned(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DeviceGroupWriter::Unaligned(group) => group.is_empty(),
            DeviceGroupWriter::Aligned(group) => group.is_empty(),
        }
    }

    pub fn has_measurement(&self, measurement: &str) -> bool {
        match self {
            DeviceGroupWriter::Unaligned(group) => group.has_measurement(measurement),
            DeviceGroupWriter::Aligned(group) => group.has_measurement(measurement),
        }
    }

    pub fn estimate_size(&self) -> usize {
        match self {
            DeviceGroupWriter::Unaligned(group) => group.estimate_size(),
            DeviceGroupWriter::Aligned(group) => group.estimate_size(),
        }
    }

    pub fn flush<W: PositionedWrite>(
        &mut self,
        writer: &mut W,
    ) -> Result<Option<ChunkGroupMetadata>> {
        match self {
            DeviceGroupWriter::Unaligned(group) => group.flush(writer),
            DeviceGroupWriter::Aligned(group) => group.flush(writer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::Compression;
    use crate::encoding::Encoding;
    use crate::io::TrackedWrite;
    use crate::schema::TsDataType;

    fn unaligned() -> UnalignedGroupWriter {
        let mut group = UnalignedGroupWriter::new(
            DeviceId::from_name("d1"),
            TsFileConfig::default(),
        );
        group
            .register(MeasurementSchema::new(
                "s1",
                TsDataType::Int32,
                Encoding::Plain,
                Compression::Uncompressed,
            ))
            .unwrap();
        group
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut group = unaligned();
        let result = group.register(MeasurementSchema::new(
            "s1",
            TsDataType::Int32,
            Encoding::Plain,
            Compression::Uncompressed,
        ));
        assert!(matches!(result, Err(TsFileError::AlreadyExists(_))));
    }

    #[test]
    fn type_mismatch_is_dropped_not_fatal() -> Result<()> {
        let mut group = unaligned();
        group.write("s1", 1, &Value::Int32(1))?;
        group.write("s1", 2, &Value::Double(0.5))?;
        group.write("s1", 3, &Value::Int32(3))?;

        let mut writer = TrackedWrite::new(vec![]);
        let metadata = group.flush(&mut writer)?.unwrap();
        assert_eq!(metadata.chunks[0].statistics.count(), 2);
        Ok(())
    }

    #[test]
    fn unknown_measurement_is_an_error() {
        let mut group = unaligned();
        assert!(matches!(
            group.write("nope", 1, &Value::Int32(1)),
            Err(TsFileError::MeasurementNotExist(_))
        ));
    }

    #[test]
    fn empty_group_flushes_to_nothing() -> Result<()> {
        let mut group = unaligned();
        let mut writer = TrackedWrite::new(vec![]);
        assert!(group.flush(&mut writer)?.is_none());
        assert_eq!(writer.pos(), 0);
        Ok(())
    }

    #[test]
    fn aligned_group_keeps_time_chunk_first() -> Result<()> {
        let mut group =
            AlignedGroupWriter::new(DeviceId::from_name("d2"), TsFileConfig::default())?;
        group.register(MeasurementSchema::new(
            "s1",
            TsDataType::Int64,
            Encoding::Plain,
            Compression::Uncompressed,
        ))?;
        group.register(MeasurementSchema::new(
            "s2",
            TsDataType::Double,
            Encoding::Gorilla,
            Compression::Uncompressed,
        ))?;

        let s1 = Value::Int64(1);
        let mut row = BTreeMap::new();
        row.insert("s1", &s1);
        group.write_row(100, &row)?;

        let mut writer = TrackedWrite::new(vec![]);
        let metadata = group.flush(&mut writer)?.unwrap();
        assert_eq!(metadata.chunks.len(), 3);
        assert_eq!(metadata.chunks[0].measurement, "");
        assert_eq!(metadata.chunks[0].mask, crate::metadata::ALIGNED_TIME_MASK);
        assert_eq!(metadata.chunks[1].measurement, "s1");
        assert_eq!(metadata.chunks[1].mask, crate::metadata::ALIGNED_VALUE_MASK);
        // s2 was null for the only row but its chunk still exists with one
        // all-null page
        assert_eq!(metadata.chunks[2].measurement, "s2");
        assert_eq!(metadata.chunks[2].statistics.count(), 0);
        Ok(())
    }
}
