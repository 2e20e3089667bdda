//! The file writer orchestrator: schema registration, row and tablet entry
//! points, the memory-threshold flush and final metadata emission.

use std::collections::BTreeMap;
use std::io::Write;

use log::debug;

use crate::config::TsFileConfig;
use crate::data::{RowRecord, Tablet};
use crate::error::{Result, TsFileError};
use crate::io::{write_u8, write_u32_le, PositionedWrite, TrackedWrite};
use crate::metadata::{ChunkGroupMetadata, TsFileMeta};
use crate::schema::{
    ColumnCategory, ColumnSchema, DeviceId, MeasurementSchema, TableSchema,
};
use crate::{SEPARATOR_MARKER, TSFILE_MAGIC, VERSION_NUMBER};

use super::group::{AlignedGroupWriter, DeviceGroupWriter, UnalignedGroupWriter};
use super::index::{build_bloom_filter, build_metadata_index, TsmIterator};

/// Records are counted between memory checks; the first check happens after
/// this many rows and the interval is then extrapolated from the measured
/// buffer growth.
const FIRST_MEM_CHECK_RECORD_COUNT: usize = 1000;

/// Writes one TsFile: register schemas, feed rows or tablets, then `close`.
///
/// A writer instance is single-threaded; the emitted bytes form a strict
/// total order equal to the file offset order.
pub struct TsFileWriter<W: Write> {
    writer: TrackedWrite<W>,
    config: TsFileConfig,
    table_schemas: BTreeMap<String, TableSchema>,
    device_writers: BTreeMap<DeviceId, DeviceGroupWriter>,
    chunk_group_metadata: Vec<ChunkGroupMetadata>,
    props: BTreeMap<String, String>,
    records_since_flush: usize,
    record_count_for_next_mem_check: usize,
    closed: bool,
}

impl<W: Write> TsFileWriter<W> {
    pub fn new(writer: W) -> Result<Self> {
        Self::with_config(writer, TsFileConfig::default())
    }

    pub fn with_config(writer: W, config: TsFileConfig) -> Result<Self> {
        let mut writer = TrackedWrite::new(writer);
        writer
            .write_all(&TSFILE_MAGIC)
            .and_then(|_| writer.write_all(&[VERSION_NUMBER]))
            .map_err(crate::io::write_err)?;
        Ok(Self {
            writer,
            config,
            table_schemas: BTreeMap::new(),
            device_writers: BTreeMap::new(),
            chunk_group_metadata: vec![],
            props: BTreeMap::new(),
            records_since_flush: 0,
            record_count_for_next_mem_check: FIRST_MEM_CHECK_RECORD_COUNT,
            closed: false,
        })
    }

    pub fn config(&self) -> &TsFileConfig {
        &self.config
    }

    /// Attaches a free-form property to the footer.
    pub fn add_prop(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.props.insert(key.into(), value.into());
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(TsFileError::InvalidState(
                "the writer is closed".to_string(),
            ));
        }
        Ok(())
    }

    /// Registers a table schema. Registering the same name twice is an
    /// error.
    pub fn register_table(&mut self, schema: TableSchema) -> Result<()> {
        self.ensure_open()?;
        if self.table_schemas.contains_key(&schema.table_name) {
            return Err(TsFileError::AlreadyExists(format!(
                "table \"{}\"",
                schema.table_name
            )));
        }
        self.table_schemas.insert(schema.table_name.clone(), schema);
        Ok(())
    }

    /// Registers one unaligned timeseries. The device's table schema is
    /// created implicitly when absent.
    pub fn register_timeseries(
        &mut self,
        device: DeviceId,
        schema: MeasurementSchema,
    ) -> Result<()> {
        self.ensure_open()?;
        self.extend_implicit_table(&device, &schema);
        let config = self.config;
        let group = self
            .device_writers
            .entry(device.clone())
            .or_insert_with(|| {
                DeviceGroupWriter::Unaligned(UnalignedGroupWriter::new(device.clone(), config))
            });
        match group {
            DeviceGroupWriter::Unaligned(group) => group.register(schema),
            DeviceGroupWriter::Aligned(_) => Err(TsFileError::InvalidArg(format!(
                "device {} is registered as aligned",
                device
            ))),
        }
    }

    /// Registers an aligned group of timeseries. Within one device the
    /// aligned flavor is fixed on first registration.
    pub fn register_aligned_timeseries(
        &mut self,
        device: DeviceId,
        schemas: Vec<MeasurementSchema>,
    ) -> Result<()> {
        self.ensure_open()?;
        for schema in &schemas {
            self.extend_implicit_table(&device, schema);
        }
        if !self.device_writers.contains_key(&device) {
            let group =
                DeviceGroupWriter::Aligned(AlignedGroupWriter::new(device.clone(), self.config)?);
            self.device_writers.insert(device.clone(), group);
        }
        let group = self
            .device_writers
            .get_mut(&device)
            .expect("group registered above");
        match group {
            DeviceGroupWriter::Aligned(group) => {
                for schema in schemas {
                    group.register(schema)?;
                }
                Ok(())
            }
            DeviceGroupWriter::Unaligned(_) => Err(TsFileError::InvalidArg(format!(
                "device {} is registered as unaligned",
                device
            ))),
        }
    }

    /// The footer carries a schema for every table; tree-style registration
    /// grows one implicitly, with the measurements as FIELD columns.
    fn extend_implicit_table(&mut self, device: &DeviceId, schema: &MeasurementSchema) {
        let table = self
            .table_schemas
            .entry(device.table_name().to_string())
            .or_insert_with(|| TableSchema {
                table_name: device.table_name().to_string(),
                columns: vec![],
            });
        if table.column(&schema.name).is_none() {
            table.columns.push(ColumnSchema {
                measurement: schema.clone(),
                category: ColumnCategory::Field,
            });
        }
    }

    /// Writes a single row addressed to one registered device.
    pub fn write_record(&mut self, record: &RowRecord) -> Result<()> {
        self.ensure_open()?;
        let group = self.device_writers.get_mut(&record.device).ok_or_else(|| {
            TsFileError::DeviceNotExist(format!("device {}", record.device))
        })?;
        match group {
            DeviceGroupWriter::Unaligned(group) => {
                for point in &record.points {
                    group.write(&point.measurement, record.timestamp, &point.value)?;
                }
            }
            DeviceGroupWriter::Aligned(group) => {
                let values: BTreeMap<&str, &crate::data::Value> = record
                    .points
                    .iter()
                    .map(|point| (point.measurement.as_str(), &point.value))
                    .collect();
                group.write_row(record.timestamp, &values)?;
            }
        }
        self.record_written(1)
    }

    /// Writes a columnar batch of FIELD columns for the single device named
    /// by the tablet's target.
    pub fn write_tablet(&mut self, tablet: &Tablet) -> Result<()> {
        self.ensure_open()?;
        let device = DeviceId::from_name(&tablet.target);
        for column in &tablet.columns {
            if column.category == ColumnCategory::Tag {
                return Err(TsFileError::InvalidArg(
                    "device tablets carry FIELD columns only".to_string(),
                ));
            }
        }
        let group = self
            .device_writers
            .get_mut(&device)
            .ok_or_else(|| TsFileError::DeviceNotExist(format!("device {}", device)))?;
        for column in &tablet.columns {
            if !group.has_measurement(column.name()) {
                return Err(TsFileError::MeasurementNotExist(format!(
                    "measurement \"{}\" of device {}",
                    column.name(),
                    device
                )));
            }
        }
        let rows = tablet.row_count();
        match group {
            DeviceGroupWriter::Unaligned(group) => {
                for row in 0..rows {
                    let time = tablet.timestamps[row];
                    for (column, values) in tablet.columns.iter().zip(&tablet.values) {
                        if let Some(value) = values.get(row) {
                            group.write(column.name(), time, &value)?;
                        }
                    }
                }
            }
            DeviceGroupWriter::Aligned(group) => {
                for row in 0..rows {
                    let time = tablet.timestamps[row];
                    let mut values = BTreeMap::new();
                    let mut holder = Vec::with_capacity(tablet.columns.len());
                    for (column, column_values) in tablet.columns.iter().zip(&tablet.values) {
                        if let Some(value) = column_values.get(row) {
                            holder.push((column.name(), value));
                        }
                    }
                    for (name, value) in &holder {
                        values.insert(*name, value);
                    }
                    group.write_row(time, &values)?;
                }
            }
        }
        self.record_written(rows)
    }

    /// Writes a columnar batch spanning multiple devices of one table. The
    /// tablet is split into contiguous same-device runs; the device id of a
    /// row is the tuple of its TAG column values in schema order.
    pub fn write_table(&mut self, tablet: &Tablet) -> Result<()> {
        self.ensure_open()?;
        let schema = self
            .table_schemas
            .get(&tablet.target)
            .ok_or_else(|| TsFileError::TableNotExist(format!("table \"{}\"", tablet.target)))?
            .clone();
        for column in &tablet.columns {
            let registered = schema.column(column.name()).ok_or_else(|| {
                TsFileError::ColumnNotExist(format!(
                    "column \"{}\" of table \"{}\"",
                    column.name(),
                    tablet.target
                ))
            })?;
            if registered.category != column.category
                || registered.measurement.data_type != column.measurement.data_type
            {
                return Err(TsFileError::InvalidArg(format!(
                    "column \"{}\" does not match the registered schema",
                    column.name()
                )));
            }
        }

        let rows = tablet.row_count();
        let device_ids: Vec<DeviceId> = (0..rows)
            .map(|row| tablet.device_id(row))
            .collect::<Result<_>>()?;

        let mut row = 0;
        while row < rows {
            let device = &device_ids[row];
            let mut run_end = row + 1;
            while run_end < rows && &device_ids[run_end] == device {
                run_end += 1;
            }
            self.write_table_run(tablet, device, row, run_end)?;
            row = run_end;
        }
        self.record_written(rows)
    }

    fn write_table_run(
        &mut self,
        tablet: &Tablet,
        device: &DeviceId,
        start: usize,
        end: usize,
    ) -> Result<()> {
        let config = self.config;
        let group = self
            .device_writers
            .entry(device.clone())
            .or_insert_with(|| {
                DeviceGroupWriter::Unaligned(UnalignedGroupWriter::new(device.clone(), config))
            });
        let group = match group {
            DeviceGroupWriter::Unaligned(group) => group,
            DeviceGroupWriter::Aligned(_) => {
                return Err(TsFileError::InvalidArg(format!(
                    "device {} is registered as aligned",
                    device
                )))
            }
        };
        for (column, _) in tablet
            .columns
            .iter()
            .zip(&tablet.values)
            .filter(|(column, _)| column.category == ColumnCategory::Field)
        {
            if !group.has_measurement(column.name()) {
                group.register(column.measurement.clone())?;
            }
        }
        for row in start..end {
            let time = tablet.timestamps[row];
            for (column, values) in tablet
                .columns
                .iter()
                .zip(&tablet.values)
                .filter(|(column, _)| column.category == ColumnCategory::Field)
            {
                if let Some(value) = values.get(row) {
                    group.write(column.name(), time, &value)?;
                }
            }
        }
        Ok(())
    }

    fn record_written(&mut self, rows: usize) -> Result<()> {
        self.records_since_flush += rows;
        if self.records_since_flush >= self.record_count_for_next_mem_check {
            self.check_memory_size()?;
        }
        Ok(())
    }

    /// Extrapolates the next check interval from the measured buffer growth
    /// and flushes once the pending bytes exceed the configured threshold.
    fn check_memory_size(&mut self) -> Result<()> {
        let memory_size: usize = self
            .device_writers
            .values()
            .map(|group| group.estimate_size())
            .sum();
        if memory_size == 0 {
            return Ok(());
        }
        self.record_count_for_next_mem_check = (self.records_since_flush
            * self.config.chunk_group_size_threshold
            / memory_size)
            .max(1);
        if memory_size > self.config.chunk_group_size_threshold {
            debug!(
                "pending {} bytes exceed the chunk group threshold, flushing",
                memory_size
            );
            self.flush()?;
        }
        Ok(())
    }

    /// Forces every open chunk group to disk, devices in device-id order.
    /// With nothing pending this is a no-op.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        for group in self.device_writers.values_mut() {
            if let Some(metadata) = group.flush(&mut self.writer)? {
                self.chunk_group_metadata.push(metadata);
            }
        }
        self.records_since_flush = 0;
        Ok(())
    }

    /// Final flush, index and footer emission. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;

        let meta_offset = self.writer.pos() as i64;
        write_u8(&mut self.writer, SEPARATOR_MARKER)?;

        let iterator = TsmIterator::new(&self.chunk_group_metadata)?;
        let table_index_roots = build_metadata_index(&mut self.writer, &iterator, &self.config)?;
        let bloom_filter = build_bloom_filter(&iterator, &self.config);

        let meta = TsFileMeta {
            table_index_roots,
            table_schemas: self.table_schemas.clone(),
            meta_offset,
            bloom_filter,
            props: self.props.clone(),
        };
        let footer_start = self.writer.pos();
        meta.serialize(&mut self.writer)?;
        let footer_size = (self.writer.pos() - footer_start) as u32;

        write_u32_le(&mut self.writer, footer_size)?;
        self.writer
            .write_all(&TSFILE_MAGIC)
            .map_err(crate::io::write_err)?;
        self.writer.flush().map_err(crate::io::write_err)?;
        self.closed = true;
        Ok(())
    }

    /// The total bytes written so far.
    pub fn pos(&self) -> u64 {
        self.writer.pos()
    }

    /// Returns the underlying sink. The writer must be closed.
    pub fn into_inner(self) -> Result<W> {
        if !self.closed {
            return Err(TsFileError::InvalidState(
                "close the writer before taking the sink".to_string(),
            ));
        }
        Ok(self.writer.into_inner())
    }
}
