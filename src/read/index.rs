//! Metadata-index descent: from a table's root node down to the timeseries
//! index of one (device, measurement), by binary search over sorted
//! children.

use std::io::{Cursor, Read, Seek};
use std::sync::Arc;

use crate::bloom_filter::BloomFilter;
use crate::error::{Result, TsFileError};
use crate::metadata::{
    IndexKey, MetadataIndexNode, MetadataIndexNodeType, TimeseriesIndex,
};
use crate::schema::DeviceId;

use super::{ReaderInner, TsFileReader};

/// The outcome of one series lookup: aligned series resolve to both their
/// time index and the requested value index.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesIndexLookup {
    Unaligned(TimeseriesIndex),
    Aligned {
        time: TimeseriesIndex,
        value: TimeseriesIndex,
    },
}

pub(crate) fn read_node<R: Read + Seek>(
    inner: &Arc<ReaderInner<R>>,
    region: (i64, i64),
) -> Result<MetadataIndexNode> {
    let (start, end) = region;
    if end <= start {
        return Err(corrupted_err!(
            "index node region [{}, {}) is empty",
            start,
            end
        ));
    }
    let bytes = inner.read_region(start as u64, (end - start) as usize)?;
    MetadataIndexNode::deserialize(&mut Cursor::new(bytes))
}

/// Walks the device tree to the region holding the device's measurement
/// index root.
pub(crate) fn descend_device<R: Read + Seek>(
    inner: &Arc<ReaderInner<R>>,
    root: &MetadataIndexNode,
    device: &DeviceId,
) -> Result<(i64, i64)> {
    let target = IndexKey::Device(device.clone());
    let mut node = root.clone();
    loop {
        match node.node_type {
            MetadataIndexNodeType::InternalDevice => {
                let index = node.binary_search(&target, false).map_err(|_| {
                    TsFileError::DeviceNotExist(format!("device {}", device))
                })?;
                node = read_node(inner, node.child_region(index))?;
            }
            MetadataIndexNodeType::LeafDevice => {
                let index = node.binary_search(&target, true).map_err(|_| {
                    TsFileError::DeviceNotExist(format!("device {}", device))
                })?;
                return Ok(node.child_region(index));
            }
            _ => {
                return Err(corrupted_err!(
                    "measurement node reached while descending the device tree"
                ))
            }
        }
    }
}

/// Walks a device's measurement tree, returning every timeseries index
/// stored in the leaf region the name maps to. The leaf search is a prefix
/// (floor) match; the caller picks the exact record.
fn descend_measurement<R: Read + Seek>(
    inner: &Arc<ReaderInner<R>>,
    measurement_root_region: (i64, i64),
    measurement: &str,
) -> Result<Vec<TimeseriesIndex>> {
    let target = IndexKey::Measurement(measurement.to_string());
    let mut node = read_node(inner, measurement_root_region)?;
    loop {
        match node.node_type {
            MetadataIndexNodeType::InternalMeasurement => {
                let index = node.binary_search(&target, false).map_err(|_| {
                    TsFileError::MeasurementNotExist(format!("measurement \"{}\"", measurement))
                })?;
                node = read_node(inner, node.child_region(index))?;
            }
            MetadataIndexNodeType::LeafMeasurement => {
                let index = node.binary_search(&target, false).map_err(|_| {
                    TsFileError::MeasurementNotExist(format!("measurement \"{}\"", measurement))
                })?;
                let (start, end) = node.child_region(index);
                let bytes = inner.read_region(start as u64, (end - start) as usize)?;
                let mut cursor = Cursor::new(bytes);
                let mut records = vec![];
                while (cursor.position() as usize) < cursor.get_ref().len() {
                    records.push(TimeseriesIndex::deserialize(&mut cursor)?);
                }
                return Ok(records);
            }
            _ => {
                return Err(corrupted_err!(
                    "device node reached while descending a measurement tree"
                ))
            }
        }
    }
}

/// Finds one measurement's index below a measurement root region, resolving
/// the paired time index for aligned series. `Ok(None)` means the series is
/// absent for this device.
pub(crate) fn find_series<R: Read + Seek>(
    inner: &Arc<ReaderInner<R>>,
    measurement_root_region: (i64, i64),
    measurement: &str,
) -> Result<Option<SeriesIndexLookup>> {
    let records = match descend_measurement(inner, measurement_root_region, measurement) {
        Ok(records) => records,
        Err(TsFileError::MeasurementNotExist(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    let value = match records
        .into_iter()
        .find(|record| record.measurement == measurement)
    {
        Some(record) => record,
        None => return Ok(None),
    };
    if !value.is_aligned_value() {
        return Ok(Some(SeriesIndexLookup::Unaligned(value)));
    }
    // aligned series: the shared time index lives under the empty name,
    // which sorts first in the measurement tree
    let time = descend_measurement(inner, measurement_root_region, "")?
        .into_iter()
        .find(|record| record.is_aligned_time())
        .ok_or_else(|| {
            corrupted_err!("aligned series \"{}\" lacks its time index", measurement)
        })?;
    Ok(Some(SeriesIndexLookup::Aligned { time, value }))
}

impl<R: Read + Seek> TsFileReader<R> {
    /// Descends the metadata index to the timeseries index of
    /// `(device, measurement)`.
    pub fn timeseries_index(
        &self,
        device: &DeviceId,
        measurement: &str,
    ) -> Result<SeriesIndexLookup> {
        if let Some(filter) = &self.metadata().bloom_filter {
            let entry = BloomFilter::entry(device.table_name(), device, measurement);
            if !filter.contains(&entry) {
                return Err(TsFileError::MeasurementNotExist(format!(
                    "measurement \"{}\" of device {}",
                    measurement, device
                )));
            }
        }
        let root = self
            .metadata()
            .table_index_roots
            .get(device.table_name())
            .ok_or_else(|| {
                TsFileError::TableNotExist(format!("table \"{}\"", device.table_name()))
            })?
            .clone();
        let region = descend_device(self.inner(), &root, device)?;
        find_series(self.inner(), region, measurement)?.ok_or_else(|| {
            TsFileError::MeasurementNotExist(format!(
                "measurement \"{}\" of device {}",
                measurement, device
            ))
        })
    }
}
