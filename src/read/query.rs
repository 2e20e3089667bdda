//! The alignment engine: per-column scan iterators merged by minimum
//! timestamp into row blocks, driven device by device in device-id order.

use std::collections::VecDeque;
use std::io::{Read, Seek};
use std::sync::{Arc, Weak};

use crate::data::{ColumnValues, TsBlock, Value};
use crate::encoding::Encoding;
use crate::error::{Result, TsFileError};
use crate::metadata::{IndexKey, MetadataIndexNode, MetadataIndexNodeType};
use crate::schema::{ColumnCategory, DeviceId, TsDataType};

use super::chunk::{AlignedSeriesScanIterator, SeriesScanIterator};
use super::filter::Filter;
use super::index::{find_series, read_node, SeriesIndexLookup};
use super::{ReaderInner, TsFileReader};

/// Rows per emitted block.
const MAX_BLOCK_ROWS: usize = 1024;

/// The requested result ordering. Only device-major order is implemented;
/// a time-major request fails with a typed `UnsupportedOrder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOrder {
    DeviceMajor,
    TimeMajor,
}

/// A table scan request: requested output columns (TAG and/or FIELD), an
/// optional row filter and the result order.
pub struct Query {
    pub table: String,
    pub columns: Vec<String>,
    pub filter: Option<Arc<dyn Filter>>,
    pub order: ResultOrder,
}

impl Query {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns,
            filter: None,
            order: ResultOrder::DeviceMajor,
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_order(mut self, order: ResultOrder) -> Self {
        self.order = order;
        self
    }
}

/// A device produced by walking the device index, with the byte region of
/// its measurement index root.
pub struct DeviceTask {
    pub device: DeviceId,
    pub(crate) measurement_root: (i64, i64),
}

/// An optional predicate over device ids, applied while walking the index.
pub type IdFilter = Arc<dyn Fn(&DeviceId) -> bool>;

enum StackItem {
    Node(MetadataIndexNode),
    Region((i64, i64)),
}

/// Walks a table's device index depth-first, yielding devices in ascending
/// device-id order.
pub struct DeviceTaskIterator<R: Read + Seek> {
    inner: Weak<ReaderInner<R>>,
    stack: Vec<StackItem>,
    pending: VecDeque<DeviceTask>,
    id_filter: Option<IdFilter>,
}

impl<R: Read + Seek> DeviceTaskIterator<R> {
    pub(crate) fn new(
        inner: Weak<ReaderInner<R>>,
        root: Option<MetadataIndexNode>,
        id_filter: Option<IdFilter>,
    ) -> Self {
        Self {
            inner,
            stack: root.into_iter().map(StackItem::Node).collect(),
            pending: VecDeque::new(),
            id_filter,
        }
    }

    pub fn next_task(&mut self) -> Result<Option<DeviceTask>> {
        loop {
            if let Some(task) = self.pending.pop_front() {
                return Ok(Some(task));
            }
            let item = match self.stack.pop() {
                Some(item) => item,
                None => return Ok(None),
            };
            let inner = self.inner.upgrade().ok_or_else(|| {
                TsFileError::InvalidState("the owning reader is gone".to_string())
            })?;
            let node = match item {
                StackItem::Node(node) => node,
                StackItem::Region(region) => read_node(&inner, region)?,
            };
            match node.node_type {
                MetadataIndexNodeType::LeafDevice => {
                    for index in 0..node.children.len() {
                        let device = match &node.children[index].key {
                            IndexKey::Device(device) => device.clone(),
                            IndexKey::Measurement(_) => {
                                return Err(corrupted_err!(
                                    "measurement key inside a device leaf"
                                ))
                            }
                        };
                        if let Some(filter) = &self.id_filter {
                            if !filter(&device) {
                                continue;
                            }
                        }
                        self.pending.push_back(DeviceTask {
                            device,
                            measurement_root: node.child_region(index),
                        });
                    }
                }
                MetadataIndexNodeType::InternalDevice => {
                    // reversed so the leftmost child is expanded first
                    for index in (0..node.children.len()).rev() {
                        self.stack.push(StackItem::Region(node.child_region(index)));
                    }
                }
                _ => {
                    return Err(corrupted_err!(
                        "measurement node reached while walking the device index"
                    ))
                }
            }
        }
    }
}

enum Scan<R: Read + Seek> {
    Unaligned(SeriesScanIterator<R>),
    Aligned(AlignedSeriesScanIterator<R>),
}

impl<R: Read + Seek> Scan<R> {
    fn next_point(&mut self) -> Result<Option<(i64, Value)>> {
        match self {
            Scan::Unaligned(scan) => scan.next_point(),
            Scan::Aligned(scan) => scan.next_point(),
        }
    }

    fn close(&mut self) {
        match self {
            Scan::Unaligned(scan) => scan.close(),
            Scan::Aligned(scan) => scan.close(),
        }
    }
}

enum ColumnKind<R: Read + Seek> {
    /// A TAG column holds one constant value per device.
    Tag(Option<String>),
    Field {
        data_type: TsDataType,
        scan: Option<Scan<R>>,
        head: Option<(i64, Value)>,
    },
}

struct ColumnState<R: Read + Seek> {
    name: String,
    kind: ColumnKind<R>,
}

/// Materializes the rows of one device by merging its column iterators on
/// the minimum current timestamp. Columns without a value at that timestamp
/// contribute null.
pub struct DeviceRowIterator<R: Read + Seek> {
    inner: Weak<ReaderInner<R>>,
    device: DeviceId,
    columns: Vec<ColumnState<R>>,
    done: bool,
}

impl<R: Read + Seek> DeviceRowIterator<R> {
    fn new(
        inner: Weak<ReaderInner<R>>,
        device: DeviceId,
        mut columns: Vec<ColumnState<R>>,
    ) -> Result<Self> {
        for column in &mut columns {
            if let ColumnKind::Field { scan, head, .. } = &mut column.kind {
                if let Some(scan) = scan {
                    *head = scan.next_point()?;
                }
            }
        }
        Ok(Self {
            inner,
            device,
            columns,
            done: false,
        })
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// The next block of rows, or `None` once the device is exhausted.
    /// Fails with `InvalidState` once the owning reader is closed or gone,
    /// even when buffered rows remain.
    pub fn next_block(&mut self) -> Result<Option<TsBlock>> {
        self.inner
            .upgrade()
            .ok_or_else(|| TsFileError::InvalidState("the owning reader is gone".to_string()))?
            .ensure_open()?;
        if self.done {
            return Ok(None);
        }
        let mut times: Vec<i64> = vec![];
        let mut values: Vec<ColumnValues> = self
            .columns
            .iter()
            .map(|column| match &column.kind {
                ColumnKind::Tag(_) => ColumnValues::empty(TsDataType::String),
                ColumnKind::Field { data_type, .. } => ColumnValues::empty(*data_type),
            })
            .collect();

        while times.len() < MAX_BLOCK_ROWS {
            let next_time = self
                .columns
                .iter()
                .filter_map(|column| match &column.kind {
                    ColumnKind::Field {
                        head: Some((time, _)),
                        ..
                    } => Some(*time),
                    _ => None,
                })
                .min();
            let time = match next_time {
                Some(time) => time,
                None => {
                    self.done = true;
                    break;
                }
            };
            times.push(time);
            for (column, column_values) in self.columns.iter_mut().zip(&mut values) {
                match &mut column.kind {
                    ColumnKind::Tag(value) => {
                        column_values.push(value.clone().map(Value::String))?;
                    }
                    ColumnKind::Field { scan, head, .. } => {
                        if head.as_ref().map(|(t, _)| *t) == Some(time) {
                            let (_, value) = head.take().expect("head checked above");
                            column_values.push(Some(value))?;
                            *head = match scan {
                                Some(scan) => scan.next_point()?,
                                None => None,
                            };
                        } else {
                            column_values.push(None)?;
                        }
                    }
                }
            }
        }

        if times.is_empty() {
            return Ok(None);
        }
        let column_names = self.columns.iter().map(|c| c.name.clone()).collect();
        Ok(Some(TsBlock::new(
            self.device.clone(),
            column_names,
            times,
            values,
        )))
    }

    pub fn close(&mut self) {
        self.done = true;
        for column in &mut self.columns {
            if let ColumnKind::Field { scan: Some(scan), .. } = &mut column.kind {
                scan.close();
            }
        }
    }
}

#[derive(Clone)]
enum ColumnPlan {
    Tag { tag_index: usize },
    Field { data_type: TsDataType },
}

/// Streams blocks for a whole table: device-major, time-minor.
pub struct TsBlockReader<R: Read + Seek> {
    inner: Weak<ReaderInner<R>>,
    tasks: DeviceTaskIterator<R>,
    plans: Vec<(String, ColumnPlan)>,
    filter: Option<Arc<dyn Filter>>,
    time_encoding: Encoding,
    current: Option<DeviceRowIterator<R>>,
}

impl<R: Read + Seek> TsBlockReader<R> {
    pub fn next_block(&mut self) -> Result<Option<TsBlock>> {
        loop {
            if let Some(current) = &mut self.current {
                if let Some(block) = current.next_block()? {
                    return Ok(Some(block));
                }
                self.current = None;
            }
            match self.tasks.next_task()? {
                Some(task) => self.current = Some(self.device_rows(task)?),
                None => return Ok(None),
            }
        }
    }

    pub fn close(&mut self) {
        if let Some(current) = &mut self.current {
            current.close();
        }
        self.current = None;
    }

    fn device_rows(&self, task: DeviceTask) -> Result<DeviceRowIterator<R>> {
        let inner = self.inner.upgrade().ok_or_else(|| {
            TsFileError::InvalidState("the owning reader is gone".to_string())
        })?;
        let mut columns = vec![];
        for (name, plan) in &self.plans {
            let kind = match plan {
                ColumnPlan::Tag { tag_index } => ColumnKind::Tag(
                    task.device.tag_values().get(*tag_index).cloned(),
                ),
                ColumnPlan::Field { data_type } => {
                    let scan = find_series(&inner, task.measurement_root, name)?
                        .map(|lookup| {
                            build_scan(
                                self.inner.clone(),
                                self.time_encoding,
                                lookup,
                                self.filter.clone(),
                            )
                        })
                        .transpose()?;
                    ColumnKind::Field {
                        data_type: *data_type,
                        scan,
                        head: None,
                    }
                }
            };
            columns.push(ColumnState {
                name: name.clone(),
                kind,
            });
        }
        DeviceRowIterator::new(self.inner.clone(), task.device, columns)
    }
}

fn build_scan<R: Read + Seek>(
    inner: Weak<ReaderInner<R>>,
    time_encoding: Encoding,
    lookup: SeriesIndexLookup,
    filter: Option<Arc<dyn Filter>>,
) -> Result<Scan<R>> {
    Ok(match lookup {
        SeriesIndexLookup::Unaligned(index) => Scan::Unaligned(SeriesScanIterator::new(
            inner,
            time_encoding,
            index.chunk_metadata,
            filter,
        )),
        SeriesIndexLookup::Aligned { time, value } => {
            Scan::Aligned(AlignedSeriesScanIterator::new(
                inner,
                time.chunk_metadata,
                value.chunk_metadata,
                filter,
            )?)
        }
    })
}

impl<R: Read + Seek> TsFileReader<R> {
    /// Opens a device-ordered table scan.
    pub fn query(&self, query: Query) -> Result<TsBlockReader<R>> {
        if query.order == ResultOrder::TimeMajor {
            return Err(TsFileError::UnsupportedOrder(
                "time-major result order is not supported".to_string(),
            ));
        }
        let schema = self
            .metadata()
            .table_schemas
            .get(&query.table)
            .ok_or_else(|| TsFileError::TableNotExist(format!("table \"{}\"", query.table)))?;

        let tag_names: Vec<&str> = schema.tag_columns().map(|c| c.name()).collect();
        let mut plans = vec![];
        for name in &query.columns {
            let column = schema.column(name).ok_or_else(|| {
                TsFileError::ColumnNotExist(format!(
                    "column \"{}\" of table \"{}\"",
                    name, query.table
                ))
            })?;
            let plan = match column.category {
                ColumnCategory::Tag => ColumnPlan::Tag {
                    tag_index: tag_names
                        .iter()
                        .position(|tag| *tag == name.as_str())
                        .expect("tag column is in the tag list"),
                },
                ColumnCategory::Field => ColumnPlan::Field {
                    data_type: column.measurement.data_type,
                },
            };
            plans.push((name.clone(), plan));
        }

        let root = self.metadata().table_index_roots.get(&query.table).cloned();
        Ok(TsBlockReader {
            inner: self.downgrade(),
            tasks: DeviceTaskIterator::new(self.downgrade(), root, None),
            plans,
            filter: query.filter,
            time_encoding: self.inner().config().time_encoding,
            current: None,
        })
    }

    /// Walks a table's devices in ascending device-id order under an
    /// optional id filter.
    pub fn devices(
        &self,
        table: &str,
        id_filter: Option<IdFilter>,
    ) -> Result<DeviceTaskIterator<R>> {
        if !self.metadata().table_schemas.contains_key(table) {
            return Err(TsFileError::TableNotExist(format!("table \"{}\"", table)));
        }
        let root = self.metadata().table_index_roots.get(table).cloned();
        Ok(DeviceTaskIterator::new(self.downgrade(), root, id_filter))
    }

    /// Materializes the rows of one device for the requested measurements.
    pub fn query_device(
        &self,
        device: &DeviceId,
        measurements: &[&str],
        filter: Option<Arc<dyn Filter>>,
    ) -> Result<DeviceRowIterator<R>> {
        let time_encoding = self.inner().config().time_encoding;
        let mut columns = vec![];
        for measurement in measurements {
            let lookup = self.timeseries_index(device, measurement)?;
            let data_type = match &lookup {
                SeriesIndexLookup::Unaligned(index) => index.data_type,
                SeriesIndexLookup::Aligned { value, .. } => value.data_type,
            };
            let scan = build_scan(self.downgrade(), time_encoding, lookup, filter.clone())?;
            columns.push(ColumnState {
                name: measurement.to_string(),
                kind: ColumnKind::Field {
                    data_type,
                    scan: Some(scan),
                    head: None,
                },
            });
        }
        DeviceRowIterator::new(self.downgrade(), device.clone(), columns)
    }
}
