//! Per-series rolling summaries used for predicate pushdown: count, time
//! range and a typed value summary, with a stable on-wire layout.

mod binary;
mod boolean;
mod primitive;

pub use binary::BinaryStatistics;
pub use boolean::BooleanStatistics;
pub use primitive::{DoubleStatistics, FloatStatistics, Int32Statistics, Int64Statistics};

use std::io::{Read, Write};

use crate::data::Value;
use crate::error::{Result, TsFileError};
use crate::io::{read_i64_le, read_var_u64, write_i64_le, write_var_u64};
use crate::schema::TsDataType;

/// The typed value summary, keyed by the series' data-type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    Boolean(BooleanStatistics),
    Int32(Int32Statistics),
    Int64(Int64Statistics),
    Float(FloatStatistics),
    Double(DoubleStatistics),
    Binary(BinaryStatistics),
    /// Time chunks summarize only the time range.
    Time,
}

/// The rolling statistics of one page, chunk or series.
///
/// `start_time`, `end_time` and the summary's boundary values are meaningful
/// once `count > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    count: u64,
    start_time: i64,
    end_time: i64,
    summary: Summary,
}

impl Statistics {
    /// Fresh, empty statistics for a series of `data_type`.
    pub fn new(data_type: TsDataType) -> Self {
        let summary = match data_type {
            TsDataType::Boolean => Summary::Boolean(BooleanStatistics::empty()),
            TsDataType::Int32 | TsDataType::Date => Summary::Int32(Int32Statistics::empty()),
            TsDataType::Int64 | TsDataType::Timestamp => Summary::Int64(Int64Statistics::empty()),
            TsDataType::Float => Summary::Float(FloatStatistics::empty()),
            TsDataType::Double => Summary::Double(DoubleStatistics::empty()),
            TsDataType::Text | TsDataType::String | TsDataType::Blob => {
                Summary::Binary(BinaryStatistics::empty())
            }
            TsDataType::Vector => Summary::Time,
        };
        Self {
            count: 0,
            start_time: i64::MAX,
            end_time: i64::MIN,
            summary,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Extends the range and summary with one (time, value) point.
    pub fn update(&mut self, time: i64, value: &Value) -> Result<()> {
        let is_init = self.count == 0;
        let is_first = is_init || time < self.start_time;
        let is_last = is_init || time >= self.end_time;
        match (&mut self.summary, value) {
            (Summary::Boolean(s), Value::Boolean(v)) => {
                if is_init {
                    s.init(*v)
                } else {
                    s.update(*v, is_first, is_last)
                }
            }
            (Summary::Int32(s), Value::Int32(v) | Value::Date(v)) => {
                if is_init {
                    s.init(*v)
                } else {
                    s.update(*v, is_first, is_last)
                }
            }
            (Summary::Int64(s), Value::Int64(v) | Value::Timestamp(v)) => {
                if is_init {
                    s.init(*v)
                } else {
                    s.update(*v, is_first, is_last)
                }
            }
            (Summary::Float(s), Value::Float(v)) => {
                if is_init {
                    s.init(*v)
                } else {
                    s.update(*v, is_first, is_last)
                }
            }
            (Summary::Double(s), Value::Double(v)) => {
                if is_init {
                    s.init(*v)
                } else {
                    s.update(*v, is_first, is_last)
                }
            }
            (Summary::Binary(s), Value::Text(v) | Value::Blob(v)) => {
                if is_init {
                    s.init(v)
                } else {
                    s.update(v, is_first, is_last)
                }
            }
            (Summary::Binary(s), Value::String(v)) => {
                if is_init {
                    s.init(v.as_bytes())
                } else {
                    s.update(v.as_bytes(), is_first, is_last)
                }
            }
            (_, value) => {
                return Err(TsFileError::InvalidDataPoint(format!(
                    "value of type {:?} does not match the statistics representation",
                    value.data_type()
                )))
            }
        }
        self.extend_range(time);
        Ok(())
    }

    /// Extends only the time range; the summary must be time-only.
    pub fn update_time(&mut self, time: i64) -> Result<()> {
        if !matches!(self.summary, Summary::Time) {
            return Err(TsFileError::InvalidArg(
                "update_time requires time-only statistics".to_string(),
            ));
        }
        self.extend_range(time);
        Ok(())
    }

    fn extend_range(&mut self, time: i64) {
        if self.count == 0 {
            self.start_time = time;
            self.end_time = time;
        } else {
            if time < self.start_time {
                self.start_time = time;
            }
            if time > self.end_time {
                self.end_time = time;
            }
        }
        self.count += 1;
    }

    /// Combines `other` into `self`. The two ranges must be disjoint;
    /// overlapping ranges would double-count and are refused.
    pub fn merge(&mut self, other: &Statistics) -> Result<()> {
        if std::mem::discriminant(&self.summary) != std::mem::discriminant(&other.summary) {
            return Err(TsFileError::StatisticsClassMismatch(format!(
                "cannot merge {:?} statistics into {:?} statistics",
                other.summary_kind(),
                self.summary_kind()
            )));
        }
        if other.count == 0 {
            return Ok(());
        }
        if self.count == 0 {
            *self = other.clone();
            return Ok(());
        }
        if other.start_time <= self.end_time && self.start_time <= other.end_time {
            return Err(TsFileError::InvalidArg(format!(
                "overlapping time ranges [{}, {}] and [{}, {}] cannot be merged",
                self.start_time, self.end_time, other.start_time, other.end_time
            )));
        }
        let other_is_front = other.end_time < self.start_time;
        match (&mut self.summary, &other.summary) {
            (Summary::Boolean(s), Summary::Boolean(o)) => s.merge(o, other_is_front),
            (Summary::Int32(s), Summary::Int32(o)) => s.merge(o, other_is_front),
            (Summary::Int64(s), Summary::Int64(o)) => s.merge(o, other_is_front),
            (Summary::Float(s), Summary::Float(o)) => s.merge(o, other_is_front),
            (Summary::Double(s), Summary::Double(o)) => s.merge(o, other_is_front),
            (Summary::Binary(s), Summary::Binary(o)) => s.merge(o, other_is_front),
            (Summary::Time, Summary::Time) => {}
            _ => unreachable!("discriminants were checked above"),
        }
        self.count += other.count;
        self.start_time = self.start_time.min(other.start_time);
        self.end_time = self.end_time.max(other.end_time);
        Ok(())
    }

    fn summary_kind(&self) -> &'static str {
        match self.summary {
            Summary::Boolean(_) => "boolean",
            Summary::Int32(_) => "int32",
            Summary::Int64(_) => "int64",
            Summary::Float(_) => "float",
            Summary::Double(_) => "double",
            Summary::Binary(_) => "binary",
            Summary::Time => "time",
        }
    }

    /// On-wire layout: `{count: uvarint, start_time: i64 LE, end_time: i64
    /// LE, typed payload}`. The payload field order is fixed per data type.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_var_u64(writer, self.count)?;
        write_i64_le(writer, self.start_time)?;
        write_i64_le(writer, self.end_time)?;
        match &self.summary {
            Summary::Boolean(s) => s.serialize(writer),
            Summary::Int32(s) => s.serialize(writer),
            Summary::Int64(s) => s.serialize(writer),
            Summary::Float(s) => s.serialize(writer),
            Summary::Double(s) => s.serialize(writer),
            Summary::Binary(s) => s.serialize(writer),
            Summary::Time => Ok(()),
        }
    }

    pub fn deserialize<R: Read>(reader: &mut R, data_type: TsDataType) -> Result<Self> {
        let count = read_var_u64(reader)?;
        let start_time = read_i64_le(reader)?;
        let end_time = read_i64_le(reader)?;
        let summary = match data_type {
            TsDataType::Boolean => Summary::Boolean(BooleanStatistics::deserialize(reader)?),
            TsDataType::Int32 | TsDataType::Date => {
                Summary::Int32(Int32Statistics::deserialize(reader)?)
            }
            TsDataType::Int64 | TsDataType::Timestamp => {
                Summary::Int64(Int64Statistics::deserialize(reader)?)
            }
            TsDataType::Float => Summary::Float(FloatStatistics::deserialize(reader)?),
            TsDataType::Double => Summary::Double(DoubleStatistics::deserialize(reader)?),
            TsDataType::Text | TsDataType::String | TsDataType::Blob => {
                Summary::Binary(BinaryStatistics::deserialize(reader)?)
            }
            TsDataType::Vector => Summary::Time,
        };
        Ok(Self {
            count,
            start_time,
            end_time,
            summary,
        })
    }

    /// An estimate of the serialized size, used for page sizing.
    pub fn serialized_size(&self) -> usize {
        let payload = match &self.summary {
            Summary::Boolean(_) => 10,
            Summary::Int32(_) => 4 * 4 + 8,
            Summary::Int64(_) | Summary::Double(_) => 5 * 8,
            Summary::Float(_) => 4 * 4 + 8,
            Summary::Binary(s) => s.first_value.len() + s.last_value.len() + 10,
            Summary::Time => 0,
        };
        10 + 16 + payload
    }
}

/// Whether chunks recorded with statistics of `from` may be merged into a
/// series of `to`. Only identical representations are mergeable, and
/// TEXT→STRING is explicitly forbidden: chunks written as TEXT lack the
/// summary a STRING series promises.
pub fn can_merge(from: TsDataType, to: TsDataType) -> bool {
    if from == TsDataType::Text && to == TsDataType::String {
        return false;
    }
    std::mem::discriminant(&Statistics::new(from).summary)
        == std::mem::discriminant(&Statistics::new(to).summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn int32_statistics(points: &[(i64, i32)]) -> Statistics {
        let mut statistics = Statistics::new(TsDataType::Int32);
        for (time, value) in points {
            statistics.update(*time, &Value::Int32(*value)).unwrap();
        }
        statistics
    }

    #[test]
    fn update_tracks_range_and_summary() {
        let statistics = int32_statistics(&[(1, 10), (2, 20), (3, 30)]);
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
            _ => panic!("expected int32 summary"),
        }
    }

    #[test]
    fn out_of_order_updates_fix_boundaries() {
        let statistics = int32_statistics(&[(5, 50), (1, 10), (9, 90)]);
        match statistics.summary() {
            Summary::Int32(s) => {
                assert_eq!(s.first_value, 10);
                assert_eq!(s.last_value, 90);
            }
            _ => unreachable!(),
        }
        assert_eq!(statistics.start_time(), 1);
        assert_eq!(statistics.end_time(), 9);
    }

    #[test]
    fn merge_of_disjoint_ranges() -> Result<()> {
        let mut left = int32_statistics(&[(1, 10), (2, 20)]);
        let right = int32_statistics(&[(10, 5), (11, 40)]);
        left.merge(&right)?;
        assert_eq!(left.count(), 4);
        assert_eq!(left.start_time(), 1);
        assert_eq!(left.end_time(), 11);
        match left.summary() {
            Summary::Int32(s) => {
                assert_eq!(s.min_value, 5);
                assert_eq!(s.max_value, 40);
                assert_eq!(s.first_value, 10);
                assert_eq!(s.last_value, 40);
                assert_eq!(s.sum_value, 75);
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    #[test]
    fn merge_of_front_range_moves_first() -> Result<()> {
        let mut back = int32_statistics(&[(10, 100), (11, 110)]);
        let front = int32_statistics(&[(1, 1), (2, 2)]);
        back.merge(&front)?;
        match back.summary() {
            Summary::Int32(s) => {
                assert_eq!(s.first_value, 1);
                assert_eq!(s.last_value, 110);
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    #[test]
    fn merge_of_overlapping_ranges_is_refused() {
        let mut left = int32_statistics(&[(1, 10), (5, 20)]);
        let right = int32_statistics(&[(5, 30), (9, 40)]);
        assert!(matches!(
            left.merge(&right),
            Err(TsFileError::InvalidArg(_))
        ));
    }

    #[test]
    fn merge_of_mismatched_kinds_is_refused() {
        let mut left = int32_statistics(&[(1, 10)]);
        let mut right = Statistics::new(TsDataType::Double);
        right.update(2, &Value::Double(1.0)).unwrap();
        assert!(matches!(
            left.merge(&right),
            Err(TsFileError::StatisticsClassMismatch(_))
        ));
    }

    #[test]
    fn merge_with_empty_is_identity() -> Result<()> {
        let mut statistics = int32_statistics(&[(1, 10)]);
        let empty = Statistics::new(TsDataType::Int32);
        statistics.merge(&empty)?;
        assert_eq!(statistics.count(), 1);

        let mut empty = Statistics::new(TsDataType::Int32);
        empty.merge(&statistics)?;
        assert_eq!(empty.count(), 1);
        Ok(())
    }

    #[test]
    fn serialize_roundtrip() -> Result<()> {
        for (data_type, value) in [
            (TsDataType::Boolean, Value::Boolean(true)),
            (TsDataType::Int32, Value::Int32(-7)),
            (TsDataType::Int64, Value::Int64(1 << 40)),
            (TsDataType::Float, Value::Float(2.5)),
            (TsDataType::Double, Value::Double(-0.25)),
            (TsDataType::Text, Value::Text(b"abc".to_vec())),
        ] {
            let mut statistics = Statistics::new(data_type);
            statistics.update(100, &value)?;
            statistics.update(200, &value)?;
            let mut buffer = vec![];
            statistics.serialize(&mut buffer)?;
            let decoded = Statistics::deserialize(&mut Cursor::new(buffer), data_type)?;
            assert_eq!(decoded, statistics);
        }
        Ok(())
    }

    #[test]
    fn time_only_statistics() -> Result<()> {
        let mut statistics = Statistics::new(TsDataType::Vector);
        statistics.update_time(3)?;
        statistics.update_time(9)?;
        assert_eq!(statistics.count(), 2);
        let mut buffer = vec![];
        statistics.serialize(&mut buffer)?;
        let decoded = Statistics::deserialize(&mut Cursor::new(buffer), TsDataType::Vector)?;
        assert_eq!(decoded, statistics);
        Ok(())
    }

    #[test]
    fn text_to_string_cannot_merge() {
        assert!(!can_merge(TsDataType::Text, TsDataType::String));
        assert!(can_merge(TsDataType::String, TsDataType::Text));
        assert!(can_merge(TsDataType::Int32, TsDataType::Date));
        assert!(!can_merge(TsDataType::Int32, TsDataType::Int64));
    }
}
