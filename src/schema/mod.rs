//! The schema model: physical types, device identifiers, measurement and
//! table schemas.

mod data_type;
mod device;
mod measurement;

pub use data_type::{ColumnCategory, TsDataType};
pub use device::DeviceId;
pub use measurement::{ColumnSchema, MeasurementSchema, TableSchema};
