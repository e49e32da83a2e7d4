mod model;
mod state;

pub use model::{
    Algorithm, FileClass, FileRecord, Metrics, ModelSpec, NewFile, NewShipment, Shipment,
    TaskKind, checked_extension, input_blob_name, output_blob_name,
};
pub use state::{ShipmentStatus, StatusEvent, StatusMachine};
