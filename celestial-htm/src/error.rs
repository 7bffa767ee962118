use thiserror::Error;
use tracing::error;

pub type HtmResult<T> = Result<T, HtmError>;

#[derive(Debug, Error)]
pub enum HtmError {
    #[error("Invalid sky position: ra {ra} rad, dec {dec} rad")]
    InvalidPosition { ra: f64, dec: f64 },

    #[error("No root trixel contains ra {ra} rad, dec {dec} rad")]
    Unclassified { ra: f64, dec: f64 },

    #[error("Attribute value {value} outside table range [{min}, {max}]")]
    AttributeOutOfRange { value: f32, min: f32, max: f32 },

    #[error("Cannot map to a mesh depth: {message}")]
    UnmappableDepth { message: String },

    #[error("Depth {depth} exceeds mesh depth {max}")]
    DepthOutOfRange { depth: u8, max: u8 },

    #[error("Invalid trixel id {id:#010x}: {message}")]
    InvalidTrixelId { id: u32, message: String },

    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Unknown table handle {handle}")]
    UnknownTable { handle: u32 },

    #[error("All {slots} table slots are in use")]
    TableSlotsExhausted { slots: usize },

    #[error("Query set has not been clipped")]
    NotClipped,

    #[error("Capacity exceeded for {what}: need {needed}, have {capacity}")]
    Capacity {
        what: String,
        needed: usize,
        capacity: usize,
    },

    #[error("Out of memory allocating {what}")]
    OutOfMemory { what: String },

    #[error("Invalid store format: {message}")]
    Format { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HtmError {
    pub fn invalid_position(ra: f64, dec: f64) -> Self {
        Self::InvalidPosition { ra, dec }
    }

    pub fn unclassified(ra: f64, dec: f64) -> Self {
        Self::Unclassified { ra, dec }
    }

    pub fn attribute_out_of_range(value: f32, min: f32, max: f32) -> Self {
        Self::AttributeOutOfRange { value, min, max }
    }

    pub fn unmappable_depth(message: impl Into<String>) -> Self {
        Self::UnmappableDepth {
            message: message.into(),
        }
    }

    pub fn depth_out_of_range(depth: u8, max: u8) -> Self {
        Self::DepthOutOfRange { depth, max }
    }

    pub fn invalid_trixel_id(id: u32, message: impl Into<String>) -> Self {
        Self::InvalidTrixelId {
            id,
            message: message.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn unknown_table(handle: u32) -> Self {
        Self::UnknownTable { handle }
    }

    pub fn table_slots_exhausted(slots: usize) -> Self {
        Self::TableSlotsExhausted { slots }
    }

    /// Builds a capacity error and logs it at error level.
    ///
    /// Capacity errors mean a buffer sized from the mesh counts was too
    /// small, which is a sizing defect rather than bad input.
    pub fn capacity(what: impl Into<String>, needed: usize, capacity: usize) -> Self {
        let what = what.into();
        error!(%what, needed, capacity, "HTM buffer capacity exceeded");
        Self::Capacity {
            what,
            needed,
            capacity,
        }
    }

    pub fn out_of_memory(what: impl Into<String>) -> Self {
        Self::OutOfMemory { what: what.into() }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by caller-supplied values.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPosition { .. }
                | Self::Unclassified { .. }
                | Self::AttributeOutOfRange { .. }
                | Self::UnmappableDepth { .. }
                | Self::DepthOutOfRange { .. }
                | Self::InvalidTrixelId { .. }
                | Self::InvalidParameter { .. }
                | Self::InvalidConfig { .. }
        )
    }
}
