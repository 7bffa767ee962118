//! Mesh and table configuration.

use std::path::{Component, Path};

use crate::constants::{DEFAULT_MESH_DEPTH, DEFAULT_TABLE_SLOTS, HTM_MAX_DEPTH};
use crate::error::{HtmError, HtmResult};

/// Shape of the mesh a [`Database`](crate::Database) builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MeshConfig {
    /// Deepest subdivision level, `0..HTM_MAX_DEPTH`.
    pub depth: u8,
    /// Number of tables that may be open against the mesh at once.
    pub table_slots: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_MESH_DEPTH,
            table_slots: DEFAULT_TABLE_SLOTS,
        }
    }
}

impl MeshConfig {
    pub fn new(depth: u8, table_slots: usize) -> Self {
        Self { depth, table_slots }
    }

    pub fn validate(&self) -> HtmResult<()> {
        if self.depth >= HTM_MAX_DEPTH {
            return Err(HtmError::invalid_config(format!(
                "mesh depth {} must be below {}",
                self.depth, HTM_MAX_DEPTH
            )));
        }
        if self.table_slots == 0 {
            return Err(HtmError::invalid_config("at least one table slot is required"));
        }
        Ok(())
    }
}

/// Order objects keep inside a trixel, and which depth-map tier wins on a
/// tier boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SortOrder {
    /// Smallest attribute first (magnitudes: brightest first).
    #[default]
    Ascending,
    /// Largest attribute first (angular sizes: biggest first).
    Descending,
}

/// How the 16-byte primary key of each record is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum KeyKind {
    #[default]
    Id,
    Designation,
}

/// Storage type of a table-specific field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldKind {
    Int,
    Short,
    Float,
    Double,
    Text,
}

impl FieldKind {
    pub(crate) fn code(self) -> u32 {
        match self {
            Self::Int => 1,
            Self::Short => 2,
            Self::Float => 3,
            Self::Double => 4,
            Self::Text => 5,
        }
    }

    pub(crate) fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Int),
            2 => Some(Self::Short),
            3 => Some(Self::Float),
            4 => Some(Self::Double),
            5 => Some(Self::Text),
            _ => None,
        }
    }
}

/// A table-specific field inside the record tail.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDescriptor {
    pub symbol: String,
    /// Byte offset from the start of the record.
    pub offset: u32,
    pub size: u32,
    pub kind: FieldKind,
}

/// Everything needed to open a table against a mesh.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableSpec {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub sort: SortOrder,
    #[cfg_attr(feature = "serde", serde(default))]
    pub key_kind: KeyKind,
    /// Full record size in bytes, including the fixed record header.
    pub object_bytes: u32,
    /// Declared attribute bounds. Computed from the imported rows when absent.
    #[cfg_attr(feature = "serde", serde(default))]
    pub bounds: Option<(f32, f32)>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub fields: Vec<FieldDescriptor>,
}

impl TableSpec {
    /// A table with no extra fields beyond the record header.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sort: SortOrder::Ascending,
            key_kind: KeyKind::Id,
            object_bytes: crate::store::RECORD_HEADER_BYTES as u32,
            bounds: None,
            fields: Vec::new(),
        }
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_key_kind(mut self, key_kind: KeyKind) -> Self {
        self.key_kind = key_kind;
        self
    }

    pub fn with_bounds(mut self, min: f32, max: f32) -> Self {
        self.bounds = Some((min, max));
        self
    }

    /// Appends a field after the current record tail and grows the record.
    pub fn with_field(mut self, symbol: impl Into<String>, kind: FieldKind, size: u32) -> Self {
        self.fields.push(FieldDescriptor {
            symbol: symbol.into(),
            offset: self.object_bytes,
            size,
            kind,
        });
        self.object_bytes += size;
        self
    }

    /// Bytes available to table-specific fields.
    pub fn extra_bytes(&self) -> usize {
        (self.object_bytes as usize).saturating_sub(crate::store::RECORD_HEADER_BYTES)
    }

    pub fn validate(&self) -> HtmResult<()> {
        validate_table_name(&self.name)?;
        if (self.object_bytes as usize) < crate::store::RECORD_HEADER_BYTES {
            return Err(HtmError::invalid_config(format!(
                "record size {} is smaller than the {} byte record header",
                self.object_bytes,
                crate::store::RECORD_HEADER_BYTES
            )));
        }
        if let Some((min, max)) = self.bounds {
            if !(min.is_finite() && max.is_finite() && min <= max) {
                return Err(HtmError::invalid_config(format!(
                    "invalid attribute bounds [{min}, {max}]"
                )));
            }
        }
        for field in &self.fields {
            if field.offset as usize + field.size as usize > self.object_bytes as usize {
                return Err(HtmError::invalid_config(format!(
                    "field '{}' overruns the {} byte record",
                    field.symbol, self.object_bytes
                )));
            }
        }
        Ok(())
    }
}

/// A table name doubles as a file stem, so it must be one plain path
/// component.
pub(crate) fn validate_table_name(name: &str) -> HtmResult<()> {
    if name.is_empty() {
        return Err(HtmError::invalid_config("table name is empty"));
    }
    let mut components = Path::new(name).components();
    let plain = matches!(components.next(), Some(Component::Normal(c)) if c == name)
        && components.next().is_none()
        && !name.contains(['/', '\\']);
    if !plain {
        return Err(HtmError::invalid_config(format!(
            "table name '{name}' is not a plain file name"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mesh_config_is_valid() {
        let config = MeshConfig::default();
        assert_eq!(config.depth, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mesh_depth_limit() {
        assert!(MeshConfig::new(HTM_MAX_DEPTH - 1, 1).validate().is_ok());
        let err = MeshConfig::new(HTM_MAX_DEPTH, 1).validate().unwrap_err();
        assert!(err.to_string().contains("must be below 12"));
    }

    #[test]
    fn test_zero_slots_rejected() {
        assert!(MeshConfig::new(3, 0).validate().is_err());
    }

    #[test]
    fn test_with_field_grows_record() {
        let spec = TableSpec::new("ngc")
            .with_field("type", FieldKind::Short, 2)
            .with_field("name", FieldKind::Text, 10);
        assert_eq!(spec.object_bytes as usize, crate::store::RECORD_HEADER_BYTES + 12);
        assert_eq!(spec.fields[1].offset as usize, crate::store::RECORD_HEADER_BYTES + 2);
        assert_eq!(spec.extra_bytes(), 12);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_bad_bounds_rejected() {
        let spec = TableSpec::new("sky2000").with_bounds(5.0, 1.0);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_field_code_round_trip() {
        for kind in [
            FieldKind::Int,
            FieldKind::Short,
            FieldKind::Float,
            FieldKind::Double,
            FieldKind::Text,
        ] {
            assert_eq!(FieldKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(FieldKind::from_code(0), None);
    }

    #[test]
    fn test_table_name_is_one_path_component() {
        for name in ["stars", "gaia-dr3", "hip.v2"] {
            assert!(TableSpec::new(name).validate().is_ok(), "{name}");
        }
        for name in ["", "..", ".", "../stars", "a/b", "/etc/stars", "a\\b", "stars/"] {
            assert!(TableSpec::new(name).validate().is_err(), "{name}");
        }
    }
}
