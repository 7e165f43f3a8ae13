//! Tabular and JSON output files.

use std::path::Path;

use serde::de::{self, DeserializeOwned, Visitor};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;

/// Writes `rows` as CSV with a header derived from `T`'s fields.
///
/// An empty slice still gets the header row. Returns the number of rows
/// written.
pub fn write_csv<T: Serialize + DeserializeOwned>(
    path: impl AsRef<Path>,
    rows: &[T],
) -> Result<usize> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        writer.write_record(field_names::<T>())?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = rows.len(), "wrote csv");
    Ok(rows.len())
}

/// Serialized field names of a struct, as listed by its `Deserialize` impl.
fn field_names<T: DeserializeOwned>() -> Vec<&'static str> {
    let mut names = Vec::new();
    let _ = T::deserialize(FieldNames(&mut names));
    names
}

/// Deserializer that records struct field names and then bails out.
struct FieldNames<'a>(&'a mut Vec<&'static str>);

impl<'de> de::Deserializer<'de> for FieldNames<'_> {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> std::result::Result<V::Value, Self::Error> {
        Err(de::Error::custom("not a struct"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        self.0.extend_from_slice(fields);
        Err(de::Error::custom("field names recorded"))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

/// Writes `value` as pretty-printed JSON.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    debug!(path = %path.display(), "wrote json");
    Ok(())
}

/// Creates `dir` and its parents if needed.
pub fn ensure_dir(dir: impl AsRef<Path>) -> Result<()> {
    std::fs::create_dir_all(dir.as_ref())?;
    Ok(())
}
