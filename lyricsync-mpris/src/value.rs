//! Conversion from D-Bus variants to engine-neutral raw values.

use lyricsync_core::RawValue;
use std::collections::HashMap;
use zbus::zvariant::{OwnedValue, Value};

pub(crate) fn to_raw(value: &Value<'_>) -> RawValue {
    match value {
        Value::Bool(v) => RawValue::Bool(*v),
        Value::I16(v) => RawValue::Int(i64::from(*v)),
        Value::I32(v) => RawValue::Int(i64::from(*v)),
        Value::I64(v) => RawValue::Int(*v),
        Value::U8(v) => RawValue::UInt(u64::from(*v)),
        Value::U16(v) => RawValue::UInt(u64::from(*v)),
        Value::U32(v) => RawValue::UInt(u64::from(*v)),
        Value::U64(v) => RawValue::UInt(*v),
        Value::F64(v) => RawValue::Double(*v),
        Value::Str(s) => RawValue::Str(s.to_string()),
        Value::ObjectPath(p) => RawValue::Str(p.to_string()),
        Value::Value(inner) => to_raw(inner),
        Value::Array(_) => value
            .try_clone()
            .ok()
            .and_then(|v| Vec::<String>::try_from(v).ok())
            .map_or(RawValue::Other, RawValue::StrList),
        Value::Dict(_) => value
            .try_clone()
            .ok()
            .and_then(|v| HashMap::<String, OwnedValue>::try_from(v).ok())
            .map_or(RawValue::Other, |map| RawValue::Map(map_to_raw(&map))),
        _ => RawValue::Other,
    }
}

pub(crate) fn map_to_raw(map: &HashMap<String, OwnedValue>) -> HashMap<String, RawValue> {
    map.iter()
        .map(|(key, value)| (key.clone(), to_raw(value)))
        .collect()
}
