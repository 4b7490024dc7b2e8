//! Presence-aware patch fields
//!
//! A patch has to tell "not mentioned" apart from "explicitly cleared", so a
//! plain `Option` is not enough. Missing JSON keys decode to [`Field::Unset`]
//! (with `#[serde(default)]` on the containing struct), `null` decodes to
//! [`Field::Null`].
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    #[default]
    Unset,
    Null,
    Value(T),
}

impl<T> Field<T> {
    pub fn is_set(&self) -> bool {
        !matches!(self, Field::Unset)
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: Clone> Field<T> {
    /// Resolve the field against the value already stored for it.
    pub fn merge_into(&self, current: &Option<T>) -> Option<T> {
        match self {
            Field::Unset => current.clone(),
            Field::Null => None,
            Field::Value(v) => Some(v.clone()),
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Value(v),
            None => Field::Null,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Field::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_current_when_unset() {
        let current = Some(7u64);

        assert_eq!(Field::Unset.merge_into(&current), Some(7));
        assert_eq!(Field::<u64>::Null.merge_into(&current), None);
        assert_eq!(Field::Value(9).merge_into(&current), Some(9));
    }

    #[test]
    fn null_and_missing_decode_differently() {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Sample {
            a: Field<u64>,
            b: Field<u64>,
            c: Field<u64>,
        }

        let sample: Sample = serde_json::from_str(r#"{"a": null, "b": 3}"#).unwrap();

        assert_eq!(sample.a, Field::Null);
        assert_eq!(sample.b, Field::Value(3));
        assert_eq!(sample.c, Field::Unset);
    }
}
