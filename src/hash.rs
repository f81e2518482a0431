//! Content hashing for every identifier in Strata
//!
//! Digests are SHA256, hex-encoded and truncated to 63 characters so they fit
//! in label values on orchestration platforms that reject 64+ character
//! labels. Truncation drops the keyspace from 256 to 252 bits, which keeps
//! the collision probability negligible.

use serde::ser::{self, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{ContextError, Result};

/// Length of every digest produced by this module
pub const DIGEST_LEN: usize = 63;

/// Digest arbitrary bytes
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let mut hex_digest = hex::encode(hasher.finalize());
    hex_digest.truncate(DIGEST_LEN);
    hex_digest
}

pub fn digest_str(s: &str) -> String {
    digest(s.as_bytes())
}

/// Digest a structured value through its canonical JSON form
///
/// `serde_json` writes struct fields in declaration order and `BTreeMap`
/// entries in key order, so the encoding is stable for the types used here.
/// Hashed types must not contain `HashMap`s.
///
/// JSON has no encoding for NaN or infinities (`serde_json` writes them as
/// `null`), so values holding non-finite floats are rejected.
pub fn digest_value<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    value
        .serialize(FiniteCheck)
        .map_err(|e| ContextError::Validation(format!("cannot hash value: {}", e.0)))?;

    let bytes = serde_json::to_vec(value).map_err(|e| ContextError::Serialization {
        key: std::any::type_name::<T>().to_string(),
        message: e.to_string(),
    })?;
    Ok(digest(&bytes))
}

/// Digest a file's full contents
pub fn digest_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| ContextError::io(path, e))?;
    Ok(digest(&bytes))
}

/// Serializer that walks a value and fails on the first non-finite float
struct FiniteCheck;

#[derive(Debug)]
struct NonFinite(String);

impl fmt::Display for NonFinite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for NonFinite {}

impl ser::Error for NonFinite {
    fn custom<M: fmt::Display>(msg: M) -> Self {
        NonFinite(msg.to_string())
    }
}

fn check_float(value: f64) -> std::result::Result<(), NonFinite> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(NonFinite(format!("non-finite number {}", value)))
    }
}

macro_rules! accept {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(fn $method(self, _: $ty) -> std::result::Result<(), NonFinite> { Ok(()) })*
    };
}

impl ser::Serializer for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
        serialize_unit_struct(&'static str),
    );

    fn serialize_f32(self, v: f32) -> std::result::Result<(), NonFinite> {
        check_float(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> std::result::Result<(), NonFinite> {
        check_float(v)
    }

    fn serialize_none(self) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> std::result::Result<(), NonFinite> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> std::result::Result<(), NonFinite> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> std::result::Result<(), NonFinite> {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> std::result::Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> std::result::Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> std::result::Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, NonFinite> {
        Ok(self)
    }
}

macro_rules! compound {
    ($($trait:ident :: $method:ident),* $(,)?) => {
        $(
            impl ser::$trait for FiniteCheck {
                type Ok = ();
                type Error = NonFinite;

                fn $method<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), NonFinite> {
                    value.serialize(FiniteCheck)
                }

                fn end(self) -> std::result::Result<(), NonFinite> {
                    Ok(())
                }
            }
        )*
    };
}

compound!(
    SerializeSeq::serialize_element,
    SerializeTuple::serialize_element,
    SerializeTupleStruct::serialize_field,
    SerializeTupleVariant::serialize_field,
);

impl ser::SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> std::result::Result<(), NonFinite> {
        key.serialize(FiniteCheck)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), NonFinite> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> std::result::Result<(), NonFinite> {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> std::result::Result<(), NonFinite> {
        value.serialize(FiniteCheck).map_err(|e| NonFinite(format!("{}: {}", key, e)))
    }

    fn end(self) -> std::result::Result<(), NonFinite> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> std::result::Result<(), NonFinite> {
        value.serialize(FiniteCheck).map_err(|e| NonFinite(format!("{}: {}", key, e)))
    }

    fn end(self) -> std::result::Result<(), NonFinite> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_digest_length_is_fixed() {
        assert_eq!(digest(b"").len(), DIGEST_LEN);
        assert_eq!(digest(b"a").len(), DIGEST_LEN);
        assert_eq!(digest(&vec![7u8; 1 << 20]).len(), DIGEST_LEN);
    }

    #[test]
    fn test_digest_known_value() {
        // sha256("") = e3b0c442...b855
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }

    #[test]
    fn test_digest_value_is_order_stable() {
        let mut a = BTreeMap::new();
        a.insert("b", 2);
        a.insert("a", 1);
        let mut b = BTreeMap::new();
        b.insert("a", 1);
        b.insert("b", 2);
        assert_eq!(digest_value(&a).unwrap(), digest_value(&b).unwrap());
    }

    #[test]
    fn test_digest_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("impl.py");
        fs::write(&path, "def aggregate(): pass").unwrap();
        assert_eq!(
            digest_file(&path).unwrap(),
            digest_str("def aggregate(): pass")
        );

        let err = digest_file(temp.path().join("missing.py")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[derive(serde::Serialize)]
    struct Bounds {
        name: &'static str,
        min: Option<f64>,
    }

    #[test]
    fn test_digest_value_rejects_non_finite_floats() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = digest_value(&Bounds {
                name: "amount",
                min: Some(bad),
            })
            .unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
            assert!(err.to_string().contains("min"));
        }

        assert!(digest_value(&vec![1.0f32, f32::NAN]).is_err());
    }

    #[test]
    fn test_digest_value_distinguishes_extreme_floats() {
        let max = digest_value(&Bounds { name: "amount", min: Some(f64::MAX) }).unwrap();
        let min = digest_value(&Bounds { name: "amount", min: Some(f64::MIN) }).unwrap();
        let none = digest_value(&Bounds { name: "amount", min: None }).unwrap();
        assert_ne!(max, min);
        assert_ne!(max, none);
        assert_ne!(min, none);
    }
}
