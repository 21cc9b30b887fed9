//! Type erasure for handler results.
//!
//! Handlers return any `Serialize` value. Conversion into a JSON value is
//! stricter than `serde_json::to_value`: NaN and infinite floats are errors
//! instead of `null`, so unrepresentable results are always classified.

use serde::ser::{self, Error as _};
use serde::Serialize;
use serde_json::Value;

/// A handler result that can be converted into a JSON payload.
pub trait ToPayload: Send {
    /// Converts the result into a JSON value.
    ///
    /// # Errors
    ///
    /// Returns the serializer error when the value has no JSON
    /// representation (map keys that are not strings, NaN or infinite
    /// floats).
    fn to_payload(&self) -> Result<Value, serde_json::Error>;
}

impl<T: Serialize + Send> ToPayload for T {
    fn to_payload(&self) -> Result<Value, serde_json::Error> {
        // serde_json writes non-finite floats as `null`; reject them first.
        self.serialize(FiniteFloats)?;
        serde_json::to_value(self)
    }
}

// ---------------------------------------------------------------------------
// Non-finite float check
// ---------------------------------------------------------------------------

/// Walks a value and fails on the first NaN or infinite float. Everything
/// else is accepted; `serde_json::to_value` reports the remaining errors.
#[derive(Clone, Copy)]
struct FiniteFloats;

fn check_float(value: f64) -> Result<(), serde_json::Error> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(serde_json::Error::custom(format!(
            "{value} is not representable as a JSON number"
        )))
    }
}

impl ser::Serializer for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _v: bool) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_i128(self, _v: i128) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_u128(self, _v: u128) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<(), Self::Error> {
        check_float(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), Self::Error> {
        check_float(v)
    }

    fn serialize_char(self, _v: char) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_none(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, Self::Error> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self, Self::Error> {
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, Self::Error> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, Self::Error> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    // Keys are validated by serde_json itself.
    fn serialize_key<T: ?Sized + Serialize>(&mut self, _key: &T) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}
