//! A module for serializing/deserializing a `BString` as a fixed-width 32 byte array.
//!
//! Values are right padded with NUL bytes on the wire. Trailing NULs are trimmed again when
//! decoding, so the text itself must not end in NUL.

use std::fmt;

use bstr::BString;
use serde::{
    de::{Error as DeError, SeqAccess, Visitor},
    ser::{Error as SerError, SerializeTuple},
    Deserializer, Serializer,
};

pub fn serialize<T, S>(value: T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    let v = value.as_ref();
    let l = v.len();
    if l > 32 {
        return Err(S::Error::custom(format_args!(
            "value is too large ({l} bytes); max 32",
        )));
    }

    let mut tup = serializer.serialize_tuple(32)?;
    for e in v.iter().chain(std::iter::repeat(&0u8).take(32 - l)) {
        tup.serialize_element(e)?;
    }

    tup.end()
}

struct ArrayStringVisitor;
impl<'de> Visitor<'de> for ArrayStringVisitor {
    type Value = BString;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of 32 bytes")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut buf = Vec::with_capacity(32);
        for i in 0..32 {
            let e: u8 = seq
                .next_element()?
                .ok_or_else(|| A::Error::invalid_length(i, &self))?;
            buf.push(e);
        }

        let end = buf.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        buf.truncate(end);

        Ok(BString::from(buf))
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BString, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_tuple(32, ArrayStringVisitor)
}
