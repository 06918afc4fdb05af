//! Governance packets shared by every governance module.
//!
//! On the wire a packet is `module (32 bytes) | action (u8) | chain (u16) | action fields`. The
//! action byte comes before the target chain but selects the layout of the fields after it, so
//! the packet cannot simply derive its serde impls from an enum.

use std::{fmt, marker::PhantomData};

use serde::{
    de::{Error, SeqAccess, Visitor},
    ser::SerializeStruct,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::Chain;

/// The actions of a single governance module.
pub trait GovernanceAction: Sized {
    /// The 32 byte, left zero padded, module identifier.
    const MODULE: [u8; 32];

    /// Human readable module name, used in error messages.
    const NAME: &'static str;

    /// The action byte of this action.
    fn action(&self) -> u8;

    /// Whether `action` names an action of this module.
    fn is_known(action: u8) -> bool;

    /// Serializes the fields following the target chain as the "payload" field of `seq`.
    fn serialize_payload<S: SerializeStruct>(&self, seq: &mut S) -> Result<(), S::Error>;

    /// Reads the fields following the target chain for `action`.
    fn deserialize_payload<'de, A: SeqAccess<'de>>(action: u8, seq: &mut A)
        -> Result<Self, A::Error>;
}

/// Represents the payload of a governance VAA addressed to the module of `A`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GovernancePacket<A> {
    /// The chain on which the governance action should be carried out. `Chain::Any` targets
    /// every chain.
    pub chain: Chain,

    /// The actual governance action to be carried out.
    pub action: A,
}

/// Left pads `name` with zeroes into a module identifier.
pub const fn module_id(name: &[u8]) -> [u8; 32] {
    let mut buf = [0u8; 32];
    let mut i = 0;
    while i < name.len() {
        buf[32 - name.len() + i] = name[i];
        i += 1;
    }

    buf
}

struct Module<A>(PhantomData<A>);

impl<A: GovernanceAction> Serialize for Module<A> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        A::MODULE.serialize(serializer)
    }
}

impl<'de, A: GovernanceAction> Deserialize<'de> for Module<A> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let arr = <[u8; 32]>::deserialize(deserializer)?;

        if arr == A::MODULE {
            Ok(Module(PhantomData))
        } else {
            Err(Error::custom(format_args!(
                "invalid governance module, expected \"{}\"",
                A::NAME
            )))
        }
    }
}

impl<A: GovernanceAction> Serialize for GovernancePacket<A> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_struct("GovernancePacket", 4)?;
        seq.serialize_field("module", &Module::<A>(PhantomData))?;
        seq.serialize_field("action", &self.action.action())?;
        seq.serialize_field("chain", &self.chain)?;
        self.action.serialize_payload(&mut seq)?;
        seq.end()
    }
}

struct GovernancePacketVisitor<A>(PhantomData<A>);

impl<'de, A: GovernanceAction> Visitor<'de> for GovernancePacketVisitor<A> {
    type Value = GovernancePacket<A>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a {} governance packet", A::NAME)
    }

    fn visit_seq<V>(self, mut seq: V) -> Result<Self::Value, V::Error>
    where
        V: SeqAccess<'de>,
    {
        static EXPECTING: &str = "struct GovernancePacket with 4 elements";

        let _: Module<A> = seq
            .next_element()?
            .ok_or_else(|| Error::invalid_length(0, &EXPECTING))?;
        let act: u8 = seq
            .next_element()?
            .ok_or_else(|| Error::invalid_length(1, &EXPECTING))?;
        let chain = seq
            .next_element()?
            .ok_or_else(|| Error::invalid_length(2, &EXPECTING))?;

        if !A::is_known(act) {
            return Err(Error::custom(format_args!(
                "unknown {} governance action {act}",
                A::NAME
            )));
        }

        let action = A::deserialize_payload(act, &mut seq)?;

        Ok(GovernancePacket { chain, action })
    }
}

impl<'de, A: GovernanceAction> Deserialize<'de> for GovernancePacket<A> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        const FIELDS: &[&str] = &["module", "action", "chain", "payload"];
        deserializer.deserialize_struct(
            "GovernancePacket",
            FIELDS,
            GovernancePacketVisitor(PhantomData),
        )
    }
}

/// Reads the "payload" element of a governance packet.
pub(crate) fn next_payload<'de, T, A>(seq: &mut A) -> Result<T, A::Error>
where
    T: Deserialize<'de>,
    A: SeqAccess<'de>,
{
    seq.next_element()?
        .ok_or_else(|| Error::invalid_length(3, &"struct GovernancePacket with 4 elements"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn module_ids_are_left_padded() {
        let id = module_id(b"Core");
        assert_eq!([0u8; 28], id[..28]);
        assert_eq!(b"Core", &id[28..]);

        let id = module_id(b"TokenBridge");
        assert_eq!([0u8; 21], id[..21]);
        assert_eq!(b"TokenBridge", &id[21..]);
    }
}
