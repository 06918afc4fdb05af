//! Provide Types and Data about Wormhole's supported chains.
//!
//! Every chain is identified on the wire by a `u16`. Ids that are not listed here are preserved
//! as `Chain::Unknown` so that a `u16 -> Chain -> u16` conversion never loses information.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// How a chain's native address maps onto Wormhole's 32 byte canonical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// 20 byte addresses, left zero padded to 32.
    Evm,
    /// Native addresses are already 32 bytes.
    Fixed32,
    /// Either 20 byte account addresses or 32 byte contract addresses.
    Cosmos,
    /// No known layout. Anything up to 32 bytes is left zero padded.
    Opaque,
}

impl AddressFamily {
    /// The native address lengths accepted by this family.
    pub fn native_lengths(self) -> &'static [usize] {
        match self {
            AddressFamily::Evm => &[20],
            AddressFamily::Fixed32 => &[32],
            AddressFamily::Cosmos => &[20, 32],
            AddressFamily::Opaque => &[],
        }
    }
}

macro_rules! chains {
    ($($name:ident = $id:literal => $family:ident,)*) => {
        /// Chain contains a mapping of Wormhole supported chains to their u16 representation.
        /// These are universally defined among all Wormhole contracts.
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Chain {
            /// In the wormhole wire format, 0 indicates that a message is for any destination
            /// chain.
            #[default]
            Any,
            $($name,)*
            Unknown(u16),
        }

        impl From<u16> for Chain {
            fn from(other: u16) -> Chain {
                match other {
                    0 => Chain::Any,
                    $($id => Chain::$name,)*
                    c => Chain::Unknown(c),
                }
            }
        }

        impl From<Chain> for u16 {
            fn from(other: Chain) -> u16 {
                match other {
                    Chain::Any => 0,
                    $(Chain::$name => $id,)*
                    Chain::Unknown(c) => c,
                }
            }
        }

        impl Chain {
            /// The address layout used by this chain.
            pub fn address_family(self) -> AddressFamily {
                match self {
                    Chain::Any | Chain::Unknown(_) => AddressFamily::Opaque,
                    $(Chain::$name => AddressFamily::$family,)*
                }
            }
        }

        impl fmt::Display for Chain {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Chain::Any => f.write_str("Any"),
                    $(Chain::$name => f.write_str(stringify!($name)),)*
                    Chain::Unknown(c) => write!(f, "Unknown({c})"),
                }
            }
        }

        impl FromStr for Chain {
            type Err = InvalidChainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.eq_ignore_ascii_case("any") {
                    return Ok(Chain::Any);
                }
                $(
                    if s.eq_ignore_ascii_case(stringify!($name)) {
                        return Ok(Chain::$name);
                    }
                )*

                let inner = s
                    .strip_prefix("Unknown(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .unwrap_or(s);

                inner
                    .parse::<u16>()
                    .map(Chain::from)
                    .map_err(|_| InvalidChainError(s.into()))
            }
        }
    };
}

chains! {
    Solana = 1 => Fixed32,
    Ethereum = 2 => Evm,
    Terra = 3 => Cosmos,
    Bsc = 4 => Evm,
    Polygon = 5 => Evm,
    Avalanche = 6 => Evm,
    Oasis = 7 => Evm,
    Algorand = 8 => Fixed32,
    Aurora = 9 => Evm,
    Fantom = 10 => Evm,
    Karura = 11 => Evm,
    Acala = 12 => Evm,
    Klaytn = 13 => Evm,
    Celo = 14 => Evm,
    Near = 15 => Fixed32,
    Moonbeam = 16 => Evm,
    Neon = 17 => Evm,
    Terra2 = 18 => Cosmos,
    Injective = 19 => Cosmos,
    Osmosis = 20 => Cosmos,
    Sui = 21 => Fixed32,
    Aptos = 22 => Fixed32,
    Arbitrum = 23 => Evm,
    Optimism = 24 => Evm,
    Gnosis = 25 => Evm,
    Pythnet = 26 => Fixed32,
    Xpla = 28 => Cosmos,
    Base = 30 => Evm,
    Sei = 32 => Cosmos,
    Rootstock = 33 => Evm,
    Scroll = 34 => Evm,
    Mantle = 35 => Evm,
    Blast = 36 => Evm,
    XLayer = 37 => Evm,
    Linea = 38 => Evm,
    Berachain = 39 => Evm,
    Wormchain = 3104 => Cosmos,
    CosmosHub = 4000 => Cosmos,
    Evmos = 4001 => Cosmos,
    Kujira = 4002 => Cosmos,
    Sepolia = 10002 => Evm,
    ArbitrumSepolia = 10003 => Evm,
    BaseSepolia = 10004 => Evm,
    OptimismSepolia = 10005 => Evm,
    Holesky = 10006 => Evm,
    PolygonSepolia = 10007 => Evm,
}

#[derive(Debug, Error)]
#[error("invalid chain: {0}")]
pub struct InvalidChainError(String);

impl Serialize for Chain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16((*self).into())
    }
}

impl<'de> Deserialize<'de> for Chain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        <u16 as Deserialize>::deserialize(deserializer).map(Self::from)
    }
}
