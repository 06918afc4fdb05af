//! Governance actions for the core bridge: guardian set rotation, contract upgrades and fee
//! management.

use serde::{de::SeqAccess, ser::SerializeStruct, Deserialize, Serialize};

use crate::{
    governance::{self, module_id, GovernanceAction},
    Address, Amount, GuardianAddress,
};

/// Represents a governance action targeted at the core bridge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    #[serde(rename = "1")]
    ContractUpgrade { new_contract: Address },

    /// Replaces the current guardian set. `new_index` must be exactly one more than the index of
    /// the set being replaced.
    #[serde(rename = "2")]
    GuardianSetUpgrade {
        new_index: u32,
        new_guardians: Vec<GuardianAddress>,
    },

    #[serde(rename = "3")]
    SetMessageFee { fee: Amount },

    #[serde(rename = "4")]
    TransferFees { amount: Amount, recipient: Address },
}

/// Represents the payload for a governance VAA targeted at the core bridge.
pub type GovernancePacket = governance::GovernancePacket<Action>;

// MODULE = "Core"
pub const MODULE: [u8; 32] = module_id(b"Core");

#[derive(Serialize, Deserialize)]
struct ContractUpgrade {
    new_contract: Address,
}

#[derive(Serialize, Deserialize)]
struct GuardianSetUpgrade {
    new_index: u32,
    new_guardians: Vec<GuardianAddress>,
}

#[derive(Serialize, Deserialize)]
struct SetMessageFee {
    fee: Amount,
}

#[derive(Serialize, Deserialize)]
struct TransferFees {
    amount: Amount,
    recipient: Address,
}

impl GovernanceAction for Action {
    const MODULE: [u8; 32] = MODULE;
    const NAME: &'static str = "Core";

    fn action(&self) -> u8 {
        match self {
            Action::ContractUpgrade { .. } => 1,
            Action::GuardianSetUpgrade { .. } => 2,
            Action::SetMessageFee { .. } => 3,
            Action::TransferFees { .. } => 4,
        }
    }

    fn is_known(action: u8) -> bool {
        matches!(action, 1..=4)
    }

    fn serialize_payload<S: SerializeStruct>(&self, seq: &mut S) -> Result<(), S::Error> {
        match self {
            Action::ContractUpgrade { new_contract } => seq.serialize_field(
                "payload",
                &ContractUpgrade {
                    new_contract: *new_contract,
                },
            ),
            Action::GuardianSetUpgrade {
                new_index,
                new_guardians,
            } => seq.serialize_field(
                "payload",
                &GuardianSetUpgrade {
                    new_index: *new_index,
                    new_guardians: new_guardians.clone(),
                },
            ),
            Action::SetMessageFee { fee } => {
                seq.serialize_field("payload", &SetMessageFee { fee: *fee })
            }
            Action::TransferFees { amount, recipient } => seq.serialize_field(
                "payload",
                &TransferFees {
                    amount: *amount,
                    recipient: *recipient,
                },
            ),
        }
    }

    fn deserialize_payload<'de, A: SeqAccess<'de>>(
        action: u8,
        seq: &mut A,
    ) -> Result<Self, A::Error> {
        Ok(match action {
            1 => {
                let ContractUpgrade { new_contract } = governance::next_payload(seq)?;
                Action::ContractUpgrade { new_contract }
            }
            2 => {
                let GuardianSetUpgrade {
                    new_index,
                    new_guardians,
                } = governance::next_payload(seq)?;
                Action::GuardianSetUpgrade {
                    new_index,
                    new_guardians,
                }
            }
            3 => {
                let SetMessageFee { fee } = governance::next_payload(seq)?;
                Action::SetMessageFee { fee }
            }
            _ => {
                let TransferFees { amount, recipient } = governance::next_payload(seq)?;
                Action::TransferFees { amount, recipient }
            }
        })
    }
}

#[cfg(test)]
mod test {
    use crate::Chain;

    use super::*;

    #[test]
    fn guardian_set_upgrade() {
        let buf = hex::decode(
            "00000000000000000000000000000000000000000000000000000000436f7265\
             02\
             0000\
             00000001\
             02\
             befa429d57cd18b7f8a4d91a2da9ab4af05d0fbe\
             88d7d8b32a9105d228100e72dffe2fae0705d31c",
        )
        .unwrap();

        let pkt: GovernancePacket = serde_wormhole::from_slice(&buf).unwrap();
        assert_eq!(Chain::Any, pkt.chain);

        match &pkt.action {
            Action::GuardianSetUpgrade {
                new_index,
                new_guardians,
            } => {
                assert_eq!(1, *new_index);
                assert_eq!(2, new_guardians.len());
                assert_eq!(0xbe, new_guardians[0].0[0]);
                assert_eq!(0x1c, new_guardians[1].0[19]);
            }
            a => panic!("unexpected action: {a:?}"),
        }

        assert_eq!(buf, serde_wormhole::to_vec(&pkt).unwrap());
    }

    #[test]
    fn fee_actions() {
        let actions = [
            Action::ContractUpgrade {
                new_contract: Address([0x11; 32]),
            },
            Action::SetMessageFee {
                fee: Amount::from(1_000u64),
            },
            Action::TransferFees {
                amount: Amount::from(5u64),
                recipient: Address([0x22; 32]),
            },
        ];

        for action in actions {
            let pkt = GovernancePacket {
                chain: Chain::Wormchain,
                action,
            };
            let buf = serde_wormhole::to_vec(&pkt).unwrap();
            assert_eq!(pkt.action.action(), buf[32]);
            assert_eq!([0x0c, 0x20], buf[33..35]);
            assert_eq!(pkt, serde_wormhole::from_slice(&buf).unwrap());
        }
    }

    #[test]
    fn truncated_guardian_list() {
        let buf = hex::decode(
            "00000000000000000000000000000000000000000000000000000000436f7265\
             02\
             0000\
             00000001\
             02\
             befa429d57cd18b7f8a4d91a2da9ab4af05d0fbe",
        )
        .unwrap();

        let _ = serde_wormhole::from_slice::<GovernancePacket>(&buf)
            .expect_err("deserialized a guardian set with a missing guardian");
    }
}
