//! Closed action vocabularies, one registry per client type. Deployed
//! governance contracts only dispatch on these selectors, so the sets are
//! fixed at compile time and built once on first use.

use ethers::abi::ParamType;
use once_cell::sync::Lazy;

use super::{FunctionDescriptor, FunctionRegistry};

fn address_array() -> ParamType {
    ParamType::Array(Box::new(ParamType::Address))
}

/// `(to, value, data)` tuples as proposals carry them.
fn action_array() -> ParamType {
    ParamType::Array(Box::new(ParamType::Tuple(vec![
        ParamType::Address,
        ParamType::Uint(256),
        ParamType::Bytes,
    ])))
}

static DAO: Lazy<FunctionRegistry> = Lazy::new(|| {
    FunctionRegistry::new(
        "dao",
        vec![
            FunctionDescriptor::new("setMetadata", vec![ParamType::Bytes]),
            FunctionDescriptor::new("setDaoURI", vec![ParamType::String]),
            FunctionDescriptor::new(
                "grant",
                vec![
                    ParamType::Address,
                    ParamType::Address,
                    ParamType::FixedBytes(32),
                ],
            ),
            FunctionDescriptor::new(
                "revoke",
                vec![
                    ParamType::Address,
                    ParamType::Address,
                    ParamType::FixedBytes(32),
                ],
            ),
            FunctionDescriptor::new(
                "deposit",
                vec![ParamType::Address, ParamType::Uint(256), ParamType::String],
            ),
            FunctionDescriptor::new("upgradeTo", vec![ParamType::Address]),
        ],
    )
});

static DAO_FACTORY: Lazy<FunctionRegistry> = Lazy::new(|| {
    FunctionRegistry::new(
        "dao-factory",
        vec![FunctionDescriptor::new(
            "createDao",
            vec![
                // (trustedForwarder, daoURI, subdomain, metadata)
                ParamType::Tuple(vec![
                    ParamType::Address,
                    ParamType::String,
                    ParamType::String,
                    ParamType::Bytes,
                ]),
                // (((release, build), pluginSetupRepo), data)[]
                ParamType::Array(Box::new(ParamType::Tuple(vec![
                    ParamType::Tuple(vec![
                        ParamType::Tuple(vec![ParamType::Uint(8), ParamType::Uint(16)]),
                        ParamType::Address,
                    ]),
                    ParamType::Bytes,
                ]))),
            ],
        )],
    )
});

static MULTISIG: Lazy<FunctionRegistry> = Lazy::new(|| {
    FunctionRegistry::new(
        "multisig",
        vec![
            FunctionDescriptor::new("addAddresses", vec![address_array()]),
            FunctionDescriptor::new("removeAddresses", vec![address_array()]),
            FunctionDescriptor::new(
                "updateMultisigSettings",
                vec![ParamType::Tuple(vec![
                    ParamType::Bool,
                    ParamType::Uint(16),
                ])],
            ),
            FunctionDescriptor::new(
                "createProposal",
                vec![
                    ParamType::Bytes,
                    action_array(),
                    ParamType::Uint(256),
                    ParamType::Bool,
                    ParamType::Bool,
                    ParamType::Uint(64),
                    ParamType::Uint(64),
                ],
            ),
            FunctionDescriptor::new("approve", vec![ParamType::Uint(256), ParamType::Bool]),
            FunctionDescriptor::new("execute", vec![ParamType::Uint(256)]),
        ],
    )
});

static TOKEN_VOTING: Lazy<FunctionRegistry> = Lazy::new(|| {
    FunctionRegistry::new(
        "token-voting",
        vec![
            FunctionDescriptor::new(
                "updateVotingSettings",
                vec![ParamType::Tuple(vec![
                    ParamType::Uint(8),
                    ParamType::Uint(32),
                    ParamType::Uint(32),
                    ParamType::Uint(64),
                    ParamType::Uint(256),
                ])],
            ),
            FunctionDescriptor::new(
                "createProposal",
                vec![
                    ParamType::Bytes,
                    action_array(),
                    ParamType::Uint(256),
                    ParamType::Uint(64),
                    ParamType::Uint(64),
                    ParamType::Uint(8),
                    ParamType::Bool,
                ],
            ),
            FunctionDescriptor::new(
                "vote",
                vec![ParamType::Uint(256), ParamType::Uint(8), ParamType::Bool],
            ),
            FunctionDescriptor::new("execute", vec![ParamType::Uint(256)]),
            FunctionDescriptor::new("mint", vec![ParamType::Address, ParamType::Uint(256)]),
        ],
    )
});

static ADMIN: Lazy<FunctionRegistry> = Lazy::new(|| {
    FunctionRegistry::new(
        "admin",
        vec![FunctionDescriptor::new(
            "executeProposal",
            vec![ParamType::Bytes, action_array(), ParamType::Uint(256)],
        )],
    )
});

static ERC20: Lazy<FunctionRegistry> = Lazy::new(|| {
    FunctionRegistry::new(
        "erc20",
        vec![
            FunctionDescriptor::new("approve", vec![ParamType::Address, ParamType::Uint(256)]),
            FunctionDescriptor::new("allowance", vec![ParamType::Address, ParamType::Address]),
            FunctionDescriptor::new("balanceOf", vec![ParamType::Address]),
        ],
    )
});

pub fn dao() -> &'static FunctionRegistry {
    &DAO
}

pub fn dao_factory() -> &'static FunctionRegistry {
    &DAO_FACTORY
}

pub fn multisig() -> &'static FunctionRegistry {
    &MULTISIG
}

pub fn token_voting() -> &'static FunctionRegistry {
    &TOKEN_VOTING
}

pub fn admin() -> &'static FunctionRegistry {
    &ADMIN
}

pub fn erc20() -> &'static FunctionRegistry {
    &ERC20
}

#[cfg(test)]
mod tests {
    use ethers::abi::Token;
    use ethers::types::Address;

    use super::*;

    #[test]
    fn add_addresses_matches_deployed_layout() {
        let members: Vec<Address> = [
            "0x1357924680135792468013579246801357924680",
            "0x2468013579246801357924680135792468013579",
            "0x0987654321098765432109876543210987654321",
        ]
        .iter()
        .map(|addr| addr.parse().expect("address"))
        .collect();
        let args = vec![Token::Array(
            members.iter().copied().map(Token::Address).collect(),
        )];
        let encoded = multisig().encode("addAddresses", &args).expect("encode");

        let expected = concat!(
            "6496d3fc",
            "0000000000000000000000000000000000000000000000000000000000000020",
            "0000000000000000000000000000000000000000000000000000000000000003",
            "0000000000000000000000001357924680135792468013579246801357924680",
            "0000000000000000000000002468013579246801357924680135792468013579",
            "0000000000000000000000000987654321098765432109876543210987654321",
        );
        assert_eq!(hex::encode(&encoded), expected);
    }

    #[test]
    fn every_registry_entry_round_trips() {
        use ethers::types::U256;

        let cases: Vec<(&FunctionRegistry, &str, Vec<Token>)> = vec![
            (
                dao(),
                "setMetadata",
                vec![Token::Bytes(vec![0x01, 0x02, 0x03])],
            ),
            (
                dao(),
                "grant",
                vec![
                    Token::Address(Address::from([0x11; 20])),
                    Token::Address(Address::from([0x22; 20])),
                    Token::FixedBytes(vec![0xab; 32]),
                ],
            ),
            (
                dao(),
                "deposit",
                vec![
                    Token::Address(Address::zero()),
                    Token::Uint(U256::from(5u64)),
                    Token::String(String::new()),
                ],
            ),
            (
                multisig(),
                "updateMultisigSettings",
                vec![Token::Tuple(vec![
                    Token::Bool(true),
                    Token::Uint(U256::from(3u64)),
                ])],
            ),
            (
                multisig(),
                "approve",
                vec![Token::Uint(U256::from(1u64)), Token::Bool(false)],
            ),
            (
                token_voting(),
                "vote",
                vec![
                    Token::Uint(U256::from(9u64)),
                    Token::Uint(U256::from(2u64)),
                    Token::Bool(false),
                ],
            ),
            (
                token_voting(),
                "createProposal",
                vec![
                    Token::Bytes(vec![0x69, 0x70]),
                    Token::Array(vec![Token::Tuple(vec![
                        Token::Address(Address::from([0x33; 20])),
                        Token::Uint(U256::zero()),
                        Token::Bytes(vec![0xff]),
                    ])]),
                    Token::Uint(U256::zero()),
                    Token::Uint(U256::from(100u64)),
                    Token::Uint(U256::from(200u64)),
                    Token::Uint(U256::from(2u64)),
                    Token::Bool(true),
                ],
            ),
            (
                admin(),
                "executeProposal",
                vec![
                    Token::Bytes(Vec::new()),
                    Token::Array(Vec::new()),
                    Token::Uint(U256::zero()),
                ],
            ),
            (
                erc20(),
                "allowance",
                vec![
                    Token::Address(Address::from([0x44; 20])),
                    Token::Address(Address::from([0x55; 20])),
                ],
            ),
        ];

        for (registry, name, args) in cases {
            let encoded = registry
                .encode(name, &args)
                .unwrap_or_else(|err| panic!("encode {name}: {err}"));
            let (descriptor, decoded) = registry
                .decode(&encoded)
                .unwrap_or_else(|err| panic!("decode {name}: {err}"));
            assert_eq!(descriptor.name(), name);
            assert_eq!(decoded, args, "round trip for {name}");
        }
    }

    #[test]
    fn registries_do_not_leak_across_vocabularies() {
        let encoded = multisig()
            .encode(
                "addAddresses",
                &[Token::Array(vec![Token::Address(Address::zero())])],
            )
            .expect("encode");
        assert!(dao().identify(&encoded).is_none());
        assert!(token_voting().identify(&encoded).is_none());
    }
}
