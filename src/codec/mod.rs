use std::collections::HashMap;

use ethers::abi::{Function, Param, ParamType, StateMutability, Token};
use ethers::types::{Address, Bytes, U256};
use thiserror::Error;

pub mod registries;

pub const SELECTOR_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("function `{0}` is not part of this registry")]
    UnknownFunction(String),
    #[error("no descriptor matches selector 0x{}", hex::encode(.0))]
    UnknownFunctionSelector([u8; SELECTOR_LEN]),
    #[error("action payload is shorter than a 4-byte selector")]
    MalformedPayload,
    #[error("abi coding failed: {0}")]
    Abi(#[from] ethers::abi::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// The `{target, value, payload}` triple a governance action is submitted as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

/// One known contract function: canonical signature plus the 4-byte keccak
/// selector deployed contracts dispatch on.
#[derive(Clone, Debug)]
pub struct FunctionDescriptor {
    signature: String,
    selector: [u8; SELECTOR_LEN],
    function: Function,
}

impl FunctionDescriptor {
    pub fn new(name: &str, inputs: Vec<ParamType>) -> Self {
        #[allow(deprecated)]
        let function = Function {
            name: name.to_string(),
            inputs: inputs
                .into_iter()
                .map(|kind| Param {
                    name: String::new(),
                    kind,
                    internal_type: None,
                })
                .collect(),
            outputs: Vec::new(),
            constant: None,
            state_mutability: StateMutability::NonPayable,
        };
        let signature = function.signature();
        let selector = function.short_signature();
        Self {
            signature,
            selector,
            function,
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn selector(&self) -> [u8; SELECTOR_LEN] {
        self.selector
    }

    pub fn param_types(&self) -> Vec<ParamType> {
        self.function
            .inputs
            .iter()
            .map(|param| param.kind.clone())
            .collect()
    }
}

/// Closed action vocabulary of one client type. Built once; lookups go
/// through a selector-keyed table instead of scanning descriptors.
#[derive(Clone, Debug)]
pub struct FunctionRegistry {
    label: &'static str,
    by_selector: HashMap<[u8; SELECTOR_LEN], FunctionDescriptor>,
    by_name: HashMap<String, [u8; SELECTOR_LEN]>,
    order: Vec<[u8; SELECTOR_LEN]>,
}

impl FunctionRegistry {
    pub fn new(label: &'static str, descriptors: Vec<FunctionDescriptor>) -> Self {
        let mut by_selector = HashMap::with_capacity(descriptors.len());
        let mut by_name = HashMap::with_capacity(descriptors.len());
        let mut order = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            by_name.insert(descriptor.name().to_string(), descriptor.selector);
            order.push(descriptor.selector);
            by_selector.insert(descriptor.selector, descriptor);
        }
        Self {
            label,
            by_selector,
            by_name,
            order,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.order
            .iter()
            .filter_map(|selector| self.by_selector.get(selector))
    }

    pub fn descriptor(&self, name: &str) -> CodecResult<&FunctionDescriptor> {
        self.by_name
            .get(name)
            .and_then(|selector| self.by_selector.get(selector))
            .ok_or_else(|| CodecError::UnknownFunction(name.to_string()))
    }

    pub fn by_selector(&self, selector: [u8; SELECTOR_LEN]) -> Option<&FunctionDescriptor> {
        self.by_selector.get(&selector)
    }

    /// ABI-encodes `args` for the named function and prepends its selector.
    /// Deterministic: the same arguments always produce the same bytes.
    pub fn encode(&self, name: &str, args: &[Token]) -> CodecResult<Bytes> {
        let descriptor = self.descriptor(name)?;
        let data = descriptor.function.encode_input(args)?;
        Ok(Bytes::from(data))
    }

    pub fn encode_action(
        &self,
        to: Address,
        value: U256,
        name: &str,
        args: &[Token],
    ) -> CodecResult<Action> {
        Ok(Action {
            to,
            value,
            data: self.encode(name, args)?,
        })
    }

    /// Inverse of [`FunctionRegistry::encode`]: matches the leading selector
    /// against the registry and parses the remaining bytes.
    pub fn decode<'a>(&'a self, data: &[u8]) -> CodecResult<(&'a FunctionDescriptor, Vec<Token>)> {
        if data.len() < SELECTOR_LEN {
            return Err(CodecError::MalformedPayload);
        }
        let mut selector = [0u8; SELECTOR_LEN];
        selector.copy_from_slice(&data[..SELECTOR_LEN]);
        let descriptor = self
            .by_selector
            .get(&selector)
            .ok_or(CodecError::UnknownFunctionSelector(selector))?;
        let args = descriptor.function.decode_input(&data[SELECTOR_LEN..])?;
        Ok((descriptor, args))
    }

    /// Best-effort selector lookup; `None` instead of an error on mismatch.
    pub fn identify(&self, data: &[u8]) -> Option<&FunctionDescriptor> {
        if data.len() < SELECTOR_LEN {
            return None;
        }
        let mut selector = [0u8; SELECTOR_LEN];
        selector.copy_from_slice(&data[..SELECTOR_LEN]);
        self.by_selector.get(&selector)
    }
}
