//! BCS encoding of the registry lookup as a Sui `TransactionKind`.
//!
//! Only the subset of the transaction schema needed for a single
//! `get_pool_id_by_asset<Base, Quote>(&Registry)` move call is modelled.
//! Variant order fixes each BCS tag, so unused variants stay declared.

use super::registry::{RegistryCall, RegistryCallEncoder};
use crate::errors::{AppError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

pub type Address = [u8; 32];

pub const POOL_MODULE: &str = "pool";
pub const GET_POOL_ID_BY_ASSET: &str = "get_pool_id_by_asset";

#[derive(Serialize)]
enum TransactionKind {
    ProgrammableTransaction(ProgrammableTransaction),
}

#[derive(Serialize)]
struct ProgrammableTransaction {
    inputs: Vec<CallArg>,
    commands: Vec<Command>,
}

#[derive(Serialize)]
#[allow(dead_code)]
enum CallArg {
    Pure(Vec<u8>),
    Object(ObjectArg),
}

#[derive(Serialize)]
#[allow(dead_code)]
enum ObjectArg {
    ImmOrOwnedObject(Address, u64, Vec<u8>),
    SharedObject {
        id: Address,
        initial_shared_version: u64,
        mutable: bool,
    },
}

#[derive(Serialize)]
enum Command {
    MoveCall(Box<ProgrammableMoveCall>),
}

#[derive(Serialize)]
struct ProgrammableMoveCall {
    package: Address,
    module: String,
    function: String,
    type_arguments: Vec<TypeTag>,
    arguments: Vec<Argument>,
}

#[derive(Serialize)]
#[allow(dead_code)]
enum Argument {
    GasCoin,
    Input(u16),
}

/// A Move type such as `0x2::sui::SUI` or `vector<u8>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TypeTag {
    Bool,
    U8,
    U64,
    U128,
    Address,
    Signer,
    Vector(Box<TypeTag>),
    Struct(Box<StructTag>),
    U16,
    U32,
    U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructTag {
    pub address: Address,
    pub module: String,
    pub name: String,
    pub type_params: Vec<TypeTag>,
}

/// Encodes registry calls as base64 `TransactionKind` bytes, the form
/// `sui_devInspectTransactionBlock` accepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct BcsCallEncoder;

impl RegistryCallEncoder for BcsCallEncoder {
    fn encode(&self, call: &RegistryCall) -> Result<String> {
        Ok(STANDARD.encode(transaction_kind_bytes(call)?))
    }
}

/// Raw BCS bytes of the programmable transaction performing `call`.
pub fn transaction_kind_bytes(call: &RegistryCall) -> Result<Vec<u8>> {
    let move_call = ProgrammableMoveCall {
        package: parse_address(&call.package)?,
        module: POOL_MODULE.into(),
        function: GET_POOL_ID_BY_ASSET.into(),
        type_arguments: vec![parse_type_tag(&call.base)?, parse_type_tag(&call.quote)?],
        arguments: vec![Argument::Input(0)],
    };
    let kind = TransactionKind::ProgrammableTransaction(ProgrammableTransaction {
        // The registry is only borrowed immutably.
        inputs: vec![CallArg::Object(ObjectArg::SharedObject {
            id: parse_address(&call.registry)?,
            initial_shared_version: call.registry_version,
            mutable: false,
        })],
        commands: vec![Command::MoveCall(Box::new(move_call))],
    });
    Ok(bcs::to_bytes(&kind)?)
}

/// Parses `0x`-prefixed hex, left-padding short forms such as `0x2`.
pub fn parse_address(raw: &str) -> Result<Address> {
    let digits = raw.trim().strip_prefix("0x").unwrap_or(raw.trim());
    if digits.is_empty() || digits.len() > 64 {
        return Err(invalid_type(raw));
    }
    let bytes = hex::decode(format!("{digits:0>64}")).map_err(|_| invalid_type(raw))?;
    bytes.try_into().map_err(|_| invalid_type(raw))
}

pub fn parse_type_tag(raw: &str) -> Result<TypeTag> {
    let raw = raw.trim();
    let tag = match raw {
        "bool" => TypeTag::Bool,
        "u8" => TypeTag::U8,
        "u16" => TypeTag::U16,
        "u32" => TypeTag::U32,
        "u64" => TypeTag::U64,
        "u128" => TypeTag::U128,
        "u256" => TypeTag::U256,
        "address" => TypeTag::Address,
        "signer" => TypeTag::Signer,
        _ => match raw.strip_prefix("vector<").and_then(|r| r.strip_suffix('>')) {
            Some(inner) => TypeTag::Vector(Box::new(parse_type_tag(inner)?)),
            None => TypeTag::Struct(Box::new(parse_struct_tag(raw)?)),
        },
    };
    Ok(tag)
}

fn parse_struct_tag(raw: &str) -> Result<StructTag> {
    let (head, type_params) = match raw.find('<') {
        Some(open) => {
            let inner = raw[open + 1..]
                .strip_suffix('>')
                .ok_or_else(|| invalid_type(raw))?;
            let params = split_top_level(inner)
                .into_iter()
                .map(parse_type_tag)
                .collect::<Result<Vec<_>>>()?;
            (&raw[..open], params)
        }
        None => (raw, Vec::new()),
    };
    let mut parts = head.split("::");
    let (Some(address), Some(module), Some(name), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid_type(raw));
    };
    if module.is_empty() || name.is_empty() {
        return Err(invalid_type(raw));
    }
    Ok(StructTag {
        address: parse_address(address)?,
        module: module.to_string(),
        name: name.to_string(),
        type_params,
    })
}

fn split_top_level(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(raw[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(raw[start..].trim());
    parts
}

fn invalid_type(raw: &str) -> AppError {
    AppError::InvalidMoveType(raw.to_string())
}
