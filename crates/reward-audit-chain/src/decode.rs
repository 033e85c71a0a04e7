// crates/reward-audit-chain/src/decode.rs
//
// Conversion of dynamically decoded reward-pallet storage into the audit's
// data model.
//
// Values arrive as metadata-driven `scale_value::Value`s. Newtype wrappers
// (bounded collections, `RankedTier`-style ids, `AccountId32`) show up as
// single-child composites, so the helpers here look through those rather
// than depending on one exact runtime version's type layout.

use std::collections::BTreeMap;

use subxt::ext::scale_value::{Composite, Primitive, Value, ValueDef};
use subxt::utils::AccountId32;

use reward_audit_core::{
    AuditError, Balance, DAppId, DAppInfo, ProtocolState, TierId, TierRewards,
};

/// `DappStaking::ActiveProtocolState`.
pub fn protocol_state<T>(value: &Value<T>) -> Result<ProtocolState, AuditError> {
    let period = match field(value, "period_info") {
        Ok(info) => narrow(uint(field(info, "number")?)?, "period_info.number")?,
        Err(_) => 0,
    };
    Ok(ProtocolState {
        era: narrow(uint(field(value, "era")?)?, "era")?,
        next_era_start: narrow(uint(field(value, "next_era_start")?)?, "next_era_start")?,
        period,
        maintenance: boolean(field(value, "maintenance")?)?,
    })
}

/// `DappStaking::DAppTiers(era)`.
pub fn tier_rewards<T>(value: &Value<T>) -> Result<TierRewards, AuditError> {
    let mut dapps = BTreeMap::new();
    for (dapp, ranked) in map_entries(field(value, "dapps")?)? {
        dapps.insert(
            narrow::<DAppId>(dapp, "dapps.key")?,
            tier_of(narrow::<u8>(ranked, "dapps.value")?),
        );
    }
    Ok(TierRewards {
        dapps,
        rewards: uint_list(field(value, "rewards")?)?,
        period: narrow(uint(field(value, "period")?)?, "period")?,
    })
}

/// Tier half of a packed `RankedTier` byte: tier in the low nibble, rank in
/// the high nibble. Unranked runtimes store the bare tier, which passes
/// through unchanged.
pub fn tier_of(ranked: u8) -> TierId {
    ranked & 0x0f
}

/// One `DappStaking::IntegratedDApps` value.
pub fn dapp_info<T>(value: &Value<T>) -> Result<DAppInfo, AuditError> {
    let reward_beneficiary = match option(field(value, "reward_beneficiary")?)? {
        Some(inner) => Some(address(inner)?),
        None => None,
    };
    Ok(DAppInfo {
        id: narrow(uint(field(value, "id")?)?, "id")?,
        owner: address(field(value, "owner")?)?,
        reward_beneficiary,
    })
}

/// Render an account as SS58 (32-byte ids) or `0x` hex (anything else).
pub fn address<T>(value: &Value<T>) -> Result<String, AuditError> {
    let raw = bytes(value)?;
    match <[u8; 32]>::try_from(raw.as_slice()) {
        Ok(id) => Ok(AccountId32(id).to_string()),
        Err(_) => Ok(format!("0x{}", hex::encode(raw))),
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn decode_err(msg: impl Into<String>) -> AuditError {
    AuditError::Decode(msg.into())
}

fn children<T>(value: &Value<T>) -> Option<Vec<&Value<T>>> {
    match &value.value {
        ValueDef::Composite(Composite::Named(fields)) => Some(fields.iter().map(|(_, v)| v).collect()),
        ValueDef::Composite(Composite::Unnamed(values)) => Some(values.iter().collect()),
        _ => None,
    }
}

/// Named field of a struct-like value, looking through newtype wrappers.
fn field<'a, T>(value: &'a Value<T>, name: &str) -> Result<&'a Value<T>, AuditError> {
    match &value.value {
        ValueDef::Composite(Composite::Named(fields)) => fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| decode_err(format!("missing field `{}`", name))),
        ValueDef::Composite(Composite::Unnamed(values)) if values.len() == 1 => {
            field(&values[0], name)
        }
        _ => Err(decode_err(format!("expected a struct with field `{}`", name))),
    }
}

fn as_uint<T>(value: &Value<T>) -> Option<u128> {
    match &value.value {
        ValueDef::Primitive(Primitive::U128(n)) => Some(*n),
        ValueDef::Composite(_) => match children(value)?.as_slice() {
            [only] => as_uint(only),
            _ => None,
        },
        _ => None,
    }
}

fn uint<T>(value: &Value<T>) -> Result<u128, AuditError> {
    as_uint(value).ok_or_else(|| decode_err("expected an unsigned integer"))
}

fn narrow<N: TryFrom<u128>>(n: u128, what: &str) -> Result<N, AuditError> {
    N::try_from(n).map_err(|_| decode_err(format!("{} value {} out of range", what, n)))
}

fn boolean<T>(value: &Value<T>) -> Result<bool, AuditError> {
    match &value.value {
        ValueDef::Primitive(Primitive::Bool(b)) => Ok(*b),
        _ => Err(decode_err("expected a bool")),
    }
}

fn option<T>(value: &Value<T>) -> Result<Option<&Value<T>>, AuditError> {
    match &value.value {
        ValueDef::Variant(variant) if variant.name == "None" => Ok(None),
        ValueDef::Variant(variant) if variant.name == "Some" => {
            let inner = match &variant.values {
                Composite::Named(fields) => fields.first().map(|(_, v)| v),
                Composite::Unnamed(values) => values.first(),
            };
            inner
                .map(Some)
                .ok_or_else(|| decode_err("`Some` without a value"))
        }
        _ => Err(decode_err("expected an Option")),
    }
}

/// Byte string, e.g. an account id inside its newtype wrapper(s).
fn bytes<T>(value: &Value<T>) -> Result<Vec<u8>, AuditError> {
    let items = children(value).ok_or_else(|| decode_err("expected a byte sequence"))?;
    let direct: Option<Vec<u8>> = items
        .iter()
        .map(|v| match &v.value {
            ValueDef::Primitive(Primitive::U128(n)) => u8::try_from(*n).ok(),
            _ => None,
        })
        .collect();
    match direct {
        Some(out) if !out.is_empty() || items.is_empty() => Ok(out),
        _ if items.len() == 1 => bytes(items[0]),
        _ => Err(decode_err("expected a byte sequence")),
    }
}

/// Sequence of unsigned integers, looking through bounded wrappers.
fn uint_list<T>(value: &Value<T>) -> Result<Vec<Balance>, AuditError> {
    let items = children(value).ok_or_else(|| decode_err("expected a sequence"))?;
    if let Some(list) = items.iter().map(|v| as_uint(v)).collect::<Option<Vec<_>>>() {
        return Ok(list);
    }
    match items.as_slice() {
        [only] => uint_list(only),
        _ => Err(decode_err("expected a sequence of integers")),
    }
}

/// Integer-keyed map encoded as a sequence of `(key, value)` pairs.
fn map_entries<T>(value: &Value<T>) -> Result<Vec<(u128, u128)>, AuditError> {
    let items = children(value).ok_or_else(|| decode_err("expected a map"))?;
    if let Some(pairs) = items.iter().map(|v| as_pair(v)).collect::<Option<Vec<_>>>() {
        return Ok(pairs);
    }
    match items.as_slice() {
        [only] => map_entries(only),
        _ => Err(decode_err("expected a map of integers")),
    }
}

fn as_pair<T>(value: &Value<T>) -> Option<(u128, u128)> {
    match children(value)?.as_slice() {
        [key, val] => Some((as_uint(key)?, as_uint(val)?)),
        _ => None,
    }
}
