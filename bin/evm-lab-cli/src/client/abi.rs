//! Argument packing against a JSON ABI.

use std::path::Path;

use alloy_dyn_abi::{DynSolValue, JsonAbiExt, Specifier};
use alloy_json_abi::{JsonAbi, Param};
use alloy_primitives::Bytes;

use crate::{Error, Result};

/// Reads a JSON ABI file.
pub fn load_abi(path: &Path) -> Result<JsonAbi> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(Error::AbiFile)
}

/// Packs constructor arguments. An ABI without constructor takes no arguments.
pub fn encode_constructor_args(abi: &JsonAbi, args: &[String]) -> Result<Bytes> {
    let Some(constructor) = &abi.constructor else {
        if args.is_empty() {
            return Ok(Bytes::new());
        }
        return Err(Error::InvalidInput(format!(
            "ABI has no constructor but {} arguments were given",
            args.len()
        )));
    };
    let values = coerce_args(&constructor.inputs, args)?;
    Ok(constructor.abi_encode_input(&values)?.into())
}

/// Packs a call of `method`: selector followed by the encoded arguments. Overloads are told apart
/// by their number of parameters.
pub fn encode_call(abi: &JsonAbi, method: &str, args: &[String]) -> Result<Bytes> {
    let overloads = abi
        .function(method)
        .ok_or_else(|| Error::InvalidInput(format!("method not found: {method}")))?;
    let function = overloads.iter().find(|f| f.inputs.len() == args.len()).ok_or_else(|| {
        Error::InvalidInput(format!("no overload of {method} takes {} arguments", args.len()))
    })?;
    let values = coerce_args(&function.inputs, args)?;
    Ok(function.abi_encode_input(&values)?.into())
}

/// Parses each argument as the type of its parameter.
fn coerce_args(params: &[Param], args: &[String]) -> Result<Vec<DynSolValue>> {
    if params.len() != args.len() {
        return Err(Error::InvalidInput(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }
    params
        .iter()
        .zip(args)
        .map(|(param, arg)| -> Result<DynSolValue> { Ok(param.resolve()?.coerce_str(arg)?) })
        .collect()
}
