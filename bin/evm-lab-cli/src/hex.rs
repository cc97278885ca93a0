//! Hex loading utilities

use std::{io::Read, path::Path};

use alloy_primitives::{hex, Bytes};

use crate::Result;

/// Loads hex-encoded bytes from an argument or a file. A file named `-` is read from stdin.
/// The argument wins over the file. Returns `None` if neither is provided.
pub fn load_hex(arg: Option<&str>, file: Option<&Path>) -> Result<Option<Bytes>> {
    let hex_string = if let Some(arg) = arg {
        arg.to_string()
    } else if let Some(file) = file {
        if file == Path::new("-") {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        } else {
            std::fs::read_to_string(file)?
        }
    } else {
        return Ok(None);
    };

    decode_hex(&hex_string).map(Some)
}

/// Decodes a hex string with or without `0x` prefix. Surrounding whitespace is ignored.
pub fn decode_hex(s: &str) -> Result<Bytes> {
    Ok(hex::decode(s.trim())?.into())
}
