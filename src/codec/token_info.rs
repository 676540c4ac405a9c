//! Token info cell data.
//!
//! Layout: `u8 decimal ‖ u8 name_len ‖ name ‖ u8 symbol_len ‖ symbol`, UTF-8.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Metadata stored in an xUDT token info cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Decimal places
    pub decimal: u8,
    /// Token name
    pub name: String,
    /// Token symbol
    pub symbol: String,
}

impl TokenInfo {
    /// Create token info
    pub fn new(decimal: u8, name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            decimal,
            name: name.into(),
            symbol: symbol.into(),
        }
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        3 + self.name.len() + self.symbol.len()
    }

    /// Encode to cell data
    pub fn encode(&self) -> Result<Vec<u8>> {
        let name_len = field_len(&self.name, "name")?;
        let symbol_len = field_len(&self.symbol, "symbol")?;

        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.decimal);
        out.push(name_len);
        out.extend_from_slice(self.name.as_bytes());
        out.push(symbol_len);
        out.extend_from_slice(self.symbol.as_bytes());
        Ok(out)
    }

    /// Decode cell data; trailing bytes are rejected
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut cursor = data;
        let decimal = take(&mut cursor, 1)?[0];
        let name = take_string(&mut cursor, "name")?;
        let symbol = take_string(&mut cursor, "symbol")?;
        if !cursor.is_empty() {
            return Err(Error::encoding(
                "TokenInfo",
                format!("{} trailing bytes", cursor.len()),
            ));
        }
        Ok(Self { decimal, name, symbol })
    }
}

fn field_len(value: &str, name: &str) -> Result<u8> {
    u8::try_from(value.len())
        .map_err(|_| Error::invalid_param(name, format!("{} bytes exceeds 255", value.len())))
}

fn take<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if cursor.len() < n {
        return Err(Error::encoding(
            "TokenInfo",
            format!("need {} bytes, {} left", n, cursor.len()),
        ));
    }
    let (head, tail) = cursor.split_at(n);
    *cursor = tail;
    Ok(head)
}

fn take_string(cursor: &mut &[u8], field: &str) -> Result<String> {
    let len = take(cursor, 1)?[0] as usize;
    let bytes = take(cursor, len)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::encoding(format!("TokenInfo.{}", field), e.to_string()))
}
