//! Register map descriptions for targets behind the serial bridge.
//!
//! An SoC build emits a list of its control/status registers with their
//! bus addresses. This crate loads those lists in two formats so host
//! code can address registers by name instead of raw address:
//!
//! * the generated CSV (`csr_register,<name>,<addr>,<size>,<rw>` lines,
//!   other line kinds ignored),
//! * a JSON array of register objects.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

/// Host-side access rights for a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

impl Access {
    fn from_csv(field: &str) -> Option<Self> {
        match field {
            "ro" => Some(Self::ReadOnly),
            "rw" => Some(Self::ReadWrite),
            _ => None,
        }
    }
}

/// One register: its byte address on the bus and its width in words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Register {
    pub address: u32,
    /// Width in bus words; wide registers occupy consecutive words.
    pub size: u32,
    pub access: Access,
}

#[derive(Deserialize)]
struct RegisterEntry {
    name: String,
    #[serde(flatten)]
    register: Register,
}

/// Register map load failures.
#[derive(Debug)]
pub enum RegmapError {
    /// A `csr_register` line did not have the expected five fields.
    MalformedCsvLine { line: usize },
    /// A CSV field did not parse as the expected value.
    BadCsvField { line: usize, field: &'static str },
    /// The JSON document did not match the register list schema.
    BadJson(serde_json::Error),
}

impl fmt::Display for RegmapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedCsvLine { line } => {
                write!(f, "line {line}: malformed csr_register line")
            }
            Self::BadCsvField { line, field } => {
                write!(f, "line {line}: bad {field} field")
            }
            Self::BadJson(error) => write!(f, "bad register list JSON: {error}"),
        }
    }
}

impl std::error::Error for RegmapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BadJson(error) => Some(error),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RegmapError {
    fn from(error: serde_json::Error) -> Self {
        Self::BadJson(error)
    }
}

/// Name-to-register lookup for one SoC build.
#[derive(Debug, Default, Clone)]
pub struct RegisterMap {
    registers: HashMap<String, Register>,
}

impl RegisterMap {
    /// Load from generated CSV text. Only `csr_register` lines are
    /// read; comments and other line kinds pass through silently.
    pub fn from_csv_str(text: &str) -> Result<Self, RegmapError> {
        let mut registers = HashMap::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if !trimmed.starts_with("csr_register,") {
                continue;
            }
            let fields: Vec<&str> = trimmed.split(',').collect();
            if fields.len() != 5 {
                return Err(RegmapError::MalformedCsvLine { line });
            }
            let address = parse_u32(fields[2])
                .ok_or(RegmapError::BadCsvField { line, field: "address" })?;
            let size = parse_u32(fields[3])
                .ok_or(RegmapError::BadCsvField { line, field: "size" })?;
            let access = Access::from_csv(fields[4])
                .ok_or(RegmapError::BadCsvField { line, field: "access" })?;
            registers.insert(
                fields[1].to_string(),
                Register {
                    address,
                    size,
                    access,
                },
            );
        }
        Ok(Self { registers })
    }

    /// Load from a JSON array of `{name, address, size, access}`.
    pub fn from_json_str(text: &str) -> Result<Self, RegmapError> {
        let entries: Vec<RegisterEntry> = serde_json::from_str(text)?;
        let registers = entries
            .into_iter()
            .map(|entry| (entry.name, entry.register))
            .collect();
        Ok(Self { registers })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Register> {
        self.registers.get(name)
    }

    /// Byte address of a named register.
    #[must_use]
    pub fn address_of(&self, name: &str) -> Option<u32> {
        self.registers.get(name).map(|register| register.address)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

/// Addresses appear as `0x`-prefixed hex or plain decimal.
fn parse_u32(field: &str) -> Option<u32> {
    if let Some(hex) = field.strip_prefix("0x") {
        u32::from_str_radix(hex, 16).ok()
    } else {
        field.parse().ok()
    }
}
