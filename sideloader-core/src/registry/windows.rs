//! Registry hive backed by `winreg`

use std::io;

use winreg::enums::{RegType, HKEY_CURRENT_USER, KEY_READ, KEY_WRITE};
use winreg::types::FromRegValue;
use winreg::{RegKey, RegValue};

use super::{RegistryHive, RegistryKey, RegistryValue};

/// `HKEY_CURRENT_USER` of the calling user
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsRegistry;

impl WindowsRegistry {
    pub fn new() -> Self {
        Self
    }
}

/// An open key under `HKEY_CURRENT_USER`
pub struct WindowsKey(RegKey);

fn convert(value: RegValue) -> io::Result<RegistryValue> {
    match value.vtype {
        RegType::REG_SZ | RegType::REG_EXPAND_SZ => {
            Ok(RegistryValue::String(String::from_reg_value(&value)?))
        }
        RegType::REG_DWORD => Ok(RegistryValue::Dword(u32::from_reg_value(&value)?)),
        ref other => Ok(RegistryValue::Other {
            type_name: format!("{other:?}"),
            data: value.bytes.iter().map(|b| format!("{b:02x}")).collect(),
        }),
    }
}

impl RegistryKey for WindowsKey {
    fn subkey_names(&self) -> io::Result<Vec<String>> {
        self.0.enum_keys().collect()
    }

    fn values(&self, subkey: &str) -> io::Result<Vec<(String, RegistryValue)>> {
        let key = self.0.open_subkey(subkey)?;

        let mut values = Vec::new();
        for item in key.enum_values() {
            match item {
                Ok((name, value)) => values.push((name, convert(value)?)),
                // Deleted by Office while we were reading it
                Err(e) if e.kind() == io::ErrorKind::NotFound => break,
                Err(e) => return Err(e),
            }
        }
        Ok(values)
    }

    fn set_values(&self, subkey: &str, values: &[(&str, RegistryValue)]) -> io::Result<()> {
        let (key, _) = self.0.create_subkey(subkey)?;
        for (name, value) in values {
            match value {
                RegistryValue::String(s) => key.set_value(name, s)?,
                RegistryValue::Dword(d) => key.set_value(name, d)?,
                RegistryValue::Other { type_name, .. } => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("cannot write {type_name} value {name}"),
                    ))
                }
            }
        }
        Ok(())
    }

    fn delete_subkey(&self, subkey: &str) -> io::Result<()> {
        self.0.delete_subkey_all(subkey)
    }
}

impl RegistryHive for WindowsRegistry {
    type Key = WindowsKey;

    fn open(&self, path: &str) -> io::Result<Option<WindowsKey>> {
        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        match hkcu.open_subkey_with_flags(path, KEY_READ | KEY_WRITE) {
            Ok(key) => Ok(Some(WindowsKey(key))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
