//! Device inventory loading.
//!
//! The inventory is a delimited text file with a header row, one device per
//! line:
//!
//! ```text
//! ip;username;password;device_type;secret
//! 10.0.0.1;admin;cisco;cisco_ios;enable
//! ```
//!
//! The delimiter is `;` when the header contains one and `,` otherwise.
//! Columns are located by header name, so their order does not matter.
//! A field may be wrapped in double quotes to carry the delimiter, with `""`
//! standing for a literal quote.

use std::path::Path;

use secrecy::SecretString;

use crate::error::InventoryError;

/// One device to audit.
#[derive(Debug)]
pub struct DeviceDescriptor {
    /// Hostname or IP address to connect to.
    pub address: String,

    pub port: u16,

    pub username: String,

    pub password: SecretString,

    /// Secret for entering privileged mode; the password is tried when absent.
    pub secret: Option<SecretString>,

    /// Protocol type naming the platform, e.g. `cisco_ios`.
    pub device_type: String,
}

const ADDRESS: &[&str] = &["ip", "address", "host"];
const USERNAME: &[&str] = &["username"];
const PASSWORD: &[&str] = &["password"];
const DEVICE_TYPE: &[&str] = &["device_type"];
const SECRET: &[&str] = &["secret"];
const PORT: &[&str] = &["port"];

/// Column positions resolved from the header row.
struct Columns {
    address: usize,
    username: usize,
    password: usize,
    device_type: usize,
    secret: Option<usize>,
    port: Option<usize>,
    width: usize,
}

impl Columns {
    fn from_header(header: &[&str]) -> Result<Self, InventoryError> {
        let find = |aliases: &[&str]| {
            header
                .iter()
                .position(|name| aliases.iter().any(|a| name.eq_ignore_ascii_case(a)))
        };
        let require = |aliases: &[&'static str]| {
            find(aliases).ok_or(InventoryError::MissingColumn { column: aliases[0] })
        };

        Ok(Self {
            address: require(ADDRESS)?,
            username: require(USERNAME)?,
            password: require(PASSWORD)?,
            device_type: require(DEVICE_TYPE)?,
            secret: find(SECRET),
            port: find(PORT),
            width: header.len(),
        })
    }
}

/// Read and parse an inventory file.
pub fn load(path: &Path) -> Result<Vec<DeviceDescriptor>, InventoryError> {
    let text = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text)
}

/// Parse inventory text.
pub fn parse(text: &str) -> Result<Vec<DeviceDescriptor>, InventoryError> {
    let mut rows = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let (header_line, header) = rows.next().ok_or(InventoryError::Empty)?;
    let delimiter = if header.contains(';') { ';' } else { ',' };
    let names = split_fields(header, delimiter, header_line)?;
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let columns = Columns::from_header(&names)?;

    rows.map(|(line, row)| {
        let fields = split_fields(row, delimiter, line)?;
        if fields.len() != columns.width {
            return Err(InventoryError::FieldCount {
                line,
                expected: columns.width,
                found: fields.len(),
            });
        }
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();

        let port = match columns.port.map(|i| fields[i]).filter(|p| !p.is_empty()) {
            Some(value) => value.parse().map_err(|_| InventoryError::InvalidPort {
                line,
                value: value.to_string(),
            })?,
            None => 22,
        };

        Ok(DeviceDescriptor {
            address: fields[columns.address].to_string(),
            port,
            username: fields[columns.username].to_string(),
            password: SecretString::from(fields[columns.password].to_string()),
            secret: columns
                .secret
                .map(|i| fields[i])
                .filter(|s| !s.is_empty())
                .map(|s| SecretString::from(s.to_string())),
            device_type: fields[columns.device_type].to_string(),
        })
    })
    .collect()
}

/// Split one row on `delimiter`, honouring double-quoted fields.
fn split_fields(row: &str, delimiter: char, line: usize) -> Result<Vec<String>, InventoryError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = row.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            '"' if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            c if c == delimiter && !quoted => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            c => field.push(c),
        }
    }
    if quoted {
        return Err(InventoryError::UnterminatedQuote { line });
    }
    fields.push(field.trim().to_string());

    Ok(fields)
}
