use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum PathOrStd {
    Path(PathBuf),
    StdStream,
}

impl From<&std::ffi::OsStr> for PathOrStd {
    fn from(value: &std::ffi::OsStr) -> Self {
        if value == "-" {
            Self::StdStream
        } else {
            Self::Path(value.into())
        }
    }
}

/// Parses a guest address or size, hex with a `0x` prefix or decimal.
pub fn parse_number(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|err| format!("`{s}` is not a number: {err}"))
}

pub fn parse_addr(s: &str) -> Result<u32, String> {
    let value = parse_number(s)?;
    u32::try_from(value).map_err(|_| format!("`{s}` is not a 32-bit address"))
}
