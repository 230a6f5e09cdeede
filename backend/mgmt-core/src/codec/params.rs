//! Parameter text carried in request payloads.
//!
//! Update requests carry `key\0value`; device parameters are a
//! NUL-separated list of `name=value` entries. Everything else is handed to
//! drivers as raw bytes.

use common::Errno;

/// View over a request payload.
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    raw: &'a [u8],
}

impl<'a> Params<'a> {
    pub fn new(raw: &'a [u8]) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// Leading NUL-terminated token. The whole payload if there is no NUL.
    pub fn key(&self) -> &'a [u8] {
        match self.raw.iter().position(|&b| b == 0) {
            Some(end) => &self.raw[..end],
            None => self.raw,
        }
    }

    /// Bytes after the key's terminator, trailing NULs stripped.
    pub fn value(&self) -> &'a [u8] {
        let Some(end) = self.raw.iter().position(|&b| b == 0) else {
            return &[];
        };
        trim_nul(&self.raw[end + 1..])
    }

    /// [`value`](Self::value) as text.
    ///
    /// # Errors
    ///
    /// Returns `EINVAL` if the value is not UTF-8.
    pub fn value_str(&self) -> Result<&'a str, Errno> {
        std::str::from_utf8(self.value()).map_err(|_| Errno::EINVAL)
    }

    /// Parse the payload as `name=value` entries separated by NUL bytes.
    ///
    /// Empty entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns `EINVAL` for non-UTF-8 text, an entry without `=`, or an empty name.
    pub fn entries(&self) -> Result<Vec<(&'a str, &'a str)>, Errno> {
        let mut entries = Vec::new();
        for chunk in self.raw.split(|&b| b == 0).filter(|c| !c.is_empty()) {
            let text = std::str::from_utf8(chunk).map_err(|_| Errno::EINVAL)?;
            let (name, value) = text.split_once('=').ok_or(Errno::EINVAL)?;
            let name = name.trim();
            if name.is_empty() {
                return Err(Errno::EINVAL);
            }
            entries.push((name, value.trim()));
        }
        Ok(entries)
    }
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}
