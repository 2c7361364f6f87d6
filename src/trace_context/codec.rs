//! W3C-style `traceparent` header codec.
//!
//! ```text
//! 00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01
//! ^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^ ^^
//! |  trace id (32 hex, non-zero)      parent id        flags
//! version                             (16 hex, non-zero)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Only supported header version.
pub const SUPPORTED_VERSION: &str = "00";

/// Bit 0 of the flags field.
pub const FLAG_SAMPLED: u8 = 0x01;

const TRACE_ID_LEN: usize = 32;
const PARENT_ID_LEN: usize = 16;
const VERSION_LEN: usize = 2;
const FLAGS_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceContextError {
    #[error("invalid traceparent header {header:?}: {reason}")]
    InvalidTraceparentHeader { header: String, reason: String },
}

impl TraceContextError {
    fn invalid(header: &str, reason: impl Into<String>) -> Self {
        TraceContextError::InvalidTraceparentHeader {
            header: header.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parsed trace linkage. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    version: String,
    trace_id: String,
    parent_id: String,
    flags: u8,
}

impl TraceContext {
    /// Parse a propagation header value.
    pub fn parse(header: &str) -> Result<Self, TraceContextError> {
        let fields: Vec<&str> = header.split('-').collect();
        let [version, trace_id, parent_id, flags] = fields.as_slice() else {
            return Err(TraceContextError::invalid(header, "expected 4 dash-separated fields"));
        };

        check_hex_field(header, version, VERSION_LEN, "version")?;
        if *version != SUPPORTED_VERSION {
            return Err(TraceContextError::invalid(header, "unsupported version"));
        }

        check_hex_field(header, trace_id, TRACE_ID_LEN, "trace id")?;
        if is_all_zeros(trace_id) {
            return Err(TraceContextError::invalid(header, "trace id is all zeros"));
        }

        check_hex_field(header, parent_id, PARENT_ID_LEN, "parent id")?;
        if is_all_zeros(parent_id) {
            return Err(TraceContextError::invalid(header, "parent id is all zeros"));
        }

        check_hex_field(header, flags, FLAGS_LEN, "flags")?;
        let flags = u8::from_str_radix(flags, 16)
            .map_err(|_| TraceContextError::invalid(header, "flags are not hex"))?;

        Ok(Self {
            version: version.to_string(),
            trace_id: trace_id.to_string(),
            parent_id: parent_id.to_string(),
            flags,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn is_sampled(&self) -> bool {
        self.flags & FLAG_SAMPLED != 0
    }

    /// Header value suitable for forwarding downstream unchanged.
    pub fn to_header(&self) -> String {
        self.to_string()
    }
}

impl FromStr for TraceContext {
    type Err = TraceContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{:02x}",
            self.version, self.trace_id, self.parent_id, self.flags
        )
    }
}

fn check_hex_field(
    header: &str,
    field: &str,
    expected_len: usize,
    name: &'static str,
) -> Result<(), TraceContextError> {
    if field.len() != expected_len {
        return Err(TraceContextError::invalid(header, format!("{name} has wrong length")));
    }
    if !field.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(TraceContextError::invalid(header, format!("{name} is not lowercase hex")));
    }
    Ok(())
}

fn is_all_zeros(field: &str) -> bool {
    field.bytes().all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    fn assert_invalid(header: &str) {
        match TraceContext::parse(header) {
            Err(TraceContextError::InvalidTraceparentHeader { header: h, .. }) => {
                assert_eq!(h, header)
            }
            Ok(ctx) => panic!("expected {header:?} to be rejected, got {ctx:?}"),
        }
    }

    #[test]
    fn test_parse_valid_header() {
        let ctx = TraceContext::parse(VALID).unwrap();
        assert_eq!(ctx.version(), "00");
        assert_eq!(ctx.trace_id(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.parent_id(), "00f067aa0ba902b7");
        assert_eq!(ctx.flags(), 0x01);
        assert!(ctx.is_sampled());
    }

    #[test]
    fn test_unsampled_flags() {
        let ctx: TraceContext = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00"
            .parse()
            .unwrap();
        assert!(!ctx.is_sampled());
    }

    #[test]
    fn test_header_is_forwarded_unchanged() {
        let ctx = TraceContext::parse(VALID).unwrap();
        assert_eq!(ctx.to_header(), VALID);
    }

    #[test]
    fn test_all_zero_ids_rejected() {
        assert_invalid("00-00000000000000000000000000000000-00f067aa0ba902b7-01");
        assert_invalid("00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01");
    }

    #[test]
    fn test_wrong_lengths_rejected() {
        assert_invalid("00-4bf92f3577b34da6a3ce929d0e0e473-00f067aa0ba902b7-01");
        assert_invalid("00-4bf92f3577b34da6a3ce929d0e0e47361-00f067aa0ba902b7-01");
        assert_invalid("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b-01");
        assert_invalid("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-1");
        assert_invalid("0-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01");
    }

    #[test]
    fn test_non_hex_rejected() {
        assert_invalid("00-4bf92f3577b34da6a3ce929d0e0e473g-00f067aa0ba902b7-01");
        assert_invalid("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902bz-01");
        assert_invalid("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-0x");
        assert_invalid("00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01");
    }

    #[test]
    fn test_field_count_rejected() {
        assert_invalid("");
        assert_invalid("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7");
        assert_invalid("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra");
        assert_invalid("00--4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01");
    }

    #[test]
    fn test_unsupported_version_rejected() {
        assert_invalid("01-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01");
        assert_invalid("ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01");
    }
}
