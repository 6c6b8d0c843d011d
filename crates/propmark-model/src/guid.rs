//! Global identifier classification.
//!
//! Two encodings show up in building models:
//! - IFC GUIDs: 22 characters of the IFC base64 alphabet `[0-9A-Za-z_$]`.
//! - MS GUIDs: canonical `8-4-4-4-12` hex, hyphenated or as 32 contiguous digits.
//!
//! Anything else is [`GuidKind::Unknown`]. Both functions are pure.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuidKind {
    Ifc,
    Ms,
    Unknown,
}

const URN_PREFIXES: [&str; 2] = ["urn:uuid:", "urn:"];

/// Strip leading `urn:` / `urn:uuid:` prefixes and surrounding whitespace.
///
/// Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(s: &str) -> String {
    let mut rest = s.trim();
    while let Some(stripped) = strip_urn(rest) {
        rest = stripped.trim();
    }
    rest.to_string()
}

fn strip_urn(s: &str) -> Option<&str> {
    URN_PREFIXES.iter().find_map(|prefix| {
        let head = s.get(..prefix.len())?;
        head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
    })
}

/// Classify an identifier after normalizing it.
pub fn classify(s: &str) -> GuidKind {
    let value = normalize(s);
    if is_ifc_guid(&value) {
        GuidKind::Ifc
    } else if is_ms_guid(&value) {
        GuidKind::Ms
    } else {
        GuidKind::Unknown
    }
}

fn is_ifc_guid(s: &str) -> bool {
    s.len() == 22
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
}

fn is_ms_guid(s: &str) -> bool {
    match s.len() {
        32 => s.bytes().all(|b| b.is_ascii_hexdigit()),
        36 => s.bytes().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => b.is_ascii_hexdigit(),
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_urn_prefixes() {
        assert_eq!(normalize("  urn:uuid:3f2504e0-4f89-11d3-9a0c-0305e82c3301 "), "3f2504e0-4f89-11d3-9a0c-0305e82c3301");
        assert_eq!(normalize("URN:0YvctVUKr0kugbFTf53O9L"), "0YvctVUKr0kugbFTf53O9L");
        assert_eq!(normalize("plain"), "plain");
    }

    #[test]
    fn classifies_known_schemes() {
        assert_eq!(classify("0YvctVUKr0kugbFTf53O9L"), GuidKind::Ifc);
        assert_eq!(classify("3$vctVUKr0kugbFTf53O_L"), GuidKind::Ifc);
        assert_eq!(classify("3F2504E0-4F89-11D3-9A0C-0305E82C3301"), GuidKind::Ms);
        assert_eq!(classify("3f2504e04f8911d39a0c0305e82c3301"), GuidKind::Ms);
        assert_eq!(classify("urn:uuid:3f2504e0-4f89-11d3-9a0c-0305e82c3301"), GuidKind::Ms);
    }

    #[test]
    fn rejects_near_misses() {
        assert_eq!(classify(""), GuidKind::Unknown);
        assert_eq!(classify("0YvctVUKr0kugbFTf53O9"), GuidKind::Unknown);
        assert_eq!(classify("0YvctVUKr0kugbFTf53O9-"), GuidKind::Unknown);
        assert_eq!(classify("3f2504e0-4f89-11d3-9a0c-0305e82c330"), GuidKind::Unknown);
        assert_eq!(classify("3f2504e0_4f89_11d3_9a0c_0305e82c3301"), GuidKind::Unknown);
        assert_eq!(classify("zf2504e04f8911d39a0c0305e82c3301"), GuidKind::Unknown);
    }
}
