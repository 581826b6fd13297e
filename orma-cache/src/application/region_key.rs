//! Region-scoped keys for the application cache engines.
//!
//! Every entry lives in exactly one region (the qualified name of its
//! relation). A `RegionScopedKey` cannot be built without naming the region,
//! so an engine never sees an unscoped key.

use orma_core::{CacheError, Key};
use uuid::Uuid;

/// Separator byte between the region name and the record key.
const SEPARATOR: u8 = 0xFF;

const TAG_INT: u8 = 0;
const TAG_TEXT: u8 = 1;
const TAG_UUID: u8 = 2;
const TAG_COMPOSITE: u8 = 3;

/// A cache key scoped to one region.
///
/// # Binary Format
///
/// - Bytes 0-1: region name length (u16, big-endian)
/// - Next `len` bytes: region name (UTF-8)
/// - 1 byte: separator (0xFF)
/// - Remainder: tagged primary key
///
/// Tagged key encoding:
/// - `0` + 8 bytes: `Key::Int` (big-endian)
/// - `1` + u32 length + UTF-8 bytes: `Key::Text`
/// - `2` + 16 bytes: `Key::Uuid`
/// - `3` + u16 count + components: `Key::Composite`
///
/// The length prefix makes the region part self-delimiting, so the prefix of
/// region `"a"` never matches a key of region `"ab"`. Names, texts and
/// composites too long for their length field are rejected on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionScopedKey {
    inner: RegionKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegionKeyInner {
    region: String,
    key: Key,
}

impl RegionScopedKey {
    /// Create a key for `key` inside `region`.
    ///
    /// Fails with [`CacheError::Encoding`] if the region name or a key
    /// component does not fit its length field.
    pub fn new(region: impl Into<String>, key: Key) -> Result<Self, CacheError> {
        let region = region.into();
        Self::check_region(&region)?;
        check_key(&region, &key)?;
        Ok(Self {
            inner: RegionKeyInner { region, key },
        })
    }

    /// Whether `region` fits the u16 length prefix.
    pub fn check_region(region: &str) -> Result<(), CacheError> {
        if region.len() > u16::MAX as usize {
            return Err(oversize(region, format!("region name is {} bytes", region.len())));
        }
        Ok(())
    }

    pub fn region(&self) -> &str {
        &self.inner.region
    }

    pub fn key(&self) -> &Key {
        &self.inner.key
    }

    /// Encode this key for engine storage.
    pub fn encode(&self) -> Vec<u8> {
        // Lengths were checked in `new`.
        let region = self.inner.region.as_bytes();
        let mut bytes = Vec::with_capacity(3 + region.len() + 9);
        bytes.extend_from_slice(&(region.len() as u16).to_be_bytes());
        bytes.extend_from_slice(region);
        bytes.push(SEPARATOR);
        encode_key(&self.inner.key, &mut bytes);
        bytes
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` if the bytes are truncated, the separator is missing,
    /// the region is not UTF-8, a key tag is unknown, or trailing bytes remain.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(bytes);
        let len = reader.u16()? as usize;
        let region = std::str::from_utf8(reader.take(len)?).ok()?.to_string();
        if reader.u8()? != SEPARATOR {
            return None;
        }
        let key = decode_key(&mut reader)?;
        if !reader.is_empty() {
            return None;
        }
        Self::new(region, key).ok()
    }

    /// Prefix shared by every key of `region`, for range scans and clearing.
    ///
    /// `None` for a region name no key can be built for.
    pub fn region_prefix(region: &str) -> Option<Vec<u8>> {
        let len = u16::try_from(region.len()).ok()?;
        let mut prefix = Vec::with_capacity(3 + region.len() + 9);
        prefix.extend_from_slice(&len.to_be_bytes());
        prefix.extend_from_slice(region.as_bytes());
        prefix.push(SEPARATOR);
        Some(prefix)
    }
}

fn oversize(region: &str, reason: String) -> CacheError {
    let shown: String = region.chars().take(64).collect();
    CacheError::Encoding {
        region: shown,
        reason: format!("key does not fit its length field: {}", reason),
    }
}

fn check_key(region: &str, key: &Key) -> Result<(), CacheError> {
    match key {
        Key::Text(s) if u32::try_from(s.len()).is_err() => {
            Err(oversize(region, format!("text key is {} bytes", s.len())))
        }
        Key::Composite(parts) => {
            if u16::try_from(parts.len()).is_err() {
                return Err(oversize(
                    region,
                    format!("composite key has {} parts", parts.len()),
                ));
            }
            parts.iter().try_for_each(|part| check_key(region, part))
        }
        _ => Ok(()),
    }
}

fn encode_key(key: &Key, out: &mut Vec<u8>) {
    match key {
        Key::Int(v) => {
            out.push(TAG_INT);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Key::Text(s) => {
            out.push(TAG_TEXT);
            out.extend_from_slice(&(s.len() as u32).to_be_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Key::Uuid(u) => {
            out.push(TAG_UUID);
            out.extend_from_slice(u.as_bytes());
        }
        Key::Composite(parts) => {
            out.push(TAG_COMPOSITE);
            out.extend_from_slice(&(parts.len() as u16).to_be_bytes());
            for part in parts {
                encode_key(part, out);
            }
        }
    }
}

fn decode_key(reader: &mut Reader<'_>) -> Option<Key> {
    match reader.u8()? {
        TAG_INT => {
            let bytes: [u8; 8] = reader.take(8)?.try_into().ok()?;
            Some(Key::Int(i64::from_be_bytes(bytes)))
        }
        TAG_TEXT => {
            let bytes: [u8; 4] = reader.take(4)?.try_into().ok()?;
            let len = u32::from_be_bytes(bytes) as usize;
            let text = std::str::from_utf8(reader.take(len)?).ok()?;
            Some(Key::Text(text.to_string()))
        }
        TAG_UUID => Uuid::from_slice(reader.take(16)?).ok().map(Key::Uuid),
        TAG_COMPOSITE => {
            let count = reader.u16()? as usize;
            let mut parts = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                parts.push(decode_key(reader)?);
            }
            Some(Key::Composite(parts))
        }
        _ => None,
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.bytes.len() < n {
            return None;
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Some(head)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        let bytes: [u8; 2] = self.take(2)?.try_into().ok()?;
        Some(u16::from_be_bytes(bytes))
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoped(region: &str, key: Key) -> RegionScopedKey {
        RegionScopedKey::new(region, key).expect("key should fit")
    }

    #[test]
    fn test_new_and_getters() {
        let key = scoped("public.users", Key::Int(1));
        assert_eq!(key.region(), "public.users");
        assert_eq!(key.key(), &Key::Int(1));
    }

    #[test]
    fn test_encode_layout() {
        let key = scoped("ab", Key::Int(7));
        let encoded = key.encode();
        assert_eq!(&encoded[0..2], &[0, 2]);
        assert_eq!(&encoded[2..4], b"ab");
        assert_eq!(encoded[4], SEPARATOR);
        assert_eq!(encoded[5], TAG_INT);
        assert_eq!(&encoded[6..14], &7i64.to_be_bytes());
        assert_eq!(encoded.len(), 14);
    }

    #[test]
    fn test_composite_decode() {
        let key = scoped(
            "public.memberships",
            Key::Composite(vec![Key::Int(1), Key::Text("admin".into()), Key::Uuid(Uuid::now_v7())]),
        );
        let decoded = RegionScopedKey::decode(&key.encode()).expect("decode should succeed");
        assert_eq!(key, decoded);
    }

    #[test]
    fn test_decode_truncated() {
        let encoded = scoped("public.users", Key::Text("alice".into())).encode();
        assert!(RegionScopedKey::decode(&encoded[..encoded.len() - 1]).is_none());
        assert!(RegionScopedKey::decode(&[]).is_none());
    }

    #[test]
    fn test_decode_wrong_separator() {
        let mut encoded = scoped("users", Key::Int(1)).encode();
        encoded[7] = 0x00;
        assert!(RegionScopedKey::decode(&encoded).is_none());
    }

    #[test]
    fn test_decode_unknown_tag() {
        let mut encoded = scoped("users", Key::Int(1)).encode();
        encoded[8] = 9;
        assert!(RegionScopedKey::decode(&encoded).is_none());
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut encoded = scoped("users", Key::Int(1)).encode();
        encoded.push(0);
        assert!(RegionScopedKey::decode(&encoded).is_none());
    }

    #[test]
    fn test_region_prefix_does_not_match_longer_region() {
        let short = RegionScopedKey::region_prefix("users").expect("short region");
        let other = scoped("users_archive", Key::Int(1)).encode();
        assert!(!other.starts_with(&short));
    }

    #[test]
    fn test_oversize_region_is_rejected() {
        let long = "r".repeat(u16::MAX as usize + 1);
        let err = RegionScopedKey::new(long.clone(), Key::Int(1)).unwrap_err();
        assert!(matches!(err, CacheError::Encoding { .. }));
        assert!(RegionScopedKey::region_prefix(&long).is_none());

        let widest = "r".repeat(u16::MAX as usize);
        let key = scoped(&widest, Key::Int(1));
        assert_eq!(RegionScopedKey::decode(&key.encode()), Some(key));
    }

    #[test]
    fn test_oversize_composite_is_rejected() {
        let parts = vec![Key::Int(0); u16::MAX as usize + 1];
        let err = RegionScopedKey::new("r", Key::Composite(parts)).unwrap_err();
        assert!(matches!(err, CacheError::Encoding { .. }));

        let nested = Key::Composite(vec![Key::Composite(vec![Key::Int(0); 70_000])]);
        assert!(RegionScopedKey::new("r", nested).is_err());
    }

    #[test]
    fn test_same_key_different_regions() {
        let a = scoped("public.users", Key::Int(1));
        let b = scoped("public.orders", Key::Int(1));
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn test_int_and_text_keys_differ() {
        let a = scoped("r", Key::Int(1));
        let b = scoped("r", Key::Text("1".into()));
        assert_ne!(a.encode(), b.encode());
    }
}
