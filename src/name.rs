use core::{fmt, num::NonZeroU16, str::FromStr};

use alloc::{boxed::Box, vec::Vec};

use crate::error::ParseNameError;

/// A hierarchical name made of opaque components.
///
/// Names are ordered component by component, so a prefix always sorts
/// before any of its extensions.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn from_components<I>(components: I) -> Self
    where
        I: IntoIterator<Item = NameComponent>,
    {
        Self {
            components: components.into_iter().collect(),
        }
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl DoubleEndedIterator<Item = &NameComponent> + '_ {
        self.components.iter()
    }

    pub fn component(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    pub fn last_component(&self) -> Option<&NameComponent> {
        self.components.last()
    }

    pub fn adding_component(&self, component: NameComponent) -> Self {
        let mut components = self.components.clone();
        components.push(component);
        Self { components }
    }

    pub fn adding_generic(&self, bytes: &[u8]) -> Self {
        self.adding_component(NameComponent::generic(bytes))
    }

    pub fn dropping_last_component(&self) -> Option<Self> {
        let (_, rest) = self.components.split_last()?;
        Some(Self {
            components: rest.to_vec(),
        })
    }

    /// The first `count` components of this name.
    pub fn prefix(&self, count: usize) -> Self {
        Self {
            components: self.components[..count.min(self.components.len())].to_vec(),
        }
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }
}

impl FromStr for Name {
    type Err = ParseNameError;

    // Accepts "/a/b/c" and the "ndn:/a/b/c" URI form, with %XX escapes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("ndn:").unwrap_or(s);
        let rest = s.strip_prefix('/').ok_or(ParseNameError::MissingLeadingSlash)?;

        let mut components = Vec::new();
        for segment in rest.split('/') {
            if segment.is_empty() {
                // Allows for the trailing slash in "/a/b/" and the root "/"
                continue;
            }
            components.push(NameComponent::generic(&percent_decode(segment)?));
        }
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in self.components.iter() {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameComponent {
    pub typ: NonZeroU16,
    pub bytes: Box<[u8]>,
}

impl NameComponent {
    pub const TYPE_GENERIC: NonZeroU16 = match NonZeroU16::new(NAME_COMPONENT_TYPE_GENERIC) {
        Some(t) => t,
        None => unreachable!(),
    };
    pub const TYPE_IMPLICIT_SHA256: NonZeroU16 =
        match NonZeroU16::new(NAME_COMPONENT_TYPE_IMPLICIT_SHA256) {
            Some(t) => t,
            None => unreachable!(),
        };
    pub const TYPE_PARAMETER_SHA256: NonZeroU16 =
        match NonZeroU16::new(NAME_COMPONENT_TYPE_PARAMETER_SHA256) {
            Some(t) => t,
            None => unreachable!(),
        };

    pub fn new(typ: NameComponentType, bytes: &[u8]) -> Self {
        Self {
            typ: typ.into(),
            bytes: Box::from(bytes),
        }
    }

    pub fn generic(bytes: &[u8]) -> Self {
        Self::new(NameComponentType::Generic, bytes)
    }

    pub fn implicit_digest(digest: &[u8; 32]) -> Self {
        Self::new(NameComponentType::ImplicitSha256Digest, digest)
    }

    pub fn component_type(&self) -> NameComponentType {
        self.typ.into()
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.component_type() {
            NameComponentType::Generic => {}
            NameComponentType::ImplicitSha256Digest => f.write_str("sha256digest=")?,
            NameComponentType::ParameterSha256Digest => f.write_str("params-sha256=")?,
            NameComponentType::Other(typ) => write!(f, "{}=", typ)?,
        }
        for byte in self.bytes.iter() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", *byte as char)?;
            } else {
                write!(f, "%{:02X}", byte)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NameComponentType {
    Generic,
    ImplicitSha256Digest,
    ParameterSha256Digest,
    Other(NonZeroU16),
}

impl From<NonZeroU16> for NameComponentType {
    fn from(value: NonZeroU16) -> Self {
        match value.get() {
            NAME_COMPONENT_TYPE_GENERIC => NameComponentType::Generic,
            NAME_COMPONENT_TYPE_IMPLICIT_SHA256 => NameComponentType::ImplicitSha256Digest,
            NAME_COMPONENT_TYPE_PARAMETER_SHA256 => NameComponentType::ParameterSha256Digest,
            _ => NameComponentType::Other(value),
        }
    }
}

impl From<NameComponentType> for NonZeroU16 {
    fn from(value: NameComponentType) -> Self {
        match value {
            NameComponentType::Generic => NameComponent::TYPE_GENERIC,
            NameComponentType::ImplicitSha256Digest => NameComponent::TYPE_IMPLICIT_SHA256,
            NameComponentType::ParameterSha256Digest => NameComponent::TYPE_PARAMETER_SHA256,
            NameComponentType::Other(v) => v,
        }
    }
}

const NAME_COMPONENT_TYPE_GENERIC: u16 = 8;
const NAME_COMPONENT_TYPE_IMPLICIT_SHA256: u16 = 1;
const NAME_COMPONENT_TYPE_PARAMETER_SHA256: u16 = 2;

fn percent_decode(segment: &str) -> Result<Vec<u8>, ParseNameError> {
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or(ParseNameError::InvalidEscape)?;
            let hi = hex_value(hex[0]).ok_or(ParseNameError::InvalidEscape)?;
            let lo = hex_value(hex[1]).ok_or(ParseNameError::InvalidEscape)?;
            decoded.push(hi << 4 | lo);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    Ok(decoded)
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let n = name("/hello/world");
        assert_eq!(n.component_count(), 2);
        assert_eq!(n.to_string(), "/hello/world");

        assert_eq!(name("ndn:/localhost/nfd").component_count(), 2);
        assert!(name("/").is_empty());
        assert_eq!(name("/").to_string(), "/");
        assert_eq!(name("/a/b/"), name("/a/b"));

        let escaped = name("/a%20b/%2F");
        assert_eq!(escaped.component(0).unwrap().bytes.as_ref(), b"a b");
        assert_eq!(escaped.component(1).unwrap().bytes.as_ref(), b"/");
        assert_eq!(escaped.to_string(), "/a%20b/%2F");

        assert_eq!("a/b".parse::<Name>(), Err(ParseNameError::MissingLeadingSlash));
        assert_eq!("/a%2".parse::<Name>(), Err(ParseNameError::InvalidEscape));
        assert_eq!("/a%zz".parse::<Name>(), Err(ParseNameError::InvalidEscape));
    }

    #[test]
    fn test_prefixes() {
        let root = Name::new();
        let a = name("/a");
        let ab = name("/a/b");
        let ac = name("/a/c");

        assert!(root.is_prefix_of(&ab));
        assert!(a.is_prefix_of(&ab));
        assert!(ab.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
        assert!(!ac.is_prefix_of(&ab));

        assert_eq!(ab.prefix(1), a);
        assert_eq!(ab.prefix(10), ab);
        assert_eq!(ab.dropping_last_component(), Some(a.clone()));
        assert_eq!(root.dropping_last_component(), None);
        assert_eq!(a.adding_generic(b"b"), ab);
    }

    #[test]
    fn test_ordering() {
        let mut names = [name("/b"), name("/a/b"), name("/a"), name("/")];
        names.sort();
        assert_eq!(names, [name("/"), name("/a"), name("/a/b"), name("/b")]);

        // Component type takes precedence over the bytes
        let digest = Name::new().adding_component(NameComponent::implicit_digest(&[0xff; 32]));
        assert!(digest < name("/a"));
    }

    #[test]
    fn test_component_types() {
        let c = NameComponent::implicit_digest(&[1; 32]);
        assert_eq!(c.component_type(), NameComponentType::ImplicitSha256Digest);
        assert!(c.to_string().starts_with("sha256digest=%01"));

        let other = NonZeroU16::new(42).unwrap();
        let c = NameComponent::new(NameComponentType::Other(other), b"x");
        assert_eq!(c.component_type(), NameComponentType::Other(other));
        assert_eq!(c.to_string(), "42=x");
    }
}
