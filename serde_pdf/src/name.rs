use std::borrow::Borrow;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_bytes::Bytes;

use crate::ser::NAME_NAME;

/// A PDF name, without its leading slash.
///
/// Names are byte sequences. Most are ASCII, but producers also put legacy encodings into them
/// (GBK font names, Latin-1 resource keys), so the bytes are kept exactly as read and written
/// back unchanged.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(Vec<u8>);

impl Name {
    pub fn new<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Name(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The name as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Whether `ch` has to be written as `#xx` inside a name.
pub(crate) fn needs_escape(ch: u8) -> bool {
    !(0x21..=0x7E).contains(&ch)
        || matches!(
            ch,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#'
        )
}

impl Borrow<[u8]> for Name {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Name {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(s.as_bytes().to_vec())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(s.into_bytes())
    }
}

impl From<&[u8]> for Name {
    fn from(b: &[u8]) -> Self {
        Name(b.to_vec())
    }
}

impl From<Vec<u8>> for Name {
    fn from(b: Vec<u8>) -> Self {
        Name(b)
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

/// Writes the name in PDF syntax, e.g. `/Adobe#20Green`.
impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("/")?;
        for &ch in &self.0 {
            if needs_escape(ch) {
                write!(f, "#{:02x}", ch)?;
            } else {
                write!(f, "{}", ch as char)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_newtype_struct(NAME_NAME, Bytes::new(&self.0))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_escapes_delimiters_and_high_bytes() {
        assert_eq!(Name::from("Name1").to_string(), "/Name1");
        assert_eq!(Name::from("Adobe Green").to_string(), "/Adobe#20Green");
        assert_eq!(
            Name::from("The_Key_of_F#_Minor").to_string(),
            "/The_Key_of_F#23_Minor"
        );
        assert_eq!(Name::new(vec![b'F', 0xe9]).to_string(), "/F#e9");
    }

    #[test]
    fn text_view_requires_utf8() {
        assert_eq!(Name::from("Page").as_str(), Some("Page"));
        assert_eq!(Name::new(vec![0xCB, 0xCE, 0xCC, 0xE5]).as_str(), None);
    }

    #[test]
    fn distinct_bytes_are_distinct_names() {
        let a = Name::new(vec![b'F', 0xe9]);
        let b = Name::new(vec![b'F', 0xe8]);
        assert_ne!(a, b);
        assert!(Name::from("Type") == "Type");
    }
}
