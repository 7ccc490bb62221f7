use core::fmt;

use smallvec::SmallVec;

/// A dotted member path such as `Customer.Country.Code`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PropertyPath {
    segments: SmallVec<[String; 3]>,
}

impl PropertyPath {
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment.
    pub fn property(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Everything but the last segment, when there is anything.
    pub fn navigation(&self) -> Option<PropertyPath> {
        (self.segments.len() > 1).then(|| self.prefix(self.segments.len() - 1))
    }

    pub fn parent(&self) -> Option<PropertyPath> {
        self.navigation()
    }

    /// The first `len` segments.
    pub fn prefix(&self, len: usize) -> PropertyPath {
        Self {
            segments: self.segments.iter().take(len).cloned().collect(),
        }
    }

    /// Every non-empty prefix, shortest first.
    pub fn prefixes(&self) -> impl Iterator<Item = PropertyPath> + '_ {
        (1..=self.segments.len()).map(|n| self.prefix(n))
    }

    pub fn child(&self, segment: impl Into<String>) -> PropertyPath {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn join(&self, other: &PropertyPath) -> PropertyPath {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl From<&str> for PropertyPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for PropertyPath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_split() {
        let path = PropertyPath::parse("Customer. Country.Code");
        assert_eq!(path.len(), 3);
        assert_eq!(path.property(), "Code");
        assert_eq!(path.navigation().unwrap().to_string(), "Customer.Country");
        assert!(PropertyPath::parse("Status").navigation().is_none());
    }

    #[test]
    fn test_prefix_helpers() {
        let path = PropertyPath::parse("Lines.Product.Supplier");
        let prefixes: Vec<String> = path.prefixes().map(|p| p.to_string()).collect();
        assert_eq!(prefixes, vec!["Lines", "Lines.Product", "Lines.Product.Supplier"]);
    }
}
