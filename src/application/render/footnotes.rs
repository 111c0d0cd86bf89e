use super::types::FootnoteEntry;

/// Citations collected while rendering links, numbered from 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FootnoteRegistry {
    entries: Vec<FootnoteEntry>,
}

impl FootnoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new entry and return its index.
    pub fn add(&mut self, title: &str, link: &str) -> u32 {
        let index = self.entries.len() as u32 + 1;
        self.entries.push(FootnoteEntry {
            index,
            title: title.to_string(),
            link: link.to_string(),
        });
        index
    }

    /// Index of an identical earlier citation, or a freshly added one.
    pub fn cite(&mut self, title: &str, link: &str) -> u32 {
        let existing = self
            .entries
            .iter()
            .find(|entry| entry.title == title && entry.link == link)
            .map(|entry| entry.index);

        match existing {
            Some(index) => index,
            None => self.add(title, link),
        }
    }

    pub fn entries(&self) -> &[FootnoteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_increase_from_one() {
        let mut registry = FootnoteRegistry::new();
        assert_eq!(registry.add("a", "https://a.test"), 1);
        assert_eq!(registry.add("a", "https://a.test"), 2);
        assert_eq!(registry.add("b", "https://b.test"), 3);
        let indices: Vec<u32> = registry.entries().iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn cite_reuses_identical_entries() {
        let mut registry = FootnoteRegistry::new();
        assert_eq!(registry.cite("a", "https://a.test"), 1);
        assert_eq!(registry.cite("b", "https://b.test"), 2);
        assert_eq!(registry.cite("a", "https://a.test"), 1);
        assert_eq!(registry.cite("a", "https://other.test"), 3);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn clear_restarts_numbering() {
        let mut registry = FootnoteRegistry::new();
        registry.add("a", "https://a.test");
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.add("b", "https://b.test"), 1);
    }
}
