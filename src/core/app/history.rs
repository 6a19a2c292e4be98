/// Back/forward stack of opened worksheet uuids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationHistory {
    entries: Vec<String>,
    index: Option<usize>,
}

impl NavigationHistory {
    /// Record a fresh navigation. Anything ahead of the cursor is dropped.
    pub fn push(&mut self, uuid: &str) {
        if self.current() == Some(uuid) {
            return;
        }
        let keep = self.index.map_or(0, |index| index + 1);
        self.entries.truncate(keep);
        self.entries.push(uuid.to_string());
        self.index = Some(self.entries.len() - 1);
    }

    pub fn current(&self) -> Option<&str> {
        self.index
            .and_then(|index| self.entries.get(index))
            .map(String::as_str)
    }

    /// Replace the current entry, used when a name resolves to a uuid.
    pub fn replace_current(&mut self, uuid: &str) {
        if let Some(entry) = self.index.and_then(|index| self.entries.get_mut(index)) {
            *entry = uuid.to_string();
        }
    }

    pub fn back(&mut self) -> Option<String> {
        let index = self.index?.checked_sub(1)?;
        self.index = Some(index);
        self.entries.get(index).cloned()
    }

    pub fn forward(&mut self) -> Option<String> {
        let index = self.index? + 1;
        let uuid = self.entries.get(index).cloned()?;
        self.index = Some(index);
        Some(uuid)
    }
}
