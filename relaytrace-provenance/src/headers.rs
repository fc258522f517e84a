/// Source of already-materialized request header values.
///
/// Names are matched case-insensitively. `get` returns the first value for
/// repeated headers; `get_all` returns every value in order.
pub trait HeaderSource {
    fn get(&self, name: &str) -> Option<&str>;
    fn get_all(&self, name: &str) -> Vec<&str>;

    fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// A minimal header map for callers that do not bring their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    // names stored lowercase
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing values for `name`.
    pub fn set(&mut self, name: &str, value: &str) {
        let name = name.to_lowercase();
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, value.to_string()));
    }

    /// Appends a value, keeping existing ones.
    pub fn append(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_lowercase(), value.to_string()));
    }

    pub fn remove(&mut self, name: &str) {
        let name = name.to_lowercase();
        self.entries.retain(|(n, _)| *n != name);
    }
}

impl HeaderSource for Headers {
    fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    fn get_all(&self, name: &str) -> Vec<&str> {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Headers {
    fn from(entries: [(&str, &str); N]) -> Self {
        let mut headers = Headers::new();
        for (name, value) in entries {
            headers.append(name, value);
        }
        headers
    }
}
