//! Control-file stanza generation.
//!
//! A stanza is one ordered block of `Key: value` fields. Values spanning
//! multiple lines are emitted with continuation lines prefixed by a single
//! space, the way Sources/Packages index files expect them.

/// An ordered `Key: value` record block.
///
/// Fields render in insertion order. Optional setters are no-ops for empty
/// values, so absent data never produces an empty `Key:` line.
#[derive(Debug, Clone, Default)]
pub struct ControlStanza {
    fields: Vec<(String, String)>,
}

impl ControlStanza {
    /// Create a new empty stanza.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Set a field unconditionally.
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.fields.push((key.into(), value.into()));
    }

    /// Set a field, skipping it entirely when the value is empty.
    pub fn set_optional<K: Into<String>>(&mut self, key: K, value: &str) {
        if !value.is_empty() {
            self.fields.push((key.into(), value.to_string()));
        }
    }

    /// Set a multi-line field from individual lines.
    ///
    /// Renders as `Key:` followed by one space-prefixed continuation line
    /// per entry. Skipped entirely when there are no lines.
    pub fn set_multiline<K: Into<String>, I>(&mut self, key: K, lines: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let joined: Vec<String> = lines
            .into_iter()
            .map(|l| l.as_ref().to_string())
            .collect();
        if !joined.is_empty() {
            self.fields
                .push((key.into(), format!("\n{}", joined.join("\n"))));
        }
    }

    /// Set a free-form extra field, refusing to override an existing one.
    ///
    /// Returns false when the key collides with an already-set field.
    pub fn set_extra(&mut self, key: &str, value: &str) -> bool {
        if value.is_empty() {
            return true;
        }
        if self.contains(key) {
            return false;
        }
        self.fields.push((key.to_string(), value.to_string()));
        true
    }

    /// Whether a field with the given key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// Whether the stanza holds no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render the stanza as control-file text, trailing newline included.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.fields {
            let mut lines = value.split('\n');
            let first = lines.next().unwrap_or("");
            if first.is_empty() {
                out.push_str(key);
                out.push(':');
            } else {
                out.push_str(key);
                out.push_str(": ");
                out.push_str(first);
            }
            out.push('\n');
            for line in lines {
                out.push(' ');
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

/// Join rendered stanzas into an index file body, one blank line between
/// stanzas. An empty stanza list yields an empty string.
pub fn join_stanzas(stanzas: &[ControlStanza]) -> String {
    stanzas
        .iter()
        .map(|s| s.render())
        .collect::<Vec<_>>()
        .join("\n")
}
