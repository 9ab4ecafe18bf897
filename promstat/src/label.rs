use std::fmt;

use crate::common::LabelSetError;

/// A single label: a key/value pair attached to a metric.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct Label {
    key: String,
    value: String,
}

impl Label {
    /// Creates a [`Label`] from a key and value.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Label { key: key.into(), value: value.into() }
    }

    /// Key of this label.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value of this label.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// An ordered set of labels identifying one dimension of a metric.
///
/// Label keys are unique within a set.  Two sets are equal only if they hold the same labels in
/// the same order, so callers should build them in a consistent order; [`LabelSet::sorted`] helps
/// with that.
///
/// An empty `LabelSet` addresses the unlabeled instance of a metric.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Default)]
pub struct LabelSet {
    labels: Vec<Label>,
}

impl LabelSet {
    /// Creates an empty `LabelSet`.
    pub fn empty() -> Self {
        LabelSet::default()
    }

    /// Creates a `LabelSet` from key/value pairs, keeping their order.
    ///
    /// Returns an error if the same key appears more than once.
    pub fn new<I, K, V>(pairs: I) -> Result<Self, LabelSetError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut labels: Vec<Label> = Vec::new();
        for (key, value) in pairs {
            let label = Label::new(key, value);
            if labels.iter().any(|existing| existing.key == label.key) {
                return Err(LabelSetError::DuplicateName(label.key));
            }
            labels.push(label);
        }

        Ok(LabelSet { labels })
    }

    /// Returns a copy of this set with labels ordered by key.
    pub fn sorted(&self) -> Self {
        let mut labels = self.labels.clone();
        labels.sort_by(|a, b| a.key.cmp(&b.key));
        LabelSet { labels }
    }

    /// Whether or not this set holds no labels.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of labels in this set.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Iterates over the labels, in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Label> {
        self.labels.iter()
    }

    /// Gets the value of the label with the given key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.labels.iter().find(|label| label.key == key).map(Label::value)
    }

    /// Gets the label keys of this set, sorted.
    ///
    /// This is the label-name schema a set is validated against.
    pub fn schema(&self) -> Vec<String> {
        let mut names = self.labels.iter().map(|label| label.key.clone()).collect::<Vec<_>>();
        names.sort();
        names
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", label.key, label.value)?;
        }
        f.write_str("}")
    }
}
