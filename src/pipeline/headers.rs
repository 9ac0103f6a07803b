//! Ordered header list.
//!
//! Headers cross the boundary as two parallel string arrays whose order is
//! the wire order, so the list keeps insertion order and allows repeated
//! names. Lookups are case-insensitive.

use std::fmt;

/// Error returned when parallel name/value arrays disagree in length.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("header arrays differ in length: {names} names, {values} values")]
pub struct HeaderArityError {
    pub names: usize,
    pub values: usize,
}

/// An ordered list of `(name, value)` header pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, String)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from the parallel arrays used at the boundary.
    pub fn from_parallel(names: Vec<String>, values: Vec<String>) -> Result<Self, HeaderArityError> {
        if names.len() != values.len() {
            return Err(HeaderArityError {
                names: names.len(),
                values: values.len(),
            });
        }
        Ok(Self {
            entries: names.into_iter().zip(values).collect(),
        })
    }

    /// Split the list back into parallel name/value arrays.
    pub fn to_parallel(&self) -> (Vec<String>, Vec<String>) {
        self.entries.iter().cloned().unzip()
    }

    /// Append a pair, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Set a header, replacing every existing value for the name.
    ///
    /// The first existing occurrence keeps its position so re-setting a
    /// header does not reorder the response.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => {
                self.entries[index].1 = value;
                let mut seen = false;
                self.entries.retain(|(n, _)| {
                    if !n.eq_ignore_ascii_case(&name) {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Remove every value for `name`. Returns true if anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|index| self.entries[index].1.as_str())
    }

    /// All values for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for HeaderList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderList {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(n, v)| (n.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_arrays_keep_order() {
        let list = HeaderList::from_parallel(
            vec!["X-A".into(), "X-B".into()],
            vec!["1".into(), "2".into()],
        )
        .unwrap();

        let (names, values) = list.to_parallel();
        assert_eq!(names, vec!["X-A", "X-B"]);
        assert_eq!(values, vec!["1", "2"]);
    }

    #[test]
    fn parallel_arrays_must_match() {
        let err = HeaderList::from_parallel(vec!["X-A".into()], vec![]).unwrap_err();
        assert_eq!(err, HeaderArityError { names: 1, values: 0 });
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut list: HeaderList = [("a", "1"), ("Set-Cookie", "x"), ("b", "2"), ("set-cookie", "y")]
            .into_iter()
            .collect();

        list.insert("SET-COOKIE", "z");

        let pairs: Vec<_> = list.iter().collect();
        assert_eq!(pairs, vec![("a", "1"), ("Set-Cookie", "z"), ("b", "2")]);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut list = HeaderList::new();
        list.append("Content-Type", "text/plain");
        list.append("Vary", "a");
        list.append("vary", "b");

        assert_eq!(list.get("content-type"), Some("text/plain"));
        assert_eq!(list.get_all("VARY").collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(list.remove("vary"));
        assert!(!list.contains("Vary"));
        assert_eq!(list.len(), 1);
    }
}
