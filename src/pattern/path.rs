use std::fmt::{self, Display};

/// Object path such as `file:hashes.'SHA-256'` or
/// `network-traffic:extensions.'http-request-ext'.request_header[*]`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectPath {
    pub object_type: String,
    pub steps: Vec<PathStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathStep {
    /// Property name, with any quoting removed
    Property(String),
    Index(ListIndex),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListIndex {
    Any,
    At(i64),
}

impl ObjectPath {
    pub fn new(object_type: impl Into<String>, steps: Vec<PathStep>) -> Self {
        Self {
            object_type: object_type.into(),
            steps,
        }
    }

    /// `type:property` with a single property step
    pub fn simple(object_type: impl Into<String>, property: impl Into<String>) -> Self {
        Self::new(object_type, vec![PathStep::Property(property.into())])
    }
}

fn is_bare_property(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Property(name) if is_bare_property(name) => f.write_str(name),
            PathStep::Property(name) => {
                write!(f, "'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            PathStep::Index(ListIndex::Any) => f.write_str("[*]"),
            PathStep::Index(ListIndex::At(i)) => write!(f, "[{}]", i),
        }
    }
}

impl Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.object_type)?;
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                // the first property step can't contain a hyphen unquoted
                PathStep::Property(name) if i == 0 && name.contains('-') => {
                    write!(f, "'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))?
                }
                PathStep::Property(_) if i > 0 => write!(f, ".{}", step)?,
                _ => write!(f, "{}", step)?,
            }
        }
        Ok(())
    }
}
