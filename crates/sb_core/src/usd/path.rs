//! Scene paths (`/World/Geo/Mesh`).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

/// Errors produced when building a [`ScenePath`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("scene path must be absolute: '{0}'")]
    NotAbsolute(String),

    #[error("invalid prim name '{name}' in path '{path}'")]
    InvalidName { path: String, name: String },
}

/// Result type for path operations.
pub type PathResult<T> = Result<T, PathError>;

/// An absolute prim path. `/` is the pseudo-root.
///
/// Backed by an `Arc<str>` so clones are cheap; paths are passed around freely
/// between worker threads and used as registry keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenePath(Arc<str>);

impl ScenePath {
    /// Parse and validate an absolute path.
    pub fn new(path: &str) -> PathResult<Self> {
        if !path.starts_with('/') {
            return Err(PathError::NotAbsolute(path.to_string()));
        }
        if path == "/" {
            return Ok(Self::root());
        }
        for name in path[1..].split('/') {
            if !is_valid_identifier(name) {
                return Err(PathError::InvalidName {
                    path: path.to_string(),
                    name: name.to_string(),
                });
            }
        }
        Ok(Self(Arc::from(path)))
    }

    /// The pseudo-root `/`.
    pub fn root() -> Self {
        Self(Arc::from("/"))
    }

    pub fn is_root(&self) -> bool {
        &*self.0 == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path element, empty for the pseudo-root.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[i + 1..],
            None => "",
        }
    }

    /// Parent path, `None` for the pseudo-root.
    pub fn parent(&self) -> Option<ScenePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(i) => Some(Self(Arc::from(&self.0[..i]))),
            None => None,
        }
    }

    /// Append a child element.
    pub fn child(&self, name: &str) -> PathResult<ScenePath> {
        if !is_valid_identifier(name) {
            return Err(PathError::InvalidName {
                path: self.0.to_string(),
                name: name.to_string(),
            });
        }
        let joined = if self.is_root() {
            format!("/{}", name)
        } else {
            format!("{}/{}", self.0, name)
        };
        Ok(Self(Arc::from(joined)))
    }

    /// True if `self` equals `prefix` or lies below it.
    pub fn has_prefix(&self, prefix: &ScenePath) -> bool {
        if prefix.is_root() || self == prefix {
            return true;
        }
        self.0.starts_with(&*prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/')
    }

    /// Proper ancestors, outermost first, excluding the pseudo-root.
    pub fn ancestors(&self) -> Vec<ScenePath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(p) = current {
            if p.is_root() {
                break;
            }
            current = p.parent();
            out.push(p);
        }
        out.reverse();
        out
    }

    /// Number of elements; 0 for the pseudo-root.
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count()
        }
    }

    /// Re-root `self` from `from` onto `to`. Returns `None` if `self` is not under `from`.
    pub fn replace_prefix(&self, from: &ScenePath, to: &ScenePath) -> Option<ScenePath> {
        if !self.has_prefix(from) {
            return None;
        }
        let rest = if from.is_root() {
            &self.0[1..]
        } else {
            self.0[from.0.len()..].trim_start_matches('/')
        };
        if rest.is_empty() {
            return Some(to.clone());
        }
        let joined = if to.is_root() {
            format!("/{}", rest)
        } else {
            format!("{}/{}", to.0, rest)
        };
        Some(Self(Arc::from(joined)))
    }
}

impl fmt::Display for ScenePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ScenePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl FromStr for ScenePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A relationship or connection target: a prim path with an optional property.
///
/// `</Looks/Tex.outputs:rgb>` parses to prim `/Looks/Tex`, property `outputs:rgb`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Target {
    pub prim: ScenePath,
    pub property: Option<String>,
}

impl Target {
    pub fn prim(prim: ScenePath) -> Self {
        Self { prim, property: None }
    }

    pub fn property(prim: ScenePath, property: impl Into<String>) -> Self {
        Self {
            prim,
            property: Some(property.into()),
        }
    }

    /// Parse `/A/B` or `/A/B.prop:name`.
    pub fn parse(text: &str) -> PathResult<Self> {
        let last_slash = text.rfind('/').unwrap_or(0);
        match text[last_slash..].find('.') {
            Some(dot) => {
                let split = last_slash + dot;
                Ok(Self::property(ScenePath::new(&text[..split])?, &text[split + 1..]))
            }
            None => Ok(Self::prim(ScenePath::new(text)?)),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.property {
            Some(prop) => write!(f, "{}.{}", self.prim, prop),
            None => write!(f, "{}", self.prim),
        }
    }
}

/// True for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Turn an arbitrary string into a valid prim name.
///
/// Invalid characters become `_`; a leading digit gets a `_` prefix.
pub fn make_valid_identifier(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
