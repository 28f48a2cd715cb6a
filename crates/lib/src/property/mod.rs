//! The property store.
//!
//! Properties are write-once string bindings shared by everything in a build.
//! The first binding of a name wins; later attempts are silently ignored, which
//! is what lets command-line properties override document defaults.

mod file;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, trace};

use crate::placeholder::{self, Lookup, PlaceholderError, Segment};

pub use file::{parse_properties, read_properties};

/// Errors raised while binding or resolving properties.
#[derive(Debug, Error)]
pub enum PropertyError {
  #[error(transparent)]
  Syntax(#[from] PlaceholderError),

  #[error("property '{name}' was circularly defined in {source_name}")]
  Circular { name: String, source_name: String },

  #[error("failed to read properties file {}: {source}", path.display())]
  ReadFile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("malformed properties file {} at line {line}: {message}", path.display())]
  Malformed { path: PathBuf, line: usize, message: String },
}

#[derive(Debug, Default)]
struct Bindings {
  values: HashMap<String, String>,
  user: HashSet<String>,
}

/// Thread-safe, write-once property bindings.
#[derive(Debug, Default)]
pub struct PropertyStore {
  inner: RwLock<Bindings>,
}

impl PropertyStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Bind `name` to `value` unless it is already bound.
  ///
  /// Returns `true` if the binding was made.
  pub fn set(&self, name: impl Into<String>, value: impl Into<String>) -> bool {
    let name = name.into();
    let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
    if inner.values.contains_key(&name) {
      if inner.user.contains(&name) {
        debug!(property = %name, "override ignored for user property");
      } else {
        trace!(property = %name, "override ignored");
      }
      return false;
    }
    inner.values.insert(name, value.into());
    true
  }

  /// Bind a user-supplied property (e.g. from the command line).
  pub fn set_user(&self, name: impl Into<String>, value: impl Into<String>) -> bool {
    let name = name.into();
    let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
    if inner.values.contains_key(&name) {
      return false;
    }
    inner.user.insert(name.clone());
    inner.values.insert(name, value.into());
    true
  }

  pub fn get(&self, name: &str) -> Option<String> {
    self
      .inner
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .values
      .get(name)
      .cloned()
  }

  pub fn contains(&self, name: &str) -> bool {
    self
      .inner
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .values
      .contains_key(name)
  }

  pub fn is_user_property(&self, name: &str) -> bool {
    self.inner.read().unwrap_or_else(PoisonError::into_inner).user.contains(name)
  }

  /// All bindings, sorted by name.
  pub fn snapshot(&self) -> BTreeMap<String, String> {
    let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
    inner.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
  }

  /// Replace each `${name}` in `text` with its bound value.
  ///
  /// Unbound references are left in place.
  pub fn resolve(&self, text: &str) -> Result<String, PropertyError> {
    Ok(placeholder::substitute(text, self)?)
  }

  /// Import a set of raw definitions that may refer to each other.
  ///
  /// References between entries are expanded regardless of their order. A
  /// reference to a name that is already bound in the store uses the bound
  /// value instead of the raw entry. Once every entry has resolved, each is
  /// bound with [`PropertyStore::set`], so existing bindings still win.
  ///
  /// # Errors
  ///
  /// Returns [`PropertyError::Circular`] if an entry refers to itself through
  /// any chain of references, naming `source` as its origin. On any error the
  /// store is left unchanged.
  pub fn load_and_resolve(&self, raw: &[(String, String)], source: &str) -> Result<(), PropertyError> {
    let mut order: Vec<&str> = Vec::new();
    let mut definitions: HashMap<&str, &str> = HashMap::new();
    for (name, value) in raw {
      if definitions.insert(name.as_str(), value.as_str()).is_none() {
        order.push(name.as_str());
      }
    }

    let mut expander = Expander {
      store: self,
      definitions: &definitions,
      source,
      expanded: HashMap::new(),
      stack: Vec::new(),
    };

    let resolved = order
      .iter()
      .map(|name| {
        let expanded = expander.expand(name)?;
        Ok::<_, PropertyError>((*name, self.resolve(&expanded)?))
      })
      .collect::<Result<Vec<_>, PropertyError>>()?;

    let mut bound = 0;
    for (name, value) in resolved {
      if self.set(name, value) {
        bound += 1;
      }
    }

    debug!(source, defined = order.len(), bound, "imported properties");
    Ok(())
  }
}

impl Lookup for PropertyStore {
  fn lookup(&self, name: &str) -> Option<String> {
    self.get(name)
  }
}

/// Expands raw definitions into placeholder syntax that only mentions
/// names outside the definition set (or already bound in the store).
struct Expander<'a> {
  store: &'a PropertyStore,
  definitions: &'a HashMap<&'a str, &'a str>,
  source: &'a str,
  expanded: HashMap<String, String>,
  stack: Vec<String>,
}

impl Expander<'_> {
  fn expand(&mut self, name: &str) -> Result<String, PropertyError> {
    if let Some(done) = self.expanded.get(name) {
      return Ok(done.clone());
    }
    if self.stack.iter().any(|n| n == name) {
      return Err(PropertyError::Circular {
        name: name.to_string(),
        source_name: self.source.to_string(),
      });
    }

    let Some(raw) = self.definitions.get(name).copied() else {
      return Ok(format!("${{{name}}}"));
    };

    self.stack.push(name.to_string());
    let mut out = String::with_capacity(raw.len());
    for segment in placeholder::parse(raw)? {
      match segment {
        Segment::Literal(text) => out.push_str(&placeholder::escape(&text)),
        Segment::Property(reference) => {
          if self.store.contains(&reference) || !self.definitions.contains_key(reference.as_str()) {
            out.push_str("${");
            out.push_str(&reference);
            out.push('}');
          } else {
            out.push_str(&self.expand(&reference)?);
          }
        }
      }
    }
    self.stack.pop();

    self.expanded.insert(name.to_string(), out.clone());
    Ok(out)
  }
}
