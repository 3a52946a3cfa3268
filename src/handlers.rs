//! Token handlers and the table that resolves token names to them

use std::fmt;
use std::sync::Arc;

use crate::argument::PageArgument;

/// Produces the replacement text of a token for one request.
///
/// Any `Fn(&PageArgument) -> String + Send + Sync` closure is a handler.
pub trait TokenHandler: Send + Sync {
    fn handle(&self, args: &PageArgument) -> String;
}

impl<F> TokenHandler for F
where
    F: Fn(&PageArgument) -> String + Send + Sync,
{
    fn handle(&self, args: &PageArgument) -> String {
        self(args)
    }
}

/// Handler returning the same text on every request
pub struct StaticText(pub String);

impl TokenHandler for StaticText {
    fn handle(&self, _args: &PageArgument) -> String {
        self.0.clone()
    }
}

/// Handler echoing a request argument, or a fallback when it is absent
pub struct ArgumentEcho {
    name: String,
    fallback: String,
}

impl ArgumentEcho {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            fallback: String::new(),
        }
    }

    pub fn or<S: Into<String>>(mut self, fallback: S) -> Self {
        self.fallback = fallback.into();
        self
    }
}

impl TokenHandler for ArgumentEcho {
    fn handle(&self, args: &PageArgument) -> String {
        args.arg(&self.name).unwrap_or(self.fallback.as_str()).to_string()
    }
}

#[derive(Clone)]
struct TokenEntry {
    name: String,
    handler: Arc<dyn TokenHandler>,
}

/// Ordered token name to handler table.
///
/// Names are matched exactly and case-sensitively in registration order;
/// when a name is registered twice the first registration wins.
#[derive(Clone, Default)]
pub struct TokenTable {
    entries: Vec<TokenEntry>,
}

impl TokenTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token
    pub fn add_token<S, H>(&mut self, name: S, handler: H)
    where
        S: Into<String>,
        H: TokenHandler + 'static,
    {
        self.entries.push(TokenEntry {
            name: name.into(),
            handler: Arc::new(handler),
        });
    }

    /// Builder-style [`TokenTable::add_token`]
    pub fn with_token<S, H>(mut self, name: S, handler: H) -> Self
    where
        S: Into<String>,
        H: TokenHandler + 'static,
    {
        self.add_token(name, handler);
        self
    }

    /// First handler registered under `name`
    pub fn find(&self, name: &str) -> Option<&dyn TokenHandler> {
        self.find_bytes(name.as_bytes())
    }

    pub(crate) fn find_bytes(&self, name: &[u8]) -> Option<&dyn TokenHandler> {
        self.entries
            .iter()
            .find(|entry| entry.name.as_bytes() == name)
            .map(|entry| entry.handler.as_ref())
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for TokenTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenTable")
            .field("tokens", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
