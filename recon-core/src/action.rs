//! Actions and per-dispatch options.

use serde::{Deserialize, Serialize};

use crate::identity::ActionTag;

/// A tagged intent with a payload typed by the tag.
///
/// The tag routes the action to a mutation slot; the payload is forwarded
/// verbatim to the bound remote operation and to the reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action<P> {
    pub tag: ActionTag,
    pub payload: P,
}

impl<P> Action<P> {
    pub fn new(tag: impl Into<ActionTag>, payload: P) -> Self {
        Self {
            tag: tag.into(),
            payload,
        }
    }

    /// Check whether this action carries the given tag.
    pub fn is(&self, tag: &str) -> bool {
        self.tag.as_str() == tag
    }
}

/// Options accompanying a single dispatch.
///
/// `extra` is handed to the reducer untouched, letting it branch on context
/// the cached value cannot express.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOptions<X = ()> {
    /// Skip the remote call and patch the cache from the current snapshot.
    #[serde(default)]
    pub only_update_cache: bool,
    #[serde(default)]
    pub extra: Option<X>,
}

impl<X> Default for DispatchOptions<X> {
    fn default() -> Self {
        Self {
            only_update_cache: false,
            extra: None,
        }
    }
}

impl<X> DispatchOptions<X> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a local-only transition that needs no server confirmation.
    pub fn cache_only() -> Self {
        Self {
            only_update_cache: true,
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: X) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn with_only_update_cache(mut self, only_update_cache: bool) -> Self {
        self.only_update_cache = only_update_cache;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_invoke_remote() {
        let options = DispatchOptions::<()>::default();
        assert!(!options.only_update_cache);
        assert!(options.extra.is_none());
    }

    #[test]
    fn test_cache_only_with_extra() {
        let options = DispatchOptions::cache_only().with_extra("invite");
        assert!(options.only_update_cache);
        assert_eq!(options.extra, Some("invite"));
    }

    #[test]
    fn test_action_tag_match() {
        let action = Action::new("items.add", 1u32);
        assert!(action.is("items.add"));
        assert!(!action.is("items.remove"));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: DispatchOptions<bool> = serde_json::from_str("{}").unwrap();
        assert_eq!(options, DispatchOptions::default());
    }
}
