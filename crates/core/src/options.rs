//! Per-call options and their resolution against Store defaults
//!
//! Every Store operation takes an optional [`CallOptions`] whose `object` field carries the
//! backend options for that call kind. Before anything reaches the backend the options are
//! resolved: a missing cancellation token is replaced by the Store's default, and list calls
//! always get their `prefix` from the call argument.
//!
//! | kind    | alias            | backend type           | defaults                                    |
//! |---------|------------------|------------------------|---------------------------------------------|
//! | Set     | [`SetOptions`]     | [`PutObjectOptions`]     | no content type/class, overwrite allowed    |
//! | Get     | [`GetOptions`]     | [`GetObjectOptions`]     | whole object, latest version                |
//! | GetInfo | [`GetInfoOptions`] | [`StatObjectOptions`]    | latest version                              |
//! | Del     | [`DelOptions`]     | [`RemoveObjectOptions`]  | latest version                              |
//! | List    | [`ListOptions`]    | [`ListObjectsOptions`]   | `/`-delimited, no cap, no start-after       |
//! | Copy    | [`CopyOptions`]    | [`CopyObjectOptions`]    | source metadata kept                        |

use tokio_util::sync::CancellationToken;

use crate::traits::{
    CopyObjectOptions, GetObjectOptions, ListObjectsOptions, PutObjectOptions,
    RemoveObjectOptions, StatObjectOptions,
};

/// Caller-supplied options for one Store call
#[derive(Debug, Clone, Default)]
pub struct CallOptions<T> {
    /// Cancellation token; the Store default is used when None
    pub cancel: Option<CancellationToken>,

    /// Backend options passed through verbatim
    pub object: T,
}

pub type SetOptions = CallOptions<PutObjectOptions>;
pub type GetOptions = CallOptions<GetObjectOptions>;
pub type GetInfoOptions = CallOptions<StatObjectOptions>;
pub type DelOptions = CallOptions<RemoveObjectOptions>;
pub type ListOptions = CallOptions<ListObjectsOptions>;
pub type CopyOptions = CallOptions<CopyObjectOptions>;

impl<T: Default> CallOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> CallOptions<T> {
    /// Use `token` instead of the Store default
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl SetOptions {
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.object.content_type = Some(content_type.into());
        self
    }

    pub fn no_overwrite(mut self) -> Self {
        self.object.no_overwrite = true;
        self
    }
}

impl GetOptions {
    pub fn range(mut self, start: u64, end: Option<u64>) -> Self {
        self.object.set_range(start, end);
        self
    }
}

impl ListOptions {
    /// Stop after `max_keys` keys
    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.object.max_keys = Some(max_keys);
        self
    }

    /// Start listing after `key`
    pub fn start_after(mut self, key: impl Into<String>) -> Self {
        self.object.start_after = Some(key.into());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.object.recursive = recursive;
        self
    }
}

/// Fully populated options handed to the backend
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub cancel: CancellationToken,
    pub object: T,
}

/// Merge caller options with the Store default token
pub fn resolve<T: Default>(
    default_cancel: &CancellationToken,
    options: Option<CallOptions<T>>,
) -> Resolved<T> {
    let CallOptions { cancel, object } = options.unwrap_or_default();
    Resolved {
        cancel: cancel.unwrap_or_else(|| default_cancel.clone()),
        object,
    }
}

/// Resolve list options, forcing the prefix to the call argument
pub fn resolve_list(
    default_cancel: &CancellationToken,
    prefix: &str,
    options: Option<ListOptions>,
) -> Resolved<ListObjectsOptions> {
    let mut resolved = resolve(default_cancel, options);
    resolved.object.prefix = prefix.to_string();
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_without_options_uses_defaults() {
        let default = CancellationToken::new();
        let resolved = resolve::<PutObjectOptions>(&default, None);

        assert_eq!(resolved.object, PutObjectOptions::default());
        default.cancel();
        assert!(resolved.cancel.is_cancelled());
    }

    #[test]
    fn test_resolve_keeps_caller_token_and_fields() {
        let default = CancellationToken::new();
        let own = CancellationToken::new();
        let options = SetOptions::new()
            .with_cancellation(own.clone())
            .content_type("text/plain");

        let resolved = resolve(&default, Some(options));
        assert_eq!(resolved.object.content_type.as_deref(), Some("text/plain"));

        default.cancel();
        assert!(!resolved.cancel.is_cancelled());
        own.cancel();
        assert!(resolved.cancel.is_cancelled());
    }

    #[test]
    fn test_resolve_defaults_missing_token_only() {
        let default = CancellationToken::new();
        let options = GetOptions::new().range(1, Some(3));

        let resolved = resolve(&default, Some(options));
        assert_eq!(resolved.object.range, Some((1, Some(3))));
        default.cancel();
        assert!(resolved.cancel.is_cancelled());
    }

    #[test]
    fn test_resolve_list_overrides_prefix() {
        let default = CancellationToken::new();
        let mut options = ListOptions::new().max_keys(3).start_after("a/1");
        options.object.prefix = "stale/".to_string();

        let resolved = resolve_list(&default, "a/", Some(options));
        assert_eq!(resolved.object.prefix, "a/");
        assert_eq!(resolved.object.max_keys, Some(3));
        assert_eq!(resolved.object.start_after.as_deref(), Some("a/1"));
        assert!(!resolved.object.recursive);
    }

    #[test]
    fn test_resolve_list_without_options() {
        let default = CancellationToken::new();
        let resolved = resolve_list(&default, "p/", None);
        assert_eq!(resolved.object.prefix, "p/");
        assert_eq!(resolved.object.max_keys, None);
    }
}
