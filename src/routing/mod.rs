pub mod dispatch;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::config::GatewayConfig;

/// Caller-model to upstream-model lookup table for one gateway.
///
/// Entries come from the gateway's `custom_model_name`/`upstream_model` pair
/// followed by its `caller:provider` mapping list. When several entries share
/// a caller name the first one wins. Names without an entry pass through.
#[derive(Debug, Clone, Default)]
pub struct ModelResolver {
    table: FxHashMap<Arc<str>, Arc<str>>,
}

impl ModelResolver {
    /// Build a resolver from explicit `(caller, provider)` pairs.
    #[must_use]
    pub fn from_pairs<I, C, P>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, P)>,
        C: AsRef<str>,
        P: AsRef<str>,
    {
        let mut table: FxHashMap<Arc<str>, Arc<str>> = FxHashMap::default();
        for (caller, provider) in pairs {
            table
                .entry(Arc::from(caller.as_ref()))
                .or_insert_with(|| Arc::from(provider.as_ref()));
        }
        Self { table }
    }

    /// Build the resolver for a configured gateway.
    #[must_use]
    pub fn new(gateway: &GatewayConfig) -> Self {
        let primary = match (&gateway.custom_model_name, &gateway.upstream_model) {
            (Some(caller), Some(provider)) => Some((caller.trim(), provider.trim())),
            _ => None,
        };
        let mapped = gateway
            .model_mapping
            .iter()
            .filter_map(|entry| split_mapping_entry(entry));
        Self::from_pairs(primary.into_iter().chain(mapped))
    }

    /// Resolve a caller model name. Unmapped names are returned unchanged.
    #[must_use]
    pub fn resolve<'a>(&'a self, caller_model: &'a str) -> &'a str {
        self.table
            .get(caller_model)
            .map_or(caller_model, |provider| provider.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Split a `caller:provider` entry at the first colon.
#[must_use]
pub fn split_mapping_entry(entry: &str) -> Option<(&str, &str)> {
    let (caller, provider) = entry.split_once(':')?;
    let caller = caller.trim();
    let provider = provider.trim();
    if caller.is_empty() || provider.is_empty() {
        return None;
    }
    Some((caller, provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(mapping: &[&str]) -> GatewayConfig {
        GatewayConfig {
            id: 1,
            name: "test".to_string(),
            upstream_base_url: "http://localhost:9000".to_string(),
            upstream_api_key: "sk-test".to_string(),
            auth_token: "gw-test".to_string(),
            custom_model_name: Some("claude-3-5-sonnet-20241022".to_string()),
            upstream_model: Some("gpt-4o".to_string()),
            model_mapping: mapping.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_mapped_and_passthrough() {
        let resolver = ModelResolver::new(&gateway(&["claude-3-haiku:gpt-4o-mini"]));
        assert_eq!(resolver.resolve("claude-3-5-sonnet-20241022"), "gpt-4o");
        assert_eq!(resolver.resolve("claude-3-haiku"), "gpt-4o-mini");
        assert_eq!(resolver.resolve("unmapped-model"), "unmapped-model");
        assert_eq!(resolver.len(), 2);
    }

    #[test]
    fn test_configured_pair_is_trimmed() {
        let mut config = gateway(&[]);
        config.custom_model_name = Some(" claude-x ".to_string());
        config.upstream_model = Some(" provider-x\t".to_string());
        let resolver = ModelResolver::new(&config);
        assert_eq!(resolver.resolve("claude-x"), "provider-x");
        assert_eq!(resolver.resolve(" claude-x "), " claude-x ");
    }

    #[test]
    fn test_first_entry_wins() {
        let resolver =
            ModelResolver::new(&gateway(&["claude-3-5-sonnet-20241022:other", "a:b", "a:c"]));
        assert_eq!(resolver.resolve("claude-3-5-sonnet-20241022"), "gpt-4o");
        assert_eq!(resolver.resolve("a"), "b");
    }

    #[test]
    fn test_provider_name_may_contain_colons() {
        let resolver = ModelResolver::from_pairs([("x", "y")]);
        assert_eq!(resolver.resolve("x"), "y");
        assert_eq!(
            split_mapping_entry("local:llama3:8b"),
            Some(("local", "llama3:8b"))
        );
        assert_eq!(split_mapping_entry("no-colon"), None);
        assert_eq!(split_mapping_entry(":empty"), None);
    }

    #[test]
    fn test_empty_table_passes_everything_through() {
        let resolver = ModelResolver::default();
        assert!(resolver.is_empty());
        assert_eq!(resolver.resolve(""), "");
        assert_eq!(resolver.resolve("m"), "m");
    }
}
