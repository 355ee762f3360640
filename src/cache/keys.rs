//! Cache key generation.
//!
//! Defines the ordered `Params` sequence and the `KeyGenerator` policy that
//! turns `(slug, params)` into the string key shared by every tier and by the
//! in-flight table.

use std::ops::Deref;

/// Separator used by [`DefaultKeyGenerator`].
pub const DEFAULT_SEPARATOR: &str = ":";

/// Ordered request parameters. Order is significant for key generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Params(Vec<String>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, param: impl Into<String>) {
        self.0.push(param.into());
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl Deref for Params {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<String>> for Params {
    fn from(params: Vec<String>) -> Self {
        Self(params)
    }
}

impl From<&[String]> for Params {
    fn from(params: &[String]) -> Self {
        Self(params.to_vec())
    }
}

impl From<&[&str]> for Params {
    fn from(params: &[&str]) -> Self {
        params.iter().copied().collect()
    }
}

impl<const N: usize> From<[&str; N]> for Params {
    fn from(params: [&str; N]) -> Self {
        params.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for Params {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Maps a resource slug and its ordered parameters to a cache key.
///
/// Implementations must be pure: the same inputs always yield the same key,
/// otherwise tier lookups and request coalescing silently diverge.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self, slug: &str, params: &[String]) -> String;
}

impl<F> KeyGenerator for F
where
    F: Fn(&str, &[String]) -> String + Send + Sync,
{
    fn generate(&self, slug: &str, params: &[String]) -> String {
        self(slug, params)
    }
}

/// Joins the slug and every parameter with a fixed separator:
/// `getUser`, `["2", "3"]` becomes `getUser:2:3`.
#[derive(Debug, Clone)]
pub struct DefaultKeyGenerator {
    separator: String,
}

impl DefaultKeyGenerator {
    pub fn new() -> Self {
        Self::with_separator(DEFAULT_SEPARATOR)
    }

    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }
}

impl Default for DefaultKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyGenerator for DefaultKeyGenerator {
    fn generate(&self, slug: &str, params: &[String]) -> String {
        let mut key = String::with_capacity(
            slug.len() + params.iter().map(|p| p.len() + self.separator.len()).sum::<usize>() + 1,
        );
        key.push_str(slug);
        key.push_str(&self.separator);
        key.push_str(&params.join(&self.separator));
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_generator_joins_slug_and_params() {
        let generator = DefaultKeyGenerator::new();
        let params = Params::from(["2", "3"]);
        assert_eq!(generator.generate("getUser", &params), "getUser:2:3");
    }

    #[test]
    fn default_generator_is_deterministic() {
        let generator = DefaultKeyGenerator::new();
        let params = Params::from(["a", "b", "c"]);
        let first = generator.generate("slug", &params);
        for _ in 0..16 {
            assert_eq!(generator.generate("slug", &params), first);
        }
    }

    #[test]
    fn parameter_order_is_significant() {
        let generator = DefaultKeyGenerator::new();
        let forward = generator.generate("slug", &Params::from(["2", "3"]));
        let reverse = generator.generate("slug", &Params::from(["3", "2"]));
        assert_ne!(forward, reverse);
    }

    #[test]
    fn empty_params_keep_trailing_separator() {
        let generator = DefaultKeyGenerator::new();
        assert_eq!(generator.generate("settings", &Params::new()), "settings:");
    }

    #[test]
    fn custom_separator() {
        let generator = DefaultKeyGenerator::with_separator("|");
        assert_eq!(
            generator.generate("getUser", &Params::from(["2", "3"])),
            "getUser|2|3"
        );
    }

    #[test]
    fn closures_are_generators() {
        let generator = |slug: &str, params: &[String]| format!("{slug}/{}", params.join(","));
        assert_eq!(generator.generate("a", &Params::from(["x", "y"])), "a/x,y");
    }

    #[test]
    fn params_collect_from_iterators() {
        let params: Params = vec!["1", "2"].into_iter().collect();
        assert_eq!(params.as_slice(), ["1".to_string(), "2".to_string()]);
        let mut built = Params::new();
        built.push("1");
        built.push(String::from("2"));
        assert_eq!(built, params);
    }
}
