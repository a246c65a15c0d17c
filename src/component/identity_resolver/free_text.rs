use super::identity::{Identity, ReleaseFlag};
use super::{ResolveError, Resolver};
use crate::config::NameMode;

/// 不套用文法，只做空白與大小寫正規化，精確度交給場景比對
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeTextResolver;

impl Resolver for FreeTextResolver {
    fn mode(&self) -> NameMode {
        NameMode::FreeText
    }

    fn resolve(&self, input: &str) -> Result<Identity, ResolveError> {
        let mut flags = Vec::new();
        let words: Vec<String> = input
            .split(|c: char| c.is_whitespace() || c == '_')
            .filter(|w| !w.is_empty())
            .filter(|w| match ReleaseFlag::from_token(w) {
                Some(flag) => {
                    if !flags.contains(&flag) {
                        flags.push(flag);
                    }
                    false
                }
                None => true,
            })
            .map(str::to_lowercase)
            .collect();

        if words.is_empty() {
            return Err(ResolveError::unparsable(input, "搜尋文字是空的"));
        }

        Ok(Identity {
            flags,
            query: words.join(" "),
            ..Identity::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_whitespace_and_case() {
        let identity = FreeTextResolver
            .resolve("  Jane   Doe\tPool_Party ")
            .unwrap();
        assert_eq!(identity.query, "jane doe pool party");
        assert!(identity.studio.is_none());
        assert!(identity.performers.is_empty());
    }

    #[test]
    fn test_keeps_flags_separately() {
        let identity = FreeTextResolver.resolve("Jane Doe BTS").unwrap();
        assert_eq!(identity.query, "jane doe");
        assert_eq!(identity.flags, vec![ReleaseFlag::Bts]);
    }

    #[test]
    fn test_empty_input_is_unparsable() {
        assert!(FreeTextResolver.resolve("   ").is_err());
        assert!(FreeTextResolver.resolve("pov").is_err());
    }
}
