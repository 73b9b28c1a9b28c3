use std::fs;
use std::time::SystemTime;

use dm_utils::hash::fingerprint;

use crate::class::SourceLocation;
use crate::config::InvalidationPolicy;
use crate::error::InvalidationError;

/// What a cache entry remembers about its source to detect staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token {
    Manual,
    Mtime(SystemTime),
    Hash(u64),
}

impl Token {
    /// The token `policy` expects right now.
    ///
    /// Types without a source fall back to their description `signature`
    /// under both watching policies.
    pub(crate) fn compute(
        policy: InvalidationPolicy,
        source: Option<&SourceLocation>,
        signature: impl FnOnce() -> u64,
    ) -> Result<Self, InvalidationError> {
        let source = match (policy, source) {
            (InvalidationPolicy::Manual, _) => return Ok(Self::Manual),
            (_, None) => return Ok(Self::Hash(signature())),
            (_, Some(source)) => source.resolve(),
        };

        let token = match policy {
            InvalidationPolicy::Mtime => fs::metadata(&source)
                .and_then(|meta| meta.modified())
                .map(Self::Mtime),
            _ => fs::read(&source).map(|bytes| Self::Hash(fingerprint(&bytes))),
        };
        token.map_err(|err| InvalidationError::Io {
            path: source,
            source: err,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::Token;
    use crate::{InvalidationError, InvalidationPolicy, SourceLocation};

    #[test]
    fn tokens_per_policy() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.rs");
        fs::write(&file, "struct A;").unwrap();
        let source = SourceLocation::new(&file);

        let manual = Token::compute(InvalidationPolicy::Manual, Some(&source), || unreachable!());
        assert_eq!(manual.unwrap(), Token::Manual);

        let hash = Token::compute(InvalidationPolicy::Hash, Some(&source), || 0).unwrap();
        fs::write(&file, "struct B;").unwrap();
        assert_ne!(Token::compute(InvalidationPolicy::Hash, Some(&source), || 0).unwrap(), hash);

        let mtime = Token::compute(InvalidationPolicy::Mtime, Some(&source), || 0).unwrap();
        assert!(matches!(mtime, Token::Mtime(_)));

        let unsourced = Token::compute(InvalidationPolicy::Mtime, None, || 7).unwrap();
        assert_eq!(unsourced, Token::Hash(7));

        let missing = SourceLocation::new(dir.path().join("missing.rs"));
        let err = Token::compute(InvalidationPolicy::Hash, Some(&missing), || 0).unwrap_err();
        assert!(matches!(err, InvalidationError::Io { .. }));
    }
}
