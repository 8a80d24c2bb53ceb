use std::env::{self, VarError};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::{Error, KeyStream, Registry, Result, Store};

/// Set in the writer child's environment to the strategy it should run.
/// Its presence is what tells an executable that it is the child.
pub const WRITER_ENV_VAR: &str = "CRASHTEST_WRITER";
/// Store directory of the writer child.
pub const DIR_ENV_VAR: &str = "CRASHTEST_DIR";
/// Stream seed shared by the writer child and its verifier.
pub const SEED_ENV_VAR: &str = "CRASHTEST_SEED";
/// Optional number of entries after which the child exits on its own.
pub const LIMIT_ENV_VAR: &str = "CRASHTEST_LIMIT";

/// Everything the writer child needs to know, passed through its
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterInvocation {
    pub strategy: String,
    pub dir: PathBuf,
    pub seed: u64,
    pub limit: Option<u64>,
}

impl WriterInvocation {
    /// Environment variables that reproduce this invocation in a child.
    pub fn env(&self) -> Vec<(&'static str, OsString)> {
        let mut ret = vec![
            (WRITER_ENV_VAR, OsString::from(&self.strategy)),
            (DIR_ENV_VAR, self.dir.clone().into_os_string()),
            (SEED_ENV_VAR, OsString::from(self.seed.to_string())),
        ];
        if let Some(limit) = self.limit {
            ret.push((LIMIT_ENV_VAR, OsString::from(limit.to_string())));
        }
        ret
    }

    /// Returns `Ok(None)` when this process is not a writer child.
    pub fn from_env() -> Result<Option<WriterInvocation>> {
        WriterInvocation::from_vars(|name| match env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(e) => Err(Error::InvalidInvocation(format!(
                "env var {name} unable to be read: {e:?}"
            ))),
        })
    }

    fn from_vars<F>(var: F) -> Result<Option<WriterInvocation>>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        let strategy = match var(WRITER_ENV_VAR)? {
            Some(strategy) => strategy,
            None => return Ok(None),
        };

        let dir = var(DIR_ENV_VAR)?.ok_or_else(|| {
            Error::InvalidInvocation(format!("{DIR_ENV_VAR} is not set"))
        })?;

        let parse = |name: &str, raw: String| {
            raw.parse::<u64>().map_err(|e| {
                Error::InvalidInvocation(format!("{name}={raw:?}: {e}"))
            })
        };

        let seed = match var(SEED_ENV_VAR)? {
            Some(raw) => parse(SEED_ENV_VAR, raw)?,
            None => 0,
        };
        let limit = match var(LIMIT_ENV_VAR)? {
            Some(raw) => Some(parse(LIMIT_ENV_VAR, raw)?),
            None => None,
        };

        Ok(Some(WriterInvocation { strategy, dir: dir.into(), seed, limit }))
    }

    /// Runs the requested strategy. Only returns when a limit was given or
    /// the store failed; otherwise it writes until the supervisor kills it.
    pub fn run<S: Store>(&self, registry: &Registry) -> Result<u64> {
        let strategy = registry.get(&self.strategy)?;
        log::debug!(
            "writer pid {} running {} against {:?}",
            std::process::id(),
            strategy,
            self.dir
        );
        let entries = KeyStream::new(self.seed).entries();
        strategy.run::<S>(&self.dir, entries, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup<'a>(
        vars: &'a HashMap<&'static str, String>,
    ) -> impl Fn(&str) -> Result<Option<String>> + 'a {
        move |name| Ok(vars.get(name).cloned())
    }

    #[test]
    fn env_roundtrip() {
        let invocation = WriterInvocation {
            strategy: "batched-sync".into(),
            dir: "/tmp/crash".into(),
            seed: 42,
            limit: Some(10),
        };

        let vars: HashMap<&'static str, String> = invocation
            .env()
            .into_iter()
            .map(|(k, v)| (k, v.into_string().unwrap()))
            .collect();

        let parsed = WriterInvocation::from_vars(lookup(&vars)).unwrap();
        assert_eq!(parsed, Some(invocation));
    }

    #[test]
    fn absent_writer_var_means_parent() {
        let vars = HashMap::new();
        assert_eq!(WriterInvocation::from_vars(lookup(&vars)).unwrap(), None);
    }

    #[test]
    fn bad_seed_is_invalid_invocation() {
        let mut vars = HashMap::new();
        vars.insert(WRITER_ENV_VAR, "sequential-sync".to_string());
        vars.insert(DIR_ENV_VAR, "db".to_string());
        vars.insert(SEED_ENV_VAR, "twelve".to_string());
        assert!(matches!(
            WriterInvocation::from_vars(lookup(&vars)),
            Err(Error::InvalidInvocation(_))
        ));

        vars.remove(DIR_ENV_VAR);
        vars.insert(SEED_ENV_VAR, "12".to_string());
        assert!(matches!(
            WriterInvocation::from_vars(lookup(&vars)),
            Err(Error::InvalidInvocation(_))
        ));
    }
}
