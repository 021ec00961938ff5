use std::env;
use std::str::FromStr;

pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError>;

    /// Reads `key` and parses it, returning `None` when the variable is unset
    /// or does not parse as `T`.
    fn parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.var(key).ok().and_then(|v| v.trim().parse().ok())
    }
}
