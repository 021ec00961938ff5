//! Environment variable access behind a trait so configuration can be
//! resolved from a fake environment in tests.
//!
//! ```
//! use snapbots_std::env::{ReadEnv, SystemEnv};
//!
//! fn bot_id<E: ReadEnv>(env: &E) -> Option<String> {
//!     env.var("SNAPBOTS_BOT_ID").ok()
//! }
//!
//! let _ = bot_id(&SystemEnv);
//! ```

mod in_memory;
mod read_env;
mod system;

#[cfg(any(test, feature = "test-support"))]
pub use in_memory::InMemoryEnv;
pub use read_env::ReadEnv;
pub use system::SystemEnv;
