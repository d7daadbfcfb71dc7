//! Command-line front end for confweave.
//!
//! Loads a root configuration with [`confweave`], resolves its imports,
//! merges `--override` sources over it and prints the result.
//!
//! ```text
//! confweave -c app.conf show --format json
//! confweave -c app.conf -o db.host=remote get db host
//! CONFWEAVE_CACHE=/tmp/app.json confweave -c app.conf sections
//! ```

pub mod cli;
pub mod commands;
pub mod load;

pub use cli::{Cli, Commands, OutputFormat};
