//! Built-in plugins for Quill.
//!
//! Plugins give the agent the ability to act on a codebase:
//! run shell commands, read/write/edit files, search the tree,
//! and inspect git state and GitHub pull requests.

pub mod bash;
pub mod edit_file;
pub mod fs;
pub mod git;
pub mod github_pr;
pub mod glob;
pub mod grep;
pub mod list_directory;
pub mod process;
pub mod read_file;
pub mod write_file;

use quill_core::{PluginRegistry, ToolError};
use std::sync::Arc;

pub use fs::PathLocks;

/// Create the registry with every built-in plugin, in advertised order.
///
/// `write_file` and `edit_file` share one set of path locks.
pub fn default_registry() -> Result<PluginRegistry, ToolError> {
    let locks = Arc::new(PathLocks::new());
    PluginRegistry::from_plugins(vec![
        Box::new(bash::BashPlugin),
        Box::new(read_file::ReadFilePlugin),
        Box::new(write_file::WriteFilePlugin::new(locks.clone())),
        Box::new(edit_file::EditFilePlugin::new(locks)),
        Box::new(git::GitPlugin),
        Box::new(github_pr::GithubPrPlugin),
        Box::new(list_directory::ListDirectoryPlugin),
        Box::new(glob::GlobPlugin),
        Box::new(grep::GrepPlugin),
    ])
}
