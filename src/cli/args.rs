//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--user <id>`: Act as this user (default `$GITDECK_USER`, then `$USER`)
//! - `--project <name>` / `-p`: Target project (default: the user's active one)
//! - `--workspace <path>`: Override the configured workspace
//! - `--config <path>`: Read configuration from this file
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Suppress output on success

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// gitdeck - versioned projects for many users, backed by git
#[derive(Parser, Debug)]
#[command(name = "gitdeck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Act as this user
    #[arg(long, global = true, env = "GITDECK_USER")]
    pub user: Option<String>,

    /// Target project; defaults to the user's active project
    #[arg(short, long, global = true, env = "GITDECK_PROJECT")]
    pub project: Option<String>,

    /// Workspace holding the registry and all working trees
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Configuration file to use instead of the default locations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Print nothing on success
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// The acting user: `--user`, then `$USER`, then `default`.
    pub fn user_id(&self) -> String {
        self.user
            .clone()
            .or_else(|| std::env::var("USER").ok().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| "default".to_string())
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the workspace is usable
    Available,

    /// Create, inspect and remove projects
    #[command(subcommand)]
    Projects(ProjectsCommand),

    /// Show branch, HEAD, changed files and merge state
    #[command(
        long_about = "Show the working state of the project.\n\n\
            Lists staged, unstaged, untracked and conflicted files together with the \
            current branch and any merge in progress. With --remote the upstream is \
            fetched first and ahead/behind counts are reported; an unreachable remote \
            is reported in the output rather than failing the command.",
        after_help = "\
EXAMPLES:
    gitdeck status
    gitdeck status --remote --timeout 10"
    )]
    Status {
        /// Fetch the upstream and report ahead/behind
        #[arg(long)]
        remote: bool,

        /// Network timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// List branches
    Branches {
        /// List remote-tracking branches instead of local ones
        #[arg(short, long)]
        remote: bool,
    },

    /// Switch, delete or compare a branch
    #[command(subcommand)]
    Branch(BranchCommand),

    /// Commit the staged changes
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Show history, newest first
    #[command(after_help = "\
EXAMPLES:
    gitdeck log --limit 10
    # next page: pass the `next` value of the previous page
    gitdeck log --limit 10 --before 3f2a9c1")]
    Log {
        /// Commits per page
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Start below this commit (exclusive)
        #[arg(long, value_name = "REV")]
        before: Option<String>,
    },

    /// Show one commit with its changed files
    ShowCommit {
        /// Revision to show
        #[arg(default_value = "HEAD")]
        reference: String,
    },

    /// List tracked, modified and untracked files
    Files,

    /// Print a file
    Cat {
        path: String,

        /// Where to read from: worktree, index, head, or any revision
        #[arg(long, default_value = "worktree", value_name = "TREE")]
        from: String,
    },

    /// Stage files
    Stage {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Unstage files
    Unstage {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        paths: Vec<String>,

        /// Unstage everything
        #[arg(long)]
        all: bool,
    },

    /// Discard working tree changes to a file
    Revert { path: String },

    /// Show the diff of one file
    Diff(DiffArgs),

    /// Add, change or remove remotes
    #[command(subcommand)]
    Remote(RemoteCommand),

    /// Fetch and integrate the current branch from a remote
    #[command(
        long_about = "Fetch the current branch from a remote and integrate it.\n\n\
            The tracked working tree must be clean. A fast-forward is applied when \
            possible, otherwise a merge commit is created. Conflicts are not an error: \
            the conflicted paths are reported and the project stays in a merge until \
            every path is resolved and committed, or the merge is aborted.",
        after_help = "\
EXAMPLES:
    gitdeck pull
    gitdeck pull --remote upstream --track
    gitdeck merge resolve notes.md --theirs && gitdeck commit -m 'Merge upstream'"
    )]
    Pull {
        /// Remote to pull from (default: upstream, then origin)
        #[arg(long)]
        remote: Option<String>,

        /// Record the remote branch as upstream
        #[arg(long)]
        track: bool,

        /// Merge even if the histories share no commit
        #[arg(long)]
        allow_unrelated_histories: bool,

        /// Network timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Push the current branch to a remote
    Push {
        /// Remote to push to (default: upstream, then origin)
        #[arg(long)]
        remote: Option<String>,

        /// Record the remote branch as upstream
        #[arg(long)]
        track: bool,

        /// Network timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Resolve or abort a merge in progress
    #[command(subcommand)]
    Merge(MergeCommand),

    /// Show configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectsCommand {
    /// List all projects
    List,

    /// Create a project
    #[command(after_help = "\
EXAMPLES:
    # empty repository
    gitdeck projects create notes
    # initial commit with README.md, .gitignore and extra files
    gitdeck projects create notes --template --file intro.md=./intro.md
    # clone, asking for a token
    gitdeck projects create notes --clone https://example.com/notes.git --username alice")]
    Create {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Make an initial commit of the default files
        #[arg(long, conflicts_with = "clone")]
        template: bool,

        /// Extra initial file, as DEST=LOCAL_PATH (implies --template)
        #[arg(long = "file", value_name = "DEST=PATH", value_parser = parse_file_arg, conflicts_with = "clone")]
        files: Vec<(String, PathBuf)>,

        /// Clone this URL instead of starting empty
        #[arg(long, value_name = "URL")]
        clone: Option<String>,

        /// Branch to check out after cloning
        #[arg(long, requires = "clone")]
        branch: Option<String>,

        /// Username for the clone; the token is read from $GITDECK_TOKEN or prompted
        #[arg(long, requires = "clone")]
        username: Option<String>,
    },

    /// Give an empty project its initial commit
    Init {
        name: String,

        /// Extra initial file, as DEST=LOCAL_PATH
        #[arg(long = "file", value_name = "DEST=PATH", value_parser = parse_file_arg)]
        files: Vec<(String, PathBuf)>,
    },

    /// Show a project
    Show {
        /// Defaults to the active project
        name: Option<String>,
    },

    /// Change a project's description
    Update {
        /// Defaults to the active project
        name: Option<String>,

        #[arg(short, long)]
        description: String,
    },

    /// Delete a project and its working tree
    Delete { name: String },

    /// Make a project the active one
    Activate { name: String },

    /// Show the active project
    Active,
}

#[derive(Subcommand, Debug)]
pub enum BranchCommand {
    /// Compare a branch with the current one
    Status { branch: String },

    /// Check out a branch
    Switch {
        branch: String,

        /// Create the branch at HEAD first
        #[arg(short, long)]
        create: bool,
    },

    /// Delete a branch
    Delete {
        branch: String,

        /// Delete even if not merged into the current branch
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    pub path: String,

    /// Diff the index against HEAD
    #[arg(long, conflicts_with = "commit")]
    pub staged: bool,

    /// Diff a commit against its first parent
    #[arg(long, value_name = "REV")]
    pub commit: Option<String>,

    /// Base revision for --commit
    #[arg(long, value_name = "REV", requires = "commit")]
    pub from: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum RemoteCommand {
    /// List remotes
    List,

    /// Add a remote
    Add {
        name: String,
        url: String,

        /// Store credentials; the token is read from $GITDECK_TOKEN or prompted
        #[arg(long)]
        username: Option<String>,
    },

    /// Change a remote's URL
    Update { name: String, url: String },

    /// Set or clear a remote's credentials
    Auth {
        name: String,

        /// The token is read from $GITDECK_TOKEN or prompted
        #[arg(long, required_unless_present = "clear", conflicts_with = "clear")]
        username: Option<String>,

        /// Forget stored credentials
        #[arg(long)]
        clear: bool,
    },

    /// Remove a remote
    Remove { name: String },
}

#[derive(Subcommand, Debug)]
pub enum MergeCommand {
    /// Abandon the merge and restore the pre-merge state
    Abort,

    /// Resolve one conflicted path
    #[command(group(ArgGroup::new("side").required(true)))]
    Resolve {
        path: String,

        /// Keep the current branch's version
        #[arg(long, group = "side")]
        ours: bool,

        /// Keep the incoming version
        #[arg(long, group = "side")]
        theirs: bool,

        /// Use the content of this local file
        #[arg(long, group = "side", value_name = "PATH")]
        content: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the config file in use
    Path,

    /// Print the resolved configuration
    Show,
}

/// Shell types for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Parse `DEST=LOCAL_PATH`.
fn parse_file_arg(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((dest, path)) if !dest.is_empty() && !path.is_empty() => {
            Ok((dest.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected DEST=PATH, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn file_arg_needs_both_sides() {
        assert_eq!(
            parse_file_arg("docs/a.md=./a.md").unwrap(),
            ("docs/a.md".to_string(), PathBuf::from("./a.md"))
        );
        assert!(parse_file_arg("a.md").is_err());
        assert!(parse_file_arg("=x").is_err());
    }

    #[test]
    fn resolve_takes_one_side() {
        let parsed = Cli::try_parse_from(["gitdeck", "merge", "resolve", "a.md", "--ours"]);
        assert!(parsed.is_ok());
        let both = Cli::try_parse_from([
            "gitdeck", "merge", "resolve", "a.md", "--ours", "--theirs",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["gitdeck", "status", "--user", "bob", "-p", "notes"]).unwrap();
        assert_eq!(cli.user_id(), "bob");
        assert_eq!(cli.project.as_deref(), Some("notes"));
    }
}
