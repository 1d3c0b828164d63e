mod cmd;
mod completions;
mod logging;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::CompleteEnv;
use clap_complete::engine::ArgValueCompleter;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "vdx", version, about = "Index, query and restructure a markdown vault")]
struct Cli {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Profile to use instead of the configured default
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan the vault and print index statistics
    Index(IndexArgs),

    /// Find documents matching query terms
    ///
    /// Terms are ANDed together:
    ///   tag:project          tag or any of its children
    ///   fm.status:active     frontmatter field
    ///   file.name:*draft*    glob on the file name
    ///   title~plan           substring
    ///   fm.due?  / !fm.due   field present / absent
    #[command(verbatim_doc_comment)]
    Query(QueryArgs),

    /// Show outgoing links and backlinks of a document
    Links(LinksArgs),

    /// Rename a document and update references to it
    Rename(RenameArgs),

    /// Move a document into another folder
    Move(MoveArgs),

    /// Delete a document (to the trash unless --permanent)
    Delete(DeleteArgs),

    /// Set frontmatter fields: key=value (YAML values, empty value removes)
    Set(SetArgs),

    /// Keep the index live and report changes until Ctrl-C or end of input
    Watch(WatchArgs),
}

/// Output format for reading commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    /// Paths only, one per line
    Quiet,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Output format
    #[arg(long, short, value_enum, default_value_t)]
    pub format: OutputFormat,

    /// Print per-file progress
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Query terms; no terms matches every document
    pub terms: Vec<String>,

    /// Additional filter as JSON, e.g. '{"conditions":[{"field":"size","operator":"gt","value":100}]}'
    #[arg(long)]
    pub filter: Option<String>,

    /// Maximum number of results
    #[arg(long, short)]
    pub limit: Option<usize>,

    #[arg(long, short, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct LinksArgs {
    /// Document path, relative to the vault root
    #[arg(add = ArgValueCompleter::new(completions::complete_documents))]
    pub path: PathBuf,

    /// Only show backlinks
    #[arg(long, conflicts_with = "outgoing")]
    pub backlinks: bool,

    /// Only show outgoing links
    #[arg(long)]
    pub outgoing: bool,

    #[arg(long, short, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Flags shared by every mutating command.
#[derive(Debug, Clone, Copy, Args)]
pub struct MutationArgs {
    /// Show what would change without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Copy the document into the backup folder first
    #[arg(long)]
    pub backup: bool,

    /// Leave references in other documents as they are
    #[arg(long)]
    pub no_links: bool,

    /// Print the result (or preview) as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RenameArgs {
    #[arg(add = ArgValueCompleter::new(completions::complete_documents))]
    pub path: PathBuf,

    /// New file name; the extension may be omitted
    pub new_name: String,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    #[arg(add = ArgValueCompleter::new(completions::complete_documents))]
    pub path: PathBuf,

    /// Destination folder, relative to the vault root
    #[arg(add = ArgValueCompleter::new(completions::complete_folders))]
    pub folder: String,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(add = ArgValueCompleter::new(completions::complete_documents))]
    pub path: PathBuf,

    /// Remove the file instead of moving it to the trash
    #[arg(long)]
    pub permanent: bool,

    /// Skip the confirmation prompt for --permanent
    #[arg(long, short)]
    pub yes: bool,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    #[arg(add = ArgValueCompleter::new(completions::complete_documents))]
    pub path: PathBuf,

    /// Assignments as key=value
    #[arg(required = true)]
    pub values: Vec<String>,

    /// Make the given fields the entire frontmatter
    #[arg(long)]
    pub replace: bool,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Print each change as a JSON line
    #[arg(long)]
    pub json: bool,
}

fn main() {
    CompleteEnv::with_factory(Cli::command).complete();

    let cli = Cli::parse();
    let rc = cmd::load_config(cli.config.as_deref(), cli.profile.as_deref());
    logging::init(&rc);

    match cli.command {
        Commands::Index(args) => cmd::index::run(&rc, &args),
        Commands::Query(args) => cmd::query::run(&rc, &args),
        Commands::Links(args) => cmd::links::run(&rc, &args),
        Commands::Rename(args) => cmd::rename::run(&rc, &args),
        Commands::Move(args) => cmd::move_cmd::run(&rc, &args),
        Commands::Delete(args) => cmd::delete::run(&rc, &args),
        Commands::Set(args) => cmd::set::run(&rc, &args),
        Commands::Watch(args) => cmd::watch::run(&rc, &args),
    }

    logging::flush();
}
