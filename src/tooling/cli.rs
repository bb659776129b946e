//! CLI Tooling
//!
//! Each invocation opens the workspace, replays the persisted expansion
//! state, runs one command through the browser, and saves the expansion
//! state again. Paths are taken relative to the workspace root unless
//! absolute.

use crate::browser::{BatchOutcome, Browser, Command, CommandOutcome};
use crate::config::{ConfigLoader, SprigConfig};
use crate::dnd::{DragPayload, DragSession, DropOutcome, DropProposal, OperationMask};
use crate::error::ApiError;
use crate::expansion::ExpansionSet;
use crate::logging::LoggingConfig;
use crate::reconcile::{ReconcileObserver, ReconcilePass, Reconciler};
use crate::state::JsonStateFile;
use crate::store::{DirectoryStore, ExternalWatcher, FsDirectoryStore};
use crate::types::NodeId;
use crate::view::Row;
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Sprig CLI - file-browser operations over a directory tree
#[derive(Parser)]
#[command(name = "sprig")]
#[command(about = "Browse and edit a directory tree the way a file browser does")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Include hidden entries regardless of configuration
    #[arg(long)]
    pub show_hidden: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Load configuration and apply command-line overrides
    pub fn load_config(&self) -> Result<SprigConfig, ApiError> {
        let mut config = match &self.config {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&self.workspace)?,
        };
        if self.show_hidden {
            config.browser.show_hidden = true;
        }
        config.logging = self.logging_config(config.logging);
        Ok(config)
    }

    fn logging_config(&self, mut logging: LoggingConfig) -> LoggingConfig {
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the rendered rows
    Tree,
    /// Expand directories
    Expand {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Collapse directories
    Collapse {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Create an untitled file, optionally renaming it right away
    Touch {
        /// Folder (or item whose folder) receives the file; defaults to the root
        parent: Option<PathBuf>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Create an untitled folder, optionally renaming it right away
    Mkdir {
        parent: Option<PathBuf>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Rename an item in place
    Rename { path: PathBuf, name: String },
    /// Move items into a folder
    Mv {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        #[arg(long)]
        to: PathBuf,
    },
    /// Copy items (from anywhere) into a folder
    Cp {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        #[arg(long)]
        to: PathBuf,
    },
    /// Duplicate items beside themselves
    Dup {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Delete items
    Rm {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Simulate dropping dragged items onto an item, the root, or the trash
    Drop {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        /// Item under the pointer; the root when omitted
        #[arg(long)]
        onto: Option<PathBuf>,
        /// Hold the copy modifier
        #[arg(long)]
        copy: bool,
        /// The drag started in another application
        #[arg(long)]
        external: bool,
        /// The drag ended over the trash
        #[arg(long, conflicts_with = "onto")]
        trash: bool,
    },
    /// Relay external changes and reconcile until interrupted
    Watch,
}

pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Tree => "tree",
        Commands::Expand { .. } => "expand",
        Commands::Collapse { .. } => "collapse",
        Commands::Touch { .. } => "touch",
        Commands::Mkdir { .. } => "mkdir",
        Commands::Rename { .. } => "rename",
        Commands::Mv { .. } => "mv",
        Commands::Cp { .. } => "cp",
        Commands::Dup { .. } => "dup",
        Commands::Rm { .. } => "rm",
        Commands::Drop { .. } => "drop",
        Commands::Watch => "watch",
    }
}

/// CLI execution context for one workspace
pub struct CliContext {
    config: SprigConfig,
    store: Arc<FsDirectoryStore>,
    browser: Browser,
    state: JsonStateFile,
    color: bool,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::with_config(workspace_root, config)
    }

    /// Open the workspace and replay its expansion state
    pub fn with_config(workspace_root: PathBuf, config: SprigConfig) -> Result<Self, ApiError> {
        let store = Arc::new(FsDirectoryStore::open(
            &workspace_root,
            config.browser.scan_config(),
            config.browser.notification_capacity,
        )?);
        let root = store.root_location();
        let browser = Browser::new(store.clone(), config.browser.show_hidden);
        let state = JsonStateFile::open(config.state.resolve_state_file(&root)?)?;
        let restored = ExpansionSet::load(&state).apply(&*store, &browser.view());
        info!(root = ?root, expanded = restored.len(), "Opened workspace");

        let color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Ok(Self {
            config,
            store,
            browser,
            state,
            color,
        })
    }

    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub fn root(&self) -> PathBuf {
        self.store.root_location()
    }

    /// Run a command, then persist the expansion state
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        info!(command = command_name(command), "Executing command");
        let result = self.execute_inner(command);
        self.persist_expansion()?;
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Tree => Ok(self.render_rows()),
            Commands::Expand { paths } => {
                for path in paths {
                    let node = self.resolve(path)?;
                    self.browser.expand(node);
                }
                Ok(self.render_rows())
            }
            Commands::Collapse { paths } => {
                for path in paths {
                    let node = self.resolve(path)?;
                    self.browser.collapse(node);
                }
                Ok(self.render_rows())
            }
            Commands::Touch { parent, name } => self.create(parent.as_deref(), name.as_deref(), false),
            Commands::Mkdir { parent, name } => self.create(parent.as_deref(), name.as_deref(), true),
            Commands::Rename { path, name } => {
                let node = self.resolve(path)?;
                match self.browser.execute(Command::Rename {
                    node,
                    name: name.clone(),
                }) {
                    CommandOutcome::Renamed { changed: false, .. } => Ok("Name unchanged".to_string()),
                    CommandOutcome::Renamed { node, .. } => Ok(format!("Renamed to {}", self.display(node))),
                    CommandOutcome::Failed(e) => Err(e.into()),
                    other => Err(unexpected(other)),
                }
            }
            Commands::Mv { sources, to } => {
                let sources = sources
                    .iter()
                    .map(|p| self.resolve(p))
                    .collect::<Result<Vec<_>, _>>()?;
                let target = self.resolve(to)?;
                self.run_batch("Moved", Command::Move { sources, target })
            }
            Commands::Cp { sources, to } => {
                let sources = sources.iter().map(|p| self.absolutize(p)).collect();
                let target = self.resolve(to)?;
                self.run_batch("Copied", Command::Copy { sources, target })
            }
            Commands::Dup { paths } => {
                let nodes = self.resolve_all(paths)?;
                self.run_batch("Duplicated", Command::Duplicate { nodes })
            }
            Commands::Rm { paths } => {
                let nodes = self.resolve_all(paths)?;
                self.run_batch("Deleted", Command::Delete { nodes })
            }
            Commands::Drop {
                sources,
                onto,
                copy,
                external,
                trash,
            } => self.drop_items(sources, onto.as_deref(), *copy, *external, *trash),
            Commands::Watch => self.watch(),
        }
    }

    fn create(&self, parent: Option<&Path>, name: Option<&str>, folder: bool) -> Result<String, ApiError> {
        let context = parent.map(|p| self.resolve(p)).transpose()?;
        let parent = self.browser.target_directory(context);
        let command = if folder {
            Command::CreateFolder { parent }
        } else {
            Command::CreateFile { parent }
        };
        let node = match self.browser.execute(command) {
            CommandOutcome::Created(node) => node,
            CommandOutcome::Failed(e) => return Err(e.into()),
            other => return Err(unexpected(other)),
        };
        if let Some(name) = name {
            self.browser.rename(node, name)?;
        }
        Ok(format!("Created {}", self.display(node)))
    }

    fn run_batch(&self, verb: &str, command: Command) -> Result<String, ApiError> {
        match self.browser.execute(command) {
            CommandOutcome::Batch(batch) => Ok(self.render_batch(verb, &batch)),
            CommandOutcome::Failed(e) => Err(e.into()),
            other => Err(unexpected(other)),
        }
    }

    fn drop_items(
        &self,
        sources: &[PathBuf],
        onto: Option<&Path>,
        copy: bool,
        external: bool,
        trash: bool,
    ) -> Result<String, ApiError> {
        let sources: Vec<PathBuf> = sources.iter().map(|p| self.absolutize(p)).collect();
        let payload = if external {
            DragPayload::external(sources)
        } else {
            DragPayload::internal(sources, OperationMask::ALL)
        }
        .with_copy_modifier(copy);
        let mut session = DragSession::new(payload);

        let outcome = if trash {
            session.drop_on_trash(&self.browser)
        } else {
            let proposal = match onto {
                Some(path) => DropProposal::onto(self.resolve(path)?),
                None => DropProposal::root(),
            };
            session.accept(&self.browser, &proposal)
        };
        match outcome {
            DropOutcome::Refused(refusal) => Ok(format!("Drop refused: {:?}", refusal)),
            DropOutcome::Completed { operation, batch } => {
                let verb = match operation {
                    Some(operation) => format!("Dropped ({:?})", operation),
                    None => "Trashed".to_string(),
                };
                Ok(self.render_batch(&verb, &batch))
            }
        }
    }

    fn watch(&self) -> Result<String, ApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::RuntimeError(format!("Failed to build runtime: {}", e)))?;
        let root = self.root();

        runtime.block_on(async {
            let _watcher = ExternalWatcher::start(Arc::clone(&self.store))?;
            let observer: ReconcileObserver = Arc::new(|pass: &ReconcilePass| {
                println!(
                    "reconciled {} notification(s): {} row(s), {} selected",
                    pass.notifications,
                    pass.rows,
                    pass.selection.len()
                );
            });
            let reconciler = Reconciler::for_browser(&self.browser, self.config.reconcile.clone())
                .with_observer(observer);
            reconciler.start()?;
            println!("Watching {} (Ctrl-C to stop)", root.display());

            tokio::signal::ctrl_c().await?;
            reconciler.stop().await;
            Ok::<(), ApiError>(())
        })?;
        Ok(format!("Stopped watching {}", root.display()))
    }

    fn persist_expansion(&self) -> Result<(), ApiError> {
        let set = self.browser.with_view(|tree, view| ExpansionSet::capture(view, tree));
        set.save(&self.state)
    }

    fn absolutize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        }
    }

    fn resolve(&self, path: &Path) -> Result<NodeId, ApiError> {
        let location = self.absolutize(path);
        self.store
            .lookup(&location)
            .ok_or(ApiError::PathNotFound(location))
    }

    fn resolve_all(&self, paths: &[PathBuf]) -> Result<Vec<NodeId>, ApiError> {
        paths.iter().map(|p| self.resolve(p)).collect()
    }

    fn display(&self, node: NodeId) -> String {
        let tree = self.store.tree();
        let tree = tree.read();
        tree.relative_path(node)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| node.to_string())
    }

    fn render_rows(&self) -> String {
        let view = self.browser.view();
        let view = view.lock();
        let mut out = String::new();
        for row in view.rows() {
            out.push_str(&self.render_row(row));
            out.push('\n');
        }
        if view.is_empty() {
            out.push_str("(empty)\n");
        }
        out
    }

    fn render_row(&self, row: &Row) -> String {
        let indent = "  ".repeat(row.depth);
        let marker = match (row.is_directory, row.expanded) {
            (true, true) => "▾ ",
            (true, false) => "▸ ",
            (false, _) => "  ",
        };
        let name = if !self.color {
            row.name.clone()
        } else if row.is_directory {
            row.name.blue().bold().to_string()
        } else {
            row.name.clone()
        };
        format!("{}{}{}", indent, marker, name)
    }

    fn render_batch(&self, verb: &str, batch: &BatchOutcome) -> String {
        let mut out = format!(
            "{}: {} completed, {} skipped, {} failed\n",
            verb,
            batch.completed.len(),
            batch.skipped.len(),
            batch.failed.len()
        );
        if !batch.failed.is_empty() {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["Item", "Error"]);
            for failure in &batch.failed {
                table.add_row(vec![
                    failure.location.display().to_string(),
                    failure.error.to_string(),
                ]);
            }
            out.push_str(&format!("{}\n", table));
        }
        out
    }
}

fn unexpected(outcome: CommandOutcome) -> ApiError {
    ApiError::RuntimeError(format!("Unexpected command outcome: {:?}", outcome))
}
