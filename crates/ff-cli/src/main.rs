//! FlagFilter CLI
//!
//! Reads and writes the FlagFilter settings schema in a JSON file: the same
//! operations the extension popup offers, plus user notes and the blocked
//! list.

mod render;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use ff_core::handle::canonicalize;
use ff_core::stats;
use ff_core::{HandlingMode, JsonFileStore, SettingKey, Settings, SettingsStore};

#[derive(Parser)]
#[command(name = "ff-cli")]
#[command(about = "FlagFilter settings and flag catalog tools")]
struct Cli {
    /// Settings file
    #[arg(short, long, global = true, default_value = "flagfilter-settings.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Hide,
    Block,
}

impl From<ModeArg> for HandlingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Hide => HandlingMode::Hide,
            ModeArg::Block => HandlingMode::Block,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog flags
    Flags {
        /// Filter by name, code, or exact emoji
        #[arg(short, long)]
        search: Option<String>,

        /// Print the matches as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Add flags to the selection (emoji or code)
    Select {
        #[arg(required = true)]
        flags: Vec<String>,
    },

    /// Remove flags from the selection (emoji or code)
    Deselect {
        #[arg(required = true)]
        flags: Vec<String>,
    },

    /// Show selected flags with their block counts
    Selected,

    /// Show or set the handling mode
    Mode {
        #[arg(value_enum)]
        mode: Option<ModeArg>,
    },

    /// Show per-flag block counts
    Counts,

    /// Clear per-flag block counts
    ResetCounts,

    /// Block an author handle
    Block { handle: String },

    /// Unblock an author handle
    Unblock { handle: String },

    /// List blocked and annotated users
    Users,

    /// Set the note for a handle (empty clears it)
    Note {
        handle: String,
        #[arg(default_value = "")]
        text: String,
    },

    /// Set the nickname for a handle (empty clears it)
    Nickname {
        handle: String,
        #[arg(default_value = "")]
        text: String,
    },

    /// Print the raw settings
    Show,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Flags { search, json } => cmd_flags(search.as_deref(), json),
        command => open_store(&cli.store).and_then(|mut store| run(&mut store, command)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn open_store(path: &Path) -> Result<JsonFileStore, String> {
    JsonFileStore::open(path).map_err(|e| format!("Failed to open '{}': {}", path.display(), e))
}

fn run<S: SettingsStore>(store: &mut S, command: Commands) -> Result<(), String> {
    match command {
        Commands::Flags { search, json } => cmd_flags(search.as_deref(), json),
        Commands::Select { flags } => cmd_select(store, &flags, true),
        Commands::Deselect { flags } => cmd_select(store, &flags, false),
        Commands::Selected => cmd_selected(store),
        Commands::Mode { mode } => cmd_mode(store, mode.map(HandlingMode::from)),
        Commands::Counts => cmd_counts(store),
        Commands::ResetCounts => {
            stats::reset_flag_counts(store).map_err(|e| e.to_string())?;
            println!("Block counts cleared");
            Ok(())
        }
        Commands::Block { handle } => cmd_block(store, &handle, true),
        Commands::Unblock { handle } => cmd_block(store, &handle, false),
        Commands::Users => cmd_users(store),
        Commands::Note { handle, text } => cmd_annotate(store, &handle, &text, false),
        Commands::Nickname { handle, text } => cmd_annotate(store, &handle, &text, true),
        Commands::Show => cmd_show(store),
    }
}

fn load<S: SettingsStore>(store: &S) -> Result<Settings, String> {
    store.get_all().map_err(|e| e.to_string())
}

fn write<S: SettingsStore>(store: &mut S, settings: &Settings, keys: &[SettingKey]) -> Result<(), String> {
    let items = settings.items(keys).map_err(|e| e.to_string())?;
    store.set(items).map_err(|e| e.to_string())
}

/// Accept a catalog emoji or code.
fn resolve_flag(arg: &str) -> Result<String, String> {
    ff_catalog::find_by_emoji(arg.trim())
        .or_else(|| ff_catalog::find_by_code(arg))
        .map(|option| option.emoji.clone())
        .ok_or_else(|| format!("Unknown flag '{}'", arg))
}

fn checked_handle(raw: &str) -> Result<String, String> {
    let handle = canonicalize(raw);
    if handle.is_empty() {
        return Err(format!("Invalid handle '{}'", raw));
    }
    Ok(handle)
}

// =============================================================================
// Flags
// =============================================================================

fn cmd_flags(search: Option<&str>, json: bool) -> Result<(), String> {
    println!("{}", flag_listing(search, json)?);
    Ok(())
}

fn flag_listing(search: Option<&str>, json: bool) -> Result<String, String> {
    let results = ff_catalog::search(search.unwrap_or(""));
    if results.is_empty() {
        return Err("No flags match".to_string());
    }
    if json {
        return serde_json::to_string_pretty(&results).map_err(|e| e.to_string());
    }
    Ok(results
        .into_iter()
        .map(render::flag_row)
        .collect::<Vec<_>>()
        .join("\n"))
}

fn cmd_select<S: SettingsStore>(store: &mut S, args: &[String], add: bool) -> Result<(), String> {
    let flags = args.iter().map(|arg| resolve_flag(arg)).collect::<Result<Vec<_>, _>>()?;
    let mut settings = load(store)?;

    for flag in &flags {
        if add {
            if !settings.selected_flags.contains(flag) {
                settings.selected_flags.push(flag.clone());
            }
        } else {
            settings.selected_flags.retain(|f| f != flag);
        }
    }

    write(store, &settings, &[SettingKey::SelectedFlags])?;
    log::debug!("selection now has {} flags", settings.selected_flags.len());
    print_selected(&settings);
    Ok(())
}

fn cmd_selected<S: SettingsStore>(store: &S) -> Result<(), String> {
    print_selected(&load(store)?);
    Ok(())
}

fn print_selected(settings: &Settings) {
    if settings.selected_flags.is_empty() {
        println!("No flags selected.");
        return;
    }
    for flag in &settings.selected_flags {
        println!("{}", render::pill(flag, settings));
    }
}

fn cmd_mode<S: SettingsStore>(store: &mut S, mode: Option<HandlingMode>) -> Result<(), String> {
    let mut settings = load(store)?;
    if let Some(mode) = mode {
        settings.handling_mode = mode;
        write(store, &settings, &[SettingKey::HandlingMode])?;
    }
    println!("{}", settings.handling_mode.as_str());
    Ok(())
}

fn cmd_counts<S: SettingsStore>(store: &S) -> Result<(), String> {
    let counts = stats::sorted_block_counts(&load(store)?);
    if counts.is_empty() {
        println!("No posts blocked yet.");
        return Ok(());
    }
    for (flag, count) in counts {
        println!("{}", render::count_row(&flag, count));
    }
    Ok(())
}

// =============================================================================
// Users
// =============================================================================

fn cmd_block<S: SettingsStore>(store: &mut S, raw: &str, block: bool) -> Result<(), String> {
    let handle = checked_handle(raw)?;
    let settings = if block {
        stats::block_user(store, &handle)
    } else {
        stats::unblock_user(store, &handle)
    }
    .map_err(|e| e.to_string())?;

    let blocked = settings.is_blocked(&handle);
    println!("{}", render::user_row(&handle, settings.user_stats.get(&handle), blocked));
    Ok(())
}

fn cmd_users<S: SettingsStore>(store: &S) -> Result<(), String> {
    let rows = render::user_rows(&load(store)?);
    if rows.is_empty() {
        println!("No users recorded.");
    }
    for row in rows {
        println!("{}", row);
    }
    Ok(())
}

fn cmd_annotate<S: SettingsStore>(store: &mut S, raw: &str, text: &str, nickname: bool) -> Result<(), String> {
    let handle = checked_handle(raw)?;
    let settings = if nickname {
        stats::set_nickname(store, &handle, text)
    } else {
        stats::set_note(store, &handle, text)
    }
    .map_err(|e| e.to_string())?;

    let blocked = settings.is_blocked(&handle);
    println!("{}", render::user_row(&handle, settings.user_stats.get(&handle), blocked));
    Ok(())
}

fn cmd_show<S: SettingsStore>(store: &S) -> Result<(), String> {
    let settings = load(store)?;
    let text = serde_json::to_string_pretty(&settings).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}
