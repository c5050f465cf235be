use crate::gateway::BackendKind;
use crate::settings::ThemeMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "notefile", version, about = "Markdown notes kept in a single JSON file")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// How note files are addressed
    #[arg(long, value_enum, default_value_t = BackendKind::Native, global = true)]
    pub backend: BackendKind,
    /// Directory for settings, storage and logs (defaults to the platform's)
    #[arg(long, global = true)]
    pub profile_dir: Option<PathBuf>,
    /// trace, debug, info, warn, error or off
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List notes, most recently updated first
    List {
        /// Note file
        file: PathBuf,
        /// Only notes whose title or content contains this text
        #[arg(long, short = 's')]
        search: Option<String>,
    },
    /// Add a new note (creates the file when missing)
    Add {
        /// Note file
        file: PathBuf,
        /// Title of the note
        title: String,
        /// Markdown body
        #[arg(long)]
        content: Option<String>,
    },
    /// Edit an existing note
    Edit {
        /// Note file
        file: PathBuf,
        /// Note id to edit
        note_id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New markdown body
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a note
    Delete {
        /// Note file
        file: PathBuf,
        /// Note id to delete
        note_id: String,
    },
    /// Write every note to DIR as a markdown file
    Export {
        /// Note file
        file: PathBuf,
        /// Destination directory
        dir: PathBuf,
    },
    /// Show or change preferences
    Settings {
        #[arg(long, value_enum)]
        theme: Option<ThemeMode>,
        /// Accent color, e.g. #2563eb
        #[arg(long)]
        color: Option<String>,
        /// Interface text size (12-20)
        #[arg(long)]
        font_size: Option<u32>,
        /// Editor text size (12-32)
        #[arg(long)]
        editor_font_size: Option<u32>,
        /// Restore defaults before applying other flags
        #[arg(long)]
        reset: bool,
    },
    /// Launch the interactive TUI
    Tui,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_wiring_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "notefile",
            "list",
            "notes.json",
            "--backend",
            "handle",
            "--search",
            "todo",
        ])
        .unwrap();
        assert_eq!(cli.global.backend, BackendKind::Handle);
        assert!(matches!(
            cli.command,
            Some(Command::List { search: Some(ref s), .. }) if s == "todo"
        ));
    }

    #[test]
    fn no_subcommand_means_tui() {
        let cli = Cli::try_parse_from(["notefile"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.global.backend, BackendKind::Native);
    }
}
