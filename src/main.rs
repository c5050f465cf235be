mod cli;
mod commands;
mod export;
mod gateway;
mod logging;
mod model;
mod profile;
mod session;
mod settings;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let global = args.global;
    let profile = profile::Profile::resolve(global.profile_dir.clone())?;
    let _logger = logging::init_logging(global.log_level.as_deref(), &profile.log_dir())?;

    let command = args.command.unwrap_or(cli::Command::Tui);
    let result = match command {
        cli::Command::List { file, search } => commands::list(&global, &profile, file, search),
        cli::Command::Add {
            file,
            title,
            content,
        } => commands::add(&global, &profile, file, title, content),
        cli::Command::Edit {
            file,
            note_id,
            title,
            content,
        } => commands::edit(&global, &profile, file, note_id, title, content),
        cli::Command::Delete { file, note_id } => {
            commands::delete(&global, &profile, file, note_id)
        }
        cli::Command::Export { file, dir } => commands::export(&global, &profile, file, dir),
        cli::Command::Settings {
            theme,
            color,
            font_size,
            editor_font_size,
            reset,
        } => commands::settings(
            &global,
            &profile,
            theme,
            color,
            font_size,
            editor_font_size,
            reset,
        ),
        cli::Command::Tui => commands::tui(&global, &profile),
    };
    if let Err(err) = &result {
        log::error!("{err:#}");
    }
    result
}
