use clap::Parser;
use tracing::info;

use todo_list::cli::{init_tracing, resolve_data_dir, Cli};
use todo_list::cmd::*;
use todo_list::db::FileStorage;
use todo_list::store::Store;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Commands::Ui);

    // Completions need neither storage nor logging.
    if let Commands::Completions { shell } = command {
        cmd_completions(shell);
        return Ok(());
    }

    let data_dir = resolve_data_dir(cli.data_dir.as_deref());
    let log_file = matches!(command, Commands::Ui).then(|| data_dir.join("todo.log"));
    init_tracing(cli.verbose, cli.quiet, log_file.as_deref())?;
    info!(data_dir = %data_dir.display(), "starting todo");

    if let Commands::Ui = command {
        return cmd_ui(&data_dir);
    }

    let storage = FileStorage::open(&data_dir)?;
    if let Commands::Backup = command {
        return cmd_backup(&storage);
    }

    let mut store = Store::initialize(storage);
    match command {
        Commands::Add { text } => {
            cmd_add(&mut store, &text)?;
        }
        Commands::List { filter } => cmd_list(&store, filter),
        Commands::Toggle { id } => {
            cmd_toggle(&mut store, &id)?;
        }
        Commands::Delete { id } => {
            cmd_delete(&mut store, &id)?;
        }
        Commands::Counts => cmd_counts(&store),
        Commands::Ui | Commands::Backup | Commands::Completions { .. } => {
            unreachable!("handled above")
        }
    }
    Ok(())
}
