mod app;
mod store;
mod ui;

use anyhow::{Context, Result};
use app::App;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    env,
    fs::File,
    io::{Stdout, stdout},
    path::PathBuf,
    process,
};
use text_highlighter_config::Config;

type Tui = Terminal<CrosstermBackend<Stdout>>;

fn init_logging(to_file: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Warn).parse_default_env();

    // The terminal UI owns stdout and stderr, so log to a file instead
    if to_file {
        let log_path = env::temp_dir().join("text-highlighter.log");
        match File::create(&log_path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Warning: cannot open log file {}: {e}", log_path.display()),
        }
    }
    builder.init();
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let dump = args.iter().skip(1).any(|a| a == "--dump");
    let positional: Vec<&String> = args.iter().skip(1).filter(|a| !a.starts_with("--")).collect();

    init_logging(!dump);

    let config_path = Config::config_path();
    let config = match Config::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };
    log::info!("Config path: {}", config_path.display());

    let document_path = match positional.as_slice() {
        [path] => PathBuf::from(path.as_str()),
        [] => match config.document_path.clone() {
            Some(path) => path,
            None => {
                eprintln!("Error: No document provided and none configured");
                eprintln!("Usage: {} [--dump] <document.md>", args[0]);
                eprintln!("Or set document_path in {}", config_path.display());
                process::exit(1);
            }
        },
        _ => {
            eprintln!("Usage: {} [--dump] [document.md]", args[0]);
            process::exit(1);
        }
    };

    let mut app = App::open(&document_path, config)
        .with_context(|| format!("Cannot open {}", document_path.display()))?;

    if dump {
        eprintln!("{}", app.status);
        let highlighter = app.highlighter();
        println!("{}", highlighter.tree().inner_html(highlighter.anchor()));
        return Ok(());
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }
    if app.is_dirty() {
        println!(
            "Unsaved highlights discarded for {}",
            app.document_path().display()
        );
    }

    Ok(())
}

fn run_app(terminal: &mut Tui, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui::ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Left => app.move_by(-1),
                KeyCode::Right => app.move_by(1),
                KeyCode::Up => app.move_vertical(-1),
                KeyCode::Down => app.move_vertical(1),
                KeyCode::Home => app.line_start(),
                KeyCode::End => app.line_end(),
                KeyCode::Char('v') => app.toggle_selection(),
                KeyCode::Char('h') => app.highlight_selection(),
                KeyCode::Char('x') => app.remove_at_cursor(),
                KeyCode::Char('c') => app.cycle_color(),
                KeyCode::Char('s') => {
                    if let Err(e) = app.save() {
                        log::error!("Save failed: {e:#}");
                        app.status = format!("Save failed: {e}");
                    }
                }
                _ => {}
            }
        }
    }
}
