use anyhow::Result;
use std::io::{self, BufRead, Write};

use crate::app::App;
use crate::output;

const HELP: &str = "  /stats    session and per-provider totals
  /history  recent calls
  /info     model and session details
  /export   write the history to CSV
  /quit     leave";

/// Read one line from stdin; `None` on EOF.
fn read_prompt() -> Result<Option<String>> {
    eprint!("  \x1b[1;32mobservatory>\x1b[0m ");
    io::stderr().flush().ok();

    let stdin = io::stdin();
    let mut buf = Vec::new();
    match stdin.lock().read_until(b'\n', &mut buf) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(String::from_utf8_lossy(&buf).trim().to_string())),
        Err(e) => Err(anyhow::anyhow!("Input error: {e}")),
    }
}

pub async fn run(app: &mut App) -> Result<()> {
    let info = app.adapter.describe();
    eprintln!();
    output::render_model_info(&info);
    eprintln!("\x1b[90m  Type a prompt, or /help for commands.\x1b[0m\n");

    while let Some(line) = read_prompt()? {
        match line.as_str() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => eprintln!("{HELP}"),
            "/stats" => {
                output::render_session_summary(&app.history.session_summary());
                output::render_provider_summary(&app.history.provider_summary());
            }
            "/history" => output::render_history(&app.history),
            "/info" => output::render_model_info(&app.adapter.describe()),
            "/export" => match app.export() {
                Ok(path) => eprintln!("\x1b[32m  Exported to {}\x1b[0m", path.display()),
                Err(e) => eprintln!("\x1b[31;1m[export failed]\x1b[0m {e}"),
            },
            cmd if cmd.starts_with('/') => {
                eprintln!("\x1b[33m  Unknown command {cmd}\x1b[0m\n{HELP}");
            }
            prompt => {
                match app.ask(prompt).await {
                    Ok(result) => {
                        output::render_result(&result, false);
                        let alerts = app.alerts(Some(result.metadata.performance.response_time));
                        output::render_alerts(&alerts);
                    }
                    Err(e) => {
                        eprintln!("\x1b[31;1m[error]\x1b[0m {e}");
                        output::render_alerts(&app.alerts(None));
                    }
                }
                eprintln!();
            }
        }
    }

    Ok(())
}
