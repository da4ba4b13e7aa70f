use anyhow::Result;

use crate::app::App;
use crate::output;
use crate::OutputFormat;

pub async fn run(app: &mut App, prompt: String, output_format: OutputFormat, quiet: bool) -> Result<()> {
    let outcome = app.ask(&prompt).await;

    match output_format {
        OutputFormat::Text => {
            let result = outcome?;
            output::render_result(&result, quiet);
            let alerts = app.alerts(Some(result.metadata.performance.response_time));
            if !quiet {
                output::render_alerts(&alerts);
            }
        }
        OutputFormat::Json => {
            let output = match outcome {
                Ok(result) => {
                    let alerts = app.alerts(Some(result.metadata.performance.response_time));
                    serde_json::json!({
                        "response": result.response,
                        "metadata": result.metadata,
                        "alerts": alerts,
                    })
                }
                Err(e) => serde_json::json!({
                    "error": e.to_string(),
                    "attempts": e.attempts(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
