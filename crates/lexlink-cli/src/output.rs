//! Output formatting for the CLI.

use clap::ValueEnum;
use serde_json::json;

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a success message.
pub fn print_success(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => println!("{}", status_line("success", message)),
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => eprintln!("{}", status_line("error", message)),
    }
}

/// Print a labelled row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<12} {}", format!("{}:", label), value);
}

// Messages carry server-supplied text, including quotes; the object has to
// be built, not spliced into a template.
fn status_line(status: &str, message: &str) -> String {
    json!({ "status": status, "message": message }).to_string()
}
