use tracing::error;
use tracing_subscriber::EnvFilter;

use sitelens::cli::{self, Cli};
use sitelens::fetch;

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr only; stdout carries exactly one JSON document.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = Cli::parse(&args);

    let Some(request) = cli.to_request() else {
        emit_input_error(None, "url is required");
        std::process::exit(1);
    };

    if let Err(e) = fetch::validate(&request) {
        emit_input_error(Some(&request.url), &e.to_string());
        std::process::exit(1);
    }

    let result = fetch::fetch(&request).await;

    match cli::render(&result, cli.raw) {
        Ok(out) => println!("{}", out),
        Err(e) => {
            error!("failed to serialize result: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn emit_input_error(url: Option<&str>, message: &str) {
    let doc = serde_json::json!({
        "ok": false,
        "status": 0,
        "url": url,
        "error": message,
    });
    println!("{}", doc);
}
