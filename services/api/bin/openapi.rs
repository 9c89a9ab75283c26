use anyhow::Context;
use switchboard_api::router::ApiDoc;
use utoipa::OpenApi;

/// Writes the OpenAPI specification to disk so it can be committed or fed to
/// client generators without starting the server. Takes the output path as
/// the first argument, defaulting to `openapi.json`.
fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());

    let spec = ApiDoc::openapi()
        .to_pretty_json()
        .context("Failed to serialize the OpenAPI document")?;
    std::fs::write(&path, spec).with_context(|| format!("Failed to write '{path}'"))?;

    println!("OpenAPI specification written to {path}");
    Ok(())
}
