use anyhow::Result;

// Print the OpenAPI document as JSON.
fn main() -> Result<()> {
    let spec = ovpanel::api::openapi();
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}
