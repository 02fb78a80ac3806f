//! Loads a schema and a value, both JSON, compiles the schema and
//! round-trips the value through the wire format of the named type.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use structwire::{compile_json, to_buffer, ToObjectConfig, TypeFactoryConfig};

#[derive(Parser)]
#[command(about = "Compile a structwire schema and round-trip a value through it")]
struct Args {
    /// Path to a JSON file holding the declarative schema.
    schema: PathBuf,

    /// Path to a JSON file holding the value to encode.
    value: PathBuf,

    /// Name of the struct in the schema to encode `value` as.
    #[arg(long = "type")]
    type_name: String,

    /// Emit tracing spans describing struct construction order.
    #[arg(long)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let schema_text = std::fs::read_to_string(&args.schema)
        .with_context(|| format!("reading schema file {}", args.schema.display()))?;
    let schema_json: serde_json::Value =
        serde_json::from_str(&schema_text).context("parsing schema file as JSON")?;

    let value_text = std::fs::read_to_string(&args.value)
        .with_context(|| format!("reading value file {}", args.value.display()))?;
    let value_json: serde_json::Value =
        serde_json::from_str(&value_text).context("parsing value file as JSON")?;

    let config = TypeFactoryConfig::new()
        .with_debug(args.debug)
        .with_defaults(false);

    let output = compile_json(&schema_json, &config);
    if !output.errors.is_empty() {
        for error in &output.errors {
            eprintln!("schema error: {error}");
        }
        bail!("{} schema error(s), aborting", output.errors.len());
    }

    let Some(codec) = output.structs.get(&args.type_name) else {
        bail!(
            "no struct named `{}` in schema (have: {})",
            args.type_name,
            output.structs.keys().cloned().collect::<Vec<_>>().join(", ")
        );
    };

    let internal = codec
        .from_object(Some(&value_json))
        .context("value does not match the schema")?;
    let bytes = to_buffer(codec.as_ref(), &internal).context("encoding value to bytes")?;
    println!("{} bytes: {}", bytes.len(), hex::encode(&bytes));

    let decoded =
        structwire::from_buffer(codec.as_ref(), &bytes).context("decoding bytes back to a value")?;
    let round_tripped = codec
        .to_object(Some(&decoded), &ToObjectConfig::default())
        .context("converting decoded value back to JSON")?;

    if round_tripped == value_json {
        println!("round-trip OK");
    } else {
        bail!(
            "round-trip mismatch:\n  input:  {value_json}\n  output: {round_tripped}"
        );
    }

    Ok(())
}
