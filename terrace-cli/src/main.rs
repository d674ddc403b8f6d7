use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use terrace_core::differ::{Diff, diff};
use terrace_core::provider::Provider;
use terrace_core::resource::{Resource, State, Value, attributes_from_json};
use terrace_core::schema::ResourceSchema;
use terrace_provider_aws::AwsProvider;
use terrace_provider_aws::config::ProviderConfig;
use terrace_provider_aws::schemas;

#[derive(Parser)]
#[command(name = "terrace")]
#[command(about = "Drive single AWS provider operations from the command line", long_about = None)]
struct Cli {
    /// Provider configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// AWS region, overriding the configuration file
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List resource types, or show the schema of one
    Schema {
        resource_type: Option<String>,
    },
    /// Validate attributes against a resource schema
    Validate {
        resource_type: String,
        /// Attributes file (JSON object)
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Read the current state of a resource
    Read {
        resource_type: String,
        #[arg(long)]
        id: String,
    },
    /// Create a resource
    Create {
        resource_type: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Update a resource in place
    Update {
        resource_type: String,
        #[arg(long)]
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Delete a resource
    Delete {
        resource_type: String,
        #[arg(long)]
        id: String,
    },
    /// Query a data source
    Data {
        resource_type: String,
        /// Query arguments file (JSON object)
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Schema { resource_type } => run_schema(resource_type.as_deref()),
        Commands::Validate {
            resource_type,
            file,
        } => run_validate(&resource_type, &file),
        command => run_provider_command(cli.config.as_deref(), cli.region, command).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_schema(resource_type: Option<&str>) -> Result<(), String> {
    let Some(resource_type) = resource_type else {
        let mut names: Vec<String> = schemas::all_schemas()
            .iter()
            .map(|s| {
                if s.data_source {
                    format!("{} (data source)", s.resource_type)
                } else {
                    s.resource_type.clone()
                }
            })
            .collect();
        names.sort();
        for name in names {
            println!("{}", name);
        }
        return Ok(());
    };

    let matching: Vec<ResourceSchema> = schemas::all_schemas()
        .into_iter()
        .filter(|s| s.resource_type == resource_type)
        .collect();
    if matching.is_empty() {
        return Err(format!("Unknown resource type: {}", resource_type));
    }
    for schema in &matching {
        print_json(&schema_to_json(schema))?;
    }
    Ok(())
}

fn schema_to_json(schema: &ResourceSchema) -> serde_json::Value {
    let mut names: Vec<&String> = schema.attributes.keys().collect();
    names.sort();
    let attributes: serde_json::Map<String, serde_json::Value> = names
        .into_iter()
        .map(|name| {
            let attr = &schema.attributes[name];
            let mut flags = Vec::new();
            if attr.required {
                flags.push("required");
            }
            if attr.computed {
                flags.push("computed");
            }
            if attr.force_new {
                flags.push("force_new");
            }
            if attr.sensitive {
                flags.push("sensitive");
            }
            (
                name.clone(),
                serde_json::json!({
                    "type": attr.attr_type.to_string(),
                    "flags": flags,
                    "description": attr.description,
                }),
            )
        })
        .collect();
    serde_json::json!({
        "type": schema.resource_type,
        "data_source": schema.data_source,
        "description": schema.description,
        "attributes": attributes,
    })
}

fn run_validate(resource_type: &str, file: &Path) -> Result<(), String> {
    let schema = find_schema(resource_type, false)?;
    let attributes = load_attributes(file)?;
    validate_attributes(&schema, &attributes)?;
    println!("{}", "Configuration is valid.".green().bold());
    Ok(())
}

async fn run_provider_command(
    config: Option<&Path>,
    region: Option<String>,
    command: Commands,
) -> Result<(), String> {
    let mut provider_config = match config {
        Some(path) => ProviderConfig::from_file(path).map_err(|e| e.to_string())?,
        None => ProviderConfig::default(),
    };
    if let Some(region) = region {
        provider_config = provider_config.with_region(region);
    }
    let provider = AwsProvider::new(&provider_config)
        .await
        .map_err(|e| e.to_string())?;
    log::debug!("Provider ready in {}", provider.region());

    match command {
        Commands::Read { resource_type, id } => {
            find_schema(&resource_type, false)?;
            let resource = Resource::new(&resource_type, "cli");
            let state = provider
                .read(&resource.id, &id)
                .await
                .map_err(|e| e.to_string())?;
            if !state.exists {
                println!("{}", format!("{} {} does not exist.", resource_type, id).yellow());
            }
            print_state(&state)
        }
        Commands::Create {
            resource_type,
            file,
        } => {
            let resource = load_resource(&resource_type, &file, false)?;
            println!("{} {}", "+".green().bold(), resource_type);
            let state = provider
                .create(&resource)
                .await
                .map_err(|e| e.to_string())?;
            print_state(&state)
        }
        Commands::Update {
            resource_type,
            id,
            file,
        } => {
            let resource = load_resource(&resource_type, &file, false)?;
            let schema = find_schema(&resource_type, false)?;
            let current = provider
                .read(&resource.id, &id)
                .await
                .map_err(|e| e.to_string())?;

            match diff(&resource, &current, &schema) {
                Diff::NoChange(_) => {
                    println!("{}", "No changes.".green());
                    print_state(&current)
                }
                Diff::Create(_) => Err(format!(
                    "{} {} does not exist; use create instead",
                    resource_type, id
                )),
                Diff::Replace {
                    changed_attributes, ..
                } => Err(format!(
                    "changing {} requires replacing {} {}",
                    changed_attributes.join(", "),
                    resource_type,
                    id
                )),
                Diff::Update {
                    changed_attributes, ..
                } => {
                    print_changes(&current, &resource, &changed_attributes);
                    let state = provider
                        .update(&resource.id, &id, &current, &resource)
                        .await
                        .map_err(|e| e.to_string())?;
                    print_state(&state)
                }
            }
        }
        Commands::Delete { resource_type, id } => {
            find_schema(&resource_type, false)?;
            let resource = Resource::new(&resource_type, "cli");
            provider
                .delete(&resource.id, &id)
                .await
                .map_err(|e| e.to_string())?;
            println!("{} {} {}", "-".red().bold(), resource_type, id);
            Ok(())
        }
        Commands::Data {
            resource_type,
            file,
        } => {
            let query = load_resource(&resource_type, &file, true)?;
            let state = provider
                .read_data_source(&query)
                .await
                .map_err(|e| e.to_string())?;
            print_state(&state)
        }
        Commands::Schema { .. } | Commands::Validate { .. } => Ok(()),
    }
}

fn find_schema(resource_type: &str, data_source: bool) -> Result<ResourceSchema, String> {
    schemas::find_schema(resource_type, data_source).ok_or_else(|| {
        let kind = if data_source { "data source" } else { "resource type" };
        format!("Unknown {}: {}", kind, resource_type)
    })
}

fn load_attributes(file: &Path) -> Result<HashMap<String, Value>, String> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    parse_attributes(&content).map_err(|e| format!("{}: {}", file.display(), e))
}

fn parse_attributes(content: &str) -> Result<HashMap<String, Value>, String> {
    let json: serde_json::Value =
        serde_json::from_str(content).map_err(|e| format!("invalid JSON: {}", e))?;
    attributes_from_json(&json).ok_or_else(|| "expected a JSON object".to_string())
}

fn validate_attributes(
    schema: &ResourceSchema,
    attributes: &HashMap<String, Value>,
) -> Result<(), String> {
    schema.validate(attributes).map_err(|errors| {
        errors
            .iter()
            .map(|e| format!("{}: {}", schema.resource_type, e))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

/// Validated desired state with defaults filled in and values canonicalized
fn prepare_resource(
    schema: &ResourceSchema,
    name: &str,
    mut attributes: HashMap<String, Value>,
) -> Result<Resource, String> {
    validate_attributes(schema, &attributes)?;
    schema.apply_defaults(&mut attributes);
    schema.normalize(&mut attributes);
    Ok(Resource::new(&schema.resource_type, name)
        .with_attributes(attributes)
        .with_read_only(schema.data_source))
}

fn load_resource(resource_type: &str, file: &Path, data_source: bool) -> Result<Resource, String> {
    let schema = find_schema(resource_type, data_source)?;
    let attributes = load_attributes(file)?;
    let name = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("cli");
    prepare_resource(&schema, name, attributes)
}

fn print_changes(current: &State, desired: &Resource, changed: &[String]) {
    println!("{} {}", "~".yellow().bold(), desired.id.resource_type);
    for name in changed {
        let from = current
            .attributes
            .get(name)
            .map(format_value)
            .unwrap_or_else(|| "(none)".to_string());
        let to = desired
            .attributes
            .get(name)
            .map(format_value)
            .unwrap_or_else(|| "(none)".to_string());
        println!("    {}: {} {} {}", name.cyan(), from.red(), "->".dimmed(), to.green());
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut strs: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            strs.sort();
            format!("{{{}}}", strs.join(", "))
        }
    }
}

fn print_state(state: &State) -> Result<(), String> {
    print_json(&state.to_json())
}

fn print_json(json: &serde_json::Value) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(json).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_attributes_requires_object() {
        let attrs = parse_attributes(r#"{"name": "orders", "tags": {"team": "core"}}"#).unwrap();
        assert_eq!(attrs.get("name"), Some(&Value::String("orders".to_string())));
        assert!(parse_attributes("[1, 2]").is_err());
        assert!(parse_attributes("{").is_err());
    }

    #[test]
    fn prepare_normalizes_engine_type() {
        let schema = find_schema("mq.configuration", false).unwrap();
        let attrs = parse_attributes(
            r#"{"name": "orders", "engine_type": "activemq", "engine_version": "5.17.6"}"#,
        )
        .unwrap();
        let resource = prepare_resource(&schema, "orders", attrs).unwrap();
        assert_eq!(
            resource.attributes.get("engine_type"),
            Some(&Value::String("ACTIVEMQ".to_string()))
        );
        assert!(!resource.read_only);
    }

    #[test]
    fn prepare_rejects_invalid_attributes() {
        let schema = find_schema("appconfig.application", false).unwrap();
        let attrs = parse_attributes(r#"{"description": "no name"}"#).unwrap();
        assert!(prepare_resource(&schema, "app", attrs).is_err());
    }

    #[test]
    fn unknown_types_are_reported() {
        assert!(find_schema("s3.bucket", false).is_err());
        assert!(find_schema("mq.broker", true).is_ok());
    }

    #[test]
    fn schema_json_lists_flags() {
        let schema = find_schema("mq.configuration", false).unwrap();
        let json = schema_to_json(&schema);
        let name = &json["attributes"]["name"];
        assert!(
            name["flags"]
                .as_array()
                .unwrap()
                .contains(&serde_json::json!("required"))
        );
    }

    #[test]
    fn format_value_sorts_map_keys() {
        let value = Value::Map(HashMap::from([
            ("b".to_string(), Value::Int(2)),
            ("a".to_string(), Value::Bool(true)),
        ]));
        assert_eq!(format_value(&value), "{a: true, b: 2}");
    }
}
