use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde_json::{json, Value as JsonValue};
use strata_core::{Config, ConfigContext, Group};
use strata_driver::{BackendConfig, DriverFactory};
use strata_types::{Category, PathAddress};
use tracing::{debug, warn};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let backend = backend(&cli).await?;
    if backend == BackendConfig::Memory {
        warn!("using the in-memory backend; nothing is read from or kept on disk");
    }
    let drivers = backend.into_factory();
    match cli.command {
        Command::Get(args) => {
            let (address, value) = cmd_get(&ConfigContext::new(drivers), &args).await?;
            print_value(&cli.format, &address, value.as_ref())
        }
        Command::Set(args) => {
            let address = cmd_set(&ConfigContext::new(drivers), &args).await?;
            print_done(&cli.format, "set", &address)
        }
        Command::Clear(args) => {
            let address = cmd_clear(&ConfigContext::new(drivers), &args).await?;
            print_done(&cli.format, "cleared", &address)
        }
        Command::List(args) => {
            let records = cmd_list(&ConfigContext::new(drivers), &args).await?;
            print_records(&cli.format, &args, records)
        }
        Command::Migrate(args) => {
            cmd_migrate(drivers.as_ref(), &args).await?;
            match cli.format {
                OutputFormat::Json => println!(
                    "{}",
                    json!({"owner": args.owner, "from": args.from, "to": args.instance})
                ),
                OutputFormat::Text => println!(
                    "{} Migrated {} data from {} to {}",
                    "✓".green().bold(),
                    args.owner.bold(),
                    args.from.to_string().yellow(),
                    args.instance.yellow()
                ),
            }
            Ok(())
        }
    }
}

async fn backend(cli: &Cli) -> anyhow::Result<BackendConfig> {
    if let Some(data_path) = &cli.data_path {
        return Ok(BackendConfig::Json {
            data_path: data_path.clone(),
        });
    }
    match &cli.config {
        Some(path) => BackendConfig::load(path)
            .await
            .with_context(|| format!("loading backend configuration {}", path.display())),
        None => Ok(BackendConfig::default()),
    }
}

/// Map a category given on the command line to a [`Category`].
///
/// Built-in names match case-insensitively and `channel` is accepted for
/// text channels; anything else is a custom category.
fn parse_category(name: &str) -> anyhow::Result<Category> {
    if name.eq_ignore_ascii_case("channel") {
        return Ok(Category::Channel);
    }
    if let Some(builtin) = Category::BUILTIN
        .into_iter()
        .find(|c| c.name().eq_ignore_ascii_case(name))
    {
        return Ok(builtin);
    }
    Ok(Category::custom(name)?)
}

/// Root group for a command-line address. Custom categories are declared
/// on the fly with `arity` primary keys.
fn open_group(
    config: &Config,
    category: &str,
    keys: &[String],
    arity: usize,
) -> anyhow::Result<Group> {
    let category = parse_category(category)?;
    if let Category::Custom(name) = &category {
        config.init_custom(name, arity.max(1))?;
    }
    Ok(config.root_group(&category, keys.to_vec())?)
}

async fn open_store(ctx: &ConfigContext, owner: &str, instance: &str) -> anyhow::Result<Arc<Config>> {
    let config = ctx.get_instance(owner, instance, false).await?;
    debug!(owner, instance, backend = config.driver().backend_name(), "store opened");
    Ok(config)
}

fn path_refs(path: &[String]) -> Vec<&str> {
    path.iter().map(String::as_str).collect()
}

async fn cmd_get(
    ctx: &ConfigContext,
    args: &AddressArgs,
) -> anyhow::Result<(PathAddress, Option<JsonValue>)> {
    let config = open_store(ctx, &args.owner, &args.instance).await?;
    let group = open_group(&config, &args.category, &args.keys, args.keys.len())?;
    let path = path_refs(&args.path);
    let value = group.get_raw(&path).await?;
    Ok((group.address().child_path(path), value))
}

async fn cmd_set(ctx: &ConfigContext, args: &SetArgs) -> anyhow::Result<PathAddress> {
    let address = &args.address;
    let config = open_store(ctx, &address.owner, &address.instance).await?;
    let group = open_group(&config, &address.category, &address.keys, address.keys.len())?;
    let value = serde_json::from_str(&args.value)
        .unwrap_or_else(|_| JsonValue::String(args.value.clone()));
    let path = path_refs(&address.path);
    group.set_raw(&path, &value).await?;
    Ok(group.address().child_path(path))
}

async fn cmd_clear(ctx: &ConfigContext, args: &AddressArgs) -> anyhow::Result<PathAddress> {
    let config = open_store(ctx, &args.owner, &args.instance).await?;
    let group = open_group(&config, &args.category, &args.keys, args.keys.len())?;
    let path = path_refs(&args.path);
    group.clear_raw(&path).await?;
    Ok(group.address().child_path(path))
}

async fn cmd_list(
    ctx: &ConfigContext,
    args: &ListArgs,
) -> anyhow::Result<serde_json::Map<String, JsonValue>> {
    let config = open_store(ctx, &args.owner, &args.instance).await?;
    let category = parse_category(&args.category)?;
    if let Category::Custom(name) = &category {
        config.init_custom(name, args.keys.len() + 1)?;
    }
    Ok(config.all_for_category(&category, args.keys.clone()).await?)
}

async fn cmd_migrate(drivers: &dyn DriverFactory, args: &MigrateArgs) -> anyhow::Result<()> {
    let driver = drivers.driver_for(&args.owner, &args.instance).await?;
    driver.migrate_identifier(args.from).await?;
    Ok(())
}

fn print_value(
    format: &OutputFormat,
    address: &PathAddress,
    value: Option<&JsonValue>,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", json!({"address": address.to_string(), "value": value}));
        }
        OutputFormat::Text => match value {
            Some(value) => println!(
                "{} = {}",
                address.to_string().bold(),
                serde_json::to_string_pretty(value)?
            ),
            None => println!("{} {}", address.to_string().bold(), "(not set)".dimmed()),
        },
    }
    Ok(())
}

fn print_done(format: &OutputFormat, action: &str, address: &PathAddress) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", json!({"address": address.to_string(), "action": action})),
        OutputFormat::Text => println!("{} {} {}", "✓".green().bold(), action, address.to_string().bold()),
    }
    Ok(())
}

fn print_records(
    format: &OutputFormat,
    args: &ListArgs,
    records: serde_json::Map<String, JsonValue>,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", JsonValue::Object(records)),
        OutputFormat::Text if records.is_empty() => {
            println!("No {} records for {}.", args.category, args.owner.bold());
        }
        OutputFormat::Text => {
            for (key, record) in &records {
                println!("{}  {}", key.yellow().bold(), serde_json::to_string(record)?);
            }
        }
    }
    Ok(())
}
