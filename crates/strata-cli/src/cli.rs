use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Strata: inspect and edit stored configuration data",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Backend configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the JSON backend rooted at this directory, overriding --config
    #[arg(long, global = true)]
    pub data_path: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the value stored at an address
    Get(AddressArgs),
    /// Store a value at an address
    Set(SetArgs),
    /// Remove the value stored at an address
    Clear(AddressArgs),
    /// List every record of a category
    List(ListArgs),
    /// Move data stored under a legacy identifier to an instance
    Migrate(MigrateArgs),
}

#[derive(Args, Clone, Debug)]
pub struct AddressArgs {
    /// Owner namespace
    #[arg(short, long)]
    pub owner: String,
    /// Owner instance id
    #[arg(short, long, default_value = "0")]
    pub instance: String,
    /// Category: global, guild, channel, role, user, member, or a custom name
    #[arg(short, long, default_value = "global")]
    pub category: String,
    /// Primary key; repeat for categories taking several
    #[arg(short = 'k', long = "key")]
    pub keys: Vec<String>,
    /// Nested key below the record; repeat to go deeper
    #[arg(short = 'p', long = "path")]
    pub path: Vec<String>,
}

#[derive(Args)]
pub struct SetArgs {
    #[command(flatten)]
    pub address: AddressArgs,
    /// Value as JSON; anything that does not parse is stored as a string
    #[arg(long)]
    pub value: String,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(short, long)]
    pub owner: String,
    #[arg(short, long, default_value = "0")]
    pub instance: String,
    #[arg(short, long)]
    pub category: String,
    /// Leading primary keys narrowing the listing
    #[arg(short = 'k', long = "key")]
    pub keys: Vec<String>,
}

#[derive(Args)]
pub struct MigrateArgs {
    #[arg(short, long)]
    pub owner: String,
    #[arg(short, long)]
    pub instance: String,
    /// Identifier the data was stored under
    #[arg(long)]
    pub from: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get_defaults() {
        let cli = Cli::try_parse_from(["strata", "get", "--owner", "Mod"]).unwrap();
        if let Command::Get(args) = cli.command {
            assert_eq!(args.owner, "Mod");
            assert_eq!(args.instance, "0");
            assert_eq!(args.category, "global");
            assert!(args.keys.is_empty());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_member_address() {
        let cli = Cli::try_parse_from([
            "strata", "get", "-o", "Mod", "-c", "member", "-k", "1", "-k", "2", "-p", "warnings",
        ])
        .unwrap();
        if let Command::Get(args) = cli.command {
            assert_eq!(args.keys, vec!["1", "2"]);
            assert_eq!(args.path, vec!["warnings"]);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_set() {
        let cli = Cli::try_parse_from([
            "strata", "set", "--owner", "Mod", "--path", "prefix", "--value", "\"!\"",
        ])
        .unwrap();
        if let Command::Set(args) = cli.command {
            assert_eq!(args.address.path, vec!["prefix"]);
            assert_eq!(args.value, "\"!\"");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn set_requires_value() {
        assert!(Cli::try_parse_from(["strata", "set", "--owner", "Mod"]).is_err());
    }

    #[test]
    fn parse_migrate() {
        let cli = Cli::try_parse_from([
            "strata", "migrate", "-o", "Mod", "-i", "5", "--from", "123",
        ])
        .unwrap();
        if let Command::Migrate(args) = cli.command {
            assert_eq!(args.instance, "5");
            assert_eq!(args.from, 123);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "strata", "list", "-o", "Mod", "-c", "guild", "--format", "json", "--data-path", "/tmp/x", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.data_path, Some(PathBuf::from("/tmp/x")));
    }
}
