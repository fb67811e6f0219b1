//! Sneer CLI
//!
//! Thin wrapper around sneer-core for command-line usage. Every command opens
//! the durable store for the local identity, acts, and shuts down.
//!
//! ## Usage
//!
//! ```bash
//! # Show identity and store information
//! sneer info
//!
//! # Print the public key to share with others
//! sneer identity show
//!
//! # Register a contact
//! sneer contact add bob <public_key>
//!
//! # List contacts
//! sneer contact list
//!
//! # Publish a preferred nickname
//! sneer profile set-nickname neo
//!
//! # Publish an arbitrary tuple
//! sneer publish --type tweet --field lang=en "hello"
//!
//! # Query tuples
//! sneer tuples --type tweet
//!
//! # Chat with a contact
//! sneer chat send bob "ping"
//! sneer chat show bob
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sneer_core::{
    PrivateKey, PublicKey, Runtime, SneerAdmin, SneerConfig, Tuple, Value,
};
use tracing::info;

/// File inside the data directory holding the hex-encoded identity seed
const IDENTITY_FILE: &str = "identity.key";

/// Sneer - identity-addressed tuple space
#[derive(Parser)]
#[command(name = "sneer")]
#[command(version = "0.1.0")]
#[command(about = "Sneer - identity-addressed tuple space")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.sneer/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show identity and store information
    Info,

    /// Identity management
    Identity {
        #[command(subcommand)]
        action: IdentityAction,
    },

    /// Contact management
    Contact {
        #[command(subcommand)]
        action: ContactAction,
    },

    /// Profile management
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Group membership
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },

    /// Publish a tuple
    Publish {
        /// Tuple type, e.g. "tweet"
        #[arg(short = 't', long = "type")]
        tuple_type: String,

        /// Public key allowed to see the tuple (default: open)
        #[arg(short, long)]
        audience: Option<String>,

        /// Field as name=value (repeatable)
        #[arg(short, long = "field")]
        fields: Vec<String>,

        /// Payload (omit for a marker tuple)
        payload: Option<String>,
    },

    /// List tuples visible to this identity
    Tuples {
        /// Only tuples of this type
        #[arg(short = 't', long = "type")]
        tuple_type: Option<String>,

        /// Only tuples by this author
        #[arg(short, long)]
        author: Option<String>,

        /// Only tuples authored locally
        #[arg(short, long)]
        local: bool,
    },

    /// Conversations with contacts
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },
}

#[derive(Subcommand)]
enum IdentityAction {
    /// Show the public key
    Show,
}

#[derive(Subcommand)]
enum ContactAction {
    /// Add a contact, or rename it if the key is already a contact
    Add {
        /// Local nickname
        nickname: String,
        /// Base58 public key
        public_key: String,
    },
    /// List contacts
    List,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Publish a preferred nickname
    SetNickname { nickname: String },
    /// Show a profile (default: own)
    Show {
        /// Base58 public key
        public_key: Option<String>,
    },
}

#[derive(Subcommand)]
enum GroupAction {
    /// Create a new group, join it and print its key
    Create,
    /// Join a group given its hex-encoded private key
    Join { key: String },
    /// List joined groups
    List,
}

#[derive(Subcommand)]
enum ChatAction {
    /// Send a message to a contact
    Send { nickname: String, message: String },
    /// Show the conversation with a contact
    Show { nickname: String },
    /// List conversations
    List,
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default data directory (~/.sneer/data)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sneer")
        .join("data")
}

/// Load the identity seed from the data directory, generating it on first use
fn load_or_create_identity(data_dir: &Path) -> Result<PrivateKey> {
    let path = data_dir.join(IDENTITY_FILE);
    if path.exists() {
        let hex_seed = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let seed = hex::decode(hex_seed.trim()).context("Identity file is not valid hex")?;
        return Ok(PrivateKey::from_bytes(&seed)?);
    }

    std::fs::create_dir_all(data_dir)?;
    let key = PrivateKey::generate();
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    // Owner-only: the file holds the private seed
    #[cfg(unix)]
    std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);
    let mut file = options
        .open(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(hex::encode(key.to_bytes()).as_bytes())?;
    info!(path = %path.display(), "Generated new identity");
    Ok(key)
}

fn parse_key(s: &str) -> Result<PublicKey> {
    s.parse()
        .map_err(|e| anyhow::anyhow!("Invalid public key '{}': {}", s, e))
}

/// Parse `name=value`; integers and booleans keep their type
fn parse_field(s: &str) -> Result<(String, Value)> {
    let (name, raw) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Field must be name=value (got '{}')", s))?;
    let value = if let Ok(i) = raw.parse::<i64>() {
        Value::Int(i)
    } else if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else {
        Value::from(raw)
    };
    Ok((name.to_string(), value))
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn print_tuple(sneer: &Runtime, tuple: &Tuple) {
    let author = sneer.produce_party(*tuple.author());
    let payload = tuple
        .payload()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  [{}] {} by {}: {}",
        format_timestamp(tuple.timestamp()),
        tuple.tuple_type(),
        sneer.party_name(&author),
        payload
    );
    for (name, value) in tuple.fields() {
        println!("      {} = {}", name, value);
    }
}

fn contact_named(sneer: &Runtime, nickname: &str) -> Result<std::sync::Arc<sneer_core::Contact>> {
    sneer
        .find_contact_by_nickname(nickname)
        .ok_or_else(|| anyhow::anyhow!("No contact named '{}'", nickname))
}

fn run(admin: &SneerAdmin, data_dir: &Path, command: Commands) -> Result<()> {
    let sneer = admin.sneer();

    match command {
        Commands::Info => {
            let tuples = sneer.tuple_space().filter().collect();
            println!("Sneer v0.1.0");
            println!();
            println!("Identity:");
            println!("  Public key: {}", sneer.self_party().public_key());
            println!("  Name: {}", sneer.party_name(sneer.self_party()));
            println!();
            println!("Store:");
            println!("  Data directory: {}", data_dir.display());
            println!("  Tuples: {}", tuples.len());
            println!("  Contacts: {}", sneer.contacts().current().len());
            println!("  Groups: {}", sneer.groups().len());
        }

        Commands::Identity { action } => match action {
            IdentityAction::Show => {
                println!("{}", admin.private_key().public_key());
            }
        },

        Commands::Contact { action } => match action {
            ContactAction::Add {
                nickname,
                public_key,
            } => {
                let party = sneer.produce_party(parse_key(&public_key)?);
                let contact = sneer.add_contact(&nickname, &party)?;
                println!("Contact saved: {}", contact.current_nickname());
                println!("  Key: {}", party.public_key());
            }

            ContactAction::List => {
                let contacts = sneer.contacts().current();
                if contacts.is_empty() {
                    println!("No contacts in your list.");
                } else {
                    println!("Contacts ({}):", contacts.len());
                    for contact in contacts {
                        println!(
                            "  {} {}",
                            contact.current_nickname(),
                            contact.party().public_key()
                        );
                    }
                }
            }
        },

        Commands::Profile { action } => match action {
            ProfileAction::SetNickname { nickname } => {
                sneer
                    .profile_for(sneer.self_party())
                    .set_preferred_nickname(&nickname)?;
                println!("Preferred nickname set to: {}", nickname);
            }

            ProfileAction::Show { public_key } => {
                let party = match public_key {
                    Some(key) => sneer.produce_party(parse_key(&key)?),
                    None => sneer.self_party().clone(),
                };
                let profile = sneer.profile_for(&party);
                println!("Profile of {}:", party.public_key());
                match profile.current_preferred_nickname() {
                    Some(nickname) => println!("  Preferred nickname: {}", nickname),
                    None => println!("  Preferred nickname: (not received)"),
                }
            }
        },

        Commands::Group { action } => match action {
            GroupAction::Create => {
                let group = PrivateKey::generate();
                sneer.join_group(&group)?;
                println!("Group created: {}", group.public_key());
                println!("  Key: {}", hex::encode(group.to_bytes()));
            }

            GroupAction::Join { key } => {
                let seed = hex::decode(key.trim()).context("Group key is not valid hex")?;
                let group = PrivateKey::from_bytes(&seed)?;
                sneer.join_group(&group)?;
                println!("Joined group: {}", group.public_key());
            }

            GroupAction::List => {
                let groups = sneer.groups();
                if groups.is_empty() {
                    println!("Not a member of any group.");
                } else {
                    for group in groups {
                        println!("  {}", group);
                    }
                }
            }
        },

        Commands::Publish {
            tuple_type,
            audience,
            fields,
            payload,
        } => {
            let mut publisher = sneer.tuple_space().publisher().tuple_type(tuple_type);
            if let Some(audience) = audience {
                publisher = publisher.audience(parse_key(&audience)?);
            }
            for field in &fields {
                let (name, value) = parse_field(field)?;
                publisher = publisher.field(name, value);
            }
            let tuple = match payload {
                Some(payload) => publisher.publish(payload)?,
                None => publisher.publish_empty()?,
            };
            println!("Published {}", tuple.id()?);
        }

        Commands::Tuples {
            tuple_type,
            author,
            local,
        } => {
            let mut filter = sneer.tuple_space().filter();
            if let Some(tuple_type) = tuple_type {
                filter = filter.tuple_type(tuple_type);
            }
            if let Some(author) = author {
                filter = filter.author(parse_key(&author)?);
            }
            if local {
                filter = filter.local_tuples();
            }

            let tuples = filter.collect();
            if tuples.is_empty() {
                println!("No tuples.");
            } else {
                println!("Tuples ({}):", tuples.len());
                for tuple in &tuples {
                    print_tuple(sneer, tuple);
                }
            }
        }

        Commands::Chat { action } => match action {
            ChatAction::Send { nickname, message } => {
                let contact = contact_named(sneer, &nickname)?;
                let conversation = sneer
                    .conversation_with(contact.party())
                    .ok_or_else(|| anyhow::anyhow!("No conversation with '{}'", nickname))?;
                conversation.send_message(message)?;
                println!("Sent to {}", nickname);
            }

            ChatAction::Show { nickname } => {
                let contact = contact_named(sneer, &nickname)?;
                let conversation = sneer
                    .conversation_with(contact.party())
                    .ok_or_else(|| anyhow::anyhow!("No conversation with '{}'", nickname))?;
                let messages = conversation.messages().current();
                if messages.is_empty() {
                    println!("No messages with {}.", nickname);
                }
                for message in messages {
                    let sender = if message.is_own() { "me" } else { nickname.as_str() };
                    let content = message
                        .content()
                        .map(|c| c.to_string())
                        .unwrap_or_default();
                    println!(
                        "  [{}] {}: {}",
                        format_timestamp(message.timestamp()),
                        sender,
                        content
                    );
                }
            }

            ChatAction::List => {
                let conversations = sneer.conversations().current();
                if conversations.is_empty() {
                    println!("No conversations.");
                }
                for conversation in conversations {
                    println!("  {}", sneer.party_name(conversation.party()));
                }
            }
        },
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let key = load_or_create_identity(&data_dir)?;
    let admin = SneerAdmin::initialize(key, SneerConfig::durable(&data_dir), None)?;

    let result = run(&admin, &data_dir, cli.command);
    admin.shutdown()?;
    result
}
