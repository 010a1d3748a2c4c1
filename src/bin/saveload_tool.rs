use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use saveload::{
    CoordinatorConfig, DataStorage, FileFormat, FileStorage, FileStorageConfig, OperationStatus,
    SnapshotCoordinator, storage_key,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "saveload-tool")]
#[command(about = "Inspect and maintain saveload storage files")]
struct Cli {
    /// Storage document to operate on
    #[arg(long)]
    file: PathBuf,

    /// Encoding of the document. Inferred from the extension when omitted.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Identity of the slot registry record
    #[arg(long, default_value = "slots")]
    registry_id: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Msgpack,
}

impl From<FormatArg> for FileFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Json => FileFormat::Json,
            FormatArg::Msgpack => FileFormat::MessagePack,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List every slot holding a save
    Slots,
    /// List identities stored in a slot
    Keys { slot: u32 },
    /// Print the stored payload of one identity
    Show {
        slot: u32,
        identity: String,
        #[arg(long)]
        shared: bool,
    },
    /// Delete a slot and its per-slot data
    Delete { slot: u32 },
    /// Print the most recently saved slot
    Latest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = FileStorageConfig::new(&cli.file).create_dirs(false);
    if let Some(format) = cli.format {
        config = config.format(format.into());
    }
    let storage = Arc::new(
        FileStorage::open(config)
            .await
            .with_context(|| format!("Failed to open storage '{}'", cli.file.display()))?,
    );
    let coordinator = SnapshotCoordinator::open(
        storage.clone(),
        CoordinatorConfig::new().slot_registry_id(&cli.registry_id),
    )
    .await
    .context("Failed to read slot registry")?;

    match cli.command {
        Command::Slots => list_slots(&coordinator),
        Command::Keys { slot } => list_keys(&coordinator, slot),
        Command::Show {
            slot,
            identity,
            shared,
        } => show_payload(storage.as_ref(), slot, &identity, shared).await,
        Command::Delete { slot } => delete_slot(&coordinator, slot).await,
        Command::Latest => {
            match coordinator.latest_slot()? {
                Some(slot) => println!("{}", slot),
                None => println!("no saves"),
            }
            Ok(())
        }
    }
}

fn list_slots(coordinator: &SnapshotCoordinator) -> Result<()> {
    let slots = coordinator.slots()?;
    if slots.is_empty() {
        println!("no saves");
        return Ok(());
    }

    let latest = coordinator.latest_slot()?;
    for (slot, data) in slots {
        let marker = if Some(slot) == latest { " (latest)" } else { "" };
        println!(
            "slot {:04}{}  keys={} shared={}  saved_at={}",
            slot,
            marker,
            data.keys.len(),
            data.shared_keys.len(),
            data.saved_at.to_rfc3339()
        );
    }
    Ok(())
}

fn list_keys(coordinator: &SnapshotCoordinator, slot: u32) -> Result<()> {
    let data = coordinator
        .slot_data(slot)?
        .ok_or_else(|| anyhow!("Slot {} has no save", slot))?;

    for identity in &data.keys {
        println!("{}  {}", identity, storage_key(slot, false, identity));
    }
    for identity in &data.shared_keys {
        println!("{}  {}  (shared)", identity, storage_key(slot, true, identity));
    }
    Ok(())
}

async fn show_payload(
    storage: &dyn DataStorage,
    slot: u32,
    identity: &str,
    shared: bool,
) -> Result<()> {
    let key = storage_key(slot, shared, identity);
    let payload = storage
        .get_blob(&key)
        .await?
        .ok_or_else(|| anyhow!("Nothing stored under '{}'", key))?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

async fn delete_slot(coordinator: &SnapshotCoordinator, slot: u32) -> Result<()> {
    if !coordinator.has_save_at(slot)? {
        return Err(anyhow!("Slot {} has no save", slot));
    }
    match coordinator.delete(slot).await? {
        OperationStatus::Completed => {
            println!("Deleted slot {}", slot);
            Ok(())
        }
        status => Err(anyhow!("Delete of slot {} did not run: {:?}", slot, status)),
    }
}
