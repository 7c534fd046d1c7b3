use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{rpc::JsonRpcLedgerReader, ContractClient, MissingSigner};
use shared::domain::{AccountAddress, PackageId, RawRecipe};
use storage::Storage;

mod config;

#[derive(Parser, Debug)]
#[command(name = "pizza", about = "Console front for the pizza contract workflow")]
struct Args {
    /// Account address; overrides pizza.toml and PIZZA_ACCOUNT.
    #[arg(long)]
    account: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show stored references and the decoded pizza box snapshot.
    Status,
    /// Submit pizza::cook with eight ingredient quantities (0..=65535 each).
    Cook {
        olive_oils: u32,
        yeast: u32,
        flour: u32,
        water: u32,
        salt: u32,
        tomato_sauce: u32,
        cheese: u32,
        pineapple: u32,
    },
    /// Submit pizza::get_flag against the stored pizza box.
    GetFlag,
    /// Clear stored references and error state for the account.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let settings = config::load_settings();

    let Some(account) = args.account.or_else(|| settings.account.clone()) else {
        bail!("no account configured; pass --account or set PIZZA_ACCOUNT");
    };

    let storage = Storage::new(&settings.database_url).await?;
    let ledger = JsonRpcLedgerReader::new(&settings.rpc_url)?;
    let client = ContractClient::with_dependencies(
        PackageId(settings.package_id.clone()),
        Arc::new(MissingSigner),
        Arc::new(ledger),
        Arc::new(storage),
    );
    client.set_active_account(Some(AccountAddress(account))).await;

    match args.command {
        Command::Status => {
            let snapshot = client.refresh_snapshot().await?;
            match client.pizza_box_id().await? {
                Some(id) => println!("pizza box: {id}"),
                None => println!("pizza box: none stored"),
            }
            match client.flag_id().await? {
                Some(id) => println!("flag:      {id}"),
                None => println!("flag:      none stored"),
            }
            if snapshot.reference.is_none() {
                println!("snapshot:  idle (cook a pizza first)");
            } else if !snapshot.exists {
                println!("snapshot:  object not found on the ledger");
            } else if let Some(recipe) = snapshot.recipe {
                println!(
                    "snapshot:  olive_oils={} yeast={} flour={} water={} salt={} tomato_sauce={} cheese={} pineapple={}",
                    recipe.olive_oils,
                    recipe.yeast,
                    recipe.flour,
                    recipe.water,
                    recipe.salt,
                    recipe.tomato_sauce,
                    recipe.cheese,
                    recipe.pineapple,
                );
            } else {
                println!("snapshot:  object exists but its data is unreadable");
            }
        }
        Command::Cook {
            olive_oils,
            yeast,
            flour,
            water,
            salt,
            tomato_sauce,
            cheese,
            pineapple,
        } => {
            let raw = RawRecipe {
                olive_oils,
                yeast,
                flour,
                water,
                salt,
                tomato_sauce,
                cheese,
                pineapple,
            };
            let outcome = client.cook_pizza(raw).await?;
            println!("confirmed: {}", outcome.digest);
            match outcome.created {
                Some(id) => println!("pizza box: {id}"),
                None => println!("transaction created no object"),
            }
        }
        Command::GetFlag => match client.get_flag().await? {
            Some(outcome) => {
                println!("confirmed: {}", outcome.digest);
                match outcome.created {
                    Some(id) => println!("flag:      {id}"),
                    None => println!("transaction created no object"),
                }
            }
            None => println!("no pizza box stored; cook one first"),
        },
        Command::Clear => {
            client.clear_object().await?;
            println!("cleared stored references for the account");
        }
    }

    Ok(())
}
