use clap::{Args, Subcommand};

use native_store::Db;

#[derive(Args)]
pub struct StoreCommand {
    #[command(subcommand)]
    pub command: StoreSubcommand,
}

#[derive(Subcommand)]
pub enum StoreSubcommand {
    /// List the collections the store serves
    Collections,

    /// Create the unique id index on every collection
    EnsureIndex,
}

impl StoreCommand {
    pub async fn run(&self, db: &Db) -> Result<(), Box<dyn std::error::Error>> {
        let connection = db.open().await?;

        match &self.command {
            StoreSubcommand::Collections => {
                let mut collections: Vec<_> = connection.supported_collections().iter().collect();
                collections.sort();
                if collections.is_empty() {
                    println!("No collections configured");
                }
                for collection in collections {
                    println!("{}", collection);
                }
            }
            StoreSubcommand::EnsureIndex => {
                connection.ensure_index().await?;
                println!("Indexes are in place");
            }
        }
        Ok(())
    }
}
