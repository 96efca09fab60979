use clap::{Args, Subcommand, ValueEnum};
use futures::TryStreamExt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use native_store::gateway::{self, native_hash};
use native_store::{Gateway, HashCheck, Payload};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct ContentCommand {
    #[command(subcommand)]
    pub command: ContentSubcommand,
}

#[derive(Subcommand)]
pub enum ContentSubcommand {
    /// Print a document in its stored format
    Get {
        collection: String,
        /// Document id (UUID)
        id: String,

        /// Write the content to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Store a document, replacing whatever is stored under the id
    Put {
        collection: String,
        /// Document id (UUID)
        id: String,

        /// Content type of the body (default: application/octet-stream)
        #[arg(long)]
        content_type: Option<String>,

        /// System the content came from
        #[arg(long)]
        origin_system_id: Option<String>,

        /// Only check the stored content against this native hash
        #[arg(long)]
        native_hash: Option<String>,

        /// Read the body from a file instead of stdin
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Merge-patch a stored JSON document
    Patch {
        collection: String,
        /// Document id (UUID)
        id: String,

        #[arg(long, default_value = "application/json")]
        content_type: String,

        /// Read the patch from a file instead of stdin
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Delete a document
    Delete {
        collection: String,
        /// Document id (UUID)
        id: String,
    },

    /// Print the native hash of a stored document
    Hash {
        collection: String,
        /// Document id (UUID)
        id: String,
    },

    /// List every id in a collection
    Ids {
        collection: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn read_body(file: &Option<PathBuf>) -> io::Result<Vec<u8>> {
    match file {
        Some(path) => std::fs::read(path),
        None => {
            let mut body = Vec::new();
            io::stdin().read_to_end(&mut body)?;
            Ok(body)
        }
    }
}

impl ContentCommand {
    pub async fn run(&self, gateway: &Gateway) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ContentSubcommand::Get {
                collection,
                id,
                output,
            } => {
                let Some(resource) = gateway.read(collection, id).await? else {
                    return Err(format!("Document {} not found in {}", id, collection).into());
                };
                let body = gateway::encode(&resource)?;

                match output {
                    Some(path) => {
                        std::fs::write(path, &body)?;
                        println!("Wrote {} byte(s) to {}", body.len(), path.display());
                        println!("content-type: {}", resource.content_type);
                        if let Some(origin) = &resource.origin_system_id {
                            println!("origin-system-id: {}", origin);
                        }
                    }
                    None => {
                        let mut stdout = io::stdout().lock();
                        stdout.write_all(&body)?;
                        stdout.flush()?;
                    }
                }
                Ok(())
            }

            ContentSubcommand::Put {
                collection,
                id,
                content_type,
                origin_system_id,
                native_hash,
                file,
            } => {
                if let Some(hash) = native_hash {
                    return match gateway.check_native_hash(collection, id, hash).await? {
                        HashCheck::Matches => {
                            println!("Hash matches existing content, nothing written");
                            Ok(())
                        }
                        HashCheck::Mismatch => {
                            Err("Native hash does not match the stored content".into())
                        }
                    };
                }

                let body = read_body(file)?;
                let payload = Payload {
                    content_type: content_type.as_deref(),
                    origin_system_id: origin_system_id.as_deref(),
                    body: &body,
                };
                let stored = gateway.write(collection, id, payload).await?;
                println!("Stored {} in {} as {}", stored.id, collection, stored.content_type);
                Ok(())
            }

            ContentSubcommand::Patch {
                collection,
                id,
                content_type,
                file,
            } => {
                let body = read_body(file)?;
                let payload = Payload {
                    content_type: Some(content_type),
                    origin_system_id: None,
                    body: &body,
                };
                match gateway.patch(collection, id, payload).await? {
                    Some(resource) => {
                        let body = gateway::encode(&resource)?;
                        println!("{}", String::from_utf8_lossy(&body));
                        Ok(())
                    }
                    None => Err(format!("Document {} not found in {}", id, collection).into()),
                }
            }

            ContentSubcommand::Delete { collection, id } => {
                gateway.delete(collection, id).await?;
                println!("Deleted {} from {}", id, collection);
                Ok(())
            }

            ContentSubcommand::Hash { collection, id } => {
                let Some(resource) = gateway.read(collection, id).await? else {
                    return Err(format!("Document {} not found in {}", id, collection).into());
                };
                println!("{}", native_hash(&resource.content));
                Ok(())
            }

            ContentSubcommand::Ids { collection, format } => {
                let ids: Vec<String> = gateway
                    .ids(collection, CancellationToken::new())
                    .await?
                    .try_collect()
                    .await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&ids)?);
                    }
                    OutputFormat::Text => {
                        for id in &ids {
                            println!("{}", id);
                        }
                        println!("\nTotal: {} document(s)", ids.len());
                    }
                }
                Ok(())
            }
        }
    }
}
