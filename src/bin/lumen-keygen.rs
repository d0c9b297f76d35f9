//! Key material generation for lumenchain identities.

use clap::{Parser, Subcommand};
use lumenchain::crypto::KeyPair;

#[derive(Parser)]
#[command(name = "lumen-keygen", about = "Generate and recover lumenchain keypairs")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a random keypair
    New,
    /// Generate a keypair together with its recovery mnemonic
    Mnemonic,
    /// Recover a keypair from a mnemonic phrase
    Recover {
        /// The BIP-39 seed phrase, quoted
        phrase: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Command::New => {
            let keypair = KeyPair::generate();
            print_keypair(&keypair);
        }
        Command::Mnemonic => {
            let (phrase, keypair) = KeyPair::generate_with_seed_phrase()?;
            println!("Seed phrase: {}", phrase);
            print_keypair(&keypair);
        }
        Command::Recover { phrase } => {
            let keypair = KeyPair::from_seed_phrase(&phrase)?;
            print_keypair(&keypair);
        }
    }
    Ok(())
}

fn print_keypair(keypair: &KeyPair) {
    let (public, secret) = keypair.to_base58();
    println!("Public key: {}", public);
    println!("Secret key: {}", secret);
}
