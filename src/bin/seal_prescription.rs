//! Producer tool for prescription files.
//!
//! Generates Fernet keys and seals JSON documents into `.med` tokens that the
//! web server can read back.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin seal_prescription -- --keygen --out-key <path> [--force]
//! cargo run --bin seal_prescription -- --key <path> --in <json> --out <path> [--force]
//! ```
//!
//! # Security
//!
//! - Keys come from OS entropy (OsRng)
//! - Key material is zeroized after use
//! - Output files have restricted permissions (Unix only)
//! - Only the key fingerprint is printed

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::io::Write;
use std::path::{Path, PathBuf};

use pharmacy_simulator::adapters::fernet::FernetCipher;
use pharmacy_simulator::ports::DocumentCipher;
use pharmacy_simulator::DecryptedDocument;
use zeroize::Zeroizing;

const USAGE: &str = "Usage:\n  seal_prescription --keygen --out-key <path> [--force]\n  seal_prescription --key <path> --in <json> --out <path> [--force]";

enum Command {
    Keygen { out_key: PathBuf },
    Seal { key: PathBuf, input: PathBuf, out: PathBuf },
}

fn usage_exit() -> ! {
    eprintln!("{USAGE}");
    std::process::exit(2);
}

fn path_arg(args: &mut impl Iterator<Item = String>) -> PathBuf {
    match args.next() {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => usage_exit(),
    }
}

fn parse_args() -> (Command, bool) {
    let mut args = std::env::args().skip(1);
    let mut keygen = false;
    let mut out_key = None;
    let mut key = None;
    let mut input = None;
    let mut out = None;
    let mut force = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--keygen" => keygen = true,
            "--out-key" => out_key = Some(path_arg(&mut args)),
            "--key" => key = Some(path_arg(&mut args)),
            "--in" => input = Some(path_arg(&mut args)),
            "--out" => out = Some(path_arg(&mut args)),
            "--force" => force = true,
            "-h" | "--help" => {
                println!(
                    "{USAGE}\n\n--keygen writes a new Fernet key to <path> with 0600 permissions.\nOtherwise the JSON document at --in is sealed with the key at --key and written to --out.\nPrints only the key fingerprint."
                );
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown arg: {arg}");
                usage_exit();
            }
        }
    }

    let command = match (keygen, out_key, key, input, out) {
        (true, Some(out_key), None, None, None) => Command::Keygen { out_key },
        (false, None, Some(key), Some(input), Some(out)) => Command::Seal { key, input, out },
        _ => usage_exit(),
    };
    (command, force)
}

fn refuse_overwrite(path: &Path, force: bool) {
    if path.exists() && !force {
        eprintln!("Refusing to overwrite existing file {path:?}. Use --force.");
        std::process::exit(3);
    }
}

fn write_private(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Failed to create directory {parent:?}: {e}");
            std::process::exit(4);
        }
    }

    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        opts.mode(0o600);
    }

    let result = opts
        .open(path)
        .and_then(|mut file| file.write_all(contents).and_then(|()| file.write_all(b"\n")));
    if let Err(e) = result {
        eprintln!("Failed to write {path:?}: {e}");
        std::process::exit(4);
    }
}

fn read_or_exit(path: &Path) -> Zeroizing<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Zeroizing::new(bytes),
        Err(e) => {
            eprintln!("Failed to read {path:?}: {e}");
            std::process::exit(4);
        }
    }
}

fn main() {
    let (command, force) = parse_args();
    let cipher = FernetCipher::new();

    match command {
        Command::Keygen { out_key } => {
            refuse_overwrite(&out_key, force);

            let token = match cipher.generate_key() {
                Ok(token) => Zeroizing::new(token),
                Err(e) => {
                    eprintln!("Key generation failed: {e}");
                    std::process::exit(5);
                }
            };
            let fingerprint = match cipher.parse_key(token.as_bytes()) {
                Ok(key) => key.fingerprint.clone(),
                Err(e) => {
                    eprintln!("Generated key is unusable: {e}");
                    std::process::exit(5);
                }
            };

            write_private(&out_key, token.as_bytes());
            println!("Wrote key to {out_key:?}");
            println!("KEY_FINGERPRINT={fingerprint}");
        }
        Command::Seal { key, input, out } => {
            refuse_overwrite(&out, force);

            let key_token = read_or_exit(&key);
            let fingerprint = match cipher.parse_key(&key_token) {
                Ok(parsed) => parsed.fingerprint.clone(),
                Err(e) => {
                    eprintln!("Invalid key file {key:?}: {e}");
                    std::process::exit(5);
                }
            };

            let plaintext = read_or_exit(&input);
            let document = match DecryptedDocument::from_plaintext(&plaintext) {
                Ok(document) => document,
                Err(e) => {
                    eprintln!("Input {input:?} is not a JSON document: {e}");
                    std::process::exit(5);
                }
            };

            let sealed = match cipher.encrypt(&document, &key_token) {
                Ok(token) => token,
                Err(e) => {
                    eprintln!("Encryption failed: {e}");
                    std::process::exit(5);
                }
            };

            write_private(&out, &sealed);
            println!("Sealed {input:?} into {out:?}");
            println!("KEY_FINGERPRINT={fingerprint}");
        }
    }
}
