use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::path::PathBuf;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use wtlogin_lib::buffer::parse_hex;
use wtlogin_lib::tlv::{Tag, split_records};
use wtlogin_lib::{ClientProfile, ClientVariant, SessionContext, qr_status_message, sso, tea, trans};

/// Offline inspector for wtlogin packets: decodes captured frames and runs
/// the protocol transforms without touching the network.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the K-value transform used by QR authorisation
    Trans { k_value: String },
    /// List the records of a TLV stream
    Tlv {
        /// Hex stream, spaces allowed
        data: String,
        /// Key for nested T119 records
        #[arg(long)]
        tgtgt: Option<String>,
    },
    /// Decrypt a TEA ciphertext
    TeaDecrypt {
        #[arg(long)]
        key: String,
        data: String,
    },
    /// Parse a server SSO frame (without the transport length prefix)
    Frame {
        data: String,
        /// Share key for mode 1 frames
        #[arg(long)]
        share_key: Option<String>,
    },
    /// Print the text of a QR status code
    QrStatus { code: u8 },
    /// Print the built-in client profile as JSON
    Profile {
        #[arg(value_enum, default_value_t = Variant::Phone)]
        variant: Variant,
    },
    /// Build a password login request for inspection
    Login {
        #[arg(long)]
        uin: u64,
        #[arg(long)]
        password: String,
        #[arg(long, value_enum, default_value_t = Variant::Phone)]
        variant: Variant,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Variant {
    Phone,
    Watch,
    Legacy,
}

impl From<Variant> for ClientVariant {
    fn from(v: Variant) -> Self {
        match v {
            Variant::Phone => ClientVariant::Phone,
            Variant::Watch => ClientVariant::Watch,
            Variant::Legacy => ClientVariant::Legacy,
        }
    }
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v, TRACE with -vv
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

fn hex_arg(value: &str, what: &str) -> Result<Vec<u8>> {
    parse_hex(value).with_context(|| format!("Invalid hex for {}", what))
}

fn key_arg(value: &str, what: &str) -> Result<[u8; 16]> {
    let bytes = hex_arg(value, what)?;
    match <[u8; 16]>::try_from(bytes.as_slice()) {
        Ok(key) => Ok(key),
        Err(_) => bail!("{} must be 16 bytes, got {}", what, bytes.len()),
    }
}

fn dump_tlv(data: Bytes, tgtgt: Option<&[u8; 16]>, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    for record in split_records(data).context("Malformed TLV stream")? {
        let tag = Tag::from(record.tag);
        println!(
            "{}{:04X} {:?} [{}] {}",
            indent,
            record.tag,
            tag,
            record.payload.len(),
            hex::encode(&record.payload)
        );
        if tag == Tag::Encrypted {
            match tgtgt {
                Some(key) => match tea::decrypt(&record.payload, key) {
                    Ok(inner) => dump_tlv(Bytes::from(inner), tgtgt, depth + 1)?,
                    Err(e) => warn!("T119 does not decrypt under the given key: {}", e),
                },
                None => debug!("No --tgtgt given, T119 left encrypted"),
            }
        }
    }
    Ok(())
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Trans { k_value } => {
            let token = trans::wtlogin_trans(k_value.as_bytes()).context("K value transform failed")?;
            println!("{}", hex::encode(token));
        }
        Command::Tlv { data, tgtgt } => {
            let key = tgtgt.as_deref().map(|k| key_arg(k, "--tgtgt")).transpose()?;
            dump_tlv(Bytes::from(hex_arg(&data, "TLV stream")?), key.as_ref(), 0)?;
        }
        Command::TeaDecrypt { key, data } => {
            let key = key_arg(&key, "--key")?;
            let plain = tea::decrypt(&hex_arg(&data, "ciphertext")?, &key).context("TEA decryption failed")?;
            println!("{}", hex::encode(plain));
        }
        Command::Frame { data, share_key } => {
            let mut ctx = SessionContext::new(0, ClientVariant::Phone);
            if let Some(k) = share_key {
                ctx.keys.share_key = key_arg(&k, "--share-key")?.to_vec();
            }
            let rsp = sso::parse_response(&mut ctx, &hex_arg(&data, "frame")?).context("Failed to parse SSO frame")?;
            println!("command:  {}", rsp.command);
            println!("seq:      {}", rsp.seq);
            println!("ret_code: {}", rsp.ret_code);
            if !rsp.tips.is_empty() {
                println!("tips:     {}", rsp.tips);
            }
            println!("body:     {}", hex::encode(&rsp.body));
        }
        Command::QrStatus { code } => println!("{}", qr_status_message(code)),
        Command::Profile { variant } => {
            let profile = ClientProfile::for_variant(variant.into());
            println!(
                "{}",
                serde_json::to_string_pretty(&profile).context("Failed to serialize profile")?
            );
        }
        Command::Login {
            uin,
            password,
            variant,
        } => {
            let mut ctx = SessionContext::new(uin, variant.into()).with_password(password);
            let packet = wtlogin_lib::login(&mut ctx).context("Failed to build login request")?;
            info!("Built {} login request of {} bytes", ctx.variant, packet.len());
            println!("{}", hex::encode(&packet));
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file, &cli.verbose)?;
    run(cli.command)
}
