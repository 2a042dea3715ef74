use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use portal_tag_format::{
	header::Identity,
	impls::{MemoryTag, TagDump},
	keys::Uid,
	reader::{read_record, TagContents},
	record::DataRecord,
	tag_time::TagTime,
	transport::{FormatOptions, TagSession},
	writer::{options::WriteOptions, write_record},
};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

#[derive(Parser)]
#[command(name = "portal-tag")]
#[command(about = "Inspect and edit portal toy tag dumps (MIFARE Classic 1K)", long_about = None)]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Decode the identity and record of a dump
	Show {
		/// 1024-byte tag dump
		dump: PathBuf,
	},

	/// List the raw blocks of a dump in hex
	Blocks {
		dump: PathBuf,
	},

	/// Provision a tag image with its derived keys and access bits
	Format {
		/// Tag image; created when --uid is given
		dump: PathBuf,

		/// Start from a blank card with this uid (8 hex digits)
		#[arg(long, value_parser = parse_uid)]
		uid: Option<Uid>,
	},

	/// Rewrite the record with a fresh timestamp, optionally editing it
	Touch {
		dump: PathBuf,

		#[arg(long)]
		nickname: Option<String>,

		#[arg(long)]
		money: Option<u16>,

		/// Write the result here instead of over the input
		#[arg(long, short)]
		output: Option<PathBuf>,
	},
}

fn parse_uid(s: &str) -> Result<Uid> {
	let bytes = hex::decode(s).context("uid must be hex")?;
	bytes
		.try_into()
		.map_err(|bytes: Vec<u8>| anyhow::anyhow!("uid must be 4 bytes, got {}", bytes.len()))
}

fn main() {
	tracing_subscriber::registry()
		.with(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("portal_tag_format=info")),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	if let Err(e) = run() {
		eprintln!("Error: {e:?}");
		std::process::exit(1);
	}
}

fn run() -> Result<()> {
	match Cli::parse().command {
		Commands::Show { dump } => cmd_show(&dump),
		Commands::Blocks { dump } => cmd_blocks(&dump),
		Commands::Format { dump, uid } => cmd_format(&dump, uid),
		Commands::Touch {
			dump,
			nickname,
			money,
			output,
		} => cmd_touch(&dump, nickname, money, output.as_deref()),
	}
}

fn load(path: &Path) -> Result<TagDump> {
	TagDump::load(path).with_context(|| format!("Failed to load dump: {}", path.display()))
}

fn uid_of(dump: &TagDump) -> Uid {
	let mut uid = [0; 4];
	uid.copy_from_slice(&dump.block(0)[..4]);
	uid
}

fn cmd_show(path: &Path) -> Result<()> {
	let mut dump = load(path)?;
	let TagContents {
		identity,
		record,
		source,
	} = read_record(&mut dump)?;

	print_identity(&identity);
	match record {
		Some(record) => {
			println!("record:   from region {:?} ({:?})", source.part1, source.part2);
			print_record(&record);
		}
		None => println!("record:   none"),
	}
	Ok(())
}

fn print_identity(identity: &Identity) {
	println!("uid:      {}", hex::encode(identity.uid()));
	println!("toy:      {:#08x}", identity.toy_id);
	match identity.variant.game() {
		Some(game) => println!("game:     {game}"),
		None => println!("game:     unknown ({})", identity.variant.year_code),
	}
	println!("variant:  {:?} deco {}", identity.variant.flags, identity.deco);
	println!("card:     {:016x}", identity.trading_card_id);
}

fn print_record(record: &DataRecord) {
	println!("nickname: {}", record.nickname);
	println!("money:    {}", record.money);
	println!("xp:       {}", record.total_xp());
	println!("upgrades: {}", record.upgrade_summary());
	println!("heroics:  {}", record.heroic_challenges.count());
	println!("platforms: {:?}", record.platforms);
	println!("playtime: {}s", record.seconds_on_portal);
	if record.write_time.is_unset() {
		println!("written:  never");
	} else {
		println!("written:  {}", record.write_time);
	}
}

fn cmd_blocks(path: &Path) -> Result<()> {
	for line in load(path)?.hex_lines() {
		println!("{line}");
	}
	Ok(())
}

fn cmd_format(path: &Path, uid: Option<Uid>) -> Result<()> {
	let tag = match uid {
		Some(uid) => MemoryTag::blank(uid),
		None => MemoryTag::from_masked_dump(load(path)?),
	};
	let uid = uid_of(tag.dump());

	let mut session = TagSession::new(tag);
	session.connect(uid);
	let report = session.format_blank_tag(&FormatOptions::new())?;
	if report.was_provisioned() {
		println!("already provisioned");
	} else {
		println!("rekeyed sectors: {:?}", report.rekeyed);
	}

	session
		.into_inner()
		.into_dump()
		.save(path)
		.with_context(|| format!("Failed to write dump: {}", path.display()))?;
	Ok(())
}

fn cmd_touch(
	path: &Path,
	nickname: Option<String>,
	money: Option<u16>,
	output: Option<&Path>,
) -> Result<()> {
	let dump = load(path)?;
	let uid = uid_of(&dump);
	let mut session = TagSession::new(MemoryTag::from_masked_dump(dump));
	session.connect(uid);

	let (identity, record) = read_record(&mut session)?.into_parts();
	let Some(mut record) = record else {
		bail!("tag has no valid record to update");
	};
	if let Some(nickname) = nickname {
		record = record.with_nickname(nickname);
	}
	if let Some(money) = money {
		record = record.with_money(money);
	}
	record = record.with_write_time(TagTime::now());

	write_record(&mut session, &identity, &record, &WriteOptions::new())?;
	let (_, written) = read_record(&mut session)?.into_parts();
	if let Some(written) = written {
		print_record(&written);
	}

	let output = output.unwrap_or(path);
	session
		.into_inner()
		.into_dump()
		.save(output)
		.with_context(|| format!("Failed to write dump: {}", output.display()))?;
	Ok(())
}
