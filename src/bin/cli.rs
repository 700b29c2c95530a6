//! worldsave CLI
//!
//! Diagnostic tool for save streams:
//! - `bench`: write a synthetic world with either writer, read it back, verify
//! - `dump`: decode a stream against a field layout given on the command line

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use worldsave::resolver::{Entity, EntityKind};
use worldsave::types::{Point3D, TimeSpan};
use worldsave::{
    AsyncWriter, BinaryFileReader, BinaryFileWriter, Config, GenericReader, GenericWriter,
    MemoryResolver, Persist, Result, Serial, SerialResolver, Timestamp,
};

/// worldsave CLI
#[derive(Parser, Debug)]
#[command(name = "worldsave-cli")]
#[command(about = "Inspect and benchmark worldsave streams")]
#[command(version)]
struct Args {
    /// Strings in the stream carry no presence byte
    #[arg(long, global = true)]
    no_prefix: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a synthetic save, read it back and report throughput
    Bench {
        /// Output file
        #[arg(short, long, default_value = "./world.bin")]
        path: PathBuf,

        /// Writer implementation
        #[arg(short, long, value_enum, default_value = "async")]
        writer: WriterKind,

        /// Number of records to write
        #[arg(short, long, default_value = "100000")]
        records: usize,

        /// Writer buffer size in KiB
        #[arg(short, long)]
        buffer_kb: Option<usize>,
    },

    /// Decode a stream field by field
    Dump {
        /// Input file
        path: PathBuf,

        /// Comma-separated field kinds, e.g. `varint,string,i32,item`
        #[arg(short, long, value_delimiter = ',', value_enum, required = true)]
        layout: Vec<FieldKind>,

        /// Apply the layout repeatedly until the end of the stream
        #[arg(short, long)]
        repeat: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum WriterKind {
    Sync,
    Async,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FieldKind {
    String,
    Timestamp,
    Delta,
    Span,
    Decimal,
    I64,
    U64,
    I32,
    U32,
    I16,
    U16,
    F64,
    F32,
    Char,
    U8,
    I8,
    Bool,
    Varint,
    Ip,
    Point2d,
    Point3d,
    Rect2d,
    Map,
    Item,
    Actor,
    Group,
    ItemList,
    ActorList,
    GroupList,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,worldsave=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let config = Config::builder().prefix_strings(!args.no_prefix).build();

    let result = match args.command {
        Commands::Bench { path, writer, records, buffer_kb } => {
            let config = match buffer_kb {
                Some(kb) => Config {
                    buffer_size: kb * 1024,
                    async_buffer_size: kb * 1024,
                    ..config
                },
                None => config,
            };
            bench(&path, writer, records, &config)
        }
        Commands::Dump { path, layout, repeat } => dump(&path, &layout, repeat, &config),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

// =============================================================================
// Bench
// =============================================================================

/// Synthetic persisted object exercising most field kinds
#[derive(Debug, Default, PartialEq)]
struct Creature {
    name: Option<String>,
    location: Point3D,
    born: Option<Timestamp>,
    hits: i16,
    owner: Option<Arc<Entity>>,
    backpack: Vec<Arc<Entity>>,
}

impl Persist<Arc<MemoryResolver>> for Creature {
    const VERSION: i32 = 1;

    fn save<W: GenericWriter<Resolver = Arc<MemoryResolver>>>(&self, writer: &mut W) -> Result<()> {
        writer.write_string(self.name.as_deref())?;
        writer.write_point3d(self.location)?;
        writer.write_i16(self.hits)?;
        writer.write_actor(self.owner.as_ref())?;
        writer.write_item_list(&mut self.backpack.clone(), true)?;
        writer.write_delta_time(self.born.unwrap_or(Timestamp::MIN))
    }

    fn load<Rd: GenericReader<Resolver = Arc<MemoryResolver>>>(
        &mut self,
        reader: &mut Rd,
        version: i32,
    ) -> Result<()> {
        self.name = reader.read_string()?;
        self.location = reader.read_point3d()?;
        self.hits = reader.read_i16()?;
        self.owner = reader.read_actor()?;
        self.backpack = reader.read_item_list()?;
        if version >= 1 {
            self.born = Some(reader.read_delta_time()?);
        }
        Ok(())
    }
}

fn creature(i: usize, resolver: &MemoryResolver, now: Timestamp) -> Creature {
    let n = i as i32;
    Creature {
        name: Some(format!("creature #{}", i)),
        location: Point3D::new(n % 6144, n % 4096, (n % 256) - 128),
        born: Some(now.saturating_add(TimeSpan::from_seconds(-(i as i64)))),
        hits: (i % 100) as i16,
        owner: resolver.get(EntityKind::Actor, Serial::new(n % 64)),
        backpack: (0..(i % 4) as i32)
            .filter_map(|k| resolver.get(EntityKind::Item, Serial::new(n % 512 + k)))
            .collect(),
    }
}

fn bench(path: &Path, kind: WriterKind, records: usize, config: &Config) -> Result<()> {
    let resolver = Arc::new(MemoryResolver::new());
    for serial in 0..64 {
        resolver.register(EntityKind::Actor, Serial::new(serial));
    }
    for serial in 0..520 {
        resolver.register(EntityKind::Item, Serial::new(serial));
    }

    let clock = Arc::new(worldsave::types::FixedClock(Timestamp::now()));
    let now = clock.0;

    tracing::info!("Writing {} records to {} ({:?} writer)", records, path.display(), kind);
    let started = Instant::now();
    let position = match kind {
        WriterKind::Sync => {
            let mut writer = BinaryFileWriter::create(path, config, Arc::clone(&resolver))?
                .with_clock(clock.clone());
            write_world(&mut writer, records, &resolver, now)?
        }
        WriterKind::Async => {
            let mut writer = AsyncWriter::create(path, config, Arc::clone(&resolver))?
                .with_clock(clock.clone());
            write_world(&mut writer, records, &resolver, now)?
        }
    };
    let write_elapsed = started.elapsed();

    let bytes = std::fs::read(path)?;
    let crc = crc32fast::hash(&bytes);
    tracing::info!(
        "Wrote {} bytes in {:.2?} ({:.1} MiB/s), crc32 {:08x}",
        position,
        write_elapsed,
        position as f64 / (1024.0 * 1024.0) / write_elapsed.as_secs_f64().max(f64::EPSILON),
        crc
    );

    let started = Instant::now();
    let mut reader = BinaryFileReader::open(path, config, Arc::clone(&resolver))?.with_clock(clock);
    let mut mismatches = 0usize;
    for i in 0..records {
        let mut loaded = Creature::default();
        loaded.deserialize(&mut reader)?;
        if loaded != creature(i, &resolver, now) {
            mismatches += 1;
        }
    }
    let trailing = !reader.end()?;

    tracing::info!("Read back {} records in {:.2?}", records, started.elapsed());
    if mismatches > 0 || trailing {
        return Err(worldsave::PersistError::Malformed(format!(
            "{} mismatched records, trailing data: {}",
            mismatches, trailing
        )));
    }
    println!("{} records, {} bytes, crc32 {:08x}", records, position, crc);
    Ok(())
}

fn write_world<W>(writer: &mut W, records: usize, resolver: &MemoryResolver, now: Timestamp) -> Result<u64>
where
    W: GenericWriter<Resolver = Arc<MemoryResolver>>,
{
    for i in 0..records {
        creature(i, resolver, now).serialize(writer)?;
    }
    let position = writer.position();
    writer.close()?;
    Ok(position)
}

// =============================================================================
// Dump
// =============================================================================

fn dump(path: &Path, layout: &[FieldKind], repeat: bool, config: &Config) -> Result<()> {
    let mut reader = BinaryFileReader::open(path, config, SerialResolver)?;

    loop {
        for field in layout {
            if reader.end()? {
                return Ok(());
            }
            let at = reader.position();
            let value = read_field(&mut reader, *field)?;
            println!("{:>10}  {:<10} {}", at, format!("{:?}", field).to_lowercase(), value);
        }
        if !repeat || reader.end()? {
            return Ok(());
        }
    }
}

fn read_field<Rd: GenericReader<Resolver = SerialResolver>>(reader: &mut Rd, field: FieldKind) -> Result<String> {
    let value = match field {
        FieldKind::String => format!("{:?}", reader.read_string()?),
        FieldKind::Timestamp => reader.read_timestamp()?.ticks().to_string(),
        FieldKind::Delta => reader.read_delta_time()?.ticks().to_string(),
        FieldKind::Span => reader.read_time_span()?.ticks().to_string(),
        FieldKind::Decimal => reader.read_decimal()?.to_string(),
        FieldKind::I64 => reader.read_i64()?.to_string(),
        FieldKind::U64 => reader.read_u64()?.to_string(),
        FieldKind::I32 => reader.read_i32()?.to_string(),
        FieldKind::U32 => reader.read_u32()?.to_string(),
        FieldKind::I16 => reader.read_i16()?.to_string(),
        FieldKind::U16 => reader.read_u16()?.to_string(),
        FieldKind::F64 => reader.read_f64()?.to_string(),
        FieldKind::F32 => reader.read_f32()?.to_string(),
        FieldKind::Char => format!("{:?}", reader.read_char()?),
        FieldKind::U8 => reader.read_u8()?.to_string(),
        FieldKind::I8 => reader.read_i8()?.to_string(),
        FieldKind::Bool => reader.read_bool()?.to_string(),
        FieldKind::Varint => reader.read_encoded_int()?.to_string(),
        FieldKind::Ip => reader.read_ip_addr()?.to_string(),
        FieldKind::Point2d => format!("{:?}", reader.read_point2d()?),
        FieldKind::Point3d => format!("{:?}", reader.read_point3d()?),
        FieldKind::Rect2d => format!("{:?}", reader.read_rect2d()?),
        FieldKind::Map => format!("{:?}", reader.read_map()?.map(|m| m.index())),
        FieldKind::Item => format!("{:?}", reader.read_item()?.map(|s| s.to_string())),
        FieldKind::Actor => format!("{:?}", reader.read_actor()?.map(|s| s.to_string())),
        FieldKind::Group => format!("{:?}", reader.read_group()?.map(|s| s.to_string())),
        FieldKind::ItemList => serial_list(reader.read_item_list()?),
        FieldKind::ActorList => serial_list(reader.read_actor_list()?),
        FieldKind::GroupList => serial_list(reader.read_group_list()?),
    };
    Ok(value)
}

fn serial_list(serials: Vec<Serial>) -> String {
    let parts: Vec<String> = serials.iter().map(Serial::to_string).collect();
    format!("[{}]", parts.join(", "))
}
