//! meshstream CLI: inspect and transcode PLY/OBJ/3DS/STL mesh files.
//!
//! Grounded on `starbreaker-cli.rs`'s clap-derive + anyhow shape (the
//! teacher file's own typos are not reproduced). This is the sole
//! place a `tracing` subscriber is installed and the sole place
//! process exit codes are decided; every library crate returns
//! `Result` all the way out to here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use meshstream_core::{
    JsonWriterOptions, LoadOptions, LoaderListener, MaterialCallbacks, MeshWriterCallbacks,
    ObjCallbacks, Texture,
};
use meshstream_export::{BinaryWriter, JsonWriter};
use meshstream_loaders::{
    sniff_format, LoadedMesh, MeshFormat, MeshIterator, ObjLoader, PlyLoader, StlLoader, TdsLoader,
};

#[derive(Parser)]
#[command(name = "meshstream")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a mesh file's format, chunk count, and vertex/triangle totals
    Info(InfoArgs),

    /// Transcode a mesh file to custom binary v2 or the JSON-like format
    Transcode(TranscodeArgs),
}

#[derive(clap::Args)]
struct InfoArgs {
    /// Path to the mesh file (PLY, OBJ, 3DS, or STL)
    path: PathBuf,

    /// Don't assert texture validity while loading
    #[arg(long)]
    no_validate_textures: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TargetFormat {
    Binary,
    Json,
}

#[derive(clap::Args)]
struct TranscodeArgs {
    /// Path to the source mesh file
    input: PathBuf,

    /// Target format
    #[arg(long, value_enum)]
    to: TargetFormat,

    /// Output file path
    #[arg(short, long)]
    out: PathBuf,

    /// Don't assert texture validity while loading
    #[arg(long)]
    no_validate_textures: bool,

    /// Force each vertex attribute flush at this table size instead of the default (65535)
    #[arg(long)]
    vertex_budget: Option<u32>,

    /// Pretty-print JSON output (ignored for --to binary)
    #[arg(long)]
    pretty: bool,

    /// Don't embed texture bytes in JSON output (ignored for --to binary)
    #[arg(long)]
    no_embed_textures: bool,

    /// Include each texture's resolved source path as `remoteUrl` in JSON output
    #[arg(long)]
    remote_texture_url: bool,

    /// Include each texture's id as `remoteId` in JSON output
    #[arg(long)]
    remote_texture_id: bool,
}

fn main() {
    meshstream_loaders::logging::init_default();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Info(args) => cmd_info(args),
        Commands::Transcode(args) => cmd_transcode(args),
    }
}

/// Reads a mesh file's raw bytes back off disk for texture embedding;
/// declines (`None`) rather than failing the whole write if the file is
/// missing or unreadable (mirrors `ObjCallbacks::on_material_loader_requested`'s
/// "return bytes or decline" contract).
fn texture_bytes_from_disk(texture: &Texture) -> Option<Vec<u8>> {
    let path = texture.resolved_path.as_ref()?;
    fs::read(path).ok()
}

fn load_mesh(path: &Path, options: LoadOptions) -> Result<LoadedMesh> {
    let format = sniff_format(path).with_context(|| format!("unrecognised mesh format: {:?}", path))?;
    tracing::info!(path = %path.display(), ?format, "loading mesh");
    let listener = LoaderListener::new();

    let mesh = match format {
        MeshFormat::Ply => {
            let mut loader = PlyLoader::new(options);
            loader.load(path, &listener)
        }
        MeshFormat::Stl => {
            let mut loader = StlLoader::new(options);
            loader.load(path, &listener)
        }
        MeshFormat::Tds => {
            let material_callbacks = MaterialCallbacks {
                validate_textures: options.validate_textures,
                ..MaterialCallbacks::default()
            };
            let mut loader = TdsLoader::new(options);
            loader.load(path, &listener, &material_callbacks)
        }
        MeshFormat::Obj => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read OBJ file {:?}", path))?;
            let obj_callbacks = ObjCallbacks {
                on_material_loader_requested: Some(Box::new(|mtl_path: &Path| {
                    fs::read(mtl_path).ok()
                })),
            };
            let material_callbacks = MaterialCallbacks {
                validate_textures: options.validate_textures,
                ..MaterialCallbacks::default()
            };
            let mut loader = ObjLoader::new(options);
            loader.load(path, &text, &listener, &obj_callbacks, &material_callbacks)
        }
    };
    mesh.with_context(|| format!("failed to load {:?}", path))
}

fn cmd_info(args: InfoArgs) -> Result<()> {
    if !args.path.exists() {
        bail!("file not found: {:?}", args.path);
    }

    let format = sniff_format(&args.path)?;
    let options = LoadOptions {
        validate_textures: !args.no_validate_textures,
        ..LoadOptions::default()
    };
    let mut mesh = load_mesh(&args.path, options)?;

    let mut chunk_count = 0u64;
    let mut vertex_total = 0u64;
    let mut triangle_total = 0u64;
    while mesh.iterator.has_next() {
        let chunk = mesh.iterator.next()?;
        chunk_count += 1;
        vertex_total += chunk.vertex_count() as u64;
        triangle_total += (chunk.indices.len() / 3) as u64;
    }

    println!("{:?}", args.path);
    println!("  Format:     {:?}", format);
    println!("  Chunks:     {}", chunk_count);
    println!("  Vertices:   {}", vertex_total);
    println!("  Triangles:  {}", triangle_total);
    println!("  Materials:  {}", mesh.materials.len());
    println!("  Textures:   {}", mesh.textures.len());

    Ok(())
}

fn cmd_transcode(args: TranscodeArgs) -> Result<()> {
    if !args.input.exists() {
        bail!("file not found: {:?}", args.input);
    }

    let mut load_options = LoadOptions {
        validate_textures: !args.no_validate_textures,
        ..LoadOptions::default()
    };
    if let Some(budget) = args.vertex_budget {
        load_options.vertex_budget = budget;
    }

    let mut mesh = load_mesh(&args.input, load_options)?;

    let mut writer_callbacks = MeshWriterCallbacks::new();
    writer_callbacks.on_texture_bytes_requested = Some(Box::new(texture_bytes_from_disk));

    let mut out_file = fs::File::create(&args.out)
        .with_context(|| format!("failed to create output file {:?}", args.out))?;

    match args.to {
        TargetFormat::Binary => {
            let writer = BinaryWriter::new(&writer_callbacks);
            writer
                .write(&mut mesh, &mut out_file)
                .with_context(|| "failed to write custom binary v2 output")?;
        }
        TargetFormat::Json => {
            let json_options = JsonWriterOptions {
                embed_textures: !args.no_embed_textures,
                remote_texture_url_enabled: args.remote_texture_url,
                remote_texture_id_enabled: args.remote_texture_id,
                ..JsonWriterOptions::default()
            };
            let writer = JsonWriter::new(json_options, &writer_callbacks);
            writer
                .write_to(&mut mesh, &mut out_file, args.pretty)
                .with_context(|| "failed to write JSON output")?;
        }
    }

    tracing::info!(out = %args.out.display(), "transcode complete");
    println!("wrote {:?}", args.out);
    Ok(())
}
