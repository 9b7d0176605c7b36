//! scenebridge - command-line front end for reading, converting and inspecting scenes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sb_core::native::{NodeId, NodeMask, ParamValue, Universe};
use sb_core::usd::Stage;
use sb_math::Interval;
use sb_translate::{
    load_scene, read_viewport, write_scene, Diagnostic, ParamMap, Reader, ReaderConfig,
    SceneSource, ViewportMode,
};

#[derive(Parser, Debug)]
#[command(name = "scenebridge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a scene into native nodes and list them.
    Load(LoadArgs),
    /// Read a scene and write its native nodes to a new scene file.
    Convert(ConvertArgs),
    /// Read a scene as viewport proxies.
    Viewport(ViewportArgs),
    /// Print the composed prim hierarchy of a scene.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct LoadArgs {
    /// Scene file (.usd, .usda).
    file: PathBuf,

    /// Reader settings as JSON; flags below take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    frame: Option<f64>,

    /// Worker threads; 0 uses every core.
    #[arg(long)]
    threads: Option<usize>,

    /// Node categories to create, e.g. `shape|light`.
    #[arg(long, value_parser = parse_mask)]
    mask: Option<NodeMask>,

    #[arg(long)]
    purpose: Option<String>,

    /// Only read the subtree rooted at this prim path.
    #[arg(long)]
    object_path: Option<String>,

    /// USDA override layer file, strongest first. May be repeated.
    #[arg(long = "override")]
    overrides: Vec<PathBuf>,

    /// Motion blur window relative to the frame.
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    shutter: Option<Vec<f32>>,

    #[arg(long)]
    debug: bool,

    /// Print diagnostics as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input scene.
    #[arg(value_name = "IN")]
    in_path: PathBuf,

    /// Output scene (.usda).
    #[arg(value_name = "OUT")]
    out_path: PathBuf,

    /// Node categories to write.
    #[arg(long, value_parser = parse_mask)]
    mask: Option<NodeMask>,

    /// Prim path every written prim is placed under.
    #[arg(long)]
    scope: Option<String>,

    /// Write parameters that still hold their default value.
    #[arg(long)]
    all_attributes: bool,
}

#[derive(Parser, Debug)]
struct ViewportArgs {
    file: PathBuf,

    /// boxes, points or polygons.
    #[arg(long, default_value_t = ViewportMode::Boxes)]
    mode: ViewportMode,

    /// Create one bare node per prim instead of proxies.
    #[arg(long)]
    list: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    file: PathBuf,
}

fn parse_mask(text: &str) -> Result<NodeMask, String> {
    NodeMask::parse(text).ok_or_else(|| format!("invalid node mask '{}'", text))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Load(args) => cmd_load(args),
        Command::Convert(args) => cmd_convert(args),
        Command::Viewport(args) => cmd_viewport(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn path_str(path: &Path) -> anyhow::Result<&str> {
    path.to_str()
        .with_context(|| format!("path '{}' is not valid UTF-8", path.display()))
}

fn read_config(path: Option<&Path>) -> anyhow::Result<ReaderConfig> {
    let Some(path) = path else {
        return Ok(ReaderConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config '{}'", path.display()))?;
    ReaderConfig::from_json(&text).with_context(|| format!("parse config '{}'", path.display()))
}

fn print_nodes(universe: &Universe, nodes: &[NodeId]) {
    for &id in nodes {
        let described = universe.with_node(id, |n| {
            format!("{:<8} {:<20} {}", id.to_string(), n.node_type(), n.name())
        });
        if let Ok(line) = described {
            println!("{}", line);
        }
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(diagnostics)?);
        return Ok(());
    }
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic);
    }
    Ok(())
}

fn cmd_load(args: LoadArgs) -> anyhow::Result<()> {
    let mut config = read_config(args.config.as_deref())?;
    if let Some(frame) = args.frame {
        config.frame = frame;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(mask) = args.mask {
        config.mask = mask;
    }
    if let Some(purpose) = args.purpose {
        config.purpose = purpose;
    }
    if let Some(&[start, end]) = args.shutter.as_deref() {
        config.motion_blur = Some(Interval::new(start, end));
    }
    config.debug |= args.debug;

    let overrides = args
        .overrides
        .iter()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("read override '{}'", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut reader = Reader::with_config(config);
    reader
        .read_file(path_str(&args.file)?, &overrides, args.object_path.as_deref())
        .with_context(|| format!("load '{}'", args.file.display()))?;

    print_nodes(reader.universe(), reader.nodes());
    print_diagnostics(reader.diagnostics(), args.json)?;
    log::info!("Created {} nodes", reader.nodes().len());
    Ok(())
}

fn cmd_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let universe = Arc::new(Universe::new());
    let reader = load_scene(universe.clone(), path_str(&args.in_path)?, &ParamMap::new())
        .with_context(|| format!("load '{}'", args.in_path.display()))?;
    print_diagnostics(reader.diagnostics(), false)?;

    let mut params = ParamMap::new();
    if let Some(mask) = args.mask {
        params.insert("mask", ParamValue::Int(mask.bits() as i32));
    }
    if let Some(scope) = args.scope {
        params.insert("scope", ParamValue::String(scope));
    }
    params.insert("all_attributes", ParamValue::Bool(args.all_attributes));

    let complete = write_scene(&universe, path_str(&args.out_path)?, &params)
        .with_context(|| format!("write '{}'", args.out_path.display()))?;
    if !complete {
        log::warn!("Some nodes could not be written to '{}'", args.out_path.display());
    }
    println!(
        "Wrote {} nodes to {}",
        reader.nodes().len(),
        args.out_path.display()
    );
    Ok(())
}

fn cmd_viewport(args: ViewportArgs) -> anyhow::Result<()> {
    let mut params = ParamMap::new();
    params.insert("list", ParamValue::Bool(args.list));

    let reader = read_viewport(
        SceneSource::File(path_str(&args.file)?),
        &[],
        None,
        args.mode,
        &params,
    )
    .with_context(|| format!("read '{}' for the viewport", args.file.display()))?;

    print_nodes(reader.universe(), reader.nodes());
    print_diagnostics(reader.diagnostics(), false)?;
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let stage =
        Stage::open(&args.file).with_context(|| format!("open '{}'", args.file.display()))?;

    println!("=== Stage: {} ({} prims) ===", stage.identifier(), stage.len());
    for prim in stage.traverse() {
        let indent = "  ".repeat(prim.path().depth());
        let type_name = if prim.type_name().is_empty() {
            "-"
        } else {
            prim.type_name()
        };
        println!("{}{} [{}]", indent, prim.name(), type_name);
    }
    Ok(())
}
