use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "certstamp", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every eligible template for every record into one zip archive.
    Render(RenderArgs),
    /// Render the editor view of one template as a PNG.
    Preview(PreviewArgs),
    /// List the headers of a CSV dataset.
    Fields(FieldsArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Project JSON describing templates and elements.
    #[arg(long)]
    project: PathBuf,

    /// CSV dataset; one output image per row and template.
    #[arg(long)]
    data: PathBuf,

    /// Output zip path.
    #[arg(long)]
    out: PathBuf,

    /// Store entries without compression.
    #[arg(long, default_value_t = false)]
    store: bool,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Project JSON describing templates and elements.
    #[arg(long)]
    project: PathBuf,

    /// Template name; defaults to the first template in the project.
    #[arg(long)]
    template: Option<String>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct FieldsArgs {
    /// CSV dataset.
    #[arg(long)]
    data: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("certstamp=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Preview(args) => cmd_preview(args),
        Command::Fields(args) => cmd_fields(args),
    }
}

fn open_session(
    project_path: &Path,
    settings: certstamp::RenderSettings,
) -> anyhow::Result<(certstamp::Session, Vec<certstamp::TemplateId>)> {
    let project = certstamp::Project::from_path(project_path)?;
    let templates = project.load_templates(settings.preview_box)?;
    let session = certstamp::Session::new(settings);
    #[cfg(feature = "fetch")]
    let mut session = session.with_resolver(certstamp::HttpResolver::new(project.root())?);
    #[cfg(not(feature = "fetch"))]
    let mut session = session.with_resolver(project.resolver());
    let ids = templates
        .into_iter()
        .map(|t| session.push_template(t))
        .collect();
    Ok((session, ids))
}

fn ensure_parent(out: &Path) -> anyhow::Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut settings = certstamp::RenderSettings::from_env()?;
    if args.store {
        settings.archive_compression = certstamp::ArchiveCompression::Stored;
    }

    let (mut session, _) = open_session(&args.project, settings)?;
    session.set_dataset(certstamp::Dataset::from_csv_path(&args.data)?);

    let mut last_pct = 0;
    let out = session.generate(|p| {
        let pct = (p.fraction() * 100.0).round() as u32;
        if pct >= last_pct + 10 || p.completed == p.total {
            eprintln!("progress {pct}% ({}/{})", p.completed, p.total);
            last_pct = pct;
        }
    })?;

    for s in &out.skipped {
        eprintln!("skipped: {}", s.reason);
    }

    ensure_parent(&args.out)?;
    std::fs::write(&args.out, &out.archive)
        .with_context(|| format!("write archive '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({} images, {} entries)",
        args.out.display(),
        out.images_generated,
        out.entries.len()
    );
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let settings = certstamp::RenderSettings::from_env()?;
    let (mut session, ids) = open_session(&args.project, settings)?;
    let id = match &args.template {
        Some(name) => session
            .templates()
            .iter()
            .find(|t| t.name() == name.as_str())
            .map(|t| t.id())
            .with_context(|| format!("no template named '{name}'"))?,
        None => *ids.first().context("project has no templates")?,
    };

    let frame = session.render_preview(id)?;
    let png = certstamp::encode_png(&frame)?;

    ensure_parent(&args.out)?;
    std::fs::write(&args.out, png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {} ({}x{})", args.out.display(), frame.width, frame.height);
    Ok(())
}

fn cmd_fields(args: FieldsArgs) -> anyhow::Result<()> {
    let dataset = certstamp::Dataset::from_csv_path(&args.data)?;
    for h in dataset.headers() {
        println!("{h}");
    }
    eprintln!("{} records", dataset.len());
    Ok(())
}
