use std::path::PathBuf;

use clap::Parser;

use cleave_gltf::document::Document;
use cleave_gltf::split::split_disconnected_meshes;

#[derive(Parser)]
#[command(name = "cleave")]
#[command(about = "Split glTF meshes into their disconnected pieces", long_about = None)]
struct Cli {
    /// Input glTF document (a file picker opens when omitted)
    input: Option<PathBuf>,

    /// Output path (a save dialog opens when omitted)
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let input = match cli.input {
        Some(path) => path,
        None => pick_input()?,
    };
    tracing::info!("Splitting {:?}", input);

    let mut document = Document::load(&input)?;
    split_disconnected_meshes(&mut document)?;

    let output = match cli.output {
        Some(path) => path,
        None => pick_output()?,
    };
    document.write(&output)?;
    println!("Wrote {}", output.display());

    Ok(())
}

fn pick_input() -> anyhow::Result<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Select a glTF File")
        .add_filter("glTF files", &["gltf"])
        .add_filter("JSON files", &["json"])
        .add_filter("All files", &["*"])
        .pick_file()
        .ok_or_else(|| anyhow::anyhow!("no input file selected"))
}

fn pick_output() -> anyhow::Result<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Save As")
        .add_filter("glTF files", &["gltf"])
        .add_filter("All files", &["*"])
        .save_file()
        .ok_or_else(|| anyhow::anyhow!("no output file selected"))
}
