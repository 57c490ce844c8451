use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facelib_core::{Codec, FaceError, FaceRecognition, Gallery, GalleryError, SkippedLine};
use facelib_models::{image_io, ImageRsCodec, OnnxEmbedder};
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "facelib", about = "Face gallery enrollment and identification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll the most prominent face in an image
    Enroll {
        /// Image file
        image: PathBuf,
        /// Identity to store the face under
        #[arg(short, long)]
        id: String,
    },
    /// Identify the most prominent face in an image
    Identify {
        image: PathBuf,
        /// Print the full match result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the gallery from a directory of images (identity = file name)
    Import { dir: PathBuf },
    /// List enrolled identities
    List {
        #[arg(long)]
        json: bool,
    },
    /// Remove an enrolled identity
    Remove { id: String },
    /// Print detected face locations
    Locate { image: PathBuf },
    /// Save a cropped preview of the most prominent face
    Preview { image: PathBuf, output: PathBuf },
    /// Load the gallery and report undecodable records
    Check,
}

type Recognizer = FaceRecognition<ImageRsCodec, OnnxEmbedder>;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Enroll { image, id } => {
            let mut faces = recognizer(&config)?;
            let bytes = read_image(&image)?;
            if faces.enroll(&bytes, &id)? {
                faces.save(&config.gallery_path)?;
                println!("Enrolled {id}");
            } else {
                println!("No face found in {}", image.display());
            }
        }
        Commands::Identify { image, json } => {
            let mut faces = recognizer(&config)?;
            let bytes = read_image(&image)?;
            let Some(probe) = faces.face_encoding(&bytes)? else {
                println!("No face found in {}", image.display());
                return Ok(());
            };
            if json {
                let result = faces.compare(&probe);
                let out = serde_json::json!({
                    "id": result.id,
                    "distance": result.distance,
                    "threshold": config.match_threshold,
                    "compared": result.compared,
                    "mismatched": result.mismatched,
                });
                println!("{out}");
            } else {
                match faces.identify_encoding(&probe)? {
                    Some(id) => println!("{id}"),
                    None => println!("No match"),
                }
            }
        }
        Commands::Import { dir } => {
            let mut faces = recognizer(&config)?;
            let report = faces.enroll_directory(&dir)?;
            faces.save(&config.gallery_path)?;
            println!("Enrolled {} identities from {}", report.enrolled, dir.display());
            for path in &report.no_face {
                println!("  no face: {}", path.display());
            }
            for (path, err) in &report.failed {
                println!("  failed:  {}: {err}", path.display());
            }
        }
        Commands::List { json } => {
            let codec = config.codec()?;
            let (gallery, _) = load_gallery(&codec, &config.gallery_path)?;
            if json {
                let entries: Vec<_> = gallery
                    .iter()
                    .map(|e| {
                        let (rows, columns) = e.dimensions();
                        serde_json::json!({ "id": e.id(), "rows": rows, "columns": columns })
                    })
                    .collect();
                println!("{}", serde_json::Value::Array(entries));
            } else if gallery.is_empty() {
                println!("No faces enrolled");
            } else {
                for encoding in &gallery {
                    let (rows, columns) = encoding.dimensions();
                    println!("{}\t{rows}x{columns}", encoding.id());
                }
            }
        }
        Commands::Remove { id } => {
            let codec = config.codec()?;
            let (mut gallery, _) = load_gallery(&codec, &config.gallery_path)?;
            if gallery.remove(&id) {
                codec.save(&gallery, &config.gallery_path)?;
                println!("Removed {id}");
            } else {
                println!("No identity {id}");
            }
        }
        Commands::Locate { image } => {
            let mut faces = recognizer(&config)?;
            let bytes = read_image(&image)?;
            let located = faces.face_locations(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&located)?);
        }
        Commands::Preview { image, output } => {
            let mut faces = recognizer(&config)?;
            let bytes = read_image(&image)?;
            match faces.face_preview(&bytes)? {
                Some(preview) => {
                    image_io::write_image(&preview, &output)
                        .with_context(|| format!("writing {}", output.display()))?;
                    println!("Wrote {}", output.display());
                }
                None => println!("No face found in {}", image.display()),
            }
        }
        Commands::Check => {
            let codec = config.codec()?;
            let (gallery, skipped) = load_gallery(&codec, &config.gallery_path)?;
            println!(
                "{}: {} records loaded, {} skipped (cipher: {})",
                config.gallery_path.display(),
                gallery.len(),
                skipped.len(),
                codec.cipher_name()
            );
            for SkippedLine { line, error } in &skipped {
                println!("  line {line}: {error}");
            }
        }
    }

    Ok(())
}

/// Build the recognizer and load the current gallery (a missing file is an empty gallery).
fn recognizer(config: &Config) -> Result<Recognizer> {
    let embedder = OnnxEmbedder::load(&config.model_dir, &config.model_options())
        .with_context(|| format!("loading models from {}", config.model_dir.display()))?;
    let mut faces = FaceRecognition::new(ImageRsCodec::default(), embedder, config.recognition_options())
        .with_codec(config.codec()?);

    match faces.load(&config.gallery_path) {
        Ok(skipped) => warn_skipped(&skipped),
        Err(FaceError::Gallery(GalleryError::Io(e))) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %config.gallery_path.display(), "no gallery yet; starting empty");
        }
        Err(e) => return Err(e).context("loading gallery"),
    }
    ensure_parent(&config.gallery_path)?;
    Ok(faces)
}

/// Load the gallery without models (a missing file is an empty gallery).
fn load_gallery(codec: &Codec, path: &Path) -> Result<(Gallery, Vec<SkippedLine>)> {
    match codec.load(path) {
        Ok(report) => {
            warn_skipped(&report.skipped);
            Ok((report.gallery, report.skipped))
        }
        Err(GalleryError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok((Gallery::new(), Vec::new())),
        Err(e) => Err(e).with_context(|| format!("loading gallery {}", path.display())),
    }
}

fn warn_skipped(skipped: &[SkippedLine]) {
    if !skipped.is_empty() {
        eprintln!(
            "warning: {} gallery record(s) could not be read; run `facelib check` for details",
            skipped.len()
        );
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}
