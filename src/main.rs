use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::ImageReader;
use std::path::PathBuf;

use lumiroute::LuminaireDetector;
use lumiroute::core::db::{
    BoundRouteRepository, NewObservation, ObservationKind, ObservationRepository,
    RouteRepository, RouteUpdate, SamplePointRepository, SurveyDb, SurveyRepository,
};
use lumiroute::detection::confirm::ConfirmClient;
use lumiroute::export;
use lumiroute::imagery::{ImageSize, StreetViewClient};
use lumiroute::models::GeoPoint;
use lumiroute::routing::{DEFAULT_PROFILE, OrsClient};
use lumiroute::survey::{SurveyOptions, SurveyRequest, Surveyor, score_stored};

#[derive(Parser)]
#[command(name = "lumiroute")]
#[command(about = "Score how well-lit walking routes are at night")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a walking route, fetch imagery along it and compute its light score
    Survey {
        /// Survey file to create or extend
        #[arg(long, value_name = "FILE")]
        survey: PathBuf,

        /// Start position as "lat,lng"
        #[arg(long)]
        from: String,

        /// Destination as "lat,lng"
        #[arg(long)]
        to: String,

        /// Route name (defaults to "from -> to")
        #[arg(long)]
        name: Option<String>,

        /// Number of survey points along the route
        #[arg(long)]
        samples: Option<usize>,

        /// Image size as "WxH" (provider maximum is 640x640)
        #[arg(long, default_value = "640x640")]
        size: String,

        /// Camera pitch in degrees
        #[arg(long)]
        pitch: Option<i32>,

        /// Routing profile
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,

        /// Vision-language endpoint for double-checking weak detections
        #[arg(long, value_name = "URL")]
        confirm_url: Option<String>,
    },

    /// Recompute a stored route's score, folding in current feedback
    Score {
        #[arg(long, value_name = "FILE")]
        survey: PathBuf,

        /// Route id within the survey file
        #[arg(long)]
        route: i64,
    },

    /// Manage user feedback observations
    Feedback {
        #[command(subcommand)]
        action: FeedbackAction,
    },

    /// Export a surveyed route as GeoJSON
    Export {
        #[arg(long, value_name = "FILE")]
        survey: PathBuf,

        #[arg(long)]
        route: i64,

        /// Output file
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },

    /// Run the luminaire detector on a single image file
    Detect {
        /// Path to input image file
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Save debug outputs to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum FeedbackAction {
    /// Record an observation
    Add {
        #[arg(long, value_name = "FILE")]
        survey: PathBuf,

        #[arg(long)]
        lat: f64,

        #[arg(long)]
        lng: f64,

        /// One of: lamp-out, dark-spot, well-lit, new-lamp
        #[arg(long)]
        kind: String,

        #[arg(long)]
        note: Option<String>,

        /// Reporter trust weight in [0, 1]
        #[arg(long, default_value_t = 1.0)]
        weight: f64,

        /// Route the reporter was walking, if known
        #[arg(long)]
        route: Option<i64>,
    },

    /// List stored observations
    List {
        #[arg(long, value_name = "FILE")]
        survey: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let default_filter = if args.verbose {
        "lumiroute=debug"
    } else {
        "lumiroute=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    match args.command {
        Commands::Survey {
            survey,
            from,
            to,
            name,
            samples,
            size,
            pitch,
            profile,
            confirm_url,
        } => {
            run_survey(
                survey, from, to, name, samples, size, pitch, profile, confirm_url,
            )
            .await
        }
        Commands::Score { survey, route } => run_score(survey, route).await,
        Commands::Feedback { action } => run_feedback(action).await,
        Commands::Export { survey, route, out } => run_export(survey, route, out).await,
        Commands::Detect {
            image_path,
            debug_out,
        } => run_detect(image_path, debug_out),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_survey(
    survey: PathBuf,
    from: String,
    to: String,
    name: Option<String>,
    samples: Option<usize>,
    size: String,
    pitch: Option<i32>,
    profile: String,
    confirm_url: Option<String>,
) -> Result<()> {
    let start = parse_position(&from)?;
    let end = parse_position(&to)?;
    let image_size = parse_size(&size)?;

    let ors_key = std::env::var("ORS_API_KEY")
        .context("ORS_API_KEY environment variable is not set")?;
    let maps_key = std::env::var("MAPS_API_KEY")
        .context("MAPS_API_KEY environment variable is not set")?;

    let db = SurveyDb::new(&survey).await?;
    let samples = match samples {
        Some(n) => n,
        None => db.get_default_samples().await? as usize,
    };

    let mut surveyor = Surveyor::new(OrsClient::new(ors_key)?, StreetViewClient::new(maps_key)?)
        .with_options(SurveyOptions {
            samples,
            image_size,
            pitch,
            ..Default::default()
        });
    if let Some(url) = confirm_url {
        surveyor = surveyor.with_confirm(ConfirmClient::new(url)?);
    }

    let name = name.unwrap_or_else(|| format!("{} -> {}", from, to));
    let report = surveyor
        .run(&db, SurveyRequest {
            name,
            start,
            end,
            profile,
        })
        .await?;
    db.save_survey().await?;

    println!("\n=== Route Light Score ===");
    println!("Route id: {}", report.route_id);
    println!(
        "Score: {:.1}/100 ({})",
        report.score.route_score,
        report.score.band.as_str()
    );
    println!(
        "Coverage: {:.0}% ({} surveyed, {} failed)",
        report.score.coverage * 100.0,
        report.points_surveyed,
        report.points_failed
    );
    println!("Luminaires detected: {}", report.detections_total);
    if let Some(darkest) = report.score.darkest {
        let seg = &report.score.segments[darkest];
        println!(
            "Darkest segment: points {}-{} ({:.0} m, segment score {:.2})",
            seg.start_seq, seg.end_seq, seg.length_m, seg.score
        );
    }

    Ok(())
}

async fn run_score(survey: PathBuf, route: i64) -> Result<()> {
    let db = SurveyDb::new(&survey).await?;
    let repo = db.get_route_repo(route).await?;
    let points = repo.get_points().await?;
    let observations = db.get_observations().await?;

    let score = score_stored(&points, &observations)?;
    repo.update_route(&RouteUpdate {
        light_score: Some(Some(score.route_score)),
        coverage: Some(Some(score.coverage)),
        ..Default::default()
    })
    .await?;
    db.save_survey().await?;

    println!(
        "Route {}: {:.1}/100 ({}), {} observations applied",
        route,
        score.route_score,
        score.band.as_str(),
        observations.len()
    );
    Ok(())
}

async fn run_feedback(action: FeedbackAction) -> Result<()> {
    match action {
        FeedbackAction::Add {
            survey,
            lat,
            lng,
            kind,
            note,
            weight,
            route,
        } => {
            let kind: ObservationKind = kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let db = SurveyDb::new(&survey).await?;
            let observation = db
                .add_observation(&NewObservation {
                    route_id: route,
                    position: GeoPoint::new(lat, lng),
                    kind,
                    note,
                    weight,
                })
                .await?;
            db.save_survey().await?;
            println!(
                "Recorded observation #{}: {} at {:.6},{:.6}",
                observation.id,
                observation.kind.as_str(),
                observation.position.lat,
                observation.position.lng
            );
        }
        FeedbackAction::List { survey } => {
            let db = SurveyDb::new(&survey).await?;
            let observations = db.get_observations().await?;
            println!("{} observation(s)", observations.len());
            for o in &observations {
                println!(
                    "  #{:<4} {:9} {:.6},{:.6}  weight {:.2}  {}",
                    o.id,
                    o.kind.as_str(),
                    o.position.lat,
                    o.position.lng,
                    o.weight,
                    o.note.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

async fn run_export(survey: PathBuf, route: i64, out: PathBuf) -> Result<()> {
    let db = SurveyDb::new(&survey).await?;
    let repo = db.get_route_repo(route).await?;
    let route = repo.get_route().await?;
    let points = repo.get_points().await?;

    let collection = export::route_feature_collection(&route, repo.geometry(), &points);
    export::write_geojson(&out, &collection)?;
    println!("GeoJSON saved to '{}'", out.display());
    Ok(())
}

fn run_detect(image_path: PathBuf, debug_out: Option<PathBuf>) -> Result<()> {
    let img = ImageReader::open(&image_path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;

    let detector = LuminaireDetector::default();
    let detections = match debug_out {
        Some(dir) => detector.detect_with_debug(&img, dir)?,
        None => detector.detect(&img)?,
    };

    println!("\n=== Luminaire Detection Results ===");
    println!("Total luminaires detected: {}", detections.len());
    for (i, d) in detections.iter().enumerate() {
        let (cx, cy) = d.center();
        println!(
            "  Lamp {} at ({}, {}) - {}x{} px, brightness {:.1}, confidence {:.2}",
            i + 1,
            cx,
            cy,
            d.width,
            d.height,
            d.brightness,
            d.confidence
        );
    }

    Ok(())
}

/// Parse a "lat,lng" position.
fn parse_position(input: &str) -> Result<GeoPoint> {
    let (lat, lng) = input
        .split_once(',')
        .with_context(|| format!("Expected \"lat,lng\", got '{}'", input))?;
    let lat: f64 = lat.trim().parse().context("Invalid latitude")?;
    let lng: f64 = lng.trim().parse().context("Invalid longitude")?;
    if !(-90.0..=90.0).contains(&lat) {
        anyhow::bail!("Latitude {} out of range [-90, 90]", lat);
    }
    if !(-180.0..=180.0).contains(&lng) {
        anyhow::bail!("Longitude {} out of range [-180, 180]", lng);
    }
    Ok(GeoPoint::new(lat, lng))
}

/// Parse a "WxH" image size.
fn parse_size(input: &str) -> Result<ImageSize> {
    let (w, h) = input
        .split_once('x')
        .with_context(|| format!("Expected \"WxH\", got '{}'", input))?;
    let width: u32 = w.trim().parse().context("Invalid image width")?;
    let height: u32 = h.trim().parse().context("Invalid image height")?;
    ImageSize::new(width, height)
}
