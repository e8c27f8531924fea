//! fpln - build a flight plan from a JSON navigation database.
//!
//! Loads the database, creates a city pair in the active plan, applies the
//! requested procedures through the temporary plan and prints the result.

mod render;

use anyhow::{Context, Result};
use clap::Parser;
use fpm_core::StaticNavDatabase;
use fpm_service::{FlightPlanService, FpmConfig, PlanIndex};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build and print a flight plan
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Navigation database JSON file
    #[arg(long)]
    navdata: PathBuf,

    /// Origin airport ICAO
    #[arg(long)]
    from: String,

    /// Destination airport ICAO
    #[arg(long)]
    to: String,

    /// Alternate airport ICAO
    #[arg(long)]
    altn: Option<String>,

    /// Origin runway, e.g. 06R
    #[arg(long)]
    origin_runway: Option<String>,

    /// Departure (SID) ident
    #[arg(long)]
    departure: Option<String>,

    /// Departure enroute transition ident
    #[arg(long)]
    departure_transition: Option<String>,

    /// Arrival enroute transition ident
    #[arg(long)]
    arrival_transition: Option<String>,

    /// Arrival (STAR) ident
    #[arg(long)]
    arrival: Option<String>,

    /// Approach ident
    #[arg(long)]
    approach: Option<String>,

    /// Approach via ident
    #[arg(long)]
    via: Option<String>,

    /// Destination runway, e.g. 27R
    #[arg(long)]
    destination_runway: Option<String>,

    /// Waypoints to insert after the origin, in order
    #[arg(long, value_delimiter = ',')]
    waypoints: Vec<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fpm_service=info".parse()?)
                .add_directive("fpm_core=warn".parse()?),
        )
        .init();

    let args = Args::parse();

    let db = StaticNavDatabase::from_json_file(&args.navdata)
        .with_context(|| format!("loading {}", args.navdata.display()))?;
    let config = FpmConfig::from_env();
    tracing::debug!("Using {:?}", config);

    let service = FlightPlanService::new(Arc::new(db), config);
    service.create_flight_plans()?;
    service
        .new_city_pair(&args.from, &args.to, args.altn.as_deref(), PlanIndex::Active)
        .await
        .context("creating city pair")?;

    apply_procedures(&service, &args).await?;

    let mut after = 0;
    for ident in &args.waypoints {
        let inserted = service
            .insert_waypoint_by_ident(after, ident, PlanIndex::Active)
            .await
            .with_context(|| format!("inserting {}", ident))?;
        if inserted {
            after += 1;
        }
    }

    if service.has_temporary() {
        service.temporary_insert()?;
    }

    let output = service.read(PlanIndex::Active, |plan| {
        let legs = plan.all_legs();
        let report = render::report(plan, &legs);
        if args.json {
            serde_json::to_string_pretty(&report).map_err(anyhow::Error::from)
        } else {
            Ok(render::table(&report))
        }
    })??;
    println!("{}", output);

    Ok(())
}

async fn apply_procedures(
    service: &FlightPlanService<StaticNavDatabase>,
    args: &Args,
) -> Result<()> {
    let plan = PlanIndex::Active;

    if let Some(runway) = &args.origin_runway {
        service.set_origin_runway(runway, plan).await?;
    }
    if args.departure.is_some() {
        service.set_departure(args.departure.as_deref(), plan).await?;
    }
    if args.departure_transition.is_some() {
        service
            .set_departure_enroute_transition(args.departure_transition.as_deref(), plan)
            .await?;
    }
    if args.arrival.is_some() {
        service.set_arrival(args.arrival.as_deref(), plan).await?;
    }
    if args.arrival_transition.is_some() {
        service
            .set_arrival_enroute_transition(args.arrival_transition.as_deref(), plan)
            .await?;
    }
    if let Some(runway) = &args.destination_runway {
        service.set_destination_runway(runway, plan).await?;
    }
    if args.approach.is_some() {
        service.set_approach(args.approach.as_deref(), plan).await?;
    }
    if args.via.is_some() {
        service.set_approach_via(args.via.as_deref(), plan).await?;
    }
    Ok(())
}
