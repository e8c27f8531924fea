//! Procedure selection integration tests.
//!
//! Builds plans from the shared navigation fixture and checks how departure,
//! arrival and approach segments are strung together.
//!
//! Run with: cargo test -p fpm-core --test procedure_test

use fpm_core::{
    FlightPlan, FlightPlanElement, LegType, PlanError, ProcedureEdit, SegmentKind,
    StaticNavDatabase,
};
use pretty_assertions::assert_eq;

const DISC: &str = "---F-PLN DISCONTINUITY---";

fn navdata() -> StaticNavDatabase {
    StaticNavDatabase::from_json_str(include_str!("data/navdata.json")).unwrap()
}

fn idents(plan: &FlightPlan) -> Vec<String> {
    plan.all_legs().iter().map(|e| e.ident().to_string()).collect()
}

fn segment_idents(plan: &FlightPlan, kind: SegmentKind) -> Vec<String> {
    plan.segment(kind)
        .elements()
        .iter()
        .map(|e| e.ident().to_string())
        .collect()
}

/// IF legs exactly at the start and after each discontinuity, never two discontinuities in a row.
fn assert_well_formed(plan: &FlightPlan) {
    let legs = plan.all_legs();
    for (i, element) in legs.iter().enumerate() {
        let after_discontinuity = i > 0 && legs[i - 1].is_discontinuity();
        match element {
            FlightPlanElement::Discontinuity => {
                assert!(!after_discontinuity, "adjacent discontinuities at {}", i)
            }
            FlightPlanElement::Leg(leg) => assert_eq!(
                leg.leg_type == LegType::IF,
                i == 0 || after_discontinuity,
                "leg {} at {} has type {}",
                leg.ident,
                i,
                leg.leg_type
            ),
        }
    }
}

async fn departure_plan(db: &StaticNavDatabase) -> FlightPlan {
    let mut plan = FlightPlan::for_city_pair(db, 0, "CYYZ", "EGLL", None).await.unwrap();
    plan.set_procedure(db, ProcedureEdit::OriginRunway("06R".into()))
        .await
        .unwrap();
    plan.set_procedure(db, ProcedureEdit::Departure(Some("AVSEP6".into())))
        .await
        .unwrap();
    plan
}

#[tokio::test]
async fn test_city_pair() {
    let db = navdata();
    let plan = FlightPlan::for_city_pair(&db, 0, "CYYZ", "EGLL", None).await.unwrap();

    assert_eq!(idents(&plan), vec!["CYYZ", "EGLL"]);
    assert_eq!(plan.version(), 2);
    assert_eq!(plan.available().origin_runways.len(), 2);
    assert_eq!(plan.available().approaches.len(), 2);
    assert_well_formed(&plan);
}

#[tokio::test]
async fn test_origin_runway_adds_extended_centerline() {
    let db = navdata();
    let mut plan = FlightPlan::for_city_pair(&db, 0, "CYYZ", "EGLL", None).await.unwrap();
    plan.set_procedure(&db, ProcedureEdit::OriginRunway("RW06R".into()))
        .await
        .unwrap();

    assert_eq!(idents(&plan), vec!["CYYZ06R", "2061", DISC, "EGLL"]);
    let centerline = plan.leg_at(1).unwrap();
    assert_eq!(centerline.leg_type, LegType::FA);
    assert_eq!(centerline.definition.magnetic_course, Some(57.0));
    assert_eq!(
        centerline.definition.altitude.map(|a| a.altitude1_ft),
        Some(2061.0)
    );
    assert_well_formed(&plan);
}

#[tokio::test]
async fn test_departure_strings_runway_transition() {
    let db = navdata();
    let plan = departure_plan(&db).await;

    assert_eq!(
        idents(&plan),
        vec![
            "CYYZ06R", "1000", "YYZ01", "YYZ02", "YYZ03", "DUVKO", "AVSEP", "NUBAL", "PEDPO",
            DISC, "EGLL"
        ]
    );
    // The departure replaced the centerline leg
    assert_eq!(segment_idents(&plan, SegmentKind::Origin), vec!["CYYZ06R"]);
    assert_eq!(
        plan.origin_leg().map(|l| l.annotation.as_str()),
        Some("AVSEP6")
    );
    assert!(plan.segment(SegmentKind::DepartureRunwayTransition).is_strung());
    assert_well_formed(&plan);
}

#[tokio::test]
async fn test_delete_in_runway_transition_redistributes_departure() {
    let db = navdata();
    let mut plan = departure_plan(&db).await;
    let version = plan.version();

    plan.remove_element_at(4, false).unwrap();

    assert_eq!(
        segment_idents(&plan, SegmentKind::DepartureRunwayTransition),
        vec!["1000", "YYZ01", "YYZ02", "DUVKO"]
    );
    assert!(plan.segment(SegmentKind::Departure).is_empty());
    assert_eq!(
        segment_idents(&plan, SegmentKind::Enroute)[0],
        "AVSEP"
    );
    assert_eq!(plan.version(), version + 1);
    assert_well_formed(&plan);
}

#[tokio::test]
async fn test_delete_with_discontinuity_stays_at_segment_end() {
    let db = navdata();
    let mut plan = departure_plan(&db).await;

    plan.remove_element_at(4, true).unwrap();

    assert_eq!(
        segment_idents(&plan, SegmentKind::DepartureRunwayTransition),
        vec!["1000", "YYZ01", "YYZ02", DISC]
    );
    assert_eq!(
        idents(&plan)[..6],
        ["CYYZ06R", "1000", "YYZ01", "YYZ02", DISC, "DUVKO"]
    );
    assert_well_formed(&plan);
}

#[tokio::test]
async fn test_insert_absorbs_downstream_duplicate() {
    let db = navdata();
    let mut plan = departure_plan(&db).await;
    let count = plan.leg_count();
    let duvko = plan.leg_at(5).unwrap().definition.waypoint.unwrap();
    assert_eq!(duvko.ident, "DUVKO");

    plan.insert_waypoint_after(2, duvko).unwrap();

    assert_eq!(
        idents(&plan),
        vec!["CYYZ06R", "1000", "YYZ01", "DUVKO", "AVSEP", "NUBAL", "PEDPO", DISC, "EGLL"]
    );
    // Two intervening legs and the duplicate removed, one leg added
    assert_eq!(plan.leg_count(), count - 2);
    assert_well_formed(&plan);
}

#[tokio::test]
async fn test_departure_enroute_transition() {
    let db = navdata();
    let mut plan = departure_plan(&db).await;
    plan.set_procedure(&db, ProcedureEdit::DepartureEnrouteTransition(Some("TAVOX".into())))
        .await
        .unwrap();

    assert_eq!(segment_idents(&plan, SegmentKind::Departure), vec!["AVSEP", "NUBAL"]);
    assert_eq!(
        idents(&plan)[6..],
        ["AVSEP", "NUBAL", "PEDPO", "TAVOX", DISC, "EGLL"]
    );
    assert_eq!(
        plan.procedures().departure_enroute_transition.as_deref(),
        Some("TAVOX")
    );
    assert_well_formed(&plan);
}

#[tokio::test]
async fn test_transition_without_departure_is_illegal() {
    let db = navdata();
    let mut plan = FlightPlan::for_city_pair(&db, 0, "CYYZ", "EGLL", None).await.unwrap();
    let err = plan
        .set_procedure(&db, ProcedureEdit::DepartureEnrouteTransition(Some("TAVOX".into())))
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::IllegalState(_)));
    assert_eq!(plan.version(), 2);
}

#[tokio::test]
async fn test_unknown_procedure_keeps_version() {
    let db = navdata();
    let mut plan = departure_plan(&db).await;
    let version = plan.version();
    let legs = plan.all_legs();

    let err = plan
        .set_procedure(&db, ProcedureEdit::Departure(Some("NOPE1".into())))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PlanError::NotFound {
            what: "departure",
            ident: "NOPE1".into()
        }
    );
    assert_eq!(plan.version(), version);
    assert_eq!(plan.all_legs()[..], legs[..]);
}

#[tokio::test]
async fn test_approach_via_joins_at_lam() {
    let db = navdata();
    let mut plan = FlightPlan::for_city_pair(&db, 0, "CYYZ", "EGLL", None).await.unwrap();
    plan.set_procedure(&db, ProcedureEdit::DestinationRunway("27R".into()))
        .await
        .unwrap();
    plan.set_procedure(&db, ProcedureEdit::Approach(Some("I27R".into())))
        .await
        .unwrap();
    plan.set_procedure(&db, ProcedureEdit::ApproachVia(Some("LAM".into())))
        .await
        .unwrap();
    plan.set_procedure(&db, ProcedureEdit::Arrival(Some("LOGA2H".into())))
        .await
        .unwrap();

    let legs = plan.all_legs();
    let lam = legs
        .iter()
        .position(|e| e.ident() == "LAM")
        .expect("LAM in plan");
    let join = legs[lam].as_leg().unwrap();
    let next = legs[lam + 1].as_leg().unwrap();
    assert_eq!((join.ident.as_str(), join.leg_type), ("LAM", LegType::TF));
    assert_eq!((next.ident.as_str(), next.leg_type), ("LAM/11", LegType::FD));

    assert_eq!(
        idents(&plan),
        vec![
            "CYYZ", "LOGAN", "SABER", "BRASO", "LAM", "LAM/11", "CI27R", "FI27R", "EGLL27R",
            "1080", "EPM", "EPM"
        ]
    );
    assert_eq!(plan.destination_leg_index(), Some(8));
    assert_eq!(plan.first_missed_approach_leg_index(), 9);
    assert_well_formed(&plan);
}

#[tokio::test]
async fn test_approach_selects_its_runway() {
    let db = navdata();
    let mut plan = FlightPlan::for_city_pair(&db, 0, "CYYZ", "EGLL", None).await.unwrap();
    plan.set_procedure(&db, ProcedureEdit::Approach(Some("I27R".into())))
        .await
        .unwrap();

    assert_eq!(
        plan.procedures().destination_runway.as_ref().map(|r| r.ident.as_str()),
        Some("RW27R")
    );
    assert_eq!(plan.destination_leg().map(|l| l.ident.as_str()), Some("EGLL27R"));
    assert!(plan.ends_at_runway());
}

#[tokio::test]
async fn test_circling_approach_excludes_destination() {
    let db = navdata();
    let mut plan = FlightPlan::for_city_pair(&db, 0, "CYYZ", "EGLL", None).await.unwrap();
    plan.set_procedure(&db, ProcedureEdit::Arrival(Some("LOGA2H".into())))
        .await
        .unwrap();
    plan.set_procedure(&db, ProcedureEdit::Approach(Some("VOR-A".into())))
        .await
        .unwrap();

    assert!(!plan.ends_at_runway());
    assert_eq!(
        idents(&plan),
        vec!["CYYZ", "LOGAN", "SABER", "BRASO", "LAM", "LON", "EPM"]
    );
    // The destination segment still holds the airport leg
    assert_eq!(segment_idents(&plan, SegmentKind::Destination), vec!["EGLL"]);
    // Destination index falls on the last approach leg
    assert_eq!(plan.destination_leg_index(), Some(5));
    assert_eq!(plan.first_missed_approach_leg_index(), 6);
    assert_well_formed(&plan);
}

#[tokio::test]
async fn test_clearing_approach_restores_destination() {
    let db = navdata();
    let mut plan = FlightPlan::for_city_pair(&db, 0, "CYYZ", "EGLL", None).await.unwrap();
    plan.set_procedure(&db, ProcedureEdit::Approach(Some("VOR-A".into())))
        .await
        .unwrap();
    plan.set_procedure(&db, ProcedureEdit::Approach(None))
        .await
        .unwrap();

    assert!(plan.ends_at_runway());
    assert_eq!(idents(&plan).last().map(String::as_str), Some("EGLL"));
    assert!(plan.segment(SegmentKind::MissedApproach).is_empty());
    assert!(plan.available().approach_vias.is_empty());
}

#[tokio::test]
async fn test_restring_is_stable() {
    let db = navdata();
    let mut plan = departure_plan(&db).await;
    plan.set_procedure(&db, ProcedureEdit::Arrival(Some("LOGA2H".into())))
        .await
        .unwrap();
    let before = plan.all_legs();

    plan.restring().unwrap();
    assert_eq!(plan.all_legs()[..], before[..]);
    plan.restring().unwrap();
    assert_eq!(plan.all_legs()[..], before[..]);
}
