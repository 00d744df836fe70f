//! Generate a route from a short drive that crosses two wards.
//!
//! Run with: cargo run --example basic_route

use auto_route::{
    Analysis, AutoRouter, GpsPoint, RegionGeometry, RouteConfig, TrackFeature, TrackGeometry,
};
use geo::{polygon, Geometry};

#[tokio::main]
async fn main() {
    // Two neighbouring wards (London area), split at -0.1250
    let wards = vec![
        RegionGeometry::named(
            "Ward North",
            Geometry::Polygon(polygon![
                (x: -0.1300, y: 51.5000),
                (x: -0.1250, y: 51.5000),
                (x: -0.1250, y: 51.5050),
                (x: -0.1300, y: 51.5050),
            ]),
        ),
        RegionGeometry::named(
            "Ward South",
            Geometry::Polygon(polygon![
                (x: -0.1250, y: 51.5000),
                (x: -0.1200, y: 51.5000),
                (x: -0.1200, y: 51.5050),
                (x: -0.1250, y: 51.5050),
            ]),
        ),
    ];

    // A recorded path through the first ward plus a few stray fixes in the second
    let mut features = vec![TrackFeature::Path(
        (0..30)
            .map(|i| GpsPoint::new(51.5005 + i as f64 * 0.00012, -0.1290 + (i % 3) as f64 * 0.00002))
            .collect(),
    )];
    features.extend((0..4).map(|i| TrackFeature::Point(GpsPoint::new(51.5020 + i as f64 * 0.0002, -0.1220))));
    let track = TrackGeometry::new(features);

    let config = RouteConfig::default();
    println!("Auto Route Example\n");
    println!(
        "Config: buffer={}m, smoothing={}, snap={}\n",
        config.buffer_meters, config.smoothing_tolerance, config.snap_to_network
    );

    let router = match AutoRouter::new(config) {
        Ok(router) => router,
        Err(e) => {
            eprintln!("Bad config: {}", e);
            return;
        }
    };

    let generated = match router.analyze(&track, &wards).await {
        Ok(Analysis::Generated(generated)) => generated,
        Ok(Analysis::NeedsSelection(selection)) => {
            println!("Track crosses {} wards:", selection.candidates.len());
            for candidate in &selection.candidates {
                println!(
                    "   {:<12} {:>3} points  {:>5.1}%",
                    candidate.name, candidate.point_count, candidate.match_percentage
                );
            }
            // A real host would ask the user; take the best-ranked one here
            let best = selection.candidates[0].clone();
            println!("\nPicking {}\n", best.name);
            match router.generate_for_candidate(&selection, &best).await {
                Ok(generated) => generated,
                Err(e) => {
                    eprintln!("Generation failed: {}", e);
                    return;
                }
            }
        }
        Err(e) => {
            eprintln!("Analysis failed: {}", e);
            return;
        }
    };

    let route = &generated.route;
    println!("{}", route.name);
    println!("   {}", route.description);
    println!("   Vertices: {}", route.points.len());
    println!("   Length: {:.0}m", route.length_meters);
    println!(
        "   Points: {} total, {} in ward ({}%)",
        generated.stats.original_point_count,
        generated.stats.filtered_point_count,
        generated.stats.efficiency()
    );
    if let Some(warning) = generated.warning() {
        println!("   Warning: {}", warning);
    }
}
