//! Mount a tracking session against in-memory collaborators and run it to arrival.
//!
//! Run with: cargo run -p track_core --example tracking_run
//! Set RUST_LOG=track_core=debug to see every position tick.

use std::sync::Arc;

use track_core::backend::memory::MemoryBackend;
use track_core::backend::OrderStore;
use track_core::clock::ONE_SEC_MS;
use track_core::context::AppContext;
use track_core::params::TrackingParams;
use track_core::session::TrackingSession;
use track_core::test_helpers::{
    customer_location, provider_location, sample_order, sample_provider, FakeLocationService,
    RecordingNotifier,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("track_core=info")),
        )
        .init();

    const ORDER_ID: &str = "order-1042";
    const PROVIDER_ID: &str = "provider-7";
    const REPORT_EVERY_MS: u64 = 30 * ONE_SEC_MS;
    const LIMIT_MS: u64 = 30 * 60 * ONE_SEC_MS;

    let backend = MemoryBackend::new()
        .with_order(sample_order(ORDER_ID, "Out for Delivery", None))
        .with_provider(sample_provider(PROVIDER_ID, provider_location()));
    let notifier = Arc::new(RecordingNotifier::granted());
    let ctx = AppContext::with_memory_backend(
        backend.clone(),
        Arc::new(
            FakeLocationService::granted(customer_location()).with_label("Gulberg III, Lahore"),
        ),
        notifier.clone(),
        TrackingParams::default().with_seed(123),
    );

    let mut session = match TrackingSession::mount(ctx, ORDER_ID, PROVIDER_ID) {
        Ok(session) => session,
        Err(err) => {
            let alert = err.alert();
            eprintln!("{}: {}", alert.title, alert.message);
            return;
        }
    };

    let view = session.view();
    println!("--- Tracking {} from {} ---", view.order_id, view.provider_name);
    println!(
        "Route: {:?}, {:.2} km, ~{:.1} min; deliver to {}",
        session.route().source,
        view.route_distance_km,
        view.route_duration_minutes,
        view.customer.label.as_deref().unwrap_or("current location"),
    );

    let mut now = 0;
    while session.arrived_at().is_none() && now < LIMIT_MS {
        now += REPORT_EVERY_MS;
        session.run_until(now);
        let view = session.view();
        if let Some(state) = view.simulation {
            println!(
                "t={:>4}s  remaining={:.3} km  eta={:<8}  marker=({:.5}, {:.5})",
                now / ONE_SEC_MS,
                state.remaining_distance_km,
                view.eta_label,
                view.marker.latitude(),
                view.marker.longitude(),
            );
        }
    }

    if let Err(err) = backend.update_status(ORDER_ID, "Delivered") {
        eprintln!("status update failed: {err}");
    }
    session.run_until(now + ONE_SEC_MS);
    println!("Order status: {}", session.view().order_status);
    println!("Notifications sent: {}", notifier.sent().len());

    session.unmount();
    println!(
        "After unmount: {} timers, {} subscribers",
        session.clock().active_timers(),
        backend.subscriber_count(ORDER_ID)
    );
}
