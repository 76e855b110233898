mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use track_core::backend::BackendError;
use track_core::clock::ONE_SEC_MS;
use track_core::error::TrackingError;
use track_core::geo::haversine_km;
use track_core::routing::{ResilientRouteProvider, RouteSource};
use track_core::session::{LocationSource, TrackingSession, ARRIVAL_TITLE};
use track_core::simulator::SimulatorPhase;
use track_core::status::TimelineView;
use track_core::test_helpers::{
    customer_location, provider_location, sample_order, ExhaustedRouteProvider,
    FakeLocationService, RecordingNotifier, RecordingSleeper, ScriptedEndpoint,
};
use support::{unchecked_coordinate, HarnessBuilder, ORDER_ID, PROVIDER_ID};

const MINUTE_MS: u64 = 60 * ONE_SEC_MS;

#[test]
fn session_arrives_within_initial_eta() {
    let harness = HarnessBuilder::new().build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    let view = session.view();
    let initial = view.simulation.expect("simulation state");
    assert_eq!(initial.eta_minutes, 3.0);
    assert_eq!(initial.remaining_distance_km, 1.5);
    assert_eq!(view.eta_label, "3 mins");
    assert_eq!(view.marker, provider_location());
    assert_eq!(session.phase(), SimulatorPhase::Running);

    session.run_until(3 * MINUTE_MS);

    assert_eq!(session.phase(), SimulatorPhase::Arrived);
    let arrived_at = session.arrived_at().expect("arrived");
    assert!(arrived_at <= 3 * MINUTE_MS);
    let view = session.view();
    let state = view.simulation.expect("simulation state");
    assert!(state.has_arrived);
    assert_eq!(state.remaining_distance_km, 0.0);
    assert_eq!(state.position, customer_location());
    assert_eq!(view.eta_label, "Arrived");
    assert_eq!(view.marker, customer_location());
    // Arrival stops the tick and ETA timers; the marker timer stops once the
    // marker reaches the destination.
    assert_eq!(session.clock().active_timers(), 0);
}

#[test]
fn eta_label_refreshes_on_its_own_timer() {
    let harness = HarnessBuilder::new().build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    // The label only changes when the refresh timer fires (every 15 s).
    session.run_until(14 * ONE_SEC_MS);
    assert_eq!(session.view().eta_label, "3 mins");
    session.run_until(45 * ONE_SEC_MS);
    let view = session.view();
    assert_eq!(view.simulation.expect("state").eta_minutes, 2.0);
    assert_eq!(view.eta_label, "2 mins");
}

#[test]
fn marker_trails_simulated_position_between_ticks() {
    let harness = HarnessBuilder::new().build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    session.run_until(8 * ONE_SEC_MS);
    let view = session.view();
    let simulated = view.simulation.expect("state").position;
    let start = provider_location();
    let marker_progress = haversine_km(start, view.marker);
    let simulated_progress = haversine_km(start, simulated);
    assert!(marker_progress > 0.0);
    assert!(marker_progress < simulated_progress);
}

#[test]
fn arrival_notification_fires_once() {
    let harness = HarnessBuilder::new().build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    session.run_until(5 * MINUTE_MS);
    session.run_until(10 * MINUTE_MS);

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ARRIVAL_TITLE);
}

#[test]
fn notification_denial_only_suppresses_arrival_alert() {
    let harness = HarnessBuilder::new()
        .with_notifier(RecordingNotifier::denied())
        .build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    session.run_until(5 * MINUTE_MS);

    assert_eq!(session.phase(), SimulatorPhase::Arrived);
    assert!(harness.notifier.sent().is_empty());
    assert!(session.view().alerts.is_empty());
}

#[test]
fn unmount_clears_timers_and_subscription() {
    let harness = HarnessBuilder::new().build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    session.run_until(20 * ONE_SEC_MS);
    assert_eq!(session.clock().active_timers(), 3);
    assert_eq!(harness.backend.subscriber_count(ORDER_ID), 1);

    session.unmount();
    assert!(!session.is_mounted());
    assert_eq!(session.clock().active_timers(), 0);
    assert_eq!(harness.backend.subscriber_count(ORDER_ID), 0);

    session.unmount();
    assert_eq!(session.run_until(10 * MINUTE_MS), 0);
    assert_eq!(session.phase(), SimulatorPhase::Idle);
    assert!(harness.notifier.sent().is_empty());
}

#[test]
fn dropping_session_unsubscribes() {
    let harness = HarnessBuilder::new().build();
    let session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");
    assert_eq!(harness.backend.subscriber_count(ORDER_ID), 1);
    drop(session);
    assert_eq!(harness.backend.subscriber_count(ORDER_ID), 0);
}

#[test]
fn device_position_is_preferred_and_geocoded() {
    let harness = HarnessBuilder::new()
        .with_location(
            FakeLocationService::granted(customer_location()).with_label("Gulberg III, Lahore"),
        )
        .with_delivery(provider_location())
        .build();
    let session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    let customer = session.view().customer;
    assert_eq!(customer.source, LocationSource::Device);
    assert_eq!(customer.coordinate, customer_location());
    assert_eq!(customer.label.as_deref(), Some("Gulberg III, Lahore"));
}

#[test]
fn location_denial_falls_back_to_order_address() {
    let harness = HarnessBuilder::new()
        .with_location(FakeLocationService::denied())
        .with_delivery(customer_location())
        .build();
    let session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    let customer = session.view().customer;
    assert_eq!(customer.source, LocationSource::OrderAddress);
    assert_eq!(customer.coordinate, customer_location());
    assert_eq!(customer.label.as_deref(), Some("House 12, Gulberg III"));
    assert_eq!(harness.location.position_requests(), 0);
}

#[test]
fn location_timeout_without_address_uses_fallback_coordinate() {
    let harness = HarnessBuilder::new()
        .with_location(FakeLocationService::timing_out())
        .build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    let customer = session.view().customer;
    assert_eq!(customer.source, LocationSource::Fallback);
    assert_eq!(
        customer.coordinate,
        harness.ctx.params.fallback_customer_location
    );
    assert_eq!(harness.location.position_requests(), 1);

    // Tracking still works against the fallback coordinate.
    session.run_until(5 * MINUTE_MS);
    assert_eq!(session.phase(), SimulatorPhase::Arrived);
    assert_eq!(
        session.view().simulation.expect("state").position,
        harness.ctx.params.fallback_customer_location
    );
}

#[test]
fn status_updates_arrive_through_the_feed() {
    let harness = HarnessBuilder::new().build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");
    assert_eq!(session.view().timeline.current_index(), Some(0));

    harness
        .backend
        .put_order(sample_order(ORDER_ID, "Picked Up", None));
    // Delivered on the next loop step, not synchronously.
    assert_eq!(session.view().timeline.current_index(), Some(0));
    session.run_until(session.clock().now());
    assert_eq!(session.view().timeline.current_index(), Some(1));
    assert_eq!(session.view().order_status, "Picked Up");
}

#[test]
fn unknown_status_renders_no_progress() {
    let harness = HarnessBuilder::new().build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    harness
        .backend
        .put_order(sample_order(ORDER_ID, "washing", None));
    session.run_until(ONE_SEC_MS);

    match session.view().timeline {
        TimelineView::Steps {
            current,
            unrecognized,
            ..
        } => {
            assert_eq!(current, None);
            assert_eq!(unrecognized.as_deref(), Some("washing"));
        }
        TimelineView::Cancelled => panic!("unknown status is not a cancellation"),
    }
    assert_eq!(session.status().unrecognized_updates(), 1);
}

#[test]
fn cancel_waits_for_feed_confirmation() {
    let harness = HarnessBuilder::new().build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    session.cancel_order().expect("cancel");
    let view = session.view();
    assert!(view.cancel_pending);
    assert!(!view.timeline.is_cancelled());
    assert_eq!(
        harness.backend.order(ORDER_ID).expect("order").status,
        "Cancelled"
    );

    session.run_until(session.clock().now());
    let view = session.view();
    assert!(!view.cancel_pending);
    assert_eq!(view.timeline, TimelineView::Cancelled);
    assert_eq!(session.clock().active_timers(), 0);
    assert!(view.alerts.is_empty());
}

#[test]
fn mounting_cancelled_order_schedules_nothing() {
    let harness = HarnessBuilder::new().with_status("Cancelled").build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    assert_eq!(session.view().timeline, TimelineView::Cancelled);
    assert_eq!(session.clock().active_timers(), 0);
    assert_eq!(session.phase(), SimulatorPhase::Idle);

    session.run_until(5 * MINUTE_MS);

    assert_eq!(session.phase(), SimulatorPhase::Idle);
    assert!(session.arrived_at().is_none());
    assert!(harness.notifier.sent().is_empty());
    assert_eq!(session.view().marker, provider_location());
    assert_eq!(harness.backend.subscriber_count(ORDER_ID), 1);
}

#[test]
fn cancel_rejected_after_pickup() {
    let harness = HarnessBuilder::new().with_status("Picked Up").build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    let err = session.cancel_order().expect_err("not cancellable");
    assert!(matches!(err, TrackingError::CancelNotAllowed { .. }));
    assert_eq!(
        harness.backend.order(ORDER_ID).expect("order").status,
        "Picked Up"
    );
    assert_eq!(session.view().alerts.len(), 1);
}

#[test]
fn cancel_write_failure_alerts_without_state_change() {
    let harness = HarnessBuilder::new().build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");
    harness
        .backend
        .set_write_failure(Some(BackendError::Unavailable("offline".to_string())));

    let err = session.cancel_order().expect_err("write fails");
    assert!(matches!(
        err,
        TrackingError::Backend(BackendError::Unavailable(_))
    ));

    session.run_until(session.clock().now());
    let view = session.view();
    assert!(!view.cancel_pending);
    assert_eq!(view.order_status, "Order Placed");
    assert_eq!(view.alerts.len(), 1);
    assert!(!view.alerts[0].navigate_back);
    assert_eq!(session.take_alerts().len(), 1);
    assert!(session.view().alerts.is_empty());
}

#[test]
fn invalid_provider_location_alerts_and_navigates_back() {
    let harness = HarnessBuilder::new()
        .with_provider_location(unchecked_coordinate(31.5, 200.0))
        .build();

    let err = match TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID) {
        Ok(_) => panic!("invalid provider location must not mount"),
        Err(err) => err,
    };
    assert!(matches!(err, TrackingError::InvalidProviderLocation(_)));
    let alert = err.alert();
    assert_eq!(alert.message, "Invalid location coordinates.");
    assert!(alert.navigate_back);
    assert_eq!(harness.backend.subscriber_count(ORDER_ID), 0);
}

#[test]
fn route_exhaustion_fails_mount_without_leaks() {
    let harness = HarnessBuilder::new()
        .with_routes(Arc::new(ExhaustedRouteProvider))
        .build();

    let err = match TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID) {
        Ok(_) => panic!("exhausted routing must not mount"),
        Err(err) => err,
    };
    assert!(err.alert().navigate_back);
    assert_eq!(harness.backend.subscriber_count(ORDER_ID), 0);
}

#[test]
fn missing_order_is_a_backend_error() {
    let harness = HarnessBuilder::new().build();
    let err = match TrackingSession::mount(harness.ctx.clone(), "missing", PROVIDER_ID) {
        Ok(_) => panic!("missing order must not mount"),
        Err(err) => err,
    };
    assert!(matches!(
        err,
        TrackingError::Backend(BackendError::NotFound { .. })
    ));
}

#[test]
fn synthetic_routes_track_end_to_end() {
    let harness = HarnessBuilder::new().with_configured_routes().build();
    let mut session =
        TrackingSession::mount(harness.ctx.clone(), ORDER_ID, PROVIDER_ID).expect("mount");

    assert_eq!(session.route().source, RouteSource::Synthetic);
    assert_eq!(session.route().path.first(), provider_location());
    assert_eq!(session.route().path.last(), customer_location());
    let eta = session.view().simulation.expect("state").eta_minutes;
    assert_eq!(eta, 3.0);

    session.run_until(eta as u64 * MINUTE_MS);
    assert_eq!(session.phase(), SimulatorPhase::Arrived);
}

#[test]
fn failing_endpoints_still_produce_a_tracked_route() {
    let harness = HarnessBuilder::new().build();
    let primary = ScriptedEndpoint::failing("primary");
    let alternate = ScriptedEndpoint::failing("alternate");
    let primary_calls = primary.calls();
    let alternate_calls = alternate.calls();
    let sleeper = RecordingSleeper::default();
    let delays = sleeper.delays();
    let provider = ResilientRouteProvider::new(Box::new(primary), &harness.ctx.params)
        .with_alternate(Box::new(alternate))
        .with_sleeper(Box::new(sleeper));
    let ctx = harness.ctx.clone().with_routes(Arc::new(provider));

    let session = TrackingSession::mount(ctx, ORDER_ID, PROVIDER_ID).expect("mount");

    assert_eq!(session.route().source, RouteSource::Synthetic);
    assert_eq!(primary_calls.load(Ordering::SeqCst), 3);
    assert_eq!(alternate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(delays.lock().expect("delays").len(), 3);
}
