use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::marketplace::campaign::RewardModel;
use crate::marketplace::router::{self, marketplace_router};
use crate::marketplace::{InMemoryMarketplaceStore, RepositoryError};

fn app(h: &Harness) -> Router {
    marketplace_router(h.service.clone())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

#[tokio::test]
async fn registers_and_fetches_influencers() {
    let h = harness();
    let profile = serde_json::to_value(influencer("yan", 14_000)).expect("serializes");

    let response = app(&h)
        .oneshot(post_json("/api/v1/influencers", profile))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app(&h)
        .oneshot(get("/api/v1/influencers/inf-yan"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["followers"], json!(14_000));
    assert_eq!(payload["state"], json!("verified"));
}

#[tokio::test]
async fn registration_measures_engagement_from_recent_posts() {
    let h = harness();
    let mut profile = serde_json::to_value(influencer("zoe", 10_000)).expect("serializes");
    profile["recent_posts"] = json!([
        { "likes": 250, "comments": 50 },
        { "likes": 80, "comments": 20 },
    ]);

    let response = app(&h)
        .oneshot(post_json("/api/v1/influencers", profile))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let stored = h
        .service
        .influencer(&"inf-zoe".into())
        .expect("influencer stored");
    assert!((stored.engagement_rate - 0.02).abs() < 1e-9);
}

#[tokio::test]
async fn backdated_post_times_are_unprocessable() {
    let h = harness();
    let campaign = launched(&h.service, new_campaign(RewardModel::Cash, 2, 20_000));
    let offer = offer_for(&h.service, &campaign, influencer("ike", 2_000));
    h.service.reserve_offer(&offer.id).expect("reserved");
    let gig = h
        .service
        .submit_gig(&offer.id, &campaign.posts[0].id, content())
        .expect("submitted");
    h.service
        .approve_gig(&gig.id, crate::marketplace::Actor::Brand)
        .expect("approved");

    let response = app(&h)
        .oneshot(post_json(
            &format!("/api/v1/gigs/{}/post", gig.id),
            json!({
                "url": "https://instagram.com/p/old",
                "posted_at": (start() - Duration::days(365)).to_rfc3339(),
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_campaign_is_not_found() {
    let h = harness();
    let response = app(&h)
        .oneshot(get("/api/v1/campaigns/cmp-missing"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("cmp-missing"));
}

#[tokio::test]
async fn campaign_lifecycle_over_http() {
    let h = harness();
    let body = serde_json::to_value(new_campaign(RewardModel::Cash, 1, 9_000)).expect("serializes");

    let response = app(&h)
        .oneshot(post_json("/api/v1/campaigns", body))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let campaign = read_json_body(response).await;
    let campaign_id = campaign["id"].as_str().expect("id").to_string();
    assert_eq!(campaign["state"], json!("draft"));

    let response = app(&h)
        .oneshot(post_empty(&format!("/api/v1/campaigns/{campaign_id}/launch")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&h)
        .oneshot(post_empty(&format!("/api/v1/campaigns/{campaign_id}/stash")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let mut offers = Vec::new();
    for handle in ["zed", "amy"] {
        h.service
            .register_influencer(influencer(handle, 2_000))
            .expect("registered");
        let response = app(&h)
            .oneshot(post_json(
                &format!("/api/v1/campaigns/{campaign_id}/offers"),
                json!({ "influencer_id": format!("inf-{handle}") }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
        let offer = read_json_body(response).await;
        offers.push(offer["id"].as_str().expect("id").to_string());
    }

    let response = app(&h)
        .oneshot(post_empty(&format!("/api/v1/offers/{}/reserve", offers[0])))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&h)
        .oneshot(post_empty(&format!("/api/v1/offers/{}/reserve", offers[1])))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app(&h)
        .oneshot(get(&format!("/api/v1/campaigns/{campaign_id}/fund")))
        .await
        .expect("route executes");
    let fund = read_json_body(response).await;
    assert_eq!(fund["reserved"], json!(1));
    assert_eq!(fund["is_reservable"], json!(false));
}

#[tokio::test]
async fn claim_reports_blockers_then_pays() {
    let h = harness();
    let campaign = launched(&h.service, new_campaign(RewardModel::Cash, 2, 20_000));
    let offer = offer_for(&h.service, &campaign, influencer("bo", 2_000));
    h.service.reserve_offer(&offer.id).expect("reserved");

    let response = app(&h)
        .oneshot(post_empty(&format!("/api/v1/offers/{}/claim", offer.id)))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["blockers"][0]["reason"], json!("missing_gig"));

    let response = app(&h)
        .oneshot(post_json(
            &format!("/api/v1/offers/{}/gigs", offer.id),
            json!({
                "post_id": campaign.posts[0].id,
                "caption": "Sunrise run",
                "media_url": "https://cdn.example.com/gigs/sunrise.jpg",
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let gig = read_json_body(response).await;
    let gig_id = gig["id"].as_str().expect("id").to_string();

    let response = app(&h)
        .oneshot(post_empty(&format!("/api/v1/gigs/{gig_id}/approve?actor=admin")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let approved = read_json_body(response).await;
    assert_eq!(approved["history"][1]["actor"], json!("admin"));

    let response = app(&h)
        .oneshot(post_json(
            &format!("/api/v1/gigs/{gig_id}/post"),
            json!({ "url": "https://instagram.com/p/sunrise" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    h.clock.advance(Duration::hours(48));
    let response = app(&h)
        .oneshot(get(&format!("/api/v1/offers/{}", offer.id)))
        .await
        .expect("route executes");
    let view = read_json_body(response).await;
    assert_eq!(view["claimability"]["claimable"], json!(true));

    let response = app(&h)
        .oneshot(post_empty(&format!("/api/v1/offers/{}/claim", offer.id)))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let claimed = read_json_body(response).await;
    assert_eq!(claimed["payment"]["state"], json!("paid"));
    assert_eq!(claimed["payment"]["amount"]["amount"], json!(10_000));
}

#[tokio::test]
async fn declined_payout_maps_to_bad_gateway() {
    let h = harness();
    let campaign = launched(&h.service, new_campaign(RewardModel::Cash, 1, 5_000));
    let offer = offer_for(&h.service, &campaign, influencer("cy", 2_000));
    h.service.reserve_offer(&offer.id).expect("reserved");
    publish_gig(&h.service, &offer.id, &campaign.posts[0].id);
    h.clock.advance(Duration::hours(48));
    h.payouts.decline_next(true);

    let response = router::claim_reward::<
        InMemoryMarketplaceStore,
        RecordingPayouts,
        RecordingNotifications,
    >(State(h.service.clone()), Path(offer.id.to_string()))
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn rejecting_without_reason_body_fields_is_allowed() {
    let h = harness();
    let campaign = launched(&h.service, new_campaign(RewardModel::Cash, 1, 5_000));
    let offer = offer_for(&h.service, &campaign, influencer("di", 2_000));

    let response = app(&h)
        .oneshot(post_json(
            &format!("/api/v1/offers/{}/reject", offer.id),
            json!({}),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let rejected = read_json_body(response).await;
    assert_eq!(rejected["state"], json!("rejected"));

    let response = router::revoke_offer::<
        InMemoryMarketplaceStore,
        RecordingPayouts,
        RecordingNotifications,
    >(
        State(h.service.clone()),
        Path(offer.id.to_string()),
        Query(Default::default()),
        axum::Json(Default::default()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[test]
fn conflicts_from_storage_map_to_conflict() {
    let error = crate::marketplace::MarketplaceError::Repository(RepositoryError::Conflict);
    assert_eq!(router::status_code(&error), StatusCode::CONFLICT);
}
