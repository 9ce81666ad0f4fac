use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::campaign::NewCampaign;
use super::domain::{Actor, CampaignId, GigId, InfluencerId, OfferId, PostId};
use super::gig::{GigContent, GigTransitionError, InsightSubmission};
use super::influencer::{InfluencerProfile, RecentPostMetrics};
use super::money::Money;
use super::repository::{MarketplaceStore, NotificationPublisher, PayoutProvider, RepositoryError};
use super::service::{MarketplaceError, MarketplaceService};

type Service<S, P, N> = Arc<MarketplaceService<S, P, N>>;

/// Router builder exposing campaign, offer, and gig endpoints.
pub fn marketplace_router<S, P, N>(service: Service<S, P, N>) -> Router
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route("/api/v1/influencers", post(register_influencer::<S, P, N>))
        .route("/api/v1/influencers/:id", get(influencer::<S, P, N>))
        .route("/api/v1/campaigns", post(create_campaign::<S, P, N>))
        .route("/api/v1/campaigns/:id", get(campaign::<S, P, N>))
        .route("/api/v1/campaigns/:id/launch", post(launch_campaign::<S, P, N>))
        .route(
            "/api/v1/campaigns/:id/complete",
            post(complete_campaign::<S, P, N>),
        )
        .route("/api/v1/campaigns/:id/stash", post(stash_campaign::<S, P, N>))
        .route("/api/v1/campaigns/:id/fund", get(fund_progress::<S, P, N>))
        .route("/api/v1/campaigns/:id/offers", post(create_offer::<S, P, N>))
        .route("/api/v1/offers/:id", get(offer_view::<S, P, N>))
        .route("/api/v1/offers/:id/invite", post(send_invite::<S, P, N>))
        .route("/api/v1/offers/:id/reserve", post(reserve_offer::<S, P, N>))
        .route(
            "/api/v1/offers/:id/request",
            post(request_participation::<S, P, N>),
        )
        .route(
            "/api/v1/offers/:id/candidate",
            post(set_as_candidate::<S, P, N>),
        )
        .route("/api/v1/offers/:id/approve", post(approve_by_brand::<S, P, N>))
        .route("/api/v1/offers/:id/accept", post(accept_offer::<S, P, N>))
        .route("/api/v1/offers/:id/reject", post(reject_offer::<S, P, N>))
        .route(
            "/api/v1/offers/:id/reject-candidate",
            post(reject_candidate::<S, P, N>),
        )
        .route("/api/v1/offers/:id/revoke", post(revoke_offer::<S, P, N>))
        .route("/api/v1/offers/:id/renew", post(renew_offer::<S, P, N>))
        .route("/api/v1/offers/:id/reward", post(set_custom_reward::<S, P, N>))
        .route("/api/v1/offers/:id/claim", post(claim_reward::<S, P, N>))
        .route(
            "/api/v1/offers/:id/payment/retry",
            post(retry_payment::<S, P, N>),
        )
        .route("/api/v1/offers/:id/gigs", post(submit_gig::<S, P, N>))
        .route("/api/v1/gigs/:id", get(gig::<S, P, N>))
        .route("/api/v1/gigs/:id/review", post(review_gig::<S, P, N>))
        .route("/api/v1/gigs/:id/approve", post(approve_gig::<S, P, N>))
        .route("/api/v1/gigs/:id/reject", post(reject_gig::<S, P, N>))
        .route(
            "/api/v1/gigs/:id/resubmission",
            post(request_resubmission::<S, P, N>),
        )
        .route("/api/v1/gigs/:id/resubmit", post(resubmit_gig::<S, P, N>))
        .route("/api/v1/gigs/:id/post", post(link_post::<S, P, N>))
        .route("/api/v1/gigs/:id/missing", post(mark_missing::<S, P, N>))
        .route("/api/v1/gigs/:id/insight", post(submit_insight::<S, P, N>))
        .route(
            "/api/v1/gigs/:id/insight/approve",
            post(approve_insight::<S, P, N>),
        )
        .route(
            "/api/v1/gigs/:id/insight/resubmission",
            post(request_insight_resubmission::<S, P, N>),
        )
        .with_state(service)
}

/// Optional `?actor=` override for endpoints that several roles may call.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ActorParams {
    actor: Option<Actor>,
}

impl ActorParams {
    fn or(&self, fallback: Actor) -> Actor {
        self.actor.unwrap_or(fallback)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateOfferRequest {
    influencer_id: InfluencerId,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ReasonRequest {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RequiredReason {
    reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitGigRequest {
    post_id: PostId,
    #[serde(flatten)]
    content: GigContent,
}

/// Profile plus optional recent post metrics the engagement rate is measured from.
#[derive(Debug, Deserialize)]
pub(crate) struct RegisterInfluencerRequest {
    #[serde(flatten)]
    profile: InfluencerProfile,
    #[serde(default)]
    recent_posts: Vec<RecentPostMetrics>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LinkPostRequest {
    url: String,
    posted_at: Option<DateTime<Utc>>,
}

pub(crate) fn status_code(error: &MarketplaceError) -> StatusCode {
    match error {
        MarketplaceError::NotFound { .. }
        | MarketplaceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        MarketplaceError::Gig(GigTransitionError::PostedAtOutOfRange { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        MarketplaceError::Campaign(_)
        | MarketplaceError::Offer(_)
        | MarketplaceError::Gig(_)
        | MarketplaceError::CampaignClosed(_)
        | MarketplaceError::DuplicateOffer(_)
        | MarketplaceError::OfferNotAccepted
        | MarketplaceError::PostClosed(_)
        | MarketplaceError::GigAlreadySubmitted(_)
        | MarketplaceError::NotClaimable(_)
        | MarketplaceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        MarketplaceError::Fund(_)
        | MarketplaceError::Money(_)
        | MarketplaceError::Targeting(_)
        | MarketplaceError::UnknownPost(_)
        | MarketplaceError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MarketplaceError::Payout(_) => StatusCode::BAD_GATEWAY,
        MarketplaceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(error: MarketplaceError) -> Response {
    let status = status_code(&error);
    if status.is_server_error() {
        tracing::error!(error = %error, "marketplace request failed");
    }

    let payload = match &error {
        MarketplaceError::NotClaimable(blockers) => json!({
            "error": error.to_string(),
            "blockers": blockers,
        }),
        _ => json!({ "error": error.to_string() }),
    };
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, MarketplaceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn register_influencer<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Json(request): Json<RegisterInfluencerRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    let profile = request.profile.with_recent_posts(&request.recent_posts);
    respond(StatusCode::CREATED, service.register_influencer(profile))
}

pub(crate) async fn influencer<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.influencer(&InfluencerId(id)))
}

pub(crate) async fn create_campaign<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Json(new): Json<NewCampaign>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::CREATED, service.create_campaign(new))
}

pub(crate) async fn campaign<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.campaign(&CampaignId(id)))
}

pub(crate) async fn launch_campaign<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.launch_campaign(&CampaignId(id), params.or(Actor::Brand)),
    )
}

pub(crate) async fn complete_campaign<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.complete_campaign(&CampaignId(id), params.or(Actor::Brand)),
    )
}

pub(crate) async fn stash_campaign<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.stash_campaign(&CampaignId(id), params.or(Actor::Brand)),
    )
}

pub(crate) async fn fund_progress<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.fund_progress(&CampaignId(id)))
}

pub(crate) async fn create_offer<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
    Json(request): Json<CreateOfferRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::CREATED,
        service.create_offer(
            &CampaignId(id),
            &request.influencer_id,
            params.or(Actor::Brand),
        ),
    )
}

pub(crate) async fn offer_view<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.offer_view(&OfferId(id)))
}

pub(crate) async fn send_invite<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.send_invite(&OfferId(id), params.or(Actor::Brand)),
    )
}

pub(crate) async fn reserve_offer<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.reserve_offer(&OfferId(id)))
}

pub(crate) async fn request_participation<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.request_participation(&OfferId(id)))
}

pub(crate) async fn set_as_candidate<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.set_as_candidate(&OfferId(id), params.or(Actor::Admin)),
    )
}

pub(crate) async fn approve_by_brand<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.approve_by_brand(&OfferId(id), params.or(Actor::Brand)),
    )
}

pub(crate) async fn accept_offer<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.accept_offer(&OfferId(id)))
}

pub(crate) async fn reject_offer<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Json(request): Json<ReasonRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.reject_offer(&OfferId(id), request.reason),
    )
}

pub(crate) async fn reject_candidate<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
    Json(request): Json<ReasonRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.reject_candidate(&OfferId(id), params.or(Actor::Brand), request.reason),
    )
}

pub(crate) async fn revoke_offer<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
    Json(request): Json<ReasonRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.revoke_offer(&OfferId(id), params.or(Actor::Admin), request.reason),
    )
}

pub(crate) async fn renew_offer<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.renew_offer(&OfferId(id), params.or(Actor::Admin)),
    )
}

pub(crate) async fn set_custom_reward<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Json(reward): Json<Money>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.set_custom_reward(&OfferId(id), reward))
}

pub(crate) async fn claim_reward<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.claim_reward(&OfferId(id)))
}

pub(crate) async fn retry_payment<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.retry_payment(&OfferId(id)))
}

pub(crate) async fn submit_gig<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Json(request): Json<SubmitGigRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::CREATED,
        service.submit_gig(&OfferId(id), &request.post_id, request.content),
    )
}

pub(crate) async fn gig<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.gig(&GigId(id)))
}

pub(crate) async fn review_gig<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.review_gig(&GigId(id), params.or(Actor::Admin)),
    )
}

pub(crate) async fn approve_gig<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.approve_gig(&GigId(id), params.or(Actor::Brand)),
    )
}

pub(crate) async fn reject_gig<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
    Json(request): Json<RequiredReason>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.reject_gig(&GigId(id), params.or(Actor::Brand), request.reason),
    )
}

pub(crate) async fn request_resubmission<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
    Json(request): Json<RequiredReason>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.request_resubmission(&GigId(id), params.or(Actor::Brand), request.reason),
    )
}

pub(crate) async fn resubmit_gig<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Json(content): Json<GigContent>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.resubmit_gig(&GigId(id), content))
}

pub(crate) async fn link_post<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Json(request): Json<LinkPostRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.link_post(&GigId(id), request.url, request.posted_at),
    )
}

pub(crate) async fn mark_missing<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.mark_missing(&GigId(id)))
}

pub(crate) async fn submit_insight<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Json(submission): Json<InsightSubmission>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.submit_insight(&GigId(id), submission))
}

pub(crate) async fn approve_insight<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.approve_insight(&GigId(id), params.or(Actor::Brand)),
    )
}

pub(crate) async fn request_insight_resubmission<S, P, N>(
    State(service): State<Service<S, P, N>>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
    Json(request): Json<RequiredReason>,
) -> Response
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.request_insight_resubmission(
            &GigId(id),
            params.or(Actor::Brand),
            request.reason,
        ),
    )
}
